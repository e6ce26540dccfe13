use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use led_scraper::observability::{logging, metrics};
use led_scraper::pipeline::Pipeline;
use tracing::info;

mod outputs;
mod server;

#[derive(Parser)]
#[command(name = "led-server")]
#[command(about = "JSON API server for the LED event digest pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// Port to run the server on
    #[arg(short, long, default_value = "8000")]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize logging
    logging::init_logging();

    // Optional Prometheus endpoint
    if let Ok(addr) = std::env::var("LED_METRICS_ADDR") {
        let addr: SocketAddr = addr.parse()?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        metrics::describe_all();
        info!(%addr, "Prometheus exporter listening");
    }

    info!(port = cli.port, "starting LED API server");
    let pipeline = Arc::new(Pipeline::from_env()?);

    server::start_server(pipeline, cli.port).await?;

    Ok(())
}
