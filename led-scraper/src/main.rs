use clap::{Parser, Subcommand};
use led_scraper::observability::logging;
use led_scraper::pipeline::Pipeline;
use tracing::info;

#[derive(Parser)]
#[command(name = "led-scraper")]
#[command(about = "Event digest pipeline: resolve, fetch, clean, and enrich calendar events")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for a landing page and date, printing JSON
    Scrape {
        /// Calendar landing page URL
        #[arg(long)]
        url: String,
        /// Target date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize logging
    logging::init_logging();

    match cli.command {
        Commands::Scrape { url, date } => {
            let pipeline = Pipeline::from_env()?;
            info!(%url, %date, "starting pipeline run");
            let events = pipeline.run(url.trim(), date.trim()).await?;
            info!(events = events.len(), "pipeline run complete");
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
    }

    Ok(())
}
