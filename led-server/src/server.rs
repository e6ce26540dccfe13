use std::sync::Arc;

use axum::{
    extract::Form,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use led_scraper::pipeline::{Pipeline, PipelineError};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::outputs;

#[derive(Deserialize)]
pub struct ScrapeForm {
    url: String,
    date: String,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    "OK"
}

/// One scrape request: collect, persist the pre-enrichment artifacts, enrich,
/// persist the final artifact, sweep aged outputs.
async fn scrape_handler(
    Extension(pipeline): Extension<Arc<Pipeline>>,
    Form(form): Form<ScrapeForm>,
) -> (StatusCode, Json<serde_json::Value>) {
    let url = form.url.trim().to_string();
    let date = form.date.trim().to_string();
    info!(%url, %date, "scrape request received");

    let mut events = match pipeline.collect(&url, &date).await {
        Ok(events) => events,
        Err(e) => return error_response(e),
    };
    outputs::save_collected(&date, &events);

    if let Err(e) = pipeline.enrich_all(&mut events).await {
        return error_response(e);
    }
    outputs::save_final(&date, &events);
    outputs::cleanup_old_files(&led_scraper::infra::paths::outputs_dir(), 3);

    info!(%date, events = events.len(), "scrape request complete");
    (
        StatusCode::OK,
        Json(json!({ "status": "success", "data": events })),
    )
}

fn error_response(err: PipelineError) -> (StatusCode, Json<serde_json::Value>) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error!(status = %status, error = %err, "scrape request failed");
    (
        status,
        Json(json!({ "status": "error", "message": err.to_string() })),
    )
}

/// Create the HTTP server router
pub fn create_router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/scrape", post(scrape_handler))
        .layer(Extension(pipeline))
}

/// Start the HTTP server
pub async fn start_server(pipeline: Arc<Pipeline>, port: u16) -> anyhow::Result<()> {
    let app = create_router(pipeline);
    let addr = format!("0.0.0.0:{port}");
    info!(%addr, "JSON API listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
