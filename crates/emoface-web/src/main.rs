use anyhow::{Context, Result};
use emoface_core::OnnxAnalyzer;
use emoface_intake::UploadStore;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod page;
mod routes;

/// ONNX Runtime logs through `tracing`; keep it to warnings unless asked.
const DEFAULT_LOG_FILTER: &str = "info,ort=warn";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = config::Config::from_env();
    tracing::info!(
        addr = %config.listen_addr(),
        upload_dir = %config.upload_dir.display(),
        model_dir = %config.analyzer.model_dir.display(),
        enforce_detection = config.analyzer.enforce_detection,
        "emoface-web starting"
    );

    let store = UploadStore::open(&config.upload_dir)
        .with_context(|| format!("preparing {}", config.upload_dir.display()))?;

    let analyzer = OnnxAnalyzer::load(&config.analyzer).context("loading emotion models")?;
    let engine = engine::spawn_engine(Box::new(analyzer))?;

    let app = routes::router(routes::AppState { engine, store }, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("binding {}", config.listen_addr()))?;
    tracing::info!(addr = %config.listen_addr(), "emoface-web ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("emoface-web shutting down");
    Ok(())
}
