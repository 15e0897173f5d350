use financial_query_orchestrator::{agent::Orchestrator, api::start_server, config::Settings};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;

    info!("Financial Query Orchestrator - API Server");
    info!("Port: {}", settings.port);

    let orchestrator = Arc::new(Orchestrator::from_settings(&settings).await?);

    info!(
        capabilities = orchestrator.capabilities().len(),
        summarizer = orchestrator.summarizer_name(),
        "Orchestrator initialized"
    );

    start_server(orchestrator, settings.port, settings.request_timeout).await?;

    Ok(())
}
