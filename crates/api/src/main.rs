use anyhow::{Context, Result};
use komal_api::{build_app_with, ServiceConfig};
use komal_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("komal_api");

    let config = ServiceConfig::from_env();
    let app = build_app_with(&config)?;

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(
        bind = %config.bind,
        taxonomy = %config.taxonomy_path.display(),
        "komal moderation api started"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
