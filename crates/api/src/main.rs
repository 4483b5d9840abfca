use anyhow::Context;

use storefront_infra::StorefrontConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let config = StorefrontConfig::from_env().context("invalid configuration")?;
    storefront_observability::init(config.log_format);

    if config.uses_default_admin_token() {
        tracing::warn!("ADMIN_TOKEN not set; using insecure dev default");
    }

    let app = storefront_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
