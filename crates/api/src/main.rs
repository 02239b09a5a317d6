use anyhow::Context;

use loomerp_infra::load_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    loomerp_observability::init_with(&config.log.level, config.log.json);

    let app = loomerp_api::app::build_app(&config);

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;

    tracing::info!(
        address = %listener.local_addr()?,
        max_tree_depth = config.engine.max_tree_depth,
        "loomerp api listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
