use std::sync::Arc;

use menu_rec_api::{
    config::Config,
    db::{create_pool, PgStore},
    routes::{create_router, AppState},
    services::{oracle::GenerativeOracle, RecommendationEngine},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url, config.database_max_connections).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    let store = Arc::new(PgStore::new(pool));

    let vocabulary = config.vocabulary();
    tracing::info!(ingredients = vocabulary.len(), "Ingredient vocabulary loaded");

    let mut engine = RecommendationEngine::new(
        store.clone(),
        store.clone(),
        store,
        Arc::new(vocabulary),
        config.engine_settings(),
    );

    match config.oracle_api_key.clone() {
        Some(api_key) if !api_key.is_empty() => {
            tracing::info!(model = %config.oracle_model, "Oracle tier enabled");
            engine = engine.with_oracle(Arc::new(GenerativeOracle::new(
                api_key,
                config.oracle_api_url.clone(),
                config.oracle_model.clone(),
            )));
        }
        _ => tracing::info!("No oracle API key configured, oracle tier disabled"),
    }

    let app = create_router(Arc::new(AppState::new(engine)));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
