use std::sync::Arc;

use reel_social::{
    config::{Config, StoreKind},
    db::{create_pool, run_migrations, MemoryStore, PgStore},
    routes::{create_router, AppState},
    services::Social,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let social = match config.store {
        StoreKind::Postgres => {
            let pool = create_pool(&config.database_url, config.max_connections).await?;
            run_migrations(&pool).await?;
            tracing::info!(max_connections = config.max_connections, "Connected to PostgreSQL");
            Social::new(Arc::new(PgStore::new(pool)))
        }
        StoreKind::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on shutdown");
            Social::new(Arc::new(MemoryStore::new()))
        }
    };

    let app = create_router(Arc::new(AppState::new(social)));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
