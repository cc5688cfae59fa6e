// ============================
// crates/backend-bin/src/main.rs
// ============================
//! Server entry point: load settings, wire the chosen session store and
//! fan-out broker, serve.

use backend_lib::broker::RedisBroker;
use backend_lib::config::{Settings, StoreBackend};
use backend_lib::registry::Registry;
use backend_lib::store::{MemoryStore, RedisStore};
use backend_lib::{ws_router, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone())),
        )
        .init();

    let bind_addr = settings.bind_addr;

    let app = match settings.store.backend {
        StoreBackend::Memory => {
            info!("session store: in-process memory");
            let state = Arc::new(AppState::new_local(MemoryStore::new(), settings));
            ws_router::create_router(state)
        },
        StoreBackend::Redis => {
            info!(url = %settings.store.redis_url, "session store: redis");
            let store = RedisStore::connect(&settings.store.redis_url).await?;
            let registry = Arc::new(Registry::new());
            let broker = Arc::new(
                RedisBroker::connect(
                    &settings.store.redis_url,
                    &settings.store.pubsub_channel,
                    registry.clone(),
                )
                .await?,
            );
            let state = Arc::new(AppState::new(store, registry, broker, settings));
            ws_router::create_router(state)
        },
    };

    let listener = TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
