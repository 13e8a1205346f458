use std::sync::Arc;

use praxiscapital::{
    AppState, app,
    config::Config,
    store::{DocumentStore, InMemoryStore, SqliteStore},
    telemetry, unavailable,
};

async fn open_store(url: &str) -> Result<Arc<dyn DocumentStore>, String> {
    if url == "memory" {
        tracing::warn!("using the in-memory store; nothing will be persisted");
        return Ok(Arc::new(InMemoryStore::new()));
    }
    match SqliteStore::connect(url).await {
        Ok(store) => Ok(Arc::new(store)),
        Err(err) => Err(err.to_string()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let config = Config::from_env().unwrap_or_else(|err| {
        tracing::error!(error = %err.0, "bad configuration, using defaults");
        Config::default()
    });
    let bind_addr = config.bind_addr.clone();

    let router = match open_store(&config.database_url).await {
        Ok(store) => app(AppState::new(store, config)),
        Err(reason) => {
            tracing::error!(%reason, database_url = %config.database_url, "store unreachable");
            unavailable(reason)
        }
    };

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}
