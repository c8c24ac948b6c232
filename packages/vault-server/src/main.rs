use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use common::config::StoreBackend;
use common::storage::ContentStore;
use common::storage::memory::MemoryContentStore;
use common::storage::s3::S3ContentStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vault_server::config::AppConfig;
use vault_server::state::AppState;
use vault_server::{build_router, database, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = database::init_db(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    seed::ensure_indexes(&db)
        .await
        .context("Failed to create indexes")?;

    let store: Arc<dyn ContentStore> = match config.object_store.backend {
        StoreBackend::S3 => {
            info!(
                endpoint = %config.object_store.endpoint_url(),
                bucket = %config.object_store.bucket,
                "Using S3 content store"
            );
            Arc::new(S3ContentStore::new(&config.object_store)?)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory content store; blobs are lost on restart");
            Arc::new(MemoryContentStore::new(config.object_store.public_base_url()))
        }
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState {
        db,
        store,
        config,
    };
    let app = build_router(state);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
