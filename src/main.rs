use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use trackseq::allocator::{AllocatorBackend, AllocatorConfig, DurableAllocator, InMemoryAllocator};
use trackseq::api::{start_server, AppState, ServerConfig};
use trackseq::storage::{
    PostgresConfig, PostgresSequenceStore, RetryConfig, RocksDbSequenceStore, SequenceStoreBackend,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trackseq=info".parse()?))
        .init();

    tracing::info!("trackseq starting...");

    let config = AllocatorConfig::from_env()?;
    let server_config = ServerConfig::from_env();
    tracing::info!(
        prefix = %config.prefix,
        utc_offset = %config.utc_offset,
        "Tracking id format: {}-YYYYMMDD-NNNN",
        config.prefix
    );

    // Durable store: Postgres wins over RocksDB when both are set
    let store = if let Ok(url) = std::env::var("TRACKSEQ_DATABASE_URL") {
        let pg_config = PostgresConfig::from_env(url);
        let store = PostgresSequenceStore::connect(&pg_config).await?;
        tracing::info!(
            max_connections = pg_config.max_connections,
            "Connected to Postgres sequence store"
        );
        Some(SequenceStoreBackend::postgres(store))
    } else if let Ok(data_dir) = std::env::var("TRACKSEQ_DATA_DIR") {
        let store = RocksDbSequenceStore::open(&data_dir)?;
        tracing::info!("Opened RocksDB sequence store at {}", data_dir);
        Some(SequenceStoreBackend::rocksdb(store))
    } else {
        None
    };

    let allocator = match store {
        Some(store) => {
            let retry = RetryConfig::from_env();
            tracing::info!(
                max_retries = retry.max_retries,
                shared = store.is_shared(),
                "Durable allocator enabled"
            );
            AllocatorBackend::durable(
                DurableAllocator::new(Arc::new(store), config).with_retry(retry),
            )
        }
        None => {
            tracing::warn!(
                "No durable store configured (TRACKSEQ_DATABASE_URL / TRACKSEQ_DATA_DIR unset); \
                 using in-memory allocator. Counters reset on restart and are not shared \
                 between processes"
            );
            AllocatorBackend::in_memory(InMemoryAllocator::new(config))
        }
    };

    let store_info = allocator.store_info();
    let state = Arc::new(
        AppState::new(Arc::new(allocator), store_info)
            .with_request_timeout(server_config.request_timeout),
    );

    start_server(server_config, state, shutdown_signal()).await?;

    tracing::info!("trackseq stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
