pub mod client;
pub mod config;
pub mod csv;
pub mod error;
pub mod gateway;
pub mod grpc;
pub mod proto;
pub mod sql;
pub mod store;
pub mod types;

pub use client::{Btrdb, ClientConfig, ClientError, Cursor, Stream};
pub use config::{ConfigError, NodeConfig};
pub use error::{CodedError, ErrorCode};
pub use types::{BASE_VERSION, ChangedRange, OptMap, RawPoint, StatPoint, SyncPolicy, Version};

/// Resolves on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
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

    tracing::info!("shutdown signal received");
}
