use std::sync::Arc;

use anyhow::Result;
use btrdb::config::NodeConfig;
use btrdb::gateway::start_gateway;
use btrdb::grpc::{BtrdbService, start_server};
use btrdb::shutdown_signal;
use btrdb::store::Store;
use tokio::sync::watch;
use tonic::transport::Endpoint;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = NodeConfig::from_env()?;
    info!(
        grpc = %config.grpc_listen,
        http = ?config.http_listen,
        frame_size = config.service.frame_size(),
        "Starting BTrDB node"
    );

    let store = Arc::new(Store::new(config.store.clone()));
    let service = BtrdbService::new(store, config.service.clone());

    let (stop_tx, stop_rx) = watch::channel(false);
    let stopped = |mut rx: watch::Receiver<bool>| async move {
        let _ = rx.wait_for(|stop| *stop).await;
    };

    let mut grpc = tokio::spawn(start_server(
        config.grpc_listen,
        service,
        stopped(stop_rx.clone()),
    ));

    let gateway = config.gateway().map(|gateway_config| {
        let upstream = Endpoint::from_shared(format!("http://{}", config.grpc_listen))
            .map(|endpoint| endpoint.connect_lazy());
        let shutdown = stopped(stop_rx.clone());
        tokio::spawn(async move { start_gateway(gateway_config, upstream?, shutdown).await })
    });

    tokio::select! {
        _ = shutdown_signal() => {}
        result = &mut grpc => {
            // The gRPC server only returns early on failure.
            let _ = stop_tx.send(true);
            result??;
            return Ok(());
        }
    }
    let _ = stop_tx.send(true);

    if let Some(gateway) = gateway {
        match gateway.await {
            Ok(Err(e)) => error!(error = %e, "HTTP gateway error"),
            Err(e) => error!(error = %e, "HTTP gateway task failed"),
            Ok(Ok(())) => {}
        }
    }
    grpc.await??;

    info!("BTrDB node stopped");
    Ok(())
}
