use std::future::Future;

use tokio::net::TcpListener;
use tonic::transport::Channel;
use tracing::info;

use super::config::GatewayConfig;
use super::router::Gateway;

/// Bind `config.listen` and serve the gateway in front of `channel` until `shutdown` resolves.
pub async fn start_gateway(
    config: GatewayConfig,
    channel: Channel,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.listen).await?;
    serve_gateway(listener, Gateway::new(channel, config), shutdown).await
}

/// Serve `gateway` on an already bound listener. In-flight requests finish before this returns.
pub async fn serve_gateway(
    listener: TcpListener,
    gateway: Gateway,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(address = %addr, "HTTP gateway starting");

    axum::serve(listener, gateway.into_router())
        .with_graceful_shutdown(shutdown)
        .await?;

    info!(address = %addr, "HTTP gateway stopped");
    Ok(())
}
