use anyhow::{Context, Result};
use btrdb::config::NodeConfig;
use btrdb::gateway::start_gateway;
use btrdb::shutdown_signal;
use tonic::transport::{Channel, Endpoint};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = NodeConfig::from_env()?;
    let endpoints = config.require_endpoints()?;
    let gateway_config = config.gateway().unwrap_or_default();

    // Every endpoint is balanced over lazily; nothing is dialled until the first request.
    let upstream = endpoints
        .iter()
        .map(|endpoint| {
            let uri = if endpoint.contains("://") {
                endpoint.clone()
            } else {
                format!("http://{endpoint}")
            };
            Endpoint::from_shared(uri).with_context(|| format!("invalid endpoint '{endpoint}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    let channel = Channel::balance_list(upstream.into_iter());

    info!(
        listen = %gateway_config.listen,
        upstream = ?endpoints,
        "Starting standalone HTTP gateway"
    );
    start_gateway(gateway_config, channel, shutdown_signal()).await
}
