use futures::future::select_ok;
use tonic::Request;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info, warn};

use super::config::ClientConfig;
use super::error::ClientError;
use crate::proto::InfoParams;
use crate::proto::btrdb_client::BtrdbClient;

/// Environment variable holding comma separated `host:port` endpoints.
pub const ENDPOINTS_ENV: &str = "BTRDB_ENDPOINTS";

/// Endpoints listed in `BTRDB_ENDPOINTS`, or an empty list when unset.
pub fn endpoints_from_env() -> Vec<String> {
    std::env::var(ENDPOINTS_ENV)
        .map(|value| parse_endpoints(&value))
        .unwrap_or_default()
}

pub fn parse_endpoints(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|endpoint| !endpoint.is_empty())
        .map(str::to_string)
        .collect()
}

/// Race every endpoint and keep the first one that answers an `Info` probe.
pub(crate) async fn race(
    endpoints: &[String],
    config: &ClientConfig,
) -> Result<(String, Channel), ClientError> {
    if endpoints.is_empty() {
        return Err(ClientError::NoEndpoints);
    }

    let attempts = endpoints
        .iter()
        .map(|endpoint| Box::pin(attempt(endpoint.clone(), config)));

    match tokio::time::timeout(config.connect_deadline, select_ok(attempts)).await {
        Err(_) => {
            warn!(endpoints = ?endpoints, "Connect deadline elapsed");
            Err(ClientError::DeadlineExceeded)
        }
        Ok(Ok((winner, _losers))) => {
            info!(endpoint = %winner.0, "Connected to BTrDB");
            Ok(winner)
        }
        Ok(Err(last)) => Err(last),
    }
}

async fn attempt(endpoint: String, config: &ClientConfig) -> Result<(String, Channel), ClientError> {
    let uri = if endpoint.contains("://") {
        endpoint.clone()
    } else {
        format!("http://{endpoint}")
    };
    let target = Endpoint::from_shared(uri)
        .map_err(|_| ClientError::InvalidEndpoint(endpoint.clone()))?
        .connect_timeout(config.endpoint_timeout);

    let probe = async {
        let channel = target.connect().await?;
        BtrdbClient::new(channel.clone())
            .info(Request::new(InfoParams {}))
            .await?;
        Ok::<_, ClientError>(channel)
    };

    match tokio::time::timeout(config.endpoint_timeout, probe).await {
        Ok(Ok(channel)) => Ok((endpoint, channel)),
        Ok(Err(err)) => {
            debug!(endpoint = %endpoint, error = %err, "Endpoint unhealthy");
            Err(err)
        }
        Err(_) => {
            debug!(endpoint = %endpoint, "Endpoint probe timed out");
            Err(ClientError::EndpointTimeout(endpoint))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoints_skips_blanks() {
        assert_eq!(
            parse_endpoints(" a:1, ,b:2,"),
            ["a:1".to_string(), "b:2".to_string()]
        );
        assert!(parse_endpoints("").is_empty());
    }

    #[tokio::test]
    async fn test_empty_endpoint_list() {
        let err = race(&[], &ClientConfig::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::NoEndpoints));
    }
}
