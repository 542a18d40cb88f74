//! Node configuration read from the environment.

use std::net::SocketAddr;

use bon::Builder;
use thiserror::Error;

use crate::client::{ENDPOINTS_ENV, parse_endpoints};
use crate::gateway::GatewayConfig;
use crate::grpc::ServiceConfig;
use crate::store::StoreConfig;

pub const GRPC_LISTEN_ENV: &str = "BTRDB_GRPC_LISTEN";
pub const HTTP_LISTEN_ENV: &str = "BTRDB_HTTP_LISTEN";
pub const FRAME_SIZE_ENV: &str = "BTRDB_FRAME_SIZE";
pub const FAULT_INJECT_ENV: &str = "BTRDB_ENABLE_FAULT_INJECT";
pub const OBLITERATE_ENV: &str = "BTRDB_ENABLE_OBLITERATE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: invalid address '{value}'")]
    InvalidAddress { var: &'static str, value: String },

    #[error("{var}: expected a number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var}: expected true or false, got '{value}'")]
    InvalidFlag { var: &'static str, value: String },

    #[error("{ENDPOINTS_ENV} is not set")]
    MissingEndpoints,
}

/// Everything a node needs to start.
#[derive(Debug, Clone, Builder)]
pub struct NodeConfig {
    #[builder(default = SocketAddr::from(([127, 0, 0, 1], 4410)))]
    pub grpc_listen: SocketAddr,

    /// `None` disables the HTTP gateway.
    pub http_listen: Option<SocketAddr>,

    #[builder(default)]
    pub store: StoreConfig,

    #[builder(default)]
    pub service: ServiceConfig,

    /// Upstream endpoints for a standalone gateway.
    #[builder(default)]
    pub endpoints: Vec<String>,
}

impl NodeConfig {
    /// Read the `BTRDB_*` variables, falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ServiceConfig::default();

        let grpc_listen = match lookup(GRPC_LISTEN_ENV) {
            Some(value) => address(GRPC_LISTEN_ENV, value)?,
            None => SocketAddr::from(([127, 0, 0, 1], 4410)),
        };
        let http_listen = match lookup(HTTP_LISTEN_ENV) {
            Some(value) if value.eq_ignore_ascii_case("off") => None,
            Some(value) => Some(address(HTTP_LISTEN_ENV, value)?),
            None => Some(SocketAddr::from(([127, 0, 0, 1], 9000))),
        };
        let frame_size = match lookup(FRAME_SIZE_ENV) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber {
                    var: FRAME_SIZE_ENV,
                    value,
                })?,
            None => defaults.frame_size,
        };
        let fault_inject_enabled = match lookup(FAULT_INJECT_ENV) {
            Some(value) => flag(FAULT_INJECT_ENV, value)?,
            None => defaults.fault_inject_enabled,
        };
        let obliterate_enabled = match lookup(OBLITERATE_ENV) {
            Some(value) => flag(OBLITERATE_ENV, value)?,
            None => defaults.obliterate_enabled,
        };
        let endpoints = lookup(ENDPOINTS_ENV)
            .map(|value| parse_endpoints(&value))
            .unwrap_or_default();

        let service = ServiceConfig::builder()
            .frame_size(frame_size)
            .fault_inject_enabled(fault_inject_enabled)
            .obliterate_enabled(obliterate_enabled)
            .grpc_endpoint(grpc_listen.to_string())
            .http_endpoint(http_listen.map(|addr| addr.to_string()).unwrap_or_default())
            .build();

        Ok(Self::builder()
            .grpc_listen(grpc_listen)
            .maybe_http_listen(http_listen)
            .service(service)
            .endpoints(endpoints)
            .build())
    }

    /// Gateway settings, if the gateway is enabled.
    pub fn gateway(&self) -> Option<GatewayConfig> {
        self.http_listen.map(|listen| {
            GatewayConfig::builder()
                .listen(listen)
                .max_message_size(self.service.max_message_size)
                .max_body_bytes(self.service.max_message_size)
                .build()
        })
    }

    /// Upstream endpoints, required by the standalone gateway.
    pub fn require_endpoints(&self) -> Result<&[String], ConfigError> {
        if self.endpoints.is_empty() {
            Err(ConfigError::MissingEndpoints)
        } else {
            Ok(&self.endpoints)
        }
    }
}

fn address(var: &'static str, value: String) -> Result<SocketAddr, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidAddress { var, value })
}

fn flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<NodeConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NodeConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.grpc_listen.port(), 4410);
        assert_eq!(config.http_listen.map(|a| a.port()), Some(9000));
        assert_eq!(config.service.frame_size, 5000);
        assert!(!config.service.fault_inject_enabled);
        assert!(config.service.obliterate_enabled);
        assert!(config.endpoints.is_empty());
        assert!(matches!(
            config.require_endpoints(),
            Err(ConfigError::MissingEndpoints)
        ));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            (GRPC_LISTEN_ENV, "0.0.0.0:5000"),
            (HTTP_LISTEN_ENV, "off"),
            (FRAME_SIZE_ENV, "100"),
            (FAULT_INJECT_ENV, "true"),
            (OBLITERATE_ENV, "0"),
            (ENDPOINTS_ENV, "a:1, b:2"),
        ])
        .unwrap();
        assert_eq!(config.grpc_listen.port(), 5000);
        assert!(config.http_listen.is_none());
        assert!(config.gateway().is_none());
        assert_eq!(config.service.frame_size, 100);
        assert!(config.service.fault_inject_enabled);
        assert!(!config.service.obliterate_enabled);
        assert_eq!(config.require_endpoints().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[(GRPC_LISTEN_ENV, "nowhere")]),
            Err(ConfigError::InvalidAddress { .. })
        ));
        assert!(matches!(
            config(&[(FRAME_SIZE_ENV, "lots")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            config(&[(FAULT_INJECT_ENV, "maybe")]),
            Err(ConfigError::InvalidFlag { .. })
        ));
    }
}
