use std::net::SocketAddr;

use bon::Builder;

use crate::grpc::config::DEFAULT_MAX_MESSAGE_SIZE;

/// Configuration for the HTTP transcoder.
#[derive(Debug, Clone, Builder)]
pub struct GatewayConfig {
    #[builder(default = SocketAddr::from(([127, 0, 0, 1], 9000)))]
    pub listen: SocketAddr,

    /// Largest accepted request body.
    #[builder(default = DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_body_bytes: usize,

    /// Upstream message limit, matching the facade's.
    #[builder(default = DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
