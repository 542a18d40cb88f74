use bon::Builder;

/// Default number of items per streaming frame.
pub const DEFAULT_FRAME_SIZE: usize = 5000;

/// Largest number of items per streaming frame.
pub const MAX_FRAME_SIZE: usize = 32_000;

/// Transport message limit for both directions.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Configuration for the gRPC facade.
#[derive(Debug, Clone, Builder)]
pub struct ServiceConfig {
    /// Items per streaming frame, clamped to `[1, 32000]`.
    #[builder(default = DEFAULT_FRAME_SIZE)]
    pub frame_size: usize,

    #[builder(default = false)]
    pub fault_inject_enabled: bool,

    #[builder(default = true)]
    pub obliterate_enabled: bool,

    #[builder(default = DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,

    /// Name this node reports in `Info`.
    #[builder(default = "btrdb0".to_string())]
    pub node_name: String,

    /// gRPC endpoint advertised in `Info`.
    #[builder(default)]
    pub grpc_endpoint: String,

    /// HTTP endpoint advertised in `Info`.
    #[builder(default)]
    pub http_endpoint: String,
}

impl ServiceConfig {
    pub fn frame_size(&self) -> usize {
        self.frame_size.clamp(1, MAX_FRAME_SIZE)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_is_clamped() {
        assert_eq!(ServiceConfig::default().frame_size(), DEFAULT_FRAME_SIZE);
        assert_eq!(ServiceConfig::builder().frame_size(0).build().frame_size(), 1);
        assert_eq!(
            ServiceConfig::builder().frame_size(1_000_000).build().frame_size(),
            MAX_FRAME_SIZE
        );
    }
}
