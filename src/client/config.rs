use std::time::Duration;

use bon::Builder;

use crate::grpc::config::DEFAULT_MAX_MESSAGE_SIZE;

/// Configuration for the BTrDB client.
#[derive(Debug, Clone, Builder)]
pub struct ClientConfig {
    /// Bound on each endpoint's connect and health probe.
    #[builder(default = Duration::from_secs(2))]
    pub endpoint_timeout: Duration,

    /// Bound on the whole connect race.
    #[builder(default = Duration::from_secs(30))]
    pub connect_deadline: Duration,

    /// Deadline for every call, sent as `grpc-timeout` and enforced locally. Streaming calls
    /// must finish delivering frames within it.
    pub call_timeout: Option<Duration>,

    /// Frames a cursor buffers ahead of its consumer.
    #[builder(default = 16)]
    pub cursor_buffer: usize,

    #[builder(default = DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
