use bon::Builder;

/// Configuration for the in-memory back-end.
#[derive(Debug, Clone, Builder)]
pub struct StoreConfig {
    /// Buffered (`NeverSync`) points a stream may hold before they are committed regardless.
    #[builder(default = 100_000)]
    pub max_pending_points: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
