//! gRPC facade for the `v5api.Btrdb` service.

pub mod config;
pub mod server;
pub mod stats;

pub use config::ServiceConfig;
pub use server::{BtrdbService, serve_listener, start_server};
pub use stats::StreamStats;
