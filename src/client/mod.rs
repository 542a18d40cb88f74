//! Client library for the `v5api.Btrdb` service.
//!
//! [`Btrdb::connect`] races every endpoint and keeps the first healthy channel. Streaming
//! calls return a [`Cursor`] whose items and terminal status are read separately.

mod btrdb;
mod config;
mod connect;
mod cursor;
mod error;
mod stream;

pub use btrdb::Btrdb;
pub use config::ClientConfig;
pub use connect::{ENDPOINTS_ENV, endpoints_from_env, parse_endpoints};
pub use cursor::{CsvRow, Cursor, ResponseFrame};
pub use error::ClientError;
pub use stream::{Stream, StreamInfo};
