//! HTTP/JSON transcoder for the `v5api.Btrdb` service.
//!
//! `POST /v5/<op>` with a JSON request body is forwarded as the matching RPC over one shared
//! upstream channel. Unary replies come back as a JSON object, streaming replies as
//! newline-delimited `{"result": ...}` lines.

mod catalog;
mod config;
mod http;
mod response;
mod router;
mod validate;

pub use catalog::OPERATIONS;
pub use config::GatewayConfig;
pub use http::{serve_gateway, start_gateway};
pub use response::{ErrorBody, http_status};
pub use router::Gateway;
pub use validate::Validate;
