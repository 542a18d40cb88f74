use thiserror::Error;

use crate::error::{CodedError, ErrorCode};

/// Errors surfaced by the client library.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a domain error.
    #[error("BTrDB error {0}")]
    Domain(#[from] CodedError),

    /// The RPC failed at the gRPC layer.
    #[error("gRPC error: {0}")]
    Rpc(tonic::Status),

    /// Failed to establish a channel.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The call or connect deadline elapsed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A single endpoint did not become healthy within the endpoint timeout.
    #[error("endpoint {0} timed out")]
    EndpointTimeout(String),

    #[error("invalid endpoint {0:?}")]
    InvalidEndpoint(String),

    #[error("no endpoints configured")]
    NoEndpoints,

    /// The cursor's reader task ended without reporting a status.
    #[error("stream reader closed unexpectedly")]
    Closed,
}

impl From<tonic::Status> for ClientError {
    fn from(status: tonic::Status) -> Self {
        match status.code() {
            tonic::Code::DeadlineExceeded => ClientError::DeadlineExceeded,
            _ => ClientError::Rpc(status),
        }
    }
}

impl From<tokio::time::error::Elapsed> for ClientError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ClientError::DeadlineExceeded
    }
}

impl ClientError {
    /// The error as a numeric domain code. Non-domain failures map onto the closest code.
    pub fn coded(&self) -> CodedError {
        let code = match self {
            ClientError::Domain(err) => return err.clone(),
            ClientError::Rpc(status) if status.code() == tonic::Code::Cancelled => {
                ErrorCode::ContextError
            }
            ClientError::DeadlineExceeded => ErrorCode::ContextError,
            ClientError::Rpc(_) | ClientError::Closed => ErrorCode::InternalError,
            ClientError::Transport(_)
            | ClientError::EndpointTimeout(_)
            | ClientError::NoEndpoints => ErrorCode::InsufficientClusterState,
            ClientError::InvalidEndpoint(_) => ErrorCode::WrongArgs,
        };
        CodedError::new(code, self.to_string())
    }

    /// True when this is a domain error with `code`.
    pub fn is(&self, code: ErrorCode) -> bool {
        matches!(self, ClientError::Domain(err) if err.is(code))
    }
}
