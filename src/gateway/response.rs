//! HTTP renderings of RPC results.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;
use tonic::Code;

/// `{code, message}` error body. `code` is the gRPC code for transport failures and the domain
/// code for errors embedded in a frame.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: u32,
    pub message: String,
}

impl ErrorBody {
    pub fn from_status(status: &tonic::Status) -> Self {
        Self {
            code: status.code() as u32,
            message: status.message().to_string(),
        }
    }
}

/// HTTP status for a gRPC code.
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        // nginx's "client closed request"
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        Code::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
        Code::Aborted => StatusCode::CONFLICT,
        Code::OutOfRange => StatusCode::BAD_REQUEST,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error response for a failed RPC.
pub fn rpc_error(status: &tonic::Status) -> Response {
    (http_status(status.code()), Json(ErrorBody::from_status(status))).into_response()
}

/// Error response for a request rejected before reaching the back-end.
pub fn rejected(code: Code, message: impl Into<String>) -> Response {
    rpc_error(&tonic::Status::new(code, message))
}

/// One line of a streaming response.
#[derive(Debug, Serialize)]
pub struct StreamLine<'a, T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<'a, T: Serialize> StreamLine<'a, T> {
    /// Encode as a newline-terminated JSON line.
    pub fn encode(&self) -> Bytes {
        let mut line = serde_json::to_vec(self).unwrap_or_else(|err| {
            let fallback: StreamLine<'_, ()> = StreamLine {
                result: None,
                error: Some(ErrorBody {
                    code: Code::Internal as u32,
                    message: format!("failed to encode frame: {err}"),
                }),
            };
            serde_json::to_vec(&fallback).unwrap_or_default()
        });
        line.push(b'\n');
        Bytes::from(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_mapping() {
        assert_eq!(http_status(Code::Ok), StatusCode::OK);
        assert_eq!(http_status(Code::Cancelled).as_u16(), 499);
        assert_eq!(http_status(Code::InvalidArgument), StatusCode::BAD_REQUEST);
        assert_eq!(http_status(Code::DeadlineExceeded), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(http_status(Code::Aborted), StatusCode::CONFLICT);
        assert_eq!(http_status(Code::FailedPrecondition), StatusCode::PRECONDITION_FAILED);
        assert_eq!(http_status(Code::Unavailable), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(http_status(Code::DataLoss), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_stream_line_shapes() {
        let value = serde_json::json!({"x": 1});
        let ok = StreamLine {
            result: Some(&value),
            error: None,
        };
        assert_eq!(ok.encode(), Bytes::from_static(b"{\"result\":{\"x\":1}}\n"));

        let failed: StreamLine<'_, ()> = StreamLine {
            result: None,
            error: Some(ErrorBody {
                code: 14,
                message: "down".to_string(),
            }),
        };
        assert_eq!(
            failed.encode(),
            Bytes::from_static(b"{\"error\":{\"code\":14,\"message\":\"down\"}}\n")
        );
    }
}
