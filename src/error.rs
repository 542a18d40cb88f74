//! Stable domain error codes shared by the service, the transcoder and the client.

use std::fmt;

use crate::proto;

/// Numeric domain error code carried in a frame's `stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    ContextError = 401,
    InsufficientClusterState = 402,
    WrongArgs = 403,
    ClusterDegraded = 404,
    NoSuchStream = 405,
    StreamExists = 406,
    InvalidCollection = 407,
    InvalidTagKey = 408,
    InvalidTagValue = 409,
    InvalidPointWidth = 410,
    InvalidTimeRange = 411,
    NoSuchPoint = 412,
    InvalidVersions = 413,
    AnnotationVersionMismatch = 414,
    FaultInjectionDisabled = 415,
    BadSqlValue = 416,
    ObliterateDisabled = 417,
    SameStream = 418,
    InvalidResolution = 419,
    InternalError = 420,
}

impl ErrorCode {
    const ALL: [ErrorCode; 20] = [
        ErrorCode::ContextError,
        ErrorCode::InsufficientClusterState,
        ErrorCode::WrongArgs,
        ErrorCode::ClusterDegraded,
        ErrorCode::NoSuchStream,
        ErrorCode::StreamExists,
        ErrorCode::InvalidCollection,
        ErrorCode::InvalidTagKey,
        ErrorCode::InvalidTagValue,
        ErrorCode::InvalidPointWidth,
        ErrorCode::InvalidTimeRange,
        ErrorCode::NoSuchPoint,
        ErrorCode::InvalidVersions,
        ErrorCode::AnnotationVersionMismatch,
        ErrorCode::FaultInjectionDisabled,
        ErrorCode::BadSqlValue,
        ErrorCode::ObliterateDisabled,
        ErrorCode::SameStream,
        ErrorCode::InvalidResolution,
        ErrorCode::InternalError,
    ];

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Look up a code by its wire value.
    pub fn from_u32(code: u32) -> Option<ErrorCode> {
        Self::ALL.into_iter().find(|c| c.as_u32() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::ContextError => "ContextError",
            ErrorCode::InsufficientClusterState => "InsufficientClusterState",
            ErrorCode::WrongArgs => "WrongArgs",
            ErrorCode::ClusterDegraded => "ClusterDegraded",
            ErrorCode::NoSuchStream => "NoSuchStream",
            ErrorCode::StreamExists => "StreamExists",
            ErrorCode::InvalidCollection => "InvalidCollection",
            ErrorCode::InvalidTagKey => "InvalidTagKey",
            ErrorCode::InvalidTagValue => "InvalidTagValue",
            ErrorCode::InvalidPointWidth => "InvalidPointWidth",
            ErrorCode::InvalidTimeRange => "InvalidTimeRange",
            ErrorCode::NoSuchPoint => "NoSuchPoint",
            ErrorCode::InvalidVersions => "InvalidVersions",
            ErrorCode::AnnotationVersionMismatch => "AnnotationVersionMismatch",
            ErrorCode::FaultInjectionDisabled => "FaultInjectionDisabled",
            ErrorCode::BadSqlValue => "BadSQLValue",
            ErrorCode::ObliterateDisabled => "ObliterateDisabled",
            ErrorCode::SameStream => "SameStream",
            ErrorCode::InvalidResolution => "InvalidResolution",
            ErrorCode::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u32())
    }
}

/// A domain error with its numeric code preserved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct CodedError {
    pub code: u32,
    pub message: String,
}

impl CodedError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_u32(),
            message: message.into(),
        }
    }

    /// The typed code, if the numeric value is a known one.
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_u32(self.code)
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code.as_u32()
    }
}

impl From<CodedError> for proto::Status {
    fn from(err: CodedError) -> Self {
        proto::Status {
            code: err.code,
            msg: err.message,
        }
    }
}

impl From<proto::Status> for CodedError {
    fn from(stat: proto::Status) -> Self {
        CodedError {
            code: stat.code,
            message: stat.msg,
        }
    }
}

/// `Err` when an embedded status is present with a non-zero code.
pub fn check_stat(stat: Option<&proto::Status>) -> Result<(), CodedError> {
    match stat {
        Some(stat) if stat.code != 0 => Err(CodedError::from(stat.clone())),
        _ => Ok(()),
    }
}
