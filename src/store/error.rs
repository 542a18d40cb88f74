use uuid::Uuid;

use crate::error::{CodedError, ErrorCode};

/// Indicates that a stream could not be registered because the uuid is already tracked.
#[derive(Debug, thiserror::Error)]
#[error("the stream {uuid} is already present")]
pub struct StreamAlreadyPresent {
    pub uuid: Uuid,
}

/// Indicates that an operation failed because the stream is not tracked.
#[derive(Debug, thiserror::Error)]
#[error("the stream {uuid} could not be found")]
pub struct StreamNotFound {
    pub uuid: Uuid,
}

/// Indicates that a weakly held stream was obliterated while the reference was outstanding.
#[derive(Debug, thiserror::Error)]
#[error("the stream {uuid} is no longer valid")]
pub struct StreamViewInvalid {
    pub uuid: Uuid,
}

/// Errors raised by the in-memory back-end.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    NotFound(#[from] StreamNotFound),

    #[error(transparent)]
    ViewInvalid(#[from] StreamViewInvalid),

    #[error(transparent)]
    AlreadyPresent(#[from] StreamAlreadyPresent),

    #[error("uuid {uuid} has already been used by a stream")]
    SameStream { uuid: Uuid },

    #[error("a stream with the same tags already exists in collection {collection:?}")]
    StreamExists { collection: String },

    #[error("invalid collection {0:?}")]
    InvalidCollection(String),

    #[error("invalid tag key {0:?}")]
    InvalidTagKey(String),

    #[error("invalid tag value for key {0:?}")]
    InvalidTagValue(String),

    #[error("invalid point width {0}")]
    InvalidPointWidth(u32),

    #[error("invalid time range [{start}, {end})")]
    InvalidTimeRange { start: i64, end: i64 },

    #[error("no point {direction} the given time")]
    NoSuchPoint { direction: &'static str },

    #[error("invalid version range from {from} to {to}")]
    InvalidVersions { from: u64, to: u64 },

    #[error("property version mismatch: expected {expected}, current {current}")]
    PropertyVersionMismatch { expected: u64, current: u64 },

    #[error("invalid resolution {0}")]
    InvalidResolution(u32),

    #[error("{0}")]
    WrongArgs(String),
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::NotFound(_) | StoreError::ViewInvalid(_) => ErrorCode::NoSuchStream,
            StoreError::AlreadyPresent(_) | StoreError::SameStream { .. } => ErrorCode::SameStream,
            StoreError::StreamExists { .. } => ErrorCode::StreamExists,
            StoreError::InvalidCollection(_) => ErrorCode::InvalidCollection,
            StoreError::InvalidTagKey(_) => ErrorCode::InvalidTagKey,
            StoreError::InvalidTagValue(_) => ErrorCode::InvalidTagValue,
            StoreError::InvalidPointWidth(_) => ErrorCode::InvalidPointWidth,
            StoreError::InvalidTimeRange { .. } => ErrorCode::InvalidTimeRange,
            StoreError::NoSuchPoint { .. } => ErrorCode::NoSuchPoint,
            StoreError::InvalidVersions { .. } => ErrorCode::InvalidVersions,
            StoreError::PropertyVersionMismatch { .. } => ErrorCode::AnnotationVersionMismatch,
            StoreError::InvalidResolution(_) => ErrorCode::InvalidResolution,
            StoreError::WrongArgs(_) => ErrorCode::WrongArgs,
        }
    }
}

impl From<StoreError> for CodedError {
    fn from(err: StoreError) -> Self {
        CodedError::new(err.code(), err.to_string())
    }
}
