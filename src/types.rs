use std::fmt;

pub use crate::proto::{ChangedRange, OptMap, RawPoint, StatPoint, SyncPolicy};

/// The data version created with every stream.
pub const BASE_VERSION: u64 = 10;

/// A query version. The wire encodes `Latest` as `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    #[default]
    Latest,
    Specific(u64),
}

impl Version {
    pub fn from_wire(version: u64) -> Self {
        match version {
            0 => Version::Latest,
            v => Version::Specific(v),
        }
    }

    pub fn to_wire(self) -> u64 {
        match self {
            Version::Latest => 0,
            Version::Specific(v) => v,
        }
    }
}

impl From<u64> for Version {
    fn from(version: u64) -> Self {
        Version::from_wire(version)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Latest => f.write_str("latest"),
            Version::Specific(v) => write!(f, "{v}"),
        }
    }
}
