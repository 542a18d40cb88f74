//! Wire schema for the `v5api.Btrdb` service.
//!
//! Every message derives both `prost::Message` (binary gRPC encoding) and
//! serde (proto3-style JSON for the HTTP transcoder). Field names are
//! camelCase in JSON, `bytes` fields are base64, absent fields take their
//! proto3 default and unknown fields are rejected.

use std::collections::BTreeMap;

use prost::Message;
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

/// Tag or annotation map with nullable values.
///
/// `Some("")` (present, empty) and `None` (present, null) are distinct, and both
/// differ from an absent key.
pub type OptMap = BTreeMap<String, Option<String>>;

/// Protocol major version reported by `Info`.
pub const PROTOCOL_MAJOR_VERSION: u32 = 5;

/// Protocol minor version reported by `Info`.
pub const PROTOCOL_MINOR_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Shared messages
// ---------------------------------------------------------------------------

/// Embedded result status. Absent means OK.
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Status {
    #[prost(uint32, tag = "1")]
    pub code: u32,
    #[prost(string, tag = "2")]
    pub msg: String,
}

#[derive(Clone, Copy, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct RawPoint {
    #[prost(sfixed64, tag = "1")]
    pub time: i64,
    #[prost(double, tag = "2")]
    pub value: f64,
}

impl RawPoint {
    pub fn new(time: i64, value: f64) -> Self {
        Self { time, value }
    }
}

#[derive(Clone, Copy, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatPoint {
    #[prost(sfixed64, tag = "1")]
    pub time: i64,
    #[prost(double, tag = "2")]
    pub min: f64,
    #[prost(double, tag = "3")]
    pub mean: f64,
    #[prost(double, tag = "4")]
    pub max: f64,
    #[prost(fixed64, tag = "5")]
    pub count: u64,
    #[prost(double, tag = "6")]
    pub stddev: f64,
}

#[derive(Clone, Copy, PartialEq, Eq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangedRange {
    #[prost(sfixed64, tag = "1")]
    pub start: i64,
    #[prost(sfixed64, tag = "2")]
    pub end: i64,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct OptValue {
    #[prost(string, tag = "1")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct KeyOptValue {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(message, optional, tag = "2")]
    pub val: Option<OptValue>,
}

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamDescriptor {
    #[prost(bytes = "vec", tag = "1")]
    #[serde_as(as = "Base64")]
    pub uuid: Vec<u8>,
    #[prost(string, tag = "2")]
    pub collection: String,
    #[prost(message, repeated, tag = "3")]
    pub tags: Vec<KeyOptValue>,
    #[prost(message, repeated, tag = "4")]
    pub annotations: Vec<KeyOptValue>,
    #[prost(uint64, tag = "5")]
    pub property_version: u64,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyCount {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(uint64, tag = "2")]
    pub count: u64,
}

/// Insert durability policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum SyncPolicy {
    /// Commit immediately; visible to the next read.
    Default = 0,
    /// Buffer until the next flush or committed mutation.
    NeverSync = 1,
}

/// Query flavour for `GenerateCSV`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum CsvQueryType {
    AlignedWindows = 0,
    Windows = 1,
    Raw = 2,
}

// ---------------------------------------------------------------------------
// Streaming reads
// ---------------------------------------------------------------------------

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct RawValuesParams {
    #[prost(bytes = "vec", tag = "1")]
    #[serde_as(as = "Base64")]
    pub uuid: Vec<u8>,
    #[prost(sfixed64, tag = "2")]
    pub start: i64,
    #[prost(sfixed64, tag = "3")]
    pub end: i64,
    #[prost(uint64, tag = "4")]
    pub version_major: u64,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawValuesResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(uint64, tag = "2")]
    pub version_major: u64,
    #[prost(uint64, tag = "3")]
    pub version_minor: u64,
    #[prost(message, repeated, tag = "4")]
    pub values: Vec<RawPoint>,
}

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct AlignedWindowsParams {
    #[prost(bytes = "vec", tag = "1")]
    #[serde_as(as = "Base64")]
    pub uuid: Vec<u8>,
    #[prost(sfixed64, tag = "2")]
    pub start: i64,
    #[prost(sfixed64, tag = "3")]
    pub end: i64,
    #[prost(uint64, tag = "4")]
    pub version_major: u64,
    #[prost(uint32, tag = "5")]
    pub point_width: u32,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlignedWindowsResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(uint64, tag = "2")]
    pub version_major: u64,
    #[prost(uint64, tag = "3")]
    pub version_minor: u64,
    #[prost(message, repeated, tag = "4")]
    pub values: Vec<StatPoint>,
}

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct WindowsParams {
    #[prost(bytes = "vec", tag = "1")]
    #[serde_as(as = "Base64")]
    pub uuid: Vec<u8>,
    #[prost(sfixed64, tag = "2")]
    pub start: i64,
    #[prost(sfixed64, tag = "3")]
    pub end: i64,
    #[prost(uint64, tag = "4")]
    pub version_major: u64,
    #[prost(uint64, tag = "5")]
    pub width: u64,
    #[prost(uint32, tag = "6")]
    pub depth: u32,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WindowsResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(uint64, tag = "2")]
    pub version_major: u64,
    #[prost(uint64, tag = "3")]
    pub version_minor: u64,
    #[prost(message, repeated, tag = "4")]
    pub values: Vec<StatPoint>,
}

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ChangesParams {
    #[prost(bytes = "vec", tag = "1")]
    #[serde_as(as = "Base64")]
    pub uuid: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub from_major: u64,
    #[prost(uint64, tag = "3")]
    pub to_major: u64,
    #[prost(uint32, tag = "4")]
    pub resolution: u32,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangesResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(uint64, tag = "2")]
    pub version_major: u64,
    #[prost(uint64, tag = "3")]
    pub version_minor: u64,
    #[prost(message, repeated, tag = "4")]
    pub ranges: Vec<ChangedRange>,
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct StreamInfoParams {
    #[prost(bytes = "vec", tag = "1")]
    #[serde_as(as = "Base64")]
    pub uuid: Vec<u8>,
    #[prost(bool, tag = "2")]
    pub omit_version: bool,
    #[prost(bool, tag = "3")]
    pub omit_descriptor: bool,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamInfoResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(uint64, tag = "2")]
    pub version_major: u64,
    #[prost(uint64, tag = "3")]
    pub version_minor: u64,
    #[prost(message, optional, tag = "4")]
    pub descriptor: Option<StreamDescriptor>,
}

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SetStreamAnnotationsParams {
    #[prost(bytes = "vec", tag = "1")]
    #[serde_as(as = "Base64")]
    pub uuid: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub expected_property_version: u64,
    #[prost(message, repeated, tag = "3")]
    pub changes: Vec<KeyOptValue>,
    #[prost(string, repeated, tag = "4")]
    pub removals: Vec<String>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SetStreamAnnotationsResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(uint64, tag = "2")]
    pub property_version: u64,
}

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SetStreamTagsParams {
    #[prost(bytes = "vec", tag = "1")]
    #[serde_as(as = "Base64")]
    pub uuid: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub expected_property_version: u64,
    #[prost(message, repeated, tag = "3")]
    pub tags: Vec<KeyOptValue>,
    /// New collection; empty keeps the current one.
    #[prost(string, tag = "4")]
    pub collection: String,
    #[prost(string, repeated, tag = "5")]
    pub remove: Vec<String>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SetStreamTagsResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(uint64, tag = "2")]
    pub property_version: u64,
}

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateParams {
    #[prost(bytes = "vec", tag = "1")]
    #[serde_as(as = "Base64")]
    pub uuid: Vec<u8>,
    #[prost(string, tag = "2")]
    pub collection: String,
    #[prost(message, repeated, tag = "3")]
    pub tags: Vec<KeyOptValue>,
    #[prost(message, repeated, tag = "4")]
    pub annotations: Vec<KeyOptValue>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(uint64, tag = "2")]
    pub version_major: u64,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct MetadataUsageParams {
    #[prost(string, tag = "1")]
    pub prefix: String,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetadataUsageResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(message, repeated, tag = "2")]
    pub tags: Vec<KeyCount>,
    #[prost(message, repeated, tag = "3")]
    pub annotations: Vec<KeyCount>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ListCollectionsParams {
    #[prost(string, tag = "1")]
    pub prefix: String,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListCollectionsResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(string, repeated, tag = "2")]
    pub collections: Vec<String>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct LookupStreamsParams {
    #[prost(string, tag = "1")]
    pub collection: String,
    #[prost(bool, tag = "2")]
    pub is_collection_prefix: bool,
    #[prost(message, repeated, tag = "3")]
    pub tags: Vec<KeyOptValue>,
    #[prost(message, repeated, tag = "4")]
    pub annotations: Vec<KeyOptValue>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LookupStreamsResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(message, repeated, tag = "2")]
    pub results: Vec<StreamDescriptor>,
}

// ---------------------------------------------------------------------------
// Point access and mutation
// ---------------------------------------------------------------------------

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct NearestParams {
    #[prost(bytes = "vec", tag = "1")]
    #[serde_as(as = "Base64")]
    pub uuid: Vec<u8>,
    #[prost(sfixed64, tag = "2")]
    pub time: i64,
    #[prost(uint64, tag = "3")]
    pub version_major: u64,
    #[prost(bool, tag = "4")]
    pub backward: bool,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NearestResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(uint64, tag = "2")]
    pub version_major: u64,
    #[prost(uint64, tag = "3")]
    pub version_minor: u64,
    #[prost(message, optional, tag = "4")]
    pub value: Option<RawPoint>,
}

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct InsertParams {
    #[prost(bytes = "vec", tag = "1")]
    #[serde_as(as = "Base64")]
    pub uuid: Vec<u8>,
    #[prost(enumeration = "SyncPolicy", tag = "2")]
    pub sync_policy: i32,
    #[prost(message, repeated, tag = "3")]
    pub values: Vec<RawPoint>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InsertResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(uint64, tag = "2")]
    pub version_major: u64,
    #[prost(uint64, tag = "3")]
    pub version_minor: u64,
}

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct DeleteParams {
    #[prost(bytes = "vec", tag = "1")]
    #[serde_as(as = "Base64")]
    pub uuid: Vec<u8>,
    #[prost(sfixed64, tag = "2")]
    pub start: i64,
    #[prost(sfixed64, tag = "3")]
    pub end: i64,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeleteResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(uint64, tag = "2")]
    pub version_major: u64,
    #[prost(uint64, tag = "3")]
    pub version_minor: u64,
}

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FlushParams {
    #[prost(bytes = "vec", tag = "1")]
    #[serde_as(as = "Base64")]
    pub uuid: Vec<u8>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlushResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(uint64, tag = "2")]
    pub version_major: u64,
    #[prost(uint64, tag = "3")]
    pub version_minor: u64,
}

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ObliterateParams {
    #[prost(bytes = "vec", tag = "1")]
    #[serde_as(as = "Base64")]
    pub uuid: Vec<u8>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObliterateResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct InfoParams {}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Member {
    #[prost(uint32, tag = "1")]
    pub hash: u32,
    #[prost(string, tag = "2")]
    pub nodename: String,
    #[prost(bool, tag = "3")]
    pub up: bool,
    #[prost(bool, tag = "4")]
    pub r#in: bool,
    #[prost(string, tag = "5")]
    pub grpc_endpoints: String,
    #[prost(string, tag = "6")]
    pub http_endpoints: String,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Mash {
    #[prost(int64, tag = "1")]
    pub revision: i64,
    #[prost(string, tag = "2")]
    pub leader: String,
    #[prost(bool, tag = "3")]
    pub healthy: bool,
    #[prost(message, repeated, tag = "4")]
    pub members: Vec<Member>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InfoResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(message, optional, tag = "2")]
    pub mash: Option<Mash>,
    #[prost(uint32, tag = "3")]
    pub major_version: u32,
    #[prost(uint32, tag = "4")]
    pub minor_version: u32,
    #[prost(string, tag = "5")]
    pub build: String,
}

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FaultInjectParams {
    #[prost(uint64, tag = "1")]
    pub r#type: u64,
    #[prost(bytes = "vec", tag = "2")]
    #[serde_as(as = "Base64")]
    pub params: Vec<u8>,
}

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FaultInjectResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(bytes = "vec", tag = "2")]
    #[serde_as(as = "Base64")]
    pub rv: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Export and SQL
// ---------------------------------------------------------------------------

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct StreamCsvConfig {
    #[prost(uint64, tag = "1")]
    pub version: u64,
    #[prost(string, tag = "2")]
    pub label: String,
    #[prost(bytes = "vec", tag = "3")]
    #[serde_as(as = "Base64")]
    pub uuid: Vec<u8>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct GenerateCsvParams {
    #[prost(enumeration = "CsvQueryType", tag = "1")]
    pub query_type: i32,
    #[prost(int64, tag = "2")]
    pub start_time: i64,
    #[prost(int64, tag = "3")]
    pub end_time: i64,
    /// Point width for aligned windows, window width in ns otherwise.
    #[prost(uint64, tag = "4")]
    pub window_size: u64,
    #[prost(uint32, tag = "5")]
    pub depth: u32,
    #[prost(bool, tag = "6")]
    pub include_versions: bool,
    #[prost(message, repeated, tag = "7")]
    pub streams: Vec<StreamCsvConfig>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerateCsvResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    #[prost(bool, tag = "2")]
    pub is_header: bool,
    #[prost(string, repeated, tag = "3")]
    pub row: Vec<String>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SqlQueryParams {
    #[prost(string, tag = "1")]
    pub query: String,
    #[prost(string, repeated, tag = "2")]
    pub params: Vec<String>,
}

#[serde_as]
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SqlQueryResponse {
    #[prost(message, optional, tag = "1")]
    pub stat: Option<Status>,
    /// One JSON-encoded object per row.
    #[prost(bytes = "vec", repeated, tag = "2")]
    #[serde_as(as = "Vec<Base64>")]
    pub sql_query_row: Vec<Vec<u8>>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// A response message with an embedded `stat`.
pub trait Reply: Default {
    fn stat(&self) -> Option<&Status>;

    /// A payload-less response carrying `err`.
    fn failed(err: crate::error::CodedError) -> Self;
}

macro_rules! impl_reply {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Reply for $ty {
                fn stat(&self) -> Option<&Status> {
                    self.stat.as_ref()
                }

                fn failed(err: crate::error::CodedError) -> Self {
                    Self {
                        stat: Some(err.into()),
                        ..Default::default()
                    }
                }
            }
        )*
    };
}

impl_reply!(
    RawValuesResponse,
    AlignedWindowsResponse,
    WindowsResponse,
    ChangesResponse,
    StreamInfoResponse,
    SetStreamAnnotationsResponse,
    SetStreamTagsResponse,
    CreateResponse,
    MetadataUsageResponse,
    ListCollectionsResponse,
    LookupStreamsResponse,
    NearestResponse,
    InsertResponse,
    DeleteResponse,
    FlushResponse,
    ObliterateResponse,
    InfoResponse,
    FaultInjectResponse,
    GenerateCsvResponse,
    SqlQueryResponse,
);

/// Encode a nullable map as wire key/value pairs, preserving `None`.
pub fn map_to_wire(map: &OptMap) -> Vec<KeyOptValue> {
    map.iter()
        .map(|(key, value)| KeyOptValue {
            key: key.clone(),
            val: value.as_ref().map(|value| OptValue {
                value: value.clone(),
            }),
        })
        .collect()
}

/// Decode wire key/value pairs; a later duplicate key wins.
pub fn map_from_wire(pairs: Vec<KeyOptValue>) -> OptMap {
    pairs
        .into_iter()
        .map(|pair| (pair.key, pair.val.map(|v| v.value)))
        .collect()
}

include!(concat!(env!("OUT_DIR"), "/v5api.Btrdb.rs"));
