use uuid::Uuid;

use super::btrdb::Btrdb;
use super::cursor::Cursor;
use super::error::ClientError;
use crate::error::ErrorCode;
use crate::proto::{self, map_from_wire, map_to_wire};
use crate::types::{ChangedRange, OptMap, RawPoint, StatPoint, SyncPolicy, Version};

/// Metadata of a stream as reported by `StreamInfo`.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub collection: String,
    pub tags: OptMap,
    pub annotations: OptMap,
    pub property_version: u64,
    pub version: u64,
}

/// A handle to one stream.
#[derive(Debug, Clone)]
pub struct Stream {
    db: Btrdb,
    uuid: Uuid,
}

impl Stream {
    pub(crate) fn new(db: Btrdb, uuid: Uuid) -> Self {
        Self { db, uuid }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn uuid_bytes(&self) -> Vec<u8> {
        self.uuid.as_bytes().to_vec()
    }

    /// Whether the stream exists.
    pub async fn exists(&self) -> Result<bool, ClientError> {
        match self.info().await {
            Ok(_) => Ok(true),
            Err(err) if err.is(ErrorCode::NoSuchStream) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn info(&self) -> Result<StreamInfo, ClientError> {
        let mut grpc = self.db.grpc();
        let response = self
            .db
            .unary(grpc.stream_info(self.db.request(proto::StreamInfoParams {
                uuid: self.uuid_bytes(),
                omit_version: false,
                omit_descriptor: false,
            })))
            .await?;
        let descriptor = response.descriptor.unwrap_or_default();
        Ok(StreamInfo {
            collection: descriptor.collection,
            tags: map_from_wire(descriptor.tags),
            annotations: map_from_wire(descriptor.annotations),
            property_version: descriptor.property_version,
            version: response.version_major,
        })
    }

    /// Latest committed data version.
    pub async fn version(&self) -> Result<u64, ClientError> {
        let mut grpc = self.db.grpc();
        let response = self
            .db
            .unary(grpc.stream_info(self.db.request(proto::StreamInfoParams {
                uuid: self.uuid_bytes(),
                omit_version: false,
                omit_descriptor: true,
            })))
            .await?;
        Ok(response.version_major)
    }

    pub async fn collection(&self) -> Result<String, ClientError> {
        Ok(self.info().await?.collection)
    }

    pub async fn tags(&self) -> Result<OptMap, ClientError> {
        Ok(self.info().await?.tags)
    }

    /// Annotations together with the property version they were read at.
    pub async fn annotations(&self) -> Result<(OptMap, u64), ClientError> {
        let info = self.info().await?;
        Ok((info.annotations, info.property_version))
    }

    /// Replace or add `changes` and drop `removals`, provided the property version is still
    /// `expected`. Returns the new property version.
    pub async fn compare_and_set_annotations(
        &self,
        expected: u64,
        changes: &OptMap,
        removals: &[String],
    ) -> Result<u64, ClientError> {
        let mut grpc = self.db.grpc();
        let response = self
            .db
            .unary(grpc.set_stream_annotations(self.db.request(
                proto::SetStreamAnnotationsParams {
                    uuid: self.uuid_bytes(),
                    expected_property_version: expected,
                    changes: map_to_wire(changes),
                    removals: removals.to_vec(),
                },
            )))
            .await?;
        Ok(response.property_version)
    }

    /// Change tags, and optionally the collection, under the same optimistic check.
    pub async fn compare_and_set_tags(
        &self,
        expected: u64,
        collection: Option<&str>,
        changes: &OptMap,
        removals: &[String],
    ) -> Result<u64, ClientError> {
        let mut grpc = self.db.grpc();
        let response = self
            .db
            .unary(grpc.set_stream_tags(self.db.request(proto::SetStreamTagsParams {
                uuid: self.uuid_bytes(),
                expected_property_version: expected,
                tags: map_to_wire(changes),
                collection: collection.unwrap_or_default().to_string(),
                remove: removals.to_vec(),
            })))
            .await?;
        Ok(response.property_version)
    }

    /// Insert and commit immediately.
    pub async fn insert(&self, points: &[RawPoint]) -> Result<u64, ClientError> {
        self.insert_with(SyncPolicy::Default, points).await
    }

    pub async fn insert_with(
        &self,
        policy: SyncPolicy,
        points: &[RawPoint],
    ) -> Result<u64, ClientError> {
        let mut grpc = self.db.grpc();
        let response = self
            .db
            .unary(grpc.insert(self.db.request(proto::InsertParams {
                uuid: self.uuid_bytes(),
                sync_policy: policy as i32,
                values: points.to_vec(),
            })))
            .await?;
        Ok(response.version_major)
    }

    /// Delete `[start, end)`.
    pub async fn delete(&self, start: i64, end: i64) -> Result<u64, ClientError> {
        let mut grpc = self.db.grpc();
        let response = self
            .db
            .unary(grpc.delete(self.db.request(proto::DeleteParams {
                uuid: self.uuid_bytes(),
                start,
                end,
            })))
            .await?;
        Ok(response.version_major)
    }

    pub async fn flush(&self) -> Result<u64, ClientError> {
        let mut grpc = self.db.grpc();
        let response = self
            .db
            .unary(grpc.flush(self.db.request(proto::FlushParams {
                uuid: self.uuid_bytes(),
            })))
            .await?;
        Ok(response.version_major)
    }

    /// Irreversibly remove the stream.
    pub async fn obliterate(&self) -> Result<(), ClientError> {
        let mut grpc = self.db.grpc();
        self.db
            .unary(grpc.obliterate(self.db.request(proto::ObliterateParams {
                uuid: self.uuid_bytes(),
            })))
            .await?;
        Ok(())
    }

    /// The first point at or after `time`, or the last one before it when `backward`.
    pub async fn nearest(
        &self,
        time: i64,
        version: Version,
        backward: bool,
    ) -> Result<(RawPoint, u64), ClientError> {
        let mut grpc = self.db.grpc();
        let response = self
            .db
            .unary(grpc.nearest(self.db.request(proto::NearestParams {
                uuid: self.uuid_bytes(),
                time,
                version_major: version.to_wire(),
                backward,
            })))
            .await?;
        Ok((response.value.unwrap_or_default(), response.version_major))
    }

    /// Points in `[start, end)`.
    pub async fn raw_values(
        &self,
        start: i64,
        end: i64,
        version: Version,
    ) -> Result<Cursor<RawPoint>, ClientError> {
        let mut grpc = self.db.grpc();
        self.db
            .streaming(grpc.raw_values(self.db.request(proto::RawValuesParams {
                uuid: self.uuid_bytes(),
                start,
                end,
                version_major: version.to_wire(),
            })))
            .await
    }

    /// Statistics over `[t, t + 2^point_width)` windows.
    pub async fn aligned_windows(
        &self,
        start: i64,
        end: i64,
        point_width: u32,
        version: Version,
    ) -> Result<Cursor<StatPoint>, ClientError> {
        let mut grpc = self.db.grpc();
        self.db
            .streaming(grpc.aligned_windows(self.db.request(proto::AlignedWindowsParams {
                uuid: self.uuid_bytes(),
                start,
                end,
                version_major: version.to_wire(),
                point_width,
            })))
            .await
    }

    /// Statistics over `width` windows tiling `[start, end)` from `start`.
    pub async fn windows(
        &self,
        start: i64,
        end: i64,
        width: u64,
        depth: u32,
        version: Version,
    ) -> Result<Cursor<StatPoint>, ClientError> {
        let mut grpc = self.db.grpc();
        self.db
            .streaming(grpc.windows(self.db.request(proto::WindowsParams {
                uuid: self.uuid_bytes(),
                start,
                end,
                version_major: version.to_wire(),
                width,
                depth,
            })))
            .await
    }

    /// Time ranges changed between versions `from` and `to`. `Version::Latest` for `to` means
    /// the current head.
    pub async fn changes(
        &self,
        from: u64,
        to: Version,
        resolution: u32,
    ) -> Result<Cursor<ChangedRange>, ClientError> {
        let mut grpc = self.db.grpc();
        self.db
            .streaming(grpc.changes(self.db.request(proto::ChangesParams {
                uuid: self.uuid_bytes(),
                from_major: from,
                to_major: to.to_wire(),
                resolution,
            })))
            .await
    }
}
