//! In-memory reference back-end.
//!
//! Holds stream metadata in a [`Catalog`] and per-stream versioned points in a [`StreamMap`] of
//! [`Series`]. Every committed mutation creates a new readable version, and readers resolve a
//! version once into an immutable snapshot that never observes later writes.

use std::sync::Mutex;

use tracing::{debug, info};
use uuid::Uuid;

pub use self::aggregate::{MAX_POINT_WIDTH, MAX_WINDOW_DEPTH, WindowIter, Windowing};
pub use self::catalog::{LookupFilter, MetadataUsage, StreamMeta};
pub use self::config::StoreConfig;
pub use self::error::StoreError;
pub use self::series::{MAX_RESOLUTION, Snapshot};
pub use self::stream_map::{StreamMap, StreamRef};

use self::catalog::Catalog;
use self::series::Series;
use crate::types::{BASE_VERSION, ChangedRange, OptMap, RawPoint, SyncPolicy, Version};

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod error;
pub mod series;
pub mod stream_map;

/// Per-stream state tracked in the [`StreamMap`].
#[derive(Debug, Default)]
pub struct StreamContext {
    series: Mutex<Series>,
}

#[derive(Debug)]
pub struct Store {
    catalog: Mutex<Catalog>,
    streams: StreamMap<StreamContext>,
    config: StoreConfig,
}

impl Store {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            catalog: Mutex::new(Catalog::new()),
            streams: StreamMap::new(),
            config,
        }
    }

    fn catalog(&self) -> std::sync::MutexGuard<'_, Catalog> {
        self.catalog.lock().expect("catalog lock poisoned")
    }

    /// Run `f` against the series of a live stream.
    fn with_series<R>(&self, uuid: &Uuid, f: impl FnOnce(&mut Series) -> R) -> Result<R, StoreError> {
        let stream_ref = self.streams.get(uuid)?;
        let result = stream_ref.view(|context| {
            let mut series = context.series.lock().expect("series lock poisoned");
            f(&mut series)
        })?;
        Ok(result)
    }

    pub fn create(
        &self,
        uuid: Uuid,
        collection: String,
        tags: OptMap,
        annotations: OptMap,
    ) -> Result<u64, StoreError> {
        let mut catalog = self.catalog();
        let meta = catalog.create(uuid, collection, tags, annotations)?;
        info!(uuid = %uuid, collection = %meta.collection, "Stream created");
        self.streams.insert(uuid, StreamContext::default())?;
        Ok(BASE_VERSION)
    }

    /// Metadata and latest data version of a stream.
    pub fn stream_info(&self, uuid: &Uuid) -> Result<(StreamMeta, u64), StoreError> {
        let meta = self
            .catalog()
            .get(uuid)
            .cloned()
            .ok_or(error::StreamNotFound { uuid: *uuid })?;
        let version = self.with_series(uuid, |series| series.latest())?;
        Ok((meta, version))
    }

    pub fn set_tags(
        &self,
        uuid: &Uuid,
        expected_property_version: u64,
        collection: &str,
        changes: OptMap,
        removals: &[String],
    ) -> Result<u64, StoreError> {
        let version =
            self.catalog()
                .set_tags(uuid, expected_property_version, collection, changes, removals)?;
        debug!(uuid = %uuid, property_version = version, "Tags updated");
        Ok(version)
    }

    pub fn set_annotations(
        &self,
        uuid: &Uuid,
        expected_property_version: u64,
        changes: OptMap,
        removals: &[String],
    ) -> Result<u64, StoreError> {
        let version = self
            .catalog()
            .set_annotations(uuid, expected_property_version, changes, removals)?;
        debug!(uuid = %uuid, property_version = version, "Annotations updated");
        Ok(version)
    }

    pub fn insert(
        &self,
        uuid: &Uuid,
        policy: SyncPolicy,
        points: &[RawPoint],
    ) -> Result<u64, StoreError> {
        let eager = policy == SyncPolicy::Default;
        let max_pending = self.config.max_pending_points;
        let version = self.with_series(uuid, |series| series.insert(points, eager, max_pending))?;
        debug!(uuid = %uuid, points = points.len(), ?policy, version, "Insert applied");
        Ok(version)
    }

    /// Delete `[start, end)`.
    pub fn delete(&self, uuid: &Uuid, start: i64, end: i64) -> Result<u64, StoreError> {
        check_range(start, end)?;
        let version = self.with_series(uuid, |series| series.delete(start, end))?;
        debug!(uuid = %uuid, start, end, version, "Delete applied");
        Ok(version)
    }

    pub fn flush(&self, uuid: &Uuid) -> Result<u64, StoreError> {
        self.with_series(uuid, |series| series.flush())
    }

    /// Remove the stream and everything in it. The uuid can never be used again.
    pub fn obliterate(&self, uuid: &Uuid) -> Result<(), StoreError> {
        let mut catalog = self.catalog();
        let meta = catalog.retire(uuid)?;
        self.streams.remove(uuid)?;
        info!(uuid = %uuid, collection = %meta.collection, "Stream obliterated");
        Ok(())
    }

    pub fn snapshot(&self, uuid: &Uuid, version: Version) -> Result<Snapshot, StoreError> {
        self.with_series(uuid, |series| series.snapshot(version))
    }

    pub fn nearest(
        &self,
        uuid: &Uuid,
        version: Version,
        time: i64,
        backward: bool,
    ) -> Result<(u64, RawPoint), StoreError> {
        self.with_series(uuid, |series| series.nearest(version, time, backward))?
    }

    pub fn changes(
        &self,
        uuid: &Uuid,
        from: u64,
        to: u64,
        resolution: u32,
    ) -> Result<(u64, Vec<ChangedRange>), StoreError> {
        self.with_series(uuid, |series| series.changes(from, to, resolution))?
    }

    pub fn collections(&self, prefix: &str) -> Vec<String> {
        self.catalog().collections(prefix)
    }

    pub fn lookup(&self, filter: &LookupFilter) -> Vec<StreamMeta> {
        self.catalog().lookup(filter)
    }

    pub fn metadata_usage(&self, prefix: &str) -> MetadataUsage {
        self.catalog().metadata_usage(prefix)
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

/// Ranged requests require `start < end`.
pub fn check_range(start: i64, end: i64) -> Result<(), StoreError> {
    if end <= start {
        return Err(StoreError::InvalidTimeRange { start, end });
    }
    Ok(())
}

pub fn check_point_width(point_width: u32) -> Result<(), StoreError> {
    if point_width > MAX_POINT_WIDTH {
        return Err(StoreError::InvalidPointWidth(point_width));
    }
    Ok(())
}

pub fn check_window(width: u64, depth: u32) -> Result<(), StoreError> {
    if width == 0 {
        return Err(StoreError::WrongArgs("window width must be positive".to_string()));
    }
    if depth > MAX_WINDOW_DEPTH {
        return Err(StoreError::InvalidPointWidth(depth));
    }
    Ok(())
}
