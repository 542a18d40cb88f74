//! Versioned point history for a single stream.
//!
//! The latest version is kept materialized. Older versions are rebuilt on demand from the
//! nearest checkpoint plus the per-commit deltas after it, so history costs one entry per
//! written or removed point instead of one copy of the stream per version.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::error::StoreError;
use crate::types::{BASE_VERSION, ChangedRange, RawPoint, Version};

/// Largest resolution accepted by `changes`.
pub const MAX_RESOLUTION: u32 = 64;

pub type Points = BTreeMap<i64, f64>;

/// An immutable view of a stream at one data version.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: u64,
    pub points: Arc<Points>,
}

/// What one committed data version changed.
#[derive(Debug)]
struct Revision {
    version: u64,
    written: Box<[(i64, f64)]>,
    /// Applied after `written`, so a point buffered and deleted in one commit stays gone.
    removed: Box<[i64]>,
}

impl Revision {
    fn entries(&self) -> usize {
        self.written.len() + self.removed.len()
    }

    fn apply(&self, points: &mut Points) {
        points.extend(self.written.iter().copied());
        for t in self.removed.iter() {
            points.remove(t);
        }
    }

    fn touched(&self) -> impl Iterator<Item = i64> + '_ {
        self.written
            .iter()
            .map(|(t, _)| *t)
            .chain(self.removed.iter().copied())
    }
}

/// A full copy of the stream at `version`.
#[derive(Debug)]
struct Checkpoint {
    version: u64,
    points: Arc<Points>,
}

#[derive(Debug)]
pub struct Series {
    head: Arc<Points>,
    /// `history[i]` produced version `BASE_VERSION + i`.
    history: Vec<Revision>,
    /// Sorted by version; the first one is the empty base version.
    checkpoints: Vec<Checkpoint>,
    /// Delta entries committed since the last checkpoint.
    since_checkpoint: usize,
    pending: Points,
}

impl Series {
    pub fn new() -> Self {
        let head = Arc::new(Points::new());
        Self {
            checkpoints: vec![Checkpoint {
                version: BASE_VERSION,
                points: Arc::clone(&head),
            }],
            head,
            history: vec![Revision {
                version: BASE_VERSION,
                written: Box::new([]),
                removed: Box::new([]),
            }],
            since_checkpoint: 0,
            pending: Points::new(),
        }
    }

    pub fn latest(&self) -> u64 {
        // `history` is never empty.
        self.history[self.history.len() - 1].version
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Resolve a query version: latest for `Latest` or anything past the head, the creation
    /// snapshot for anything before it.
    pub fn resolve(&self, version: Version) -> u64 {
        match version {
            Version::Latest => self.latest(),
            Version::Specific(v) => v.clamp(BASE_VERSION, self.latest()),
        }
    }

    pub fn snapshot(&self, version: Version) -> Snapshot {
        let version = self.resolve(version);
        if version == self.latest() {
            return Snapshot {
                version,
                points: Arc::clone(&self.head),
            };
        }

        // The base checkpoint has the lowest possible version, so the index is at least one.
        let at = self.checkpoints.partition_point(|c| c.version <= version) - 1;
        let checkpoint = &self.checkpoints[at];
        if checkpoint.version == version {
            return Snapshot {
                version,
                points: Arc::clone(&checkpoint.points),
            };
        }

        let mut points = Points::clone(&checkpoint.points);
        let from = (checkpoint.version - BASE_VERSION) as usize + 1;
        let to = (version - BASE_VERSION) as usize;
        for revision in &self.history[from..=to] {
            revision.apply(&mut points);
        }
        Snapshot {
            version,
            points: Arc::new(points),
        }
    }

    /// Apply `points` under `policy` semantics and return the version the caller reports.
    ///
    /// Eager inserts commit together with anything already buffered. Buffered inserts report the
    /// version their commit will produce unless `max_pending` forces the commit now.
    pub fn insert(&mut self, points: &[RawPoint], eager: bool, max_pending: usize) -> u64 {
        for point in points {
            self.pending.insert(point.time, point.value);
        }

        if eager || self.pending.len() > max_pending {
            return self.commit_pending(|_| Vec::new());
        }

        if self.pending.is_empty() {
            self.latest()
        } else {
            self.latest() + 1
        }
    }

    /// Commit buffered points. A flush with nothing pending leaves the version unchanged.
    pub fn flush(&mut self) -> u64 {
        self.commit_pending(|_| Vec::new())
    }

    /// Remove every point in `[start, end)`, committing buffered points in the same version.
    pub fn delete(&mut self, start: i64, end: i64) -> u64 {
        self.commit_pending(|points| {
            let doomed: Vec<i64> = points.range(start..end).map(|(t, _)| *t).collect();
            for t in &doomed {
                points.remove(t);
            }
            doomed
        })
    }

    /// Merge the pending buffer into the head, then let `mutate` make further changes and
    /// report the timestamps it removed. Nothing touched means no new version.
    fn commit_pending(&mut self, mutate: impl FnOnce(&mut Points) -> Vec<i64>) -> u64 {
        let written: Box<[(i64, f64)]> = std::mem::take(&mut self.pending).into_iter().collect();

        // Copies only while a reader or checkpoint still holds the current head.
        let head = Arc::make_mut(&mut self.head);
        head.extend(written.iter().copied());
        let removed = mutate(head);

        if written.is_empty() && removed.is_empty() {
            return self.latest();
        }

        let version = self.latest() + 1;
        let revision = Revision {
            version,
            written,
            removed: removed.into_boxed_slice(),
        };
        self.since_checkpoint += revision.entries();
        self.history.push(revision);

        // Rebuilding any version replays at most as many entries as the stream holds.
        if self.since_checkpoint > self.head.len() {
            self.checkpoints.push(Checkpoint {
                version,
                points: Arc::clone(&self.head),
            });
            self.since_checkpoint = 0;
        }
        version
    }

    /// Ranges touched by commits with versions in `(from, to]`, widened to `2^resolution`
    /// buckets and merged. `to == 0` means latest. Returns the resolved `to` as well.
    pub fn changes(
        &self,
        from: u64,
        to: u64,
        resolution: u32,
    ) -> Result<(u64, Vec<ChangedRange>), StoreError> {
        if resolution > MAX_RESOLUTION {
            return Err(StoreError::InvalidResolution(resolution));
        }
        let to = if to == 0 { self.latest() } else { to.min(self.latest()) };
        if from > to {
            return Err(StoreError::InvalidVersions { from, to });
        }

        let touched: BTreeSet<i64> = self
            .history
            .iter()
            .filter(|rev| rev.version > from && rev.version <= to)
            .flat_map(|rev| rev.touched())
            .collect();

        Ok((to, merge_buckets(touched, resolution)))
    }

    /// Delta and checkpoint entries kept for older versions.
    #[cfg(test)]
    fn retained_entries(&self) -> usize {
        let deltas: usize = self.history.iter().map(Revision::entries).sum();
        let checkpoints: usize = self.checkpoints.iter().map(|c| c.points.len()).sum();
        deltas + checkpoints
    }

    /// Nearest point at or after `time`, or strictly before it when `backward`.
    pub fn nearest(
        &self,
        version: Version,
        time: i64,
        backward: bool,
    ) -> Result<(u64, RawPoint), StoreError> {
        let snapshot = self.snapshot(version);
        let found = if backward {
            snapshot.points.range(..time).next_back()
        } else {
            snapshot.points.range(time..).next()
        };

        found
            .map(|(t, v)| (snapshot.version, RawPoint::new(*t, *v)))
            .ok_or(StoreError::NoSuchPoint {
                direction: if backward { "before" } else { "at or after" },
            })
    }
}

impl Default for Series {
    fn default() -> Self {
        Self::new()
    }
}

/// Widen sorted timestamps to their aligned buckets and coalesce adjacent buckets.
fn merge_buckets(touched: BTreeSet<i64>, resolution: u32) -> Vec<ChangedRange> {
    let width = 1i128 << resolution;
    let mut merged: Vec<(i128, i128)> = Vec::new();

    for t in touched {
        let start = (t as i128).div_euclid(width) * width;
        let end = start + width;
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }

    merged
        .into_iter()
        .map(|(start, end)| ChangedRange {
            start: start.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
            end: end.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(times: &[i64]) -> Vec<RawPoint> {
        times.iter().map(|&t| RawPoint::new(t, t as f64)).collect()
    }

    #[test]
    fn test_new_series_starts_at_base_version() {
        let series = Series::new();
        assert_eq!(series.latest(), BASE_VERSION);
        assert!(series.snapshot(Version::Latest).points.is_empty());
    }

    #[test]
    fn test_eager_insert_commits_once() {
        let mut series = Series::new();
        assert_eq!(series.insert(&points(&[1, 2, 3]), true, 100), 11);
        assert_eq!(series.insert(&[], true, 100), 11);
        assert_eq!(series.snapshot(Version::Latest).points.len(), 3);
    }

    #[test]
    fn test_buffered_insert_waits_for_flush() {
        let mut series = Series::new();

        assert_eq!(series.insert(&points(&[5]), false, 100), 11);
        assert_eq!(series.latest(), 10);
        assert!(series.snapshot(Version::Latest).points.is_empty());

        assert_eq!(series.flush(), 11);
        assert_eq!(series.flush(), 11);
        assert_eq!(series.snapshot(Version::Latest).points.len(), 1);
    }

    #[test]
    fn test_buffer_overflow_commits() {
        let mut series = Series::new();
        series.insert(&points(&[1, 2]), false, 2);
        assert_eq!(series.latest(), 10);
        assert_eq!(series.insert(&points(&[3]), false, 2), 11);
        assert_eq!(series.pending_len(), 0);
    }

    #[test]
    fn test_delete_only_bumps_when_points_removed() {
        let mut series = Series::new();
        series.insert(&points(&[1, 2, 3, 4]), true, 100);

        assert_eq!(series.delete(100, 200), 11);
        assert_eq!(series.delete(2, 4), 12);

        let snapshot = series.snapshot(Version::Latest);
        assert_eq!(snapshot.points.keys().copied().collect::<Vec<_>>(), [1, 4]);
    }

    #[test]
    fn test_old_snapshots_are_immutable() {
        let mut series = Series::new();
        series.insert(&points(&[1]), true, 100);
        let before = series.snapshot(Version::Latest);
        series.insert(&points(&[2]), true, 100);

        assert_eq!(before.points.len(), 1);
        assert_eq!(series.snapshot(Version::Specific(11)).points.len(), 1);
        assert_eq!(series.snapshot(Version::Specific(3)).version, BASE_VERSION);
        assert_eq!(series.snapshot(Version::Specific(99)).version, 12);
    }

    #[test]
    fn test_changes_between_versions() {
        let mut series = Series::new();
        series.insert(&points(&[0, 1, 100]), true, 100);
        series.insert(&points(&[1000]), true, 100);

        let (to, ranges) = series.changes(10, 0, 4).unwrap();
        assert_eq!(to, 12);
        assert_eq!(
            ranges,
            [
                ChangedRange { start: 0, end: 16 },
                ChangedRange { start: 96, end: 112 },
                ChangedRange { start: 992, end: 1008 },
            ]
        );

        let (_, only_second) = series.changes(11, 12, 0).unwrap();
        assert_eq!(only_second, [ChangedRange { start: 1000, end: 1001 }]);

        assert!(series.changes(12, 12, 0).unwrap().1.is_empty());
    }

    #[test]
    fn test_changes_rejects_bad_arguments() {
        let mut series = Series::new();
        series.insert(&points(&[1]), true, 100);

        assert!(matches!(
            series.changes(11, 10, 0),
            Err(StoreError::InvalidVersions { .. })
        ));
        assert!(matches!(
            series.changes(10, 0, 65),
            Err(StoreError::InvalidResolution(65))
        ));
    }

    #[test]
    fn test_changes_full_resolution_clamps() {
        let mut series = Series::new();
        series.insert(&points(&[-5, 5]), true, 100);

        let (_, ranges) = series.changes(10, 0, 64).unwrap();
        assert_eq!(
            ranges,
            [ChangedRange {
                start: i64::MIN,
                end: i64::MAX
            }]
        );
    }

    #[test]
    fn test_nearest_direction() {
        let mut series = Series::new();
        series.insert(&points(&[10, 20]), true, 100);

        assert_eq!(series.nearest(Version::Latest, 10, false).unwrap().1.time, 10);
        assert_eq!(series.nearest(Version::Latest, 20, true).unwrap().1.time, 10);
        assert!(series.nearest(Version::Latest, 10, true).is_err());
        assert!(series.nearest(Version::Latest, 21, false).is_err());
    }

    #[test]
    fn test_history_grows_with_deltas_not_copies() {
        let mut series = Series::new();
        series.insert(&points(&(0..10_000).collect::<Vec<_>>()), true, 100_000);
        for t in 10_000..10_500 {
            series.insert(&points(&[t]), true, 100_000);
        }

        let live = series.snapshot(Version::Latest).points.len();
        assert_eq!(live, 10_500);
        assert_eq!(series.latest(), BASE_VERSION + 501);
        assert!(series.retained_entries() <= live * 2);

        let first = series.snapshot(Version::Specific(11));
        assert_eq!(first.points.len(), 10_000);
        assert_eq!(first.points.last_key_value(), Some((&9_999, &9_999.0)));
        let middle = series.snapshot(Version::Specific(261));
        assert_eq!(middle.points.len(), 10_250);
        assert_eq!(middle.points.last_key_value(), Some((&10_249, &10_249.0)));
    }

    #[test]
    fn test_every_version_rebuilds_exactly() {
        let mut series = Series::new();
        let mut expected = vec![Points::new()];

        for round in 0..40i64 {
            let base = round * 7;
            series.insert(
                &(base..base + 20)
                    .map(|t| RawPoint::new(t, (t * round) as f64))
                    .collect::<Vec<_>>(),
                true,
                1000,
            );
            let mut model = expected[expected.len() - 1].clone();
            model.extend((base..base + 20).map(|t| (t, (t * round) as f64)));
            expected.push(model);

            if round % 3 == 0 {
                series.insert(&points(&[base + 1000]), false, 1000);
                series.delete(base, base + 10);
                let mut model = expected[expected.len() - 1].clone();
                model.insert(base + 1000, (base + 1000) as f64);
                model.retain(|t, _| !(base..base + 10).contains(t));
                expected.push(model);
            }
        }

        assert_eq!(series.latest(), BASE_VERSION + expected.len() as u64 - 1);
        assert!(series.checkpoints.len() > 1);
        for (i, model) in expected.iter().enumerate() {
            let snapshot = series.snapshot(Version::Specific(BASE_VERSION + i as u64));
            assert_eq!(*snapshot.points, *model, "version {}", snapshot.version);
        }
    }

    #[test]
    fn test_held_snapshot_survives_commits() {
        let mut series = Series::new();
        series.insert(&points(&[1, 2, 3]), true, 100);
        let held = series.snapshot(Version::Latest);

        series.delete(0, 10);
        series.insert(&points(&[4]), true, 100);

        assert_eq!(held.points.keys().copied().collect::<Vec<_>>(), [1, 2, 3]);
        assert_eq!(series.snapshot(Version::Specific(12)).points.len(), 0);
        assert_eq!(series.snapshot(Version::Latest).points.len(), 1);
    }
}
