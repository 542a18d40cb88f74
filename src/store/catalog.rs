//! Stream metadata: collections, tags, annotations and identity uniqueness.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use uuid::Uuid;

use super::error::{StoreError, StreamNotFound};
use crate::types::OptMap;

const MAX_COLLECTION_LEN: usize = 255;
const MAX_KEY_LEN: usize = 64;
const MAX_TAG_VALUE_LEN: usize = 255;

/// Metadata of a live stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMeta {
    pub uuid: Uuid,
    pub collection: String,
    pub tags: OptMap,
    pub annotations: OptMap,
    pub property_version: u64,
}

/// `(collection, tags)` identifies at most one live stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Identity {
    collection: String,
    tags: OptMap,
}

impl Identity {
    fn of(meta: &StreamMeta) -> Self {
        Self {
            collection: meta.collection.clone(),
            tags: meta.tags.clone(),
        }
    }
}

/// Filter for `lookup`.
#[derive(Debug, Clone, Default)]
pub struct LookupFilter {
    pub collection: String,
    pub is_prefix: bool,
    /// `None` values match any value, including null, as long as the key is present.
    pub tags: OptMap,
    pub annotations: OptMap,
}

impl LookupFilter {
    fn matches(&self, meta: &StreamMeta) -> bool {
        let collection_ok = if self.is_prefix {
            meta.collection.starts_with(&self.collection)
        } else {
            meta.collection == self.collection
        };
        collection_ok && map_matches(&self.tags, &meta.tags)
            && map_matches(&self.annotations, &meta.annotations)
    }
}

fn map_matches(filter: &OptMap, map: &OptMap) -> bool {
    filter.iter().all(|(key, wanted)| match (wanted, map.get(key)) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(wanted), Some(actual)) => actual.as_deref() == Some(wanted.as_str()),
    })
}

/// Key usage counts under a collection prefix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataUsage {
    pub tags: BTreeMap<String, u64>,
    pub annotations: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
pub struct Catalog {
    streams: HashMap<Uuid, StreamMeta>,
    identities: HashMap<Identity, Uuid>,
    retired: HashSet<Uuid>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uuid: &Uuid) -> Option<&StreamMeta> {
        self.streams.get(uuid)
    }

    pub fn create(
        &mut self,
        uuid: Uuid,
        collection: String,
        tags: OptMap,
        annotations: OptMap,
    ) -> Result<&StreamMeta, StoreError> {
        if self.streams.contains_key(&uuid) || self.retired.contains(&uuid) {
            return Err(StoreError::SameStream { uuid });
        }
        validate_collection(&collection)?;
        validate_tags(&tags)?;
        validate_annotations(&annotations)?;

        let meta = StreamMeta {
            uuid,
            collection,
            tags,
            annotations,
            property_version: 1,
        };
        let identity = Identity::of(&meta);
        if self.identities.contains_key(&identity) {
            return Err(StoreError::StreamExists {
                collection: meta.collection,
            });
        }

        self.identities.insert(identity, uuid);
        Ok(self.streams.entry(uuid).or_insert(meta))
    }

    /// Apply tag changes under optimistic concurrency; an empty `collection` keeps the current one.
    /// A request that leaves tags and collection as they were keeps the property version.
    pub fn set_tags(
        &mut self,
        uuid: &Uuid,
        expected: u64,
        collection: &str,
        changes: OptMap,
        removals: &[String],
    ) -> Result<u64, StoreError> {
        let current = self.checked(uuid, expected)?;
        if !collection.is_empty() {
            validate_collection(collection)?;
        }
        validate_tags(&changes)?;
        for key in removals {
            validate_key(key)?;
        }

        let mut next = current.clone();
        if !collection.is_empty() {
            next.collection = collection.to_string();
        }
        for key in removals {
            next.tags.remove(key);
        }
        next.tags.extend(changes);

        if next.tags == current.tags && next.collection == current.collection {
            return Ok(current.property_version);
        }

        let old_identity = Identity::of(current);
        let new_identity = Identity::of(&next);
        if new_identity != old_identity && self.identities.contains_key(&new_identity) {
            return Err(StoreError::StreamExists {
                collection: next.collection,
            });
        }

        next.property_version += 1;
        let version = next.property_version;
        self.identities.remove(&old_identity);
        self.identities.insert(new_identity, *uuid);
        self.streams.insert(*uuid, next);
        Ok(version)
    }

    pub fn set_annotations(
        &mut self,
        uuid: &Uuid,
        expected: u64,
        changes: OptMap,
        removals: &[String],
    ) -> Result<u64, StoreError> {
        self.checked(uuid, expected)?;
        validate_annotations(&changes)?;
        for key in removals {
            validate_key(key)?;
        }

        let meta = self
            .streams
            .get_mut(uuid)
            .ok_or(StoreError::NotFound(StreamNotFound { uuid: *uuid }))?;
        let mut next = meta.annotations.clone();
        for key in removals {
            next.remove(key);
        }
        next.extend(changes);
        if next == meta.annotations {
            return Ok(meta.property_version);
        }

        meta.annotations = next;
        meta.property_version += 1;
        Ok(meta.property_version)
    }

    /// Drop the stream and retire its uuid forever.
    pub fn retire(&mut self, uuid: &Uuid) -> Result<StreamMeta, StoreError> {
        let meta = self
            .streams
            .remove(uuid)
            .ok_or(StoreError::NotFound(StreamNotFound { uuid: *uuid }))?;
        self.identities.remove(&Identity::of(&meta));
        self.retired.insert(*uuid);
        Ok(meta)
    }

    /// Distinct collections starting with `prefix`, sorted.
    pub fn collections(&self, prefix: &str) -> Vec<String> {
        self.streams
            .values()
            .filter(|meta| meta.collection.starts_with(prefix))
            .map(|meta| meta.collection.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Matching streams ordered by collection, then uuid.
    pub fn lookup(&self, filter: &LookupFilter) -> Vec<StreamMeta> {
        let mut found: Vec<StreamMeta> = self
            .streams
            .values()
            .filter(|meta| filter.matches(meta))
            .cloned()
            .collect();
        found.sort_by(|a, b| (&a.collection, a.uuid).cmp(&(&b.collection, b.uuid)));
        found
    }

    pub fn metadata_usage(&self, prefix: &str) -> MetadataUsage {
        let mut usage = MetadataUsage::default();
        for meta in self.streams.values().filter(|m| m.collection.starts_with(prefix)) {
            for key in meta.tags.keys() {
                *usage.tags.entry(key.clone()).or_default() += 1;
            }
            for key in meta.annotations.keys() {
                *usage.annotations.entry(key.clone()).or_default() += 1;
            }
        }
        usage
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    fn checked(&self, uuid: &Uuid, expected: u64) -> Result<&StreamMeta, StoreError> {
        let meta = self
            .streams
            .get(uuid)
            .ok_or(StoreError::NotFound(StreamNotFound { uuid: *uuid }))?;
        if meta.property_version != expected {
            return Err(StoreError::PropertyVersionMismatch {
                expected,
                current: meta.property_version,
            });
        }
        Ok(meta)
    }
}

pub fn validate_collection(collection: &str) -> Result<(), StoreError> {
    let valid = !collection.is_empty()
        && collection.len() <= MAX_COLLECTION_LEN
        && !collection.chars().any(|c| c.is_control() || c.is_whitespace());
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(collection.to_string()))
    }
}

pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidTagKey(key.to_string()))
    }
}

fn validate_tags(tags: &OptMap) -> Result<(), StoreError> {
    for (key, value) in tags {
        validate_key(key)?;
        if value.as_ref().is_some_and(|v| v.len() > MAX_TAG_VALUE_LEN) {
            return Err(StoreError::InvalidTagValue(key.clone()));
        }
    }
    Ok(())
}

fn validate_annotations(annotations: &OptMap) -> Result<(), StoreError> {
    annotations.keys().try_for_each(|key| validate_key(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, Option<&str>)]) -> OptMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn test_identity_is_unique_per_collection() {
        let mut catalog = Catalog::new();
        let t = tags(&[("name", Some("a"))]);

        catalog.create(Uuid::new_v4(), "c/x".into(), t.clone(), OptMap::new()).unwrap();
        let err = catalog
            .create(Uuid::new_v4(), "c/x".into(), t.clone(), OptMap::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::StreamExists { .. }));

        catalog.create(Uuid::new_v4(), "c/y".into(), t, OptMap::new()).unwrap();
    }

    #[test]
    fn test_null_and_empty_tag_values_are_distinct() {
        let mut catalog = Catalog::new();
        catalog
            .create(Uuid::new_v4(), "c".into(), tags(&[("k", None)]), OptMap::new())
            .unwrap();
        catalog
            .create(Uuid::new_v4(), "c".into(), tags(&[("k", Some(""))]), OptMap::new())
            .unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_retired_uuid_cannot_be_reused() {
        let mut catalog = Catalog::new();
        let uuid = Uuid::new_v4();
        catalog.create(uuid, "c".into(), OptMap::new(), OptMap::new()).unwrap();
        catalog.retire(&uuid).unwrap();

        let err = catalog
            .create(uuid, "c".into(), OptMap::new(), OptMap::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::SameStream { .. }));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_stale_property_version_is_rejected() {
        let mut catalog = Catalog::new();
        let uuid = Uuid::new_v4();
        catalog.create(uuid, "c".into(), OptMap::new(), OptMap::new()).unwrap();

        let v = catalog
            .set_annotations(&uuid, 1, tags(&[("note", Some("x"))]), &[])
            .unwrap();
        assert_eq!(v, 2);

        let err = catalog
            .set_annotations(&uuid, 1, tags(&[("note", Some("y"))]), &[])
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::PropertyVersionMismatch { expected: 1, current: 2 }
        ));
        assert_eq!(
            catalog.get(&uuid).unwrap().annotations.get("note"),
            Some(&Some("x".to_string()))
        );
    }

    #[test]
    fn test_set_tags_moves_collection_and_checks_collisions() {
        let mut catalog = Catalog::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        catalog.create(a, "one".into(), tags(&[("n", Some("1"))]), OptMap::new()).unwrap();
        catalog.create(b, "two".into(), tags(&[("n", Some("1"))]), OptMap::new()).unwrap();

        let err = catalog.set_tags(&b, 1, "one", OptMap::new(), &[]).unwrap_err();
        assert!(matches!(err, StoreError::StreamExists { .. }));

        let v = catalog
            .set_tags(&b, 1, "one", tags(&[("n", Some("2"))]), &[])
            .unwrap();
        assert_eq!(v, 2);
        assert_eq!(catalog.collections("o"), ["one"]);
        assert_eq!(catalog.collections(""), ["one"]);
    }

    #[test]
    fn test_metadata_edits_bump_only_on_change() {
        let mut catalog = Catalog::new();
        let uuid = Uuid::new_v4();
        catalog
            .create(uuid, "c".into(), tags(&[("n", Some("1"))]), tags(&[("a", None)]))
            .unwrap();

        assert_eq!(catalog.set_tags(&uuid, 1, "", OptMap::new(), &["gone".to_string()]).unwrap(), 1);
        assert_eq!(catalog.set_tags(&uuid, 1, "c", tags(&[("n", Some("1"))]), &[]).unwrap(), 1);
        assert_eq!(
            catalog.set_annotations(&uuid, 1, tags(&[("a", None)]), &["gone".to_string()]).unwrap(),
            1
        );

        assert_eq!(catalog.set_tags(&uuid, 1, "", OptMap::new(), &["n".to_string()]).unwrap(), 2);
        assert!(catalog.get(&uuid).unwrap().tags.is_empty());
        assert_eq!(catalog.set_annotations(&uuid, 2, OptMap::new(), &["a".to_string()]).unwrap(), 3);
        assert!(catalog.get(&uuid).unwrap().annotations.is_empty());
    }

    #[test]
    fn test_removal_keys_are_validated() {
        let mut catalog = Catalog::new();
        let uuid = Uuid::new_v4();
        catalog.create(uuid, "c".into(), OptMap::new(), OptMap::new()).unwrap();

        let err = catalog.set_tags(&uuid, 1, "", OptMap::new(), &["bad key".to_string()]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTagKey(_)));
        let err = catalog
            .set_annotations(&uuid, 1, OptMap::new(), &["bad key".to_string()])
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTagKey(_)));
        assert_eq!(catalog.get(&uuid).unwrap().property_version, 1);
    }

    #[test]
    fn test_lookup_filters() {
        let mut catalog = Catalog::new();
        catalog
            .create(Uuid::new_v4(), "p/a".into(), tags(&[("x", Some("1")), ("y", None)]), OptMap::new())
            .unwrap();
        catalog
            .create(Uuid::new_v4(), "p/b".into(), tags(&[("x", Some("2"))]), OptMap::new())
            .unwrap();

        let prefix = LookupFilter {
            collection: "p/".into(),
            is_prefix: true,
            ..Default::default()
        };
        assert_eq!(catalog.lookup(&prefix).len(), 2);

        let by_value = LookupFilter {
            tags: tags(&[("x", Some("2"))]),
            ..prefix.clone()
        };
        assert_eq!(catalog.lookup(&by_value)[0].collection, "p/b");

        let by_presence = LookupFilter {
            tags: tags(&[("y", None)]),
            ..prefix
        };
        assert_eq!(catalog.lookup(&by_presence)[0].collection, "p/a");
    }

    #[test]
    fn test_validation() {
        assert!(validate_collection("a/b.c-d").is_ok());
        assert!(validate_collection("").is_err());
        assert!(validate_collection("has space").is_err());
        assert!(validate_key("good_key_1").is_ok());
        assert!(validate_key("bad-key").is_err());
        assert!(validate_key("").is_err());

        let long = tags(&[("k", Some("v".repeat(300).as_str()))]);
        assert!(matches!(validate_tags(&long), Err(StoreError::InvalidTagValue(_))));
    }

    #[test]
    fn test_metadata_usage_counts_keys() {
        let mut catalog = Catalog::new();
        for i in 0..3 {
            catalog
                .create(
                    Uuid::new_v4(),
                    "m".into(),
                    tags(&[("i", Some(i.to_string().as_str()))]),
                    tags(&[("note", None)]),
                )
                .unwrap();
        }
        let usage = catalog.metadata_usage("m");
        assert_eq!(usage.tags.get("i"), Some(&3));
        assert_eq!(usage.annotations.get("note"), Some(&3));
    }
}
