mod common;

use std::time::{Duration, Instant};

use btrdb::client::{Btrdb, ClientConfig, ClientError};
use btrdb::{ErrorCode, OptMap, RawPoint, SyncPolicy, Version};
use common::{TestCluster, points, silent_listener, tags, unique_collection};
use rand::Rng;
use uuid::Uuid;

async fn new_stream(db: &Btrdb, prefix: &str) -> btrdb::Stream {
    let collection = unique_collection(prefix);
    db.create(
        Uuid::new_v4(),
        &collection,
        &tags(&[("name", "s")]),
        &OptMap::new(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_version_jump_by_two() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let stream = new_stream(&db, "contract.version").await;
    assert_eq!(stream.version().await.unwrap(), 10);

    stream.insert(&points(0..100)).await.unwrap();
    stream.flush().await.unwrap();
    stream.insert(&points(300..400)).await.unwrap();
    stream.flush().await.unwrap();

    assert_eq!(stream.version().await.unwrap(), 12);
}

#[tokio::test]
async fn test_flush_without_mutation_keeps_version() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let stream = new_stream(&db, "contract.flush").await;

    assert_eq!(stream.flush().await.unwrap(), 10);
    stream.insert(&points(0..10)).await.unwrap();
    assert_eq!(stream.flush().await.unwrap(), 11);
    assert_eq!(stream.version().await.unwrap(), 11);
}

#[tokio::test]
async fn test_changes_between_versions() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let stream = new_stream(&db, "contract.changes").await;
    stream.insert(&points(0..100)).await.unwrap();
    stream.insert(&points(300..400)).await.unwrap();

    // Same version: no frames, clean status.
    let same = stream.changes(12, Version::Specific(12), 0).await.unwrap();
    assert!(same.collect().await.unwrap().is_empty());

    let ranges = stream
        .changes(11, Version::Specific(12), 0)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert!(!ranges.is_empty());
    assert_eq!(ranges.first().unwrap().start, 300);
    assert_eq!(ranges.last().unwrap().end, 400);

    let all = stream
        .changes(10, Version::Latest, 0)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let err = stream
        .changes(12, Version::Specific(11), 0)
        .await
        .unwrap()
        .status()
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::InvalidVersions));

    let err = stream
        .changes(10, Version::Latest, 65)
        .await
        .unwrap()
        .status()
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::InvalidResolution));
}

#[tokio::test]
async fn test_duplicate_uuid() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let uu = Uuid::new_v4();
    let name = tags(&[("name", "foo")]);

    db.create(uu, &unique_collection("c1"), &name, &OptMap::new())
        .await
        .unwrap();
    let err = db
        .create(uu, &unique_collection("c2"), &name, &OptMap::new())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::SameStream));
    assert_eq!(err.coded().code, 418);
}

#[tokio::test]
async fn test_same_identity_in_collection() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let collection = unique_collection("contract.identity");
    let name = tags(&[("name", "foo")]);

    db.create(Uuid::new_v4(), &collection, &name, &OptMap::new())
        .await
        .unwrap();
    let err = db
        .create(Uuid::new_v4(), &collection, &name, &OptMap::new())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::StreamExists));
}

#[tokio::test]
async fn test_raw_values_half_open() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let stream = new_stream(&db, "contract.halfopen").await;
    let version = stream.insert(&points(0..100)).await.unwrap();

    let mut cursor = stream.raw_values(0, 98, Version::Latest).await.unwrap();
    assert_eq!(cursor.version().await, Some(version));
    let values = cursor.collect().await.unwrap();
    assert_eq!(values.len(), 98);
    let times: Vec<i64> = values.iter().map(|p| p.time).collect();
    assert_eq!(times, (0..98).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_raw_values_empty_range_reports_version() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let stream = new_stream(&db, "contract.empty").await;

    let mut cursor = stream.raw_values(0, 100, Version::Latest).await.unwrap();
    assert_eq!(cursor.version().await, Some(10));
    assert!(cursor.collect().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_snapshot_reads_old_version() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let stream = new_stream(&db, "contract.snapshot").await;
    let first = stream.insert(&points(0..10)).await.unwrap();
    stream.insert(&points(10..20)).await.unwrap();
    stream.delete(0, 5).await.unwrap();

    let old = stream
        .raw_values(0, 100, Version::Specific(first))
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(old, points(0..10));

    let latest = stream
        .raw_values(0, 100, Version::Latest)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(latest, points(5..20));
}

#[tokio::test]
async fn test_obliterate_lifecycle() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let collection = unique_collection("contract.obliterate");
    let uu = Uuid::new_v4();
    let stream = db
        .create(uu, &collection, &tags(&[("name", "gone")]), &OptMap::new())
        .await
        .unwrap();
    stream.insert(&points(0..10)).await.unwrap();
    stream.obliterate().await.unwrap();

    assert!(!stream.exists().await.unwrap());

    let err = stream.annotations().await.unwrap_err();
    assert!(err.is(ErrorCode::NoSuchStream));

    let err = stream
        .raw_values(0, 10, Version::Latest)
        .await
        .unwrap()
        .status()
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::NoSuchStream));

    let err = db
        .create(uu, &collection, &tags(&[("name", "gone")]), &OptMap::new())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::SameStream));
}

#[tokio::test]
async fn test_lookup_twenty_by_fifty() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let prefix = unique_collection("contract.lookup");

    let creates = (0..20).map(|k| {
        let db = db.clone();
        let collection = format!("{prefix}.{k:03}");
        async move {
            for i in 0..50 {
                let (name, unit) = (i.to_string(), k.to_string());
                let stream_tags = tags(&[("name", name.as_str()), ("unit", unit.as_str())]);
                db.create(Uuid::new_v4(), &collection, &stream_tags, &OptMap::new())
                    .await
                    .unwrap();
            }
        }
    });
    futures::future::join_all(creates).await;

    let count = |collection: String, is_prefix: bool, filter: OptMap| {
        let db = db.clone();
        async move {
            db.lookup_streams(&collection, is_prefix, &filter, &OptMap::new())
                .await
                .unwrap()
                .collect()
                .await
                .unwrap()
                .len()
        }
    };

    assert_eq!(count(prefix.clone(), true, OptMap::new()).await, 1000);
    assert_eq!(count(format!("{prefix}.000"), false, OptMap::new()).await, 50);
    assert_eq!(count(format!("{prefix}.00"), false, OptMap::new()).await, 0);
    assert_eq!(count(prefix.clone(), true, tags(&[("name", "23")])).await, 20);
    assert_eq!(
        count(prefix.clone(), true, tags(&[("name", "16"), ("unit", "13")])).await,
        1
    );

    // A null filter value matches any value of a present key.
    let mut any_unit = OptMap::new();
    any_unit.insert("unit".to_string(), None);
    assert_eq!(count(format!("{prefix}.005"), false, any_unit).await, 50);

    let collections = db
        .list_collections(&prefix)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(collections.len(), 20);
    assert_eq!(collections[0], format!("{prefix}.000"));
}

#[tokio::test]
async fn test_connect_picks_healthy_endpoint_fast() {
    let cluster = TestCluster::start().await;
    let (_silent, silent_addr) = silent_listener().await;
    let mut endpoints = vec![silent_addr];
    endpoints.extend(cluster.endpoints.iter().cloned());

    let started = Instant::now();
    let db = Btrdb::connect(&endpoints).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(db.endpoint(), cluster.endpoints[0]);
}

#[tokio::test]
async fn test_connect_endpoint_timeout() {
    let (_silent, silent_addr) = silent_listener().await;
    let config = ClientConfig::builder()
        .endpoint_timeout(Duration::from_millis(200))
        .build();

    let started = Instant::now();
    let err = Btrdb::connect_with(&[silent_addr], config)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::EndpointTimeout(_) | ClientError::Transport(_)
    ));
    assert_eq!(
        err.coded().code,
        ErrorCode::InsufficientClusterState.as_u32()
    );
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_connect_deadline() {
    let (_silent, silent_addr) = silent_listener().await;
    let config = ClientConfig::builder()
        .endpoint_timeout(Duration::from_secs(10))
        .connect_deadline(Duration::from_millis(100))
        .build();

    let err = Btrdb::connect_with(&[silent_addr], config)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::DeadlineExceeded));
    assert_eq!(err.coded().code, ErrorCode::ContextError.as_u32());
}

#[tokio::test]
async fn test_annotations_round_trip_random_unicode() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let stream = new_stream(&db, "contract.annotations").await;
    let mut rng = rand::rng();

    let (current, version) = stream.annotations().await.unwrap();
    assert!(current.is_empty());
    assert_eq!(version, 1);

    let mut expected = OptMap::new();
    for i in 0..32 {
        let len = rng.random_range(0..40);
        let value: String = (0..len).map(|_| rng.random::<char>()).collect();
        expected.insert(format!("key_{i}"), Some(value));
    }
    expected.insert("empty".to_string(), Some(String::new()));
    expected.insert("null".to_string(), None);

    let version = stream
        .compare_and_set_annotations(version, &expected, &[])
        .await
        .unwrap();
    assert_eq!(version, 2);

    let (stored, stored_version) = stream.annotations().await.unwrap();
    assert_eq!(stored, expected);
    assert_eq!(stored_version, 2);

    // Stale property version: rejected and nothing changes.
    let err = stream
        .compare_and_set_annotations(1, &OptMap::new(), &["empty".to_string()])
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::AnnotationVersionMismatch));

    let version = stream
        .compare_and_set_annotations(2, &OptMap::new(), &["empty".to_string()])
        .await
        .unwrap();
    assert_eq!(version, 3);
    let (stored, _) = stream.annotations().await.unwrap();
    assert!(!stored.contains_key("empty"));
    assert_eq!(stored.get("null"), Some(&None));
}

#[tokio::test]
async fn test_tags_move_collection() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let stream = new_stream(&db, "contract.tags").await;
    let target = unique_collection("contract.moved");

    let info = stream.info().await.unwrap();
    let version = stream
        .compare_and_set_tags(
            info.property_version,
            Some(&target),
            &tags(&[("unit", "volts")]),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(version, info.property_version + 1);

    let info = stream.info().await.unwrap();
    assert_eq!(info.collection, target);
    assert_eq!(info.tags, tags(&[("name", "s"), ("unit", "volts")]));
}

#[tokio::test]
async fn test_big_insert_round_trip() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let stream = new_stream(&db, "contract.big").await;
    let batch = points(0..100_000);

    stream.insert(&batch).await.unwrap();
    let values = stream
        .raw_values(i64::MIN, i64::MAX, Version::Latest)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(values.len(), batch.len());
    assert!(values.windows(2).all(|pair| pair[0].time < pair[1].time));
    assert_eq!(values, batch);
}

#[tokio::test]
async fn test_never_sync_visible_after_flush() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let stream = new_stream(&db, "contract.neversync").await;

    stream
        .insert_with(SyncPolicy::NeverSync, &points(0..10))
        .await
        .unwrap();
    assert_eq!(stream.version().await.unwrap(), 10);
    let before = stream
        .raw_values(0, 100, Version::Latest)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert!(before.is_empty());

    assert_eq!(stream.flush().await.unwrap(), 11);
    let after = stream
        .raw_values(0, 100, Version::Latest)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(after, points(0..10));
}

#[tokio::test]
async fn test_nearest() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let stream = new_stream(&db, "contract.nearest").await;
    let version = stream
        .insert(&[RawPoint::new(10, 1.0), RawPoint::new(20, 2.0)])
        .await
        .unwrap();

    let (point, at) = stream.nearest(10, Version::Latest, false).await.unwrap();
    assert_eq!((point.time, at), (10, version));
    let (point, _) = stream.nearest(11, Version::Latest, false).await.unwrap();
    assert_eq!(point.time, 20);
    let (point, _) = stream.nearest(20, Version::Latest, true).await.unwrap();
    assert_eq!(point.time, 10);

    let err = stream.nearest(21, Version::Latest, false).await.unwrap_err();
    assert!(err.is(ErrorCode::NoSuchPoint));
    let err = stream.nearest(10, Version::Latest, true).await.unwrap_err();
    assert!(err.is(ErrorCode::NoSuchPoint));
}

#[tokio::test]
async fn test_window_queries() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let stream = new_stream(&db, "contract.windows").await;
    stream.insert(&points(0..100)).await.unwrap();

    let aligned = stream
        .aligned_windows(0, 128, 4, Version::Latest)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(aligned.len(), 7);
    assert_eq!(aligned[0].time, 0);
    assert_eq!(aligned[0].count, 16);
    assert_eq!(aligned[0].min, 0.0);
    assert_eq!(aligned[0].max, 15.0);
    assert_eq!(aligned[0].mean, 7.5);
    assert_eq!(aligned[6].count, 4);

    let windows = stream
        .windows(0, 100, 10, 0, Version::Latest)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(windows.len(), 10);
    assert!(windows.iter().all(|w| w.count == 10));
    assert_eq!(windows[9].time, 90);

    let err = stream
        .aligned_windows(0, 128, 63, Version::Latest)
        .await
        .unwrap()
        .status()
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::InvalidPointWidth));
}

#[tokio::test]
async fn test_metadata_queries() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let prefix = unique_collection("contract.meta");
    let collection = format!("{prefix}.a");
    let uu = Uuid::new_v4();
    db.create(
        uu,
        &collection,
        &tags(&[("name", "x"), ("unit", "v")]),
        &tags(&[("site", "north")]),
    )
    .await
    .unwrap();

    let (tag_counts, annotation_counts) = db.metadata_usage(&prefix).await.unwrap();
    assert_eq!(tag_counts.get("name"), Some(&1));
    assert_eq!(tag_counts.get("unit"), Some(&1));
    assert_eq!(annotation_counts.get("site"), Some(&1));

    let rows = db
        .sql_query(
            "SELECT uuid, collection FROM streams WHERE collection = $1",
            &[collection.clone()],
        )
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let row: serde_json::Value = serde_json::from_slice(&rows[0]).unwrap();
    assert_eq!(row["uuid"], uu.to_string());
    assert_eq!(row["collection"], collection);

    let err = db
        .sql_query("DROP TABLE streams", &[])
        .await
        .unwrap()
        .status()
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::BadSqlValue));
}

#[tokio::test]
async fn test_info_reports_protocol() {
    let cluster = TestCluster::start().await;
    let db = cluster.connect().await;
    let info = db.info().await.unwrap();
    assert_eq!(info.major_version, 5);
    let mash = info.mash.unwrap();
    assert!(mash.healthy);
    assert!(!mash.members.is_empty());
}

#[tokio::test]
async fn test_call_timeout() {
    let cluster = TestCluster::start().await;
    if !cluster.in_process() {
        return;
    }
    let config = ClientConfig::builder()
        .call_timeout(Duration::from_millis(100))
        .build();
    let db = cluster.connect_with(config).await;

    assert_eq!(db.fault_inject(0, b"ping").await.unwrap(), b"ping");
    let err = db.fault_inject(1, b"2000").await.unwrap_err();
    assert!(matches!(err, ClientError::DeadlineExceeded));
}

#[tokio::test]
async fn test_dropped_cursor_ends_server_stream() {
    let cluster = TestCluster::start().await;
    let Some(stats) = cluster.stream_stats() else {
        return;
    };
    let db = cluster.connect().await;
    let stream = new_stream(&db, "contract.cancel").await;
    stream.insert(&points(0..100_000)).await.unwrap();
    stream.insert(&points(100_000..200_000)).await.unwrap();

    let mut cursor = stream
        .raw_values(i64::MIN, i64::MAX, Version::Latest)
        .await
        .unwrap();
    assert_eq!(cursor.next().await, Some(RawPoint::new(0, 0.0)));
    assert_eq!(stats.open(), 1);

    drop(cursor);
    assert!(cluster.streams_settled(Duration::from_secs(5)).await);
    assert_eq!(stats.cancelled(), 1);
    assert_eq!(stats.completed(), 0);
}
