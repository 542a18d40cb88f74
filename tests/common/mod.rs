#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use btrdb::client::{Btrdb, ClientConfig, endpoints_from_env};
use btrdb::gateway::{Gateway, GatewayConfig};
use btrdb::grpc::{BtrdbService, ServiceConfig, StreamStats, serve_listener};
use btrdb::store::Store;
use btrdb::{OptMap, RawPoint};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Endpoint;
use uuid::Uuid;

/// A cluster under test: `BTRDB_ENDPOINTS` when set, otherwise a server in this process.
pub struct TestCluster {
    pub endpoints: Vec<String>,
    in_process: bool,
    stats: Option<Arc<StreamStats>>,
    stop: Option<oneshot::Sender<()>>,
}

impl TestCluster {
    pub async fn start() -> Self {
        let endpoints = endpoints_from_env();
        if !endpoints.is_empty() {
            return Self {
                endpoints,
                in_process: false,
                stats: None,
                stop: None,
            };
        }

        let config = ServiceConfig::builder()
            .frame_size(1000)
            .fault_inject_enabled(true)
            .build();
        let service = BtrdbService::new(Arc::new(Store::default()), config);
        let stats = service.stream_stats();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        tokio::spawn(serve_listener(listener, service, async {
            let _ = stopped.await;
        }));

        Self {
            endpoints: vec![addr.to_string()],
            in_process: true,
            stats: Some(stats),
            stop: Some(stop),
        }
    }

    /// Whether fault injection and other node-local settings are known.
    pub fn in_process(&self) -> bool {
        self.in_process
    }

    /// Streaming call counters of the in-process server.
    pub fn stream_stats(&self) -> Option<Arc<StreamStats>> {
        self.stats.clone()
    }

    /// Wait until no server stream is open, or give up after `timeout`.
    pub async fn streams_settled(&self, timeout: Duration) -> bool {
        let Some(stats) = &self.stats else {
            return true;
        };
        let deadline = tokio::time::Instant::now() + timeout;
        while stats.open() > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }

    pub async fn connect(&self) -> Btrdb {
        Btrdb::connect(&self.endpoints).await.unwrap()
    }

    pub async fn connect_with(&self, config: ClientConfig) -> Btrdb {
        Btrdb::connect_with(&self.endpoints, config).await.unwrap()
    }

    /// The HTTP gateway in front of this cluster, as a router for `oneshot` calls.
    pub fn gateway(&self) -> axum::Router {
        let channel = Endpoint::from_shared(format!("http://{}", self.endpoints[0]))
            .unwrap()
            .connect_lazy();
        Gateway::new(channel, GatewayConfig::default()).into_router()
    }
}

impl Drop for TestCluster {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

/// A listener that accepts TCP connections but never speaks HTTP/2.
pub async fn silent_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

/// A collection name no other test run shares.
pub fn unique_collection(prefix: &str) -> String {
    format!("{prefix}.{}", Uuid::new_v4().simple())
}

pub fn tags(pairs: &[(&str, &str)]) -> OptMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Some(v.to_string())))
        .collect()
}

/// `(t, t as f64)` for every `t` in `range`.
pub fn points(range: std::ops::Range<i64>) -> Vec<RawPoint> {
    range.map(|t| RawPoint::new(t, t as f64)).collect()
}
