use std::collections::BTreeMap;
use std::future::Future;

use tokio::time::Instant;
use tonic::transport::Channel;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use super::config::ClientConfig;
use super::connect;
use super::cursor::{CsvRow, Cursor, ResponseFrame};
use super::error::ClientError;
use super::stream::Stream;
use crate::error::check_stat;
use crate::proto::btrdb_client::BtrdbClient;
use crate::proto::{self, Reply, map_to_wire};
use crate::types::OptMap;

/// A connection to a BTrDB cluster.
///
/// Cheap to clone; every clone multiplexes calls over the same channel.
///
/// ```ignore
/// let db = Btrdb::connect(&endpoints_from_env()).await?;
/// let stream = db.create(Uuid::new_v4(), "sensors/a", &tags, &OptMap::new()).await?;
/// stream.insert(&[RawPoint::new(0, 1.0)]).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Btrdb {
    client: BtrdbClient<Channel>,
    endpoint: String,
    config: ClientConfig,
}

impl Btrdb {
    /// Connect with the default configuration.
    pub async fn connect(endpoints: &[String]) -> Result<Self, ClientError> {
        Self::connect_with(endpoints, ClientConfig::default()).await
    }

    /// Race all `endpoints` and keep the first healthy one.
    pub async fn connect_with(
        endpoints: &[String],
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let (endpoint, channel) = connect::race(endpoints, &config).await?;
        let client = BtrdbClient::new(channel)
            .max_decoding_message_size(config.max_message_size)
            .max_encoding_message_size(config.max_message_size);
        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    /// The endpoint that won the connect race.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A handle to an existing stream. No call is made.
    pub fn stream(&self, uuid: Uuid) -> Stream {
        Stream::new(self.clone(), uuid)
    }

    pub(crate) fn grpc(&self) -> BtrdbClient<Channel> {
        self.client.clone()
    }

    pub(crate) fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        if let Some(timeout) = self.config.call_timeout {
            request.set_timeout(timeout);
        }
        request
    }

    fn deadline(&self) -> Option<Instant> {
        self.config.call_timeout.map(|timeout| Instant::now() + timeout)
    }

    /// Run a unary call under the call timeout and surface its embedded status.
    pub(crate) async fn unary<T, Fut>(&self, call: Fut) -> Result<T, ClientError>
    where
        T: Reply,
        Fut: Future<Output = Result<Response<T>, Status>>,
    {
        let response = match self.config.call_timeout {
            Some(timeout) => tokio::time::timeout(timeout, call).await??,
            None => call.await?,
        }
        .into_inner();
        check_stat(response.stat())?;
        Ok(response)
    }

    /// Open a streaming call and hand its frames to a [`Cursor`].
    pub(crate) async fn streaming<F, Fut>(&self, call: Fut) -> Result<Cursor<F::Item>, ClientError>
    where
        F: ResponseFrame,
        Fut: Future<Output = Result<Response<tonic::codec::Streaming<F>>, Status>>,
    {
        let deadline = self.deadline();
        let frames = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, call).await??,
            None => call.await?,
        }
        .into_inner();
        Ok(Cursor::spawn(frames, deadline, self.config.cursor_buffer))
    }

    /// Create a stream and return a handle to it.
    pub async fn create(
        &self,
        uuid: Uuid,
        collection: &str,
        tags: &OptMap,
        annotations: &OptMap,
    ) -> Result<Stream, ClientError> {
        let mut grpc = self.grpc();
        self.unary(grpc.create(self.request(proto::CreateParams {
            uuid: uuid.as_bytes().to_vec(),
            collection: collection.to_string(),
            tags: map_to_wire(tags),
            annotations: map_to_wire(annotations),
        })))
        .await?;
        Ok(self.stream(uuid))
    }

    pub async fn info(&self) -> Result<proto::InfoResponse, ClientError> {
        let mut grpc = self.grpc();
        self.unary(grpc.info(self.request(proto::InfoParams {})))
            .await
    }

    pub async fn list_collections(&self, prefix: &str) -> Result<Cursor<String>, ClientError> {
        let mut grpc = self.grpc();
        self.streaming(grpc.list_collections(self.request(proto::ListCollectionsParams {
            prefix: prefix.to_string(),
        })))
        .await
    }

    /// Streams in `collection` (or under it when `is_prefix`) whose tags and annotations match.
    /// A `None` filter value matches any value of a present key.
    pub async fn lookup_streams(
        &self,
        collection: &str,
        is_prefix: bool,
        tags: &OptMap,
        annotations: &OptMap,
    ) -> Result<Cursor<proto::StreamDescriptor>, ClientError> {
        let mut grpc = self.grpc();
        self.streaming(grpc.lookup_streams(self.request(proto::LookupStreamsParams {
            collection: collection.to_string(),
            is_collection_prefix: is_prefix,
            tags: map_to_wire(tags),
            annotations: map_to_wire(annotations),
        })))
        .await
    }

    /// Tag and annotation key usage counts under `prefix`.
    pub async fn metadata_usage(
        &self,
        prefix: &str,
    ) -> Result<(BTreeMap<String, u64>, BTreeMap<String, u64>), ClientError> {
        let mut grpc = self.grpc();
        let response = self
            .unary(grpc.get_metadata_usage(self.request(proto::MetadataUsageParams {
                prefix: prefix.to_string(),
            })))
            .await?;
        let counts = |pairs: Vec<proto::KeyCount>| -> BTreeMap<String, u64> {
            pairs.into_iter().map(|kc| (kc.key, kc.count)).collect()
        };
        Ok((counts(response.tags), counts(response.annotations)))
    }

    pub async fn fault_inject(&self, fault_type: u64, params: &[u8]) -> Result<Vec<u8>, ClientError> {
        let mut grpc = self.grpc();
        let response = self
            .unary(grpc.fault_inject(self.request(proto::FaultInjectParams {
                r#type: fault_type,
                params: params.to_vec(),
            })))
            .await?;
        Ok(response.rv)
    }

    /// Run a metadata query; each item is one JSON-encoded row.
    pub async fn sql_query(
        &self,
        query: &str,
        params: &[String],
    ) -> Result<Cursor<Vec<u8>>, ClientError> {
        let mut grpc = self.grpc();
        self.streaming(grpc.sql_query(self.request(proto::SqlQueryParams {
            query: query.to_string(),
            params: params.to_vec(),
        })))
        .await
    }

    pub async fn generate_csv(
        &self,
        params: proto::GenerateCsvParams,
    ) -> Result<Cursor<CsvRow>, ClientError> {
        let mut grpc = self.grpc();
        self.streaming(grpc.generate_csv(self.request(params))).await
    }
}
