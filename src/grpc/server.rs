use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures::Stream;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::ServiceConfig;
use super::stats::StreamStats;
use crate::csv::{CsvPlan, CsvQuery, CsvSource};
use crate::error::{CodedError, ErrorCode};
use crate::proto::btrdb_server::{Btrdb, BtrdbServer};
use crate::proto::*;
use crate::sql::Query;
use crate::store::{
    self, LookupFilter, Snapshot, StreamMeta, Store, WindowIter, Windowing, aggregate,
};
use crate::types::Version;

type FrameStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// Serve the facade on `addr` until `shutdown` resolves.
pub async fn start_server(
    addr: SocketAddr,
    service: BtrdbService,
    shutdown: impl Future<Output = ()> + Send,
) -> anyhow::Result<()> {
    info!(address = %addr, "gRPC server starting");

    tonic::transport::Server::builder()
        .add_service(service.into_server())
        .serve_with_shutdown(addr, shutdown)
        .await?;

    info!(address = %addr, "gRPC server stopped");
    Ok(())
}

/// Serve the facade on an already bound listener until `shutdown` resolves.
pub async fn serve_listener(
    listener: TcpListener,
    service: BtrdbService,
    shutdown: impl Future<Output = ()> + Send,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(address = %addr, "gRPC server starting");

    tonic::transport::Server::builder()
        .add_service(service.into_server())
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;

    Ok(())
}

/// The `v5api.Btrdb` service over a [`Store`].
#[derive(Debug, Clone)]
pub struct BtrdbService {
    store: Arc<Store>,
    config: ServiceConfig,
    stats: Arc<StreamStats>,
}

impl BtrdbService {
    pub fn new(store: Arc<Store>, config: ServiceConfig) -> Self {
        Self {
            store,
            config,
            stats: Arc::new(StreamStats::new()),
        }
    }

    /// Streaming call counters, shared by every clone of this service.
    pub fn stream_stats(&self) -> Arc<StreamStats> {
        Arc::clone(&self.stats)
    }

    pub fn into_server(self) -> BtrdbServer<Self> {
        let limit = self.config.max_message_size;
        BtrdbServer::new(self)
            .max_decoding_message_size(limit)
            .max_encoding_message_size(limit)
    }

    fn snapshot(&self, uuid: &[u8], version: u64) -> Result<Snapshot, CodedError> {
        let uuid = parse_uuid(uuid)?;
        Ok(self.store.snapshot(&uuid, Version::from_wire(version))?)
    }
}

fn parse_uuid(bytes: &[u8]) -> Result<Uuid, CodedError> {
    Uuid::from_slice(bytes).map_err(|_| {
        CodedError::new(
            ErrorCode::WrongArgs,
            format!("uuid must be 16 bytes, got {}", bytes.len()),
        )
    })
}

fn descriptor(meta: &StreamMeta) -> StreamDescriptor {
    StreamDescriptor {
        uuid: meta.uuid.as_bytes().to_vec(),
        collection: meta.collection.clone(),
        tags: map_to_wire(&meta.tags),
        annotations: map_to_wire(&meta.annotations),
        property_version: meta.property_version,
    }
}

fn reply<T: Reply>(result: Result<T, CodedError>) -> Result<Response<T>, Status> {
    Ok(Response::new(result.unwrap_or_else(|err| {
        debug!(code = err.code, message = %err.message, "Request failed");
        T::failed(err)
    })))
}

/// Splits items into frames of at most `size`.
struct Batches<I> {
    items: I,
    size: usize,
    /// Yield one empty batch when there are no items at all.
    at_least_one: bool,
}

impl<I: Iterator> Batches<I> {
    fn new(items: I, size: usize, at_least_one: bool) -> Self {
        Self {
            items,
            size,
            at_least_one,
        }
    }
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<_> = self.items.by_ref().take(self.size).collect();
        if batch.is_empty() && !std::mem::take(&mut self.at_least_one) {
            return None;
        }
        self.at_least_one = false;
        Some(batch)
    }
}

/// Counts a streaming call and logs it when the peer abandons it before the last frame.
struct FrameGuard {
    op: &'static str,
    finished: bool,
    stats: Arc<StreamStats>,
}

impl FrameGuard {
    fn new(op: &'static str, stats: Arc<StreamStats>) -> Self {
        stats.record_open();
        Self {
            op,
            finished: false,
            stats,
        }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        self.stats.record_close(self.finished);
        if !self.finished {
            debug!(op = self.op, "Stream cancelled before completion");
        }
    }
}

#[tonic::async_trait]
impl Btrdb for BtrdbService {
    type RawValuesStream = FrameStream<RawValuesResponse>;
    type AlignedWindowsStream = FrameStream<AlignedWindowsResponse>;
    type WindowsStream = FrameStream<WindowsResponse>;
    type ListCollectionsStream = FrameStream<ListCollectionsResponse>;
    type LookupStreamsStream = FrameStream<LookupStreamsResponse>;
    type ChangesStream = FrameStream<ChangesResponse>;
    type GenerateCSVStream = FrameStream<GenerateCsvResponse>;
    type SQLQueryStream = FrameStream<SqlQueryResponse>;

    async fn raw_values(
        &self,
        request: Request<RawValuesParams>,
    ) -> Result<Response<Self::RawValuesStream>, Status> {
        let params = request.into_inner();
        let frame_size = self.config.frame_size();
        let (start, end) = (params.start, params.end);
        let prepared = store::check_range(start, end)
            .map_err(CodedError::from)
            .and_then(|()| self.snapshot(&params.uuid, params.version_major));

        let stats = self.stream_stats();
        let frames = stream! {
            let mut guard = FrameGuard::new("RawValues", stats);
            match prepared {
                Err(err) => yield Ok(RawValuesResponse::failed(err)),
                Ok(snapshot) => {
                    let points = snapshot
                        .points
                        .range(start..end)
                        .map(|(t, v)| RawPoint::new(*t, *v));
                    for values in Batches::new(points, frame_size, true) {
                        yield Ok(RawValuesResponse {
                            stat: None,
                            version_major: snapshot.version,
                            version_minor: 0,
                            values,
                        });
                    }
                }
            }
            guard.finished = true;
        };

        Ok(Response::new(Box::pin(frames)))
    }

    async fn aligned_windows(
        &self,
        request: Request<AlignedWindowsParams>,
    ) -> Result<Response<Self::AlignedWindowsStream>, Status> {
        let params = request.into_inner();
        let frame_size = self.config.frame_size();
        let point_width = params.point_width;
        let prepared = store::check_range(params.start, params.end)
            .and_then(|()| store::check_point_width(point_width))
            .map_err(CodedError::from)
            .and_then(|()| self.snapshot(&params.uuid, params.version_major));
        let (start, end) = aggregate::aligned_span(params.start, params.end, point_width.min(aggregate::MAX_POINT_WIDTH));

        let stats = self.stream_stats();
        let frames = stream! {
            let mut guard = FrameGuard::new("AlignedWindows", stats);
            match prepared {
                Err(err) => yield Ok(AlignedWindowsResponse::failed(err)),
                Ok(snapshot) => {
                    let windows = WindowIter::new(
                        snapshot.points.range(start..end.max(start)),
                        Windowing::Aligned { point_width },
                    );
                    for values in Batches::new(windows, frame_size, true) {
                        yield Ok(AlignedWindowsResponse {
                            stat: None,
                            version_major: snapshot.version,
                            version_minor: 0,
                            values,
                        });
                    }
                }
            }
            guard.finished = true;
        };

        Ok(Response::new(Box::pin(frames)))
    }

    async fn windows(
        &self,
        request: Request<WindowsParams>,
    ) -> Result<Response<Self::WindowsStream>, Status> {
        let params = request.into_inner();
        let frame_size = self.config.frame_size();
        let width = params.width;
        let prepared = store::check_range(params.start, params.end)
            .and_then(|()| store::check_window(width, params.depth))
            .map_err(CodedError::from)
            .and_then(|()| self.snapshot(&params.uuid, params.version_major));
        let origin = params.start;
        let (start, end) = aggregate::fixed_span(params.start, params.end, width.max(1));

        let stats = self.stream_stats();
        let frames = stream! {
            let mut guard = FrameGuard::new("Windows", stats);
            match prepared {
                Err(err) => yield Ok(WindowsResponse::failed(err)),
                Ok(snapshot) => {
                    let windows = WindowIter::new(
                        snapshot.points.range(start..end.max(start)),
                        Windowing::Fixed { origin, width },
                    );
                    for values in Batches::new(windows, frame_size, true) {
                        yield Ok(WindowsResponse {
                            stat: None,
                            version_major: snapshot.version,
                            version_minor: 0,
                            values,
                        });
                    }
                }
            }
            guard.finished = true;
        };

        Ok(Response::new(Box::pin(frames)))
    }

    async fn stream_info(
        &self,
        request: Request<StreamInfoParams>,
    ) -> Result<Response<StreamInfoResponse>, Status> {
        let params = request.into_inner();
        reply((|| -> Result<_, CodedError> {
            let uuid = parse_uuid(&params.uuid)?;
            let (meta, version) = self.store.stream_info(&uuid)?;
            Ok(StreamInfoResponse {
                stat: None,
                version_major: if params.omit_version { 0 } else { version },
                version_minor: 0,
                descriptor: (!params.omit_descriptor).then(|| descriptor(&meta)),
            })
        })())
    }

    async fn set_stream_annotations(
        &self,
        request: Request<SetStreamAnnotationsParams>,
    ) -> Result<Response<SetStreamAnnotationsResponse>, Status> {
        let params = request.into_inner();
        reply((|| -> Result<_, CodedError> {
            let uuid = parse_uuid(&params.uuid)?;
            let property_version = self.store.set_annotations(
                &uuid,
                params.expected_property_version,
                map_from_wire(params.changes),
                &params.removals,
            )?;
            Ok(SetStreamAnnotationsResponse {
                stat: None,
                property_version,
            })
        })())
    }

    async fn set_stream_tags(
        &self,
        request: Request<SetStreamTagsParams>,
    ) -> Result<Response<SetStreamTagsResponse>, Status> {
        let params = request.into_inner();
        reply((|| -> Result<_, CodedError> {
            let uuid = parse_uuid(&params.uuid)?;
            let property_version = self.store.set_tags(
                &uuid,
                params.expected_property_version,
                &params.collection,
                map_from_wire(params.tags),
                &params.remove,
            )?;
            Ok(SetStreamTagsResponse {
                stat: None,
                property_version,
            })
        })())
    }

    async fn create(
        &self,
        request: Request<CreateParams>,
    ) -> Result<Response<CreateResponse>, Status> {
        let params = request.into_inner();
        reply((|| -> Result<_, CodedError> {
            let uuid = parse_uuid(&params.uuid)?;
            let version_major = self.store.create(
                uuid,
                params.collection,
                map_from_wire(params.tags),
                map_from_wire(params.annotations),
            )?;
            Ok(CreateResponse {
                stat: None,
                version_major,
            })
        })())
    }

    async fn list_collections(
        &self,
        request: Request<ListCollectionsParams>,
    ) -> Result<Response<Self::ListCollectionsStream>, Status> {
        let params = request.into_inner();
        let collections = self.store.collections(&params.prefix);
        let frame_size = self.config.frame_size();

        let frames = stream! {
            for collections in Batches::new(collections.into_iter(), frame_size, false) {
                yield Ok(ListCollectionsResponse { stat: None, collections });
            }
        };

        Ok(Response::new(Box::pin(frames)))
    }

    async fn lookup_streams(
        &self,
        request: Request<LookupStreamsParams>,
    ) -> Result<Response<Self::LookupStreamsStream>, Status> {
        let params = request.into_inner();
        let filter = LookupFilter {
            collection: params.collection,
            is_prefix: params.is_collection_prefix,
            tags: map_from_wire(params.tags),
            annotations: map_from_wire(params.annotations),
        };
        let found = self.store.lookup(&filter);
        debug!(collection = %filter.collection, matches = found.len(), "LookupStreams");
        let frame_size = self.config.frame_size();

        let stats = self.stream_stats();
        let frames = stream! {
            let mut guard = FrameGuard::new("LookupStreams", stats);
            for batch in Batches::new(found.iter(), frame_size, false) {
                yield Ok(LookupStreamsResponse {
                    stat: None,
                    results: batch.into_iter().map(descriptor).collect(),
                });
            }
            guard.finished = true;
        };

        Ok(Response::new(Box::pin(frames)))
    }

    async fn nearest(
        &self,
        request: Request<NearestParams>,
    ) -> Result<Response<NearestResponse>, Status> {
        let params = request.into_inner();
        reply((|| -> Result<_, CodedError> {
            let uuid = parse_uuid(&params.uuid)?;
            let (version_major, point) = self.store.nearest(
                &uuid,
                Version::from_wire(params.version_major),
                params.time,
                params.backward,
            )?;
            Ok(NearestResponse {
                stat: None,
                version_major,
                version_minor: 0,
                value: Some(point),
            })
        })())
    }

    async fn changes(
        &self,
        request: Request<ChangesParams>,
    ) -> Result<Response<Self::ChangesStream>, Status> {
        let params = request.into_inner();
        let frame_size = self.config.frame_size();
        let prepared = parse_uuid(&params.uuid).and_then(|uuid| {
            Ok(self
                .store
                .changes(&uuid, params.from_major, params.to_major, params.resolution)?)
        });

        let frames = stream! {
            match prepared {
                Err(err) => yield Ok(ChangesResponse::failed(err)),
                Ok((version, ranges)) => {
                    for ranges in Batches::new(ranges.into_iter(), frame_size, false) {
                        yield Ok(ChangesResponse {
                            stat: None,
                            version_major: version,
                            version_minor: 0,
                            ranges,
                        });
                    }
                }
            }
        };

        Ok(Response::new(Box::pin(frames)))
    }

    async fn insert(
        &self,
        request: Request<InsertParams>,
    ) -> Result<Response<InsertResponse>, Status> {
        let params = request.into_inner();
        reply((|| -> Result<_, CodedError> {
            let uuid = parse_uuid(&params.uuid)?;
            let policy = SyncPolicy::try_from(params.sync_policy).map_err(|_| {
                CodedError::new(
                    ErrorCode::WrongArgs,
                    format!("unknown sync policy {}", params.sync_policy),
                )
            })?;
            let version_major = self.store.insert(&uuid, policy, &params.values)?;
            Ok(InsertResponse {
                stat: None,
                version_major,
                version_minor: 0,
            })
        })())
    }

    async fn delete(
        &self,
        request: Request<DeleteParams>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let params = request.into_inner();
        reply((|| -> Result<_, CodedError> {
            let uuid = parse_uuid(&params.uuid)?;
            let version_major = self.store.delete(&uuid, params.start, params.end)?;
            Ok(DeleteResponse {
                stat: None,
                version_major,
                version_minor: 0,
            })
        })())
    }

    async fn info(&self, _request: Request<InfoParams>) -> Result<Response<InfoResponse>, Status> {
        let member = Member {
            hash: 0,
            nodename: self.config.node_name.clone(),
            up: true,
            r#in: true,
            grpc_endpoints: self.config.grpc_endpoint.clone(),
            http_endpoints: self.config.http_endpoint.clone(),
        };
        Ok(Response::new(InfoResponse {
            stat: None,
            mash: Some(Mash {
                revision: 1,
                leader: self.config.node_name.clone(),
                healthy: true,
                members: vec![member],
            }),
            major_version: PROTOCOL_MAJOR_VERSION,
            minor_version: PROTOCOL_MINOR_VERSION,
            build: env!("CARGO_PKG_VERSION").to_string(),
        }))
    }

    async fn fault_inject(
        &self,
        request: Request<FaultInjectParams>,
    ) -> Result<Response<FaultInjectResponse>, Status> {
        let params = request.into_inner();
        if !self.config.fault_inject_enabled {
            return reply(Err(CodedError::new(
                ErrorCode::FaultInjectionDisabled,
                "fault injection is disabled",
            )));
        }

        warn!(fault_type = params.r#type, "Fault injection requested");
        match params.r#type {
            0 => {}
            1 => {
                let millis = std::str::from_utf8(&params.params)
                    .ok()
                    .and_then(|s| s.trim().parse::<u64>().ok());
                let Some(millis) = millis else {
                    return reply(Err(CodedError::new(
                        ErrorCode::WrongArgs,
                        "delay fault expects a decimal millisecond count",
                    )));
                };
                tokio::time::sleep(Duration::from_millis(millis)).await;
            }
            other => {
                return reply(Err(CodedError::new(
                    ErrorCode::WrongArgs,
                    format!("unknown fault type {other}"),
                )));
            }
        }

        Ok(Response::new(FaultInjectResponse {
            stat: None,
            rv: params.params,
        }))
    }

    async fn flush(&self, request: Request<FlushParams>) -> Result<Response<FlushResponse>, Status> {
        let params = request.into_inner();
        reply((|| -> Result<_, CodedError> {
            let uuid = parse_uuid(&params.uuid)?;
            let version_major = self.store.flush(&uuid)?;
            Ok(FlushResponse {
                stat: None,
                version_major,
                version_minor: 0,
            })
        })())
    }

    async fn obliterate(
        &self,
        request: Request<ObliterateParams>,
    ) -> Result<Response<ObliterateResponse>, Status> {
        let params = request.into_inner();
        reply((|| -> Result<_, CodedError> {
            if !self.config.obliterate_enabled {
                return Err(CodedError::new(
                    ErrorCode::ObliterateDisabled,
                    "obliterate is disabled",
                ));
            }
            let uuid = parse_uuid(&params.uuid)?;
            self.store.obliterate(&uuid)?;
            Ok(ObliterateResponse { stat: None })
        })())
    }

    async fn get_metadata_usage(
        &self,
        request: Request<MetadataUsageParams>,
    ) -> Result<Response<MetadataUsageResponse>, Status> {
        let params = request.into_inner();
        let usage = self.store.metadata_usage(&params.prefix);
        let counts = |map: std::collections::BTreeMap<String, u64>| -> Vec<KeyCount> {
            map.into_iter()
                .map(|(key, count)| KeyCount { key, count })
                .collect()
        };
        Ok(Response::new(MetadataUsageResponse {
            stat: None,
            tags: counts(usage.tags),
            annotations: counts(usage.annotations),
        }))
    }

    async fn generate_csv(
        &self,
        request: Request<GenerateCsvParams>,
    ) -> Result<Response<Self::GenerateCSVStream>, Status> {
        let params = request.into_inner();
        let include_versions = params.include_versions;
        let prepared = self.csv_plan(params);

        let stats = self.stream_stats();
        let frames = stream! {
            let mut guard = FrameGuard::new("GenerateCSV", stats);
            match prepared {
                Err(err) => yield Ok(GenerateCsvResponse::failed(err)),
                Ok(plan) => {
                    yield Ok(GenerateCsvResponse { stat: None, is_header: true, row: plan.header() });
                    if include_versions {
                        yield Ok(GenerateCsvResponse {
                            stat: None,
                            is_header: true,
                            row: plan.version_header(),
                        });
                    }
                    for row in plan.rows() {
                        yield Ok(GenerateCsvResponse { stat: None, is_header: false, row });
                    }
                }
            }
            guard.finished = true;
        };

        Ok(Response::new(Box::pin(frames)))
    }

    async fn sql_query(
        &self,
        request: Request<SqlQueryParams>,
    ) -> Result<Response<Self::SQLQueryStream>, Status> {
        let params = request.into_inner();
        let frame_size = self.config.frame_size();
        let prepared = Query::parse(&params.query, &params.params)
            .map_err(CodedError::from)
            .and_then(|query| {
                let everything = LookupFilter {
                    is_prefix: true,
                    ..Default::default()
                };
                let rows = self
                    .store
                    .lookup(&everything)
                    .iter()
                    .filter(|meta| query.matches(meta))
                    .take(query.limit().unwrap_or(usize::MAX))
                    .map(|meta| serde_json::to_vec(&query.row(meta)))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| CodedError::new(ErrorCode::InternalError, e.to_string()))?;
                Ok(rows)
            });

        let frames = stream! {
            match prepared {
                Err(err) => yield Ok(SqlQueryResponse::failed(err)),
                Ok(rows) => {
                    for sql_query_row in Batches::new(rows.into_iter(), frame_size, false) {
                        yield Ok(SqlQueryResponse { stat: None, sql_query_row });
                    }
                }
            }
        };

        Ok(Response::new(Box::pin(frames)))
    }
}

impl BtrdbService {
    fn csv_plan(&self, params: GenerateCsvParams) -> Result<CsvPlan, CodedError> {
        if params.streams.is_empty() {
            return Err(CodedError::new(ErrorCode::WrongArgs, "no streams requested"));
        }
        store::check_range(params.start_time, params.end_time)?;

        let query = match CsvQueryType::try_from(params.query_type) {
            Ok(CsvQueryType::Raw) => CsvQuery::Raw,
            Ok(CsvQueryType::AlignedWindows) => {
                let point_width = u32::try_from(params.window_size)
                    .map_err(|_| store::StoreError::InvalidPointWidth(u32::MAX))?;
                store::check_point_width(point_width)?;
                CsvQuery::AlignedWindows { point_width }
            }
            Ok(CsvQueryType::Windows) => {
                store::check_window(params.window_size, params.depth)?;
                CsvQuery::Windows {
                    width: params.window_size,
                }
            }
            Err(_) => {
                return Err(CodedError::new(
                    ErrorCode::WrongArgs,
                    format!("unknown query type {}", params.query_type),
                ));
            }
        };

        let sources = params
            .streams
            .into_iter()
            .map(|stream| {
                let snapshot = self.snapshot(&stream.uuid, stream.version)?;
                let label = if stream.label.is_empty() {
                    parse_uuid(&stream.uuid)?.to_string()
                } else {
                    stream.label
                };
                Ok(CsvSource { label, snapshot })
            })
            .collect::<Result<Vec<_>, CodedError>>()?;

        Ok(CsvPlan {
            query,
            start: params.start_time,
            end: params.end_time,
            sources,
        })
    }
}
