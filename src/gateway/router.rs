use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tonic::codec::Streaming;
use tonic::transport::Channel;
use tonic::{Code, Status};
use tracing::{debug, info};

use super::config::GatewayConfig;
use super::response::{ErrorBody, StreamLine, rejected, rpc_error};
use super::validate::Validate;
use crate::proto::Reply;
use crate::proto::btrdb_client::BtrdbClient;

type Upstream = BtrdbClient<Channel>;

/// A type-erased route: decodes the body, calls upstream and renders the reply.
type Handler = Arc<dyn Fn(Upstream, Bytes) -> BoxFuture<'static, Response> + Send + Sync>;

/// JSON front for the `v5api.Btrdb` service.
///
/// Every operation is one entry in a table keyed by its lowercased name; all of them share a
/// single upstream channel.
pub struct Gateway {
    upstream: Upstream,
    routes: HashMap<&'static str, Handler>,
    config: GatewayConfig,
}

impl Gateway {
    /// A gateway with every operation registered, forwarding to `channel`.
    pub fn new(channel: Channel, config: GatewayConfig) -> Self {
        let upstream = BtrdbClient::new(channel)
            .max_decoding_message_size(config.max_message_size)
            .max_encoding_message_size(config.max_message_size);
        let mut gateway = Self {
            upstream,
            routes: HashMap::new(),
            config,
        };
        gateway.register_catalog();
        gateway
    }

    /// Register a unary operation.
    pub fn unary<Req, Resp, F, Fut>(&mut self, op: &'static str, call: F)
    where
        Req: DeserializeOwned + Default + Validate + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(Upstream, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<tonic::Response<Resp>, Status>> + Send + 'static,
    {
        let call = Arc::new(call);
        let handler: Handler = Arc::new(move |upstream, body| {
            let call = call.clone();
            Box::pin(async move {
                let request = match decode::<Req>(&body) {
                    Ok(request) => request,
                    Err(response) => return response,
                };
                let mut scope = CallScope::new(op);
                let response = match call(upstream, request).await {
                    Ok(response) => axum::Json(response.into_inner()).into_response(),
                    Err(status) => {
                        debug!(op, code = ?status.code(), "upstream call failed");
                        rpc_error(&status)
                    }
                };
                scope.finish();
                response
            })
        });
        self.routes.insert(op, handler);
        debug!(op, "registered unary route");
    }

    /// Register a server-streaming operation, rendered as newline-delimited JSON.
    pub fn streaming<Req, Resp, F, Fut>(&mut self, op: &'static str, call: F)
    where
        Req: DeserializeOwned + Default + Validate + Send + 'static,
        Resp: Reply + Serialize + Send + 'static,
        F: Fn(Upstream, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<tonic::Response<Streaming<Resp>>, Status>> + Send + 'static,
    {
        let call = Arc::new(call);
        let handler: Handler = Arc::new(move |upstream, body| {
            let call = call.clone();
            Box::pin(async move {
                let request = match decode::<Req>(&body) {
                    Ok(request) => request,
                    Err(response) => return response,
                };
                let scope = CallScope::new(op);
                match call(upstream, request).await {
                    Ok(response) => ndjson(response.into_inner(), scope),
                    Err(status) => {
                        debug!(op, code = ?status.code(), "upstream call failed");
                        let mut scope = scope;
                        scope.finish();
                        rpc_error(&status)
                    }
                }
            })
        });
        self.routes.insert(op, handler);
        debug!(op, "registered streaming route");
    }

    /// Names of the registered operations.
    pub fn operations(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.routes.keys().copied()
    }

    /// The axum router serving `POST /v5/{op}`.
    pub fn into_router(self) -> Router {
        let limit = self.config.max_body_bytes;
        info!(operations = self.routes.len(), "HTTP gateway ready");
        Router::new()
            .route("/v5/{op}", post(dispatch))
            .layer(DefaultBodyLimit::max(limit))
            .with_state(Arc::new(self))
    }
}

async fn dispatch(
    State(gateway): State<Arc<Gateway>>,
    Path(op): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let op = op.to_ascii_lowercase();
    let Some(handler) = gateway.routes.get(op.as_str()) else {
        return rejected(Code::NotFound, format!("unknown operation '{op}'"));
    };

    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|content_type| content_type.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"));
    if !is_json {
        return (
            axum::http::StatusCode::UNSUPPORTED_MEDIA_TYPE,
            axum::Json(ErrorBody {
                code: Code::InvalidArgument as u32,
                message: "content type must be application/json".to_string(),
            }),
        )
            .into_response();
    }

    handler(gateway.upstream.clone(), body).await
}

/// Decode and validate a request body. An empty body is the default request.
fn decode<Req>(body: &[u8]) -> Result<Req, Response>
where
    Req: DeserializeOwned + Default + Validate,
{
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        Req::default()
    } else {
        serde_json::from_slice(body).map_err(|err| {
            rejected(Code::InvalidArgument, format!("invalid request body: {err}"))
        })?
    };
    request
        .validate()
        .map_err(|message| rejected(Code::InvalidArgument, message))?;
    Ok(request)
}

/// Render upstream frames as NDJSON. The body ends at the first frame carrying an error.
fn ndjson<Resp>(mut frames: Streaming<Resp>, mut scope: CallScope) -> Response
where
    Resp: Reply + Serialize + Send + 'static,
{
    let lines = async_stream::stream! {
        loop {
            match frames.message().await {
                Ok(Some(frame)) => {
                    let error = frame
                        .stat()
                        .filter(|stat| stat.code != 0)
                        .map(|stat| ErrorBody {
                            code: stat.code,
                            message: stat.msg.clone(),
                        });
                    let done = error.is_some();
                    let line = StreamLine { result: Some(&frame), error }.encode();
                    yield Ok::<_, Infallible>(line);
                    if done {
                        break;
                    }
                }
                Ok(None) => break,
                Err(status) => {
                    debug!(op = scope.op, code = ?status.code(), "upstream stream failed");
                    let line: StreamLine<'_, ()> = StreamLine {
                        result: None,
                        error: Some(ErrorBody::from_status(&status)),
                    };
                    let line = line.encode();
                    yield Ok(line);
                    break;
                }
            }
        }
        scope.finish();
    };

    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response()
}

/// Tracks one in-flight call. Dropped before [`CallScope::finish`] means the HTTP request went
/// away and the upstream call was cancelled with it.
struct CallScope {
    op: &'static str,
    finished: bool,
}

impl CallScope {
    fn new(op: &'static str) -> Self {
        debug!(op, "call started");
        Self {
            op,
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for CallScope {
    fn drop(&mut self) {
        if self.finished {
            debug!(op = self.op, "call finished");
        } else {
            info!(op = self.op, "call cancelled by client");
        }
    }
}
