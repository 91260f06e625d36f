//! The built-in request dispatcher: an exact `(method, path)` match over four
//! routes plus a JSON 404.
//!
//! `POST /api/echo` accumulates the streamed body itself so the size limit is
//! enforced per chunk, before anything is appended.

use std::convert::Infallible;
use std::error::Error;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use http::header::{CONNECTION, CONTENT_TYPE};
use http::{HeaderValue, Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{ServerConfig, format_byte_size};
use crate::handler::Handler;
use crate::health::HealthSnapshot;
use crate::protocol::ParseError;
use crate::protocol::body::ReqBody;
use crate::request_id::RequestId;
use crate::utils::iso_timestamp;

pub const SERVER_LABEL: &str = "built-in-http";

pub const AVAILABLE_ENDPOINTS: [&str; 4] = ["GET /health", "GET /api/hello", "POST /api/echo", "GET /api/data"];

const DATA_DELAY: Duration = Duration::from_millis(100);

const PREVIEW_CHARS: usize = 100;

type BoxError = Box<dyn Error + Send + Sync>;

/// Why reading or parsing an echo body failed. Each maps to one status code.
#[derive(Error, Debug)]
pub enum EchoError {
    #[error("request body exceeds {limit} bytes ({received} received)")]
    PayloadTooLarge { received: u64, limit: u64 },

    #[error("request body is not valid JSON: {source}")]
    MalformedBody {
        #[source]
        source: serde_json::Error,
        preview: String,
    },

    #[error("failed to read request body: {0}")]
    TransportReadFailure(#[source] BoxError),

    #[error("request body not received within {0:?}")]
    BodyTimeout(Duration),
}

impl EchoError {
    pub fn status(&self) -> StatusCode {
        match self {
            EchoError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            EchoError::MalformedBody { .. } => StatusCode::BAD_REQUEST,
            EchoError::TransportReadFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EchoError::BodyTimeout(_) => StatusCode::REQUEST_TIMEOUT,
        }
    }

    /// The peer hung up; nobody is left to read a response.
    fn is_peer_gone(&self) -> bool {
        match self {
            EchoError::TransportReadFailure(cause) => {
                cause.downcast_ref::<ParseError>().is_some_and(ParseError::is_connection_closed)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    max_body_size: u64,
    body_timeout: Option<Duration>,
    environment: String,
}

impl Dispatcher {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            max_body_size: config.max_body_size,
            body_timeout: config.body_timeout(),
            environment: config.environment.clone(),
        }
    }

    pub async fn dispatch<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: Into<BoxError>,
    {
        let request_id = RequestId::generate();
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let query = query_params(req.uri().query());
        info!(%method, %path, %request_id, ?query, "{method} {path}");

        let mut response = match (&method, path.as_str()) {
            (&Method::GET, "/health") => {
                let snapshot = HealthSnapshot::capture(SERVER_LABEL, &self.environment);
                info!(%request_id, status = "ok", "health check requested");
                json_response(StatusCode::OK, &snapshot, Style::Pretty)
            }
            (&Method::GET, "/api/hello") => {
                let body = json!({
                    "message": "Hello from built-in HTTP server!",
                    "query": query,
                    "requestId": request_id,
                    "timestamp": iso_timestamp(),
                    "server": SERVER_LABEL,
                });
                info!(%request_id, "hello endpoint accessed");
                json_response(StatusCode::OK, &body, Style::Pretty)
            }
            (&Method::POST, "/api/echo") => self.echo(&request_id, req.into_body()).await,
            (&Method::GET, "/api/data") => {
                tokio::time::sleep(DATA_DELAY).await;
                let body = json!({
                    "data": {
                        "users": 42,
                        "posts": 128,
                        "categories": ["tech", "science", "arts"],
                        "lastUpdated": iso_timestamp(),
                    },
                    "server": SERVER_LABEL,
                    "requestId": request_id,
                    "timestamp": iso_timestamp(),
                });
                info!(%request_id, "data endpoint accessed");
                json_response(StatusCode::OK, &body, Style::Pretty)
            }
            _ => {
                let body = json!({
                    "error": "Not found",
                    "server": SERVER_LABEL,
                    "requestId": request_id,
                    "availableEndpoints": AVAILABLE_ENDPOINTS,
                    "timestamp": iso_timestamp(),
                });
                warn!(%request_id, %method, %path, "404 - route not found");
                json_response(StatusCode::NOT_FOUND, &body, Style::Pretty)
            }
        };

        request_id.tag(response.headers_mut());
        response
    }

    async fn echo<B>(&self, request_id: &RequestId, body: B) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: Into<BoxError>,
    {
        let accumulated = match self.body_timeout {
            Some(limit) => tokio::time::timeout(limit, accumulate(body, self.max_body_size))
                .await
                .unwrap_or(Err(EchoError::BodyTimeout(limit))),
            None => accumulate(body, self.max_body_size).await,
        };

        match accumulated.and_then(|buffer| parse_json(&buffer).map(|echo| (echo, buffer.len()))) {
            Ok((echo, body_size)) => {
                let body = json!({
                    "echo": echo,
                    "server": SERVER_LABEL,
                    "requestId": request_id,
                    "receivedAt": iso_timestamp(),
                    "bodySize": format!("{body_size} bytes"),
                });
                info!(%request_id, body_size, "echo endpoint processed");
                json_response(StatusCode::OK, &body, Style::Pretty)
            }
            Err(e) => self.echo_error(request_id, e),
        }
    }

    fn echo_error(&self, request_id: &RequestId, e: EchoError) -> Response<Full<Bytes>> {
        let status = e.status();
        let mut response = match &e {
            EchoError::PayloadTooLarge { received, .. } => {
                warn!(%request_id, body_size = received, "request body too large");
                let body = json!({
                    "error": "Request body too large",
                    "maxSize": format_byte_size(self.max_body_size),
                    "requestId": request_id,
                });
                json_response(status, &body, Style::Compact)
            }
            EchoError::MalformedBody { source, preview } => {
                warn!(%request_id, cause = %source, body_preview = %preview, "invalid JSON received");
                let body = json!({
                    "error": "Invalid JSON format",
                    "requestId": request_id,
                    "hint": format!("Please send valid JSON in the request body ({source})"),
                });
                return json_response(status, &body, Style::Pretty);
            }
            EchoError::TransportReadFailure(cause) => {
                if e.is_peer_gone() {
                    info!(%request_id, %cause, "client disconnected before the body completed");
                } else {
                    error!(%request_id, %cause, "request error");
                }
                let body = json!({ "error": "Request processing failed", "requestId": request_id });
                return json_response(status, &body, Style::Compact);
            }
            EchoError::BodyTimeout(limit) => {
                warn!(%request_id, timeout_ms = limit.as_millis() as u64, "request body timed out");
                let body = json!({ "error": "Request body timeout", "requestId": request_id });
                json_response(status, &body, Style::Compact)
            }
        };

        // the rest of the body is still on the wire
        response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
        response
    }
}

impl Handler for Dispatcher {
    type RespBody = Full<Bytes>;
    type Error = Infallible;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error> {
        Ok(self.dispatch(req).await)
    }
}

/// Reads frames in arrival order, checking the running total before each append.
pub async fn accumulate<B>(mut body: B, limit: u64) -> Result<BytesMut, EchoError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<BoxError>,
{
    let mut buffer = BytesMut::new();
    let mut received: u64 = 0;

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| EchoError::TransportReadFailure(e.into()))?;
        let Ok(chunk) = frame.into_data() else {
            continue;
        };

        received += chunk.len() as u64;
        if received > limit {
            return Err(EchoError::PayloadTooLarge { received, limit });
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer)
}

/// Blank bodies are `null`; anything else must be one strict JSON value.
pub fn parse_json(buffer: &[u8]) -> Result<Value, EchoError> {
    if buffer.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(buffer).map_err(|source| EchoError::MalformedBody {
        source,
        preview: String::from_utf8_lossy(buffer).chars().take(PREVIEW_CHARS).collect(),
    })
}

/// Decodes the query string; a repeated key keeps its last value.
pub fn query_params(query: Option<&str>) -> Map<String, Value> {
    let pairs: Vec<(String, String)> = query.and_then(|q| serde_urlencoded::from_str(q).ok()).unwrap_or_default();
    pairs.into_iter().map(|(key, value)| (key, Value::String(value))).collect()
}

#[derive(Debug, Clone, Copy)]
enum Style {
    Pretty,
    Compact,
}

fn json_response<T: Serialize>(status: StatusCode, body: &T, style: Style) -> Response<Full<Bytes>> {
    let encoded = match style {
        Style::Pretty => serde_json::to_vec_pretty(body),
        Style::Compact => serde_json::to_vec(body),
    };
    let bytes = match encoded {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            error!(cause = %e, "failed to serialize response body");
            Bytes::from_static(b"{}")
        }
    };

    let mut response = Response::new(Full::new(bytes));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
