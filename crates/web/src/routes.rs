//! The framework server's endpoints: health, greeting, echo, data, upload simulation
//! and error simulation, plus the JSON 404 fallback.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use duet_http::health::HealthSnapshot;
use duet_http::iso_timestamp;
use duet_http::request_id::RequestId;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::extract::{Json, ParsedBody, Query};
use crate::handler::RequestHandler;
use crate::interceptor::CorsInterceptor;
use crate::router::{RouteError, Router, get, post};
use crate::{OptionReqBody, RequestContext, Responder, ResponseBody, WebError, handler_fn};

pub const SERVER_LABEL: &str = "express";

pub const AVAILABLE_ENDPOINTS: [&str; 6] = [
    "GET /health",
    "GET /api/hello",
    "POST /api/echo",
    "GET /api/data",
    "POST /api/upload",
    "GET /api/error?type=validation",
];

const DATA_DELAY: Duration = Duration::from_millis(100);

const TIMEOUT_DELAY: Duration = Duration::from_secs(30);

const ERROR_TYPES: [&str; 4] = ["timeout", "validation", "auth", "server"];

/// Every route, with `/health` reporting `environment`.
pub fn router(environment: &str) -> Result<Router, RouteError> {
    let environment = environment.to_owned();
    let health = move || std::future::ready(Json(HealthSnapshot::capture(SERVER_LABEL, &environment)));

    Router::builder()
        .route("/health", get(handler_fn(health)))
        .route("/api/hello", get(handler_fn(hello)))
        .route("/api/echo", post(handler_fn(echo)))
        .route("/api/data", get(handler_fn(data)))
        .route("/api/upload", post(handler_fn(upload)))
        .route("/api/error", get(handler_fn(simulate_error)))
        .build()
}

async fn hello(request_id: RequestId, Query(query): Query<BTreeMap<String, String>>) -> Json<Value> {
    Json(json!({
        "message": "Hello from Express server!",
        "query": query,
        "requestId": request_id,
        "timestamp": iso_timestamp(),
        "server": SERVER_LABEL,
    }))
}

async fn echo(request_id: RequestId, headers: HeaderMap, ParsedBody(body): ParsedBody) -> Json<Value> {
    let body_size = body.to_string().len();
    info!(%request_id, body_size, "echo endpoint processed");

    let mut response = Map::new();
    response.insert("echo".into(), body);
    response.insert("server".into(), SERVER_LABEL.into());
    response.insert("requestId".into(), request_id.as_str().into());
    response.insert("receivedAt".into(), iso_timestamp().into());
    if let Some(content_type) = header_str(&headers, CONTENT_TYPE) {
        response.insert("contentType".into(), content_type.into());
    }
    response.insert("bodySize".into(), format!("{body_size} bytes").into());
    Json(Value::Object(response))
}

async fn data(request_id: RequestId) -> Json<Value> {
    tokio::time::sleep(DATA_DELAY).await;
    Json(json!({
        "data": {
            "users": 42,
            "posts": 128,
            "categories": ["tech", "science", "arts", "business"],
            "lastUpdated": iso_timestamp(),
            "stats": {
                "activeUsers": 38,
                "publishedPosts": 95,
                "draftPosts": 33,
            },
        },
        "server": SERVER_LABEL,
        "requestId": request_id,
        "timestamp": iso_timestamp(),
        "processingTime": "100ms",
    }))
}

/// Reports what arrived without storing anything.
async fn upload(request_id: RequestId, headers: HeaderMap, ParsedBody(body): ParsedBody) -> Json<Value> {
    let mut received = Map::new();
    if let Some(content_type) = header_str(&headers, CONTENT_TYPE) {
        received.insert("contentType".into(), content_type.into());
    }
    if let Some(content_length) = header_str(&headers, CONTENT_LENGTH) {
        received.insert("contentLength".into(), content_length.into());
    }
    received.insert("body".into(), body);

    Json(json!({
        "message": "Upload endpoint (simulation)",
        "server": SERVER_LABEL,
        "requestId": request_id,
        "received": received,
        "timestamp": iso_timestamp(),
        "note": "Use multer middleware for real file uploads",
    }))
}

#[derive(Debug, Deserialize)]
struct ErrorParams {
    #[serde(rename = "type")]
    kind: Option<String>,
}

async fn simulate_error(
    request_id: RequestId,
    Query(params): Query<ErrorParams>,
) -> Result<(StatusCode, Json<Value>), WebError> {
    let kind = params.kind.unwrap_or_else(|| "generic".to_owned());
    warn!(%request_id, kind = kind.as_str(), "simulating error");

    let (status, body) = match kind.as_str() {
        "timeout" => {
            tokio::time::sleep(TIMEOUT_DELAY).await;
            (StatusCode::OK, json!({ "message": "This should timeout" }))
        }
        "validation" => (
            StatusCode::BAD_REQUEST,
            json!({
                "error": "Validation failed",
                "details": ["Field \"name\" is required", "Field \"age\" must be a number"],
                "requestId": request_id,
            }),
        ),
        "auth" => (
            StatusCode::UNAUTHORIZED,
            json!({
                "error": "Unauthorized",
                "message": "Invalid or missing authentication token",
                "requestId": request_id,
            }),
        ),
        "server" => return Err(WebError::Internal("Simulated server error".to_owned())),
        _ => (
            StatusCode::BAD_REQUEST,
            json!({
                "error": "Bad Request",
                "message": "Unknown error type",
                "availableTypes": ERROR_TYPES,
                "requestId": request_id,
            }),
        ),
    };
    Ok((status, Json(body)))
}

fn header_str(headers: &HeaderMap, name: http::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Answers CORS preflight for any path and a JSON 404 for everything else unrouted.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fallback;

#[async_trait]
impl RequestHandler for Fallback {
    async fn invoke<'server, 'req>(
        &self,
        req: &mut RequestContext<'server, 'req>,
        _req_body: OptionReqBody,
    ) -> Response<ResponseBody> {
        if req.method() == Method::OPTIONS {
            return CorsInterceptor::preflight(req);
        }

        let request_id = req.request_id();
        warn!(?request_id, method = %req.method(), path = req.uri().path(), "404 - route not found");
        let body = json!({
            "error": "Route not found",
            "requestId": request_id,
            "availableEndpoints": AVAILABLE_ENDPOINTS,
            "timestamp": iso_timestamp(),
        });
        (StatusCode::NOT_FOUND, Json(body)).response_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BodyLimit;
    use duet_http::protocol::body::ReqBody;
    use duet_http::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};
    use futures::stream;
    use http::Request;
    use http_body_util::BodyExt;

    type Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>;

    /// Routes `request` through `router`, falling back like the server does.
    async fn call(request: Request<&'static str>) -> (StatusCode, Value) {
        let router = router("test").unwrap();
        let (parts, payload) = request.into_parts();
        let header = RequestHeader::from(parts);

        let route_result = router.at(header.uri().path());
        let mut ctx = RequestContext::new(&header, route_result.params());
        ctx.extensions_mut().insert(RequestId::generate());
        ctx.extensions_mut().insert(BodyLimit(1024));

        let items: Vec<Item> = if payload.is_empty() {
            vec![Ok(Message::Payload(PayloadItem::Eof))]
        } else {
            vec![
                Ok(Message::Payload(PayloadItem::Chunk(bytes::Bytes::from_static(payload.as_bytes())))),
                Ok(Message::Payload(PayloadItem::Eof)),
            ]
        };
        let mut source = stream::iter(items);
        let (body, mut sender) = ReqBody::body_channel(&mut source, PayloadSize::Chunked);

        let handler = route_result
            .router_items()
            .iter()
            .find(|item| item.filter().matches(&ctx))
            .map_or(&Fallback as &dyn RequestHandler, |item| item.handler());

        let (response, _) = tokio::join!(handler.invoke(&mut ctx, OptionReqBody::from(body)), sender.send_body());
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get_req(uri: &str) -> Request<&'static str> {
        Request::builder().uri(uri).body("").unwrap()
    }

    fn post_json(uri: &str, body: &'static str) -> Request<&'static str> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, body.len())
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_label() {
        let (status, body) = call(get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["server"], "express");
        assert_eq!(body["environment"], "test");
    }

    #[tokio::test]
    async fn hello_echoes_query() {
        let (status, body) = call(get_req("/api/hello?name=duet&name=web&lang=rust")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Hello from Express server!");
        assert_eq!(body["query"], json!({ "name": "web", "lang": "rust" }));
    }

    #[tokio::test]
    async fn echo_measures_reserialized_body() {
        let (status, body) = call(post_json("/api/echo", "{ \"a\" : 1 }")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["echo"], json!({ "a": 1 }));
        assert_eq!(body["contentType"], "application/json");
        assert_eq!(body["bodySize"], "7 bytes");
    }

    #[tokio::test]
    async fn echo_rejects_invalid_json() {
        let (status, body) = call(post_json("/api/echo", "{oops")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid JSON format");
    }

    #[tokio::test]
    async fn echo_over_limit() {
        let big: &'static str = Box::leak("x".repeat(2048).into_boxed_str());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/echo")
            .header(CONTENT_TYPE, "application/json")
            .body(big)
            .unwrap();
        let (status, body) = call(request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["maxSize"], "1KB");
    }

    #[tokio::test]
    async fn upload_reports_headers() {
        let (status, body) = call(post_json("/api/upload", "{\"file\":\"a.txt\"}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"]["contentType"], "application/json");
        assert_eq!(body["received"]["contentLength"], "16");
        assert_eq!(body["received"]["body"]["file"], "a.txt");
    }

    #[tokio::test]
    async fn error_simulation_statuses() {
        assert_eq!(call(get_req("/api/error?type=validation")).await.0, StatusCode::BAD_REQUEST);
        assert_eq!(call(get_req("/api/error?type=auth")).await.0, StatusCode::UNAUTHORIZED);

        let (status, body) = call(get_req("/api/error?type=server")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");

        let (status, body) = call(get_req("/api/error")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["availableTypes"], json!(ERROR_TYPES));
    }

    #[tokio::test]
    async fn unknown_route_lists_endpoints() {
        let (status, body) = call(get_req("/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Route not found");
        assert_eq!(body["availableEndpoints"].as_array().map(Vec::len), Some(6));
    }
}
