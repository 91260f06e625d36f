use std::convert::Infallible;

use duet_http::config::format_byte_size;
use duet_http::dispatch::EchoError;
use duet_http::iso_timestamp;
use http::header::CONNECTION;
use http::{HeaderValue, Response, StatusCode};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::extract::Json;
use crate::responder::Responder;
use crate::{RequestContext, ResponseBody};

const JSON_HINT: &str = "Please send valid JSON in the request body";

/// Everything an extractor or a route can fail with. Each variant renders as the
/// JSON error body clients of this server expect.
#[derive(Error, Debug)]
pub enum WebError {
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("invalid json body: {0}")]
    InvalidJson(String),

    #[error("invalid form body: {0}")]
    InvalidForm(String),

    #[error("invalid query string: {0}")]
    InvalidQuery(String),

    #[error("request body is not valid utf-8")]
    InvalidUtf8,

    #[error("unsupported content type")]
    UnsupportedMediaType,

    #[error("request body has already been consumed")]
    BodyConsumed,

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("no request id was assigned")]
    MissingRequestId,

    #[error("{0}")]
    Internal(String),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            WebError::InvalidJson(_) | WebError::InvalidForm(_) | WebError::InvalidQuery(_) | WebError::InvalidUtf8 => {
                StatusCode::BAD_REQUEST
            }
            WebError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            WebError::BodyConsumed | WebError::BodyRead(_) | WebError::MissingRequestId | WebError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<Infallible> for WebError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

impl From<EchoError> for WebError {
    fn from(e: EchoError) -> Self {
        match e {
            EchoError::PayloadTooLarge { limit, .. } => WebError::PayloadTooLarge { limit },
            EchoError::MalformedBody { source, .. } => WebError::InvalidJson(source.to_string()),
            EchoError::TransportReadFailure(cause) => WebError::BodyRead(cause.to_string()),
            EchoError::BodyTimeout(after) => WebError::BodyRead(format!("no body within {after:?}")),
        }
    }
}

impl Responder for WebError {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        let request_id = req.request_id();
        let status = self.status();

        let body = match &self {
            WebError::PayloadTooLarge { limit } => {
                warn!(?request_id, limit, "request body too large");
                json!({
                    "error": "Request body too large",
                    "maxSize": format_byte_size(*limit),
                    "requestId": request_id,
                })
            }
            WebError::InvalidJson(reason) | WebError::InvalidForm(reason) => {
                warn!(?request_id, %reason, "rejected request body");
                json!({
                    "error": "Invalid JSON format",
                    "requestId": request_id,
                    "hint": JSON_HINT,
                    "timestamp": iso_timestamp(),
                })
            }
            WebError::InvalidQuery(_) | WebError::InvalidUtf8 => json!({
                "error": "Bad Request",
                "message": self.to_string(),
                "requestId": request_id,
            }),
            WebError::UnsupportedMediaType => json!({
                "error": "Unsupported Media Type",
                "requestId": request_id,
                "timestamp": iso_timestamp(),
            }),
            WebError::BodyConsumed | WebError::BodyRead(_) | WebError::MissingRequestId | WebError::Internal(_) => {
                error!(?request_id, cause = %self, "request failed");
                json!({
                    "error": "Internal server error",
                    "requestId": request_id,
                    "timestamp": iso_timestamp(),
                })
            }
        };

        let mut response = (status, Json(body)).response_to(req);
        if matches!(self, WebError::PayloadTooLarge { .. }) {
            // the rest of the body is not worth draining
            response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
        }
        response
    }
}
