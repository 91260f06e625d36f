//! Conversion of handler return values into responses.
//!
//! Implemented for `String` and `&'static str` (plain text), [`Json`] (compact JSON),
//! `(StatusCode, T)`, ready-made `Response<B>`, `Result<T, E>` and `Option<T>`.

use std::convert::Infallible;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::body::ResponseBody;
use crate::extract::Json;
use crate::RequestContext;

const TEXT_PLAIN_UTF_8: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
const APPLICATION_JSON_UTF_8: HeaderValue = HeaderValue::from_static("application/json; charset=utf-8");

/// A value a handler can return.
pub trait Responder {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody>;
}

impl<T: Responder, E: Responder> Responder for Result<T, E> {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        match self {
            Ok(t) => t.response_to(req),
            Err(e) => e.response_to(req),
        }
    }
}

/// `None` is an empty 200.
impl<T: Responder> Responder for Option<T> {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        match self {
            Some(t) => t.response_to(req),
            None => Response::new(ResponseBody::empty()),
        }
    }
}

impl<B> Responder for Response<B>
where
    B: Into<ResponseBody>,
{
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        self.map(Into::into)
    }
}

impl<T: Responder> Responder for (StatusCode, T) {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        let (status, responder) = self;
        let mut response = responder.response_to(req);
        *response.status_mut() = status;
        response
    }
}

impl Responder for () {
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        Response::new(ResponseBody::empty())
    }
}

impl Responder for &'static str {
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        with_content_type(ResponseBody::from(self), TEXT_PLAIN_UTF_8)
    }
}

impl Responder for String {
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        with_content_type(ResponseBody::from(self), TEXT_PLAIN_UTF_8)
    }
}

impl<T: Serialize> Responder for Json<T> {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        match serde_json::to_vec(&self.0) {
            Ok(bytes) => with_content_type(ResponseBody::once(Bytes::from(bytes)), APPLICATION_JSON_UTF_8),
            Err(e) => {
                error!(cause = %e, path = req.uri().path(), "failed to serialize response body");
                let mut response = Response::new(ResponseBody::empty());
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    }
}

impl Responder for Infallible {
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        match self {}
    }
}

fn with_content_type(body: ResponseBody, content_type: HeaderValue) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PathParams;
    use duet_http::protocol::RequestHeader;
    use http::Request;
    use http_body::Body;
    use serde_json::json;

    fn respond<R: Responder>(responder: R) -> Response<ResponseBody> {
        let header: RequestHeader = Request::builder().uri("/").body(()).unwrap().into();
        let params = PathParams::empty();
        let ctx = RequestContext::new(&header, &params);
        responder.response_to(&ctx)
    }

    #[test]
    fn text_responders() {
        let response = respond("hello");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(response.body().size_hint().exact(), Some(5));
    }

    #[test]
    fn json_with_status() {
        let response = respond((StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json; charset=utf-8");
        assert_eq!(response.body().size_hint().exact(), Some(24));
    }

    #[test]
    fn result_picks_the_branch() {
        let ok: Result<&'static str, (StatusCode, &'static str)> = Ok("fine");
        assert_eq!(respond(ok).status(), StatusCode::OK);

        let err: Result<&'static str, (StatusCode, &'static str)> = Err((StatusCode::BAD_REQUEST, "nope"));
        assert_eq!(respond(err).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn none_is_empty() {
        let response = respond(None::<String>);
        assert!(response.body().is_end_stream());
    }
}
