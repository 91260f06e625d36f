use async_trait::async_trait;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_REQUEST_HEADERS, InvalidHeaderValue, VARY,
};
use http::{HeaderValue, Method, Response, StatusCode};

use crate::interceptor::Interceptor;
use crate::{RequestContext, ResponseBody};

const ALLOW_METHODS: HeaderValue = HeaderValue::from_static("GET,HEAD,PUT,PATCH,POST,DELETE");

/// Adds `Access-Control-Allow-Origin` to every response and completes preflight
/// answers produced by [`CorsInterceptor::preflight`].
#[derive(Debug, Clone)]
pub struct CorsInterceptor {
    allow_origin: HeaderValue,
}

impl CorsInterceptor {
    pub fn new(allow_origin: &str) -> Result<Self, InvalidHeaderValue> {
        Ok(Self { allow_origin: HeaderValue::from_str(allow_origin)? })
    }

    /// An empty 204 allowing the usual methods and whatever headers the client asked for.
    pub fn preflight(req: &RequestContext) -> Response<ResponseBody> {
        let mut response = Response::new(ResponseBody::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;

        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS);
        if let Some(requested) = req.headers().get(ACCESS_CONTROL_REQUEST_HEADERS) {
            headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
            headers.append(VARY, HeaderValue::from_static("Access-Control-Request-Headers"));
        }
        response
    }
}

#[async_trait]
impl Interceptor for CorsInterceptor {
    async fn on_response(&self, req: &RequestContext<'_, '_>, resp: &mut Response<ResponseBody>) {
        let headers = resp.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        if self.allow_origin != "*" {
            headers.append(VARY, HeaderValue::from_static("Origin"));
        }
        if req.method() == Method::OPTIONS && !headers.contains_key(ACCESS_CONTROL_ALLOW_METHODS) {
            headers.insert(ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS);
        }
    }
}
