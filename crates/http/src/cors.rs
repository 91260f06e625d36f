//! CORS headers for the built-in server, plus short-circuiting preflight requests.

use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, HeaderMap,
    InvalidHeaderValue,
};
use http::{HeaderValue, Method, Request, Response};
use tracing::debug;

use crate::handler::Handler;
use crate::protocol::body::ReqBody;
use crate::request_id::RequestId;

const ALLOW_METHODS: HeaderValue = HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS");
const ALLOW_HEADERS: HeaderValue = HeaderValue::from_static("Content-Type, Authorization");

/// Wraps a handler; `OPTIONS` never reaches it and gets an empty 200 instead.
#[derive(Debug, Clone)]
pub struct Cors<H> {
    inner: H,
    allow_origin: HeaderValue,
}

impl<H> Cors<H> {
    pub fn new(inner: H, allow_origin: &str) -> Result<Self, InvalidHeaderValue> {
        Ok(Self { inner, allow_origin: HeaderValue::from_str(allow_origin)? })
    }

    fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS);
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS);
    }
}

impl<H> Handler for Cors<H>
where
    H: Handler + Sync,
    H::RespBody: Default,
{
    type RespBody = H::RespBody;
    type Error = H::Error;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error> {
        if req.method() == Method::OPTIONS {
            let request_id = RequestId::generate();
            debug!(%request_id, path = req.uri().path(), "answered preflight");

            let mut response = Response::new(H::RespBody::default());
            request_id.tag(response.headers_mut());
            self.apply(response.headers_mut());
            return Ok(response);
        }

        let mut response = self.inner.call(req).await?;
        self.apply(response.headers_mut());
        Ok(response)
    }
}
