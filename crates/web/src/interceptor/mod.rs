//! Hooks that run around every request, matched or not.
//!
//! `on_request` hooks run in registration order before the handler; `on_response`
//! hooks run in the same order after it, so a later interceptor sees what earlier
//! ones did to the response.

mod access_log;
mod cors;
pub mod encoding;
mod helmet;
mod request_id;

pub use access_log::AccessLogInterceptor;
pub use cors::CorsInterceptor;
pub use encoding::encoder::EncodeInterceptor;
pub use helmet::SecurityHeadersInterceptor;
pub use request_id::RequestIdInterceptor;

use async_trait::async_trait;
use http::Response;

use crate::{OptionReqBody, RequestContext, ResponseBody};

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn on_request(&self, _req: &mut RequestContext<'_, '_>, _body: &mut OptionReqBody) {}

    async fn on_response(&self, _req: &RequestContext<'_, '_>, _resp: &mut Response<ResponseBody>) {}
}

pub struct Interceptors {
    inner: Vec<Box<dyn Interceptor>>,
}

impl std::fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptors").field("len", &self.inner.len()).finish()
    }
}

#[async_trait]
impl Interceptor for Interceptors {
    async fn on_request(&self, req: &mut RequestContext<'_, '_>, body: &mut OptionReqBody) {
        for interceptor in &self.inner {
            interceptor.on_request(req, body).await;
        }
    }

    async fn on_response(&self, req: &RequestContext<'_, '_>, resp: &mut Response<ResponseBody>) {
        for interceptor in &self.inner {
            interceptor.on_response(req, resp).await;
        }
    }
}

impl Interceptors {
    pub fn builder() -> InterceptorsBuilder {
        InterceptorsBuilder::new()
    }
}

#[derive(Default)]
pub struct InterceptorsBuilder {
    inner: Vec<Box<dyn Interceptor>>,
}

impl InterceptorsBuilder {
    fn new() -> Self {
        Self::default()
    }

    pub fn add_last<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.inner.push(Box::new(interceptor));
        self
    }

    pub fn add_first<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.inner.insert(0, Box::new(interceptor));
        self
    }

    pub fn build(self) -> Interceptors {
        Interceptors { inner: self.inner }
    }
}
