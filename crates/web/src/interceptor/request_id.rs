use async_trait::async_trait;
use duet_http::request_id::RequestId;
use http::Response;

use crate::interceptor::Interceptor;
use crate::{OptionReqBody, RequestContext, ResponseBody};

/// Assigns every request a fresh id and echoes it as `X-Request-ID`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestIdInterceptor;

#[async_trait]
impl Interceptor for RequestIdInterceptor {
    async fn on_request(&self, req: &mut RequestContext<'_, '_>, _body: &mut OptionReqBody) {
        req.extensions_mut().insert(RequestId::generate());
    }

    async fn on_response(&self, req: &RequestContext<'_, '_>, resp: &mut Response<ResponseBody>) {
        if let Some(request_id) = req.request_id() {
            request_id.tag(resp.headers_mut());
        }
    }
}
