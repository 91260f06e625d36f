use std::time::Instant;

use async_trait::async_trait;
use http::Response;
use http::header::CONTENT_LENGTH;
use http_body::Body;
use tracing::info;

use crate::interceptor::Interceptor;
use crate::{OptionReqBody, RequestContext, ResponseBody};

#[derive(Debug, Clone, Copy)]
struct RequestStart(Instant);

/// One line per request: `method path status length - elapsed ms [request-id]`.
///
/// Register it last so the length reflects any compression.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessLogInterceptor;

#[async_trait]
impl Interceptor for AccessLogInterceptor {
    async fn on_request(&self, req: &mut RequestContext<'_, '_>, _body: &mut OptionReqBody) {
        req.extensions_mut().insert(RequestStart(Instant::now()));
    }

    async fn on_response(&self, req: &RequestContext<'_, '_>, resp: &mut Response<ResponseBody>) {
        let elapsed_ms =
            req.extensions().get::<RequestStart>().map_or(0.0, |start| start.0.elapsed().as_secs_f64() * 1000.0);
        let status = resp.status().as_u16();
        let length = response_length(resp);
        let request_id = req.request_id().map_or("-", |id| id.as_str());
        let path = req.uri().path_and_query().map_or("/", |p| p.as_str());

        info!(
            method = %req.method(),
            path,
            status,
            length = %length,
            elapsed_ms,
            request_id,
            "{} {path} {status} {length} - {elapsed_ms:.3} ms [{request_id}]",
            req.method()
        );
    }
}

fn response_length(resp: &Response<ResponseBody>) -> String {
    if let Some(value) = resp.headers().get(CONTENT_LENGTH).and_then(|v| v.to_str().ok()) {
        return value.to_owned();
    }
    resp.body().size_hint().exact().map_or_else(|| "-".to_owned(), |n| n.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_prefers_header_then_hint() {
        let mut response = Response::new(ResponseBody::from("twelve bytes"));
        assert_eq!(response_length(&response), "12");

        response.headers_mut().insert(CONTENT_LENGTH, http::HeaderValue::from_static("3"));
        assert_eq!(response_length(&response), "3");
    }
}
