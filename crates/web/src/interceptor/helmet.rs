use async_trait::async_trait;
use http::{HeaderName, HeaderValue, Response};

use crate::interceptor::Interceptor;
use crate::{RequestContext, ResponseBody};

const SECURITY_HEADERS: [(&str, &str); 12] = [
    (
        "content-security-policy",
        "default-src 'self';base-uri 'self';font-src 'self' https: data:;form-action 'self';\
         frame-ancestors 'self';img-src 'self' data:;object-src 'none';script-src 'self';\
         script-src-attr 'none';style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// The usual hardening headers, without overriding any a handler set itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct SecurityHeadersInterceptor;

#[async_trait]
impl Interceptor for SecurityHeadersInterceptor {
    async fn on_response(&self, _req: &RequestContext<'_, '_>, resp: &mut Response<ResponseBody>) {
        let headers = resp.headers_mut();
        for (name, value) in SECURITY_HEADERS {
            headers.entry(HeaderName::from_static(name)).or_insert(HeaderValue::from_static(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PathParams;
    use duet_http::protocol::RequestHeader;
    use http::Request;

    #[tokio::test]
    async fn adds_headers_but_keeps_existing() {
        let header: RequestHeader = Request::builder().uri("/").body(()).unwrap().into();
        let params = PathParams::empty();
        let ctx = RequestContext::new(&header, &params);
        let mut response = Response::new(ResponseBody::empty());
        response.headers_mut().insert("x-frame-options", HeaderValue::from_static("DENY"));

        SecurityHeadersInterceptor.on_response(&ctx, &mut response).await;

        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert_eq!(response.headers().len(), SECURITY_HEADERS.len());
    }
}
