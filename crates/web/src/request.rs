//! Per-request state shared by interceptors, extractors and responders.
//!
//! - `RequestContext`: the request head, matched path parameters, and typed extensions
//!   (request id, start time, body limit) that interceptors attach
//! - `PathParams`: named segments captured by the router

use duet_http::protocol::RequestHeader;
use duet_http::request_id::RequestId;
use http::{Extensions, HeaderMap, Method, Uri, Version};
use matchit::Params;

/// Upper bound for body-reading extractors, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLimit(pub u64);

/// The request head plus whatever interceptors attached to it.
///
/// The lifetimes tie the context to the router that matched it and to the request
/// it was built from.
#[derive(Debug)]
pub struct RequestContext<'server: 'req, 'req> {
    request_header: &'req RequestHeader,
    path_params: &'req PathParams<'server, 'req>,
    extensions: Extensions,
}

impl<'server, 'req> RequestContext<'server, 'req> {
    pub fn new(request_header: &'req RequestHeader, path_params: &'req PathParams<'server, 'req>) -> Self {
        Self { request_header, path_params, extensions: Extensions::new() }
    }

    pub fn request_header(&self) -> &RequestHeader {
        self.request_header
    }

    pub fn method(&self) -> &Method {
        self.request_header.method()
    }

    pub fn uri(&self) -> &Uri {
        self.request_header.uri()
    }

    pub fn version(&self) -> Version {
        self.request_header.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request_header.headers()
    }

    pub fn path_params(&self) -> &PathParams<'server, 'req> {
        self.path_params
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// The id assigned by the request-id interceptor, if it ran.
    pub fn request_id(&self) -> Option<&RequestId> {
        self.extensions.get::<RequestId>()
    }

    pub fn body_limit(&self) -> u64 {
        self.extensions.get::<BodyLimit>().map_or(duet_http::config::DEFAULT_MAX_BODY_SIZE, |limit| limit.0)
    }
}

/// Named path segments, e.g. `id` in `/users/{id}`.
#[derive(Debug, Clone)]
pub struct PathParams<'server, 'req> {
    kind: PathParamsKind<'server, 'req>,
}

#[derive(Debug, Clone)]
enum PathParamsKind<'server, 'req> {
    None,
    Params(Params<'server, 'req>),
}

impl<'server, 'req> PathParams<'server, 'req> {
    #[inline]
    fn new(params: Params<'server, 'req>) -> Self {
        if params.is_empty() { Self::empty() } else { Self { kind: PathParamsKind::Params(params) } }
    }

    #[inline]
    pub fn empty() -> Self {
        Self { kind: PathParamsKind::None }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        match &self.kind {
            PathParamsKind::None => 0,
            PathParamsKind::Params(params) => params.len(),
        }
    }

    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&'req str> {
        match &self.kind {
            PathParamsKind::Params(params) => params.get(key),
            PathParamsKind::None => None,
        }
    }
}

impl<'server, 'req> From<Params<'server, 'req>> for PathParams<'server, 'req> {
    fn from(params: Params<'server, 'req>) -> Self {
        PathParams::new(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    #[test]
    fn extensions_carry_request_state() {
        let header: RequestHeader = Request::builder().uri("/api/echo").body(()).unwrap().into();
        let params = PathParams::empty();
        let mut ctx = RequestContext::new(&header, &params);

        assert!(ctx.request_id().is_none());
        assert_eq!(ctx.body_limit(), duet_http::config::DEFAULT_MAX_BODY_SIZE);

        let id = RequestId::generate();
        ctx.extensions_mut().insert(id.clone());
        ctx.extensions_mut().insert(BodyLimit(1024));

        assert_eq!(ctx.request_id(), Some(&id));
        assert_eq!(ctx.body_limit(), 1024);
        assert_eq!(ctx.uri().path(), "/api/echo");
    }
}
