//! The head of an incoming request: method, target, version and headers.

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version, header};

/// A decoded request head, before a body is attached.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl RequestHeader {
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body, producing the request handed to a handler.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|()| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// GET, HEAD, DELETE, OPTIONS and CONNECT never carry a body here.
    pub fn need_body(&self) -> bool {
        !matches!(self.method(), &Method::GET | &Method::HEAD | &Method::DELETE | &Method::OPTIONS | &Method::CONNECT)
    }

    /// Whether the client expects the connection to stay open after this exchange.
    pub fn keep_alive(&self) -> bool {
        let connection = self.headers().get(header::CONNECTION).map(|v| v.as_bytes());
        match self.version() {
            Version::HTTP_10 => connection.is_some_and(|v| v.eq_ignore_ascii_case(b"keep-alive")),
            _ => !connection.is_some_and(|v| v.eq_ignore_ascii_case(b"close")),
        }
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(method: Method, version: Version, connection: Option<&str>) -> RequestHeader {
        let mut builder = Request::builder().method(method).version(version).uri("/api/echo");
        if let Some(value) = connection {
            builder = builder.header(header::CONNECTION, value);
        }
        builder.body(()).unwrap().into()
    }

    #[test]
    fn body_only_for_payload_methods() {
        assert!(header(Method::POST, Version::HTTP_11, None).need_body());
        assert!(header(Method::PUT, Version::HTTP_11, None).need_body());
        assert!(!header(Method::GET, Version::HTTP_11, None).need_body());
        assert!(!header(Method::OPTIONS, Version::HTTP_11, None).need_body());
    }

    #[test]
    fn keep_alive_defaults_follow_version() {
        assert!(header(Method::GET, Version::HTTP_11, None).keep_alive());
        assert!(!header(Method::GET, Version::HTTP_11, Some("close")).keep_alive());
        assert!(!header(Method::GET, Version::HTTP_10, None).keep_alive());
        assert!(header(Method::GET, Version::HTTP_10, Some("Keep-Alive")).keep_alive());
    }

    #[test]
    fn attach_body() {
        let request = header(Method::POST, Version::HTTP_11, None).body("payload");
        assert_eq!(request.uri().path(), "/api/echo");
        assert_eq!(*request.body(), "payload");
    }
}
