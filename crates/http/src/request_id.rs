//! Per-request identifiers of the form `req_<epoch-ms>_<7 base36 chars>`.
//!
//! The millisecond clock plus 36^7 random suffixes keeps collisions negligible
//! without any shared counter.

use std::fmt;

use chrono::Utc;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const SUFFIX_LEN: usize = 7;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let suffix: String = (0..SUFFIX_LEN).map(|_| char::from(BASE36[fastrand::usize(..BASE36.len())])).collect();
        Self(format!("req_{millis}_{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sets `X-Request-ID` on `headers`.
    pub fn tag(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            headers.insert(X_REQUEST_ID, value);
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
