//! Request head decoding on top of `httparse`.
//!
//! Limits: at most 64 header fields and 8 KiB for the whole head. Only HTTP/1.0 and
//! HTTP/1.1 are accepted.

use bytes::BytesMut;
use http::{HeaderName, HeaderValue, Request, Version, header};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};

const MAX_HEADER_NUM: usize = 64;

const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decodes one request head and works out how its body is framed.
#[derive(Debug, Default)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let head_len = match req.parse(&src[..]) {
            Ok(Status::Complete(head_len)) => head_len,
            Ok(Status::Partial) => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
            Err(httparse::Error::TooManyHeaders) => return Err(ParseError::too_many_headers(MAX_HEADER_NUM)),
            Err(e) => return Err(ParseError::invalid_header(e)),
        };

        trace!(head_len, "parsed request head");
        ensure!(head_len <= MAX_HEADER_BYTES, ParseError::too_large_header(head_len, MAX_HEADER_BYTES));

        let version = match req.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            other => return Err(ParseError::InvalidVersion(other)),
        };
        let method = req.method.ok_or(ParseError::InvalidMethod)?;
        let path = req.path.ok_or(ParseError::InvalidUri)?;

        let mut builder = Request::builder().method(method).uri(path).version(version);
        if let Some(map) = builder.headers_mut() {
            map.reserve(req.headers.len());
            for field in req.headers.iter() {
                let name = HeaderName::from_bytes(field.name.as_bytes()).map_err(ParseError::invalid_header)?;
                let value = HeaderValue::from_bytes(field.value).map_err(ParseError::invalid_header)?;
                map.append(name, value);
            }
        }

        let request = builder.body(()).map_err(|e| match e {
            e if e.is::<http::method::InvalidMethod>() => ParseError::InvalidMethod,
            e if e.is::<http::uri::InvalidUri>() => ParseError::InvalidUri,
            e => ParseError::invalid_header(e),
        })?;
        let header = RequestHeader::from(request);
        let payload_size = payload_size(&header)?;

        let _ = src.split_to(head_len);
        Ok(Some((header, payload_size)))
    }
}

/// Body framing per RFC 9112 section 6.3: chunked wins only as the final coding, and a
/// message carrying both `Transfer-Encoding` and `Content-Length` is rejected.
fn payload_size(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    if !header.need_body() {
        return Ok(PayloadSize::new_empty());
    }

    let transfer_encoding = header.headers().get(header::TRANSFER_ENCODING);
    let content_length = header.headers().get(header::CONTENT_LENGTH);

    match (transfer_encoding, content_length) {
        (None, None) => Ok(PayloadSize::new_empty()),
        (Some(te), None) if is_chunked(te) => Ok(PayloadSize::new_chunked()),
        (Some(_), None) => Err(ParseError::invalid_header("transfer-encoding without a final chunked coding")),
        (None, Some(cl)) => {
            let text = cl.to_str().map_err(|_e| ParseError::invalid_content_length("value is not visible ascii"))?;
            let length = text
                .trim()
                .parse::<u64>()
                .map_err(|_e| ParseError::invalid_content_length(format!("value {text} is not u64")))?;
            Ok(PayloadSize::new_length(length))
        }
        (Some(_), Some(_)) => {
            Err(ParseError::invalid_content_length("transfer-encoding and content-length both present"))
        }
    }
}

fn is_chunked(value: &HeaderValue) -> bool {
    value.as_bytes().rsplit(|b| *b == b',').next().is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use indoc::indoc;

    fn decode(raw: &str) -> Result<Option<(RequestHeader, PayloadSize)>, ParseError> {
        HeaderDecoder.decode(&mut BytesMut::from(raw))
    }

    #[test]
    fn chunked_only_as_final_coding() {
        assert!(is_chunked(&HeaderValue::from_static("gzip, chunked")));
        assert!(is_chunked(&HeaderValue::from_static("Chunked")));
        assert!(!is_chunked(&HeaderValue::from_static("chunked, gzip")));
        assert!(!is_chunked(&HeaderValue::from_static("gzip")));
    }

    #[test]
    fn leaves_body_bytes_in_buffer() {
        let raw = indoc! {"
        POST /api/echo HTTP/1.1
        Host: 127.0.0.1:3000
        Content-Length: 7

        {\"a\":1}"};
        let mut bytes = BytesMut::from(raw);

        let (header, payload_size) = HeaderDecoder.decode(&mut bytes).unwrap().unwrap();

        assert_eq!(header.method(), &Method::POST);
        assert_eq!(payload_size, PayloadSize::Length(7));
        assert_eq!(&bytes[..], b"{\"a\":1}");
    }

    #[test]
    fn get_with_query() {
        let raw = indoc! {"
        GET /api/hello?name=duet&lang=en HTTP/1.1
        Host: 127.0.0.1:3000
        User-Agent: curl/8.5.0
        Accept: */*

        "};

        let (header, payload_size) = decode(raw).unwrap().unwrap();

        assert!(payload_size.is_empty());
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/api/hello");
        assert_eq!(header.uri().query(), Some("name=duet&lang=en"));
        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get(header::USER_AGENT).unwrap(), "curl/8.5.0");
    }

    #[test]
    fn partial_head_waits_for_more() {
        assert!(decode("GET /health HTTP/1.1\r\nHost: x\r\n").unwrap().is_none());
    }

    #[test]
    fn oversized_head_is_rejected() {
        let raw = format!("GET / HTTP/1.1\r\nX-Big: {}\r\n", "a".repeat(MAX_HEADER_BYTES));
        assert!(matches!(decode(&raw), Err(ParseError::TooLargeHeader { .. })));
    }

    #[test]
    fn conflicting_framing_is_rejected() {
        let raw = "POST /api/echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\nContent-Length: 3\r\n\r\n";
        assert!(matches!(decode(raw), Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn bad_content_length_is_rejected() {
        let raw = "POST /api/echo HTTP/1.1\r\nContent-Length: ten\r\n\r\n";
        assert!(matches!(decode(raw), Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn chunked_post() {
        let raw = "POST /api/echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n";
        let (_, payload_size) = decode(raw).unwrap().unwrap();
        assert!(payload_size.is_chunked());
    }
}
