use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::debug;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

/// Splits a byte stream into request heads and the payload items of their bodies.
///
/// After a head with a body is yielded the decoder stays in body mode until `Eof`,
/// so a pipelined request behind a body is never mistaken for body bytes. A head
/// without a body yields no payload items at all.
#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A head has been read and its body has not been fully consumed yet.
    pub fn in_body(&self) -> bool {
        self.payload_decoder.is_some()
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            return match payload_decoder.decode(src)? {
                Some(PayloadItem::Eof) => {
                    self.payload_decoder = None;
                    Ok(Some(Message::Payload(PayloadItem::Eof)))
                }
                Some(item) => Ok(Some(Message::Payload(item))),
                None => Ok(None),
            };
        }

        match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                if !payload_size.is_empty() {
                    self.payload_decoder = Some(payload_size.into());
                }
                Ok(Some(Message::Header((header, payload_size))))
            }
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }

        match &self.payload_decoder {
            Some(decoder) if !decoder.is_finished() => {
                debug!(buffered = src.len(), "peer closed in the middle of a request body");
                Err(ParseError::ConnectionClosed)
            }
            _ if !src.is_empty() => {
                debug!(buffered = src.len(), "peer closed in the middle of a request head");
                Err(ParseError::ConnectionClosed)
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use indoc::indoc;

    #[test]
    fn head_then_body_then_next_head() {
        let raw = indoc! {"
        POST /api/echo HTTP/1.1
        Content-Length: 11

        {\"ok\":true}GET /health HTTP/1.1

        "};
        let mut buffer = BytesMut::from(raw);
        let mut decoder = RequestDecoder::new();

        let Some(Message::Header((header, payload_size))) = decoder.decode(&mut buffer).unwrap() else {
            panic!("expected a request head");
        };
        assert_eq!(header.method(), &Method::POST);
        assert_eq!(payload_size, PayloadSize::Length(11));
        assert!(decoder.in_body());

        let Some(Message::Payload(PayloadItem::Chunk(bytes))) = decoder.decode(&mut buffer).unwrap() else {
            panic!("expected a body chunk");
        };
        assert_eq!(bytes, "{\"ok\":true}");

        assert!(matches!(decoder.decode(&mut buffer).unwrap(), Some(Message::Payload(PayloadItem::Eof))));
        assert!(!decoder.in_body());

        let Some(Message::Header((header, _))) = decoder.decode(&mut buffer).unwrap() else {
            panic!("expected the pipelined head");
        };
        assert_eq!(header.uri().path(), "/health");
    }

    #[test]
    fn bodyless_heads_follow_each_other() {
        let mut buffer = BytesMut::from("GET /api/hello HTTP/1.1\r\n\r\nGET /health HTTP/1.1\r\n\r\n");
        let mut decoder = RequestDecoder::new();

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_header());
        assert!(!decoder.in_body());

        let Some(Message::Header((header, payload_size))) = decoder.decode(&mut buffer).unwrap() else {
            panic!("expected the second head, not a payload item");
        };
        assert_eq!(header.uri().path(), "/health");
        assert!(payload_size.is_empty());
        assert!(decoder.decode(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn eof_mid_body_is_connection_closed() {
        let mut buffer = BytesMut::from("POST /api/echo HTTP/1.1\r\nContent-Length: 20\r\n\r\n{\"a\":");
        let mut decoder = RequestDecoder::new();

        decoder.decode(&mut buffer).unwrap();
        decoder.decode(&mut buffer).unwrap();
        assert!(matches!(decoder.decode_eof(&mut buffer), Err(ParseError::ConnectionClosed)));
    }

    #[test]
    fn eof_between_requests_is_clean() {
        let mut decoder = RequestDecoder::new();
        assert!(decoder.decode_eof(&mut BytesMut::new()).unwrap().is_none());
    }
}
