use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError};

/// Encodes a response head followed by its payload items.
#[derive(Debug, Default)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: Buf> Encoder<Message<(ResponseHead, PayloadSize), D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.as_ref().is_some_and(|encoder| !encoder.is_finished()) {
                    error!("response head written before the previous body finished");
                    return Err(SendError::invalid_body("previous response body unfinished"));
                }
                self.payload_encoder = Some(payload_size.into());
                self.header_encoder.encode((head, payload_size), dst)
            }
            Message::Payload(item) => {
                let Some(encoder) = &mut self.payload_encoder else {
                    error!("payload written before any response head");
                    return Err(SendError::invalid_body("payload without a response head"));
                };
                let is_eof = item.is_eof();
                encoder.encode(item, dst)?;
                if is_eof {
                    if !encoder.is_finished() {
                        return Err(SendError::invalid_body("body ended before its content-length"));
                    }
                    self.payload_encoder = None;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::Response;

    #[test]
    fn head_body_eof() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::<_, Bytes>::Header((Response::new(()), PayloadSize::Length(2))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize), _>::from(Bytes::from_static(b"{}")), &mut dst).unwrap();
        encoder
            .encode(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(crate::protocol::PayloadItem::Eof), &mut dst)
            .unwrap();

        assert_eq!(&dst[..], b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\n{}");
    }

    #[test]
    fn short_body_is_rejected() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::<_, Bytes>::Header((Response::new(()), PayloadSize::Length(10))), &mut dst).unwrap();
        let result =
            encoder.encode(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(crate::protocol::PayloadItem::Eof), &mut dst);
        assert!(result.is_err());
    }

    #[test]
    fn payload_needs_a_head() {
        let mut encoder = ResponseEncoder::new();
        let result = encoder.encode(Message::<(ResponseHead, PayloadSize), _>::from(Bytes::new()), &mut BytesMut::new());
        assert!(result.is_err());
    }
}
