use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

use crate::protocol::{PayloadItem, SendError};

/// Writes body bytes verbatim and refuses to go past the declared `Content-Length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    remaining: u64,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let PayloadItem::Chunk(mut data) = item else {
            return Ok(());
        };

        let len = data.remaining() as u64;
        if len > self.remaining {
            warn!(len, remaining = self.remaining, "body is longer than its content-length");
            return Err(SendError::invalid_body(format!("{len} bytes exceed the {} left", self.remaining)));
        }

        dst.reserve(data.remaining());
        while data.has_remaining() {
            let chunk = data.chunk();
            let n = chunk.len();
            dst.extend_from_slice(chunk);
            data.advance(n);
        }
        self.remaining -= len;
        Ok(())
    }
}
