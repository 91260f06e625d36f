use std::fmt::Write;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;

use crate::protocol::{PayloadItem, SendError};

/// Frames each chunk as `<hex len>\r\n<data>\r\n` and finishes with the zero chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkedEncoder {
    finished: bool,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for ChunkedEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.finished {
            return Err(SendError::invalid_body("chunk written after the terminating chunk"));
        }

        match item {
            // an empty chunk would read as the terminator
            PayloadItem::Chunk(data) if !data.has_remaining() => Ok(()),
            PayloadItem::Chunk(mut data) => {
                let len = data.remaining();
                dst.reserve(len + 12);
                write!(dst, "{len:X}\r\n").map_err(|_e| SendError::invalid_body("chunk size line"))?;
                while data.has_remaining() {
                    let n = data.chunk().len();
                    dst.extend_from_slice(data.chunk());
                    data.advance(n);
                }
                dst.extend_from_slice(b"\r\n");
                Ok(())
            }
            PayloadItem::Eof => {
                self.finished = true;
                dst.extend_from_slice(b"0\r\n\r\n");
                Ok(())
            }
        }
    }
}
