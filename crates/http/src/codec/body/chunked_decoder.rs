use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{ParseError, PayloadItem};

/// Incremental decoder for `Transfer-Encoding: chunked` bodies.
///
/// Chunk extensions and trailer fields are read and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    stage: Stage,
    chunk_size: u64,
    size_digits: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Size,
    SizeWhitespace,
    Extension,
    SizeLf,
    Data,
    DataCr,
    DataLf,
    TrailerStart,
    TrailerLine,
    TrailerLf,
    FinalLf,
    Done,
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { stage: Stage::Size, chunk_size: 0, size_digits: 0 }
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Done
    }

    fn push_digit(&mut self, digit: u8) -> Result<(), ParseError> {
        // 16 hex digits already fill a u64
        if self.size_digits >= 16 {
            return Err(ParseError::invalid_body("chunk size overflows u64"));
        }
        self.chunk_size = (self.chunk_size << 4) | u64::from(digit);
        self.size_digits += 1;
        Ok(())
    }

    fn end_size_line(&mut self) -> Stage {
        if self.chunk_size == 0 { Stage::TrailerStart } else { Stage::Data }
    }

    fn step(&mut self, byte: u8) -> Result<Stage, ParseError> {
        use Stage::*;

        let next = match (self.stage, byte) {
            (Size, b'0'..=b'9') => self.push_digit(byte - b'0').map(|()| Size)?,
            (Size, b'a'..=b'f') => self.push_digit(byte - b'a' + 10).map(|()| Size)?,
            (Size, b'A'..=b'F') => self.push_digit(byte - b'A' + 10).map(|()| Size)?,
            (Size, _) if self.size_digits == 0 => return Err(ParseError::invalid_body("chunk size has no digits")),
            (Size | SizeWhitespace, b' ' | b'\t') => SizeWhitespace,
            (Size | SizeWhitespace, b';') => Extension,
            (Size | SizeWhitespace | Extension, b'\r') => SizeLf,
            (Extension, b'\n') => return Err(ParseError::invalid_body("bare LF in chunk extension")),
            (Extension, _) => Extension,
            (SizeLf, b'\n') => self.end_size_line(),
            (DataCr, b'\r') => DataLf,
            (DataLf, b'\n') => {
                self.chunk_size = 0;
                self.size_digits = 0;
                Size
            }
            (TrailerStart, b'\r') => FinalLf,
            (TrailerStart | TrailerLine, b'\r') => TrailerLf,
            (TrailerStart | TrailerLine, _) => TrailerLine,
            (TrailerLf, b'\n') => TrailerStart,
            (FinalLf, b'\n') => Done,
            (stage, byte) => {
                return Err(ParseError::invalid_body(format!("unexpected byte {byte:#04x} in chunked body at {stage:?}")));
            }
        };
        Ok(next)
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.stage {
                Stage::Done => return Ok(Some(PayloadItem::Eof)),
                Stage::Data if self.chunk_size == 0 => self.stage = Stage::DataCr,
                Stage::Data => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let take = usize::try_from(self.chunk_size).map_or(src.len(), |size| size.min(src.len()));
                    self.chunk_size -= take as u64;
                    trace!(len = take, left = self.chunk_size, "read chunk data");
                    return Ok(Some(PayloadItem::Chunk(src.split_to(take).freeze())));
                }
                _ => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let byte = src.get_u8();
                    self.stage = self.step(byte)?;
                }
            }
        }
    }
}
