use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{ParseError, PayloadItem};

/// Hands out at most `remaining` bytes, then `Eof`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    remaining: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }
        if src.is_empty() {
            return Ok(None);
        }

        let take = usize::try_from(self.remaining).map_or(src.len(), |remaining| remaining.min(src.len()));
        self.remaining -= take as u64;
        Ok(Some(PayloadItem::Chunk(src.split_to(take).freeze())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_declared_length() {
        let mut buffer = BytesMut::from(&b"{\"a\":1}GET / HTTP/1.1\r\n"[..]);
        let mut decoder = LengthDecoder::new(7);

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(item.as_bytes().unwrap().as_ref(), b"{\"a\":1}");
        assert!(decoder.is_finished());
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert_eq!(&buffer[..], b"GET / HTTP/1.1\r\n");
    }

    #[test]
    fn partial_reads_accumulate() {
        let mut decoder = LengthDecoder::new(5);

        let first = decoder.decode(&mut BytesMut::from(&b"ab"[..])).unwrap().unwrap();
        assert_eq!(first.as_bytes().unwrap().len(), 2);
        assert!(decoder.decode(&mut BytesMut::new()).unwrap().is_none());

        let second = decoder.decode(&mut BytesMut::from(&b"cdefg"[..])).unwrap().unwrap();
        assert_eq!(second.as_bytes().unwrap().as_ref(), b"cde");
    }
}
