//! Body framing: `Content-Length` and `Transfer-Encoding: chunked`, in both directions.
//!
//! Decoders yield [`PayloadItem`](crate::protocol::PayloadItem)s ending with `Eof`;
//! encoders accept the same items and write the framing around them.

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
