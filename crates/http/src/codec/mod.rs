//! `tokio_util` codecs for HTTP/1.1.
//!
//! [`RequestDecoder`] turns bytes into a request head followed by payload items;
//! [`ResponseEncoder`] does the reverse for responses. Both delegate the head to the
//! [`header`] codecs and the body framing to the [`body`] codecs.

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
