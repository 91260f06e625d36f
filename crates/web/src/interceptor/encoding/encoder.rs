use std::io;
use std::io::Write;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use async_trait::async_trait;
use bytes::Bytes;
use duet_http::protocol::{HttpError, SendError};
use flate2::Compression;
use flate2::write::{GzEncoder, ZlibEncoder};
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, VARY};
use http::{HeaderValue, Method, Response, StatusCode};
use http_body::{Body, Frame, SizeHint};
use tracing::{error, trace, warn};
use zstd::stream::write::Encoder as ZstdEncoder;

use crate::interceptor::Interceptor;
use crate::interceptor::encoding::Writer;
use crate::{RequestContext, ResponseBody};

/// Bodies smaller than this go out uncompressed.
const DEFAULT_MIN_SIZE: u64 = 1024;

/// Content codings in server preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coding {
    Zstd,
    Br,
    Gzip,
    Deflate,
}

const PREFERENCE: [Coding; 4] = [Coding::Zstd, Coding::Br, Coding::Gzip, Coding::Deflate];

impl Coding {
    fn name(self) -> &'static str {
        match self {
            Coding::Zstd => "zstd",
            Coding::Br => "br",
            Coding::Gzip => "gzip",
            Coding::Deflate => "deflate",
        }
    }
}

/// Picks the preferred coding among those `Accept-Encoding` allows with a non-zero q.
fn negotiate(accept_encodings: &str) -> Option<Coding> {
    let accepted: Vec<&str> = accept_encodings
        .split(',')
        .filter_map(|item| {
            let mut parts = item.split(';');
            let name = parts.next()?.trim();
            let q = parts.find_map(|p| p.trim().strip_prefix("q=")).map_or(Some(1.0), |q| q.trim().parse::<f32>().ok())?;
            (q > 0.0 && !name.is_empty()).then_some(name)
        })
        .collect();

    PREFERENCE.into_iter().find(|coding| accepted.iter().any(|a| *a == "*" || a.eq_ignore_ascii_case(coding.name())))
}

enum Encoder {
    Gzip(GzEncoder<Writer>),
    Deflate(ZlibEncoder<Writer>),
    Zstd(ZstdEncoder<'static, Writer>),
    Br(Box<brotli::CompressorWriter<Writer>>),
}

impl Encoder {
    fn new(coding: Coding) -> io::Result<Self> {
        Ok(match coding {
            Coding::Gzip => Self::Gzip(GzEncoder::new(Writer::new(), Compression::default())),
            Coding::Deflate => Self::Deflate(ZlibEncoder::new(Writer::new(), Compression::default())),
            Coding::Zstd => Self::Zstd(ZstdEncoder::new(Writer::new(), 6)?),
            Coding::Br => Self::Br(Box::new(brotli::CompressorWriter::new(
                Writer::new(),
                32 * 1024, // 32 KiB buffer
                4,         // BROTLI_PARAM_QUALITY
                22,        // BROTLI_PARAM_LGWIN
            ))),
        })
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let result = match self {
            Self::Gzip(encoder) => encoder.write_all(data),
            Self::Deflate(encoder) => encoder.write_all(data),
            Self::Zstd(encoder) => encoder.write_all(data),
            Self::Br(encoder) => encoder.write_all(data),
        };
        if let Err(e) = &result {
            trace!(cause = %e, "failed to compress chunk");
        }
        result
    }

    /// Whatever compressed output is ready so far.
    fn take(&mut self) -> Bytes {
        match self {
            Self::Gzip(encoder) => encoder.get_mut().take(),
            Self::Deflate(encoder) => encoder.get_mut().take(),
            Self::Zstd(encoder) => encoder.get_mut().take(),
            Self::Br(encoder) => encoder.get_mut().take(),
        }
    }

    /// Ends the stream and returns the remaining output.
    fn finish(self) -> io::Result<Bytes> {
        let mut writer = match self {
            Self::Gzip(encoder) => encoder.finish()?,
            Self::Deflate(encoder) => encoder.finish()?,
            Self::Zstd(encoder) => encoder.finish()?,
            Self::Br(encoder) => encoder.into_inner(),
        };
        Ok(writer.take())
    }
}

/// Compresses `inner` frame by frame; `encoder` is taken once the inner body ends.
struct EncodedBody {
    inner: ResponseBody,
    encoder: Option<Encoder>,
}

impl Body for EncodedBody {
    type Data = Bytes;
    type Error = HttpError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        loop {
            let Some(encoder) = this.encoder.as_mut() else {
                return Poll::Ready(None);
            };

            match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
                Some(Ok(frame)) => {
                    let data = match frame.into_data() {
                        Ok(data) => data,
                        Err(frame) => {
                            error!(is_trailers = frame.is_trailers(), "compressed bodies only carry data frames");
                            this.encoder = None;
                            return Poll::Ready(Some(Err(SendError::invalid_body("unexpected non-data frame").into())));
                        }
                    };

                    if let Err(e) = encoder.write(&data) {
                        this.encoder = None;
                        return Poll::Ready(Some(Err(SendError::io(e).into())));
                    }
                    let bytes = encoder.take();
                    if !bytes.is_empty() {
                        return Poll::Ready(Some(Ok(Frame::data(bytes))));
                    }
                }
                Some(Err(e)) => {
                    this.encoder = None;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    let Some(encoder) = this.encoder.take() else {
                        return Poll::Ready(None);
                    };
                    return match encoder.finish() {
                        Ok(bytes) if bytes.is_empty() => Poll::Ready(None),
                        Ok(bytes) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
                        Err(e) => Poll::Ready(Some(Err(SendError::io(e).into()))),
                    };
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.encoder.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::new()
    }
}

/// Compresses response bodies the client accepts a coding for, once they reach a
/// minimum size.
#[derive(Debug, Clone, Copy)]
pub struct EncodeInterceptor {
    min_size: u64,
}

impl Default for EncodeInterceptor {
    fn default() -> Self {
        Self { min_size: DEFAULT_MIN_SIZE }
    }
}

impl EncodeInterceptor {
    pub fn with_min_size(min_size: u64) -> Self {
        Self { min_size }
    }
}

#[async_trait]
impl Interceptor for EncodeInterceptor {
    async fn on_response(&self, req: &RequestContext<'_, '_>, resp: &mut Response<ResponseBody>) {
        let status = resp.status();
        if status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
            return;
        }
        if req.method() == Method::HEAD || resp.headers().contains_key(CONTENT_ENCODING) {
            return;
        }

        let Some(accept_encodings) = req.headers().get(ACCEPT_ENCODING).and_then(|v| v.to_str().ok()) else {
            return;
        };
        let Some(coding) = negotiate(accept_encodings) else {
            return;
        };

        let body = resp.body_mut();
        if body.is_empty() {
            return;
        }
        if body.size_hint().exact().is_some_and(|size| size < self.min_size) {
            return;
        }

        let encoder = match Encoder::new(coding) {
            Ok(encoder) => encoder,
            Err(e) => {
                warn!(coding = coding.name(), cause = %e, "failed to create compressor, sending identity");
                return;
            }
        };

        let encoded_body = EncodedBody { inner: body.take(), encoder: Some(encoder) };
        body.replace(ResponseBody::stream(encoded_body));

        let headers = resp.headers_mut();
        headers.remove(CONTENT_LENGTH);
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static(coding.name()));
        headers.append(VARY, HeaderValue::from_static("Accept-Encoding"));
    }
}
