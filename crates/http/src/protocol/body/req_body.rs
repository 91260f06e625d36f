use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::channel::mpsc;
use futures::{Sink, SinkExt, Stream, StreamExt};
use http_body::{Body, Frame, SizeHint};
use tracing::{debug, error};

use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

#[derive(Debug)]
enum BodyRequestSignal {
    RequestData,
}

/// The consumer half of a request body, handed to the handler inside `Request<ReqBody>`.
///
/// Every poll that finds no chunk in flight asks the connection for exactly one more
/// payload item, so bytes are only pulled off the socket when the handler wants them.
#[derive(Debug)]
pub struct ReqBody {
    signal_sender: mpsc::Sender<BodyRequestSignal>,
    data_receiver: mpsc::Receiver<Result<PayloadItem, ParseError>>,
    payload_size: PayloadSize,
    in_flight: bool,
    finished: bool,
}

impl ReqBody {
    /// Creates the body pair for one request read from `payload_stream`.
    pub fn body_channel<S>(payload_stream: &mut S, payload_size: PayloadSize) -> (ReqBody, ReqBodySender<'_, S>)
    where
        S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin,
    {
        let (signal_sender, signal_receiver) = mpsc::channel(1);
        let (data_sender, data_receiver) = mpsc::channel(1);

        let eof = payload_size.is_empty();
        let body = ReqBody { signal_sender, data_receiver, payload_size, in_flight: false, finished: eof };
        let sender = ReqBodySender { payload_stream, signal_receiver, data_sender, eof, peer_closed: false, failed: false };
        (body, sender)
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        if !this.in_flight {
            match Pin::new(&mut this.signal_sender).poll_ready(cx) {
                Poll::Ready(Ok(())) => {
                    if let Err(e) = Pin::new(&mut this.signal_sender).start_send(BodyRequestSignal::RequestData) {
                        error!(cause = %e, "failed to ask for more body data");
                        this.finished = true;
                        return Poll::Ready(Some(Err(ParseError::invalid_body("body channel closed"))));
                    }
                    this.in_flight = true;
                }
                Poll::Ready(Err(e)) => {
                    error!(cause = %e, "body channel closed before the body was complete");
                    this.finished = true;
                    return Poll::Ready(Some(Err(ParseError::invalid_body("body channel closed"))));
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        match this.data_receiver.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(PayloadItem::Chunk(bytes)))) => {
                this.in_flight = false;
                Poll::Ready(Some(Ok(Frame::data(bytes))))
            }
            Poll::Ready(Some(Ok(PayloadItem::Eof))) => {
                this.in_flight = false;
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                this.in_flight = false;
                this.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(Some(Err(ParseError::invalid_body("body sender dropped"))))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.finished
    }

    fn size_hint(&self) -> SizeHint {
        match self.payload_size {
            PayloadSize::Length(length) => SizeHint::with_exact(length),
            PayloadSize::Chunked => SizeHint::new(),
            PayloadSize::Empty => SizeHint::with_exact(0),
        }
    }
}

/// The producer half: reads payload items from the connection on demand.
pub struct ReqBodySender<'conn, S> {
    payload_stream: &'conn mut S,
    signal_receiver: mpsc::Receiver<BodyRequestSignal>,
    data_sender: mpsc::Sender<Result<PayloadItem, ParseError>>,
    eof: bool,
    peer_closed: bool,
    failed: bool,
}

impl<S> ReqBodySender<'_, S>
where
    S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin,
{
    /// Serves chunk requests until the body ends, fails, or the [`ReqBody`] is dropped.
    pub async fn send_body(&mut self) -> Result<(), ParseError> {
        while !self.eof {
            let Some(BodyRequestSignal::RequestData) = self.signal_receiver.next().await else {
                // consumer is gone, whatever is left gets drained or the connection closes
                return Ok(());
            };

            match self.read_data().await {
                Ok(item) => {
                    self.eof = item.is_eof();
                    if self.data_sender.send(Ok(item)).await.is_err() {
                        debug!("request body receiver dropped while a chunk was in flight");
                        return Ok(());
                    }
                }
                Err(e) => {
                    self.failed = true;
                    self.peer_closed = e.is_connection_closed();
                    let reason = e.to_string();
                    if self.data_sender.send(Err(e)).await.is_err() {
                        debug!("request body receiver dropped before the read error was delivered");
                    }
                    return Err(ParseError::invalid_body(reason));
                }
            }
        }
        Ok(())
    }

    /// Reads and discards whatever the handler left unread, keeping the connection usable.
    pub async fn skip_body(&mut self) -> Result<usize, ParseError> {
        let mut skipped = 0;
        while !self.eof && !self.failed {
            match self.read_data().await {
                Ok(PayloadItem::Chunk(bytes)) => skipped += bytes.len(),
                Ok(PayloadItem::Eof) => self.eof = true,
                Err(e) => {
                    self.failed = true;
                    self.peer_closed = e.is_connection_closed();
                    return Err(e);
                }
            }
        }
        Ok(skipped)
    }

    async fn read_data(&mut self) -> Result<PayloadItem, ParseError> {
        match self.payload_stream.next().await {
            Some(Ok(Message::Payload(item))) => Ok(item),
            Some(Ok(Message::Header(_))) => {
                error!("received a request head while reading a body");
                Err(ParseError::invalid_body("received a request head while reading a body"))
            }
            Some(Err(e)) => Err(e),
            None => Err(ParseError::ConnectionClosed),
        }
    }

    /// The whole body has been read off the connection.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Reading the body failed; the connection can't be reused.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// The peer hung up mid-body.
    pub fn is_peer_closed(&self) -> bool {
        self.peer_closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use http_body_util::BodyExt;

    type Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>;

    fn chunk(data: &'static [u8]) -> Item {
        Ok(Message::Payload(PayloadItem::Chunk(Bytes::from_static(data))))
    }

    #[tokio::test]
    async fn streams_chunks_in_order() {
        let mut source = stream::iter(vec![chunk(b"hel"), chunk(b"lo"), Ok(Message::Payload(PayloadItem::Eof))]);
        let (body, mut sender) = ReqBody::body_channel(&mut source, PayloadSize::Chunked);

        let (collected, sent) = tokio::join!(body.collect(), sender.send_body());
        assert!(sent.is_ok());
        assert_eq!(collected.unwrap().to_bytes(), Bytes::from_static(b"hello"));
        assert!(sender.is_eof());
    }

    #[tokio::test]
    async fn empty_body_needs_no_reads() {
        let mut source = stream::iter(Vec::<Item>::new());
        let (body, mut sender) = ReqBody::body_channel(&mut source, PayloadSize::Empty);

        assert!(body.is_end_stream());
        assert!(sender.send_body().await.is_ok());
        assert_eq!(sender.skip_body().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn peer_close_is_reported() {
        let mut source = stream::iter(vec![chunk(b"partial")]);
        let (body, mut sender) = ReqBody::body_channel(&mut source, PayloadSize::Length(100));

        let (collected, sent) = tokio::join!(body.collect(), sender.send_body());
        assert!(sent.is_err());
        assert!(collected.unwrap_err().is_connection_closed());
        assert!(sender.is_peer_closed());
        assert!(sender.is_failed());
    }

    #[tokio::test]
    async fn skip_drains_unread_body() {
        let mut source = stream::iter(vec![chunk(b"abc"), chunk(b"de"), Ok(Message::Payload(PayloadItem::Eof))]);
        let (body, mut sender) = ReqBody::body_channel(&mut source, PayloadSize::Length(5));
        drop(body);

        assert!(sender.send_body().await.is_ok());
        assert_eq!(sender.skip_body().await.unwrap(), 5);
        assert!(sender.is_eof());
    }
}
