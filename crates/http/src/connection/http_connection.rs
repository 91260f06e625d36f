use std::error::Error;
use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::header::{CONNECTION, EXPECT};
use http::{HeaderValue, Response, StatusCode, Version};
use http_body::Body;
use http_body_util::{BodyExt, Either, Empty};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::sync::watch;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::handler::Handler;
use crate::protocol::body::ReqBody;
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError};

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Drives HTTP/1.x exchanges over one reader/writer pair until either side is done.
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
}

enum Next {
    KeepAlive,
    Close,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), READ_BUFFER_SIZE),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
        }
    }

    /// Serves requests one after another until the peer leaves, a request asks to
    /// close, or the stream turns out to be unusable.
    ///
    /// Once `shutdown` turns `true` the connection stops between requests: an idle
    /// connection is closed right away and a request already read is answered with
    /// `Connection: close`. A dropped sender never stops the connection.
    pub async fn process<H>(mut self, handler: Arc<H>, mut shutdown: watch::Receiver<bool>) -> Result<(), HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Into<Box<dyn Error + Send + Sync>>,
    {
        loop {
            let next = select! {
                biased;
                next = self.framed_read.next() => next,
                () = shutdown_requested(&mut shutdown) => {
                    debug!("server is shutting down, closing idle connection");
                    self.shutdown().await;
                    return Ok(());
                }
            };

            match next {
                Some(Ok(Message::Header((header, payload_size)))) => {
                    let stopping = *shutdown.borrow();
                    if let Next::Close = self.do_process(header, payload_size, handler.as_ref(), stopping).await? {
                        self.shutdown().await;
                        return Ok(());
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    error!("received body data where a request head was expected");
                    self.send_error_response(StatusCode::BAD_REQUEST).await?;
                    return Err(ParseError::invalid_body("body data without a request head").into());
                }

                Some(Err(e)) if e.is_connection_closed() => {
                    info!(cause = %e, "peer closed the connection mid-request");
                    return Ok(());
                }

                Some(Err(e)) => {
                    warn!(cause = %e, "can't decode the next request");
                    self.send_error_response(StatusCode::BAD_REQUEST).await?;
                    return Err(e.into());
                }

                None => {
                    debug!("no more requests, closing the connection");
                    return Ok(());
                }
            }
        }
    }

    async fn do_process<H>(
        &mut self,
        header: RequestHeader,
        payload_size: PayloadSize,
        handler: &H,
        stopping: bool,
    ) -> Result<Next, HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Into<Box<dyn Error + Send + Sync>>,
    {
        let keep_alive = header.keep_alive();
        if !payload_size.is_empty() && expects_continue(&header) {
            let writer = self.framed_write.get_mut();
            writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.map_err(SendError::io)?;
            writer.flush().await.map_err(SendError::io)?;
            debug!("sent 100 continue");
        }

        let (req_body, mut body_sender) = ReqBody::body_channel(&mut self.framed_read, payload_size);
        let request = header.body(req_body);

        let response_result = {
            let handler_future = handler.call(request);
            let send_body_future = body_sender.send_body();
            tokio::pin!(handler_future, send_body_future);

            let mut body_done = false;
            loop {
                select! {
                    biased;
                    response = &mut handler_future => break response,
                    result = &mut send_body_future, if !body_done => {
                        body_done = true;
                        if let Err(e) = result {
                            debug!(cause = %e, "request body stopped early");
                        }
                    }
                }
            }
        };

        if body_sender.is_peer_closed() {
            info!("peer went away before the request body completed, dropping the response");
            return Ok(Next::Close);
        }

        let mut response = match response_result {
            Ok(response) => response.map(Either::Left),
            Err(e) => {
                let cause: Box<dyn Error + Send + Sync> = e.into();
                error!(%cause, "handler failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR).map(Either::Right)
            }
        };

        let mut close =
            stopping || !keep_alive || body_sender.is_failed() || asks_to_close(response.headers().get(CONNECTION));
        if !close && !body_sender.is_eof() {
            match body_sender.skip_body().await {
                Ok(skipped) => debug!(skipped, "drained unread request body"),
                Err(e) if e.is_connection_closed() => {
                    info!("peer went away while the unread body was drained");
                    return Ok(Next::Close);
                }
                Err(e) => {
                    warn!(cause = %e, "can't drain unread request body");
                    close = true;
                }
            }
        }
        drop(body_sender);

        if close && !asks_to_close(response.headers().get(CONNECTION)) {
            response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
        }
        *response.version_mut() = Version::HTTP_11;

        self.do_send_response(response).await?;
        Ok(if close { Next::Close } else { Next::KeepAlive })
    }

    async fn send_error_response(&mut self, status: StatusCode) -> Result<(), HttpError> {
        let mut response = error_response(status);
        response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
        self.do_send_response(response).await?;
        self.shutdown().await;
        Ok(())
    }

    async fn do_send_response<T>(&mut self, response: Response<T>) -> Result<(), SendError>
    where
        T: Body<Data = Bytes> + Unpin,
        T::Error: Display,
    {
        let (parts, mut body) = response.into_parts();

        let payload_size = match body.size_hint().exact() {
            Some(0) => PayloadSize::Empty,
            Some(length) => PayloadSize::Length(length),
            None => PayloadSize::Chunked,
        };

        let head = Message::<_, Bytes>::Header((ResponseHead::from_parts(parts, ()), payload_size));
        if payload_size.is_empty() {
            return self.framed_write.send(head).await;
        }
        self.framed_write.feed(head).await?;

        loop {
            match body.frame().await {
                Some(Ok(frame)) => {
                    let Ok(data) = frame.into_data() else {
                        debug!("dropping response trailers");
                        continue;
                    };
                    self.framed_write.feed(Message::Payload(PayloadItem::Chunk(data))).await?;
                }
                Some(Err(e)) => return Err(SendError::invalid_body(format!("response body failed: {e}"))),
                None => return self.framed_write.send(Message::Payload(PayloadItem::<Bytes>::Eof)).await,
            }
        }
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.framed_write.get_mut().shutdown().await {
            debug!(cause = %e, "write half already closed");
        }
    }
}

/// Resolves once shutdown is requested, never if the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let sender_gone = shutdown.wait_for(|stop| *stop).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}

fn expects_continue(header: &RequestHeader) -> bool {
    header.version() == Version::HTTP_11
        && header.headers().get(EXPECT).is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"100-continue"))
}

fn asks_to_close(value: Option<&HeaderValue>) -> bool {
    value.is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"close"))
}

fn error_response(status: StatusCode) -> Response<Empty<Bytes>> {
    let mut response = Response::new(Empty::new());
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::make_handler;
    use http::Request;
    use http_body_util::Full;
    use indoc::indoc;
    use std::convert::Infallible;
    use tokio::io::{AsyncReadExt, DuplexStream, duplex};

    async fn echo_length(request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Infallible> {
        let path = request.uri().path().to_owned();
        let body = match request.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => Bytes::from(e.to_string()),
        };
        Ok(Response::new(Full::new(Bytes::from(format!("{path}:{}", body.len())))))
    }

    fn spawn_connection() -> DuplexStream {
        spawn_stoppable_connection().0
    }

    fn spawn_stoppable_connection() -> (DuplexStream, watch::Sender<bool>) {
        let (client, server) = duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let (stop, stopped) = watch::channel(false);
        tokio::spawn(async move {
            let _ = HttpConnection::new(reader, writer).process(Arc::new(make_handler(echo_length)), stopped).await;
        });
        (client, stop)
    }

    async fn read_to_end(mut client: DuplexStream) -> String {
        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn keep_alive_serves_pipelined_requests() {
        let mut client = spawn_connection();
        let raw = indoc! {"
        POST /api/echo HTTP/1.1
        Content-Length: 5

        helloGET /health HTTP/1.1
        Connection: close

        "};
        client.write_all(raw.as_bytes()).await.unwrap();

        let out = read_to_end(client).await;
        assert_eq!(out.matches("HTTP/1.1 200 OK").count(), 2);
        assert!(out.contains("/api/echo:5"));
        assert!(out.contains("/health:0"));
        assert!(out.contains("connection: close"));
    }

    #[tokio::test]
    async fn bodyless_requests_share_one_connection() {
        let mut client = spawn_connection();
        let raw = indoc! {"
        GET /api/hello HTTP/1.1

        OPTIONS /api/echo HTTP/1.1

        POST /api/echo HTTP/1.1
        Content-Length: 0

        GET /health HTTP/1.1
        Connection: close

        "};
        client.write_all(raw.as_bytes()).await.unwrap();

        let out = read_to_end(client).await;
        assert_eq!(out.matches("HTTP/1.1 200 OK").count(), 4, "{out}");
        assert!(!out.contains("400 Bad Request"));
        for answer in ["/api/hello:0", "/api/echo:0", "/health:0"] {
            assert!(out.contains(answer), "missing {answer} in {out}");
        }
    }

    #[tokio::test]
    async fn idle_connection_closes_on_shutdown() {
        let (mut client, stop) = spawn_stoppable_connection();
        client.write_all(b"GET /api/hello HTTP/1.1\r\n\r\n").await.unwrap();

        let mut head = [0u8; 17];
        client.read_exact(&mut head).await.unwrap();
        assert_eq!(&head, b"HTTP/1.1 200 OK\r\n");

        stop.send_replace(true);
        let rest = tokio::time::timeout(std::time::Duration::from_secs(2), read_to_end(client)).await.unwrap();
        assert!(rest.ends_with("/api/hello:0"));
        assert!(!rest.contains("connection: close"));
    }

    #[tokio::test]
    async fn chunked_body_reaches_handler() {
        let mut client = spawn_connection();
        let raw = "POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n4\r\nduet\r\n3\r\n-rs\r\n0\r\n\r\n";
        client.write_all(raw.as_bytes()).await.unwrap();

        assert!(read_to_end(client).await.ends_with("/upload:7"));
    }

    #[tokio::test]
    async fn expect_continue_is_answered() {
        let mut client = spawn_connection();
        let raw = "POST /api/echo HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}";
        client.write_all(raw.as_bytes()).await.unwrap();

        let out = read_to_end(client).await;
        assert!(out.starts_with("HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\n"));
    }

    #[tokio::test]
    async fn malformed_request_gets_400_and_close() {
        let mut client = spawn_connection();
        client.write_all(b"POST /api/echo HTTP/1.1\r\nContent-Length: nope\r\n\r\n").await.unwrap();

        let out = read_to_end(client).await;
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(out.contains("connection: close"));
    }

    #[tokio::test]
    async fn peer_close_mid_body_writes_nothing() {
        let mut client = spawn_connection();
        client.write_all(b"POST /api/echo HTTP/1.1\r\nContent-Length: 100\r\n\r\n{\"partial\":").await.unwrap();
        client.shutdown().await.unwrap();

        assert_eq!(read_to_end(client).await, "");
    }
}
