use std::hint::black_box;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use criterion::{Criterion, criterion_group, criterion_main};
use duet_http::codec::RequestDecoder;
use duet_http::config::ServerConfig;
use duet_http::connection::HttpConnection;
use duet_http::dispatch::{Dispatcher, accumulate, parse_json};
use http::{Method, Request};
use http_body_util::Full;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tokio_util::codec::Decoder;

/// Replays a fixed byte script and swallows everything written.
struct ScriptedIo {
    script: Bytes,
}

impl AsyncRead for ScriptedIo {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let n = self.script.len().min(buf.remaining());
        let chunk = self.script.split_to(n);
        buf.put_slice(&chunk);
        Poll::Ready(Ok(()))
    }
}

struct Sink;

impl AsyncWrite for Sink {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn sample_json(items: usize) -> String {
    let users: Vec<String> = (0..items).map(|i| format!(r#"{{"id":{i},"name":"user-{i}","tags":["a","b"]}}"#)).collect();
    format!(r#"{{"users":[{}]}}"#, users.join(","))
}

fn chunked(body: &str, chunk_size: usize) -> String {
    let mut out = String::new();
    for chunk in body.as_bytes().chunks(chunk_size) {
        out.push_str(&format!("{:x}\r\n", chunk.len()));
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push_str("\r\n");
    }
    out.push_str("0\r\n\r\n");
    out
}

fn bench_decode(c: &mut Criterion) {
    let body = sample_json(200);
    let raw = format!("POST /api/echo HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\n\r\n{}", chunked(&body, 1024));

    c.bench_function("decode_chunked_echo_request", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(raw.as_str());
            while let Some(message) = decoder.decode(&mut bytes).unwrap() {
                black_box(message.is_payload());
            }
        });
    });
}

fn bench_accumulate(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let body = Bytes::from(sample_json(200));

    c.bench_function("accumulate_and_parse", |b| {
        b.to_async(&runtime).iter(|| async {
            let buffer = accumulate(Full::new(body.clone()), 10 * 1024 * 1024).await.unwrap();
            black_box(parse_json(&buffer).unwrap());
        });
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let dispatcher = Dispatcher::new(&ServerConfig::default());
    let body = Bytes::from(sample_json(50));

    c.bench_function("dispatch_echo", |b| {
        b.to_async(&runtime).iter(|| async {
            let mut request = Request::new(Full::new(body.clone()));
            *request.method_mut() = Method::POST;
            *request.uri_mut() = http::Uri::from_static("/api/echo");
            black_box(dispatcher.dispatch(request).await);
        });
    });
}

fn bench_connection(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let handler = Arc::new(Dispatcher::new(&ServerConfig::default()));
    let body = sample_json(20);
    let script = Bytes::from(format!(
        "POST /api/echo HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}GET /api/hello?bench=1 HTTP/1.1\r\nConnection: close\r\n\r\n",
        body.len()
    ));

    c.bench_function("connection_echo_then_hello", |b| {
        b.to_async(&runtime).iter(|| async {
            let connection = HttpConnection::new(ScriptedIo { script: script.clone() }, Sink);
            let (_keep_running, running) = watch::channel(false);
            black_box(connection.process(handler.clone(), running).await.unwrap());
        });
    });
}

criterion_group!(benches, bench_decode, bench_accumulate, bench_dispatch, bench_connection);
criterion_main!(benches);
