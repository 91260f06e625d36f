//! TCP accept loop with graceful shutdown.

use std::error::Error;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body::Body;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::select;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::connection::HttpConnection;
use crate::handler::Handler;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to read the listening address: {0}")]
    LocalAddr(#[source] io::Error),
}

pub struct Server {
    listener: TcpListener,
    shutdown_timeout: Duration,
}

impl Server {
    pub async fn bind(addr: SocketAddr) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Self { listener, shutdown_timeout: Duration::from_secs(10) })
    }

    /// How long in-flight connections may run on after shutdown starts.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::LocalAddr)
    }

    /// Accepts connections until `shutdown` resolves, then tells open connections to
    /// stop between requests, waits for them up to the shutdown timeout and aborts
    /// the rest.
    pub async fn serve<H, F>(self, handler: H, shutdown: F) -> Result<(), ServerError>
    where
        H: Handler + Sync + 'static,
        H::RespBody: Body<Data = Bytes> + Send + Unpin,
        <H::RespBody as Body>::Error: Into<Box<dyn Error + Send + Sync>>,
        H::Error: Send,
        F: Future<Output = ()>,
    {
        let handler = Arc::new(handler);
        let mut connections = JoinSet::new();
        let (stop_connections, stopped) = watch::channel(false);
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => break,

                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        error!(cause = %e, "connection task panicked");
                    }
                }

                accepted = self.listener.accept() => {
                    let (tcp_stream, remote_addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(cause = %e, "failed to accept");
                            continue;
                        }
                    };

                    let handler = handler.clone();
                    let stopped = stopped.clone();
                    connections.spawn(async move {
                        let (reader, writer) = tcp_stream.into_split();
                        match HttpConnection::new(reader, writer).process(handler, stopped).await {
                            Ok(()) => debug!(%remote_addr, "connection finished"),
                            Err(e) => warn!(%remote_addr, cause = %e, "connection closed with error"),
                        }
                    });
                }
            }
        }

        info!(open_connections = connections.len(), "stopped accepting, draining connections");
        stop_connections.send_replace(true);
        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(timeout_ms = self.shutdown_timeout.as_millis() as u64, "forced shutdown after timeout");
            connections.shutdown().await;
        } else {
            info!("server closed gracefully");
        }
        Ok(())
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(cause = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(cause = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("received shutdown signal, closing server gracefully");
}
