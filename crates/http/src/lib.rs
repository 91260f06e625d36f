//! A small HTTP/1.1 server built directly on tokio, and the demo dispatcher it serves.
//!
//! # Layers
//!
//! - [`codec`]: `tokio_util` decoders and encoders for request heads, bodies and responses
//! - [`protocol`]: message types, the streaming [`ReqBody`](protocol::body::ReqBody) and errors
//! - [`connection`]: one keep-alive connection, running a [`handler::Handler`] per request
//! - [`server`]: accept loop and graceful shutdown
//! - [`dispatch`]: the `/health`, `/api/hello`, `/api/echo` and `/api/data` routes
//! - [`cors`], [`config`], [`logging`], [`health`], [`request_id`]: the pieces around it
//!
//! # Example
//!
//! ```no_run
//! use std::net::SocketAddr;
//!
//! use duet_http::config::ServerConfig;
//! use duet_http::cors::Cors;
//! use duet_http::dispatch::Dispatcher;
//! use duet_http::server::{Server, shutdown_signal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let handler = Cors::new(Dispatcher::new(&config), &config.cors_origin)?;
//!
//!     let server = Server::bind(SocketAddr::from(([127, 0, 0, 1], config.port))).await?;
//!     server.serve(handler, shutdown_signal()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Limits
//!
//! - HTTP/1.0 and HTTP/1.1 only, no TLS
//! - request heads up to 8 KiB with at most 64 header fields

pub mod codec;
pub mod config;
pub mod connection;
pub mod cors;
pub mod dispatch;
pub mod handler;
pub mod health;
pub mod logging;
pub mod protocol;
pub mod request_id;
pub mod server;

mod utils;
pub(crate) use utils::ensure;
pub use utils::iso_timestamp;
