//! One task per TCP connection: read requests, run the handler, write responses.

mod http_connection;

pub use http_connection::HttpConnection;
