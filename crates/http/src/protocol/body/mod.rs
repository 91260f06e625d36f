//! Request body streaming.
//!
//! A request body is split into two halves that talk over a pair of bounded channels:
//!
//! - [`ReqBody`] lives inside the `Request` given to the handler and implements
//!   `http_body::Body`. Polling it sends a demand signal and waits for one payload item.
//! - [`ReqBodySender`] lives in the connection. It answers each demand by pulling one item
//!   from the request decoder, and afterwards drains whatever the handler did not read.
//!
//! Because the sender only reads on demand, a handler that stops reading (for example
//! after a size limit was hit) also stops the connection from buffering more bytes.

mod req_body;

pub use req_body::ReqBody;
pub use req_body::ReqBodySender;
