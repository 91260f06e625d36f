//! Protocol types shared by the codec, the connection and handlers.
//!
//! - [`Message`], [`PayloadItem`], [`PayloadSize`]: the frames a decoder yields and an
//!   encoder accepts
//! - [`RequestHeader`], [`ResponseHead`]: message heads without bodies
//! - [`body`]: the streaming request body handed to handlers
//! - [`HttpError`], [`ParseError`], [`SendError`]: failures on the read and write sides

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
