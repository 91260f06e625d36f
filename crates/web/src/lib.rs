//! The framework flavour of the demo server, running on the `duet_http` transport.
//!
//! Requests flow through a [`Server`]: the [`Router`] picks a handler by path and
//! method filters, [`interceptor`]s run before and after it, and the handler's
//! arguments are pulled out of the request by [`extract`]ors.
//!
//! ```no_run
//! use duet_web::interceptor::{Interceptors, RequestIdInterceptor};
//! use duet_web::routes::{self, Fallback};
//! use duet_web::Server;
//!
//! # fn build() -> Result<Server, Box<dyn std::error::Error>> {
//! let server = Server::builder()
//!     .router(routes::router("development")?)
//!     .default_handler(Fallback)
//!     .interceptors(Interceptors::builder().add_last(RequestIdInterceptor).build())
//!     .build()?;
//! # Ok(server)
//! # }
//! ```

mod body;
mod error;
mod fn_trait;
mod handler;
mod request;
mod responder;
mod server;

pub mod extract;
pub mod interceptor;
pub mod router;
pub mod routes;

pub use body::OptionReqBody;
pub use body::ResponseBody;
pub use error::WebError;
pub use fn_trait::FnTrait;
pub use handler::FnHandler;
pub use handler::RequestHandler;
pub use handler::handler_fn;
pub use request::BodyLimit;
pub use request::PathParams;
pub use request::RequestContext;
pub use responder::Responder;
pub use router::Router;
pub use server::{Server, ServerBuildError, ServerBuilder};
