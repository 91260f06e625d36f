//! Typed handler arguments pulled out of a request.
//!
//! Every argument of a function passed to [`handler_fn`](crate::handler_fn) implements
//! [`FromRequest`]. Head extractors (`Method`, `HeaderMap`, `RequestId`, [`Query`]) can
//! appear any number of times; body extractors (`Bytes`, `String`, [`Json`], [`Form`],
//! [`ParsedBody`]) consume the body, so only one of them gets it.

mod extract_body;
mod extract_header;
mod extract_tuple;
mod extract_url;
mod from_request;

pub use from_request::FromRequest;

/// Represented as form data
///
/// Requires `Content-Type: application/x-www-form-urlencoded`; the body is decoded
/// with `serde_urlencoded`.
///
/// # Example
/// ```
/// # use serde::Deserialize;
/// # use duet_web::extract::Form;
/// #[derive(Deserialize, Debug)]
/// struct Params {
///     name: String,
///     zip: String,
/// }
///
/// pub async fn handle(Form(params): Form<Params>) -> String {
///     format!("received params: {:?}", params)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Form<T>(pub T);

/// Represented as json data, both as an extractor and as a responder.
///
/// As an extractor it requires a JSON content type and accepts only an object or an
/// array at the top level. An empty body reads as `{}`. Bodies over the configured
/// limit are rejected with 413 before they are fully read.
///
/// # Example
/// ```
/// # use serde::Deserialize;
/// # use duet_web::extract::Json;
/// #[derive(Deserialize, Debug)]
/// struct Params {
///     name: String,
///     zip: String,
/// }
///
/// pub async fn handle(Json(params): Json<Params>) -> String {
///     format!("received params: {:?}", params)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

/// Represented as url query data
///
/// A missing query string decodes like an empty one. For repeated keys collected into
/// a map, the last value wins.
///
/// # Example
/// ```
/// # use serde::Deserialize;
/// # use duet_web::extract::Query;
/// #[derive(Deserialize, Debug)]
/// struct Params {
///     name: String,
///     zip: String,
/// }
///
/// pub async fn handle(Query(params): Query<Params>) -> String {
///     format!("received params: {:?}", params)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Query<T>(pub T);

/// Whatever the body parsers make of the request: a JSON value for JSON bodies, a flat
/// string map for url-encoded forms, and `{}` for anything else (left unread).
#[derive(Debug, Clone)]
pub struct ParsedBody(pub serde_json::Value);
