use http::Response;

/// A response head waiting for its body to be encoded behind it.
pub type ResponseHead = Response<()>;
