//! URL query string extraction.
//!
//! # Example
//! ```no_run
//! # use serde::Deserialize;
//! # use duet_web::extract::Query;
//! #[derive(Deserialize)]
//! struct Params {
//!     name: String,
//!     age: u32,
//! }
//!
//! async fn handler(Query(params): Query<Params>) {
//!     println!("Name: {}, Age: {}", params.name, params.age);
//! }
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::extract::{FromRequest, Query};
use crate::{OptionReqBody, RequestContext, WebError};

#[async_trait]
impl<T> FromRequest for Query<T>
where
    T: DeserializeOwned + Send,
{
    type Error = WebError;

    async fn from_request(req: &RequestContext<'_, '_>, _body: OptionReqBody) -> Result<Self, Self::Error> {
        let query = req.uri().query().unwrap_or_default();
        serde_urlencoded::from_str::<T>(query).map(Query).map_err(|e| WebError::InvalidQuery(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PathParams;
    use duet_http::protocol::body::ReqBody;
    use duet_http::protocol::{Message, ParseError, PayloadSize, RequestHeader};
    use futures::stream;
    use http::Request;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    async fn query<T: DeserializeOwned + Send>(uri: &str) -> Result<Query<T>, WebError> {
        let header: RequestHeader = Request::builder().uri(uri).body(()).unwrap().into();
        let params = PathParams::empty();
        let ctx = RequestContext::new(&header, &params);
        let mut source = stream::empty::<Result<Message<(RequestHeader, PayloadSize)>, ParseError>>();
        let (body, _sender) = ReqBody::body_channel(&mut source, PayloadSize::Empty);
        Query::<T>::from_request(&ctx, OptionReqBody::from(body)).await
    }

    #[tokio::test]
    async fn last_repeated_key_wins() {
        let Query(map) = query::<BTreeMap<String, String>>("/api/hello?name=a&lang=en&name=b").await.unwrap();
        assert_eq!(map.get("name").map(String::as_str), Some("b"));
        assert_eq!(map.len(), 2);
    }

    #[tokio::test]
    async fn missing_query_is_empty() {
        let Query(map) = query::<BTreeMap<String, String>>("/api/hello").await.unwrap();
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn typed_fields() {
        #[derive(Deserialize)]
        struct Params {
            #[serde(rename = "type")]
            kind: Option<String>,
        }

        let Query(params) = query::<Params>("/api/error?type=auth").await.unwrap();
        assert_eq!(params.kind.as_deref(), Some("auth"));

        #[derive(Debug, Deserialize)]
        struct Age {
            #[expect(dead_code, reason = "only decoding is under test")]
            age: u32,
        }
        assert!(matches!(query::<Age>("/?age=old").await, Err(WebError::InvalidQuery(_))));
    }
}
