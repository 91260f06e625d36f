use std::convert::Infallible;

use async_trait::async_trait;
use duet_http::request_id::RequestId;
use http::{HeaderMap, Method};

use crate::extract::from_request::FromRequest;
use crate::{OptionReqBody, RequestContext, WebError};

#[async_trait]
impl FromRequest for Method {
    type Error = Infallible;

    async fn from_request(req: &RequestContext<'_, '_>, _body: OptionReqBody) -> Result<Self, Self::Error> {
        Ok(req.method().clone())
    }
}

#[async_trait]
impl FromRequest for HeaderMap {
    type Error = Infallible;

    async fn from_request(req: &RequestContext<'_, '_>, _body: OptionReqBody) -> Result<Self, Self::Error> {
        Ok(req.headers().clone())
    }
}

/// The id the request-id interceptor assigned; rejected when no such interceptor ran.
#[async_trait]
impl FromRequest for RequestId {
    type Error = WebError;

    async fn from_request(req: &RequestContext<'_, '_>, _body: OptionReqBody) -> Result<Self, Self::Error> {
        req.request_id().cloned().ok_or(WebError::MissingRequestId)
    }
}
