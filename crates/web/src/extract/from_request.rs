use std::convert::Infallible;

use async_trait::async_trait;

use crate::responder::Responder;
use crate::{OptionReqBody, RequestContext};

#[async_trait]
pub trait FromRequest: Sized + Send {
    type Error: Responder + Send;

    async fn from_request(req: &RequestContext<'_, '_>, body: OptionReqBody) -> Result<Self, Self::Error>;
}

/// Any rejection becomes `None`.
#[async_trait]
impl<T> FromRequest for Option<T>
where
    T: FromRequest,
{
    type Error = Infallible;

    async fn from_request(req: &RequestContext<'_, '_>, body: OptionReqBody) -> Result<Self, Self::Error> {
        Ok(T::from_request(req, body).await.ok())
    }
}

/// Hands the rejection to the handler instead of answering with it.
#[async_trait]
impl<T> FromRequest for Result<T, T::Error>
where
    T: FromRequest,
{
    type Error = Infallible;

    async fn from_request(req: &RequestContext<'_, '_>, body: OptionReqBody) -> Result<Self, Self::Error> {
        Ok(T::from_request(req, body).await)
    }
}

#[async_trait]
impl FromRequest for () {
    type Error = Infallible;

    async fn from_request(_req: &RequestContext<'_, '_>, _body: OptionReqBody) -> Result<Self, Self::Error> {
        Ok(())
    }
}
