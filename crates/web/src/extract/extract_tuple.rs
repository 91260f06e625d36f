use async_trait::async_trait;

use crate::extract::from_request::FromRequest;
use crate::{OptionReqBody, RequestContext, WebError};

/// Extracts each element in order; the first rejection wins.
macro_rules! impl_from_request_for_tuple {
    ($($param:ident)*) => {
        #[async_trait]
        impl<$($param,)*> FromRequest for ($($param,)*)
        where
            $($param: FromRequest,)*
            $(WebError: From<$param::Error>,)*
        {
            type Error = WebError;

            async fn from_request(req: &RequestContext<'_, '_>, body: OptionReqBody) -> Result<Self, Self::Error> {
                Ok(($($param::from_request(req, body.clone()).await?,)*))
            }
        }
    }
}

impl_from_request_for_tuple! { A }
impl_from_request_for_tuple! { A B }
impl_from_request_for_tuple! { A B C }
impl_from_request_for_tuple! { A B C D }
impl_from_request_for_tuple! { A B C D E }
impl_from_request_for_tuple! { A B C D E F }
