use std::marker::PhantomData;

use async_trait::async_trait;
use http::Response;

use crate::body::ResponseBody;
use crate::extract::FromRequest;
use crate::fn_trait::FnTrait;
use crate::responder::Responder;
use crate::{OptionReqBody, RequestContext};

/// Turns one request into one response. Failures are already responses by the time
/// they leave a handler.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke<'server, 'req>(
        &self,
        req: &mut RequestContext<'server, 'req>,
        req_body: OptionReqBody,
    ) -> Response<ResponseBody>;
}

#[async_trait]
impl<T> RequestHandler for Box<T>
where
    T: RequestHandler + ?Sized,
{
    async fn invoke<'server, 'req>(
        &self,
        req: &mut RequestContext<'server, 'req>,
        req_body: OptionReqBody,
    ) -> Response<ResponseBody> {
        (**self).invoke(req, req_body).await
    }
}

/// a `FnTrait` holder which represents any async Fn
pub struct FnHandler<F, Args> {
    f: F,
    _phantom: PhantomData<fn(Args)>,
}

impl<F, Args> std::fmt::Debug for FnHandler<F, Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").field("args", &std::any::type_name::<Args>()).finish_non_exhaustive()
    }
}

impl<F, Args> FnHandler<F, Args>
where
    F: FnTrait<Args>,
{
    fn new(f: F) -> Self {
        Self { f, _phantom: PhantomData }
    }
}

/// Wraps an async fn whose arguments are all extractors.
pub fn handler_fn<F, Args>(f: F) -> FnHandler<F, Args>
where
    F: FnTrait<Args>,
{
    FnHandler::new(f)
}

#[async_trait]
impl<F, Args> RequestHandler for FnHandler<F, Args>
where
    F: FnTrait<Args>,
    F::Output: Responder,
    Args: FromRequest,
{
    async fn invoke<'server, 'req>(
        &self,
        req: &mut RequestContext<'server, 'req>,
        req_body: OptionReqBody,
    ) -> Response<ResponseBody> {
        let args = match Args::from_request(req, req_body).await {
            Ok(args) => args,
            Err(rejection) => return rejection.response_to(req),
        };
        self.f.call(args).await.response_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PathParams;
    use duet_http::protocol::body::ReqBody;
    use duet_http::protocol::{Message, ParseError, PayloadSize, RequestHeader};
    use duet_http::request_id::RequestId;
    use futures::stream;
    use http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;

    fn assert_is_handler<T: RequestHandler>(_handler: &T) {
        // no op
    }

    async fn invoke(handler: &dyn RequestHandler, with_id: bool) -> Response<ResponseBody> {
        let header: RequestHeader = Request::builder().method(Method::GET).uri("/").body(()).unwrap().into();
        let params = PathParams::empty();
        let mut ctx = RequestContext::new(&header, &params);
        if with_id {
            ctx.extensions_mut().insert(RequestId::generate());
        }

        let mut source = stream::empty::<Result<Message<(RequestHeader, PayloadSize)>, ParseError>>();
        let (body, _sender) = ReqBody::body_channel(&mut source, PayloadSize::Empty);
        handler.invoke(&mut ctx, OptionReqBody::from(body)).await
    }

    #[test]
    fn fns_with_extractors_are_handlers() {
        async fn one(_method: Method) {}
        async fn two(_method: Method, _body: String) -> &'static str {
            "ok"
        }

        assert_is_handler(&handler_fn(one));
        assert_is_handler(&handler_fn(two));
    }

    #[tokio::test]
    async fn output_becomes_response() {
        async fn method_name(method: Method) -> String {
            method.to_string()
        }

        let response = invoke(&handler_fn(method_name), false).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.into_body().collect().await.unwrap().to_bytes(), "GET");
    }

    #[tokio::test]
    async fn rejection_short_circuits() {
        async fn needs_id(id: RequestId) -> String {
            id.to_string()
        }

        let response = invoke(&handler_fn(needs_id), false).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = invoke(&handler_fn(needs_id), true).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
