//! The framework front: route lookup, interceptors and handler invocation for one
//! request, exposed to the transport as a [`duet_http::handler::Handler`].

use std::convert::Infallible;

use duet_http::config::DEFAULT_MAX_BODY_SIZE;
use duet_http::handler::Handler;
use duet_http::protocol::RequestHeader;
use duet_http::protocol::body::ReqBody;
use http::{Request, Response, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::handler::RequestHandler;
use crate::interceptor::{Interceptor, Interceptors};
use crate::request::BodyLimit;
use crate::router::Router;
use crate::{OptionReqBody, RequestContext, ResponseBody};

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("router must be set")]
    MissingRouter,
}

pub struct ServerBuilder {
    router: Option<Router>,
    default_handler: Option<Box<dyn RequestHandler>>,
    interceptors: Interceptors,
    body_limit: u64,
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder").field("body_limit", &self.body_limit).finish_non_exhaustive()
    }
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            router: None,
            default_handler: None,
            interceptors: Interceptors::builder().build(),
            body_limit: DEFAULT_MAX_BODY_SIZE,
        }
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Runs when no route item matches, including unknown paths.
    pub fn default_handler(mut self, request_handler: impl RequestHandler + 'static) -> Self {
        self.default_handler = Some(Box::new(request_handler));
        self
    }

    pub fn interceptors(mut self, interceptors: Interceptors) -> Self {
        self.interceptors = interceptors;
        self
    }

    /// Largest request body the body extractors accept.
    pub fn body_limit(mut self, limit: u64) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let router = self.router.ok_or(ServerBuildError::MissingRouter)?;
        Ok(Server {
            router,
            default_handler: self.default_handler,
            interceptors: self.interceptors,
            body_limit: self.body_limit,
        })
    }
}

pub struct Server {
    router: Router,
    default_handler: Option<Box<dyn RequestHandler>>,
    interceptors: Interceptors,
    body_limit: u64,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("interceptors", &self.interceptors)
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Runs one request through the interceptors and the first matching handler.
    pub async fn respond(&self, req: Request<ReqBody>) -> Response<ResponseBody> {
        let (parts, body) = req.into_parts();
        let header = RequestHeader::from(parts);
        let mut req_body = OptionReqBody::from(body);

        let route_result = self.router.at(header.uri().path());
        let mut request_context = RequestContext::new(&header, route_result.params());
        request_context.extensions_mut().insert(BodyLimit(self.body_limit));

        self.interceptors.on_request(&mut request_context, &mut req_body).await;

        let handler = route_result
            .router_items()
            .iter()
            .find(|item| item.filter().matches(&request_context))
            .map(|item| item.handler())
            .or(self.default_handler.as_deref());

        let mut response = match handler {
            Some(handler) => handler.invoke(&mut request_context, req_body).await,
            None => {
                debug!(method = %header.method(), path = header.uri().path(), "no handler, answering 404");
                let mut response = Response::new(ResponseBody::empty());
                *response.status_mut() = StatusCode::NOT_FOUND;
                response
            }
        };

        self.interceptors.on_response(&request_context, &mut response).await;
        response
    }
}

impl Handler for Server {
    type RespBody = ResponseBody;
    type Error = Infallible;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error> {
        Ok(self.respond(req).await)
    }
}
