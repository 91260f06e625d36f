//! Path routing on top of `matchit`, with per-path handlers guarded by filters.
//!
//! Several items may share a path; the first whose filter matches the request wins.
//!
//! ```
//! use duet_web::router::{get, post, Router};
//! use duet_web::handler_fn;
//!
//! async fn hello() -> &'static str {
//!     "hello"
//! }
//!
//! let router = Router::builder()
//!     .route("/api/hello", get(handler_fn(hello)))
//!     .route("/api/hello", post(handler_fn(hello)))
//!     .build()
//!     .unwrap();
//! assert_eq!(router.at("/api/hello").router_items().len(), 2);
//! ```

pub mod filter;

use std::collections::HashMap;

use filter::{AllFilter, Filter};
use thiserror::Error;
use tracing::debug;

use crate::PathParams;
use crate::handler::RequestHandler;

type RouterFilter = dyn Filter + Send + Sync + 'static;
type InnerRouter<T> = matchit::Router<T>;

#[derive(Error, Debug)]
#[error("invalid route '{path}': {source}")]
pub struct RouteError {
    path: String,
    #[source]
    source: matchit::InsertError,
}

pub struct Router {
    inner_router: InnerRouter<Vec<RouterItem>>,
}

pub struct RouterItem {
    filter: Box<RouterFilter>,
    handler: Box<dyn RequestHandler>,
}

/// The items registered for a matched path and the captured parameters.
pub struct RouteResult<'router, 'req> {
    router_items: &'router [RouterItem],
    params: PathParams<'router, 'req>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Looks `path` up; an unknown path yields an empty result.
    pub fn at<'router, 'req>(&'router self, path: &'req str) -> RouteResult<'router, 'req> {
        match self.inner_router.at(path) {
            Ok(matched) => RouteResult { router_items: matched.value.as_slice(), params: matched.params.into() },
            Err(e) => {
                debug!(path, cause = %e, "no route for path");
                RouteResult::empty()
            }
        }
    }
}

impl RouterItem {
    pub fn filter(&self) -> &RouterFilter {
        self.filter.as_ref()
    }

    pub fn handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }
}

impl<'router, 'req> RouteResult<'router, 'req> {
    fn empty() -> Self {
        Self { router_items: &[], params: PathParams::empty() }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.router_items.is_empty()
    }

    pub fn params(&self) -> &PathParams<'router, 'req> {
        &self.params
    }

    pub fn router_items(&self) -> &'router [RouterItem] {
        self.router_items
    }
}

#[derive(Default)]
pub struct RouterBuilder {
    data: HashMap<String, Vec<RouterItemBuilder>>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Adds an item for `route`; items on the same path are tried in insertion order.
    pub fn route(mut self, route: impl Into<String>, item_builder: RouterItemBuilder) -> Self {
        self.data.entry(route.into()).or_default().push(item_builder);
        self
    }

    pub fn build(self) -> Result<Router, RouteError> {
        let mut inner_router = InnerRouter::new();

        for (path, items) in self.data {
            let router_items = items.into_iter().map(RouterItemBuilder::build).collect::<Vec<_>>();
            inner_router.insert(path.clone(), router_items).map_err(|source| RouteError { path, source })?;
        }

        Ok(Router { inner_router })
    }
}

macro_rules! method_router_filter {
    ($method:ident, $method_name:ident) => {
        pub fn $method<H: RequestHandler + 'static>(handler: H) -> RouterItemBuilder {
            let mut filters = filter::all_filter();
            filters.and(filter::$method_name());
            RouterItemBuilder { filters, handler: Box::new(handler) }
        }
    };
}

method_router_filter!(get, get_method);
method_router_filter!(post, post_method);
method_router_filter!(put, put_method);
method_router_filter!(delete, delete_method);
method_router_filter!(patch, patch_method);

pub struct RouterItemBuilder {
    filters: AllFilter,
    handler: Box<dyn RequestHandler>,
}

impl RouterItemBuilder {
    /// Narrows the item with one more filter.
    pub fn with<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filters.and(filter);
        self
    }

    fn build(self) -> RouterItem {
        RouterItem { filter: Box::new(self.filters), handler: self.handler }
    }
}
