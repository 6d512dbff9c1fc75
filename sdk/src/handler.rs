//! Request handler, middleware and route types
//!
//! Handlers are boxed async closures rather than a trait so plugins can build
//! them from captured state without naming a future type. Middleware wraps a
//! handler and returns a handler; composition order is decided by the host.

use crate::errors::SiteError;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// The future a handler returns.
pub type HandlerFuture = BoxFuture<'static, Result<Response, SiteError>>;

/// An HTTP request handler.
pub type Handler = Arc<dyn Fn(Request<Body>) -> HandlerFuture + Send + Sync>;

/// A function that wraps a handler in another handler.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Builds a handler from an async function of the request.
///
/// # Examples
///
/// ```
/// use sdk::{handler_fn, Toolkit};
///
/// let handler = handler_fn(|_req| async { Toolkit::text("hello") });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Response, SiteError>> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// A method and path pair identifying one registered route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    /// Upper-case HTTP method.
    pub method: String,
    /// Path pattern as registered, including any `:param` segments.
    pub path: String,
}

impl Route {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            path: path.to_string(),
        }
    }

    /// The string the route table is keyed by.
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Path parameters extracted by the router, stored as a request extension.
#[derive(Debug, Clone, Default)]
pub struct RouteParams(pub HashMap<String, String>);
