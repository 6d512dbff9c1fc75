//! Contracts between the host and its replaceable parts
//!
//! Routing, sessions and persistence are each provided by exactly one
//! plugin (or backend) chosen at boot. These traits are what the host
//! programs against; the traits for rendering live in [`crate::render`].

use crate::errors::SiteError;
use crate::handler::{Handler, HandlerFuture, Route};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;

/// Persistence for the serialized site document.
///
/// Backends see the document as opaque bytes. Save is called synchronously
/// after every mutation, so implementations should make the write visible
/// atomically.
#[async_trait]
pub trait DataStorer: Send + Sync {
    /// Loads the document. A backend with nothing stored yet returns an
    /// empty buffer, not an error.
    async fn load(&self) -> Result<Vec<u8>, SiteError>;

    /// Persists the document.
    async fn save(&self, data: &[u8]) -> Result<(), SiteError>;
}

/// The router contract.
///
/// One enabled plugin provides the router. The host registers exactly one
/// dispatch handler per method and path; everything per-plugin sits behind
/// that handler in the host's route recorder.
pub trait AppRouter: Send + Sync {
    /// Registers a handler. Registering the same method and path again
    /// replaces the previous handler.
    fn handle(&self, method: &str, path: &str, handler: Handler);

    /// Removes a registration.
    fn clear(&self, method: &str, path: &str);

    /// Sets the handler used when nothing matches.
    fn set_not_found(&self, handler: Handler);

    /// Routes one request.
    fn serve(&self, req: Request<Body>) -> HandlerFuture;
}

/// The session contract.
///
/// One enabled plugin manages sessions. All user operations are keyed off
/// the request, so the manager decides how identity travels (cookies,
/// headers or anything else).
pub trait SessionManager: Send + Sync {
    /// The authenticated username, or [`SiteError::NotAuthenticated`].
    fn authenticated_user(&self, req: &Request<Body>) -> Result<String, SiteError>;

    fn login(&self, req: &Request<Body>, username: &str) -> Result<(), SiteError>;

    fn logout(&self, req: &Request<Body>) -> Result<(), SiteError>;

    /// Marks the request's session as persistent (or not) across browser
    /// restarts.
    fn persist(&self, req: &Request<Body>, persist: bool) -> Result<(), SiteError>;

    /// Issues a single-use CSRF token bound to the request's session.
    fn set_csrf(&self, req: &Request<Body>) -> Result<String, SiteError>;

    /// Consumes and verifies a CSRF token.
    fn csrf(&self, req: &Request<Body>, token: &str) -> bool;
}

/// Per-plugin route bookkeeping.
///
/// Plugins register routes against this through their [`crate::Mux`]; the
/// host's implementation records who owns what, wraps handlers in request
/// time authorization, and keeps multiple plugins on one path from
/// clobbering each other.
pub trait RouteRegistrar: Send + Sync {
    /// Records `handler` for `plugin` under `method` and `path`.
    fn handle(&self, plugin: &str, method: &str, path: &str, handler: Handler);

    /// The routes currently recorded for `plugin`.
    fn routes_for(&self, plugin: &str) -> Vec<Route>;

    /// Removes one recorded route of `plugin`.
    fn clear_route(&self, plugin: &str, method: &str, path: &str);

    /// Removes every recorded route of `plugin`.
    fn clear_plugin(&self, plugin: &str);
}
