//! The toolkit handed to plugins at enable time
//!
//! A [`Toolkit`] bundles everything a plugin may touch: a namespaced logger,
//! a route mux bound to the plugin's identity, the site renderer, and the
//! plugin's own grant-checked site facade. Plugins clone and keep it; all
//! fields are cheap handles.

use crate::contracts::RouteRegistrar;
use crate::errors::SiteError;
use crate::handler::{Handler, RouteParams};
use crate::render::Renderer;
use crate::secure_site::SecureSite;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde::Serialize;
use std::sync::Arc;

/// Everything a plugin needs to participate in the site.
#[derive(Clone)]
pub struct Toolkit {
    /// Logger tagged with the plugin's name.
    pub log: PluginLogger,
    /// Route registration bound to the plugin's identity.
    pub mux: Mux,
    /// The site's template engine.
    pub render: Arc<dyn Renderer>,
    /// The plugin's own capability facade.
    pub site: Arc<dyn SecureSite>,
}

impl Toolkit {
    /// A JSON response.
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Response, SiteError> {
        let body = serde_json::to_vec(value)?;
        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .map_err(|e| SiteError::Internal(e.to_string()))
    }

    /// An HTML response with a 200 status.
    pub fn html(body: String) -> Result<Response, SiteError> {
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
            .body(Body::from(body))
            .map_err(|e| SiteError::Internal(e.to_string()))
    }

    /// A plain-text response with a 200 status.
    pub fn text(body: &str) -> Result<Response, SiteError> {
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from(body.to_string()))
            .map_err(|e| SiteError::Internal(e.to_string()))
    }

    /// A response with an explicit content type.
    pub fn with_content_type(content_type: &str, body: String) -> Result<Response, SiteError> {
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .map_err(|e| SiteError::Internal(e.to_string()))
    }

    /// A 302 redirect.
    pub fn redirect(location: &str) -> Result<Response, SiteError> {
        Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, location)
            .body(Body::empty())
            .map_err(|e| SiteError::Internal(e.to_string()))
    }
}

/// A logger that tags every line with the owning plugin's name.
#[derive(Clone)]
pub struct PluginLogger {
    plugin: String,
}

impl PluginLogger {
    pub fn new(plugin: &str) -> Self {
        Self {
            plugin: plugin.to_string(),
        }
    }

    pub fn debug(&self, msg: &str) {
        tracing::debug!(plugin = %self.plugin, "{msg}");
    }

    pub fn info(&self, msg: &str) {
        tracing::info!(plugin = %self.plugin, "{msg}");
    }

    pub fn warn(&self, msg: &str) {
        tracing::warn!(plugin = %self.plugin, "{msg}");
    }

    pub fn error(&self, msg: &str) {
        tracing::error!(plugin = %self.plugin, "{msg}");
    }
}

/// Route registration bound to one plugin.
///
/// Everything registered through a mux is recorded under the owning plugin's
/// name, authorized against `router.route:write` both at registration and
/// again on every request, and dispatched only while the plugin is enabled.
#[derive(Clone)]
pub struct Mux {
    plugin: String,
    registrar: Arc<dyn RouteRegistrar>,
}

impl Mux {
    pub fn new(plugin: &str, registrar: Arc<dyn RouteRegistrar>) -> Self {
        Self {
            plugin: plugin.to_string(),
            registrar,
        }
    }

    /// The plugin identity this mux registers under.
    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    /// Registers a handler for an arbitrary method.
    pub fn handle(&self, method: &str, path: &str, handler: Handler) {
        self.registrar.handle(&self.plugin, method, path, handler);
    }

    pub fn get(&self, path: &str, handler: Handler) {
        self.handle("GET", path, handler);
    }

    pub fn post(&self, path: &str, handler: Handler) {
        self.handle("POST", path, handler);
    }

    pub fn put(&self, path: &str, handler: Handler) {
        self.handle("PUT", path, handler);
    }

    pub fn patch(&self, path: &str, handler: Handler) {
        self.handle("PATCH", path, handler);
    }

    pub fn delete(&self, path: &str, handler: Handler) {
        self.handle("DELETE", path, handler);
    }

    pub fn head(&self, path: &str, handler: Handler) {
        self.handle("HEAD", path, handler);
    }

    pub fn options(&self, path: &str, handler: Handler) {
        self.handle("OPTIONS", path, handler);
    }

    /// A path parameter captured by the router, by name.
    pub fn param(req: &Request<Body>, name: &str) -> Option<String> {
        req.extensions()
            .get::<RouteParams>()
            .and_then(|params| params.0.get(name).cloned())
    }
}
