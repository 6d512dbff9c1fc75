//! The plugin contract
//!
//! Every extension of the host is a plugin, including the pieces the host
//! itself cannot run without (router, template engine, session manager).
//! Those special capabilities are surfaced through the optional constructor
//! methods; a plugin that returns `None` from all of them is an ordinary
//! content plugin.

use crate::asset::Asset;
use crate::contracts::{AppRouter, SessionManager};
use crate::errors::SiteError;
use crate::grant::GrantRequest;
use crate::handler::Middleware;
use crate::render::{AssetInjector, FuncMap, Renderer};
use crate::secure_site::SecureSite;
use crate::setting::Setting;
use crate::toolkit::Toolkit;
use axum::body::Body;
use axum::http::Request;
use std::sync::Arc;

/// The reserved host identity. It can never be registered as a plugin name
/// and it passes every grant check.
pub const HOST_IDENTITY: &str = "atrium";

/// One unit of site functionality.
///
/// Only `plugin_name` and `plugin_version` are mandatory. Names must be
/// lowercase alphanumerics starting with a letter; versions must be valid
/// semver. Both are validated at registration and violations abort boot.
pub trait Plugin: Send + Sync {
    /// The plugin's unique name, also its grant and storage identity.
    fn plugin_name(&self) -> &str;

    /// The plugin's semver version string.
    fn plugin_version(&self) -> &str;

    /// Called when the plugin is enabled and loaded. The toolkit is the
    /// plugin's only channel to the site; implementations that serve
    /// requests later should keep a clone.
    fn enable(&self, toolkit: Toolkit) -> Result<(), SiteError> {
        let _ = toolkit;
        Ok(())
    }

    /// Called when the plugin is disabled with unload requested.
    fn disable(&self) -> Result<(), SiteError> {
        Ok(())
    }

    /// Called after `enable` to let the plugin register routes on its mux.
    fn routes(&self) {}

    /// Assets merged into rendered pages. Ignored without the
    /// `site.asset:write` grant.
    fn assets(&self) -> Vec<Asset> {
        Vec::new()
    }

    /// Settings the plugin exposes. Writes to anything not declared here
    /// are rejected.
    fn settings(&self) -> Vec<Setting> {
        Vec::new()
    }

    /// Grants the plugin wants. Anything not declared here can never be
    /// assigned to it.
    fn grant_requests(&self) -> Vec<GrantRequest> {
        Vec::new()
    }

    /// Template functions for the current request. Ignored without the
    /// `site.funcmap:write` grant. Names are prefixed with the plugin name
    /// before they reach the template.
    fn funcmap(&self, req: &Request<Body>) -> Option<FuncMap> {
        let _ = req;
        None
    }

    /// Middleware contributed by this plugin, in the order it wants them
    /// applied. Only consulted for plugins in the loader's middleware list.
    fn middleware(&self) -> Vec<Middleware> {
        Vec::new()
    }

    /// Constructs this plugin's session manager, if it provides one. The
    /// facade passed in is bound to this plugin's identity.
    fn session_manager(
        &self,
        site: Arc<dyn SecureSite>,
    ) -> Option<Result<Arc<dyn SessionManager>, SiteError>> {
        let _ = site;
        None
    }

    /// Constructs this plugin's router, if it provides one.
    fn router(&self) -> Option<Result<Arc<dyn AppRouter>, SiteError>> {
        None
    }

    /// Constructs this plugin's template engine, if it provides one. The
    /// injector is handed over so the engine can pull plugin assets into
    /// every page it renders.
    fn template_engine(
        &self,
        injector: Arc<dyn AssetInjector>,
    ) -> Option<Result<Arc<dyn Renderer>, SiteError>> {
        let _ = injector;
        None
    }
}

/// The set of plugins a host boots with.
///
/// Registration order is `plugins` first, then `middleware`; that order
/// decides route-collision precedence and singleton selection. The
/// middleware list's order is separately the composition order: the first
/// listed plugin's middleware becomes the outermost wrapper.
#[derive(Default)]
pub struct PluginLoader {
    /// Content and capability plugins.
    pub plugins: Vec<Arc<dyn Plugin>>,
    /// Plugins whose middleware wraps request dispatch.
    pub middleware: Vec<Arc<dyn Plugin>>,
    /// Names that are auto-enabled and auto-granted at boot.
    pub trusted_plugins: Vec<String>,
}
