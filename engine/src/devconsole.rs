//! Administrative endpoints for local development
//!
//! The dev console registers a handful of routes straight on the router so
//! the `atr` tool can flip plugins and grants on a running site without a
//! management UI. Everything goes through the host-identity facade. The
//! routes are registered after plugin pages, so the host owns these paths
//! even when a plugin claims them.

use crate::registry::PluginSystem;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sdk::{handler_fn, AppRouter, Mux, SecureSite, SiteError, Toolkit};
use std::sync::Arc;

pub struct DevConsole {
    system: Arc<PluginSystem>,
    site: Arc<dyn SecureSite>,
}

impl DevConsole {
    /// `site` must carry the host identity; plugin-scoped facades will be
    /// denied on every endpoint.
    pub fn new(system: Arc<PluginSystem>, site: Arc<dyn SecureSite>) -> Self {
        Self { system, site }
    }

    /// Registers the console endpoints on the app router.
    pub fn register_routes(&self, router: &dyn AppRouter) {
        tracing::warn!("dev console enabled; administrative endpoints carry no authentication");

        // Return the list of trusted plugin names.
        let system = Arc::clone(&self.system);
        router.handle(
            "GET",
            "/plugins",
            handler_fn(move |_req| {
                let names = system.trusted_plugin_names();
                async move { Toolkit::json(StatusCode::OK, &names) }
            }),
        );

        // Enable one plugin and load its pages.
        let site = Arc::clone(&self.site);
        router.handle(
            "POST",
            "/plugins/:pluginname/enable",
            handler_fn(move |req| {
                let site = Arc::clone(&site);
                async move {
                    let name = Mux::param(&req, "pluginname")
                        .ok_or_else(|| SiteError::NotFound("plugin name".to_string()))?;
                    tracing::debug!(plugin = %name, "dev console: enable plugin");
                    site.enable_plugin(&name, true).await?;
                    Ok(StatusCode::OK.into_response())
                }
            }),
        );

        // Enable every trusted plugin, continuing past individual failures.
        let site = Arc::clone(&self.site);
        let system = Arc::clone(&self.system);
        router.handle(
            "POST",
            "/plugins/enable",
            handler_fn(move |_req| {
                let site = Arc::clone(&site);
                let names = system.trusted_plugin_names();
                async move {
                    tracing::debug!("dev console: enable all trusted plugins");
                    for name in names {
                        if let Err(e) = site.enable_plugin(&name, true).await {
                            tracing::error!(plugin = %name, error = %e, "dev console: enable failed");
                        }
                    }
                    Ok(StatusCode::OK.into_response())
                }
            }),
        );

        // Assign every requested grant for one plugin.
        let site = Arc::clone(&self.site);
        let system = Arc::clone(&self.system);
        router.handle(
            "POST",
            "/plugins/:pluginname/grant",
            handler_fn(move |req| {
                let site = Arc::clone(&site);
                let system = Arc::clone(&system);
                async move {
                    let name = Mux::param(&req, "pluginname")
                        .ok_or_else(|| SiteError::NotFound("plugin name".to_string()))?;
                    grant_all_requested(&system, site.as_ref(), &name).await?;
                    Ok(StatusCode::OK.into_response())
                }
            }),
        );

        // Assign every requested grant for every trusted plugin.
        let site = Arc::clone(&self.site);
        let system = Arc::clone(&self.system);
        router.handle(
            "POST",
            "/plugins/grant",
            handler_fn(move |_req| {
                let site = Arc::clone(&site);
                let system = Arc::clone(&system);
                async move {
                    tracing::debug!("dev console: grant all trusted plugins");
                    for name in system.trusted_plugin_names() {
                        grant_all_requested(&system, site.as_ref(), &name).await?;
                    }
                    Ok(StatusCode::OK.into_response())
                }
            }),
        );
    }
}

async fn grant_all_requested(
    system: &PluginSystem,
    site: &dyn SecureSite,
    name: &str,
) -> Result<(), SiteError> {
    for request in system.grant_requests(name)? {
        tracing::debug!(plugin = %name, grant = %request.grant, "dev console: assign grant");
        site.set_neighbor_plugin_grant(name, request.grant, true)
            .await?;
    }
    Ok(())
}
