//! Plugin page loading
//!
//! Loading a plugin means running its enable hook with a fresh [`Toolkit`],
//! letting it register routes, and publishing its routable assets. The
//! toolkit's facade is derived for the plugin's own identity, so nothing a
//! plugin does during enable escapes its grants.

use super::SecuredSite;
use crate::validate::normalize_plugin_name;
use sdk::{
    handler_fn, Mux, PluginLogger, RouteRegistrar, SecureSite, SiteError, Toolkit, HOST_IDENTITY,
};
use std::sync::Arc;

impl SecuredSite {
    /// Runs one plugin's enable hook and registers its routes and assets.
    ///
    /// The host identity is not loadable; it owns no plugin instance.
    pub(crate) async fn load_single_plugin_pages(&self, name: &str) -> Result<(), SiteError> {
        let name = normalize_plugin_name(name);
        if name == HOST_IDENTITY {
            return Err(SiteError::InvalidPluginName(name));
        }
        let plugin = self.system.plugin(&name)?;
        let recorder = Arc::clone(self.recorder()?);
        let render = Arc::clone(self.renderer()?);

        let registrar: Arc<dyn RouteRegistrar> = Arc::clone(&recorder) as _;
        let site: Arc<dyn SecureSite> = self.derive(&name);
        let toolkit = Toolkit {
            log: PluginLogger::new(&name),
            mux: Mux::new(&name, registrar),
            render,
            site,
        };

        plugin.enable(toolkit)?;
        plugin.routes();

        for asset in plugin.assets() {
            if !asset.routable() {
                continue;
            }
            if asset.path.is_empty() {
                tracing::warn!(plugin = %name, "routable asset without a path skipped");
                continue;
            }
            let content_type = asset.content_type();
            let content = asset.content.clone();
            let handler = handler_fn(move |_req| {
                let content = content.clone();
                async move { Toolkit::with_content_type(content_type, content) }
            });
            recorder.handle(&name, "GET", &asset.path, handler);
        }

        self.system.set_routes(&name, recorder.routes_for(&name));
        tracing::debug!(plugin = %name, "plugin pages loaded");
        Ok(())
    }
}
