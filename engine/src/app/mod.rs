//! Application assembly
//!
//! [`App`] wires the whole site together: storage from config, the plugin
//! registry, the three singleton collaborators (session manager, template
//! engine, router), the route recorder, boot-time trust grants, plugin page
//! loading, middleware composition, and finally the axum router that serves
//! it all.
//!
//! Singleton selection is first-registration-wins among plugins that are
//! trusted or already enabled. Trusted matters here because the selection
//! runs before [`App::handler`] has persisted any boot-time enables.

use crate::config::{Config, StorageKind};
use crate::devconsole::DevConsole;
use crate::injector::PluginInjector;
use crate::recorder::RouteRecorder;
use crate::registry::PluginSystem;
use crate::secure::SecuredSite;
use crate::storage::{EncryptedStore, LocalStore, MemoryStore, Storage};
use crate::validate::normalize_plugin_name;
use anyhow::{bail, Context};
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::Response;
use sdk::{
    AppRouter, AssetInjector, DataStorer, Handler, PluginLoader, Renderer, SecureSite,
    SessionManager, SiteError, SiteErrorExt,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// A booted site, ready to produce its request handler.
pub struct App {
    system: Arc<PluginSystem>,
    storage: Arc<Storage>,
    loader: PluginLoader,
}

impl App {
    /// Opens storage and registers every loader plugin.
    ///
    /// Middleware plugins are registered after regular plugins, so they get
    /// records, grants and settings like any other plugin.
    pub async fn new(config: &Config, loader: PluginLoader) -> anyhow::Result<Self> {
        let storage = Arc::new(Storage::open(build_store(config)?).await?);

        let mut plugins = loader.plugins.clone();
        plugins.extend(loader.middleware.iter().cloned());
        let system = Arc::new(
            PluginSystem::new(
                Arc::clone(&storage),
                plugins,
                loader.trusted_plugins.clone(),
            )
            .await?,
        );

        Ok(Self {
            system,
            storage,
            loader,
        })
    }

    /// The registry, mostly for offline inspection.
    pub fn system(&self) -> &Arc<PluginSystem> {
        &self.system
    }

    /// The underlying site storage.
    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Assembles the serving pipeline and returns the axum router.
    pub async fn handler(&self, dev_console: bool) -> anyhow::Result<axum::Router> {
        let session = self.select_session_manager()?;
        let injector: Arc<dyn AssetInjector> = Arc::new(PluginInjector::new(
            Arc::clone(&self.system),
            Some(Arc::clone(&session)),
        ));
        let render = self.select_template_engine(injector)?;
        let router = self.select_router()?;
        let recorder = RouteRecorder::new(Arc::clone(&self.system), Arc::clone(&router));

        let host = SecuredSite::for_host(
            Arc::clone(&self.system),
            Arc::clone(&self.storage),
            Some(Arc::clone(&recorder)),
            Some(Arc::clone(&render)),
            Some(Arc::clone(&session)),
        );

        self.grant_access(host.as_ref()).await?;
        host.load_all_plugin_pages()
            .await
            .context("failed to load plugin pages")?;

        if dev_console {
            let site: Arc<dyn SecureSite> = Arc::clone(&host) as _;
            DevConsole::new(Arc::clone(&self.system), site).register_routes(router.as_ref());
        }

        let entry = self.compose_middleware(dispatch_base(router));
        let state = DispatchState { entry, render };
        Ok(axum::Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(TraceLayer::new_for_http()))
    }

    fn eligible(&self, name: &str) -> bool {
        self.system.is_trusted(name) || self.system.enabled(name)
    }

    fn select_session_manager(&self) -> anyhow::Result<Arc<dyn SessionManager>> {
        for name in self.system.names() {
            if !self.eligible(&name) {
                continue;
            }
            let site: Arc<dyn SecureSite> = SecuredSite::new(
                &name,
                Arc::clone(&self.system),
                Arc::clone(&self.storage),
                None,
                None,
                None,
            );
            if let Some(result) = self.system.plugin(&name)?.session_manager(site) {
                let manager = result?;
                tracing::info!(plugin = %name, "session manager selected");
                return Ok(manager);
            }
        }
        bail!("no trusted or enabled plugin provides a session manager")
    }

    fn select_template_engine(
        &self,
        injector: Arc<dyn AssetInjector>,
    ) -> anyhow::Result<Arc<dyn Renderer>> {
        for name in self.system.names() {
            if !self.eligible(&name) {
                continue;
            }
            if let Some(result) = self
                .system
                .plugin(&name)?
                .template_engine(Arc::clone(&injector))
            {
                let engine = result?;
                tracing::info!(plugin = %name, "template engine selected");
                return Ok(engine);
            }
        }
        bail!("no trusted or enabled plugin provides a template engine")
    }

    fn select_router(&self) -> anyhow::Result<Arc<dyn AppRouter>> {
        for name in self.system.names() {
            if !self.eligible(&name) {
                continue;
            }
            if let Some(result) = self.system.plugin(&name)?.router() {
                let router = result?;
                tracing::info!(plugin = %name, "router selected");
                return Ok(router);
            }
        }
        bail!("no trusted or enabled plugin provides a router")
    }

    /// Enables every trusted plugin and assigns each of its requested
    /// grants. Names are processed in sorted order; already-held state is
    /// left alone so repeat boots write nothing.
    async fn grant_access(&self, host: &SecuredSite) -> anyhow::Result<()> {
        for name in self.system.trusted_plugin_names() {
            if !self.system.exists(&name) {
                tracing::warn!(plugin = %name, "trusted plugin is not registered");
                continue;
            }
            if !self.system.enabled(&name) {
                host.enable_plugin(&name, false).await?;
            }
            for request in self.system.grant_requests(&name)? {
                if !self.system.granted(&name, request.grant) {
                    host.set_neighbor_plugin_grant(&name, request.grant, true)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Wraps the base handler in every middleware plugin's layers.
    ///
    /// The loader's middleware list is folded in reverse so the first
    /// declared plugin ends up outermost. Each layer is gated on its owning
    /// plugin being enabled at request time; a disabled plugin's layers
    /// pass straight through.
    fn compose_middleware(&self, base: Handler) -> Handler {
        let mut entry = base;
        for plugin in self.loader.middleware.iter().rev() {
            let plugin_name = normalize_plugin_name(plugin.plugin_name());
            for middleware in plugin.middleware().into_iter().rev() {
                let next = Arc::clone(&entry);
                let wrapped = middleware(Arc::clone(&next));
                let system = Arc::clone(&self.system);
                let gate = plugin_name.clone();
                entry = Arc::new(move |req| {
                    if system.enabled(&gate) {
                        wrapped(req)
                    } else {
                        next(req)
                    }
                });
            }
        }
        entry
    }
}

/// The innermost handler: route dispatch.
fn dispatch_base(router: Arc<dyn AppRouter>) -> Handler {
    Arc::new(move |req| router.serve(req))
}

/// The storage backend described by the config, with encryption layered on
/// when requested.
pub fn build_store(config: &Config) -> Result<Box<dyn DataStorer>, SiteError> {
    let store: Box<dyn DataStorer> = match config.storage.kind {
        StorageKind::Memory => Box::new(MemoryStore::new()),
        StorageKind::Local => Box::new(LocalStore::new(config.storage.path.clone())),
    };
    if !config.storage.encrypt {
        return Ok(store);
    }
    let key = config
        .site_key()?
        .ok_or_else(|| SiteError::Config("storage.encrypt requires security.site_key".to_string()))?;
    Ok(Box::new(EncryptedStore::new(store, &key)))
}

#[derive(Clone)]
struct DispatchState {
    entry: Handler,
    render: Arc<dyn Renderer>,
}

/// Catch-all axum handler: run the middleware/dispatch chain and render
/// failures as error pages.
async fn dispatch(State(state): State<DispatchState>, req: Request<Body>) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    match (state.entry)(req).await {
        Ok(resp) => resp,
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                tracing::error!(%method, %path, error = %e, "request failed");
                state.render.error(status, "something went wrong")
            } else {
                tracing::debug!(%method, %path, error = %e, "request rejected");
                state.render.error(status, &e.to_string())
            }
        }
    }
}
