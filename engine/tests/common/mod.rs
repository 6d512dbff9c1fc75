//! Shared fixtures for the engine integration tests
//!
//! [`MockPlugin`] is a fully scriptable plugin: a test declares its grants,
//! settings, routes, assets and middleware up front and hands it to a
//! [`TestBed`], which boots the same stack the application assembles at
//! startup, minus the HTTP listener. The real path router and the real HTML
//! engine are used so tests exercise dispatch and rendering end to end.

#![allow(dead_code)]

use atrium_engine::injector::PluginInjector;
use atrium_engine::recorder::RouteRecorder;
use atrium_engine::registry::PluginSystem;
use atrium_engine::secure::SecuredSite;
use atrium_engine::storage::{MemoryStore, Storage};
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use htmlengine::HtmlEngine;
use pathrouter::PathRouter;
use sdk::{
    handler_fn, AppRouter, Asset, AssetInjector, DataStorer, FuncMap, Grant, GrantRequest,
    Middleware, Plugin, Renderer, SessionManager, Setting, SiteError, TemplateFunc, Toolkit,
};
use std::sync::{Arc, Mutex};

/// A plugin whose whole behavior is declared by the test that builds it.
pub struct MockPlugin {
    pub name: String,
    pub version: String,
    pub grants: Vec<Grant>,
    pub settings: Vec<Setting>,
    pub assets: Vec<Asset>,
    /// Method and path pairs; each route replies with the plugin's name as
    /// plain text, so tests can see who served a request.
    pub routes: Vec<(String, String)>,
    /// Template function name and output pairs.
    pub funcs: Vec<(String, String)>,
    pub middleware: Vec<Middleware>,
    pub fail_enable: bool,
    pub router_fails: bool,
    toolkit: Mutex<Option<Toolkit>>,
}

impl MockPlugin {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            grants: Vec::new(),
            settings: Vec::new(),
            assets: Vec::new(),
            routes: Vec::new(),
            funcs: Vec::new(),
            middleware: Vec::new(),
            fail_enable: false,
            router_fails: false,
            toolkit: Mutex::new(None),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_grants(mut self, grants: &[Grant]) -> Self {
        self.grants.extend_from_slice(grants);
        self
    }

    pub fn with_route(mut self, method: &str, path: &str) -> Self {
        self.routes.push((method.to_string(), path.to_string()));
        self
    }

    pub fn with_setting(mut self, setting: Setting) -> Self {
        self.settings.push(setting);
        self
    }

    pub fn with_asset(mut self, asset: Asset) -> Self {
        self.assets.push(asset);
        self
    }

    pub fn with_func(mut self, name: &str, output: &str) -> Self {
        self.funcs.push((name.to_string(), output.to_string()));
        self
    }

    pub fn with_middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn failing_enable(mut self) -> Self {
        self.fail_enable = true;
        self
    }

    /// Makes `router()` return a construction error, for singleton
    /// selection tests.
    pub fn failing_router(mut self) -> Self {
        self.router_fails = true;
        self
    }

    /// The toolkit stored at enable time, for tests that drive the site
    /// through the plugin's own facade.
    pub fn toolkit(&self) -> Option<Toolkit> {
        self.toolkit.lock().unwrap().clone()
    }
}

impl Plugin for MockPlugin {
    fn plugin_name(&self) -> &str {
        &self.name
    }

    fn plugin_version(&self) -> &str {
        &self.version
    }

    fn enable(&self, toolkit: Toolkit) -> Result<(), SiteError> {
        if self.fail_enable {
            return Err(SiteError::Internal("enable failed".to_string()));
        }
        *self.toolkit.lock().unwrap() = Some(toolkit);
        Ok(())
    }

    fn disable(&self) -> Result<(), SiteError> {
        *self.toolkit.lock().unwrap() = None;
        Ok(())
    }

    fn routes(&self) {
        let Some(tk) = self.toolkit() else { return };
        for (method, path) in &self.routes {
            let body = self.name.clone();
            tk.mux.handle(
                method,
                path,
                handler_fn(move |_req| {
                    let body = body.clone();
                    async move { Toolkit::text(&body) }
                }),
            );
        }
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        self.grants
            .iter()
            .map(|g| GrantRequest::new(*g, "declared by the test"))
            .collect()
    }

    fn settings(&self) -> Vec<Setting> {
        self.settings.clone()
    }

    fn assets(&self) -> Vec<Asset> {
        self.assets.clone()
    }

    fn funcmap(&self, _req: &Request<Body>) -> Option<FuncMap> {
        if self.funcs.is_empty() {
            return None;
        }
        let mut map = FuncMap::new();
        for (name, output) in &self.funcs {
            let output = output.clone();
            map.insert(
                name.clone(),
                Arc::new(move || output.clone()) as TemplateFunc,
            );
        }
        Some(map)
    }

    fn middleware(&self) -> Vec<Middleware> {
        self.middleware.clone()
    }

    fn router(&self) -> Option<Result<Arc<dyn AppRouter>, SiteError>> {
        if self.router_fails {
            Some(Err(SiteError::Internal(
                "router construction failed".to_string(),
            )))
        } else {
            None
        }
    }
}

/// Middleware that appends `name` to `log` on every request it passes.
pub fn recording_middleware(name: &str, log: Arc<Mutex<Vec<String>>>) -> Middleware {
    let name = name.to_string();
    Arc::new(move |next| {
        let name = name.clone();
        let log = Arc::clone(&log);
        Arc::new(move |req| {
            log.lock().unwrap().push(name.clone());
            next(req)
        })
    })
}

/// Lets one counting [`MemoryStore`] sit inside a [`Storage`] while the test
/// keeps its own handle for save-count assertions.
pub struct SharedStore(pub Arc<MemoryStore>);

#[async_trait::async_trait]
impl DataStorer for SharedStore {
    async fn load(&self) -> Result<Vec<u8>, SiteError> {
        self.0.load().await
    }

    async fn save(&self, data: &[u8]) -> Result<(), SiteError> {
        self.0.save(data).await
    }
}

/// A session manager whose user is set directly by the test.
#[derive(Default)]
pub struct StubSession {
    user: Mutex<Option<String>>,
}

impl StubSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_user(&self, user: Option<&str>) {
        *self.user.lock().unwrap() = user.map(str::to_string);
    }
}

impl SessionManager for StubSession {
    fn authenticated_user(&self, _req: &Request<Body>) -> Result<String, SiteError> {
        self.user
            .lock()
            .unwrap()
            .clone()
            .ok_or(SiteError::NotAuthenticated)
    }

    fn login(&self, _req: &Request<Body>, username: &str) -> Result<(), SiteError> {
        *self.user.lock().unwrap() = Some(username.to_string());
        Ok(())
    }

    fn logout(&self, _req: &Request<Body>) -> Result<(), SiteError> {
        *self.user.lock().unwrap() = None;
        Ok(())
    }

    fn persist(&self, _req: &Request<Body>, _persist: bool) -> Result<(), SiteError> {
        Ok(())
    }

    fn set_csrf(&self, _req: &Request<Body>) -> Result<String, SiteError> {
        Ok("stub-csrf".to_string())
    }

    fn csrf(&self, _req: &Request<Body>, token: &str) -> bool {
        token == "stub-csrf"
    }
}

/// The assembled stack: storage, registry, real router, route recorder,
/// real template engine, and the host-identity facade over all of it.
pub struct TestBed {
    pub store: Arc<MemoryStore>,
    pub storage: Arc<Storage>,
    pub system: Arc<PluginSystem>,
    pub router: Arc<dyn AppRouter>,
    pub recorder: Arc<RouteRecorder>,
    pub render: Arc<dyn Renderer>,
    pub host: Arc<SecuredSite>,
}

impl TestBed {
    /// Serves one request through the router, the way dispatch does.
    pub async fn serve(&self, method: &str, path: &str) -> Result<Response, SiteError> {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.router.serve(req).await
    }

    /// Flips a plugin's stored record to enabled and assigns grants at the
    /// registry layer, sidestepping the facade's request-list validation.
    pub async fn enable_with_grants(&self, name: &str, grants: &[Grant]) {
        self.system.set_enabled(name, true).await.unwrap();
        for grant in grants {
            self.system.set_grant(name, *grant, true).await.unwrap();
        }
    }
}

pub async fn boot(plugins: Vec<Arc<dyn Plugin>>, trusted: &[&str]) -> TestBed {
    boot_with_session(plugins, trusted, None).await
}

pub async fn boot_with_session(
    plugins: Vec<Arc<dyn Plugin>>,
    trusted: &[&str],
    session: Option<Arc<dyn SessionManager>>,
) -> TestBed {
    let store = Arc::new(MemoryStore::new());
    let storage = Arc::new(
        Storage::open(Box::new(SharedStore(Arc::clone(&store))))
            .await
            .unwrap(),
    );
    let system = Arc::new(
        PluginSystem::new(
            Arc::clone(&storage),
            plugins,
            trusted.iter().map(|s| s.to_string()).collect(),
        )
        .await
        .unwrap(),
    );
    let router: Arc<dyn AppRouter> = Arc::new(PathRouter::new());
    let recorder = RouteRecorder::new(Arc::clone(&system), Arc::clone(&router));
    let injector: Arc<dyn AssetInjector> =
        Arc::new(PluginInjector::new(Arc::clone(&system), session.clone()));
    let render: Arc<dyn Renderer> = Arc::new(HtmlEngine::new(injector));
    let host = SecuredSite::for_host(
        Arc::clone(&system),
        Arc::clone(&storage),
        Some(Arc::clone(&recorder)),
        Some(Arc::clone(&render)),
        session,
    );

    TestBed {
        store,
        storage,
        system,
        router,
        recorder,
        render,
        host,
    }
}

pub async fn body_text(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
