//! The grant-checked site facade
//!
//! [`SecuredSite`] is the host's implementation of the [`SecureSite`]
//! contract. One instance is built per plugin identity; the identity is
//! fixed at construction and every operation authorizes against it before
//! doing anything. Holding the value conveys nothing, the stored grants
//! decide, and because each check reads current storage a revocation takes
//! effect on the very next call.
//!
//! Instances built before the session manager, renderer or recorder exist
//! carry `None` for those collaborators; operations that need a missing one
//! fail with [`SiteError::Unavailable`] instead of panicking.

mod loader;

use crate::recorder::RouteRecorder;
use crate::registry::PluginSystem;
use crate::storage::Storage;
use crate::validate::normalize_plugin_name;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use chrono::{DateTime, Utc};
use sdk::{
    Grant, GrantRequest, PluginData, Post, PostWithID, Renderer, Route, RouteRegistrar,
    SecureSite, SessionManager, Setting, SiteError, HOST_IDENTITY,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// The facade. Construct via [`SecuredSite::new`] or clone an identity off
/// an existing one with [`SecuredSite::derive`].
pub struct SecuredSite {
    plugin_name: String,
    system: Arc<PluginSystem>,
    storage: Arc<Storage>,
    recorder: Option<Arc<RouteRecorder>>,
    render: Option<Arc<dyn Renderer>>,
    session: Option<Arc<dyn SessionManager>>,
}

impl SecuredSite {
    pub fn new(
        plugin_name: &str,
        system: Arc<PluginSystem>,
        storage: Arc<Storage>,
        recorder: Option<Arc<RouteRecorder>>,
        render: Option<Arc<dyn Renderer>>,
        session: Option<Arc<dyn SessionManager>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            plugin_name: normalize_plugin_name(plugin_name),
            system,
            storage,
            recorder,
            render,
            session,
        })
    }

    /// A facade with the host identity, which passes every check.
    pub fn for_host(
        system: Arc<PluginSystem>,
        storage: Arc<Storage>,
        recorder: Option<Arc<RouteRecorder>>,
        render: Option<Arc<dyn Renderer>>,
        session: Option<Arc<dyn SessionManager>>,
    ) -> Arc<Self> {
        Self::new(HOST_IDENTITY, system, storage, recorder, render, session)
    }

    /// The same collaborators bound to a different identity.
    pub fn derive(&self, plugin_name: &str) -> Arc<SecuredSite> {
        Arc::new(SecuredSite {
            plugin_name: normalize_plugin_name(plugin_name),
            system: Arc::clone(&self.system),
            storage: Arc::clone(&self.storage),
            recorder: self.recorder.clone(),
            render: self.render.clone(),
            session: self.session.clone(),
        })
    }

    /// The identity this facade authorizes as.
    pub fn identity(&self) -> &str {
        &self.plugin_name
    }

    fn authorize(&self, grant: Grant) -> Result<(), SiteError> {
        if self.system.authorized(&self.plugin_name, grant) {
            return Ok(());
        }
        tracing::debug!(plugin = %self.plugin_name, %grant, "access denied");
        Err(SiteError::AccessDenied {
            plugin: self.plugin_name.clone(),
            grant,
        })
    }

    fn session(&self) -> Result<&Arc<dyn SessionManager>, SiteError> {
        self.session
            .as_ref()
            .ok_or(SiteError::Unavailable("session manager"))
    }

    fn recorder(&self) -> Result<&Arc<RouteRecorder>, SiteError> {
        self.recorder
            .as_ref()
            .ok_or(SiteError::Unavailable("route recorder"))
    }

    fn renderer(&self) -> Result<&Arc<dyn Renderer>, SiteError> {
        self.render
            .as_ref()
            .ok_or(SiteError::Unavailable("template engine"))
    }

    /// Stored value, then declared default, then an error naming the
    /// undeclared setting.
    fn resolve_setting(&self, plugin: &str, key: &str) -> Result<Value, SiteError> {
        if let Some(value) = self.system.setting(plugin, key) {
            return Ok(value);
        }
        if let Some(default) = self.system.setting_default(plugin, key) {
            return Ok(default);
        }
        Err(SiteError::SettingNotSpecified {
            plugin: plugin.to_string(),
            setting: key.to_string(),
        })
    }

    fn require_declared_setting(&self, plugin: &str, key: &str) -> Result<(), SiteError> {
        let declared = self.system.declared_settings(plugin)?;
        if declared.iter().any(|s| s.name == key) {
            return Ok(());
        }
        tracing::debug!(plugin = %plugin, setting = %key, "write to undeclared setting refused");
        Err(SiteError::SettingNotSpecified {
            plugin: plugin.to_string(),
            setting: key.to_string(),
        })
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn value_as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

fn sort_newest_first(posts: &mut [PostWithID]) {
    posts.sort_by(|a, b| b.post.timestamp.cmp(&a.post.timestamp));
}

#[async_trait]
impl SecureSite for SecuredSite {
    fn title(&self) -> Result<String, SiteError> {
        self.authorize(Grant::SiteTitleRead)?;
        Ok(self.storage.read(|site| site.title.clone()))
    }

    async fn set_title(&self, title: &str) -> Result<(), SiteError> {
        self.authorize(Grant::SiteTitleWrite)?;
        let title = title.to_string();
        self.storage
            .mutate(|site| {
                site.title = title;
                Ok(())
            })
            .await
    }

    fn content(&self) -> Result<String, SiteError> {
        self.authorize(Grant::SiteContentRead)?;
        Ok(self.storage.read(|site| site.content.clone()))
    }

    async fn set_content(&self, content: &str) -> Result<(), SiteError> {
        self.authorize(Grant::SiteContentWrite)?;
        let content = content.to_string();
        self.storage
            .mutate(|site| {
                site.content = content;
                Ok(())
            })
            .await
    }

    fn scheme(&self) -> Result<String, SiteError> {
        self.authorize(Grant::SiteSchemeRead)?;
        Ok(self.storage.read(|site| site.scheme.clone()))
    }

    async fn set_scheme(&self, scheme: &str) -> Result<(), SiteError> {
        self.authorize(Grant::SiteSchemeWrite)?;
        let scheme = scheme.to_string();
        self.storage
            .mutate(|site| {
                site.scheme = scheme;
                Ok(())
            })
            .await
    }

    fn url(&self) -> Result<String, SiteError> {
        self.authorize(Grant::SiteURLRead)?;
        Ok(self.storage.read(|site| site.url.clone()))
    }

    async fn set_url(&self, url: &str) -> Result<(), SiteError> {
        self.authorize(Grant::SiteURLWrite)?;
        let url = url.to_string();
        self.storage
            .mutate(|site| {
                site.url = url;
                Ok(())
            })
            .await
    }

    fn full_url(&self) -> Result<String, SiteError> {
        // Composite read: both halves must be readable.
        self.authorize(Grant::SiteURLRead)?;
        self.authorize(Grant::SiteSchemeRead)?;
        Ok(self.storage.read(|site| site.full_url()))
    }

    fn updated(&self) -> Result<DateTime<Utc>, SiteError> {
        self.authorize(Grant::SiteUpdatedRead)?;
        self.storage
            .read(|site| site.updated)
            .ok_or_else(|| SiteError::NotFound("site has never been saved".to_string()))
    }

    async fn load_site(&self) -> Result<(), SiteError> {
        self.authorize(Grant::SiteLoadTrigger)?;
        self.storage.reload().await
    }

    async fn save_post(&self, id: &str, post: Post) -> Result<(), SiteError> {
        self.authorize(Grant::SitePostWrite)?;
        let id = id.to_string();
        self.storage
            .mutate(|site| {
                site.posts.insert(id, post);
                Ok(())
            })
            .await
    }

    fn post_by_id(&self, id: &str) -> Result<Post, SiteError> {
        self.authorize(Grant::SitePostRead)?;
        self.storage
            .read(|site| site.posts.get(id).cloned())
            .ok_or_else(|| SiteError::NotFound(format!("post {id}")))
    }

    fn posts_and_pages(&self, only_published: bool) -> Result<Vec<PostWithID>, SiteError> {
        self.authorize(Grant::SitePostRead)?;
        let mut posts = self.storage.read(|site| {
            site.posts
                .iter()
                .filter(|(_, post)| !only_published || post.published)
                .map(|(id, post)| PostWithID {
                    id: id.clone(),
                    post: post.clone(),
                })
                .collect::<Vec<_>>()
        });
        sort_newest_first(&mut posts);
        Ok(posts)
    }

    fn published_posts(&self) -> Result<Vec<PostWithID>, SiteError> {
        self.authorize(Grant::SitePostRead)?;
        let mut posts = self.storage.read(|site| {
            site.posts
                .iter()
                .filter(|(_, post)| post.published && !post.page)
                .map(|(id, post)| PostWithID {
                    id: id.clone(),
                    post: post.clone(),
                })
                .collect::<Vec<_>>()
        });
        sort_newest_first(&mut posts);
        Ok(posts)
    }

    fn published_pages(&self) -> Result<Vec<PostWithID>, SiteError> {
        self.authorize(Grant::SitePostRead)?;
        let mut pages = self.storage.read(|site| {
            site.posts
                .iter()
                .filter(|(_, post)| post.published && post.page)
                .map(|(id, post)| PostWithID {
                    id: id.clone(),
                    post: post.clone(),
                })
                .collect::<Vec<_>>()
        });
        sort_newest_first(&mut pages);
        Ok(pages)
    }

    async fn delete_post_by_id(&self, id: &str) -> Result<(), SiteError> {
        self.authorize(Grant::SitePostDelete)?;
        let id = id.to_string();
        self.storage
            .mutate(|site| {
                site.posts
                    .remove(&id)
                    .map(|_| ())
                    .ok_or_else(|| SiteError::NotFound(format!("post {id}")))
            })
            .await
    }

    fn plugins(&self) -> Result<HashMap<String, PluginData>, SiteError> {
        self.authorize(Grant::SitePluginRead)?;
        Ok(self.system.plugins_data())
    }

    fn plugin_names(&self) -> Result<Vec<String>, SiteError> {
        self.authorize(Grant::SitePluginRead)?;
        Ok(self.system.names())
    }

    async fn enable_plugin(&self, name: &str, load: bool) -> Result<(), SiteError> {
        self.authorize(Grant::SitePluginEnable)?;
        let name = normalize_plugin_name(name);
        // Enabling requires a live instance; a bare stored record cannot
        // serve anything.
        self.system.plugin(&name)?;
        self.system.set_enabled(&name, true).await?;
        tracing::info!(plugin = %name, "plugin enabled");
        if load {
            self.load_single_plugin_pages(&name).await?;
        }
        Ok(())
    }

    async fn disable_plugin(&self, name: &str, unload: bool) -> Result<(), SiteError> {
        self.authorize(Grant::SitePluginDisable)?;
        let name = normalize_plugin_name(name);
        self.system.set_enabled(&name, false).await?;
        tracing::info!(plugin = %name, "plugin disabled");
        if unload {
            let plugin = self.system.plugin(&name)?;
            plugin.disable()?;
            self.recorder()?.clear_plugin(&name);
            self.system.set_routes(&name, Vec::new());
        }
        Ok(())
    }

    async fn delete_plugin(&self, name: &str) -> Result<(), SiteError> {
        self.authorize(Grant::SitePluginDelete)?;
        let name = normalize_plugin_name(name);
        self.system.remove_plugin(&name).await?;
        // A still-registered plugin gets a blank record immediately so the
        // registry never dangles.
        if self.system.exists(&name) {
            let version = self.system.plugin(&name)?.plugin_version().to_string();
            self.system.initialize_plugin(&name, &version).await?;
        }
        Ok(())
    }

    async fn load_all_plugin_pages(&self) -> Result<(), SiteError> {
        self.authorize(Grant::SiteLoadTrigger)?;
        for name in self.system.names() {
            if !self.system.enabled(&name) {
                continue;
            }
            // One broken plugin must not take down the rest of the site.
            if let Err(e) = self.load_single_plugin_pages(&name).await {
                tracing::error!(plugin = %name, error = %e, "failed to load plugin pages");
            }
        }
        Ok(())
    }

    fn neighbor_plugin_grant_list(&self, name: &str) -> Result<Vec<GrantRequest>, SiteError> {
        self.authorize(Grant::PluginNeighborGrantRead)?;
        self.system.grant_requests(name)
    }

    fn neighbor_plugin_grants(&self, name: &str) -> Result<HashMap<Grant, bool>, SiteError> {
        self.authorize(Grant::PluginNeighborGrantRead)?;
        self.system
            .plugin_data(name)
            .map(|data| data.grants)
            .ok_or_else(|| SiteError::NotFound(format!("plugin {name}")))
    }

    fn neighbor_plugin_granted(&self, name: &str, grant: Grant) -> Result<bool, SiteError> {
        self.authorize(Grant::PluginNeighborGrantRead)?;
        Ok(self.system.granted(name, grant))
    }

    async fn set_neighbor_plugin_grant(
        &self,
        name: &str,
        grant: Grant,
        granted: bool,
    ) -> Result<(), SiteError> {
        self.authorize(Grant::PluginNeighborGrantWrite)?;
        let name = normalize_plugin_name(name);
        if granted {
            // Assigning is only legal for requested grants. Revoking is
            // always legal, including for stale assignments.
            let requests = self.system.grant_requests(&name)?;
            if !requests.iter().any(|r| r.grant == grant) {
                tracing::debug!(plugin = %name, %grant, "grant was never requested");
                return Err(SiteError::GrantNotRequested { plugin: name, grant });
            }
        }
        self.system.set_grant(&name, grant, granted).await
    }

    fn neighbor_plugin_settings_list(&self, name: &str) -> Result<Vec<Setting>, SiteError> {
        self.authorize(Grant::PluginNeighborSettingRead)?;
        self.system.declared_settings(name)
    }

    fn neighbor_plugin_setting_string(&self, name: &str, key: &str) -> Result<String, SiteError> {
        self.authorize(Grant::PluginNeighborSettingRead)?;
        let name = normalize_plugin_name(name);
        Ok(value_as_string(&self.resolve_setting(&name, key)?))
    }

    async fn set_neighbor_plugin_setting(
        &self,
        name: &str,
        key: &str,
        value: Value,
    ) -> Result<(), SiteError> {
        self.authorize(Grant::PluginNeighborSettingWrite)?;
        let name = normalize_plugin_name(name);
        self.require_declared_setting(&name, key)?;
        self.system.set_setting(&name, key, value).await
    }

    fn plugin_setting(&self, key: &str) -> Result<Value, SiteError> {
        self.authorize(Grant::PluginSettingRead)?;
        self.resolve_setting(&self.plugin_name, key)
    }

    fn plugin_setting_string(&self, key: &str) -> Result<String, SiteError> {
        self.authorize(Grant::PluginSettingRead)?;
        Ok(value_as_string(&self.resolve_setting(&self.plugin_name, key)?))
    }

    fn plugin_setting_bool(&self, key: &str) -> Result<bool, SiteError> {
        self.authorize(Grant::PluginSettingRead)?;
        Ok(value_as_bool(&self.resolve_setting(&self.plugin_name, key)?))
    }

    async fn set_plugin_setting(&self, key: &str, value: Value) -> Result<(), SiteError> {
        self.authorize(Grant::PluginSettingWrite)?;
        self.require_declared_setting(&self.plugin_name, key)?;
        self.system.set_setting(&self.plugin_name, key, value).await
    }

    fn plugin_neighbor_routes_list(&self, name: &str) -> Result<Vec<Route>, SiteError> {
        self.authorize(Grant::SitePluginRead)?;
        Ok(self.system.routes(name))
    }

    fn clear_route(&self, method: &str, path: &str) -> Result<(), SiteError> {
        self.authorize(Grant::RouterRouteClear)?;
        let recorder = self.recorder()?;
        recorder.clear_route(&self.plugin_name, method, path);
        self.system
            .set_routes(&self.plugin_name, recorder.routes_for(&self.plugin_name));
        Ok(())
    }

    fn clear_neighbor_routes(&self, name: &str) -> Result<(), SiteError> {
        self.authorize(Grant::RouterNeighborRouteClear)?;
        let name = normalize_plugin_name(name);
        self.recorder()?.clear_plugin(&name);
        self.system.set_routes(&name, Vec::new());
        Ok(())
    }

    fn authenticated_user(&self, req: &Request<Body>) -> Result<String, SiteError> {
        self.authorize(Grant::UserAuthenticatedRead)?;
        self.session()?.authenticated_user(req)
    }

    fn user_login(&self, req: &Request<Body>, username: &str) -> Result<(), SiteError> {
        self.authorize(Grant::UserAuthenticatedWrite)?;
        self.session()?.login(req, username)
    }

    fn user_logout(&self, req: &Request<Body>) -> Result<(), SiteError> {
        self.authorize(Grant::UserAuthenticatedWrite)?;
        self.session()?.logout(req)
    }

    fn user_persist(&self, req: &Request<Body>, persist: bool) -> Result<(), SiteError> {
        self.authorize(Grant::UserPersistWrite)?;
        self.session()?.persist(req, persist)
    }

    fn set_csrf(&self, req: &Request<Body>) -> Result<String, SiteError> {
        self.session()?.set_csrf(req)
    }

    fn csrf(&self, req: &Request<Body>, token: &str) -> bool {
        match self.session() {
            Ok(session) => session.csrf(req, token),
            Err(_) => false,
        }
    }
}
