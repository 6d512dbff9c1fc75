//! The capability facade plugins use to reach the site
//!
//! Every plugin receives its own [`SecureSite`] instance, bound to that
//! plugin's identity at construction. Each method checks the grants it names
//! against the bound identity before touching anything, so holding the facade
//! conveys no authority by itself; the grants do. The reserved host identity
//! passes every check unconditionally.
//!
//! Reads are synchronous because the site document lives in memory. Writes
//! are async because every mutation is persisted before it returns.

use crate::errors::SiteError;
use crate::grant::{Grant, GrantRequest};
use crate::handler::Route;
use crate::models::{PluginData, Post, PostWithID};
use crate::setting::Setting;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// Grant-checked access to the site, bound to one plugin identity.
#[async_trait]
pub trait SecureSite: Send + Sync {
    // Site fields.

    /// Needs `site.title:read`.
    fn title(&self) -> Result<String, SiteError>;

    /// Needs `site.title:write`.
    async fn set_title(&self, title: &str) -> Result<(), SiteError>;

    /// Needs `site.content:read`.
    fn content(&self) -> Result<String, SiteError>;

    /// Needs `site.content:write`.
    async fn set_content(&self, content: &str) -> Result<(), SiteError>;

    /// Needs `site.scheme:read`.
    fn scheme(&self) -> Result<String, SiteError>;

    /// Needs `site.scheme:write`.
    async fn set_scheme(&self, scheme: &str) -> Result<(), SiteError>;

    /// Needs `site.url:read`.
    fn url(&self) -> Result<String, SiteError>;

    /// Needs `site.url:write`.
    async fn set_url(&self, url: &str) -> Result<(), SiteError>;

    /// Scheme and URL joined. Needs both `site.url:read` and
    /// `site.scheme:read`.
    fn full_url(&self) -> Result<String, SiteError>;

    /// Needs `site.updated:read`. Errors with [`SiteError::NotFound`] when
    /// the site has never been saved.
    fn updated(&self) -> Result<DateTime<Utc>, SiteError>;

    /// Reloads the site document from storage. Needs `site.load:trigger`.
    async fn load_site(&self) -> Result<(), SiteError>;

    // Posts and pages.

    /// Creates or replaces a post under `id`. Needs `site.post:write`.
    async fn save_post(&self, id: &str, post: Post) -> Result<(), SiteError>;

    /// Needs `site.post:read`.
    fn post_by_id(&self, id: &str) -> Result<Post, SiteError>;

    /// Every post and page, newest first. When `only_published` is set,
    /// drafts are skipped. Needs `site.post:read`.
    fn posts_and_pages(&self, only_published: bool) -> Result<Vec<PostWithID>, SiteError>;

    /// Published posts (not pages), newest first. Needs `site.post:read`.
    fn published_posts(&self) -> Result<Vec<PostWithID>, SiteError>;

    /// Published pages (not posts), newest first. Needs `site.post:read`.
    fn published_pages(&self) -> Result<Vec<PostWithID>, SiteError>;

    /// Needs `site.post:delete`.
    async fn delete_post_by_id(&self, id: &str) -> Result<(), SiteError>;

    // Plugin management.

    /// The stored records of every registered plugin. Needs
    /// `site.plugin:read`.
    fn plugins(&self) -> Result<HashMap<String, PluginData>, SiteError>;

    /// Registered plugin names in registration order. Needs
    /// `site.plugin:read`.
    fn plugin_names(&self) -> Result<Vec<String>, SiteError>;

    /// Enables a plugin; with `load` set, also runs its enable hook and
    /// registers its routes and assets. Needs `site.plugin:enable`.
    async fn enable_plugin(&self, name: &str, load: bool) -> Result<(), SiteError>;

    /// Disables a plugin; with `unload` set, also runs its disable hook and
    /// removes its routes. Needs `site.plugin:disable`.
    async fn disable_plugin(&self, name: &str, unload: bool) -> Result<(), SiteError>;

    /// Drops a plugin's stored record. If the plugin is still registered the
    /// record is re-created empty. Needs `site.plugin:delete`.
    async fn delete_plugin(&self, name: &str) -> Result<(), SiteError>;

    /// Runs the page-loading pass over every enabled plugin. Needs
    /// `site.load:trigger`.
    async fn load_all_plugin_pages(&self) -> Result<(), SiteError>;

    // Neighbor grants.

    /// What a plugin asked for. Needs `plugin.neighborgrant:read`.
    fn neighbor_plugin_grant_list(&self, name: &str) -> Result<Vec<GrantRequest>, SiteError>;

    /// A plugin's grant assignments. Needs `plugin.neighborgrant:read`.
    fn neighbor_plugin_grants(&self, name: &str) -> Result<HashMap<Grant, bool>, SiteError>;

    /// Whether one grant is assigned. Needs `plugin.neighborgrant:read`.
    fn neighbor_plugin_granted(&self, name: &str, grant: Grant) -> Result<bool, SiteError>;

    /// Assigns or revokes a grant. Needs `plugin.neighborgrant:write`.
    /// Granting something the target never requested fails with
    /// [`SiteError::GrantNotRequested`] and changes nothing; revoking is
    /// always allowed.
    async fn set_neighbor_plugin_grant(
        &self,
        name: &str,
        grant: Grant,
        granted: bool,
    ) -> Result<(), SiteError>;

    // Neighbor settings.

    /// A plugin's declared settings. Needs `plugin.neighborsetting:read`.
    fn neighbor_plugin_settings_list(&self, name: &str) -> Result<Vec<Setting>, SiteError>;

    /// A neighbor's setting as a string, falling back to its declared
    /// default. Needs `plugin.neighborsetting:read`.
    fn neighbor_plugin_setting_string(&self, name: &str, key: &str) -> Result<String, SiteError>;

    /// Writes a neighbor's setting. Needs `plugin.neighborsetting:write`.
    /// Writing an undeclared setting fails with
    /// [`SiteError::SettingNotSpecified`].
    async fn set_neighbor_plugin_setting(
        &self,
        name: &str,
        key: &str,
        value: Value,
    ) -> Result<(), SiteError>;

    // Own settings.

    /// The calling plugin's setting value, falling back to its declared
    /// default. Needs `plugin.setting:read`.
    fn plugin_setting(&self, key: &str) -> Result<Value, SiteError>;

    /// Same as [`SecureSite::plugin_setting`], coerced to a string.
    fn plugin_setting_string(&self, key: &str) -> Result<String, SiteError>;

    /// Same as [`SecureSite::plugin_setting`], coerced to a bool.
    fn plugin_setting_bool(&self, key: &str) -> Result<bool, SiteError>;

    /// Writes the calling plugin's own setting. Needs
    /// `plugin.setting:write`. Undeclared names fail with
    /// [`SiteError::SettingNotSpecified`].
    async fn set_plugin_setting(&self, key: &str, value: Value) -> Result<(), SiteError>;

    // Routes.

    /// The routes a plugin currently has recorded. Needs
    /// `site.plugin:read`.
    fn plugin_neighbor_routes_list(&self, name: &str) -> Result<Vec<Route>, SiteError>;

    /// Removes one of the calling plugin's own routes. Needs
    /// `router.route:clear`.
    fn clear_route(&self, method: &str, path: &str) -> Result<(), SiteError>;

    /// Removes every route of another plugin. Needs
    /// `router.neighborroute:clear`.
    fn clear_neighbor_routes(&self, name: &str) -> Result<(), SiteError>;

    // Users and sessions.

    /// The authenticated user of this request. Needs
    /// `user.authenticated:read`.
    fn authenticated_user(&self, req: &Request<Body>) -> Result<String, SiteError>;

    /// Needs `user.authenticated:write`.
    fn user_login(&self, req: &Request<Body>, username: &str) -> Result<(), SiteError>;

    /// Needs `user.authenticated:write`.
    fn user_logout(&self, req: &Request<Body>) -> Result<(), SiteError>;

    /// Needs `user.persist:write`.
    fn user_persist(&self, req: &Request<Body>, persist: bool) -> Result<(), SiteError>;

    /// Issues a CSRF token for this request's session. No grant required;
    /// any plugin serving a form needs one.
    fn set_csrf(&self, req: &Request<Body>) -> Result<String, SiteError>;

    /// Consumes and verifies a CSRF token. No grant required.
    fn csrf(&self, req: &Request<Body>, token: &str) -> bool;
}
