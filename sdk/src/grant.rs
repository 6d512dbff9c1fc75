//! Grant vocabulary and grant requests
//!
//! A grant names one permission a plugin may hold. The vocabulary is fixed by
//! the host: plugin code can only ever reference the variants below, so a
//! permission string can never be invented at runtime. Grants are serialized
//! by their wire string (for example `site.post:write`) because they are used
//! as JSON map keys in the persisted site document.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single named permission.
///
/// Grants are not hierarchical. The one wildcard, [`Grant::All`], exists in
/// the vocabulary and may be persisted, but authorization never consults it;
/// the only unconditional pass is the reserved host identity itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grant {
    /// Universal wildcard. Kept for completeness, never checked.
    #[serde(rename = "*")]
    All,

    /// Read the site title.
    #[serde(rename = "site.title:read")]
    SiteTitleRead,
    /// Write the site title.
    #[serde(rename = "site.title:write")]
    SiteTitleWrite,
    /// Read the home page content.
    #[serde(rename = "site.content:read")]
    SiteContentRead,
    /// Write the home page content.
    #[serde(rename = "site.content:write")]
    SiteContentWrite,
    /// Read the site scheme (http or https).
    #[serde(rename = "site.scheme:read")]
    SiteSchemeRead,
    /// Write the site scheme.
    #[serde(rename = "site.scheme:write")]
    SiteSchemeWrite,
    /// Read the site URL.
    #[serde(rename = "site.url:read")]
    SiteURLRead,
    /// Write the site URL.
    #[serde(rename = "site.url:write")]
    SiteURLWrite,
    /// Read the last-updated timestamp.
    #[serde(rename = "site.updated:read")]
    SiteUpdatedRead,
    /// Reload the site document from the storage backend, or reload plugin
    /// pages.
    #[serde(rename = "site.load:trigger")]
    SiteLoadTrigger,

    /// Read posts and pages.
    #[serde(rename = "site.post:read")]
    SitePostRead,
    /// Create or update posts and pages.
    #[serde(rename = "site.post:write")]
    SitePostWrite,
    /// Delete posts and pages.
    #[serde(rename = "site.post:delete")]
    SitePostDelete,

    /// Read the plugin map (names, versions, enabled state).
    #[serde(rename = "site.plugin:read")]
    SitePluginRead,
    /// Enable another plugin.
    #[serde(rename = "site.plugin:enable")]
    SitePluginEnable,
    /// Disable another plugin.
    #[serde(rename = "site.plugin:disable")]
    SitePluginDisable,
    /// Delete another plugin's stored record.
    #[serde(rename = "site.plugin:delete")]
    SitePluginDelete,

    /// Register HTTP routes. Re-checked on every dispatch to a recorded
    /// handler, not only at registration time.
    #[serde(rename = "router.route:write")]
    RouterRouteWrite,
    /// Clear one of the plugin's own routes.
    #[serde(rename = "router.route:clear")]
    RouterRouteClear,
    /// Clear all routes of another named plugin.
    #[serde(rename = "router.neighborroute:clear")]
    RouterNeighborRouteClear,

    /// Read the plugin's own settings.
    #[serde(rename = "plugin.setting:read")]
    PluginSettingRead,
    /// Write the plugin's own settings.
    #[serde(rename = "plugin.setting:write")]
    PluginSettingWrite,
    /// Read another plugin's settings.
    #[serde(rename = "plugin.neighborsetting:read")]
    PluginNeighborSettingRead,
    /// Write another plugin's settings.
    #[serde(rename = "plugin.neighborsetting:write")]
    PluginNeighborSettingWrite,
    /// Read another plugin's grants.
    #[serde(rename = "plugin.neighborgrant:read")]
    PluginNeighborGrantRead,
    /// Grant or revoke another plugin's grants.
    #[serde(rename = "plugin.neighborgrant:write")]
    PluginNeighborGrantWrite,

    /// Read the authenticated user of the current request.
    #[serde(rename = "user.authenticated:read")]
    UserAuthenticatedRead,
    /// Log a user in or out.
    #[serde(rename = "user.authenticated:write")]
    UserAuthenticatedWrite,
    /// Keep the user's session across browser restarts.
    #[serde(rename = "user.persist:write")]
    UserPersistWrite,

    /// Contribute assets to rendered pages.
    #[serde(rename = "site.asset:write")]
    SiteAssetWrite,
    /// Contribute template functions to rendered pages.
    #[serde(rename = "site.funcmap:write")]
    SiteFuncMapWrite,

    /// Catch-all for grant strings this build does not know. A hand-edited
    /// site document must not be able to crash boot, and nothing ever
    /// requires this variant, so it can never authorize anything.
    #[serde(other, rename = "unknown")]
    Unknown,
}

impl Grant {
    /// The wire string for this grant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Grant::All => "*",
            Grant::SiteTitleRead => "site.title:read",
            Grant::SiteTitleWrite => "site.title:write",
            Grant::SiteContentRead => "site.content:read",
            Grant::SiteContentWrite => "site.content:write",
            Grant::SiteSchemeRead => "site.scheme:read",
            Grant::SiteSchemeWrite => "site.scheme:write",
            Grant::SiteURLRead => "site.url:read",
            Grant::SiteURLWrite => "site.url:write",
            Grant::SiteUpdatedRead => "site.updated:read",
            Grant::SiteLoadTrigger => "site.load:trigger",
            Grant::SitePostRead => "site.post:read",
            Grant::SitePostWrite => "site.post:write",
            Grant::SitePostDelete => "site.post:delete",
            Grant::SitePluginRead => "site.plugin:read",
            Grant::SitePluginEnable => "site.plugin:enable",
            Grant::SitePluginDisable => "site.plugin:disable",
            Grant::SitePluginDelete => "site.plugin:delete",
            Grant::RouterRouteWrite => "router.route:write",
            Grant::RouterRouteClear => "router.route:clear",
            Grant::RouterNeighborRouteClear => "router.neighborroute:clear",
            Grant::PluginSettingRead => "plugin.setting:read",
            Grant::PluginSettingWrite => "plugin.setting:write",
            Grant::PluginNeighborSettingRead => "plugin.neighborsetting:read",
            Grant::PluginNeighborSettingWrite => "plugin.neighborsetting:write",
            Grant::PluginNeighborGrantRead => "plugin.neighborgrant:read",
            Grant::PluginNeighborGrantWrite => "plugin.neighborgrant:write",
            Grant::UserAuthenticatedRead => "user.authenticated:read",
            Grant::UserAuthenticatedWrite => "user.authenticated:write",
            Grant::UserPersistWrite => "user.persist:write",
            Grant::SiteAssetWrite => "site.asset:write",
            Grant::SiteFuncMapWrite => "site.funcmap:write",
            Grant::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A permission a plugin declares it wants, with a human description shown on
/// administration screens.
///
/// Declaring a request grants nothing by itself. A plugin can only ever hold
/// a grant that appears in its own request list; assigning anything else is
/// rejected at the point of assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRequest {
    /// The permission being requested.
    pub grant: Grant,
    /// Why the plugin wants it.
    pub description: String,
}

impl GrantRequest {
    /// Convenience constructor.
    pub fn new(grant: Grant, description: &str) -> Self {
        Self {
            grant,
            description: description.to_string(),
        }
    }
}
