//! Plugin registry and authorization
//!
//! The registry owns the mapping from plugin names to live instances and to
//! their persisted records, and it answers the one question the rest of the
//! host keeps asking: is this identity allowed to do that right now. The
//! answer is computed from stored state on every call, never cached, so a
//! revocation takes effect on the next check.
//!
//! Registration happens once at boot and the instance table is immutable
//! afterwards; only the persisted records and the route bookkeeping change
//! at runtime.

use crate::storage::Storage;
use crate::validate::{normalize_plugin_name, validate_plugin_name, validate_plugin_version};
use sdk::{Grant, GrantRequest, Plugin, PluginData, Route, Setting, SiteError, HOST_IDENTITY};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The registry. One per running site.
pub struct PluginSystem {
    storage: Arc<Storage>,
    trusted: Vec<String>,
    names: Vec<String>,
    instances: HashMap<String, Arc<dyn Plugin>>,
    routes: RwLock<HashMap<String, Vec<Route>>>,
}

impl PluginSystem {
    /// Registers `plugins` in order, seeding or refreshing their persisted
    /// records. The whole batch is persisted with a single save, and only
    /// when something actually changed. Any validation failure aborts boot.
    pub async fn new(
        storage: Arc<Storage>,
        plugins: Vec<Arc<dyn Plugin>>,
        trusted: Vec<String>,
    ) -> Result<Self, SiteError> {
        let mut names = Vec::new();
        let mut instances: HashMap<String, Arc<dyn Plugin>> = HashMap::new();

        for plugin in plugins {
            let name = normalize_plugin_name(plugin.plugin_name());
            validate_plugin_name(&name)?;
            let version = plugin.plugin_version().to_string();
            validate_plugin_version(&name, &version)?;
            if instances.contains_key(&name) {
                return Err(SiteError::DuplicatePlugin(name));
            }
            tracing::debug!(plugin = %name, %version, "registered plugin");
            names.push(name.clone());
            instances.insert(name, plugin);
        }

        let mut trusted: Vec<String> = trusted
            .iter()
            .map(|name| normalize_plugin_name(name))
            .collect();
        trusted.sort();
        trusted.dedup();

        let mut should_save = false;
        storage.edit(|site| {
            for name in &names {
                let version = instances[name].plugin_version().to_string();
                match site.plugins.get_mut(name) {
                    Some(data) => {
                        if data.version != version {
                            tracing::info!(
                                plugin = %name,
                                from = %data.version,
                                to = %version,
                                "plugin version updated"
                            );
                            data.version = version;
                            should_save = true;
                        }
                    }
                    None => {
                        site.plugins.insert(name.clone(), PluginData::new(&version));
                        should_save = true;
                    }
                }
            }
        });
        if should_save {
            storage.save().await?;
        }

        Ok(Self {
            storage,
            trusted,
            names,
            instances,
            routes: RwLock::new(HashMap::new()),
        })
    }

    /// Registered plugin names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.names.clone()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.instances.contains_key(&normalize_plugin_name(name))
    }

    /// The live instance for a name.
    pub fn plugin(&self, name: &str) -> Result<Arc<dyn Plugin>, SiteError> {
        let name = normalize_plugin_name(name);
        self.instances
            .get(&name)
            .map(Arc::clone)
            .ok_or_else(|| SiteError::NotFound(format!("plugin {name}")))
    }

    /// Trusted plugin names, sorted.
    pub fn trusted_plugin_names(&self) -> Vec<String> {
        self.trusted.clone()
    }

    pub fn is_trusted(&self, name: &str) -> bool {
        let name = normalize_plugin_name(name);
        self.trusted.iter().any(|t| *t == name)
    }

    /// Whether a plugin is currently enabled. Unknown names read as
    /// disabled rather than erroring, since dispatch asks this about
    /// whatever identity is on a recorded route.
    pub fn enabled(&self, name: &str) -> bool {
        let name = normalize_plugin_name(name);
        self.storage.read(|site| match site.plugins.get(&name) {
            Some(data) => data.enabled,
            None => {
                tracing::debug!(plugin = %name, "enabled check for unknown plugin");
                false
            }
        })
    }

    /// Whether a plugin holds a grant. Every failure path logs at debug so
    /// a denied request can be traced to the missing assignment.
    pub fn granted(&self, name: &str, grant: Grant) -> bool {
        let name = normalize_plugin_name(name);
        self.storage.read(|site| match site.plugins.get(&name) {
            Some(data) => match data.grants.get(&grant) {
                Some(true) => true,
                Some(false) => {
                    tracing::debug!(plugin = %name, %grant, "grant is revoked");
                    false
                }
                None => {
                    tracing::debug!(plugin = %name, %grant, "grant is not assigned");
                    false
                }
            },
            None => {
                tracing::debug!(plugin = %name, %grant, "grant check for unknown plugin");
                false
            }
        })
    }

    /// The authorization decision: the host identity passes everything,
    /// everyone else needs the grant.
    pub fn authorized(&self, name: &str, grant: Grant) -> bool {
        let name = normalize_plugin_name(name);
        if name == HOST_IDENTITY {
            return true;
        }
        self.granted(&name, grant)
    }

    /// A plugin's stored record.
    pub fn plugin_data(&self, name: &str) -> Option<PluginData> {
        let name = normalize_plugin_name(name);
        self.storage.read(|site| site.plugins.get(&name).cloned())
    }

    /// Every stored plugin record, including records left behind by plugins
    /// that are no longer registered.
    pub fn plugins_data(&self) -> HashMap<String, PluginData> {
        self.storage.read(|site| site.plugins.clone())
    }

    /// What a plugin declared it wants.
    pub fn grant_requests(&self, name: &str) -> Result<Vec<GrantRequest>, SiteError> {
        Ok(self.plugin(name)?.grant_requests())
    }

    /// The settings a plugin declared.
    pub fn declared_settings(&self, name: &str) -> Result<Vec<Setting>, SiteError> {
        Ok(self.plugin(name)?.settings())
    }

    /// A stored setting value, if one has been written.
    pub fn setting(&self, name: &str, key: &str) -> Option<Value> {
        let name = normalize_plugin_name(name);
        self.storage
            .read(|site| site.plugins.get(&name).and_then(|d| d.settings.get(key).cloned()))
    }

    /// The declared default for a setting, if the plugin declares it.
    pub fn setting_default(&self, name: &str, key: &str) -> Option<Value> {
        let plugin = self.plugin(name).ok()?;
        plugin
            .settings()
            .into_iter()
            .find(|s| s.name == key)
            .map(|s| s.default)
    }

    pub async fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), SiteError> {
        let name = normalize_plugin_name(name);
        self.storage
            .mutate(|site| {
                let data = site
                    .plugins
                    .get_mut(&name)
                    .ok_or_else(|| SiteError::NotFound(format!("plugin {name}")))?;
                data.enabled = enabled;
                Ok(())
            })
            .await
    }

    /// Records a grant assignment. Request-list validation happens a layer
    /// up, where the caller's own authority is also checked.
    pub async fn set_grant(&self, name: &str, grant: Grant, value: bool) -> Result<(), SiteError> {
        let name = normalize_plugin_name(name);
        self.storage
            .mutate(|site| {
                let data = site
                    .plugins
                    .get_mut(&name)
                    .ok_or_else(|| SiteError::NotFound(format!("plugin {name}")))?;
                data.grants.insert(grant, value);
                Ok(())
            })
            .await
    }

    pub async fn set_setting(&self, name: &str, key: &str, value: Value) -> Result<(), SiteError> {
        let name = normalize_plugin_name(name);
        let key = key.to_string();
        self.storage
            .mutate(|site| {
                let data = site
                    .plugins
                    .get_mut(&name)
                    .ok_or_else(|| SiteError::NotFound(format!("plugin {name}")))?;
                data.settings.insert(key, value);
                Ok(())
            })
            .await
    }

    /// Creates a fresh record for a plugin, replacing anything stored.
    pub async fn initialize_plugin(&self, name: &str, version: &str) -> Result<(), SiteError> {
        let name = normalize_plugin_name(name);
        let version = version.to_string();
        self.storage
            .mutate(|site| {
                site.plugins.insert(name.clone(), PluginData::new(&version));
                Ok(())
            })
            .await
    }

    /// Drops a plugin's stored record.
    pub async fn remove_plugin(&self, name: &str) -> Result<(), SiteError> {
        let name = normalize_plugin_name(name);
        self.storage
            .mutate(|site| {
                site.plugins
                    .remove(&name)
                    .map(|_| ())
                    .ok_or_else(|| SiteError::NotFound(format!("plugin {name}")))
            })
            .await
    }

    /// Route bookkeeping, written by the page loader after registration and
    /// cleared on unload. In-memory only.
    pub fn set_routes(&self, name: &str, routes: Vec<Route>) {
        let name = normalize_plugin_name(name);
        self.routes
            .write()
            .expect("route bookkeeping lock poisoned")
            .insert(name, routes);
    }

    /// The routes last recorded for a plugin.
    pub fn routes(&self, name: &str) -> Vec<Route> {
        let name = normalize_plugin_name(name);
        self.routes
            .read()
            .expect("route bookkeeping lock poisoned")
            .get(&name)
            .cloned()
            .unwrap_or_default()
    }
}
