//! Persisted data models shared between the host and plugins

use crate::grant::Grant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Everything the site document stores about one plugin.
///
/// The record survives across restarts and across plugin upgrades; the host
/// refreshes `version` at registration time and leaves the rest alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginData {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub version: String,
    /// Grant assignments. Only grants the plugin requested can appear with a
    /// `true` value; revocations may leave `false` entries behind.
    #[serde(default)]
    pub grants: HashMap<Grant, bool>,
    /// Stored setting values, keyed by declared setting name.
    #[serde(default)]
    pub settings: HashMap<String, Value>,
}

impl PluginData {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            ..Default::default()
        }
    }

    /// Whether `grant` is currently assigned with a `true` value.
    pub fn granted(&self, grant: Grant) -> bool {
        self.grants.get(&grant).copied().unwrap_or(false)
    }
}

/// A post or page in the site document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub title: String,
    /// Path the post is reachable at, without the leading slash.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub published: bool,
    /// Pages are standalone documents; posts are dated entries.
    #[serde(default)]
    pub page: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A post paired with the identifier it is stored under. Listing operations
/// return this so callers can address individual posts afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostWithID {
    pub id: String,
    #[serde(flatten)]
    pub post: Post,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plugin_data_granted_defaults_false() {
        let data = PluginData::new("1.0.0");
        assert!(!data.granted(Grant::SitePostRead));

        let mut data = data;
        data.grants.insert(Grant::SitePostRead, true);
        data.grants.insert(Grant::SitePostWrite, false);
        assert!(data.granted(Grant::SitePostRead));
        assert!(!data.granted(Grant::SitePostWrite));
    }

    #[test]
    fn test_plugin_data_round_trips() {
        let mut data = PluginData::new("2.1.0");
        data.enabled = true;
        data.grants.insert(Grant::RouterRouteWrite, true);
        data.settings.insert("Subtitle".to_string(), json!("hi"));

        let json = serde_json::to_string(&data).unwrap();
        let back: PluginData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_post_with_id_flattens() {
        let entry = PostWithID {
            id: "p1".to_string(),
            post: Post {
                title: "First".to_string(),
                published: true,
                ..Default::default()
            },
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["id"], "p1");
        assert_eq!(value["title"], "First");
    }
}
