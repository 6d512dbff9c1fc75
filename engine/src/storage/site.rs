//! The site document
//!
//! Everything the host persists lives in this one structure, serialized as a
//! single JSON document. Every field tolerates absence so hand-edited or
//! older documents still load.

use chrono::{DateTime, Utc};
use sdk::{PluginData, Post};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The whole persisted state of one site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Site {
    #[serde(default)]
    pub title: String,
    /// Home page introduction, stored as HTML.
    #[serde(default)]
    pub content: String,
    /// `http` or `https`.
    #[serde(default)]
    pub scheme: String,
    /// Host name without the scheme.
    #[serde(default)]
    pub url: String,
    /// Set on every save.
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    /// Posts and pages keyed by their identifier.
    #[serde(default)]
    pub posts: HashMap<String, Post>,
    /// Per-plugin records keyed by normalized plugin name.
    #[serde(default)]
    pub plugins: HashMap<String, PluginData>,
}

impl Site {
    /// Scheme and URL joined, or whatever part exists when one is missing.
    pub fn full_url(&self) -> String {
        if self.scheme.is_empty() || self.url.is_empty() {
            return self.url.clone();
        }
        format!("{}://{}", self.scheme, self.url)
    }
}
