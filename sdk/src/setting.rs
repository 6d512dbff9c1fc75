//! Plugin setting declarations

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a setting is edited on administration screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    #[default]
    Input,
    Password,
    Textarea,
    Checkbox,
}

/// Help text for a setting, with an optional documentation link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingDescription {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub url: String,
}

/// One setting a plugin declares.
///
/// Only declared settings can be written; a write to an undeclared name is
/// rejected. Reads fall back to `default` until a value has been stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Setting {
    pub name: String,
    #[serde(default)]
    pub setting_type: SettingType,
    #[serde(default)]
    pub description: SettingDescription,
    /// Hidden settings are stored but not shown on administration screens.
    #[serde(default)]
    pub hide: bool,
    /// Value reads resolve to when nothing has been stored yet.
    #[serde(default)]
    pub default: Value,
}

impl Setting {
    pub fn new(name: &str, default: Value) -> Self {
        Self {
            name: name.to_string(),
            default,
            ..Default::default()
        }
    }

    pub fn with_description(mut self, text: &str) -> Self {
        self.description.text = text.to_string();
        self
    }

    pub fn with_type(mut self, setting_type: SettingType) -> Self {
        self.setting_type = setting_type;
        self
    }
}
