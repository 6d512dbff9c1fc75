//! Plugin name and version validation
//!
//! Names are identities: they key grant storage, route ownership and
//! template function namespaces, so the rules are strict and enforced once
//! at registration. Every lookup funnels through [`normalize_plugin_name`]
//! so that callers can never split the identity space with stray case or
//! whitespace.

use regex::Regex;
use sdk::{SiteError, HOST_IDENTITY};
use std::sync::OnceLock;

/// Names that can never be plugin identities.
const RESERVED_NAMES: &[&str] = &[HOST_IDENTITY, "atr", "plugin", "plugins"];

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9]*$").expect("valid name pattern"))
}

/// Lowercases and trims a plugin name. Applied to every name entering the
/// system, whether from plugin code, persisted data or request paths.
pub fn normalize_plugin_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Validates a normalized plugin name.
pub fn validate_plugin_name(name: &str) -> Result<(), SiteError> {
    if !name_re().is_match(name) {
        return Err(SiteError::InvalidPluginName(name.to_string()));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(SiteError::InvalidPluginName(name.to_string()));
    }
    Ok(())
}

/// Validates a plugin's version string as semver.
pub fn validate_plugin_version(name: &str, version: &str) -> Result<(), SiteError> {
    semver::Version::parse(version).map_err(|_| SiteError::InvalidPluginVersion {
        plugin: name.to_string(),
        version: version.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_trims() {
        assert_eq!(normalize_plugin_name("  Welcome "), "welcome");
        assert_eq!(normalize_plugin_name("PATHROUTER"), "pathrouter");
    }

    #[test]
    fn test_valid_names() {
        for name in ["welcome", "mp1", "a", "plugin2go"] {
            assert!(validate_plugin_name(name).is_ok(), "{name} should pass");
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "Welcome", "has space", "has-dash", "1starts", "_x"] {
            assert!(
                matches!(
                    validate_plugin_name(name),
                    Err(SiteError::InvalidPluginName(_))
                ),
                "{name:?} should fail"
            );
        }
    }

    #[test]
    fn test_reserved_names_rejected() {
        for name in ["atrium", "atr", "plugin", "plugins"] {
            assert!(matches!(
                validate_plugin_name(name),
                Err(SiteError::InvalidPluginName(_))
            ));
        }
    }

    #[test]
    fn test_version_must_be_semver() {
        assert!(validate_plugin_version("mp1", "1.0.0").is_ok());
        assert!(validate_plugin_version("mp1", "0.2.1").is_ok());
        assert!(matches!(
            validate_plugin_version("mp1", "one"),
            Err(SiteError::InvalidPluginVersion { .. })
        ));
        assert!(validate_plugin_version("mp1", "1.0").is_err());
    }
}
