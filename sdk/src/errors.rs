//! Error types shared by the host and plugins

use crate::grant::Grant;
use axum::http::StatusCode;
use thiserror::Error;

/// Errors produced by site operations, plugin registration, request dispatch
/// and rendering.
#[derive(Debug, Error)]
pub enum SiteError {
    /// The calling plugin does not hold the grant an operation requires.
    #[error("access denied: plugin '{plugin}' lacks grant '{grant}'")]
    AccessDenied {
        /// The identity that made the call.
        plugin: String,
        /// The grant that was required.
        grant: Grant,
    },

    /// A grant was assigned that the target plugin never asked for.
    #[error("grant '{grant}' was not requested by plugin '{plugin}'")]
    GrantNotRequested { plugin: String, grant: Grant },

    /// A setting was written that the target plugin never declared.
    #[error("setting '{setting}' was not specified by plugin '{plugin}'")]
    SettingNotSpecified { plugin: String, setting: String },

    /// A named item (plugin, post, route, setting) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Two plugins were registered under the same normalized name.
    #[error("duplicate plugin name: '{0}'")]
    DuplicatePlugin(String),

    /// A plugin name failed validation or collided with a reserved word.
    #[error("invalid plugin name: '{0}'")]
    InvalidPluginName(String),

    /// A plugin version string is not valid semver.
    #[error("invalid version '{version}' for plugin '{plugin}'")]
    InvalidPluginVersion { plugin: String, version: String },

    /// The current request carries no authenticated user.
    #[error("user is not authenticated")]
    NotAuthenticated,

    /// A collaborator this operation needs was not wired in.
    #[error("{0} is not available")]
    Unavailable(&'static str),

    /// The storage backend failed to load or save the site document.
    #[error("storage error: {0}")]
    Storage(String),

    /// Template expansion or page assembly failed.
    #[error("render error: {0}")]
    Render(String),

    /// The host configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failed to build an HTTP response or other internal plumbing.
    #[error("internal error: {0}")]
    Internal(String),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Filesystem I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification helpers on [`SiteError`].
pub trait SiteErrorExt {
    /// The HTTP status this error maps to when it escapes request handling.
    fn status(&self) -> StatusCode;

    /// Whether the error should abort host startup. Per-request failures are
    /// never fatal; registration failures always are.
    fn is_fatal(&self) -> bool;
}

impl SiteErrorExt for SiteError {
    fn status(&self) -> StatusCode {
        match self {
            SiteError::AccessDenied { .. }
            | SiteError::GrantNotRequested { .. }
            | SiteError::SettingNotSpecified { .. }
            | SiteError::NotAuthenticated => StatusCode::FORBIDDEN,
            SiteError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn is_fatal(&self) -> bool {
        matches!(
            self,
            SiteError::DuplicatePlugin(_)
                | SiteError::InvalidPluginName(_)
                | SiteError::InvalidPluginVersion { .. }
                | SiteError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_failures_are_forbidden() {
        let err = SiteError::AccessDenied {
            plugin: "mp1".to_string(),
            grant: Grant::SitePostWrite,
        };
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert!(!err.is_fatal());

        let err = SiteError::GrantNotRequested {
            plugin: "mp1".to_string(),
            grant: Grant::All,
        };
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        assert_eq!(
            SiteError::NotFound("route".to_string()).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_registration_failures_are_fatal() {
        assert!(SiteError::DuplicatePlugin("mp1".to_string()).is_fatal());
        assert!(SiteError::InvalidPluginName("Bad Name".to_string()).is_fatal());
        assert!(SiteError::InvalidPluginVersion {
            plugin: "mp1".to_string(),
            version: "one".to_string(),
        }
        .is_fatal());
        assert!(!SiteError::NotFound("post".to_string()).is_fatal());
    }

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = SiteError::AccessDenied {
            plugin: "welcome".to_string(),
            grant: Grant::SiteTitleWrite,
        };
        let msg = err.to_string();
        assert!(msg.contains("welcome"));
        assert!(msg.contains("site.title:write"));
    }
}
