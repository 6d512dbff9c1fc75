//! Asset and template function injection
//!
//! On every render, walks the enabled plugins in registration order and
//! collects what each may contribute: assets (behind `site.asset:write`)
//! and template functions (behind `site.funcmap:write`). Assets are
//! filtered by the visitor's auth state and the page layout, turned into
//! elements, merged per location, and committed through the renderer's
//! injection calls. Charset declarations float to the front of the head, and
//! function names are prefixed with their plugin's name so two plugins can
//! never collide in the template namespace.

use crate::registry::PluginSystem;
use sdk::{
    AssetInjector, AssetLocation, AuthType, Document, FuncMap, Grant, LayoutType, Renderer,
    SessionManager, SiteError, Vars,
};
use axum::body::Body;
use axum::http::Request;
use std::sync::Arc;

/// Applies the `{plugin}_{function}` namespace rule. Already-prefixed names
/// pass through unchanged, so the rule is idempotent.
pub fn namespaced_func_name(plugin: &str, name: &str) -> String {
    let prefix = format!("{plugin}_");
    if name.starts_with(&prefix) {
        name.to_string()
    } else {
        format!("{prefix}{name}")
    }
}

/// The host's [`AssetInjector`] implementation.
pub struct PluginInjector {
    system: Arc<PluginSystem>,
    session: Option<Arc<dyn SessionManager>>,
}

impl PluginInjector {
    pub fn new(system: Arc<PluginSystem>, session: Option<Arc<dyn SessionManager>>) -> Self {
        Self { system, session }
    }

    fn visible(&self, auth: AuthType, authenticated: bool) -> bool {
        match auth {
            AuthType::All => true,
            AuthType::Anonymous => !authenticated,
            AuthType::Authenticated => authenticated,
        }
    }
}

impl AssetInjector for PluginInjector {
    fn inject(
        &self,
        renderer: &dyn Renderer,
        mut doc: Document,
        req: &Request<Body>,
        layout: LayoutType,
    ) -> Result<Document, SiteError> {
        let authenticated = self
            .session
            .as_ref()
            .map(|s| s.authenticated_user(req).is_ok())
            .unwrap_or(false);

        let mut head_front = String::new();
        let mut head = String::new();
        let mut header = String::new();
        let mut main = String::new();
        let mut footer = String::new();
        let mut body = String::new();
        let mut funcs = FuncMap::new();

        for name in self.system.names() {
            if !self.system.enabled(&name) {
                continue;
            }
            let Ok(plugin) = self.system.plugin(&name) else {
                continue;
            };

            if let Some(map) = plugin.funcmap(req) {
                if self.system.authorized(&name, Grant::SiteFuncMapWrite) {
                    for (func_name, func) in map {
                        funcs.insert(namespaced_func_name(&name, &func_name), func);
                    }
                } else {
                    tracing::debug!(plugin = %name, "funcmap skipped, grant missing");
                }
            }

            let assets = plugin.assets();
            if assets.is_empty() {
                continue;
            }
            if !self.system.authorized(&name, Grant::SiteAssetWrite) {
                tracing::debug!(plugin = %name, "assets skipped, grant missing");
                continue;
            }

            for asset in assets {
                if !self.visible(asset.auth, authenticated) {
                    continue;
                }
                if let Some(only) = asset.layout_only {
                    if only != layout {
                        continue;
                    }
                }
                let element = asset.element();
                if element.is_empty() {
                    continue;
                }
                if asset.is_charset() {
                    Document::append(&mut head_front, &element);
                    continue;
                }
                match asset.location {
                    AssetLocation::Head => Document::append(&mut head, &element),
                    AssetLocation::Header => Document::append(&mut header, &element),
                    AssetLocation::Main => Document::append(&mut main, &element),
                    AssetLocation::Footer => Document::append(&mut footer, &element),
                    AssetLocation::Body => Document::append(&mut body, &element),
                }
            }
        }

        let mut head_all = head_front;
        Document::append(&mut head_all, &head);

        doc = renderer.inject_head(doc, &head_all, funcs, Vars::new())?;
        doc = renderer.inject_header(doc, &header, FuncMap::new(), Vars::new())?;
        doc = renderer.inject_main(doc, &main, FuncMap::new(), Vars::new())?;
        doc = renderer.inject_body(doc, &body, FuncMap::new(), Vars::new())?;
        doc = renderer.inject_footer(doc, &footer, FuncMap::new(), Vars::new())?;
        Ok(doc)
    }
}
