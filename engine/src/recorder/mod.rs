//! Route recording and dispatch
//!
//! The underlying router only ever sees one handler per method and path:
//! a dispatch closure owned by this module. Behind each dispatch entry sits
//! a list of per-plugin registrations in registration order. At request time
//! the dispatcher walks that list and runs the first handler whose plugin is
//! currently enabled; if none is, the request falls through to not-found.
//! Handlers are additionally wrapped so the owning plugin's route grant is
//! re-checked on every call, which makes a revocation bite immediately.

use crate::registry::PluginSystem;
use crate::validate::normalize_plugin_name;
use sdk::{AppRouter, Grant, Handler, Route, RouteRegistrar, SiteError};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

struct RecordedRoute {
    plugin: String,
    handler: Handler,
}

type RouteMap = Arc<RwLock<HashMap<String, Vec<RecordedRoute>>>>;

/// Records who registered what and stands between the router and every
/// plugin handler.
pub struct RouteRecorder {
    system: Arc<PluginSystem>,
    router: Arc<dyn AppRouter>,
    route_map: RouteMap,
}

impl RouteRecorder {
    pub fn new(system: Arc<PluginSystem>, router: Arc<dyn AppRouter>) -> Arc<Self> {
        Arc::new(Self {
            system,
            router,
            route_map: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Wraps a handler so the owning plugin's `router.route:write` grant is
    /// re-verified when the request arrives, not only when the route was
    /// registered.
    fn protect(&self, plugin: &str, handler: Handler) -> Handler {
        let system = Arc::clone(&self.system);
        let plugin = plugin.to_string();
        Arc::new(move |req| {
            if !system.authorized(&plugin, Grant::RouterRouteWrite) {
                tracing::debug!(plugin = %plugin, "route grant revoked, refusing dispatch");
                let plugin = plugin.clone();
                return Box::pin(async move {
                    Err(SiteError::AccessDenied {
                        plugin,
                        grant: Grant::RouterRouteWrite,
                    })
                });
            }
            handler(req)
        })
    }

    /// Builds the single dispatch handler registered with the router for a
    /// key: first enabled owner in registration order wins, nobody enabled
    /// reads as not found.
    fn dispatch_handler(&self, key: String) -> Handler {
        let map = Arc::clone(&self.route_map);
        let system = Arc::clone(&self.system);
        Arc::new(move |req| {
            let picked = {
                let routes = map.read().expect("route map lock poisoned");
                routes.get(&key).and_then(|owners| {
                    owners
                        .iter()
                        .find(|r| system.enabled(&r.plugin))
                        .map(|r| r.handler.clone())
                })
            };
            match picked {
                Some(handler) => handler(req),
                None => {
                    let key = key.clone();
                    Box::pin(async move { Err(SiteError::NotFound(key)) })
                }
            }
        })
    }
}

impl RouteRegistrar for RouteRecorder {
    fn handle(&self, plugin: &str, method: &str, path: &str, handler: Handler) {
        let plugin = normalize_plugin_name(plugin);
        if !self.system.authorized(&plugin, Grant::RouterRouteWrite) {
            tracing::debug!(plugin = %plugin, method, path, "route registration refused");
            return;
        }

        let route = Route::new(method, path);
        let key = route.key();
        let protected = self.protect(&plugin, handler);

        let register_dispatch = {
            let mut map = self.route_map.write().expect("route map lock poisoned");
            let owners = map.entry(key.clone()).or_default();
            match owners.iter_mut().find(|r| r.plugin == plugin) {
                Some(existing) => {
                    // Same plugin, same route: replace in place, keep order.
                    existing.handler = protected;
                    false
                }
                None => {
                    tracing::debug!(plugin = %plugin, %key, "route recorded");
                    owners.push(RecordedRoute {
                        plugin: plugin.clone(),
                        handler: protected,
                    });
                    owners.len() == 1
                }
            }
        };

        // The router learns each key once; dispatch handles ownership.
        if register_dispatch {
            self.router
                .handle(&route.method, &route.path, self.dispatch_handler(key));
        }
    }

    fn routes_for(&self, plugin: &str) -> Vec<Route> {
        let plugin = normalize_plugin_name(plugin);
        let map = self.route_map.read().expect("route map lock poisoned");
        let mut routes = Vec::new();
        for (key, owners) in map.iter() {
            if owners.iter().any(|r| r.plugin == plugin) {
                if let Some((method, path)) = key.split_once(' ') {
                    routes.push(Route::new(method, path));
                }
            }
        }
        routes.sort_by(|a, b| a.key().cmp(&b.key()));
        routes
    }

    fn clear_route(&self, plugin: &str, method: &str, path: &str) {
        let plugin = normalize_plugin_name(plugin);
        let key = Route::new(method, path).key();
        let mut map = self.route_map.write().expect("route map lock poisoned");
        if let Some(owners) = map.get_mut(&key) {
            owners.retain(|r| r.plugin != plugin);
        }
    }

    fn clear_plugin(&self, plugin: &str) {
        let plugin = normalize_plugin_name(plugin);
        let mut map = self.route_map.write().expect("route map lock poisoned");
        for owners in map.values_mut() {
            owners.retain(|r| r.plugin != plugin);
        }
    }
}
