//! Path-segment router plugin
//!
//! Provides the [`AppRouter`] capability: method plus path matching with
//! `:name` parameter segments. Matching prefers routes with more literal
//! segments, so `/posts/all` wins over `/posts/:id` regardless of
//! registration order. Captured parameters are attached to the request as a
//! [`RouteParams`] extension.

use axum::body::Body;
use axum::http::Request;
use sdk::{AppRouter, Handler, HandlerFuture, Plugin, RouteParams, SiteError};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The plugin wrapper that hands the router capability to the host.
#[derive(Default)]
pub struct PathRouterPlugin;

impl PathRouterPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for PathRouterPlugin {
    fn plugin_name(&self) -> &str {
        "pathrouter"
    }

    fn plugin_version(&self) -> &str {
        "1.0.0"
    }

    fn router(&self) -> Option<Result<Arc<dyn AppRouter>, SiteError>> {
        Some(Ok(Arc::new(PathRouter::new())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

fn parse_segments(path: &str) -> Vec<Segment> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed
        .split('/')
        .map(|part| match part.strip_prefix(':') {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(part.to_string()),
        })
        .collect()
}

struct RouteEntry {
    method: String,
    pattern: String,
    segments: Vec<Segment>,
    handler: Handler,
}

impl RouteEntry {
    /// Matches a concrete path against this entry. On success returns the
    /// captured parameters and the number of literal segments, used as the
    /// specificity score.
    fn matches(&self, path: &str) -> Option<(HashMap<String, String>, usize)> {
        let trimmed = path.trim_matches('/');
        let parts: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        let mut literals = 0;
        for (segment, part) in self.segments.iter().zip(parts.iter()) {
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                    literals += 1;
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }
        Some((params, literals))
    }
}

/// The router itself. One instance serves the whole site.
pub struct PathRouter {
    routes: RwLock<Vec<RouteEntry>>,
    not_found: RwLock<Option<Handler>>,
}

impl PathRouter {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(Vec::new()),
            not_found: RwLock::new(None),
        }
    }

    /// Picks the best match for a request: most literal segments wins, ties
    /// go to the earliest registration.
    fn lookup(&self, method: &str, path: &str) -> Option<(Handler, HashMap<String, String>)> {
        let routes = self.routes.read().expect("route table lock poisoned");
        let mut best: Option<(usize, HashMap<String, String>, Handler)> = None;
        for entry in routes.iter() {
            if entry.method != method {
                continue;
            }
            if let Some((params, literals)) = entry.matches(path) {
                let better = match &best {
                    Some((score, _, _)) => literals > *score,
                    None => true,
                };
                if better {
                    best = Some((literals, params, entry.handler.clone()));
                }
            }
        }
        best.map(|(_, params, handler)| (handler, params))
    }
}

impl Default for PathRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl AppRouter for PathRouter {
    fn handle(&self, method: &str, path: &str, handler: Handler) {
        let method = method.to_uppercase();
        let mut routes = self.routes.write().expect("route table lock poisoned");
        if let Some(entry) = routes
            .iter_mut()
            .find(|e| e.method == method && e.pattern == path)
        {
            entry.handler = handler;
            return;
        }
        routes.push(RouteEntry {
            method,
            segments: parse_segments(path),
            pattern: path.to_string(),
            handler,
        });
    }

    fn clear(&self, method: &str, path: &str) {
        let method = method.to_uppercase();
        let mut routes = self.routes.write().expect("route table lock poisoned");
        routes.retain(|e| !(e.method == method && e.pattern == path));
    }

    fn set_not_found(&self, handler: Handler) {
        let mut slot = self.not_found.write().expect("not_found lock poisoned");
        *slot = Some(handler);
    }

    fn serve(&self, mut req: Request<Body>) -> HandlerFuture {
        let method = req.method().as_str().to_uppercase();
        let path = req.uri().path().to_string();

        if let Some((handler, params)) = self.lookup(&method, &path) {
            req.extensions_mut().insert(RouteParams(params));
            return handler(req);
        }

        tracing::debug!(%method, %path, "no route matched");
        let fallback = {
            let slot = self.not_found.read().expect("not_found lock poisoned");
            slot.clone()
        };
        match fallback {
            Some(handler) => handler(req),
            None => Box::pin(async move { Err(SiteError::NotFound(path)) }),
        }
    }
}
