//! Cookie-backed session plugin
//!
//! Provides the [`SessionManager`] capability plus the middleware that makes
//! it work. The middleware assigns every request a session token, carried in
//! a keyed-blake3-signed cookie so tokens cannot be forged, and stores the
//! token on the request as an extension. Session state itself lives in
//! memory; anonymous sessions expire after a day, persisted ones after
//! thirty days.

use axum::body::Body;
use axum::http::{header, Request};
use chrono::{DateTime, Duration, Utc};
use sdk::{Handler, Middleware, Plugin, SessionManager, SiteError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "atrium_session";

const SESSION_TTL_HOURS: i64 = 24;
const PERSIST_TTL_DAYS: i64 = 30;

/// The session token assigned to a request, stored as an extension by the
/// session middleware.
#[derive(Debug, Clone)]
struct SessionToken(String);

#[derive(Debug, Clone, Default)]
struct SessionData {
    user: Option<String>,
    persist: bool,
    csrf: Option<String>,
    expires: Option<DateTime<Utc>>,
}

/// Shared session state: the signing key and the live session table.
pub struct SessionStore {
    key: [u8; 32],
    sessions: Mutex<HashMap<String, SessionData>>,
}

impl SessionStore {
    fn new(key: [u8; 32]) -> Self {
        Self {
            key,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sign(&self, token: &str) -> String {
        hex::encode(blake3::keyed_hash(&self.key, token.as_bytes()).as_bytes())
    }

    /// The value stored in the cookie: `token.signature`.
    fn cookie_value(&self, token: &str) -> String {
        format!("{}.{}", token, self.sign(token))
    }

    /// Splits and verifies a cookie value, returning the token when the
    /// signature checks out.
    fn verify(&self, value: &str) -> Option<String> {
        let (token, sig_hex) = value.split_once('.')?;
        let sig_bytes: [u8; 32] = hex::decode(sig_hex).ok()?.try_into().ok()?;
        let expected = blake3::keyed_hash(&self.key, token.as_bytes());
        // blake3::Hash comparison is constant time.
        if expected == blake3::Hash::from(sig_bytes) {
            Some(token.to_string())
        } else {
            tracing::debug!("session cookie signature mismatch");
            None
        }
    }

    /// Creates or refreshes a session entry and returns whether it is
    /// persistent.
    fn touch(&self, token: &str) -> bool {
        let mut sessions = self.sessions.lock().expect("session table lock poisoned");
        let entry = sessions.entry(token.to_string()).or_default();
        let ttl = if entry.persist {
            Duration::days(PERSIST_TTL_DAYS)
        } else {
            Duration::hours(SESSION_TTL_HOURS)
        };
        entry.expires = Some(Utc::now() + ttl);
        entry.persist
    }

    fn purge_expired(&self) {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().expect("session table lock poisoned");
        sessions.retain(|_, data| data.expires.map(|at| at > now).unwrap_or(false));
    }

    fn with_session<R>(
        &self,
        token: &str,
        f: impl FnOnce(&mut SessionData) -> R,
    ) -> Result<R, SiteError> {
        let mut sessions = self.sessions.lock().expect("session table lock poisoned");
        let entry = sessions
            .get_mut(token)
            .ok_or_else(|| SiteError::NotFound(format!("session {token}")))?;
        Ok(f(entry))
    }
}

/// The plugin wrapper. Construct it with the host's session signing key, or
/// `None` to generate an ephemeral one.
pub struct CookieSessionPlugin {
    store: Arc<SessionStore>,
}

impl CookieSessionPlugin {
    pub fn new(key: Option<[u8; 32]>) -> Self {
        let key = key.unwrap_or_else(|| {
            tracing::warn!("no session key configured, sessions will not survive a restart");
            rand::random()
        });
        Self {
            store: Arc::new(SessionStore::new(key)),
        }
    }
}

impl Plugin for CookieSessionPlugin {
    fn plugin_name(&self) -> &str {
        "cookiesession"
    }

    fn plugin_version(&self) -> &str {
        "1.0.0"
    }

    fn session_manager(
        &self,
        _site: Arc<dyn sdk::SecureSite>,
    ) -> Option<Result<Arc<dyn SessionManager>, SiteError>> {
        Some(Ok(Arc::new(CookieSession {
            store: Arc::clone(&self.store),
        })))
    }

    fn middleware(&self) -> Vec<Middleware> {
        vec![session_middleware(Arc::clone(&self.store))]
    }
}

/// Finds this plugin's cookie among the request's Cookie headers.
fn request_cookie(req: &Request<Body>) -> Option<String> {
    for value in req.headers().get_all(header::COOKIE) {
        let Ok(text) = value.to_str() else { continue };
        for pair in text.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                if name == SESSION_COOKIE {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Wraps a handler so every request enters it with a live session token and
/// every response leaves with the session cookie set.
fn session_middleware(store: Arc<SessionStore>) -> Middleware {
    Arc::new(move |next: Handler| {
        let store = Arc::clone(&store);
        Arc::new(move |mut req: Request<Body>| {
            let store = Arc::clone(&store);
            let next = next.clone();
            Box::pin(async move {
                store.purge_expired();

                let token = request_cookie(&req)
                    .and_then(|value| store.verify(&value))
                    .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
                store.touch(&token);
                req.extensions_mut().insert(SessionToken(token.clone()));

                let mut resp = next(req).await?;

                let persist = store.touch(&token);
                let mut cookie = format!(
                    "{}={}; Path=/; HttpOnly; SameSite=Lax",
                    SESSION_COOKIE,
                    store.cookie_value(&token)
                );
                if persist {
                    cookie.push_str(&format!(
                        "; Max-Age={}",
                        Duration::days(PERSIST_TTL_DAYS).num_seconds()
                    ));
                }
                match cookie.parse() {
                    Ok(value) => {
                        resp.headers_mut().append(header::SET_COOKIE, value);
                    }
                    Err(_) => tracing::error!("session cookie failed header encoding"),
                }
                Ok(resp)
            })
        })
    })
}

fn generate_csrf_token() -> String {
    use rand::Rng;
    let charset: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..32)
        .map(|_| {
            let idx = rng.gen_range(0..charset.len());
            charset[idx] as char
        })
        .collect()
}

/// The [`SessionManager`] implementation handed to the host.
pub struct CookieSession {
    store: Arc<SessionStore>,
}

impl CookieSession {
    fn token(&self, req: &Request<Body>) -> Result<String, SiteError> {
        req.extensions()
            .get::<SessionToken>()
            .map(|t| t.0.clone())
            .ok_or(SiteError::Unavailable("session middleware"))
    }
}

impl SessionManager for CookieSession {
    fn authenticated_user(&self, req: &Request<Body>) -> Result<String, SiteError> {
        let token = self.token(req)?;
        // Missing and expired sessions both read as not logged in.
        match self.store.with_session(&token, |data| data.user.clone()) {
            Ok(Some(user)) => Ok(user),
            _ => Err(SiteError::NotAuthenticated),
        }
    }

    fn login(&self, req: &Request<Body>, username: &str) -> Result<(), SiteError> {
        let token = self.token(req)?;
        self.store.with_session(&token, |data| {
            data.user = Some(username.to_string());
        })
    }

    fn logout(&self, req: &Request<Body>) -> Result<(), SiteError> {
        let token = self.token(req)?;
        self.store.with_session(&token, |data| {
            data.user = None;
            data.csrf = None;
            data.persist = false;
        })
    }

    fn persist(&self, req: &Request<Body>, persist: bool) -> Result<(), SiteError> {
        let token = self.token(req)?;
        self.store.with_session(&token, |data| {
            data.persist = persist;
        })
    }

    fn set_csrf(&self, req: &Request<Body>) -> Result<String, SiteError> {
        let token = self.token(req)?;
        let csrf = generate_csrf_token();
        let issued = csrf.clone();
        self.store.with_session(&token, move |data| {
            data.csrf = Some(issued);
        })?;
        Ok(csrf)
    }

    fn csrf(&self, req: &Request<Body>, token_value: &str) -> bool {
        let Ok(token) = self.token(req) else {
            return false;
        };
        // Tokens are single use: matching or not, a check consumes them.
        self.store
            .with_session(&token, |data| {
                let stored = data.csrf.take();
                stored.as_deref() == Some(token_value) && !token_value.is_empty()
            })
            .unwrap_or(false)
    }
}
