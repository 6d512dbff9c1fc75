//! Site document persistence
//!
//! The live [`Site`] document sits behind a read-write lock for cheap
//! synchronous reads. All mutations funnel through [`Storage::mutate`],
//! which holds an async save lock across the change and the following
//! [`DataStorer::save`], so the document on disk always reflects a completed
//! mutation and concurrent writers serialize cleanly.
//!
//! Three backends: in-memory (tests, throwaway sites), local file, and an
//! encrypting wrapper that can sit over any other backend.

mod site;

pub use site::Site;

use async_trait::async_trait;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use chrono::Utc;
use sdk::{DataStorer, SiteError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use tokio::sync::Mutex;

/// The site document and its backend.
pub struct Storage {
    site: RwLock<Site>,
    store: Box<dyn DataStorer>,
    save_lock: Mutex<()>,
}

impl Storage {
    /// Loads the document from the backend. An empty backend yields a fresh
    /// default document.
    pub async fn open(store: Box<dyn DataStorer>) -> Result<Self, SiteError> {
        let bytes = store.load().await?;
        let site = if bytes.is_empty() {
            Site::default()
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(Self {
            site: RwLock::new(site),
            store,
            save_lock: Mutex::new(()),
        })
    }

    /// Reads from the document without blocking on persistence.
    pub fn read<R>(&self, f: impl FnOnce(&Site) -> R) -> R {
        let site = self.site.read().expect("site lock poisoned");
        f(&site)
    }

    /// Applies a mutation and saves the document before returning. When the
    /// closure fails the document is left as the closure left it but no save
    /// happens, so closures must not modify state on their error paths.
    pub async fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Site) -> Result<R, SiteError>,
    ) -> Result<R, SiteError> {
        let _guard = self.save_lock.lock().await;
        let result = {
            let mut site = self.site.write().expect("site lock poisoned");
            f(&mut site)?
        };
        self.persist().await?;
        Ok(result)
    }

    /// Applies a mutation without saving. Boot-time registration batches
    /// many of these behind one [`Storage::save`].
    pub fn edit(&self, f: impl FnOnce(&mut Site)) {
        let mut site = self.site.write().expect("site lock poisoned");
        f(&mut site);
    }

    /// Saves the current document.
    pub async fn save(&self) -> Result<(), SiteError> {
        let _guard = self.save_lock.lock().await;
        self.persist().await
    }

    /// Discards the in-memory document and reloads it from the backend.
    pub async fn reload(&self) -> Result<(), SiteError> {
        let _guard = self.save_lock.lock().await;
        let bytes = self.store.load().await?;
        let fresh = if bytes.is_empty() {
            Site::default()
        } else {
            serde_json::from_slice(&bytes)?
        };
        let mut site = self.site.write().expect("site lock poisoned");
        *site = fresh;
        Ok(())
    }

    async fn persist(&self) -> Result<(), SiteError> {
        let bytes = {
            let mut site = self.site.write().expect("site lock poisoned");
            site.updated = Some(Utc::now());
            document_bytes(&site)?
        };
        self.store.save(&bytes).await
    }
}

/// Pretty JSON in debug builds for diffable documents, compact in release.
fn document_bytes(site: &Site) -> Result<Vec<u8>, SiteError> {
    let bytes = if cfg!(debug_assertions) {
        serde_json::to_vec_pretty(site)?
    } else {
        serde_json::to_vec(site)?
    };
    Ok(bytes)
}

/// Keeps the document in memory only.
#[derive(Default)]
pub struct MemoryStore {
    data: std::sync::Mutex<Vec<u8>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many saves have happened; used to observe batching.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataStorer for MemoryStore {
    async fn load(&self) -> Result<Vec<u8>, SiteError> {
        Ok(self.data.lock().expect("store lock poisoned").clone())
    }

    async fn save(&self, data: &[u8]) -> Result<(), SiteError> {
        *self.data.lock().expect("store lock poisoned") = data.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Stores the document in a single file.
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl DataStorer for LocalStore {
    async fn load(&self) -> Result<Vec<u8>, SiteError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, data: &[u8]) -> Result<(), SiteError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        // Write-then-rename so readers never observe a torn document.
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

const NONCE_LEN: usize = 24;

/// Encrypts the document with XChaCha20-Poly1305 before handing it to the
/// wrapped backend. Layout is a random nonce followed by the ciphertext.
pub struct EncryptedStore {
    inner: Box<dyn DataStorer>,
    cipher: XChaCha20Poly1305,
}

impl EncryptedStore {
    pub fn new(inner: Box<dyn DataStorer>, key: &[u8; 32]) -> Self {
        Self {
            inner,
            cipher: XChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }
}

#[async_trait]
impl DataStorer for EncryptedStore {
    async fn load(&self) -> Result<Vec<u8>, SiteError> {
        let bytes = self.inner.load().await?;
        if bytes.is_empty() {
            return Ok(bytes);
        }
        if bytes.len() < NONCE_LEN {
            return Err(SiteError::Storage(
                "encrypted site document is truncated".to_string(),
            ));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| SiteError::Storage("site document failed decryption".to_string()))
    }

    async fn save(&self, data: &[u8]) -> Result<(), SiteError> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, data)
            .map_err(|_| SiteError::Storage("site document failed encryption".to_string()))?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        self.inner.save(&out).await
    }
}
