//! Client-side access flag
//!
//! The reader's device remembers that a code was accepted. Storage is
//! injected; [`AccessStore`] loads its state once and changes it only through
//! [`AccessStore::grant`] and [`AccessStore::revoke`].

use crate::code::RedeemResult;
use crate::error::AccessError;
use crate::redeem::AccessCodes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Storage key for the access grant
pub const ACCESS_KEY: &str = "pyramid.access";

/// String key/value persistence
pub trait KeyValueStorage: Send + Sync {
    /// Stored value
    ///
    /// # Errors
    /// Backend failure
    fn get(&self, key: &str) -> Result<Option<String>, AccessError>;

    /// Store a value
    ///
    /// # Errors
    /// Backend failure
    fn set(&self, key: &str, value: &str) -> Result<(), AccessError>;

    /// Forget a value
    ///
    /// # Errors
    /// Backend failure
    fn remove(&self, key: &str) -> Result<(), AccessError>;
}

/// Process-local storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    /// Empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AccessError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AccessError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AccessError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Storage in one JSON object file; a missing file reads as empty
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// Storage backed by `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, AccessError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| AccessError::Json {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(AccessError::io(&self.path, e)),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), AccessError> {
        let text = serde_json::to_string_pretty(entries).map_err(|source| AccessError::Json {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, &text)
    }
}

impl KeyValueStorage for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AccessError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AccessError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), AccessError> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// Write to a sibling temp file, then rename over `path`
pub(crate) fn write_atomic(path: &Path, text: &str) -> Result<(), AccessError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| AccessError::io(parent, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, text).map_err(|e| AccessError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| AccessError::io(path, e))
}

/// What the device remembers about a granted code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Code that was accepted
    pub code: String,
    /// When
    pub granted_at: DateTime<Utc>,
}

/// Reader access flag over injected storage
#[derive(Debug)]
pub struct AccessStore<S: KeyValueStorage> {
    storage: S,
    grant: Option<AccessGrant>,
}

impl<S: KeyValueStorage> AccessStore<S> {
    /// Initialize from whatever `storage` holds
    ///
    /// # Errors
    /// Storage failure, or `Stored` when the saved grant is unreadable
    pub fn load(storage: S) -> Result<Self, AccessError> {
        let grant = storage
            .get(ACCESS_KEY)?
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|source| AccessError::Stored {
                    key: ACCESS_KEY.to_string(),
                    source,
                })
            })
            .transpose()?;
        Ok(Self { storage, grant })
    }

    /// Whether the reader has access
    #[inline]
    #[must_use]
    pub fn has_access(&self) -> bool {
        self.grant.is_some()
    }

    /// Current grant
    #[must_use]
    pub fn grant_info(&self) -> Option<&AccessGrant> {
        self.grant.as_ref()
    }

    /// Remember `code` as granted
    ///
    /// # Errors
    /// Storage failure; the in-memory flag is unchanged then
    pub fn grant(&mut self, code: &str, at: DateTime<Utc>) -> Result<(), AccessError> {
        let grant = AccessGrant {
            code: code.trim().to_string(),
            granted_at: at,
        };
        let raw = serde_json::to_string(&grant).map_err(|source| AccessError::Stored {
            key: ACCESS_KEY.to_string(),
            source,
        })?;
        self.storage.set(ACCESS_KEY, &raw)?;
        tracing::info!("access granted");
        self.grant = Some(grant);
        Ok(())
    }

    /// Forget the grant
    ///
    /// # Errors
    /// Storage failure; the in-memory flag is unchanged then
    pub fn revoke(&mut self) -> Result<(), AccessError> {
        self.storage.remove(ACCESS_KEY)?;
        tracing::info!("access revoked");
        self.grant = None;
        Ok(())
    }

    /// Redeem through `codes` and grant on success
    ///
    /// # Errors
    /// Store or storage failure
    pub async fn redeem(
        &mut self,
        codes: &AccessCodes,
        code: &str,
    ) -> Result<RedeemResult, AccessError> {
        let now = Utc::now();
        let result = codes.redeem_at(code, now).await?;
        if result.valid {
            self.grant(code, now)?;
        }
        Ok(result)
    }

    /// Underlying storage
    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }
}
