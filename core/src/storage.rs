//! Key/value storages used by the cache dispatcher and the OAuth flow.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{ApiError, Result};
use crate::http::Response;

/// Response cache keyed by request identity.
pub trait Cache {
    fn load(&self, key: &str) -> Option<Response>;

    /// Store `response`, replacing any previous entry, and hand it back.
    fn save(&self, key: &str, response: Response) -> Response;
}

impl<C: Cache + ?Sized> Cache for &C {
    fn load(&self, key: &str) -> Option<Response> {
        (**self).load(key)
    }

    fn save(&self, key: &str, response: Response) -> Response {
        (**self).save(key, response)
    }
}

impl<C: Cache + ?Sized> Cache for Arc<C> {
    fn load(&self, key: &str) -> Option<Response> {
        (**self).load(key)
    }

    fn save(&self, key: &str, response: Response) -> Response {
        (**self).save(key, response)
    }
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Response>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Cache for MemoryCache {
    fn load(&self, key: &str) -> Option<Response> {
        self.entries.lock().get(key).cloned()
    }

    fn save(&self, key: &str, response: Response) -> Response {
        self.entries.lock().insert(key.to_string(), response.clone());
        response
    }
}

/// One JSON file per entry under `<temp_dir>/ghapi-core`.
///
/// File names are the SHA-256 digest of the key. Entries that cannot be read
/// back or parsed load as absent.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(temp_dir: impl AsRef<Path>) -> Result<Self> {
        let temp_dir = temp_dir.as_ref();
        if !temp_dir.is_dir() {
            return Err(ApiError::MissingDirectory(format!(
                "Directory '{}' is missing.",
                temp_dir.display()
            )));
        }

        let dir = temp_dir.join("ghapi-core");
        if let Err(e) = fs::create_dir(&dir) {
            if !dir.is_dir() {
                return Err(ApiError::MissingDirectory(format!(
                    "Cannot create '{}' directory: {e}",
                    dir.display()
                )));
            }
        }

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    fn write(&self, path: &Path, response: &Response) -> Result<()> {
        let bytes = serde_json::to_vec(response)?;
        let partial = path.with_extension("json.tmp");
        fs::write(&partial, bytes)?;
        fs::rename(&partial, path)?;
        Ok(())
    }
}

impl Cache for FileCache {
    fn load(&self, key: &str) -> Option<Response> {
        let path = self.file_path(key);
        let bytes = fs::read(&path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable cache entry");
                None
            }
        }
    }

    fn save(&self, key: &str, response: Response) -> Response {
        let path = self.file_path(key);
        if let Err(e) = self.write(&path, &response) {
            warn!(path = %path.display(), error = %e, "failed to write cache entry");
        }
        response
    }
}

/// Cross-request storage for the OAuth login flow.
pub trait SessionStorage {
    fn set(&self, name: &str, value: Value);

    fn get(&self, name: &str) -> Option<Value>;

    fn remove(&self, name: &str);
}

impl<S: SessionStorage + ?Sized> SessionStorage for &S {
    fn set(&self, name: &str, value: Value) {
        (**self).set(name, value)
    }

    fn get(&self, name: &str) -> Option<Value> {
        (**self).get(name)
    }

    fn remove(&self, name: &str) {
        (**self).remove(name)
    }
}

/// In-process session storage, optionally namespaced.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    namespace: String,
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::with_namespace("ghapi-core")
    }

    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            values: Mutex::new(HashMap::new()),
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}.{name}", self.namespace)
    }
}

impl SessionStorage for MemorySessionStorage {
    fn set(&self, name: &str, value: Value) {
        self.values.lock().insert(self.key(name), value);
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.values.lock().get(&self.key(name)).cloned()
    }

    fn remove(&self, name: &str) {
        self.values.lock().remove(&self.key(name));
    }
}
