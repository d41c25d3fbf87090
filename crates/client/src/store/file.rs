use super::{TokenKey, TokenStore};
use crate::error::StoreError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error};

/// Token store backed by a JSON file
///
/// The whole file is rewritten on every `set` and `remove`. Writes go to a
/// sibling temp file first and are then renamed over the original, so a crash
/// mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileTokenStore {
    /// Open the store at `path`, loading any existing contents
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = entries.len(), "Opened token store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;

        // Owner read/write only, the file holds the refresh token
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(&self, key: TokenKey, f: impl FnOnce(&mut BTreeMap<String, String>)) {
        // Hold the lock across the write so file order matches memory order
        let mut entries = self.lock();
        f(&mut entries);
        if let Err(e) = self.persist(&entries) {
            error!(key = key.as_str(), path = %self.path.display(), "Failed to persist token store: {e}");
        }
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: TokenKey) -> Option<String> {
        self.lock().get(key.as_str()).cloned()
    }

    fn set(&self, key: TokenKey, value: &str) {
        self.update(key, |entries| {
            entries.insert(key.as_str().to_string(), value.to_string());
        });
    }

    fn remove(&self, key: TokenKey) {
        self.update(key, |entries| {
            entries.remove(key.as_str());
        });
    }
}
