use super::{TokenKey, TokenStore};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Process-local token store with no persistence
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<TokenKey, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with an access and refresh token
    pub fn with_tokens(access: Option<&str>, refresh: Option<&str>) -> Self {
        let store = Self::new();
        if let Some(access) = access {
            store.set(TokenKey::Access, access);
        }
        if let Some(refresh) = refresh {
            store.set(TokenKey::Refresh, refresh);
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TokenKey, String>> {
        // Values are plain strings, a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: TokenKey) -> Option<String> {
        self.lock().get(&key).cloned()
    }

    fn set(&self, key: TokenKey, value: &str) {
        self.lock().insert(key, value.to_string());
    }

    fn remove(&self, key: TokenKey) {
        self.lock().remove(&key);
    }
}
