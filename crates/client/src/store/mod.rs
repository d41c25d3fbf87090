//! Persisted credential storage
//!
//! The token store is the single piece of shared mutable state in the client.
//! Every operation touches exactly one key and is persisted before it returns,
//! so an interrupted refresh can never leave a half-written credential pair.

mod file;
mod memory;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

use crate::types::{Role, TokenPair};

/// Keys held by a [`TokenStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKey {
    /// Short-lived bearer credential sent on every call
    Access,
    /// Long-lived credential used only to mint a new access token
    Refresh,
    /// Session role tag (`DOCTOR` / `PATIENT`)
    Role,
}

impl TokenKey {
    pub const ALL: [Self; 3] = [Self::Access, Self::Refresh, Self::Role];

    /// Name of the key in persisted storage
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::Role => "user_type",
        }
    }
}

/// Synchronous key-value holder for the session credentials
///
/// Implementations must persist each write immediately and must not validate
/// token contents.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: TokenKey) -> Option<String>;
    fn set(&self, key: TokenKey, value: &str);
    fn remove(&self, key: TokenKey);
}

/// Read the current access token
pub fn access_token(store: &dyn TokenStore) -> Option<String> {
    store.get(TokenKey::Access)
}

/// Read the current refresh token
pub fn refresh_token(store: &dyn TokenStore) -> Option<String> {
    store.get(TokenKey::Refresh)
}

/// Read the session role tag
pub fn role(store: &dyn TokenStore) -> Option<Role> {
    store.get(TokenKey::Role).map(|r| Role::from(r.as_str()))
}

/// Write a freshly issued credential pair
pub fn store_credentials(store: &dyn TokenStore, pair: &TokenPair) {
    store.set(TokenKey::Access, &pair.access);
    store.set(TokenKey::Refresh, &pair.refresh);
}

/// Drop both tokens, leaving the role tag in place
pub fn clear_credentials(store: &dyn TokenStore) {
    store.remove(TokenKey::Access);
    store.remove(TokenKey::Refresh);
}

/// Drop every key, as on logout
pub fn clear_session(store: &dyn TokenStore) {
    for key in TokenKey::ALL {
        store.remove(key);
    }
}
