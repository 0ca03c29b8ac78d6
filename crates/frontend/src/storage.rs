//! `sessionStorage`-backed credential storage

use keeper_core::CredentialStorage;
use web_sys::Storage;

/// Credential storage scoped to the browser tab.
///
/// Storage errors (quota, disabled storage) are logged and otherwise treated
/// as a missing value.
#[derive(Debug, Clone)]
pub struct BrowserSessionStorage {
    storage: Storage,
}

impl BrowserSessionStorage {
    /// `None` when the browser refuses session storage
    pub fn open() -> Option<Self> {
        get_session_storage().map(|storage| Self { storage })
    }
}

fn get_session_storage() -> Option<Storage> {
    web_sys::window().and_then(|w| w.session_storage().ok().flatten())
}

impl CredentialStorage for BrowserSessionStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set_item(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set_item(key, value) {
            tracing::warn!(error = ?e, "failed to write session storage");
        }
    }

    fn remove_item(&self, key: &str) {
        if let Err(e) = self.storage.remove_item(key) {
            tracing::warn!(error = ?e, "failed to clear session storage");
        }
    }
}
