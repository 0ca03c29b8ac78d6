//! Tab-scoped holder of the current access credential

use crate::credential::AccessCredential;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Key/value storage that lives no longer than the browsing session.
///
/// Backends must never persist beyond the tab (no `localStorage`, no disk).
pub trait CredentialStorage {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

/// Process-memory storage, used natively and as a fallback when the browser
/// refuses `sessionStorage` (e.g. some private modes).
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.items.borrow_mut().remove(key);
    }
}

/// The single owner of the access credential.
///
/// Cloning shares the same backing storage. No validation is done: any
/// non-empty string is accepted.
#[derive(Clone)]
pub struct TokenStore {
    storage: Rc<dyn CredentialStorage>,
    key: Rc<str>,
}

impl TokenStore {
    pub fn new(storage: Rc<dyn CredentialStorage>, key: impl Into<Rc<str>>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// In-memory store with the default key
    pub fn in_memory() -> Self {
        Self::new(Rc::new(MemoryStorage::new()), "keeper.access_token")
    }

    pub fn set(&self, token: impl Into<AccessCredential>) {
        let token = token.into();
        if token.as_str().is_empty() {
            self.clear();
            return;
        }
        self.storage.set_item(&self.key, token.as_str());
    }

    pub fn get(&self) -> Option<AccessCredential> {
        self.storage
            .get_item(&self.key)
            .filter(|value| !value.is_empty())
            .map(AccessCredential::new)
    }

    pub fn clear(&self) {
        self.storage.remove_item(&self.key);
    }

    pub fn is_empty(&self) -> bool {
        self.get().is_none()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("key", &self.key)
            .field("present", &!self.is_empty())
            .finish()
    }
}
