//! In-memory credential store.

use std::cell::RefCell;

use super::traits::CredentialStore;
use crate::error::Result;

/// Credential store kept in process memory.
///
/// Useful for tests and for hosts that persist the token themselves.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RefCell<Option<String>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RefCell::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Result<Option<String>> {
        Ok(self.token.borrow().clone())
    }

    fn set(&self, token: &str) -> Result<()> {
        *self.token.borrow_mut() = Some(token.to_owned());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.token.borrow_mut().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.get().unwrap(), None);

        store.set("token1").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("token1"));

        store.set("token2").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("token2"));

        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn test_with_token() {
        let store = MemoryCredentialStore::with_token("abc");
        assert_eq!(store.get().unwrap().as_deref(), Some("abc"));
    }
}
