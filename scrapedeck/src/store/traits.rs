//! Credential store trait definitions.

use std::rc::Rc;

use crate::error::Result;

/// Durable storage for the bearer token.
///
/// Implementations are synchronous and must survive reloads of the host
/// application. The auth layer reads the store once at bootstrap and
/// writes through on settled transitions.
pub trait CredentialStore: std::fmt::Debug {
    /// Get the stored token.
    fn get(&self) -> Result<Option<String>>;

    /// Replace the stored token.
    fn set(&self, token: &str) -> Result<()>;

    /// Remove the stored token.
    fn clear(&self) -> Result<()>;

    /// Check for a non-empty token.
    fn has_token(&self) -> Result<bool> {
        Ok(self.get()?.is_some_and(|t| !t.trim().is_empty()))
    }
}

impl<T: CredentialStore + ?Sized> CredentialStore for Rc<T> {
    fn get(&self) -> Result<Option<String>> {
        (**self).get()
    }

    fn set(&self, token: &str) -> Result<()> {
        (**self).set(token)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;

    #[test]
    fn test_has_token() {
        let store = MemoryCredentialStore::new();
        assert!(!store.has_token().unwrap());

        store.set("  ").unwrap();
        assert!(!store.has_token().unwrap());

        store.set("abc").unwrap();
        assert!(store.has_token().unwrap());
    }

    #[test]
    fn test_rc_forwarding() {
        let store: Rc<dyn CredentialStore> = Rc::new(MemoryCredentialStore::new());
        let shared = Rc::clone(&store);
        shared.set("abc").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("abc"));
    }
}
