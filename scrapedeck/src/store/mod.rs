//! Credential storage.

mod memory;
mod traits;

pub use memory::MemoryCredentialStore;
pub use traits::CredentialStore;
