//! Write-through from settled transitions to the credential store.

use log::{debug, warn};
use std::rc::Rc;

use crate::auth::{AuthHandle, AuthState, StateChange, Subscription};
use crate::error::Result;
use crate::store::CredentialStore;

/// Persist the token on entering `Authenticated` and clear the store on
/// entering `Unauthenticated`. Other transitions leave the store alone.
pub fn write_through(handle: &AuthHandle, store: Rc<dyn CredentialStore>) -> Subscription {
    handle.subscribe(move |change| {
        if let Err(e) = persist(store.as_ref(), change) {
            warn!("credential store write failed after {}: {}", change.to, e);
        }
    })
}

fn persist(store: &dyn CredentialStore, change: &StateChange) -> Result<()> {
    if change.entered(AuthState::Authenticated) {
        if let Some(token) = change.context.token.as_deref() {
            debug!("persisting token");
            store.set(token)?;
        }
    } else if change.entered(AuthState::Unauthenticated) {
        debug!("clearing stored token");
        store.clear()?;
    }
    Ok(())
}
