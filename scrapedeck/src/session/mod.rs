//! Session wiring: the auth machine, the credential store and the backend.

mod bootstrap;
mod sync;
mod validator;

pub use bootstrap::{BootOutcome, Bootstrapper, RetryPolicy};
pub use sync::write_through;
pub use validator::{AuthBackend, TokenValidator};

use log::{debug, info, warn};
use std::cell::RefCell;
use std::rc::Rc;

use crate::auth::{AuthEvent, AuthHandle, AuthState, Dispatch, Subscription};
use crate::error::{Error, Result};
use crate::guard::{NavigationGuard, RecoveryAction};
use crate::store::CredentialStore;

/// Composition root for one signed-in (or not) user.
///
/// Owns the credential write-through; dropping the session leaves the
/// machine running but stops persisting tokens.
pub struct Session {
    handle: AuthHandle,
    store: Rc<dyn CredentialStore>,
    validator: Rc<dyn TokenValidator>,
    backend: Rc<dyn AuthBackend>,
    retry: RetryPolicy,
    persistence: Option<Subscription>,
}

impl Session {
    pub fn new<B>(handle: AuthHandle, store: Rc<dyn CredentialStore>, backend: Rc<B>) -> Self
    where
        B: AuthBackend + 'static,
    {
        let persistence = write_through(&handle, store.clone());
        Self {
            handle,
            store,
            validator: backend.clone(),
            backend,
            retry: RetryPolicy::default(),
            persistence: Some(persistence),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn handle(&self) -> &AuthHandle {
        &self.handle
    }

    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    /// Read the stored token and validate it.
    pub async fn bootstrap(&self) -> BootOutcome {
        Bootstrapper::new(
            self.handle.clone(),
            self.store.clone(),
            self.validator.clone(),
        )
        .with_retry(self.retry.clone())
        .run()
        .await
    }

    /// Log in with credentials. Only valid while `Unauthenticated`.
    pub async fn login(&self, username: &str, password: &str) -> Result<Dispatch> {
        let state = self.handle.state();
        if state != AuthState::Unauthenticated {
            return Err(Error::InvalidArgument(format!("cannot log in while {}", state)));
        }

        let response = self.backend.login(username, password).await?;
        let token = response.token.clone();
        let dispatch = self.handle.send(AuthEvent::LoginSuccess {
            token: response.token,
            user: response.user,
        });

        if dispatch.is_rejected() {
            // Something else moved the machine while the call was in flight.
            warn!("login result dropped in state {}", self.handle.state());
            if let Err(e) = self.backend.logout(&token).await {
                warn!("failed to revoke unused token: {}", e);
            }
        } else {
            info!("logged in");
        }
        Ok(dispatch)
    }

    /// Log out: `LOGOUT`, revoke the token server-side, then `RESET`.
    ///
    /// The server call is best effort; the local session always ends.
    pub async fn logout(&self) -> Dispatch {
        let token = self.handle.context().token;
        let dispatch = self.handle.send(AuthEvent::Logout);
        if !dispatch.is_applied() {
            return dispatch;
        }

        if let Some(token) = token {
            if let Err(e) = self.backend.logout(&token).await {
                warn!("server logout failed, ending session locally: {}", e);
            }
        }

        self.handle.send(AuthEvent::Reset);
        dispatch
    }

    /// Run one of the recovery actions offered by the guard's terminal views.
    pub async fn recover(&self, action: RecoveryAction, guard: &mut NavigationGuard) -> Result<()> {
        info!("recovery requested: {:?}", action);
        guard.reset_attempts();

        match action {
            RecoveryAction::Reauthenticate => match self.handle.state() {
                AuthState::Authenticated => {
                    self.logout().await;
                }
                _ => {
                    self.handle.send(AuthEvent::Reset);
                }
            },
            RecoveryAction::HardReset => {
                self.handle.reset();
                self.bootstrap().await;
            }
            RecoveryAction::ClearCredentialsAndReload => {
                self.store.clear()?;
                self.handle.reset();
                self.bootstrap().await;
            }
            RecoveryAction::ForceLogin => {
                guard.force_login();
            }
        }
        Ok(())
    }

    /// Tell the session that the credential store may have changed outside
    /// this process. Returns `true` if the session was ended as a result.
    pub fn storage_changed(&self) -> Result<bool> {
        if self.handle.state() != AuthState::Authenticated || self.store.has_token()? {
            return Ok(false);
        }

        info!("stored token removed elsewhere, ending session");
        self.handle.send(AuthEvent::Logout);
        self.handle.send(AuthEvent::Reset);
        Ok(true)
    }

    /// Feed every state change into `guard` so it can track genuine settles.
    ///
    /// Changes that arrive while the guard is mid-render are queued on the
    /// guard and applied before its next decision.
    pub fn attach_guard(&self, guard: Rc<RefCell<NavigationGuard>>) -> Subscription {
        let backlog = guard.borrow().backlog();
        self.handle.subscribe(move |change| match guard.try_borrow_mut() {
            Ok(mut guard) => guard.observe(change.to),
            Err(_) => {
                debug!("guard busy, queueing {}", change.to);
                backlog.borrow_mut().push(change.to);
            }
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(subscription) = self.persistence.take() {
            subscription.unsubscribe();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.handle.state())
            .field("store", &self.store)
            .field("retry", &self.retry)
            .finish()
    }
}
