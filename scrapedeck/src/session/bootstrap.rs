//! Session bootstrap: read the stored token once and drive the machine to a
//! settled state.

use log::{debug, info, warn};
use serde::Serialize;
use std::rc::Rc;
use std::time::Duration;

use super::validator::TokenValidator;
use crate::auth::{AuthEvent, AuthHandle, AuthState, Dispatch};
use crate::error::Error;
use crate::store::CredentialStore;

/// Retry behavior for validation calls that fail transiently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-indexed), doubling up to the cap.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// How a bootstrap run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootOutcome {
    /// The stored token was validated.
    Authenticated,
    /// No token, or the token was rejected.
    Unauthenticated,
    /// The validation service could not be reached.
    Unavailable,
    /// `INITIALIZE` was rejected: another bootstrap already ran.
    AlreadyStarted,
    /// The machine moved on while validation was in flight; the result was dropped.
    Superseded,
    /// Called from inside a listener; nothing was sent. Run again once the
    /// fan-out has finished.
    Deferred,
}

/// Drives `INITIALIZE → TOKEN_FOUND/TOKEN_NOT_FOUND → VALIDATION_*`.
pub struct Bootstrapper {
    handle: AuthHandle,
    store: Rc<dyn CredentialStore>,
    validator: Rc<dyn TokenValidator>,
    retry: RetryPolicy,
}

impl Bootstrapper {
    pub fn new(
        handle: AuthHandle,
        store: Rc<dyn CredentialStore>,
        validator: Rc<dyn TokenValidator>,
    ) -> Self {
        Self {
            handle,
            store,
            validator,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run the bootstrap sequence.
    ///
    /// Safe to call more than once: a second run finds `INITIALIZE` rejected
    /// and returns [`BootOutcome::AlreadyStarted`] without validating again.
    pub async fn run(&self) -> BootOutcome {
        if self.handle.is_dispatching() {
            debug!("bootstrap requested during a fan-out, deferring");
            return BootOutcome::Deferred;
        }

        let stored = match self.store.get() {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!("credential store unreadable, starting signed out: {}", e);
                None
            }
        };

        match self.handle.send(AuthEvent::Initialize) {
            Dispatch::Applied { .. } => {}
            Dispatch::Queued => return BootOutcome::Deferred,
            Dispatch::Unhandled | Dispatch::GuardRejected => {
                debug!("bootstrap skipped, machine is in {}", self.handle.state());
                return BootOutcome::AlreadyStarted;
            }
        }

        let Some(token) = stored else {
            self.handle.send(AuthEvent::TokenNotFound);
            return self.outcome();
        };

        let found = self.handle.send(AuthEvent::TokenFound {
            token: token.clone(),
        });
        if !found.is_applied() {
            return BootOutcome::Superseded;
        }

        self.validate(&token).await
    }

    async fn validate(&self, token: &str) -> BootOutcome {
        let mut attempt = 0;

        loop {
            let result = self.validator.validate(token).await;

            if !self.still_checking(token) {
                debug!("dropping stale validation result");
                return BootOutcome::Superseded;
            }

            let event = match result {
                Ok(user) => {
                    info!("stored token accepted for {}", user.display_name());
                    AuthEvent::ValidationSuccess { user }
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        "token validation failed ({}), retry {}/{} in {:?}",
                        e,
                        attempt + 1,
                        self.retry.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;

                    if !self.still_checking(token) {
                        return BootOutcome::Superseded;
                    }
                    if let Dispatch::Applied { .. } = self.handle.send(AuthEvent::ValidationStart) {
                        continue;
                    }
                    return self.outcome();
                }
                Err(e) if e.is_retryable() => {
                    warn!("validation service unavailable: {}", e);
                    AuthEvent::ValidationUnavailable {
                        error: e.to_string(),
                    }
                }
                Err(e) => {
                    info!("stored token rejected: {}", e);
                    AuthEvent::ValidationFailure {
                        error: rejection_message(&e),
                    }
                }
            };

            return match self.handle.send(event) {
                Dispatch::Applied { .. } | Dispatch::Queued => self.outcome(),
                Dispatch::Unhandled | Dispatch::GuardRejected => BootOutcome::Superseded,
            };
        }
    }

    // A result is only current if nothing reset or replaced the token meanwhile.
    fn still_checking(&self, token: &str) -> bool {
        self.handle.state() == AuthState::CheckingToken
            && self.handle.context().token.as_deref() == Some(token)
    }

    fn outcome(&self) -> BootOutcome {
        match self.handle.state() {
            AuthState::Authenticated => BootOutcome::Authenticated,
            AuthState::Unauthenticated => BootOutcome::Unauthenticated,
            AuthState::ValidationError => BootOutcome::Unavailable,
            _ => BootOutcome::Superseded,
        }
    }
}

fn rejection_message(error: &Error) -> String {
    if error.is_auth_error() {
        "Session expired, please log in again".to_owned()
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthMachine;
    use crate::error::Result;
    use crate::models::User;
    use crate::store::MemoryCredentialStore;
    use async_trait::async_trait;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Validator that replays scripted answers and counts calls.
    #[derive(Default)]
    struct Scripted {
        answers: RefCell<VecDeque<Result<User>>>,
        calls: Cell<u32>,
        // Runs before answering, to simulate events arriving mid-flight.
        interleave: RefCell<Option<Box<dyn Fn()>>>,
    }

    impl Scripted {
        fn new(answers: Vec<Result<User>>) -> Rc<Self> {
            Rc::new(Self {
                answers: RefCell::new(answers.into()),
                ..Self::default()
            })
        }
    }

    #[async_trait(?Send)]
    impl TokenValidator for Scripted {
        async fn validate(&self, _token: &str) -> Result<User> {
            self.calls.set(self.calls.get() + 1);
            if let Some(hook) = self.interleave.borrow().as_ref() {
                hook();
            }
            self.answers
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(Error::api("500", "no scripted answer")))
        }
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn setup(
        token: Option<&str>,
        validator: Rc<Scripted>,
    ) -> (AuthHandle, Rc<MemoryCredentialStore>, Bootstrapper) {
        let handle = AuthHandle::new(AuthMachine::new());
        let store = Rc::new(match token {
            Some(t) => MemoryCredentialStore::with_token(t),
            None => MemoryCredentialStore::new(),
        });
        let boot = Bootstrapper::new(handle.clone(), store.clone(), validator)
            .with_retry(fast_retry(2));
        (handle, store, boot)
    }

    #[test]
    fn test_retry_delay_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_token_present_and_valid() {
        let validator = Scripted::new(vec![Ok(User::new("u1"))]);
        let (handle, _, boot) = setup(Some("abc"), validator.clone());

        assert_eq!(boot.run().await, BootOutcome::Authenticated);

        let ctx = handle.context();
        assert_eq!(handle.state(), AuthState::Authenticated);
        assert_eq!(ctx.user.unwrap().id.as_str(), "u1");
        assert!(ctx.last_validation.is_some());
        assert_eq!(validator.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_token_present_and_rejected() {
        let validator = Scripted::new(vec![Err(Error::api("401", "unauthorized"))]);
        let (handle, _, boot) = setup(Some("abc"), validator.clone());

        assert_eq!(boot.run().await, BootOutcome::Unauthenticated);

        let ctx = handle.context();
        assert_eq!(handle.state(), AuthState::Unauthenticated);
        assert!(ctx.token.is_none());
        assert!(ctx.error.is_some());
        assert_eq!(validator.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_no_token() {
        let validator = Scripted::new(vec![]);
        let (handle, _, boot) = setup(None, validator.clone());

        assert_eq!(boot.run().await, BootOutcome::Unauthenticated);
        assert_eq!(handle.state(), AuthState::Unauthenticated);
        assert_eq!(validator.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_blank_token_counts_as_absent() {
        let validator = Scripted::new(vec![]);
        let (handle, _, boot) = setup(Some("   "), validator.clone());

        assert_eq!(boot.run().await, BootOutcome::Unauthenticated);
        assert_eq!(handle.state(), AuthState::Unauthenticated);
        assert_eq!(validator.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_second_run_does_not_validate_again() {
        let validator = Scripted::new(vec![Ok(User::new("u1")), Ok(User::new("u2"))]);
        let (handle, _, boot) = setup(Some("abc"), validator.clone());

        boot.run().await;
        assert_eq!(boot.run().await, BootOutcome::AlreadyStarted);
        assert_eq!(validator.calls.get(), 1);
        assert_eq!(handle.context().user.unwrap().id.as_str(), "u1");
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let validator = Scripted::new(vec![
            Err(Error::api("503", "unavailable")),
            Ok(User::new("u1")),
        ]);
        let (handle, _, boot) = setup(Some("abc"), validator.clone());

        assert_eq!(boot.run().await, BootOutcome::Authenticated);
        assert_eq!(validator.calls.get(), 2);
        assert!(handle.context().error.is_none());
    }

    #[tokio::test]
    async fn test_retries_exhausted_is_unavailable() {
        let validator = Scripted::new(vec![
            Err(Error::api("503", "down")),
            Err(Error::api("503", "down")),
            Err(Error::api("503", "still down")),
        ]);
        let (handle, _, boot) = setup(Some("abc"), validator.clone());

        assert_eq!(boot.run().await, BootOutcome::Unavailable);
        assert_eq!(validator.calls.get(), 3);

        let ctx = handle.context();
        assert_eq!(handle.state(), AuthState::ValidationError);
        assert_eq!(ctx.token.as_deref(), Some("abc"));
        assert!(ctx.error.unwrap().contains("still down"));
    }

    #[test]
    fn test_bootstrap_from_listener_is_deferred() {
        let handle = AuthHandle::new(AuthMachine::new());
        let store = Rc::new(MemoryCredentialStore::new());
        let validator = Scripted::new(vec![]);
        let boot = || Bootstrapper::new(handle.clone(), store.clone(), validator.clone());
        let runtime = || {
            tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap()
        };

        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let sink = outcomes.clone();
        let mut nested = Some(boot());
        handle.subscribe(move |_| {
            if let Some(nested) = nested.take() {
                let rt = runtime();
                sink.borrow_mut().push(rt.block_on(nested.run()));
            }
        });

        handle.reset();
        assert_eq!(*outcomes.borrow(), vec![BootOutcome::Deferred]);
        assert_eq!(handle.state(), AuthState::Uninitialized);

        assert_eq!(runtime().block_on(boot().run()), BootOutcome::Unauthenticated);
        assert_eq!(handle.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_stale_success_after_reset_is_dropped() {
        let validator = Scripted::new(vec![Ok(User::new("u1"))]);
        let (handle, _, boot) = setup(Some("abc"), validator.clone());

        let meddler = handle.clone();
        *validator.interleave.borrow_mut() = Some(Box::new(move || meddler.reset()));

        assert_eq!(boot.run().await, BootOutcome::Superseded);
        assert_eq!(handle.state(), AuthState::Uninitialized);
        assert!(handle.context().user.is_none());
    }
}
