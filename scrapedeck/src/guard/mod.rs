//! Navigation guard for protected routes.
//!
//! The guard turns the current [`AuthView`] into one of a few render outcomes
//! and bounds redirects independently of the auth machine: after `ceiling`
//! consecutive redirects without a genuine settle it switches to a terminal
//! "navigation loop" view that never redirects on its own.
//!
//! ```text
//! IDLE ── redirect ──► REDIRECT_ISSUED ── activate / settle ──► IDLE
//!   │                                                    │
//!   │ authenticated                       ceiling reached│
//!   ▼                                                    ▼
//! SETTLED                                         LOOP_EXHAUSTED
//! ```

mod redirect;

pub use redirect::{RecordingRedirector, Redirect, Redirector};

use log::warn;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

use crate::auth::{AuthObserver, AuthState, AuthView, LogObserver};

/// Default number of redirects before the loop view takes over.
pub const DEFAULT_REDIRECT_CEILING: u32 = 3;

/// Accepted range for the redirect ceiling.
pub const REDIRECT_CEILING_RANGE: std::ops::RangeInclusive<u32> = 3..=5;

/// Default login route.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Guard configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    /// Maximum consecutive redirects.
    pub ceiling: u32,
    /// Where unauthenticated users are sent.
    pub login_path: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_REDIRECT_CEILING,
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
        }
    }
}

impl GuardConfig {
    /// Build a config, pulling `ceiling` into [`REDIRECT_CEILING_RANGE`].
    pub fn new(ceiling: u32, login_path: impl Into<String>) -> Self {
        Self {
            ceiling,
            login_path: login_path.into(),
        }
        .clamped()
    }

    /// Same config with the ceiling inside [`REDIRECT_CEILING_RANGE`].
    pub fn clamped(mut self) -> Self {
        let (min, max) = (*REDIRECT_CEILING_RANGE.start(), *REDIRECT_CEILING_RANGE.end());
        let bounded = self.ceiling.clamp(min, max);
        if bounded != self.ceiling {
            warn!(
                "redirect ceiling {} out of range {}..={}, using {}",
                self.ceiling, min, max, bounded
            );
            self.ceiling = bounded;
        }
        self
    }
}

/// The guard's own small state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardPhase {
    /// Nothing issued in this activation.
    Idle,
    /// A redirect was issued and has not taken effect yet.
    RedirectIssued,
    /// Protected content was shown.
    Settled,
    /// Too many redirects; only explicit recovery gets out.
    LoopExhausted,
}

/// Escape hatches offered by the terminal views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Drop the session and go to the login screen.
    Reauthenticate,
    /// Force the machine back to a clean start and bootstrap again.
    HardReset,
    /// Clear the credential store and reload.
    ClearCredentialsAndReload,
    /// Navigate to the login screen, bypassing the breaker.
    ForceLogin,
}

/// What to render for a protected route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RenderOutcome {
    /// Render the protected children.
    Protected,
    /// Render a loading placeholder.
    Loading,
    /// A redirect was just issued.
    Redirected(Redirect),
    /// Validation could not complete; show an error panel.
    ValidationError {
        error: Option<String>,
        actions: Vec<RecoveryAction>,
    },
    /// The breaker tripped; show the loop panel.
    NavigationLoop {
        attempts: u32,
        actions: Vec<RecoveryAction>,
    },
}

impl RenderOutcome {
    /// True for views that require an explicit user action.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RenderOutcome::ValidationError { .. } | RenderOutcome::NavigationLoop { .. }
        )
    }
}

/// Guards one protected area.
pub struct NavigationGuard {
    config: GuardConfig,
    redirector: Rc<dyn Redirector>,
    observer: Rc<dyn AuthObserver>,
    phase: GuardPhase,
    attempts: u32,
    last_settled: Option<AuthState>,
    // States that arrived while the guard was busy rendering.
    backlog: Rc<RefCell<Vec<AuthState>>>,
}

impl NavigationGuard {
    pub fn new(config: GuardConfig, redirector: Rc<dyn Redirector>) -> Self {
        Self {
            config: config.clamped(),
            redirector,
            observer: Rc::new(LogObserver),
            phase: GuardPhase::Idle,
            attempts: 0,
            last_settled: None,
            backlog: Rc::default(),
        }
    }

    pub fn with_observer(mut self, observer: Rc<dyn AuthObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn phase(&self) -> GuardPhase {
        self.phase
    }

    /// Consecutive redirects since the last genuine settle.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Start a new activation: the user (re-)entered the protected area.
    ///
    /// Clears "redirect issued" but never the attempt counter.
    pub fn activate(&mut self) {
        if matches!(self.phase, GuardPhase::RedirectIssued | GuardPhase::Settled) {
            self.phase = GuardPhase::Idle;
        }
    }

    /// Clear the breaker after an explicit recovery action.
    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
        self.phase = GuardPhase::Idle;
    }

    /// Send the user to the login route regardless of the breaker.
    pub fn force_login(&mut self) -> Redirect {
        self.reset_attempts();
        let redirect = Redirect::new(&self.config.login_path);
        self.redirector.redirect(&redirect);
        redirect
    }

    /// Record an observed auth state.
    ///
    /// Entering `Authenticated` or `Unauthenticated` resets the counter only
    /// if it differs from the last settled state seen; an oscillation through
    /// pre-authenticated states back to the same settled state is a bounce.
    pub fn observe(&mut self, state: AuthState) {
        if !state.is_settled() || self.last_settled == Some(state) {
            return;
        }
        self.last_settled = Some(state);
        self.attempts = 0;
        if matches!(
            self.phase,
            GuardPhase::RedirectIssued | GuardPhase::LoopExhausted
        ) {
            self.phase = GuardPhase::Idle;
        }
    }

    /// Shared slot for states observed while the guard is borrowed.
    /// They are applied, in order, around the next render.
    pub(crate) fn backlog(&self) -> Rc<RefCell<Vec<AuthState>>> {
        Rc::clone(&self.backlog)
    }

    fn drain_backlog(&mut self) {
        let pending = std::mem::take(&mut *self.backlog.borrow_mut());
        for state in pending {
            self.observe(state);
        }
    }

    /// Decide what to render for `requested_path`.
    pub fn render(&mut self, view: &AuthView, requested_path: &str) -> RenderOutcome {
        self.drain_backlog();
        let outcome = self.decide(view, requested_path);
        self.drain_backlog();
        outcome
    }

    fn decide(&mut self, view: &AuthView, requested_path: &str) -> RenderOutcome {
        self.observe(view.state);

        if view.is_loading {
            return RenderOutcome::Loading;
        }

        if view.state == AuthState::ValidationError {
            return RenderOutcome::ValidationError {
                error: view.error.clone(),
                actions: vec![RecoveryAction::Reauthenticate, RecoveryAction::HardReset],
            };
        }

        if view.should_redirect_to_login && !view.can_navigate_to_protected_route {
            return self.redirect_to_login(requested_path);
        }

        if view.can_navigate_to_protected_route && view.state == AuthState::Authenticated {
            self.phase = GuardPhase::Settled;
            return RenderOutcome::Protected;
        }

        self.observer.guard_anomaly(view);
        RenderOutcome::Loading
    }

    fn redirect_to_login(&mut self, requested_path: &str) -> RenderOutcome {
        if self.attempts >= self.config.ceiling {
            if self.phase != GuardPhase::LoopExhausted {
                self.observer.loop_detected(self.attempts);
            }
            self.phase = GuardPhase::LoopExhausted;
            return RenderOutcome::NavigationLoop {
                attempts: self.attempts,
                actions: vec![
                    RecoveryAction::ClearCredentialsAndReload,
                    RecoveryAction::ForceLogin,
                ],
            };
        }

        if self.phase == GuardPhase::RedirectIssued {
            return RenderOutcome::Loading;
        }

        self.attempts += 1;
        let mut redirect = Redirect::new(&self.config.login_path);
        if !requested_path.is_empty() && requested_path != self.config.login_path {
            redirect = redirect.resume_to(requested_path);
        }

        self.redirector.redirect(&redirect);
        self.observer.redirect_issued(
            self.attempts,
            &redirect.to,
            redirect.resume_to.as_deref(),
        );
        self.phase = GuardPhase::RedirectIssued;

        RenderOutcome::Redirected(redirect)
    }
}

impl std::fmt::Debug for NavigationGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationGuard")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("attempts", &self.attempts)
            .field("last_settled", &self.last_settled)
            .finish()
    }
}
