//! Typed observability sink for the auth machine and navigation guard.

use log::{debug, info, warn};

use super::machine::SubscriptionId;
use super::state::{AuthEventKind, AuthState, AuthView};

/// Why `send` did not apply an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No row for `(state, event)`.
    Unhandled,
    /// A row exists but its guard returned false.
    GuardFailed,
}

/// Receives everything the auth layer wants reported.
///
/// All methods default to no-ops so implementors pick what they care about.
pub trait AuthObserver {
    /// A transition was applied.
    fn transition(&self, _from: AuthState, _event: AuthEventKind, _to: AuthState) {}

    /// An event was ignored.
    fn rejected(&self, _state: AuthState, _event: AuthEventKind, _reason: Rejection) {}

    /// A subscriber panicked during fan-out.
    fn listener_failed(&self, _id: SubscriptionId, _message: &str) {}

    /// The machine was force-reset.
    fn reset(&self, _from: AuthState) {}

    /// The guard saw a combination it cannot interpret and failed closed.
    fn guard_anomaly(&self, _view: &AuthView) {}

    /// The guard sent the user to the login screen.
    fn redirect_issued(&self, _attempt: u32, _to: &str, _resume_to: Option<&str>) {}

    /// The guard gave up redirecting.
    fn loop_detected(&self, _attempts: u32) {}
}

/// Observer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AuthObserver for NoopObserver {}

/// Observer that forwards to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl AuthObserver for LogObserver {
    fn transition(&self, from: AuthState, event: AuthEventKind, to: AuthState) {
        info!("auth: {} --{}--> {}", from, event, to);
    }

    fn rejected(&self, state: AuthState, event: AuthEventKind, reason: Rejection) {
        match reason {
            Rejection::Unhandled => {
                debug!("auth: ignored {} in state {} (no transition)", event, state)
            }
            Rejection::GuardFailed => {
                debug!("auth: ignored {} in state {} (guard rejected)", event, state)
            }
        }
    }

    fn listener_failed(&self, id: SubscriptionId, message: &str) {
        warn!("auth: listener {} panicked: {}", id, message);
    }

    fn reset(&self, from: AuthState) {
        warn!("auth: forced reset from {}", from);
    }

    fn guard_anomaly(&self, view: &AuthView) {
        warn!("guard: inconsistent auth view {:?}, showing placeholder", view);
    }

    fn redirect_issued(&self, attempt: u32, to: &str, resume_to: Option<&str>) {
        info!(
            "guard: redirect #{} to {} (resume {})",
            attempt,
            to,
            resume_to.unwrap_or("-")
        );
    }

    fn loop_detected(&self, attempts: u32) {
        warn!("guard: navigation loop after {} redirects", attempts);
    }
}
