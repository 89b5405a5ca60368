//! The transition table: the single source of truth for legal state changes.

use chrono::{DateTime, Utc};

use super::context::{AuthContext, ContextPatch, Field};
use super::state::{AuthEvent, AuthEventKind, AuthState};

/// Side-effect-free predicate deciding whether a matched transition may fire.
pub type Guard = fn(&AuthContext, &AuthEvent) -> bool;

/// Pure context update run after the event payload is merged.
pub type Action = fn(&AuthContext, DateTime<Utc>) -> ContextPatch;

/// One row of the table.
#[derive(Clone, Copy)]
pub struct Transition {
    pub from: AuthState,
    pub event: AuthEventKind,
    pub to: AuthState,
    pub guard: Option<Guard>,
    pub action: Action,
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("from", &self.from)
            .field("event", &self.event)
            .field("to", &self.to)
            .field("guarded", &self.guard.is_some())
            .finish()
    }
}

use AuthEventKind as E;
use AuthState as S;

/// Every legal `(state, event)` pair. Anything else is rejected.
pub static TRANSITIONS: &[Transition] = &[
    Transition {
        from: S::Uninitialized,
        event: E::Initialize,
        to: S::Initializing,
        guard: None,
        action: clear_error,
    },
    Transition {
        from: S::Initializing,
        event: E::TokenFound,
        to: S::CheckingToken,
        guard: Some(event_has_token),
        action: begin_validation,
    },
    Transition {
        from: S::Initializing,
        event: E::TokenNotFound,
        to: S::Unauthenticated,
        guard: None,
        action: drop_credentials,
    },
    Transition {
        from: S::CheckingToken,
        event: E::ValidationStart,
        to: S::CheckingToken,
        guard: Some(context_has_token),
        action: restart_validation,
    },
    Transition {
        from: S::CheckingToken,
        event: E::ValidationSuccess,
        to: S::Authenticated,
        guard: None,
        action: validated,
    },
    Transition {
        from: S::CheckingToken,
        event: E::ValidationFailure,
        to: S::Unauthenticated,
        guard: None,
        action: rejected,
    },
    Transition {
        from: S::CheckingToken,
        event: E::ValidationUnavailable,
        to: S::ValidationError,
        guard: None,
        action: unavailable,
    },
    Transition {
        from: S::Unauthenticated,
        event: E::LoginSuccess,
        to: S::Authenticated,
        guard: Some(event_has_token),
        action: logged_in,
    },
    Transition {
        from: S::Authenticated,
        event: E::Logout,
        to: S::LoggingOut,
        guard: None,
        action: begin_logout,
    },
    Transition {
        from: S::LoggingOut,
        event: E::Reset,
        to: S::Unauthenticated,
        guard: None,
        action: blank,
    },
    Transition {
        from: S::ValidationError,
        event: E::Reset,
        to: S::Unauthenticated,
        guard: None,
        action: blank,
    },
];

/// Find the row for `(state, event)`.
pub fn lookup(state: AuthState, event: AuthEventKind) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|t| t.from == state && t.event == event)
}

fn event_has_token(_ctx: &AuthContext, event: &AuthEvent) -> bool {
    event.token().is_some_and(|t| !t.trim().is_empty())
}

fn context_has_token(ctx: &AuthContext, _event: &AuthEvent) -> bool {
    ctx.has_token()
}

fn clear_error(_ctx: &AuthContext, _now: DateTime<Utc>) -> ContextPatch {
    ContextPatch {
        error: Field::Clear,
        ..ContextPatch::keep()
    }
}

fn begin_validation(_ctx: &AuthContext, _now: DateTime<Utc>) -> ContextPatch {
    ContextPatch {
        validation_in_progress: Some(true),
        ..ContextPatch::keep()
    }
}

fn restart_validation(_ctx: &AuthContext, _now: DateTime<Utc>) -> ContextPatch {
    ContextPatch {
        error: Field::Clear,
        validation_in_progress: Some(true),
        ..ContextPatch::keep()
    }
}

fn drop_credentials(_ctx: &AuthContext, _now: DateTime<Utc>) -> ContextPatch {
    ContextPatch {
        token: Field::Clear,
        user: Field::Clear,
        ..ContextPatch::keep()
    }
}

fn validated(_ctx: &AuthContext, now: DateTime<Utc>) -> ContextPatch {
    ContextPatch {
        error: Field::Clear,
        last_validation: Field::Set(now),
        validation_in_progress: Some(false),
        ..ContextPatch::keep()
    }
}

// The error itself comes from the event payload.
fn rejected(_ctx: &AuthContext, _now: DateTime<Utc>) -> ContextPatch {
    ContextPatch {
        token: Field::Clear,
        user: Field::Clear,
        validation_in_progress: Some(false),
        ..ContextPatch::keep()
    }
}

fn unavailable(_ctx: &AuthContext, _now: DateTime<Utc>) -> ContextPatch {
    ContextPatch {
        user: Field::Clear,
        validation_in_progress: Some(false),
        ..ContextPatch::keep()
    }
}

fn logged_in(_ctx: &AuthContext, now: DateTime<Utc>) -> ContextPatch {
    ContextPatch {
        error: Field::Clear,
        last_validation: Field::Set(now),
        ..ContextPatch::keep()
    }
}

// Token stays until RESET so the sign-out call can still present it.
fn begin_logout(_ctx: &AuthContext, _now: DateTime<Utc>) -> ContextPatch {
    ContextPatch {
        user: Field::Clear,
        validation_in_progress: Some(false),
        ..ContextPatch::keep()
    }
}

fn blank(_ctx: &AuthContext, _now: DateTime<Utc>) -> ContextPatch {
    ContextPatch::blank()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_has_no_duplicate_keys() {
        let mut seen = HashSet::new();
        for t in TRANSITIONS {
            assert!(seen.insert((t.from, t.event)), "duplicate row {:?}", t);
        }
    }

    #[test]
    fn test_lookup() {
        let t = lookup(AuthState::Uninitialized, AuthEventKind::Initialize).unwrap();
        assert_eq!(t.to, AuthState::Initializing);

        assert!(lookup(AuthState::Authenticated, AuthEventKind::ValidationSuccess).is_none());
        assert!(lookup(AuthState::Uninitialized, AuthEventKind::Reset).is_none());
    }

    #[test]
    fn test_uninitialized_is_never_a_target() {
        assert!(TRANSITIONS.iter().all(|t| t.to != AuthState::Uninitialized));
    }

    #[test]
    fn test_reset_rows_blank_the_context() {
        let busy = AuthContext {
            token: Some("t".into()),
            error: Some("e".into()),
            validation_in_progress: true,
            ..AuthContext::blank()
        };
        for from in [AuthState::LoggingOut, AuthState::ValidationError] {
            let t = lookup(from, AuthEventKind::Reset).unwrap();
            let mut ctx = busy.clone();
            ctx.apply((t.action)(&ctx, Utc::now()));
            assert!(ctx.is_blank());
            assert_eq!(t.to, AuthState::Unauthenticated);
        }
    }

    #[test]
    fn test_guards() {
        let found = lookup(AuthState::Initializing, AuthEventKind::TokenFound).unwrap();
        let guard = found.guard.unwrap();
        let ctx = AuthContext::blank();
        assert!(guard(&ctx, &AuthEvent::TokenFound { token: "abc".into() }));
        assert!(!guard(&ctx, &AuthEvent::TokenFound { token: " ".into() }));

        let start = lookup(AuthState::CheckingToken, AuthEventKind::ValidationStart).unwrap();
        let guard = start.guard.unwrap();
        assert!(!guard(&ctx, &AuthEvent::ValidationStart));
        let with_token = AuthContext {
            token: Some("abc".into()),
            ..AuthContext::blank()
        };
        assert!(guard(&with_token, &AuthEvent::ValidationStart));
    }
}
