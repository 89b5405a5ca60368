//! Mutable context owned by the auth machine.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::AuthEvent;
use crate::models::User;

/// Context carried alongside the current [`AuthState`](super::AuthState).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    /// Bearer token.
    #[serde(skip)]
    pub token: Option<String>,
    /// Last-known authenticated identity.
    pub user: Option<User>,
    /// Last transition-relevant failure.
    pub error: Option<String>,
    /// Time of the last successful validation.
    pub last_validation: Option<DateTime<Utc>>,
    /// Set while a validation call is outstanding.
    pub validation_in_progress: bool,
}

impl AuthContext {
    /// Context with every field absent.
    pub fn blank() -> Self {
        Self::default()
    }

    /// True if every field is absent/default.
    pub fn is_blank(&self) -> bool {
        *self == Self::blank()
    }

    pub fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Apply a partial update.
    pub fn apply(&mut self, patch: ContextPatch) {
        patch.token.apply_to(&mut self.token);
        patch.user.apply_to(&mut self.user);
        patch.error.apply_to(&mut self.error);
        patch.last_validation.apply_to(&mut self.last_validation);
        if let Some(flag) = patch.validation_in_progress {
            self.validation_in_progress = flag;
        }
    }
}

/// Update to a single optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Field<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T> Field<T> {
    fn apply_to(self, slot: &mut Option<T>) {
        match self {
            Field::Keep => {}
            Field::Set(value) => *slot = Some(value),
            Field::Clear => *slot = None,
        }
    }
}

/// Partial context produced by event payloads and transition actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextPatch {
    pub token: Field<String>,
    pub user: Field<User>,
    pub error: Field<String>,
    pub last_validation: Field<DateTime<Utc>>,
    pub validation_in_progress: Option<bool>,
}

impl ContextPatch {
    /// A patch that changes nothing.
    pub fn keep() -> Self {
        Self::default()
    }

    /// A patch that blanks every field.
    pub fn blank() -> Self {
        Self {
            token: Field::Clear,
            user: Field::Clear,
            error: Field::Clear,
            last_validation: Field::Clear,
            validation_in_progress: Some(false),
        }
    }

    /// The data an event contributes before its action runs.
    pub fn from_event(event: &AuthEvent) -> Self {
        match event {
            AuthEvent::TokenFound { token } => Self {
                token: Field::Set(token.clone()),
                ..Self::default()
            },
            AuthEvent::ValidationSuccess { user } => Self {
                user: Field::Set(user.clone()),
                ..Self::default()
            },
            AuthEvent::ValidationFailure { error } | AuthEvent::ValidationUnavailable { error } => {
                Self {
                    error: Field::Set(error.clone()),
                    ..Self::default()
                }
            }
            AuthEvent::LoginSuccess { token, user } => Self {
                token: Field::Set(token.clone()),
                user: Field::Set(user.clone()),
                ..Self::default()
            },
            AuthEvent::Initialize
            | AuthEvent::TokenNotFound
            | AuthEvent::ValidationStart
            | AuthEvent::Logout
            | AuthEvent::Reset => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_blank_context() {
        let ctx = AuthContext::blank();
        assert!(ctx.is_blank());
        assert!(!ctx.has_token());
    }

    #[test]
    fn test_apply_keeps_untouched_fields() {
        let mut ctx = AuthContext {
            token: Some("t".into()),
            error: Some("old".into()),
            ..AuthContext::blank()
        };
        ctx.apply(ContextPatch {
            error: Field::Clear,
            validation_in_progress: Some(true),
            ..ContextPatch::keep()
        });

        assert_eq!(
            ctx,
            AuthContext {
                token: Some("t".into()),
                validation_in_progress: true,
                ..AuthContext::blank()
            }
        );
    }

    #[test]
    fn test_blank_patch_blanks_everything() {
        let mut ctx = AuthContext {
            token: Some("t".into()),
            user: Some(User::new("u1")),
            error: Some("e".into()),
            last_validation: Some(Utc::now()),
            validation_in_progress: true,
        };
        ctx.apply(ContextPatch::blank());
        assert!(ctx.is_blank());
    }

    #[test]
    fn test_event_payload() {
        let patch = ContextPatch::from_event(&AuthEvent::TokenFound { token: "abc".into() });
        assert_eq!(patch.token, Field::Set("abc".to_string()));
        assert_eq!(patch.user, Field::Keep);

        assert_eq!(ContextPatch::from_event(&AuthEvent::Logout), ContextPatch::keep());
    }

    #[test]
    fn test_empty_token_is_not_a_token() {
        let ctx = AuthContext {
            token: Some(String::new()),
            ..AuthContext::blank()
        };
        assert!(!ctx.has_token());
    }
}
