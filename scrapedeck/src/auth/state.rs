//! Authentication states and events.
//!
//! ## State Diagram
//!
//! ```text
//! UNINITIALIZED
//!      │ INITIALIZE
//!      ▼
//! INITIALIZING ── TOKEN_NOT_FOUND ──────────────► UNAUTHENTICATED ◄──┐
//!      │ TOKEN_FOUND                               ▲     │           │
//!      ▼                                           │     │ LOGIN_    │ RESET
//! CHECKING_TOKEN ── VALIDATION_FAILURE ────────────┘     │ SUCCESS   │
//!      │  ▲ VALIDATION_START                             ▼           │
//!      │  └──┘                                     AUTHENTICATED     │
//!      │ VALIDATION_SUCCESS ──────────────────────────►  │ LOGOUT    │
//!      │                                                 ▼           │
//!      │ VALIDATION_UNAVAILABLE                     LOGGING_OUT ─────┤
//!      ▼                                                             │
//! VALIDATION_ERROR ──────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::User;

/// Authentication status. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthState {
    /// Nothing has happened yet. The only entry state.
    Uninitialized,
    /// Bootstrap started, credential store not yet inspected.
    Initializing,
    /// A stored token is being validated.
    CheckingToken,
    /// Signed in with a validated token.
    Authenticated,
    /// No usable credential.
    Unauthenticated,
    /// The validation service could not give an answer.
    ValidationError,
    /// Sign-out in progress.
    LoggingOut,
}

impl AuthState {
    /// All states, in declaration order.
    pub const ALL: [AuthState; 7] = [
        AuthState::Uninitialized,
        AuthState::Initializing,
        AuthState::CheckingToken,
        AuthState::Authenticated,
        AuthState::Unauthenticated,
        AuthState::ValidationError,
        AuthState::LoggingOut,
    ];

    /// Returns true only in `Authenticated`.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }

    /// Returns true while an operation is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            AuthState::Initializing | AuthState::CheckingToken | AuthState::LoggingOut
        )
    }

    /// Returns true if protected routes may render.
    pub fn can_navigate_to_protected_route(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }

    /// Returns true if the user must be sent to the login screen.
    pub fn should_redirect_to_login(&self) -> bool {
        matches!(self, AuthState::Unauthenticated)
    }

    /// Terminal-for-session states.
    pub fn is_settled(&self) -> bool {
        matches!(self, AuthState::Authenticated | AuthState::Unauthenticated)
    }

    /// Upper-case name, as used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Uninitialized => "UNINITIALIZED",
            AuthState::Initializing => "INITIALIZING",
            AuthState::CheckingToken => "CHECKING_TOKEN",
            AuthState::Authenticated => "AUTHENTICATED",
            AuthState::Unauthenticated => "UNAUTHENTICATED",
            AuthState::ValidationError => "VALIDATION_ERROR",
            AuthState::LoggingOut => "LOGGING_OUT",
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fieldless event discriminant, the key of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    Initialize,
    TokenFound,
    TokenNotFound,
    ValidationStart,
    ValidationSuccess,
    ValidationFailure,
    ValidationUnavailable,
    LoginSuccess,
    Logout,
    Reset,
}

impl AuthEventKind {
    /// All event kinds, in declaration order.
    pub const ALL: [AuthEventKind; 10] = [
        AuthEventKind::Initialize,
        AuthEventKind::TokenFound,
        AuthEventKind::TokenNotFound,
        AuthEventKind::ValidationStart,
        AuthEventKind::ValidationSuccess,
        AuthEventKind::ValidationFailure,
        AuthEventKind::ValidationUnavailable,
        AuthEventKind::LoginSuccess,
        AuthEventKind::Logout,
        AuthEventKind::Reset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthEventKind::Initialize => "INITIALIZE",
            AuthEventKind::TokenFound => "TOKEN_FOUND",
            AuthEventKind::TokenNotFound => "TOKEN_NOT_FOUND",
            AuthEventKind::ValidationStart => "VALIDATION_START",
            AuthEventKind::ValidationSuccess => "VALIDATION_SUCCESS",
            AuthEventKind::ValidationFailure => "VALIDATION_FAILURE",
            AuthEventKind::ValidationUnavailable => "VALIDATION_UNAVAILABLE",
            AuthEventKind::LoginSuccess => "LOGIN_SUCCESS",
            AuthEventKind::Logout => "LOGOUT",
            AuthEventKind::Reset => "RESET",
        }
    }
}

impl fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event sent to the machine, carrying its own payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Bootstrap begins.
    Initialize,
    /// A token was read from the credential store.
    TokenFound { token: String },
    /// The credential store is empty.
    TokenNotFound,
    /// A validation call is about to be made.
    ValidationStart,
    /// The validation service accepted the token.
    ValidationSuccess { user: User },
    /// The validation service rejected the token.
    ValidationFailure { error: String },
    /// The validation service could not be reached.
    ValidationUnavailable { error: String },
    /// Interactive login produced a fresh token.
    LoginSuccess { token: String, user: User },
    /// The user asked to sign out.
    Logout,
    /// Return to a blank unauthenticated session.
    Reset,
}

impl AuthEvent {
    /// The table key for this event.
    pub fn kind(&self) -> AuthEventKind {
        match self {
            AuthEvent::Initialize => AuthEventKind::Initialize,
            AuthEvent::TokenFound { .. } => AuthEventKind::TokenFound,
            AuthEvent::TokenNotFound => AuthEventKind::TokenNotFound,
            AuthEvent::ValidationStart => AuthEventKind::ValidationStart,
            AuthEvent::ValidationSuccess { .. } => AuthEventKind::ValidationSuccess,
            AuthEvent::ValidationFailure { .. } => AuthEventKind::ValidationFailure,
            AuthEvent::ValidationUnavailable { .. } => AuthEventKind::ValidationUnavailable,
            AuthEvent::LoginSuccess { .. } => AuthEventKind::LoginSuccess,
            AuthEvent::Logout => AuthEventKind::Logout,
            AuthEvent::Reset => AuthEventKind::Reset,
        }
    }

    /// Token carried by the event, if any.
    pub fn token(&self) -> Option<&str> {
        match self {
            AuthEvent::TokenFound { token } | AuthEvent::LoginSuccess { token, .. } => {
                Some(token)
            }
            _ => None,
        }
    }
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind().fmt(f)
    }
}

/// State plus derived booleans, as read by the navigation guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthView {
    pub state: AuthState,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub can_navigate_to_protected_route: bool,
    pub should_redirect_to_login: bool,
    /// Last error recorded by the machine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthView {
    /// Derive a view from a state alone.
    pub fn of(state: AuthState) -> Self {
        Self {
            state,
            is_authenticated: state.is_authenticated(),
            is_loading: state.is_loading(),
            can_navigate_to_protected_route: state.can_navigate_to_protected_route(),
            should_redirect_to_login: state.should_redirect_to_login(),
            error: None,
        }
    }

    /// Attach the machine's last error.
    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_queries() {
        for state in AuthState::ALL {
            assert_eq!(state.is_authenticated(), state == AuthState::Authenticated);
            assert_eq!(
                state.can_navigate_to_protected_route(),
                state == AuthState::Authenticated
            );
            assert_eq!(
                state.should_redirect_to_login(),
                state == AuthState::Unauthenticated
            );
        }

        assert!(AuthState::Initializing.is_loading());
        assert!(AuthState::CheckingToken.is_loading());
        assert!(AuthState::LoggingOut.is_loading());
        assert!(!AuthState::Uninitialized.is_loading());
        assert!(!AuthState::ValidationError.is_loading());
        assert!(!AuthState::Authenticated.is_loading());
    }

    #[test]
    fn test_settled_states() {
        let settled: Vec<_> = AuthState::ALL.iter().filter(|s| s.is_settled()).collect();
        assert_eq!(
            settled,
            vec![&AuthState::Authenticated, &AuthState::Unauthenticated]
        );
    }

    #[test]
    fn test_state_serializes_upper_case() {
        let json = serde_json::to_string(&AuthState::CheckingToken).unwrap();
        assert_eq!(json, "\"CHECKING_TOKEN\"");
        assert_eq!(AuthState::CheckingToken.to_string(), "CHECKING_TOKEN");
    }

    #[test]
    fn test_event_kind() {
        let event = AuthEvent::LoginSuccess {
            token: "t".into(),
            user: User::new("u1"),
        };
        assert_eq!(event.kind(), AuthEventKind::LoginSuccess);
        assert_eq!(event.token(), Some("t"));
        assert_eq!(AuthEvent::Logout.token(), None);
        assert_eq!(event.to_string(), "LOGIN_SUCCESS");
    }
}
