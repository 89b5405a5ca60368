//! Auth state machine and navigation guard for the scraping dashboard.

pub mod api;
pub mod auth;
pub mod client;
pub mod error;
pub mod guard;
pub mod models;
pub mod session;
pub mod store;

// Re-export main types
pub use client::{DashboardClient, DashboardClientBuilder, HttpConfig};
pub use error::{Error, Result};

pub use auth::{
    AuthContext, AuthEvent, AuthEventKind, AuthHandle, AuthMachine, AuthObserver, AuthState,
    AuthView, Dispatch, LogObserver, NoopObserver, StateChange, Subscription,
};
pub use guard::{
    GuardConfig, GuardPhase, NavigationGuard, RecoveryAction, Redirect, Redirector, RenderOutcome,
};
pub use models::{LoginResponse, User, UserId};
pub use session::{AuthBackend, BootOutcome, RetryPolicy, Session, TokenValidator};
pub use store::{CredentialStore, MemoryCredentialStore};

// Re-export API types
pub use api::AuthApi;
