//! Authentication state machine.

mod context;
mod handle;
mod machine;
mod observer;
mod state;
mod table;

pub use context::{AuthContext, ContextPatch, Field};
pub use handle::{AuthHandle, Subscription};
pub use machine::{AuthMachine, Clock, Dispatch, Listener, StateChange, SubscriptionId};
pub use observer::{AuthObserver, LogObserver, NoopObserver, Rejection};
pub use state::{AuthEvent, AuthEventKind, AuthState, AuthView};
pub use table::{lookup, Action, Guard, Transition, TRANSITIONS};
