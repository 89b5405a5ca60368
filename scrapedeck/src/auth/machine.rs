//! The auth state machine.
//!
//! [`AuthMachine`] is the only component allowed to change [`AuthState`] or
//! [`AuthContext`]. Everything else sends [`AuthEvent`]s and subscribes to the
//! resulting [`StateChange`]s. A `send` runs to completion (table lookup,
//! guard, payload merge, action, listener fan-out) without yielding, so an
//! event is never partially applied.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use super::context::{AuthContext, ContextPatch};
use super::observer::{AuthObserver, LogObserver, Rejection};
use super::state::{AuthEvent, AuthEventKind, AuthState, AuthView};
use super::table;

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What subscribers receive after every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub from: AuthState,
    /// `None` for a forced [`AuthMachine::reset`].
    pub event: Option<AuthEventKind>,
    pub to: AuthState,
    pub context: AuthContext,
}

impl StateChange {
    /// True if this change entered `state` from a different state.
    pub fn entered(&self, state: AuthState) -> bool {
        self.to == state && self.from != state
    }
}

/// Result of a `send`. Rejections are normal outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The transition fired.
    Applied { from: AuthState, to: AuthState },
    /// No row matched `(state, event)`.
    Unhandled,
    /// The row's guard returned false.
    GuardRejected,
    /// Sent from inside a listener; will be applied after the current fan-out.
    Queued,
}

impl Dispatch {
    pub fn is_applied(&self) -> bool {
        matches!(self, Dispatch::Applied { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Dispatch::Unhandled | Dispatch::GuardRejected)
    }
}

impl From<Rejection> for Dispatch {
    fn from(reason: Rejection) -> Self {
        match reason {
            Rejection::Unhandled => Dispatch::Unhandled,
            Rejection::GuardFailed => Dispatch::GuardRejected,
        }
    }
}

/// Subscriber callback.
pub type Listener = Box<dyn FnMut(&StateChange)>;

/// Source of "now" for actions that stamp `last_validation`.
pub type Clock = Box<dyn Fn() -> DateTime<Utc>>;

pub(crate) type ListenerList = Vec<(SubscriptionId, Listener)>;

/// Finite-state machine for the dashboard session.
pub struct AuthMachine {
    state: AuthState,
    context: AuthContext,
    listeners: ListenerList,
    // Set while the listener list is lent out for a fan-out.
    lent_ids: Option<Vec<SubscriptionId>>,
    detached_removals: Vec<SubscriptionId>,
    next_id: u64,
    observer: Rc<dyn AuthObserver>,
    clock: Clock,
}

impl Default for AuthMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthMachine {
    /// Create a machine in `Uninitialized` with a blank context.
    pub fn new() -> Self {
        Self {
            state: AuthState::Uninitialized,
            context: AuthContext::blank(),
            listeners: Vec::new(),
            lent_ids: None,
            detached_removals: Vec::new(),
            next_id: 1,
            observer: Rc::new(LogObserver),
            clock: Box::new(Utc::now),
        }
    }

    /// Replace the observability sink.
    pub fn with_observer(mut self, observer: Rc<dyn AuthObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn context(&self) -> &AuthContext {
        &self.context
    }

    /// State, derived booleans and last error.
    pub fn view(&self) -> AuthView {
        AuthView::of(self.state).with_error(self.context.error.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn can_navigate_to_protected_route(&self) -> bool {
        self.state.can_navigate_to_protected_route()
    }

    pub fn should_redirect_to_login(&self) -> bool {
        self.state.should_redirect_to_login()
    }

    pub(crate) fn observer(&self) -> Rc<dyn AuthObserver> {
        Rc::clone(&self.observer)
    }

    /// Apply `event` if the table allows it and notify subscribers.
    pub fn send(&mut self, event: AuthEvent) -> Dispatch {
        match self.step(event) {
            Ok(change) => {
                notify(&mut self.listeners, self.observer.as_ref(), &change);
                Dispatch::Applied {
                    from: change.from,
                    to: change.to,
                }
            }
            Err(reason) => reason.into(),
        }
    }

    /// Apply `event` without notifying subscribers.
    pub(crate) fn step(&mut self, event: AuthEvent) -> Result<StateChange, Rejection> {
        let kind = event.kind();

        let Some(transition) = table::lookup(self.state, kind) else {
            self.observer.rejected(self.state, kind, Rejection::Unhandled);
            return Err(Rejection::Unhandled);
        };

        if let Some(guard) = transition.guard {
            if !guard(&self.context, &event) {
                self.observer
                    .rejected(self.state, kind, Rejection::GuardFailed);
                return Err(Rejection::GuardFailed);
            }
        }

        let from = self.state;
        self.context.apply(ContextPatch::from_event(&event));
        let patch = (transition.action)(&self.context, (self.clock)());
        self.context.apply(patch);
        self.state = transition.to;

        self.observer.transition(from, kind, transition.to);

        Ok(StateChange {
            from,
            event: Some(kind),
            to: transition.to,
            context: self.context.clone(),
        })
    }

    /// Force the machine back to `Uninitialized` with a blank context,
    /// bypassing the transition table. For catastrophic recovery only.
    pub fn reset(&mut self) {
        let change = self.force_reset();
        notify(&mut self.listeners, self.observer.as_ref(), &change);
    }

    pub(crate) fn force_reset(&mut self) -> StateChange {
        let from = self.state;
        self.state = AuthState::Uninitialized;
        self.context = AuthContext::blank();
        self.observer.reset(from);

        StateChange {
            from,
            event: None,
            to: AuthState::Uninitialized,
            context: self.context.clone(),
        }
    }

    /// Register a listener. Listeners run in subscription order.
    pub fn subscribe(&mut self, listener: impl FnMut(&StateChange) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Deregister a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        if self.listeners.len() != before {
            return true;
        }
        let lent = self.lent_ids.as_ref().is_some_and(|ids| ids.contains(&id));
        if lent && !self.detached_removals.contains(&id) {
            self.detached_removals.push(id);
            return true;
        }
        false
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Lend the listener list out for a fan-out that runs without a borrow
    /// on the machine.
    pub(crate) fn lend_listeners(&mut self) -> ListenerList {
        self.lent_ids = Some(self.listeners.iter().map(|(id, _)| *id).collect());
        std::mem::take(&mut self.listeners)
    }

    /// Take back a lent list. Listeners added meanwhile go after it.
    pub(crate) fn return_listeners(&mut self, mut lent: ListenerList) {
        let removed = std::mem::take(&mut self.detached_removals);
        lent.retain(|(id, _)| !removed.contains(id));
        lent.append(&mut self.listeners);
        self.listeners = lent;
        self.lent_ids = None;
    }

    /// Check the context invariants against the current state.
    pub fn invariants_hold(&self) -> bool {
        let ctx = &self.context;
        let in_progress_ok = ctx.validation_in_progress == (self.state == AuthState::CheckingToken);
        let user_ok = ctx.user.is_none() || self.state == AuthState::Authenticated;
        let token_ok = ctx.token.is_none() || self.state != AuthState::Unauthenticated;
        in_progress_ok && user_ok && token_ok
    }
}

impl fmt::Debug for AuthMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthMachine")
            .field("state", &self.state)
            .field("context", &self.context)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Run every listener, isolating panics so one faulty subscriber cannot
/// block the others or corrupt the transition.
pub(crate) fn notify(listeners: &mut ListenerList, observer: &dyn AuthObserver, change: &StateChange) {
    for (id, listener) in listeners.iter_mut() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| listener(change)));
        if let Err(payload) = result {
            observer.listener_failed(*id, &panic_message(payload.as_ref()));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
