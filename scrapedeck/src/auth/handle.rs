//! Shared handle to the auth machine for the single-threaded UI scheduler.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use super::context::AuthContext;
use super::machine::{notify, AuthMachine, Dispatch, StateChange, SubscriptionId};
use super::state::{AuthEvent, AuthState, AuthView};

enum Command {
    Send(AuthEvent),
    Reset,
}

struct Shared {
    machine: RefCell<AuthMachine>,
    queue: RefCell<VecDeque<Command>>,
    dispatching: Cell<bool>,
}

/// Cloneable handle wiring one [`AuthMachine`] through the application.
///
/// Events sent while listeners are running (a listener reacting to a change
/// by sending another event) are queued and applied once the current fan-out
/// finishes, so every subscriber sees transitions in `send` order.
#[derive(Clone)]
pub struct AuthHandle {
    inner: Rc<Shared>,
}

impl AuthHandle {
    /// Take ownership of a machine.
    pub fn new(machine: AuthMachine) -> Self {
        Self {
            inner: Rc::new(Shared {
                machine: RefCell::new(machine),
                queue: RefCell::new(VecDeque::new()),
                dispatching: Cell::new(false),
            }),
        }
    }

    pub fn state(&self) -> AuthState {
        self.inner.machine.borrow().state()
    }

    /// Read-only snapshot of the context.
    pub fn context(&self) -> AuthContext {
        self.inner.machine.borrow().context().clone()
    }

    pub fn view(&self) -> AuthView {
        self.inner.machine.borrow().view()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    pub fn can_navigate_to_protected_route(&self) -> bool {
        self.state().can_navigate_to_protected_route()
    }

    pub fn should_redirect_to_login(&self) -> bool {
        self.state().should_redirect_to_login()
    }

    /// Send an event. Returns [`Dispatch::Queued`] when called from a listener.
    pub fn send(&self, event: AuthEvent) -> Dispatch {
        self.submit(Command::Send(event))
    }

    /// Force-reset the machine. Queued like `send` when called from a listener.
    pub fn reset(&self) {
        self.submit(Command::Reset);
    }

    /// Register a listener.
    pub fn subscribe(&self, listener: impl FnMut(&StateChange) + 'static) -> Subscription {
        let id = self.inner.machine.borrow_mut().subscribe(listener);
        Subscription {
            id,
            shared: Rc::downgrade(&self.inner),
        }
    }

    /// True while a fan-out is running; a `send` now would be queued.
    pub fn is_dispatching(&self) -> bool {
        self.inner.dispatching.get()
    }

    fn submit(&self, command: Command) -> Dispatch {
        self.inner.queue.borrow_mut().push_back(command);
        if self.inner.dispatching.replace(true) {
            return Dispatch::Queued;
        }
        let _draining = Draining(&self.inner.dispatching);

        let mut first = None;
        loop {
            let next = self.inner.queue.borrow_mut().pop_front();
            let Some(command) = next else { break };
            let dispatch = self.run(command);
            first.get_or_insert(dispatch);
        }

        first.unwrap_or(Dispatch::Queued)
    }

    // The machine is not borrowed while listeners run, so they may read the
    // handle, subscribe, or unsubscribe freely.
    fn run(&self, command: Command) -> Dispatch {
        let (change, mut listeners, observer) = {
            let mut machine = self.inner.machine.borrow_mut();
            let change = match command {
                Command::Send(event) => match machine.step(event) {
                    Ok(change) => change,
                    Err(reason) => return reason.into(),
                },
                Command::Reset => machine.force_reset(),
            };
            (change, machine.lend_listeners(), machine.observer())
        };

        notify(&mut listeners, observer.as_ref(), &change);
        self.inner.machine.borrow_mut().return_listeners(listeners);

        Dispatch::Applied {
            from: change.from,
            to: change.to,
        }
    }
}

// Clears the dispatching flag on every exit, including an observer panic.
struct Draining<'a>(&'a Cell<bool>);

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl fmt::Debug for AuthHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.machine.try_borrow() {
            Ok(machine) => f.debug_tuple("AuthHandle").field(&*machine).finish(),
            Err(_) => f.write_str("AuthHandle(<busy>)"),
        }
    }
}

/// Capability to deregister a listener.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the listener. Returns false if it was already gone or the
    /// machine has been dropped.
    pub fn unsubscribe(self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let removed = shared.machine.borrow_mut().unsubscribe(self.id);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use pretty_assertions::assert_eq;

    fn handle() -> AuthHandle {
        AuthHandle::new(AuthMachine::new())
    }

    #[test]
    fn test_panicking_observer_does_not_wedge_the_handle() {
        use crate::auth::{AuthEventKind, AuthObserver};
        use std::panic::{catch_unwind, AssertUnwindSafe};

        struct Explosive(Cell<bool>);
        impl AuthObserver for Explosive {
            fn transition(&self, _: AuthState, _: AuthEventKind, _: AuthState) {
                if self.0.replace(false) {
                    panic!("observer blew up");
                }
            }
        }

        let h = AuthHandle::new(
            AuthMachine::new().with_observer(Rc::new(Explosive(Cell::new(true)))),
        );
        let sender = h.clone();
        let result = catch_unwind(AssertUnwindSafe(|| sender.send(AuthEvent::Initialize)));
        assert!(result.is_err());

        assert!(!h.is_dispatching());
        assert!(h.send(AuthEvent::TokenNotFound).is_applied());
        assert_eq!(h.state(), AuthState::Unauthenticated);
    }

    #[test]
    fn test_send_through_handle() {
        let h = handle();
        assert!(h.send(AuthEvent::Initialize).is_applied());
        assert!(h.is_loading());
        assert_eq!(h.send(AuthEvent::Logout), Dispatch::Unhandled);
    }

    #[test]
    fn test_listener_can_send_and_order_is_kept() {
        let h = handle();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let chained = h.clone();
        h.subscribe(move |change| {
            if change.to == AuthState::Initializing {
                assert_eq!(
                    chained.send(AuthEvent::TokenFound { token: "t".into() }),
                    Dispatch::Queued
                );
            }
        });
        let s = Rc::clone(&seen);
        h.subscribe(move |change| s.borrow_mut().push(change.to));

        h.send(AuthEvent::Initialize);

        assert_eq!(h.state(), AuthState::CheckingToken);
        assert_eq!(
            *seen.borrow(),
            vec![AuthState::Initializing, AuthState::CheckingToken]
        );
    }

    #[test]
    fn test_listener_can_read_handle() {
        let h = handle();
        let observed = Rc::new(Cell::new(None));

        let reader = h.clone();
        let o = Rc::clone(&observed);
        h.subscribe(move |_| o.set(Some(reader.state())));

        h.send(AuthEvent::Initialize);
        assert_eq!(observed.get(), Some(AuthState::Initializing));
    }

    #[test]
    fn test_unsubscribe_during_fan_out() {
        let h = handle();
        let count = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let c = Rc::clone(&count);
        let own = Rc::clone(&slot);
        let sub = h.subscribe(move |_| {
            c.set(c.get() + 1);
            if let Some(sub) = own.borrow_mut().take() {
                assert!(sub.unsubscribe());
            }
        });
        *slot.borrow_mut() = Some(sub);

        h.send(AuthEvent::Initialize);
        h.send(AuthEvent::TokenNotFound);

        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_subscribe_during_fan_out_keeps_order() {
        let h = handle();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let inner_handle = h.clone();
        let s = Rc::clone(&seen);
        let added = Rc::new(Cell::new(false));
        h.subscribe(move |change| {
            s.borrow_mut().push(("first", change.to));
            if !added.replace(true) {
                let s2 = Rc::clone(&s);
                inner_handle.subscribe(move |change| s2.borrow_mut().push(("late", change.to)));
            }
        });

        h.send(AuthEvent::Initialize);
        h.send(AuthEvent::TokenNotFound);

        assert_eq!(
            *seen.borrow(),
            vec![
                ("first", AuthState::Initializing),
                ("first", AuthState::Unauthenticated),
                ("late", AuthState::Unauthenticated),
            ]
        );
    }

    #[test]
    fn test_reset_from_listener_is_queued() {
        let h = handle();
        let resetter = h.clone();
        h.subscribe(move |change| {
            if change.to == AuthState::Authenticated {
                resetter.reset();
            }
        });

        h.send(AuthEvent::Initialize);
        h.send(AuthEvent::TokenFound { token: "t".into() });
        h.send(AuthEvent::ValidationSuccess {
            user: User::new("u1"),
        });

        assert_eq!(h.state(), AuthState::Uninitialized);
        assert!(h.context().is_blank());
    }

    #[test]
    fn test_subscription_outlives_machine() {
        let h = handle();
        let sub = h.subscribe(|_| {});
        drop(h);
        assert!(!sub.unsubscribe());
    }
}
