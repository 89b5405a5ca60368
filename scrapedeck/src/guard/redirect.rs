//! Redirect mechanism consumed by the navigation guard.

use serde::Serialize;
use std::cell::RefCell;

/// A route change with an optional place to resume after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    /// Route to show.
    pub to: String,
    /// Originally requested path, carried as transient navigation state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_to: Option<String>,
}

impl Redirect {
    pub fn new(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            resume_to: None,
        }
    }

    pub fn resume_to(mut self, path: impl Into<String>) -> Self {
        self.resume_to = Some(path.into());
        self
    }
}

/// Capability to change the visible route.
pub trait Redirector {
    fn redirect(&self, redirect: &Redirect);
}

impl<F> Redirector for F
where
    F: Fn(&Redirect),
{
    fn redirect(&self, redirect: &Redirect) {
        self(redirect)
    }
}

/// Redirector that only remembers where it was sent.
#[derive(Debug, Default)]
pub struct RecordingRedirector {
    history: RefCell<Vec<Redirect>>,
}

impl RecordingRedirector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<Redirect> {
        self.history.borrow().clone()
    }

    pub fn last(&self) -> Option<Redirect> {
        self.history.borrow().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.history.borrow().len()
    }
}

impl Redirector for RecordingRedirector {
    fn redirect(&self, redirect: &Redirect) {
        self.history.borrow_mut().push(redirect.clone());
    }
}
