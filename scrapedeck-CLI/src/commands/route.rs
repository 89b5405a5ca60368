//! Protected route and recovery commands.

use anyhow::Result;
use clap::ValueEnum;
use rust_i18n::t;
use scrapedeck::{NavigationGuard, RecoveryAction, Redirect, Redirector, Session};
use std::cell::RefCell;
use std::rc::Rc;

use crate::config::{build_session, load_config, Config};
use crate::output::{print_item, OutcomeRow, OutputFormat, StatusRow};

/// Recovery actions offered by the error and loop views.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RecoverAction {
    /// Clear the stored token and start over
    Clear,
    /// Go to the login screen
    Login,
    /// Reset and validate the stored token again
    Retry,
    /// Drop the current session and log in again
    Reauth,
}

impl From<RecoverAction> for RecoveryAction {
    fn from(action: RecoverAction) -> Self {
        match action {
            RecoverAction::Clear => RecoveryAction::ClearCredentialsAndReload,
            RecoverAction::Login => RecoveryAction::ForceLogin,
            RecoverAction::Retry => RecoveryAction::HardReset,
            RecoverAction::Reauth => RecoveryAction::Reauthenticate,
        }
    }
}

fn log_redirect(redirect: &Redirect) {
    tracing::info!(to = %redirect.to, resume_to = ?redirect.resume_to, "redirect");
}

fn guard_for(config: &Config, session: &Session) -> Rc<RefCell<NavigationGuard>> {
    let redirector: Rc<dyn Redirector> = Rc::new(log_redirect);
    let guard = Rc::new(RefCell::new(NavigationGuard::new(
        config.guard_config(),
        redirector,
    )));
    session.attach_guard(guard.clone());
    guard
}

/// Bootstrap, then render `path` through the navigation guard.
pub async fn open(path: &str, format: OutputFormat) -> Result<()> {
    let config = load_config()?;
    let session = build_session(&config)?;
    let guard = guard_for(&config, &session);

    session.bootstrap().await;

    let outcome = guard.borrow_mut().render(&session.handle().view(), path);
    print_item(
        &OutcomeRow {
            path: path.to_owned(),
            outcome,
        },
        format,
    );
    Ok(())
}

/// Run a recovery action and show the resulting session.
pub async fn recover(action: RecoverAction, format: OutputFormat) -> Result<()> {
    let config = load_config()?;
    let session = build_session(&config)?;
    let mut guard = NavigationGuard::new(config.guard_config(), Rc::new(log_redirect));

    let action = RecoveryAction::from(action);
    if action == RecoveryAction::Reauthenticate {
        session.bootstrap().await;
    }
    session.recover(action, &mut guard).await?;

    println!("{}", t!("recovered"));
    let handle = session.handle();
    print_item(&StatusRow::new(handle.state(), &handle.context()), format);
    Ok(())
}
