//! Auth commands.

use anyhow::{Context, Result};
use clap::Subcommand;
use rust_i18n::t;
use scrapedeck::{AuthState, BootOutcome, Session};

use crate::config::{build_session, load_config};
use crate::output::{print_item, OutputFormat, StatusRow};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Log in with username and password
    Login {
        /// Username
        #[arg(short, long)]
        username: String,
        /// Password
        #[arg(short, long, env = "SCRAPEDECK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log out and revoke the stored token
    Logout,
    /// Validate the stored token and show the session
    Status,
}

pub async fn handle(action: AuthAction, format: OutputFormat) -> Result<()> {
    let config = load_config()?;
    let session = build_session(&config)?;

    match action {
        AuthAction::Login { username, password } => login(&session, &username, &password).await,
        AuthAction::Logout => logout(&session).await,
        AuthAction::Status => status(&session, format).await,
    }
}

async fn login(session: &Session, username: &str, password: &str) -> Result<()> {
    if session.bootstrap().await == BootOutcome::Authenticated {
        println!("{}", t!("already_logged_in", user = current_user(session)));
        return Ok(());
    }

    // A token the server could not check is dropped in favour of a new one.
    if session.handle().state() == AuthState::ValidationError {
        session.handle().send(scrapedeck::AuthEvent::Reset);
    }

    session
        .login(username, password)
        .await
        .context(t!("login_failed").to_string())?;

    println!("{}", t!("logged_in_as", user = current_user(session)));
    Ok(())
}

async fn logout(session: &Session) -> Result<()> {
    session.bootstrap().await;

    match session.handle().state() {
        AuthState::Authenticated => {
            session.logout().await;
        }
        _ => session.store().clear().context("Failed to clear stored token")?,
    }

    println!("{}", t!("logged_out"));
    Ok(())
}

async fn status(session: &Session, format: OutputFormat) -> Result<()> {
    session.bootstrap().await;

    let handle = session.handle();
    print_item(&StatusRow::new(handle.state(), &handle.context()), format);
    Ok(())
}

fn current_user(session: &Session) -> String {
    session
        .handle()
        .context()
        .user
        .map(|u| u.display_name().to_owned())
        .unwrap_or_default()
}
