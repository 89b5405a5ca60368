//! Output formatting.

use chrono::{DateTime, Local, Utc};
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use rust_i18n::t;
use scrapedeck::{AuthContext, AuthState, RecoveryAction, RenderOutcome};
use serde::Serialize;

/// Output format options.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table format
    Table,
    /// JSON format
    Json,
    /// Plain text format
    #[default]
    Plain,
}

/// Trait for plain text output.
pub trait PlainPrint {
    /// Print as plain text with formatting.
    fn plain_print(&self);
}

/// Trait for table row generation.
pub trait TableRow {
    /// Get table headers.
    fn headers() -> Vec<&'static str>;
    /// Get row data as strings.
    fn row(&self) -> Vec<String>;
}

/// Print one item with proper formatting for each output mode.
pub fn print_item<T: TableRow + Serialize + PlainPrint>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(item).unwrap_or_default());
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL_CONDENSED);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(T::headers());
            table.add_row(item.row());
            println!("{table}");
        }
        OutputFormat::Plain => item.plain_print(),
    }
}

/// Format a timestamp in local time for display.
pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(time) => time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => "-".to_string(),
    }
}

fn state_label(state: AuthState) -> colored::ColoredString {
    let label = state.as_str();
    match state {
        AuthState::Authenticated => label.green(),
        AuthState::Unauthenticated => label.yellow(),
        AuthState::ValidationError => label.red(),
        _ => label.dimmed(),
    }
}

fn action_label(action: RecoveryAction) -> &'static str {
    match action {
        RecoveryAction::Reauthenticate => "scrapedeck recover reauth",
        RecoveryAction::HardReset => "scrapedeck recover retry",
        RecoveryAction::ClearCredentialsAndReload => "scrapedeck recover clear",
        RecoveryAction::ForceLogin => "scrapedeck recover login",
    }
}

// ============================================================================
// Session status
// ============================================================================

/// Row for session status display.
#[derive(Serialize)]
pub struct StatusRow {
    pub state: AuthState,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub role: Option<String>,
    pub error: Option<String>,
    pub last_validation: Option<DateTime<Utc>>,
}

impl StatusRow {
    pub fn new(state: AuthState, context: &AuthContext) -> Self {
        let user = context.user.as_ref();
        Self {
            state,
            user_id: user.map(|u| u.id.to_string()),
            username: user.map(|u| u.display_name().to_owned()),
            role: user.and_then(|u| u.role.clone()),
            error: context.error.clone(),
            last_validation: context.last_validation,
        }
    }
}

impl TableRow for StatusRow {
    fn headers() -> Vec<&'static str> {
        vec!["State", "User", "Role", "Validated", "Error"]
    }
    fn row(&self) -> Vec<String> {
        vec![
            self.state.to_string(),
            self.username.clone().unwrap_or_else(|| "-".into()),
            self.role.clone().unwrap_or_else(|| "-".into()),
            format_time(self.last_validation),
            self.error.clone().unwrap_or_else(|| "-".into()),
        ]
    }
}

impl PlainPrint for StatusRow {
    fn plain_print(&self) {
        println!("{}", t!("state_label", state = state_label(self.state)));
        match (&self.username, &self.user_id) {
            (Some(name), Some(id)) => println!(
                "   {} {}",
                t!("logged_in_as", user = name.bold()),
                format!("[UID: {}]", id).dimmed()
            ),
            _ => println!("   {}", t!("not_logged_in")),
        }
        if self.last_validation.is_some() {
            println!(
                "   {}",
                t!("validated_at", time = format_time(self.last_validation).dimmed())
            );
        }
        if let Some(error) = &self.error {
            println!("   {}", error.red());
        }
    }
}

// ============================================================================
// Route render outcome
// ============================================================================

/// Row for a protected route render.
#[derive(Serialize)]
pub struct OutcomeRow {
    pub path: String,
    #[serde(flatten)]
    pub outcome: RenderOutcome,
}

impl TableRow for OutcomeRow {
    fn headers() -> Vec<&'static str> {
        vec!["Path", "Outcome", "Detail"]
    }
    fn row(&self) -> Vec<String> {
        let (kind, detail) = match &self.outcome {
            RenderOutcome::Protected => ("protected", String::new()),
            RenderOutcome::Loading => ("loading", String::new()),
            RenderOutcome::Redirected(r) => ("redirected", r.to.clone()),
            RenderOutcome::ValidationError { error, .. } => {
                ("validation_error", error.clone().unwrap_or_default())
            }
            RenderOutcome::NavigationLoop { attempts, .. } => {
                ("navigation_loop", attempts.to_string())
            }
        };
        vec![self.path.clone(), kind.to_string(), detail]
    }
}

impl PlainPrint for OutcomeRow {
    fn plain_print(&self) {
        match &self.outcome {
            RenderOutcome::Protected => {
                println!("{}", t!("protected", path = self.path.green()));
            }
            RenderOutcome::Loading => println!("{}", t!("loading").dimmed()),
            RenderOutcome::Redirected(redirect) => {
                println!("{}", t!("redirected", to = redirect.to.cyan()));
                if let Some(resume) = &redirect.resume_to {
                    println!("   {}", t!("resume_to", path = resume));
                }
            }
            RenderOutcome::ValidationError { error, actions } => {
                println!("{}", t!("validation_error").to_string().red().bold());
                if let Some(error) = error {
                    println!("   {}", error.dimmed());
                }
                print_actions(actions);
            }
            RenderOutcome::NavigationLoop { attempts, actions } => {
                println!(
                    "{}",
                    t!("navigation_loop", attempts = attempts)
                        .to_string()
                        .red()
                        .bold()
                );
                print_actions(actions);
            }
        }
    }
}

fn print_actions(actions: &[RecoveryAction]) {
    println!("   {}", t!("recovery_actions"));
    for action in actions {
        println!("     {}", action_label(*action).cyan());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scrapedeck::{Redirect, User};

    #[test]
    fn test_status_row_from_context() {
        let mut context = AuthContext::blank();
        context.user = Some(User::new("u1").with_username("ada"));

        let row = StatusRow::new(AuthState::Authenticated, &context);
        assert_eq!(row.username.as_deref(), Some("ada"));
        assert_eq!(row.row()[0], "AUTHENTICATED");
        assert_eq!(row.row()[3], "-");
    }

    #[test]
    fn test_outcome_json_is_flat() {
        let row = OutcomeRow {
            path: "/jobs".into(),
            outcome: RenderOutcome::Redirected(Redirect::new("/login").resume_to("/jobs")),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["path"], "/jobs");
        assert_eq!(json["outcome"], "redirected");
    }

    #[test]
    fn test_outcome_row_detail() {
        let row = OutcomeRow {
            path: "/jobs".into(),
            outcome: RenderOutcome::NavigationLoop {
                attempts: 3,
                actions: vec![],
            },
        };
        assert_eq!(row.row(), vec!["/jobs", "navigation_loop", "3"]);
    }
}
