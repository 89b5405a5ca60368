//! ScrapeDeck CLI.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{auth, route};
use rust_i18n::t;

rust_i18n::i18n!("src/locales", fallback = "en");

/// ScrapeDeck dashboard session CLI
#[derive(Parser)]
#[command(name = "scrapedeck")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "plain")]
    format: output::OutputFormat,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Language for output (en, zh-CN)
    #[arg(short, long, global = true, default_value = "en")]
    lang: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage authentication
    Auth {
        #[command(subcommand)]
        action: auth::AuthAction,
    },

    /// Open a protected dashboard route
    #[command(alias = "o")]
    Open {
        /// Route path, e.g. /jobs/42
        #[arg(default_value = "/")]
        path: String,
    },

    /// Run a recovery action
    Recover {
        #[arg(value_enum)]
        action: route::RecoverAction,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    rust_i18n::set_locale(&cli.lang);

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let command = cli
        .command
        .ok_or_else(|| anyhow::anyhow!("{}", t!("no_command")))?;

    match command {
        Commands::Auth { action } => auth::handle(action, cli.format).await,
        Commands::Open { path } => route::open(&path, cli.format).await,
        Commands::Recover { action } => route::recover(action, cli.format).await,
        Commands::Config => {
            let cfg = config::load_config()?;
            println!(
                "{}",
                t!("config_file", path = config::config_path()?.display())
            );
            println!("{}", t!("base_url", url = &cfg.base_url));
            println!("{}", t!("login_path", path = &cfg.login_path));
            println!("{}", t!("redirect_ceiling", ceiling = cfg.redirect_ceiling));
            println!("{}", t!("token_stored", status = cfg.auth.is_some()));
            Ok(())
        }
    }
}
