//! Configuration management for the ScrapeDeck CLI.

use anyhow::{Context, Result};
use scrapedeck::{
    AuthHandle, AuthMachine, CredentialStore, DashboardClient, GuardConfig, LogObserver, Session,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// CLI configuration.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dashboard API base URL.
    pub base_url: String,
    /// Redirects allowed before the loop view.
    pub redirect_ceiling: u32,
    /// Login route.
    pub login_path: String,
    /// Stored credentials.
    pub auth: Option<AuthConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let guard = GuardConfig::default();
        Self {
            base_url: scrapedeck::client::DEFAULT_BASE_URL.to_owned(),
            redirect_ceiling: guard.ceiling,
            login_path: guard.login_path,
            auth: None,
        }
    }
}

impl Config {
    /// Guard settings; an out-of-range ceiling is pulled into 3..=5.
    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig::new(self.redirect_ceiling, self.login_path.clone())
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token.
    pub token: String,
}

/// Get the configuration file path.
pub fn config_path() -> Result<PathBuf> {
    let exe_path = env::current_exe().context("Could not determine executable path")?;
    let exe_dir = exe_path
        .parent()
        .context("Could not determine executable directory")?;

    Ok(exe_dir.join("scrapedeck.toml"))
}

/// Load configuration from the default location.
pub fn load_config() -> Result<Config> {
    load_from(&config_path()?)
}

fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path).context("Failed to read config file")?;

    toml::from_str(&content).context("Failed to parse config file")
}

fn save_to(path: &Path, config: &Config) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;

    fs::write(path, content).context("Failed to write config file")?;

    Ok(())
}

/// Token store backed by the `[auth]` table of the config file.
#[derive(Debug, Clone)]
pub struct ConfigCredentialStore {
    path: PathBuf,
}

impl ConfigCredentialStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn update(&self, f: impl FnOnce(&mut Config)) -> scrapedeck::Result<()> {
        let mut config = load_from(&self.path).map_err(storage_error)?;
        f(&mut config);
        save_to(&self.path, &config).map_err(storage_error)
    }
}

fn storage_error(e: anyhow::Error) -> scrapedeck::Error {
    scrapedeck::Error::storage(format!("{:#}", e))
}

impl CredentialStore for ConfigCredentialStore {
    fn get(&self) -> scrapedeck::Result<Option<String>> {
        let config = load_from(&self.path).map_err(storage_error)?;
        Ok(config.auth.map(|auth| auth.token))
    }

    fn set(&self, token: &str) -> scrapedeck::Result<()> {
        self.update(|config| {
            config.auth = Some(AuthConfig {
                token: token.to_owned(),
            })
        })
    }

    fn clear(&self) -> scrapedeck::Result<()> {
        self.update(|config| config.auth = None)
    }
}

/// Build a session wired to the config file and the configured server.
pub fn build_session(config: &Config) -> Result<Session> {
    let client = DashboardClient::builder()
        .base_url(&config.base_url)
        .build()
        .context("Failed to build dashboard client")?;

    let machine = AuthMachine::new().with_observer(Rc::new(LogObserver));
    let store = Rc::new(ConfigCredentialStore::at(config_path()?));

    Ok(Session::new(
        AuthHandle::new(machine),
        store,
        Rc::new(client.auth()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scratch(name: &str) -> PathBuf {
        let path = env::temp_dir().join(format!(
            "scrapedeck-{}-{}.toml",
            name,
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = load_from(&scratch("missing")).unwrap();
        assert_eq!(config.redirect_ceiling, 3);
        assert_eq!(config.login_path, "/login");
        assert!(config.auth.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = scratch("partial");
        fs::write(&path, "base_url = \"https://scrape.example.com/\"\n").unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.base_url, "https://scrape.example.com/");
        assert_eq!(config.guard_config(), GuardConfig::default());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_zero_ceiling_is_raised() {
        let path = scratch("ceiling");
        fs::write(&path, "redirect_ceiling = 0\n").unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.redirect_ceiling, 0);
        assert_eq!(config.guard_config().ceiling, 3);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_store_round_trip_keeps_settings() {
        let path = scratch("store");
        fs::write(&path, "redirect_ceiling = 5\n").unwrap();
        let store = ConfigCredentialStore::at(&path);

        assert_eq!(store.get().unwrap(), None);
        store.set("tok").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("tok"));
        assert_eq!(load_from(&path).unwrap().redirect_ceiling, 5);

        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);
        let _ = fs::remove_file(&path);
    }
}
