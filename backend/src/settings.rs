//! Process configuration loaded via OrthoConfig.
//!
//! Values come from `TASKBOARD_*` environment variables, an optional config
//! file and command-line flags. Every field is optional; accessors apply the
//! defaults and parse the typed values.

use std::fmt;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

use crate::domain::{RunMode, RunModeParseError};
use crate::outbound::persistence::DEFAULT_MAX_CONNECTIONS;
use crate::outbound::store::StoreSettings;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const DEFAULT_BOT_POLL_TIMEOUT_SECS: u64 = 30;

/// Configuration shared by the server and bot binaries.
#[derive(Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "TASKBOARD")]
pub struct AppSettings {
    /// `development` or `production`; defaults to the build profile.
    pub mode: Option<String>,
    /// Interface the HTTP server binds to.
    pub host: Option<String>,
    /// Port the HTTP server binds to.
    pub port: Option<u16>,
    /// PostgreSQL URL; the in-process store is used when absent.
    pub database_url: Option<String>,
    /// PostgreSQL subscription refresh interval in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// PostgreSQL connection cap.
    pub db_max_connections: Option<u32>,
    /// Mini-app URL used as the deep-link base.
    pub webapp_url: Option<String>,
    /// Bot API token.
    pub bot_token: Option<String>,
    /// Long-poll timeout passed to `getUpdates`.
    pub bot_poll_timeout_secs: Option<u64>,
    /// Extra WebSocket origins, comma separated.
    pub allowed_origins: Option<String>,
}

/// A configured value could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Mode(#[from] RunModeParseError),
    #[error("{field} is not a valid URL: {message}")]
    InvalidUrl { field: &'static str, message: String },
    #[error("{field} is required")]
    Missing { field: &'static str },
}

impl fmt::Debug for AppSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppSettings")
            .field("mode", &self.mode)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("db_max_connections", &self.db_max_connections)
            .field("webapp_url", &self.webapp_url)
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("bot_poll_timeout_secs", &self.bot_poll_timeout_secs)
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, SettingsError> {
    Url::parse(raw.trim()).map_err(|err| SettingsError::InvalidUrl {
        field,
        message: err.to_string(),
    })
}

impl AppSettings {
    /// Configured run mode, falling back to the build profile.
    pub fn run_mode(&self) -> Result<RunMode, SettingsError> {
        match self.mode.as_deref() {
            Some(raw) => Ok(raw.parse()?),
            None => Ok(RunMode::from_debug_assertions()),
        }
    }

    /// Bind host.
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Bind port.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Store selection, refresh interval and pool size.
    pub fn store_settings(&self) -> StoreSettings {
        let interval =
            Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS));
        let settings = match self.database_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => StoreSettings::postgres(url),
            _ => StoreSettings::in_memory(),
        };
        settings
            .with_poll_interval(interval)
            .with_max_connections(self.db_max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS))
    }

    /// Deep-link base, if configured.
    pub fn webapp_url(&self) -> Result<Option<Url>, SettingsError> {
        self.webapp_url
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse_url("webapp_url", raw))
            .transpose()
    }

    /// Extra WebSocket origins.
    pub fn allowed_origins(&self) -> Result<Vec<Url>, SettingsError> {
        self.allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| parse_url("allowed_origins", entry))
            .collect()
    }

    /// Bot token; the bot binary cannot start without one.
    pub fn bot_token(&self) -> Result<&str, SettingsError> {
        self.bot_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(SettingsError::Missing { field: "bot_token" })
    }

    /// Long-poll timeout in seconds.
    pub fn bot_poll_timeout_secs(&self) -> u64 {
        self.bot_poll_timeout_secs
            .unwrap_or(DEFAULT_BOT_POLL_TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 10] = [
        "TASKBOARD_MODE",
        "TASKBOARD_HOST",
        "TASKBOARD_PORT",
        "TASKBOARD_DATABASE_URL",
        "TASKBOARD_POLL_INTERVAL_MS",
        "TASKBOARD_DB_MAX_CONNECTIONS",
        "TASKBOARD_WEBAPP_URL",
        "TASKBOARD_BOT_TOKEN",
        "TASKBOARD_BOT_POLL_TIMEOUT_SECS",
        "TASKBOARD_ALLOWED_ORIGINS",
    ];

    fn load_from_empty_args() -> AppSettings {
        AppSettings::load_from_iter([OsString::from("taskboard")]).expect("config should load")
    }

    fn cleared_with(overrides: &[(&str, &str)]) -> Vec<(&'static str, Option<String>)> {
        VARS.iter()
            .map(|name| {
                let value = overrides
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| (*value).to_owned());
                (*name, value)
            })
            .collect()
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env(cleared_with(&[]));

        let settings = load_from_empty_args();
        assert_eq!(
            settings.run_mode().expect("mode"),
            RunMode::from_debug_assertions()
        );
        assert_eq!(settings.host(), DEFAULT_HOST);
        assert_eq!(settings.port(), 8080);
        assert_eq!(settings.store_settings(), StoreSettings::in_memory());
        assert_eq!(settings.webapp_url().expect("url"), None);
        assert!(settings.allowed_origins().expect("origins").is_empty());
        assert_eq!(settings.bot_poll_timeout_secs(), 30);
        assert_eq!(
            settings.bot_token(),
            Err(SettingsError::Missing { field: "bot_token" })
        );
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env(cleared_with(&[
            ("TASKBOARD_MODE", "production"),
            ("TASKBOARD_PORT", "9090"),
            ("TASKBOARD_DATABASE_URL", "postgres://localhost/tasks"),
            ("TASKBOARD_POLL_INTERVAL_MS", "500"),
            ("TASKBOARD_DB_MAX_CONNECTIONS", "4"),
            ("TASKBOARD_WEBAPP_URL", "https://tasks.example.com/app"),
            ("TASKBOARD_BOT_TOKEN", "123:abc"),
            (
                "TASKBOARD_ALLOWED_ORIGINS",
                "https://a.example.com, https://b.example.com",
            ),
        ]));

        let settings = load_from_empty_args();
        assert_eq!(settings.run_mode().expect("mode"), RunMode::Production);
        assert_eq!(settings.port(), 9090);
        assert_eq!(
            settings.store_settings(),
            StoreSettings::postgres("postgres://localhost/tasks")
                .with_poll_interval(Duration::from_millis(500))
                .with_max_connections(4)
        );
        assert_eq!(
            settings.webapp_url().expect("url").map(String::from),
            Some("https://tasks.example.com/app".to_owned())
        );
        assert_eq!(settings.allowed_origins().expect("origins").len(), 2);
        assert_eq!(settings.bot_token(), Ok("123:abc"));
    }

    #[rstest]
    #[case(AppSettings { mode: Some("staging".to_owned()), ..AppSettings::default() })]
    fn unknown_mode_is_rejected(#[case] settings: AppSettings) {
        assert!(matches!(settings.run_mode(), Err(SettingsError::Mode(_))));
    }

    #[test]
    fn malformed_origins_name_the_field() {
        let settings = AppSettings {
            allowed_origins: Some("https://ok.example.com,not a url".to_owned()),
            ..AppSettings::default()
        };
        assert!(matches!(
            settings.allowed_origins(),
            Err(SettingsError::InvalidUrl { field: "allowed_origins", .. })
        ));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let settings = AppSettings {
            bot_token: Some("123:secret".to_owned()),
            database_url: Some("postgres://user:pw@db/tasks".to_owned()),
            ..AppSettings::default()
        };
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("pw@db"));
    }
}
