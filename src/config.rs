//! Application configuration.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use eventcast_delivery::{SmtpAccount, SmtpFallback};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    /// Base64 encoded 32-byte key for the channel delivery-URL column.
    pub encryption_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// How often the schedule worker polls for due reminders.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// How long after start an event without an end date stays live.
    #[serde(default = "default_completion_grace")]
    pub completion_grace_hours: i64,
    /// Reminder offsets applied to auto-subscriptions.
    #[serde(default = "default_reminder_offsets")]
    pub default_reminder_offsets: Vec<i64>,
}

/// Service SMTP credentials for the no-channel delivery fallback. Absence
/// disables the fallback.
#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub unverified_user: String,
    pub unverified_app_password: String,
    pub verified_user: String,
    pub verified_app_password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_completion_grace() -> i64 {
    24
}

fn default_reminder_offsets() -> Vec<i64> {
    vec![86_400, 3_600]
}

impl Config {
    /// Load configuration from files and environment variables, later
    /// sources overriding earlier ones:
    ///
    /// 1. config/default.toml (required)
    /// 2. Custom config file (if a path is provided)
    /// 3. config/dev.toml (optional, local development)
    /// 4. Environment variables, prefix `EVENTCAST_`, `__` separator
    ///    (e.g. `EVENTCAST_DATABASE__URL=sqlite://eventcast.db`)
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigLoader::builder().add_source(File::with_name("config/default"));

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }

        builder = builder.add_source(File::with_name("config/dev").required(false));

        let config = builder
            .add_source(Environment::with_prefix("EVENTCAST").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn smtp_fallback(&self) -> Option<SmtpFallback> {
        self.smtp.as_ref().map(|smtp| SmtpFallback {
            host: smtp.host.clone(),
            port: smtp.port,
            unverified: SmtpAccount {
                user: smtp.unverified_user.clone(),
                app_password: smtp.unverified_app_password.clone(),
            },
            verified: SmtpAccount {
                user: smtp.verified_user.clone(),
                app_password: smtp.verified_app_password.clone(),
            },
        })
    }
}
