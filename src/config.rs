// src/config.rs
//! Service configuration.
//!
//! Settings are layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. Optional `quorum-auth.toml` (or the file named by `QUORUM_AUTH_CONFIG`)
//! 3. Environment variables prefixed `QUORUM_AUTH__`, with `__` separating
//!    nested keys (e.g. `QUORUM_AUTH__AUTH__CHALLENGE_TTL_SECS=120`)
//!
//! A `.env` file is loaded by `main` before this runs, so its variables count
//! as environment.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "quorum-auth";

/// What to do when `register` is called for a DID that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationPolicy {
    /// Refuse; key changes must go through authenticated rotation
    Reject,
    /// Silently replace the previous record
    Overwrite,
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        RegistrationPolicy::Reject
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Socket address the HTTP API binds to
    pub bind_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Lifetime of an issued challenge
    pub challenge_ttl_secs: u64,
    /// Period of the expired-challenge sweep
    pub sweep_interval_secs: u64,
    pub registration_policy: RegistrationPolicy,
}

impl AuthSettings {
    pub fn challenge_ttl(&self) -> Duration {
        Duration::from_secs(self.challenge_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Top-level settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    /// Default `env_logger` filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Settings {
    /// Loads settings from defaults, the optional config file and the environment.
    ///
    /// # Errors
    /// Returns `ConfigError` if a source cannot be parsed, a value has the wrong
    /// type, or a duration is zero.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("QUORUM_AUTH_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let builder = Self::defaults()?
            .add_source(File::with_name(&file).required(false))
            .add_source(Environment::with_prefix("QUORUM_AUTH").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.bind_address", "127.0.0.1:3000")?
            .set_default("auth.challenge_ttl_secs", 300_i64)?
            .set_default("auth.sweep_interval_secs", 60_i64)?
            .set_default("auth.registration_policy", "reject")?
            .set_default("log_level", "info")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.challenge_ttl_secs == 0 {
            return Err(ConfigError::Message(
                "auth.challenge_ttl_secs must be greater than zero".into(),
            ));
        }
        if self.auth.sweep_interval_secs == 0 {
            return Err(ConfigError::Message(
                "auth.sweep_interval_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
