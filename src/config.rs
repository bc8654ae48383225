//! Layered configuration
//!
//! Settings are resolved in order, later layers winning:
//! built-in defaults, an optional TOML file, `LOCKRUN_*` environment
//! variables, then explicit overrides (normally command-line flags).

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use config::{Environment, File, FileFormat};
use serde::Deserialize;
use sqlx::mysql::MySqlConnectOptions;

use crate::error::{Error, Result};

pub const DEFAULT_ENV_PREFIX: &str = "LOCKRUN";
pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_RELEASE_TIMEOUT_SECS: u64 = 5;

/// Resolved, validated settings.
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Bound on connecting plus the initial ping.
    pub connect_timeout: Duration,
    /// Deadline for the release that follows every guarded run.
    pub release_timeout: Duration,
    /// Hard limit on how long the command may run once the lock is held.
    pub max_runtime: Option<Duration>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }

    /// `user@host:port/database`, safe to log.
    pub fn endpoint(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("connect_timeout", &self.connect_timeout)
            .field("release_timeout", &self.release_timeout)
            .field("max_runtime", &self.max_runtime)
            .finish()
    }
}

/// Shape of the merged layers before validation.
#[derive(Debug, Deserialize)]
struct RawConfig {
    host: Option<String>,
    port: i64,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
    connect_timeout_secs: u64,
    release_timeout_secs: u64,
    max_runtime_secs: Option<u64>,
}

pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    env_prefix: String,
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
    max_runtime_secs: Option<u64>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            config_path: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            host: None,
            port: None,
            user: None,
            password: None,
            database: None,
            max_runtime_secs: None,
        }
    }
}

impl ConfigBuilder {
    /// TOML file to read; it must exist when given.
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn host(mut self, host: Option<String>) -> Self {
        self.host = host;
        self
    }

    pub fn port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    pub fn password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn database(mut self, database: Option<String>) -> Self {
        self.database = database;
        self
    }

    pub fn max_runtime_secs(mut self, secs: Option<u64>) -> Self {
        self.max_runtime_secs = secs;
        self
    }

    pub fn build(self) -> Result<Config> {
        let mut layers = config::Config::builder()
            .set_default("port", i64::from(DEFAULT_MYSQL_PORT))?
            .set_default("connect_timeout_secs", DEFAULT_CONNECT_TIMEOUT_SECS as i64)?
            .set_default("release_timeout_secs", DEFAULT_RELEASE_TIMEOUT_SECS as i64)?;

        if let Some(path) = &self.config_path {
            layers = layers.add_source(File::from(path.as_path()).format(FileFormat::Toml));
        }

        let raw: RawConfig = layers
            .add_source(Environment::with_prefix(&self.env_prefix))
            .set_override_option("host", self.host)?
            .set_override_option("port", self.port.map(i64::from))?
            .set_override_option("user", self.user)?
            .set_override_option("password", self.password)?
            .set_override_option("database", self.database)?
            .set_override_option(
                "max_runtime_secs",
                self.max_runtime_secs.and_then(|secs| i64::try_from(secs).ok()),
            )?
            .build()?
            .try_deserialize()?;

        validate(raw, &self.env_prefix)
    }
}

fn validate(raw: RawConfig, prefix: &str) -> Result<Config> {
    let port = u16::try_from(raw.port)
        .ok()
        .filter(|port| *port >= 1)
        .ok_or_else(|| Error::InvalidSetting {
            name: "port",
            reason: format!("{prefix}_PORT must be between 1 and 65535, got {}", raw.port),
        })?;

    if raw.connect_timeout_secs == 0 {
        return Err(Error::InvalidSetting {
            name: "connect_timeout_secs",
            reason: "must be positive".to_string(),
        });
    }
    if raw.release_timeout_secs == 0 {
        return Err(Error::InvalidSetting {
            name: "release_timeout_secs",
            reason: "must be positive".to_string(),
        });
    }

    Ok(Config {
        host: required(raw.host, "host", prefix)?,
        port,
        user: required(raw.user, "user", prefix)?,
        password: required(raw.password, "password", prefix)?,
        database: required(raw.database, "database", prefix)?,
        connect_timeout: Duration::from_secs(raw.connect_timeout_secs),
        release_timeout: Duration::from_secs(raw.release_timeout_secs),
        max_runtime: raw
            .max_runtime_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
    })
}

fn required(value: Option<String>, key: &'static str, prefix: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::MissingSetting {
            key,
            var: format!("{}_{}", prefix, key.to_uppercase()),
        })
}
