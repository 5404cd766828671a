//! Configuration file for a WebSub subscriber.
//!
//! All default values live exclusively in `config.default.toml`.
//! This module embeds that file at compile-time, parses it once,
//! and lets callers optionally layer their own TOML on top.

use std::{
    fmt::{self, Display},
    fs,
    num::NonZeroU64,
    path::Path,
    str::FromStr,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::{Directive, LevelFilter};
use url::Url;

/// Embedded copy of the default configuration (single source of truth for defaults)
pub const DEFAULT_CONFIG: &str = include_str!("config.default.toml");

/// Error that can occur when reading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigReadError {
    /// The file did not exist or could not be read.
    #[error("config file not found: {0}")]
    ConfigFileNotFound(#[from] std::io::Error),
    /// The TOML was syntactically invalid or had the wrong shape.
    #[error("config file is not valid TOML: {0}")]
    ConfigFileNotValid(#[from] toml::de::Error),
    /// A user value has a different type than its default.
    #[error("config value at {path} must be a {expected}, got a {found}")]
    ConfigMergeError {
        /// Dotted path of the offending key.
        path: String,
        /// Type of the default value.
        expected: &'static str,
        /// Type found in the user file.
        found: &'static str,
    },
}

/// `[client]` section.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClientToml {
    /// Base URL for derived callbacks.
    pub callback_base: Option<Url>,
    /// Default lease requested from hubs.
    pub lease_seconds: NonZeroU64,
    /// Timeout applied to discovery and hub requests. `0` disables it.
    pub request_timeout_secs: u64,
    /// Extra user agent segment.
    pub user_agent_extra: Option<String>,
}

impl ClientToml {
    /// Default lease as a [`Duration`].
    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_seconds.get())
    }

    /// Request timeout, if enabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

/// `[logging]` section.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LoggingToml {
    /// Default level.
    pub level: LogLevel,
    /// Per-target directives such as `websub=debug`.
    pub module_levels: Vec<TargetLevel>,
}

/// The subscriber configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConfigToml {
    /// HTTP client and subscription defaults.
    pub client: ClientToml,
    /// Log filtering.
    pub logging: LoggingToml,
}

impl Default for ConfigToml {
    fn default() -> Self {
        ConfigToml::from_str(DEFAULT_CONFIG).expect("Embedded config.default.toml must be valid")
    }
}

impl Default for ClientToml {
    fn default() -> Self {
        ConfigToml::default().client
    }
}

impl Default for LoggingToml {
    fn default() -> Self {
        ConfigToml::default().logging
    }
}

impl ConfigToml {
    /// Read and parse a configuration file, overlaying it on top of the embedded defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigReadError> {
        let raw = fs::read_to_string(path)?;
        Self::from_str_with_defaults(&raw)
    }

    /// Parse a raw TOML string, overlaying it on top of the embedded defaults.
    pub fn from_str_with_defaults(raw: &str) -> Result<Self, ConfigReadError> {
        let default_val: toml::Value = DEFAULT_CONFIG
            .parse()
            .expect("embedded defaults invalid TOML");
        let user_val: toml::Value = raw.parse()?;

        let merged_val = merge(default_val, user_val, "$")?;

        Ok(merged_val.try_into()?)
    }
}

impl FromStr for ConfigToml {
    type Err = toml::de::Error;

    /// Parse a complete configuration, without defaults.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

/// Deep-merge `user` into `defaults`. Tables merge key by key, everything else is replaced.
fn merge(defaults: toml::Value, user: toml::Value, path: &str) -> Result<toml::Value, ConfigReadError> {
    use toml::Value;

    match (defaults, user) {
        (Value::Table(mut existing), Value::Table(inner)) => {
            for (key, value) in inner {
                let merged = match existing.remove(&key) {
                    Some(default) => merge(default, value, &format!("{path}.{key}"))?,
                    None => value,
                };
                existing.insert(key, merged);
            }
            Ok(Value::Table(existing))
        }
        (Value::Table(existing), other) => Err(ConfigReadError::ConfigMergeError {
            path: path.to_string(),
            expected: Value::Table(existing).type_str(),
            found: other.type_str(),
        }),
        (_, other) => Ok(other),
    }
}

/// A log level such as `info`, usable as a tracing [`Directive`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogLevel(pub LevelFilter);

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed: LevelFilter = s
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid log level directive: {}", s))?;
        Ok(Self(parsed))
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

impl From<LogLevel> for Directive {
    fn from(val: LogLevel) -> Self {
        val.0.into()
    }
}

/// A per-target directive such as `websub=debug`.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetLevel(pub String);

impl FromStr for TargetLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.contains('=') {
            return Err(anyhow::anyhow!("invalid target log level directive: {}", s));
        }
        s.parse::<Directive>()
            .map_err(|_| anyhow::anyhow!("invalid target log level directive: {}", s))?;
        Ok(Self(s.to_string()))
    }
}

impl TargetLevel {
    /// The parsed directive.
    pub fn directive(&self) -> anyhow::Result<Directive> {
        Ok(self.0.parse()?)
    }
}

impl Serialize for TargetLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TargetLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}
