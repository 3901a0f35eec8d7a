//! Account configuration
//!
//! These types are deserialized by the binary from the configuration file;
//! the engine only ever sees the parsed structures.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors in the account configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Activated in `general.accounts` without an `accounts.<name>` section
    #[error("account {0} is activated but has no configuration")]
    MissingAccount(String),

    /// Activated more than once
    #[error("account {0} is activated more than once")]
    Duplicate(String),

    /// A field failed validation
    #[error("account {account}: {reason}")]
    Invalid { account: String, reason: String },
}

fn default_port() -> u16 {
    993
}

fn default_interval() -> u64 {
    300
}

/// Remote endpoint and credentials
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    /// IMAP server hostname
    pub host: String,
    /// IMAP server port
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// TCP keep-alive idle time in seconds, 0 for the OS default
    #[serde(default)]
    pub keep_alive: u64,
    /// Connection holding policy; stored, not interpreted yet
    #[serde(default)]
    pub hold_connection: String,
}

impl RemoteConfig {
    pub fn keep_alive(&self) -> Option<Duration> {
        (self.keep_alive > 0).then(|| Duration::from_secs(self.keep_alive))
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("keep_alive", &self.keep_alive)
            .field("hold_connection", &self.hold_connection)
            .finish()
    }
}

/// Where synced mail would be stored locally
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalTarget {
    /// Store kind, e.g. "maildir"
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub folder: PathBuf,
}

/// Configuration of one account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountConfig {
    pub remote: RemoteConfig,
    #[serde(default)]
    pub local: LocalTarget,
    /// How many days back to search, 0 for no limit
    #[serde(default)]
    pub max_age: u32,
}

impl AccountConfig {
    /// Reject configurations that can never connect
    pub fn validate(&self, account: &str) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            account: account.to_string(),
            reason: reason.to_string(),
        };

        if self.remote.host.trim().is_empty() {
            return Err(invalid("remote.host is empty"));
        }
        if self.remote.port == 0 {
            return Err(invalid("remote.port must not be 0"));
        }
        if self.remote.username.is_empty() {
            return Err(invalid("remote.username is empty"));
        }
        Ok(())
    }
}

/// Top-level options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneralConfig {
    /// Activated account names, in order
    #[serde(default)]
    pub accounts: Vec<String>,
    /// Seconds between daemon rounds
    #[serde(default = "default_interval")]
    pub interval: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            interval: default_interval(),
        }
    }
}

impl GeneralConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

/// The whole configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub accounts: HashMap<String, AccountConfig>,
}

impl Settings {
    /// Configuration of an activated account.
    ///
    /// Names match case-insensitively, since configuration loaders may
    /// lowercase section keys but leave list values alone.
    pub fn account(&self, name: &str) -> Result<&AccountConfig, ConfigError> {
        self.accounts
            .get(name)
            .or_else(|| {
                let wanted = name.to_lowercase();
                self.accounts
                    .iter()
                    .find(|(key, _)| key.to_lowercase() == wanted)
                    .map(|(_, config)| config)
            })
            .ok_or_else(|| ConfigError::MissingAccount(name.to_string()))
    }
}
