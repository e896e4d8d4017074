use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Static identity '{0}' is defined more than once")]
    DuplicateIdentity(String),
    #[error("Static identity name must not be empty")]
    EmptyIdentityName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listen address (default: "127.0.0.1:8080")
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Tenant directory configuration
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Static identities, consulted before the tenant directory
    #[serde(default = "default_identities")]
    pub identities: Vec<IdentityConfig>,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            logging: LoggingConfig::default(),
            directory: DirectoryConfig::default(),
            identities: default_identities(),
        }
    }
}

impl Config {
    /// Load and validate a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for identity in &self.identities {
            if identity.name.is_empty() {
                return Err(ConfigError::EmptyIdentityName);
            }
            if !seen.insert(identity.name.as_str()) {
                return Err(ConfigError::DuplicateIdentity(identity.name.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when RUST_LOG is not set (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Directory backend: "memory" or "sqlite" (default: "memory")
    #[serde(default)]
    pub backend: DirectoryBackend,

    /// Path to SQLite database file (only used when backend = "sqlite")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Optional TOML file of `[[tenants]]` seeding the memory backend
    #[serde(default)]
    pub tenants_file: Option<PathBuf>,

    /// How long a SQLite query waits on a locked database (default: 5000)
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("authd.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            backend: DirectoryBackend::default(),
            database_path: default_database_path(),
            tenants_file: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DirectoryConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// A reserved account with a fixed secret and a single topic root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityConfig {
    pub name: String,

    /// Literal secret; takes precedence over `password_env`
    #[serde(default)]
    pub password: Option<String>,

    /// Environment variable holding the secret
    #[serde(default)]
    pub password_env: Option<String>,

    /// Topic root this identity may use
    pub root: String,

    /// Restrict the identity to read and subscribe access
    #[serde(default)]
    pub read_only: bool,
}

impl IdentityConfig {
    pub fn new(name: &str, password_env: &str, root: &str) -> Self {
        Self {
            name: name.to_string(),
            password: None,
            password_env: Some(password_env.to_string()),
            root: root.to_string(),
            read_only: false,
        }
    }
}

fn default_identities() -> Vec<IdentityConfig> {
    vec![
        IdentityConfig::new("test", "TEST_PWD", "test"),
        IdentityConfig::new("mon", "MON_PWD", "$SYS"),
        IdentityConfig::new("piot", "PIOT_PWD", "org"),
    ]
}
