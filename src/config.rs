//! Configuration manager for the accounts service.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::user::{SortField, SortOrder};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Errors raised by an inconsistent `config.yaml` file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("`{field}` must be greater than zero")]
    Zero { field: &'static str },
    #[error("`images.supported_extensions` must not be empty")]
    NoImageExtension,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Listening port.
    pub port: u16,
    /// Origins allowed by CORS. Empty means any.
    pub origins: Vec<String>,
    #[serde(skip_deserializing)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to Argon2 configuration.
    #[serde(skip_serializing)]
    pub argon2: Option<Argon2>,
    /// Related to JsonWebToken configuration.
    pub token: Token,
    /// Failed login attempts policy.
    pub lockout: Lockout,
    /// Defaults applied on user listing.
    pub listing: Listing,
    /// Profile images storage.
    pub images: Images,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: "accounts".into(),
            port: 8080,
            origins: Vec::new(),
            version: VERSION.to_owned(),
            path: PathBuf::default(),
            postgres: None,
            argon2: None,
            token: Token::default(),
            lockout: Lockout::default(),
            listing: Listing::default(),
            images: Images::default(),
        }
    }
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Argon2 {
    /// Memory used while hashing.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 4,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

/// Json Web Token configuration.
///
/// The signing secret is never read from the file, see `TOKEN_SECRET_KEY`.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    pub issuer: String,
    pub audience: String,
    /// Token lifetime, in seconds.
    pub expires_in: u64,
    /// Header carrying the token, both ways.
    pub header: String,
    /// Scheme written before the token inside `header`.
    pub prefix: String,
}

impl Default for Token {
    fn default() -> Self {
        Self {
            issuer: "accounts".into(),
            audience: "accounts".into(),
            expires_in: 60 * 60,
            header: "Authorization".into(),
            prefix: "Bearer ".into(),
        }
    }
}

/// Failed login attempts policy.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Lockout {
    /// Failures allowed inside `failed_attempts_period` before locking.
    pub failed_attempts_allowed: u32,
    /// Sliding window, in seconds, anchored on the last attempt.
    pub failed_attempts_period: u64,
    /// Seconds after the last attempt before a locked account opens again.
    pub account_unlock_time: u64,
}

impl Default for Lockout {
    fn default() -> Self {
        Self {
            failed_attempts_allowed: 5,
            failed_attempts_period: 15 * 60,
            account_unlock_time: 15 * 60,
        }
    }
}

impl Lockout {
    pub fn failed_attempts_period(&self) -> TimeDelta {
        seconds(self.failed_attempts_period)
    }

    pub fn account_unlock_time(&self) -> TimeDelta {
        seconds(self.account_unlock_time)
    }
}

/// Defaults applied on user listing.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Listing {
    pub page_size: u32,
    pub sort: SortField,
    pub order: SortOrder,
}

impl Default for Listing {
    fn default() -> Self {
        Self {
            page_size: 10,
            sort: SortField::Username,
            order: SortOrder::Asc,
        }
    }
}

/// Profile images storage.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Images {
    pub folder: PathBuf,
    /// Maximum upload size, in bytes.
    pub max_file_size: usize,
    pub supported_extensions: Vec<String>,
}

impl Default for Images {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("profile-images"),
            max_file_size: 1_000_000,
            supported_extensions: vec![
                "png".into(),
                "jpg".into(),
                "jpeg".into(),
                "gif".into(),
            ],
        }
    }
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

fn seconds(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>, ConfigError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let mut config = match File::open(file_path) {
            Ok(file) => match serde_yaml::from_reader::<_, Configuration>(file)
            {
                Ok(config) => config,
                Err(err) => self.error(err),
            },
            Err(err) => self.error(err),
        };

        // set app version.
        config.version = VERSION.to_owned();
        config.validate()?;

        Ok(Arc::new(config))
    }

    /// Reject values the lockout and listing logic cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lockout.failed_attempts_allowed == 0 {
            return Err(ConfigError::Zero {
                field: "lockout.failed_attempts_allowed",
            });
        }
        if self.token.expires_in == 0 {
            return Err(ConfigError::Zero {
                field: "token.expires_in",
            });
        }
        if self.listing.page_size == 0 {
            return Err(ConfigError::Zero {
                field: "listing.page_size",
            });
        }
        if self.images.max_file_size == 0 {
            return Err(ConfigError::Zero {
                field: "images.max_file_size",
            });
        }
        if self.images.supported_extensions.is_empty() {
            return Err(ConfigError::NoImageExtension);
        }

        Ok(())
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file cannot be read");
        Self::default()
    }
}
