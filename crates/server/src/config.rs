//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use database::PasswordPolicy;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Maximum pooled database connections.
    pub database_pool_size: u32,
    /// Rules applied to new passwords.
    pub password_policy: PasswordPolicy,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `SERVER_ADDR` | Server bind address | `127.0.0.1:8000` |
    /// | `DATABASE_URL` | SQLite database URL | `sqlite:knowledge.db?mode=rwc` |
    /// | `DATABASE_POOL_SIZE` | Connection pool size | `20` |
    /// | `PASSWORD_MIN_LENGTH` | Minimum password length | `8` |
    /// | `PASSWORD_MAX_LENGTH` | Maximum password length | `128` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = lookup("SERVER_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:knowledge.db?mode=rwc".to_string());

        let database_pool_size: u32 = parse_var(&lookup, "DATABASE_POOL_SIZE", 20)?;
        if database_pool_size == 0 {
            return Err(ConfigError::InvalidNumber {
                var: "DATABASE_POOL_SIZE",
                value: "0".to_string(),
            });
        }

        let defaults = PasswordPolicy::default();
        let min_length = parse_var(&lookup, "PASSWORD_MIN_LENGTH", defaults.min_length)?;
        let max_length = parse_var(&lookup, "PASSWORD_MAX_LENGTH", defaults.max_length)?;
        if min_length == 0 || min_length > max_length {
            return Err(ConfigError::InvalidPasswordLengths {
                min: min_length,
                max: max_length,
            });
        }

        Ok(Self {
            addr,
            database_url,
            database_pool_size,
            password_policy: PasswordPolicy {
                min_length,
                max_length,
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid SERVER_ADDR format")]
    InvalidAddr,

    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("PASSWORD_MIN_LENGTH ({min}) must be between 1 and PASSWORD_MAX_LENGTH ({max})")]
    InvalidPasswordLengths { min: usize, max: usize },
}
