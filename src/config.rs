//! Startup settings read from the environment (after `.env` is loaded).

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;

use actix_web::cookie::Key;

use crate::auth::Hasher;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is required")]
    Missing(&'static str),
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub struct Settings {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub pool_size: u32,
    pub cookie_secure: bool,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    session_key: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let pool_size = try_load(&lookup, "DB_POOL_SIZE", "10")?;
        if pool_size == 0 {
            return Err(ConfigError::Invalid {
                key: "DB_POOL_SIZE",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(Self {
            database_url,
            bind_addr: try_load(&lookup, "BIND_ADDR", "127.0.0.1:8080")?,
            pool_size,
            cookie_secure: try_load(&lookup, "COOKIE_SECURE", "false")?,
            argon2_memory_kib: try_load(&lookup, "ARGON2_MEMORY_KIB", "19456")?,
            argon2_iterations: try_load(&lookup, "ARGON2_ITERATIONS", "2")?,
            session_key: lookup("SESSION_KEY"),
        })
    }

    /// The cookie key from `SESSION_KEY`, or a random one that dies with the
    /// process.
    pub fn session_key(&self) -> Result<Key, ConfigError> {
        match &self.session_key {
            Some(raw) => Key::try_from(raw.as_bytes()).map_err(|err| ConfigError::Invalid {
                key: "SESSION_KEY",
                reason: format!("{err} (need at least 64 bytes)"),
            }),
            None => {
                log::warn!("SESSION_KEY not set, sessions will not survive a restart");
                Ok(Key::generate())
            }
        }
    }

    pub fn hasher(&self) -> Result<Hasher, ConfigError> {
        Hasher::new(self.argon2_memory_kib, self.argon2_iterations).map_err(|err| {
            ConfigError::Invalid {
                key: "ARGON2_MEMORY_KIB",
                reason: err.to_string(),
            }
        })
    }
}

fn try_load<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        log::info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        key,
        reason: err.to_string(),
    })
}
