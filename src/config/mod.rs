//! Runtime configuration loaded from environment variables.
//!
//! | Variable                      | Default          |
//! |-------------------------------|------------------|
//! | `CACHEGATE_ADDR`              | `127.0.0.1:8080` |
//! | `CACHEGATE_CACHE_CAPACITY`    | `10000`          |
//! | `CACHEGATE_WRITE_QUEUE`       | `1024`           |
//! | `CACHEGATE_WRITE_CONCURRENCY` | `32`             |
//! | `CACHEGATE_USER_HEADER`       | `x-user-id`      |
//!
//! Loading a `.env` file is left to the binary.

use std::env;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::security::DEFAULT_USER_HEADER;

pub const ADDR_VAR: &str = "CACHEGATE_ADDR";
pub const CACHE_CAPACITY_VAR: &str = "CACHEGATE_CACHE_CAPACITY";
pub const WRITE_QUEUE_VAR: &str = "CACHEGATE_WRITE_QUEUE";
pub const WRITE_CONCURRENCY_VAR: &str = "CACHEGATE_WRITE_CONCURRENCY";
pub const USER_HEADER_VAR: &str = "CACHEGATE_USER_HEADER";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address the server binds to.
    pub addr: String,
    /// Maximum number of cached responses held in memory.
    pub cache_capacity: u64,
    /// Background cache writes that may wait for a worker.
    pub write_queue: usize,
    /// Background cache writes allowed to run at once.
    pub write_concurrency: usize,
    /// Header carrying the authenticated caller.
    pub user_header: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_owned(),
            cache_capacity: 10_000,
            write_queue: 1024,
            write_concurrency: 32,
            user_header: DEFAULT_USER_HEADER.to_owned(),
        }
    }
}

impl Config {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a non-numeric or zero size.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds a config from an arbitrary variable source. Unset or blank
    /// variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let lookup = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        Ok(Self {
            addr: lookup(ADDR_VAR).unwrap_or(defaults.addr),
            cache_capacity: positive(CACHE_CAPACITY_VAR, lookup(CACHE_CAPACITY_VAR))?
                .unwrap_or(defaults.cache_capacity),
            write_queue: positive(WRITE_QUEUE_VAR, lookup(WRITE_QUEUE_VAR))?
                .unwrap_or(defaults.write_queue),
            write_concurrency: positive(WRITE_CONCURRENCY_VAR, lookup(WRITE_CONCURRENCY_VAR))?
                .unwrap_or(defaults.write_concurrency),
            user_header: lookup(USER_HEADER_VAR).unwrap_or(defaults.user_header),
        })
    }
}

fn positive<T>(var: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr + PartialEq + Default,
{
    let Some(value) = value else {
        debug!(var, "not set, using default");
        return Ok(None);
    };

    match value.parse::<T>() {
        Ok(parsed) if parsed != T::default() => Ok(Some(parsed)),
        _ => Err(ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(load(&[]).unwrap(), Config::default());
    }

    #[test]
    fn variables_override_defaults() {
        let config = load(&[
            (ADDR_VAR, "0.0.0.0:9000"),
            (CACHE_CAPACITY_VAR, "500"),
            (WRITE_QUEUE_VAR, " 64 "),
            (WRITE_CONCURRENCY_VAR, "4"),
            (USER_HEADER_VAR, "x-authenticated-user"),
        ])
        .unwrap();

        assert_eq!(config.addr, "0.0.0.0:9000");
        assert_eq!(config.cache_capacity, 500);
        assert_eq!(config.write_queue, 64);
        assert_eq!(config.write_concurrency, 4);
        assert_eq!(config.user_header, "x-authenticated-user");
    }

    #[test]
    fn blank_values_keep_defaults() {
        let config = load(&[(ADDR_VAR, "  "), (CACHE_CAPACITY_VAR, "")]).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn non_numeric_size_is_rejected() {
        let err = load(&[(WRITE_QUEUE_VAR, "lots")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: WRITE_QUEUE_VAR,
                value: "lots".to_owned()
            }
        );
        assert_eq!(
            err.to_string(),
            r#"invalid value for CACHEGATE_WRITE_QUEUE: "lots""#
        );
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(
            load(&[(WRITE_CONCURRENCY_VAR, "0")]),
            Err(ConfigError::Invalid { var: WRITE_CONCURRENCY_VAR, .. })
        ));
        assert!(load(&[(CACHE_CAPACITY_VAR, "-1")]).is_err());
    }
}
