//! Configuration Module
//!
//! Handles loading server configuration from environment variables.

use std::env;

use thiserror::Error;

/// Default HTTP port when `SERVER_PORT` is not set.
pub const DEFAULT_SERVER_PORT: u16 = 3000;

// == Config Error ==
/// Reasons the configuration could not be loaded.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed
    #[error("Invalid value {value:?} for environment variable {name}")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Redis host name or address
    pub redis_host: String,
    /// Redis port
    pub redis_port: u16,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_HOST` - Redis host (required)
    /// - `REDIS_PORT` - Redis port (required)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let redis_host = lookup("REDIS_HOST")
            .filter(|host| !host.is_empty())
            .ok_or(ConfigError::Missing("REDIS_HOST"))?;
        let redis_port =
            parse_port(&lookup, "REDIS_PORT")?.ok_or(ConfigError::Missing("REDIS_PORT"))?;
        let server_port = parse_port(&lookup, "SERVER_PORT")?.unwrap_or(DEFAULT_SERVER_PORT);

        Ok(Self {
            redis_host,
            redis_port,
            server_port,
        })
    }
}

fn parse_port<F>(lookup: &F, name: &'static str) -> Result<Option<u16>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_config_full() {
        let config = Config::from_lookup(lookup_from(&[
            ("REDIS_HOST", "redis.local"),
            ("REDIS_PORT", "6380"),
            ("SERVER_PORT", "8080"),
        ]))
        .unwrap();

        assert_eq!(config.redis_host, "redis.local");
        assert_eq!(config.redis_port, 6380);
        assert_eq!(config.server_port, 8080);
    }

    #[test]
    fn test_config_default_server_port() {
        let config = Config::from_lookup(lookup_from(&[
            ("REDIS_HOST", "localhost"),
            ("REDIS_PORT", "6379"),
        ]))
        .unwrap();

        assert_eq!(config.server_port, DEFAULT_SERVER_PORT);
    }

    #[test]
    fn test_config_missing_host() {
        let result = Config::from_lookup(lookup_from(&[("REDIS_PORT", "6379")]));
        assert_eq!(result, Err(ConfigError::Missing("REDIS_HOST")));
    }

    #[test]
    fn test_config_missing_port() {
        let result = Config::from_lookup(lookup_from(&[("REDIS_HOST", "localhost")]));
        assert_eq!(result, Err(ConfigError::Missing("REDIS_PORT")));
    }

    #[test]
    fn test_config_invalid_port() {
        let result = Config::from_lookup(lookup_from(&[
            ("REDIS_HOST", "localhost"),
            ("REDIS_PORT", "not-a-port"),
        ]));
        assert_eq!(
            result,
            Err(ConfigError::Invalid {
                name: "REDIS_PORT",
                value: "not-a-port".to_string()
            })
        );
    }
}
