use std::{env, path::PathBuf, time::Duration};

use thiserror::Error;

/// Default bus exchange timeout, matching the host agent's 3 second default.
const DEFAULT_BUS_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_PROC_MOUNTS: &str = "/proc/mounts";

#[derive(Debug, Clone)]
pub struct Config {
    pub bus_timeout: Duration,
    pub proc_mounts: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BUS_TIMEOUT_MS must be a positive integer of milliseconds")]
    InvalidTimeout,
    #[error("PROC_MOUNTS_PATH must not be empty")]
    EmptyMountsPath,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus_timeout: Duration::from_millis(DEFAULT_BUS_TIMEOUT_MS),
            proc_mounts: PathBuf::from(DEFAULT_PROC_MOUNTS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup so tests never
    /// touch the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bus_timeout = lookup("BUS_TIMEOUT_MS")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(|value| {
                value
                    .parse::<u64>()
                    .ok()
                    .filter(|ms| *ms > 0)
                    .ok_or(ConfigError::InvalidTimeout)
            })
            .transpose()?
            .unwrap_or(DEFAULT_BUS_TIMEOUT_MS);

        let proc_mounts = match lookup("PROC_MOUNTS_PATH") {
            Some(value) => {
                let trimmed = value.trim().to_string();
                if trimmed.is_empty() {
                    return Err(ConfigError::EmptyMountsPath);
                }
                PathBuf::from(trimmed)
            }
            None => PathBuf::from(DEFAULT_PROC_MOUNTS),
        };

        Ok(Self {
            bus_timeout: Duration::from_millis(bus_timeout),
            proc_mounts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults() {
        let config = Config::from_lookup(|_| None).expect("config should parse");
        assert_eq!(config.bus_timeout, Duration::from_millis(3_000));
        assert_eq!(config.proc_mounts, PathBuf::from("/proc/mounts"));
    }

    #[test]
    fn timeout_override_parses() {
        let config = Config::from_lookup(|key| match key {
            "BUS_TIMEOUT_MS" => Some(" 10000 ".to_string()),
            _ => None,
        })
        .expect("config should parse");
        assert_eq!(config.bus_timeout, Duration::from_secs(10));
    }

    #[test]
    fn invalid_timeout_fails() {
        let err = Config::from_lookup(|key| match key {
            "BUS_TIMEOUT_MS" => Some("soon".to_string()),
            _ => None,
        })
        .expect_err("expected invalid timeout error");
        assert!(matches!(err, ConfigError::InvalidTimeout));
    }

    #[test]
    fn zero_timeout_fails() {
        let err = Config::from_lookup(|key| match key {
            "BUS_TIMEOUT_MS" => Some("0".to_string()),
            _ => None,
        })
        .expect_err("expected invalid timeout error");
        assert!(matches!(err, ConfigError::InvalidTimeout));
    }

    #[test]
    fn mounts_path_override_parses() {
        let config = Config::from_lookup(|key| match key {
            "PROC_MOUNTS_PATH" => Some("/tmp/mounts".to_string()),
            _ => None,
        })
        .expect("config should parse");
        assert_eq!(config.proc_mounts, PathBuf::from("/tmp/mounts"));
    }

    #[test]
    fn empty_mounts_path_fails() {
        let err = Config::from_lookup(|key| match key {
            "PROC_MOUNTS_PATH" => Some("  ".to_string()),
            _ => None,
        })
        .expect_err("expected empty mounts path error");
        assert!(matches!(err, ConfigError::EmptyMountsPath));
    }
}
