use std::num::NonZeroUsize;

use glint_shader::Target;
use thiserror::Error;

pub const ENV_TARGET: &str = "GLINT_TARGET";
pub const ENV_LOG: &str = "GLINT_LOG";
pub const ENV_CACHE_CAPACITY: &str = "GLINT_CACHE_CAPACITY";

const DEFAULT_LOG_FILTER: &str = "warn";
const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Settings taken from the environment. Command-line flags override them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CliConfig {
    pub target: Target,
    pub log_filter: String,
    pub cache_capacity: NonZeroUsize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for env var {var}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl CliConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let target = match lookup(ENV_TARGET) {
            Some(raw) => raw.trim().parse::<Target>().map_err(|e| ConfigError::InvalidEnv {
                var: ENV_TARGET,
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => Target::Generic,
        };

        let log_filter = lookup(ENV_LOG)
            .map(|raw| raw.trim().to_owned())
            .filter(|raw| !raw.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_owned());

        let cache_capacity = match lookup(ENV_CACHE_CAPACITY) {
            Some(raw) => raw
                .trim()
                .parse::<NonZeroUsize>()
                .map_err(|e| ConfigError::InvalidEnv {
                    var: ENV_CACHE_CAPACITY,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?,
            None => NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
        };

        Ok(Self {
            target,
            log_filter,
            cache_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<CliConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CliConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.target, Target::Generic);
        assert_eq!(cfg.log_filter, "warn");
        assert_eq!(cfg.cache_capacity.get(), 64);
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            (ENV_TARGET, "r200"),
            (ENV_LOG, "glint_shader=trace"),
            (ENV_CACHE_CAPACITY, " 8 "),
        ])
        .unwrap();
        assert_eq!(cfg.target, Target::Legacy);
        assert_eq!(cfg.log_filter, "glint_shader=trace");
        assert_eq!(cfg.cache_capacity.get(), 8);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            config(&[(ENV_TARGET, "dxbc")]),
            Err(ConfigError::InvalidEnv {
                var: ENV_TARGET,
                ..
            })
        ));
        assert!(matches!(
            config(&[(ENV_CACHE_CAPACITY, "0")]),
            Err(ConfigError::InvalidEnv {
                var: ENV_CACHE_CAPACITY,
                ..
            })
        ));
    }
}
