//! Environment-supplied configuration.
//!
//! Every external dependency is addressed through an environment variable;
//! a missing required variable is fatal at the first use of the
//! corresponding connection. Loop tuning knobs have defaults and are read
//! once at startup.

use std::env;
use std::time::Duration;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set, cannot reach the corresponding service")]
    Missing(&'static str),

    #[error("{0} is set but contains no entries")]
    Empty(&'static str),

    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Read a required environment variable.
pub fn required(var: &'static str) -> Result<String, ConfigError> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        Ok(_) => Err(ConfigError::Empty(var)),
        Err(_) => Err(ConfigError::Missing(var)),
    }
}

/// Read a required comma-separated list (e.g. cluster host lists).
pub fn required_list(var: &'static str) -> Result<Vec<String>, ConfigError> {
    let raw = required(var)?;
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() {
        return Err(ConfigError::Empty(var));
    }
    Ok(items)
}

/// Tuning for the continuous re-run loop.
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Maximum time to sit in WAITING before re-running anyway. Guards
    /// against a notification published before our subscription was
    /// established, or dropped entirely.
    pub idle_timeout: Duration,

    /// Pause after a wake so closely-spaced deploy notifications coalesce
    /// into a single re-run.
    pub debounce: Duration,

    /// Whether the debounce also applies to the very first notification
    /// after STARTUP, or only to the second and later ones.
    pub debounce_first: bool,

    /// Components whose `updates:<component>` topic triggers a re-run.
    pub components: Vec<String>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            debounce: Duration::from_secs(1),
            debounce_first: true,
            components: ["backend", "frontend", "websocket", "jobs"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl UpdaterConfig {
    /// Load from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load from an arbitrary lookup function. Lets tests feed maps
    /// instead of mutating process-wide environment state.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("UPDATES_IDLE_TIMEOUT_SECONDS") {
            let secs = v.parse::<u64>().map_err(|_| ConfigError::Invalid {
                var: "UPDATES_IDLE_TIMEOUT_SECONDS",
                value: v.clone(),
            })?;
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = lookup("UPDATES_DEBOUNCE_MS") {
            let ms = v.parse::<u64>().map_err(|_| ConfigError::Invalid {
                var: "UPDATES_DEBOUNCE_MS",
                value: v.clone(),
            })?;
            config.debounce = Duration::from_millis(ms);
        }
        if let Some(v) = lookup("UPDATES_DEBOUNCE_FIRST") {
            config.debounce_first = match v.as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "UPDATES_DEBOUNCE_FIRST",
                        value: v,
                    })
                }
            };
        }
        if let Some(v) = lookup("UPDATES_COMPONENTS") {
            let components: Vec<String> = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if components.is_empty() {
                return Err(ConfigError::Empty("UPDATES_COMPONENTS"));
            }
            config.components = components;
        }

        Ok(config)
    }

    /// The pub/sub topics to subscribe to.
    pub fn topics(&self) -> Vec<String> {
        self.components
            .iter()
            .map(|c| format!("updates:{c}"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |var| map.get(var).map(|v| v.to_string())
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = UpdaterConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.debounce, Duration::from_secs(1));
        assert!(config.debounce_first);
        assert_eq!(config.topics()[0], "updates:backend");
    }

    #[test]
    fn overrides_apply() {
        let map = HashMap::from([
            ("UPDATES_IDLE_TIMEOUT_SECONDS", "60"),
            ("UPDATES_DEBOUNCE_MS", "250"),
            ("UPDATES_DEBOUNCE_FIRST", "false"),
            ("UPDATES_COMPONENTS", "backend, jobs"),
        ]);
        let config = UpdaterConfig::from_lookup(lookup_from(&map)).unwrap();
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert!(!config.debounce_first);
        assert_eq!(config.topics(), vec!["updates:backend", "updates:jobs"]);
    }

    #[test]
    fn invalid_number_is_rejected() {
        let map = HashMap::from([("UPDATES_IDLE_TIMEOUT_SECONDS", "soon")]);
        let err = UpdaterConfig::from_lookup(lookup_from(&map)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "UPDATES_IDLE_TIMEOUT_SECONDS",
                ..
            }
        ));
    }
}
