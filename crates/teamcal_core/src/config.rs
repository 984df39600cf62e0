//! Runtime configuration for core services.
//!
//! # Responsibility
//! - Hold tunables that bound calendar work and pick navigation semantics.
//! - Read overrides from environment-style key lookups.
//!
//! # Invariants
//! - Defaults are usable without any environment present.
//! - Unparseable values are rejected, never silently ignored.

use crate::calendar::grid::NavigationPolicy;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Env key for the absence expansion guard (days, `0`/`unbounded` disables).
pub const ENV_MAX_ABSENCE_DAYS: &str = "TEAMCAL_MAX_ABSENCE_DAYS";
/// Env key for month navigation semantics (`rollover` | `same_year`).
pub const ENV_NAVIGATION: &str = "TEAMCAL_NAVIGATION";

/// Two years, leap day included.
pub const DEFAULT_MAX_ABSENCE_SPAN_DAYS: u32 = 732;

/// Core configuration shared by calendar and absence services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Longest absence (inclusive days) that may be stored or expanded.
    /// `None` disables the guard.
    pub max_absence_span_days: Option<u32>,
    pub navigation: NavigationPolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_absence_span_days: Some(DEFAULT_MAX_ABSENCE_SPAN_DAYS),
            navigation: NavigationPolicy::Rollover,
        }
    }
}

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid value `{}` for {}", self.value, self.key)
    }
}

impl Error for ConfigError {}

impl CoreConfig {
    /// Builds config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds config from an arbitrary key lookup; missing keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MAX_ABSENCE_DAYS) {
            config.max_absence_span_days = parse_span_limit(&raw).ok_or(ConfigError {
                key: ENV_MAX_ABSENCE_DAYS,
                value: raw.clone(),
            })?;
        }

        if let Some(raw) = lookup(ENV_NAVIGATION) {
            config.navigation = match raw.trim().to_ascii_lowercase().as_str() {
                "rollover" => NavigationPolicy::Rollover,
                "same_year" => NavigationPolicy::SameYear,
                _ => {
                    return Err(ConfigError {
                        key: ENV_NAVIGATION,
                        value: raw,
                    })
                }
            };
        }

        Ok(config)
    }
}

fn parse_span_limit(raw: &str) -> Option<Option<u32>> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("unbounded") {
        return Some(None);
    }
    match trimmed.parse::<u32>().ok()? {
        0 => Some(None),
        days => Some(Some(days)),
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, ENV_MAX_ABSENCE_DAYS, ENV_NAVIGATION};
    use crate::calendar::grid::NavigationPolicy;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_lookup_keeps_defaults() {
        let config = CoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CoreConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = CoreConfig::from_lookup(lookup(&[
            (ENV_MAX_ABSENCE_DAYS, "30"),
            (ENV_NAVIGATION, "SAME_YEAR"),
        ]))
        .unwrap();
        assert_eq!(config.max_absence_span_days, Some(30));
        assert_eq!(config.navigation, NavigationPolicy::SameYear);
    }

    #[test]
    fn zero_or_unbounded_disables_guard() {
        for raw in ["0", "unbounded"] {
            let config = CoreConfig::from_lookup(lookup(&[(ENV_MAX_ABSENCE_DAYS, raw)])).unwrap();
            assert_eq!(config.max_absence_span_days, None);
        }
    }

    #[test]
    fn garbage_values_are_rejected() {
        let err = CoreConfig::from_lookup(lookup(&[(ENV_MAX_ABSENCE_DAYS, "lots")])).unwrap_err();
        assert_eq!(err.key, ENV_MAX_ABSENCE_DAYS);
        assert!(CoreConfig::from_lookup(lookup(&[(ENV_NAVIGATION, "sideways")])).is_err());
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let config: CoreConfig = serde_json::from_str(r#"{"navigation":"same_year"}"#).unwrap();
        assert_eq!(config.navigation, NavigationPolicy::SameYear);
        assert_eq!(
            config.max_absence_span_days,
            CoreConfig::default().max_absence_span_days
        );
    }
}
