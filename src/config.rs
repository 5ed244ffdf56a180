//! Application-level configuration loading: refresh cadence and scoring rules.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

use crate::services::scoring::ScoringRules;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LIVE_POLL_BACK_CONFIG_PATH";
/// Reference resynchronization cadence for poll aggregators.
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(2);
/// Lower bound protecting the store from runaway refresh loops.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    refresh_interval: Duration,
    scoring: ScoringRules,
}

impl AppConfig {
    /// Load the configuration file, falling back to built-in defaults for anything
    /// missing or unreadable.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let Some(raw) = read_raw_config(&path) else {
            return Self::default();
        };
        let config = Self::from(raw);
        info!(
            path = %path.display(),
            refresh_ms = config.refresh_interval.as_millis(),
            max_points = config.scoring.max_points,
            "loaded configuration"
        );
        config
    }

    /// Override the refresh cadence (clamped to a sane minimum).
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval.max(MIN_REFRESH_INTERVAL);
        self
    }

    /// Cadence at which session aggregators resynchronize with the store.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Point award rules used by the scoring engine.
    pub fn scoring(&self) -> &ScoringRules {
        &self.scoring
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            scoring: ScoringRules::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    refresh_interval_ms: Option<u64>,
    #[serde(default)]
    scoring: Option<RawScoring>,
}

#[derive(Debug, Deserialize)]
struct RawScoring {
    max_points: Option<f64>,
    time_decay_per_second: Option<f64>,
    min_points: Option<f64>,
}

impl RawScoring {
    /// Fill gaps with defaults and repair values the award formula cannot use.
    fn into_rules(self) -> ScoringRules {
        let defaults = ScoringRules::default();
        let max_points = non_negative("max_points", self.max_points, defaults.max_points);
        let time_decay_per_second = non_negative(
            "time_decay_per_second",
            self.time_decay_per_second,
            defaults.time_decay_per_second,
        );
        let mut min_points = non_negative("min_points", self.min_points, defaults.min_points);
        if min_points > max_points {
            warn!(min_points, max_points, "min_points above max_points; capping to max_points");
            min_points = max_points;
        }
        ScoringRules {
            max_points,
            time_decay_per_second,
            min_points,
        }
    }
}

/// `value` when it is a finite, non-negative number, `default` otherwise.
fn non_negative(field: &'static str, value: Option<f64>, default: f64) -> f64 {
    match value {
        None => default,
        Some(value) if value.is_finite() && value >= 0.0 => value,
        Some(value) => {
            warn!(field, value, default, "invalid scoring value; using default");
            default
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let scoring = value
            .scoring
            .map(RawScoring::into_rules)
            .unwrap_or_default();

        let config = Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            scoring,
        };
        match value.refresh_interval_ms {
            Some(ms) => config.with_refresh_interval(Duration::from_millis(ms)),
            None => config,
        }
    }
}

/// Parse the file at `path`; `None` when it is absent or malformed.
fn read_raw_config(path: &Path) -> Option<RawConfig> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "no config file; using built-in defaults");
            return None;
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unreadable config file; using defaults");
            return None;
        }
    };
    serde_json::from_str(&contents)
        .inspect_err(|err| {
            warn!(path = %path.display(), error = %err, "malformed config file; using defaults");
        })
        .ok()
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"scoring": {"min_points": 5}}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.refresh_interval(), DEFAULT_REFRESH_INTERVAL);
        assert_eq!(config.scoring().min_points, 5.0);
        assert_eq!(config.scoring().max_points, 100.0);
    }

    #[test]
    fn invalid_scoring_values_are_repaired() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"scoring": {"max_points": 50, "time_decay_per_second": -3, "min_points": 80}}"#,
        )
        .unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.scoring().max_points, 50.0);
        assert_eq!(config.scoring().time_decay_per_second, 2.0);
        assert_eq!(config.scoring().min_points, 50.0);

        let raw: RawConfig =
            serde_json::from_str(r#"{"scoring": {"max_points": -1}}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.scoring().max_points, 100.0);
        assert_eq!(config.scoring().min_points, 10.0);
    }

    #[test]
    fn refresh_interval_is_clamped() {
        let raw: RawConfig = serde_json::from_str(r#"{"refresh_interval_ms": 1}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.refresh_interval(), MIN_REFRESH_INTERVAL);
    }
}
