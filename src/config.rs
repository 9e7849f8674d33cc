//! Configuration management module
//!
//! Loads and validates environment-based configuration. Every setting has a
//! default so the service starts with an empty environment.

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::ranges::{ClinicalTargets, GlucoseRanges};
use crate::state::RETENTION_DAYS;

/// Configuration errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid value {value:?} for environment variable {key}")]
    ParseError { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Time-in-Range analytics settings, shared read-only with every handler
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsSettings {
    /// Band cut points (fixed clinical convention)
    pub ranges: GlucoseRanges,
    pub targets: ClinicalTargets,
    /// Report window when the request has no `days` parameter
    pub default_days: i64,
    /// Largest accepted report window
    pub max_days: i64,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            ranges: GlucoseRanges::STANDARD,
            targets: ClinicalTargets::default(),
            default_days: 14,
            max_days: 90,
        }
    }
}

/// Simulated CGM feed settings
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorSettings {
    pub enabled: bool,
    /// User that owns the simulated readings
    pub user_id: String,
    /// Interval in milliseconds between live readings
    pub interval_ms: u64,
    /// Days of history generated at startup
    pub backfill_days: i64,
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub analytics: AnalyticsSettings,
    pub simulator: SimulatorSettings,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ClinicalTargets::default();

        let targets = ClinicalTargets {
            target_min_percent: parse_or(&lookup, "TIR_TARGET_MIN_PERCENT", defaults.target_min_percent)?,
            below_range_max_percent: parse_or(
                &lookup,
                "TIR_BELOW_RANGE_MAX_PERCENT",
                defaults.below_range_max_percent,
            )?,
            very_low_max_percent: parse_or(&lookup, "TIR_VERY_LOW_MAX_PERCENT", defaults.very_low_max_percent)?,
            above_range_max_percent: parse_or(
                &lookup,
                "TIR_ABOVE_RANGE_MAX_PERCENT",
                defaults.above_range_max_percent,
            )?,
            very_high_max_percent: parse_or(
                &lookup,
                "TIR_VERY_HIGH_MAX_PERCENT",
                defaults.very_high_max_percent,
            )?,
            cv_max_percent: parse_or(&lookup, "TIR_CV_MAX_PERCENT", defaults.cv_max_percent)?,
            min_readings: parse_or(&lookup, "TIR_MIN_READINGS", defaults.min_readings)?,
        };

        let settings = Self {
            server: ServerSettings {
                host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
                port: parse_or(&lookup, "SERVER_PORT", 8080)?,
            },
            analytics: AnalyticsSettings {
                ranges: GlucoseRanges::STANDARD,
                targets,
                default_days: parse_or(&lookup, "TIR_DEFAULT_DAYS", 14)?,
                max_days: parse_or(&lookup, "TIR_MAX_DAYS", 90)?,
            },
            simulator: SimulatorSettings {
                enabled: parse_or(&lookup, "SIMULATOR_ENABLED", true)?,
                user_id: lookup("SIMULATOR_USER_ID").unwrap_or_else(|| "demo-user".into()),
                interval_ms: parse_or(&lookup, "SIMULATOR_INTERVAL_MS", 300_000)?,
                backfill_days: parse_or(&lookup, "SIMULATOR_BACKFILL_DAYS", 14)?,
            },
        };

        settings.check()?;
        Ok(settings)
    }

    fn check(&self) -> Result<(), SettingsError> {
        let analytics = &self.analytics;
        if analytics.max_days < 1 || analytics.max_days > RETENTION_DAYS {
            return Err(SettingsError::Invalid(format!(
                "TIR_MAX_DAYS must be between 1 and {}",
                RETENTION_DAYS
            )));
        }
        if analytics.default_days < 1 || analytics.default_days > analytics.max_days {
            return Err(SettingsError::Invalid(format!(
                "TIR_DEFAULT_DAYS must be between 1 and {}",
                analytics.max_days
            )));
        }
        if self.simulator.interval_ms == 0 {
            return Err(SettingsError::Invalid(
                "SIMULATOR_INTERVAL_MS must be greater than 0".into(),
            ));
        }
        if self.simulator.backfill_days < 0 {
            return Err(SettingsError::Invalid(
                "SIMULATOR_BACKFILL_DAYS must not be negative".into(),
            ));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, SettingsError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| SettingsError::ParseError {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}
