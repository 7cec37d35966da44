//! Server settings
//!
//! Loaded from an optional JSON file, then individual environment overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;
use crate::sim::{Variant, VariantPreset};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    // === Timing ===
    /// Fixed tick interval
    pub tick_interval_ms: u64,
    /// Delay between game end and room teardown
    pub end_grace_ms: u64,
    /// Empty rooms are dropped after this long
    pub empty_room_timeout_ms: u64,

    // === Rooms ===
    /// Rules for rooms created without an explicit config
    pub variant: VariantPreset,
    /// Overrides the preset's winning score (0 = no limit)
    pub winning_score: Option<u32>,
    /// Base seed mixed into every room's tint RNG
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_interval_ms: TICK_INTERVAL_MS,
            end_grace_ms: END_GRACE_MS,
            empty_room_timeout_ms: EMPTY_ROOM_TIMEOUT_MS,
            variant: VariantPreset::default(),
            winning_score: None,
            seed: 0,
        }
    }
}

impl Settings {
    /// Path of the JSON settings file
    pub const PATH_VAR: &'static str = "BRICK_RALLY_SETTINGS";
    pub const TICK_VAR: &'static str = "BRICK_RALLY_TICK_MS";
    pub const VARIANT_VAR: &'static str = "BRICK_RALLY_VARIANT";

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings: Self = serde_json::from_str(&json)?;
        settings.validate()?;
        log::info!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Settings file named by the environment (if any) plus env overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = match std::env::var(Self::PATH_VAR) {
            Ok(path) => Self::load_from(path)?,
            Err(_) => {
                log::info!("Using default settings");
                Self::default()
            }
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply overrides looked up by variable name
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(Self::TICK_VAR) {
            self.tick_interval_ms = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: Self::TICK_VAR,
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup(Self::VARIANT_VAR) {
            self.variant = VariantPreset::parse(&value).ok_or(ConfigError::InvalidValue {
                key: Self::VARIANT_VAR,
                value: value.clone(),
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "tickIntervalMs",
                value: "0".into(),
            });
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Simulation step in seconds
    pub fn tick_dt(&self) -> f32 {
        self.tick_interval_ms as f32 / 1000.0
    }

    pub fn end_grace(&self) -> Duration {
        Duration::from_millis(self.end_grace_ms)
    }

    pub fn empty_room_timeout(&self) -> Duration {
        Duration::from_millis(self.empty_room_timeout_ms)
    }

    /// Rules for rooms created without an explicit config
    pub fn default_variant(&self) -> Variant {
        let variant = self.variant.variant();
        match self.winning_score {
            Some(score) => variant.with_winning_score(Some(score)),
            None => variant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.tick_interval(), Duration::from_millis(50));
        assert_eq!(settings.end_grace(), Duration::from_secs(10));
        assert!((settings.tick_dt() - 0.05).abs() < 1e-6);
        assert_eq!(settings.default_variant(), VariantPreset::Handoff.variant());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"variant":"duel","winningScore":3}"#).unwrap();
        assert_eq!(settings.tick_interval_ms, TICK_INTERVAL_MS);
        let variant = settings.default_variant();
        assert_eq!(variant.preset, VariantPreset::Duel);
        assert_eq!(variant.winning_score, Some(3));
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(lookup(&[
                (Settings::TICK_VAR, " 20 "),
                (Settings::VARIANT_VAR, "Solo"),
            ]))
            .unwrap();
        assert_eq!(settings.tick_interval_ms, 20);
        assert_eq!(settings.variant, VariantPreset::Solo);
    }

    #[test]
    fn test_invalid_overrides() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(lookup(&[(Settings::TICK_VAR, "fast")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key, .. } if key == Settings::TICK_VAR
        ));

        assert!(
            settings
                .apply_overrides(lookup(&[(Settings::VARIANT_VAR, "chess")]))
                .is_err()
        );
        assert!(
            settings
                .apply_overrides(lookup(&[(Settings::TICK_VAR, "0")]))
                .is_err()
        );
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = Settings::load_from("/nonexistent/brick-rally.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
