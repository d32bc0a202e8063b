//! # Runtime Configuration
//!
//! Tunables for conversion precision, the expiry warning horizon, and the
//! pricing consistency tolerance. Loaded from YAML with per-key defaults,
//! then overridden from the environment:
//!
//! | Key | Env override | Default |
//! |-----|--------------|---------|
//! | `decimal_precision` | `PHARMSTOCK_DECIMAL_PRECISION` | 3 |
//! | `expiry_horizon_days` | `PHARMSTOCK_EXPIRY_HORIZON_DAYS` | 90 |
//! | `cost_tolerance` | `PHARMSTOCK_COST_TOLERANCE` | 0.01 |
//!
//! Core operations never read this struct implicitly; callers pass the
//! individual values as parameters.

use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::quantity::{Precision, DEFAULT_PRECISION, MAX_PRECISION};

/// Default expiry warning horizon in days.
pub const DEFAULT_EXPIRY_HORIZON_DAYS: u32 = 90;

/// Environment variable overriding `decimal_precision`.
pub const ENV_DECIMAL_PRECISION: &str = "PHARMSTOCK_DECIMAL_PRECISION";
/// Environment variable overriding `expiry_horizon_days`.
pub const ENV_EXPIRY_HORIZON_DAYS: &str = "PHARMSTOCK_EXPIRY_HORIZON_DAYS";
/// Environment variable overriding `cost_tolerance`.
pub const ENV_COST_TOLERANCE: &str = "PHARMSTOCK_COST_TOLERANCE";

/// Subsystem configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PharmaConfig {
    /// Fractional digits allowed in a converted quantity.
    pub decimal_precision: u32,
    /// Days ahead within which a batch is flagged `warning`.
    pub expiry_horizon_days: u32,
    /// Maximum difference in cost-per-base-unit between packaging levels
    /// before a pricing warning is raised.
    pub cost_tolerance: Decimal,
}

impl Default for PharmaConfig {
    fn default() -> Self {
        Self {
            decimal_precision: DEFAULT_PRECISION,
            expiry_horizon_days: DEFAULT_EXPIRY_HORIZON_DAYS,
            cost_tolerance: Decimal::new(1, 2),
        }
    }
}

impl PharmaConfig {
    /// Parse a config from a YAML string. Missing keys take defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml_str(&raw)?;
        tracing::debug!(path = %path.display(), ?config, "loaded config file");
        Ok(config)
    }

    /// Load from an optional file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        base.with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from a variable lookup. Split out from [`load`](Self::load)
    /// so tests can inject values without touching the process environment.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_DECIMAL_PRECISION) {
            self.decimal_precision = parse_env(ENV_DECIMAL_PRECISION, &v)?;
        }
        if let Some(v) = lookup(ENV_EXPIRY_HORIZON_DAYS) {
            self.expiry_horizon_days = parse_env(ENV_EXPIRY_HORIZON_DAYS, &v)?;
        }
        if let Some(v) = lookup(ENV_COST_TOLERANCE) {
            self.cost_tolerance = parse_env(ENV_COST_TOLERANCE, &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decimal_precision > MAX_PRECISION {
            return Err(ConfigError::OutOfRange {
                key: "decimal_precision",
                reason: format!("{} exceeds maximum {MAX_PRECISION}", self.decimal_precision),
            });
        }
        if self.cost_tolerance.is_sign_negative() {
            return Err(ConfigError::OutOfRange {
                key: "cost_tolerance",
                reason: format!("{} is negative", self.cost_tolerance),
            });
        }
        Ok(())
    }

    /// Conversion precision as a typed value.
    pub fn precision(&self) -> Precision {
        Precision::new(self.decimal_precision)
    }
}

fn parse_env<T: FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let c = PharmaConfig::default();
        assert_eq!(c.decimal_precision, 3);
        assert_eq!(c.expiry_horizon_days, 90);
        assert_eq!(c.cost_tolerance, "0.01".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let c = PharmaConfig::from_yaml_str("expiry_horizon_days: 120\n").unwrap();
        assert_eq!(c.expiry_horizon_days, 120);
        assert_eq!(c.decimal_precision, 3);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(PharmaConfig::from_yaml_str("").unwrap(), PharmaConfig::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(PharmaConfig::from_yaml_str("horizon: 5\n").is_err());
    }

    #[test]
    fn test_precision_out_of_range() {
        let err = PharmaConfig::from_yaml_str("decimal_precision: 11\n").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { key: "decimal_precision", .. }));
    }

    #[test]
    fn test_env_overrides() {
        let c = PharmaConfig::default()
            .with_overrides(|var| match var {
                ENV_EXPIRY_HORIZON_DAYS => Some("60".into()),
                ENV_COST_TOLERANCE => Some("0.05".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(c.expiry_horizon_days, 60);
        assert_eq!(c.cost_tolerance, "0.05".parse::<Decimal>().unwrap());
        assert_eq!(c.decimal_precision, 3);
    }

    #[test]
    fn test_env_override_invalid() {
        let err = PharmaConfig::default()
            .with_overrides(|var| (var == ENV_DECIMAL_PRECISION).then(|| "three".into()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: ENV_DECIMAL_PRECISION, .. }));
    }

    #[test]
    fn test_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "decimal_precision: 2\ncost_tolerance: \"0.5\"").unwrap();
        let c = PharmaConfig::from_file(f.path()).unwrap();
        assert_eq!(c.precision().digits(), 2);
        assert_eq!(c.cost_tolerance, "0.5".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_from_missing_file() {
        let err = PharmaConfig::from_file(Path::new("/nonexistent/pharmstock.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
