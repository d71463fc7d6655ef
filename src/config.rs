use std::{env, str::FromStr};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    /// SQLite database at `DATABASE_URL`.
    Live,
    /// Seeded in-memory data, discarded on exit.
    Demo,
}

impl FromStr for DataMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(DataMode::Live),
            "demo" => Ok(DataMode::Demo),
            other => Err(AppError::ConfigError(format!(
                "DATA_MODE must be 'live' or 'demo', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub port: u16,
    pub data_mode: DataMode,
    pub standard_assessment: Decimal,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| AppError::ConfigError(format!("PORT '{}': {}", raw, e)))?,
            None => 8080,
        };
        let data_mode = match lookup("DATA_MODE") {
            Some(raw) => raw.parse()?,
            None => DataMode::Live,
        };
        let standard_assessment = match lookup("STANDARD_ASSESSMENT") {
            Some(raw) => Decimal::from_str(raw.trim()).map_err(|e| {
                AppError::ConfigError(format!("STANDARD_ASSESSMENT '{}': {}", raw, e))
            })?,
            None => dec!(2500),
        };
        if standard_assessment.is_sign_negative() {
            return Err(AppError::ConfigError(
                "STANDARD_ASSESSMENT cannot be negative".into(),
            ));
        }

        Ok(Config {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://society_ledger.db".to_owned()),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port,
            data_mode,
            standard_assessment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.database_url, "sqlite://society_ledger.db");
        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.data_mode, DataMode::Live);
        assert_eq!(config.standard_assessment, dec!(2500));
    }

    #[test]
    fn values_are_read_from_the_environment() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("DATA_MODE", "Demo"),
            ("STANDARD_ASSESSMENT", "3100.50"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.data_mode, DataMode::Demo);
        assert_eq!(config.standard_assessment, dec!(3100.50));
    }

    #[test]
    fn bad_values_are_config_errors() {
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("PORT", "eighty")])),
            Err(AppError::ConfigError(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("DATA_MODE", "staging")])),
            Err(AppError::ConfigError(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("STANDARD_ASSESSMENT", "-1")])),
            Err(AppError::ConfigError(_))
        ));
    }
}
