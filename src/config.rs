//! Engine and session configuration
//!
//! Defaults hold the business constants; a JSON file can override any subset:
//!
//! ```json
//! { "loan_grace_days": 45, "session": { "renewal_interval_secs": 900 } }
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::calculator::SubmissionWindow;
use crate::rates::RateTables;

/// Days after approval before repayment is due when no explicit date is set
pub const DEFAULT_LOAN_GRACE_DAYS: i64 = 30;

/// Days before the due date at which a loan is flagged as upcoming
pub const DEFAULT_URGENCY_HORIZON_DAYS: i64 = 5;

/// Renewal interval and idle timeout (one value serves both)
pub const DEFAULT_RENEWAL_INTERVAL_SECS: u64 = 10 * 60;

pub const DEFAULT_RENEWAL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How an investment's return accrues over its term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccrualMethod {
    /// principal x (1 + rate)^months
    #[default]
    Compound,
    /// principal x (1 + rate), regardless of term
    SinglePeriod,
}

impl AccrualMethod {
    /// Unrounded accrued value, or `None` on overflow
    pub fn accrue(&self, principal: Decimal, rate_pct: Decimal, months: u32) -> Option<Decimal> {
        let factor = Decimal::ONE + rate_pct / Decimal::ONE_HUNDRED;
        match self {
            AccrualMethod::Compound => {
                (0..months).try_fold(principal, |acc, _| acc.checked_mul(factor))
            }
            AccrualMethod::SinglePeriod => principal.checked_mul(factor),
        }
    }
}

/// Session timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Timer period, also the idle timeout
    pub renewal_interval_secs: u64,

    /// Upper bound on a single renewal call; exceeding it ends the session
    pub renewal_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            renewal_interval_secs: DEFAULT_RENEWAL_INTERVAL_SECS,
            renewal_timeout_secs: DEFAULT_RENEWAL_TIMEOUT_SECS,
        }
    }
}

impl SessionConfig {
    pub fn renewal_interval(&self) -> Duration {
        Duration::from_secs(self.renewal_interval_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        self.renewal_interval()
    }

    pub fn renewal_timeout(&self) -> Duration {
        Duration::from_secs(self.renewal_timeout_secs)
    }
}

/// Configuration for the calculator and lifecycle rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rates: RateTables,

    /// Recurring monthly window for loan applications and withdrawal requests
    pub window: SubmissionWindow,

    pub loan_grace_days: i64,

    pub urgency_horizon_days: i64,

    pub accrual: AccrualMethod,

    pub session: SessionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rates: RateTables::default(),
            window: SubmissionWindow::default(),
            loan_grace_days: DEFAULT_LOAN_GRACE_DAYS,
            urgency_horizon_days: DEFAULT_URGENCY_HORIZON_DAYS,
            accrual: AccrualMethod::default(),
            session: SessionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON config file
    pub fn from_json_path(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rates.is_valid() {
            return Err(ConfigError::Invalid(
                "rate bands must be positive and ascending, rates non-negative".into(),
            ));
        }
        if !self.window.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "window must open on a day after it closes, got {}..{}",
                self.window.opens_day, self.window.closes_day
            )));
        }
        if self.loan_grace_days <= 0 {
            return Err(ConfigError::Invalid("loan_grace_days must be positive".into()));
        }
        if self.urgency_horizon_days < 0 {
            return Err(ConfigError::Invalid("urgency_horizon_days must not be negative".into()));
        }
        if self.session.renewal_interval_secs == 0 || self.session.renewal_timeout_secs == 0 {
            return Err(ConfigError::Invalid("session timings must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_business_constants() {
        let config = EngineConfig::default();

        assert_eq!(config.loan_grace_days, 30);
        assert_eq!(config.urgency_horizon_days, 5);
        assert_eq!(config.window.opens_day, 28);
        assert_eq!(config.window.closes_day, 8);
        assert_eq!(config.session.idle_timeout(), Duration::from_secs(600));
        assert_eq!(config.session.renewal_interval(), config.session.idle_timeout());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = EngineConfig::from_json_str(
            r#"{ "loan_grace_days": 45, "accrual": "single_period", "session": { "renewal_interval_secs": 900 } }"#,
        )
        .unwrap();

        assert_eq!(config.loan_grace_days, 45);
        assert_eq!(config.accrual, AccrualMethod::SinglePeriod);
        assert_eq!(config.session.renewal_interval_secs, 900);
        assert_eq!(config.session.renewal_timeout_secs, DEFAULT_RENEWAL_TIMEOUT_SECS);
        assert_eq!(config.rates, RateTables::default());
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "loan_grace_days": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "window": { "opens_day": 5, "closes_day": 8 } }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_accrual_methods() {
        let principal = Decimal::new(100, 0);
        let rate = Decimal::new(10, 0);

        assert_eq!(AccrualMethod::Compound.accrue(principal, rate, 2), Some(Decimal::new(121, 0)));
        assert_eq!(
            AccrualMethod::SinglePeriod.accrue(principal, rate, 2),
            Some(Decimal::new(110, 0))
        );
        assert_eq!(AccrualMethod::Compound.accrue(Decimal::MAX, rate, 1), None);
    }
}
