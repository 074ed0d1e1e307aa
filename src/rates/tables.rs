//! Principal tiers, duration bands and the investment/loan rate tables

use serde::{Deserialize, Serialize};

use crate::error::{Field, ValidationError};

/// Shortest and longest investment term in months
pub const MIN_DURATION_MONTHS: u32 = 1;
pub const MAX_DURATION_MONTHS: u32 = 12;

/// Principal tier used to select a rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Small,
    Medium,
    Large,
}

impl Tier {
    fn index(&self) -> usize {
        match self {
            Tier::Small => 0,
            Tier::Medium => 1,
            Tier::Large => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Small => "small",
            Tier::Medium => "medium",
            Tier::Large => "large",
        }
    }
}

/// Investment term band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationBand {
    /// 1-3 months
    Short,
    /// 4-6 months
    Mid,
    /// 7-12 months
    Long,
}

impl DurationBand {
    /// Determine band from term length
    pub fn from_months(duration_months: u32) -> Result<Self, ValidationError> {
        validate_duration(duration_months)?;
        Ok(match duration_months {
            1..=3 => DurationBand::Short,
            4..=6 => DurationBand::Mid,
            _ => DurationBand::Long,
        })
    }

    fn index(&self) -> usize {
        match self {
            DurationBand::Short => 0,
            DurationBand::Mid => 1,
            DurationBand::Long => 2,
        }
    }
}

/// Reject terms outside 1-12 months
pub fn validate_duration(duration_months: u32) -> Result<(), ValidationError> {
    if (MIN_DURATION_MONTHS..=MAX_DURATION_MONTHS).contains(&duration_months) {
        Ok(())
    } else {
        Err(ValidationError::new(
            Field::DurationMonths,
            format!(
                "{} is outside {}-{} months",
                duration_months, MIN_DURATION_MONTHS, MAX_DURATION_MONTHS
            ),
        ))
    }
}

/// Reject zero, negative and non-finite money amounts
pub fn validate_principal(principal: f64) -> Result<(), ValidationError> {
    if principal.is_finite() && principal > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::new(
            Field::Principal,
            format!("{} must be a positive amount", principal),
        ))
    }
}

/// Principal thresholds, each inclusive on its lower bound
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrincipalBands {
    /// Smallest principal accepted at all
    pub minimum: f64,
    pub medium_from: f64,
    pub large_from: f64,
}

impl PrincipalBands {
    /// Classify a principal into its tier
    pub fn classify(&self, principal: f64) -> Result<Tier, ValidationError> {
        validate_principal(principal)?;
        if principal < self.minimum {
            return Err(ValidationError::new(
                Field::Principal,
                format!("{:.2} is below the minimum of {:.2}", principal, self.minimum),
            ));
        }

        Ok(if principal < self.medium_from {
            Tier::Small
        } else if principal < self.large_from {
            Tier::Medium
        } else {
            Tier::Large
        })
    }

    fn is_ordered(&self) -> bool {
        self.minimum > 0.0 && self.minimum < self.medium_from && self.medium_from < self.large_from
    }
}

/// Investment return rate (% per period) by tier x duration band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentRateTable {
    pub bands: PrincipalBands,
    /// Rows: small/medium/large; columns: 1-3, 4-6, 7-12 months
    pub rates: [[f64; 3]; 3],
}

impl Default for InvestmentRateTable {
    fn default() -> Self {
        Self {
            bands: PrincipalBands {
                minimum: 28.0,
                medium_from: 100.0,
                large_from: 200.0,
            },
            rates: [
                [8.0, 10.0, 12.0],  // Small
                [10.0, 12.0, 13.0], // Medium
                [12.0, 14.0, 15.0], // Large
            ],
        }
    }
}

impl InvestmentRateTable {
    pub fn tier(&self, principal: f64) -> Result<Tier, ValidationError> {
        self.bands.classify(principal)
    }

    /// Rate for a principal and term
    pub fn rate(&self, principal: f64, duration_months: u32) -> Result<f64, ValidationError> {
        let tier = self.tier(principal)?;
        let band = DurationBand::from_months(duration_months)?;
        Ok(self.rates[tier.index()][band.index()])
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.bands.is_ordered()
            && self.rates.iter().flatten().all(|r| r.is_finite() && *r >= 0.0)
    }
}

/// Loan interest rate (% flat) by tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRateTable {
    pub bands: PrincipalBands,
    /// Small, medium, large
    pub rates: [f64; 3],
}

impl Default for LoanRateTable {
    fn default() -> Self {
        Self {
            bands: PrincipalBands {
                minimum: 28.0,
                medium_from: 100.0,
                large_from: 350.0,
            },
            rates: [25.0, 20.0, 17.0],
        }
    }
}

impl LoanRateTable {
    pub fn tier(&self, principal: f64) -> Result<Tier, ValidationError> {
        self.bands.classify(principal)
    }

    pub fn rate(&self, principal: f64) -> Result<f64, ValidationError> {
        let tier = self.tier(principal)?;
        Ok(self.rates[tier.index()])
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.bands.is_ordered() && self.rates.iter().all(|r| r.is_finite() && *r >= 0.0)
    }
}
