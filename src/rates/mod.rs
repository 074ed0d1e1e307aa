//! Rate tables for investments and loans

mod tables;

pub use tables::{
    validate_duration, validate_principal, DurationBand, InvestmentRateTable, LoanRateTable,
    PrincipalBands, Tier, MAX_DURATION_MONTHS, MIN_DURATION_MONTHS,
};

use serde::{Deserialize, Serialize};

/// Container for both rate tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateTables {
    pub investment: InvestmentRateTable,
    pub loan: LoanRateTable,
}

impl RateTables {
    pub(crate) fn is_valid(&self) -> bool {
        self.investment.is_valid() && self.loan.is_valid()
    }
}
