//! Eligibility and accrual calculator
//!
//! Every function here is pure: "now" is always an argument and snapshots are
//! only read. [`Calculator`] binds the free functions to an [`EngineConfig`] so
//! every call site uses the same tables, window and grace period.

mod accrual;
mod dates;
mod eligibility;

pub use accrual::{
    accrued_value, expected_return, repayment_expected_amount, round_currency, sum_currency,
};
pub use dates::{
    elapsed_months, investment_maturity_date, loan_repayment_due_date, overdue_classification,
    reporting_window, start_of_day, DueBucket, DueStatus, SubmissionWindow,
    REPORTING_WINDOW_START_DAY,
};
pub use eligibility::{InvestmentOutlook, LoanApplicationDecision, LoanOutlook};

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::EngineConfig;
use crate::error::ValidationError;
use crate::rates::Tier;

/// Calculator bound to one configuration
#[derive(Debug, Clone, Default)]
pub struct Calculator {
    config: EngineConfig,
}

impl Calculator {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn investment_maturity_date(
        &self,
        submitted_at: DateTime<Utc>,
        duration_months: u32,
    ) -> Result<NaiveDate, ValidationError> {
        investment_maturity_date(submitted_at, duration_months)
    }

    pub fn investment_tier(&self, principal: f64) -> Result<Tier, ValidationError> {
        self.config.rates.investment.tier(principal)
    }

    pub fn investment_return_rate(
        &self,
        principal: f64,
        duration_months: u32,
    ) -> Result<f64, ValidationError> {
        self.config.rates.investment.rate(principal, duration_months)
    }

    pub fn expected_return(
        &self,
        principal: f64,
        rate_pct: f64,
        duration_months: u32,
    ) -> Result<f64, ValidationError> {
        expected_return(principal, rate_pct, duration_months, self.config.accrual)
    }

    pub fn earliest_withdrawal_date(&self, maturity: NaiveDate) -> NaiveDate {
        self.config.window.earliest_withdrawal_date(maturity)
    }

    pub fn loan_submission_window_open(&self, now: DateTime<Utc>) -> bool {
        self.config.window.is_open(now)
    }

    /// First date on or after `date` inside the submission window
    pub fn next_window_opening(&self, date: NaiveDate) -> NaiveDate {
        self.config.window.next_opening(date)
    }

    pub fn loan_tier(&self, principal: f64) -> Result<Tier, ValidationError> {
        self.config.rates.loan.tier(principal)
    }

    pub fn loan_interest_rate(&self, principal: f64) -> Result<f64, ValidationError> {
        self.config.rates.loan.rate(principal)
    }

    pub fn loan_repayment_due_date(
        &self,
        approved_at: Option<DateTime<Utc>>,
        explicit_due_date: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>, ValidationError> {
        loan_repayment_due_date(approved_at, explicit_due_date, self.config.loan_grace_days)
    }

    pub fn overdue_classification(&self, due_date: DateTime<Utc>, now: DateTime<Utc>) -> DueStatus {
        overdue_classification(due_date, now, self.config.urgency_horizon_days)
    }

    pub fn repayment_expected_amount(
        &self,
        principal: f64,
        interest_rate_pct: f64,
    ) -> Result<f64, ValidationError> {
        repayment_expected_amount(principal, interest_rate_pct)
    }
}
