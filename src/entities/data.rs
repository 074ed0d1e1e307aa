//! Entity snapshots as supplied by the entity source

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Investment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentStatus {
    Pending,
    Approved,
    Rejected,
    WithdrawalRequested,
    Withdrawn,
}

impl InvestmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentStatus::Pending => "pending",
            InvestmentStatus::Approved => "approved",
            InvestmentStatus::Rejected => "rejected",
            InvestmentStatus::WithdrawalRequested => "withdrawal_requested",
            InvestmentStatus::Withdrawn => "withdrawn",
        }
    }
}

/// Loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Pending,
    Approved,
    Rejected,
    Repaid,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Approved => "approved",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Repaid => "repaid",
        }
    }
}

/// Repayment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl RepaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepaymentStatus::Pending => "pending",
            RepaymentStatus::Approved => "approved",
            RepaymentStatus::Rejected => "rejected",
        }
    }
}

/// Withdrawal status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Paid,
    Completed,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Paid => "paid",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Rejected => "rejected",
        }
    }

    /// Pending or paid-but-unconfirmed
    pub fn is_in_flight(&self) -> bool {
        matches!(self, WithdrawalStatus::Pending | WithdrawalStatus::Paid)
    }
}

/// Fixed-term investment. The rate is derived from principal and duration, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub id: u64,
    pub investor_id: u64,

    /// Principal in currency units
    pub principal: f64,

    /// Term length, 1-12 months
    pub duration_months: u32,

    pub submitted_at: DateTime<Utc>,

    /// Set on transition to approved
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,

    pub status: InvestmentStatus,

    #[serde(default)]
    pub proof_of_payment: Option<String>,
}

impl Investment {
    /// Accrual starts at approval, or at submission for snapshots not yet approved
    pub fn term_start(&self) -> DateTime<Utc> {
        self.approved_at.unwrap_or(self.submitted_at)
    }
}

/// Loan application and, once approved, the loan itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: u64,
    pub investor_id: u64,
    pub principal: f64,
    pub status: LoanStatus,
    pub submitted_at: DateTime<Utc>,

    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,

    /// Assigned once at approval
    #[serde(default)]
    pub interest_rate: Option<f64>,

    /// Explicit due date; when absent, approval + grace period applies
    #[serde(default)]
    pub repayment_due_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub collateral: Option<String>,

    #[serde(default)]
    pub next_of_kin: Option<String>,

    #[serde(default)]
    pub signed_document: Option<String>,

    /// Opening date of the cycle an out-of-window application was queued for
    #[serde(default)]
    pub queued_for_cycle: Option<NaiveDate>,
}

/// Repayment against a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repayment {
    pub id: u64,
    pub loan_id: u64,
    pub investor_id: u64,
    pub amount_paid: f64,
    pub proof_of_payment: String,
    pub status: RepaymentStatus,
    pub submitted_at: DateTime<Utc>,
}

/// Withdrawal of a matured investment; the amount is frozen at request time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: u64,
    pub investment_id: u64,
    pub investor_id: u64,
    pub amount: f64,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,

    /// Attached on transition to paid
    #[serde(default)]
    pub proof_of_payment: Option<String>,

    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,

    /// Investor confirmation of receipt
    #[serde(default)]
    pub confirmed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_term_start_prefers_approval() {
        let submitted = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let approved = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
        let mut investment = Investment {
            id: 1,
            investor_id: 7,
            principal: 250.0,
            duration_months: 9,
            submitted_at: submitted,
            approved_at: None,
            status: InvestmentStatus::Pending,
            proof_of_payment: None,
        };

        assert_eq!(investment.term_start(), submitted);
        investment.approved_at = Some(approved);
        assert_eq!(investment.term_start(), approved);
    }

    #[test]
    fn test_status_strings_match_serde() {
        let json = serde_json::to_string(&InvestmentStatus::WithdrawalRequested).unwrap();
        assert_eq!(json, format!("\"{}\"", InvestmentStatus::WithdrawalRequested.as_str()));

        assert!(WithdrawalStatus::Paid.is_in_flight());
        assert!(!WithdrawalStatus::Completed.is_in_flight());
        assert!(!WithdrawalStatus::Rejected.is_in_flight());
    }
}
