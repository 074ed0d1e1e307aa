//! Error taxonomy shared by the calculator, lifecycle transitions and session manager
//!
//! - [`ValidationError`]: malformed or out-of-domain financial input
//! - [`EligibilityError`]: a well-formed operation attempted outside its allowed window/state
//! - [`AuthExpired`]: the session is gone and the caller must re-authenticate

use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

use crate::session::Role;

/// Input field that failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Principal,
    DurationMonths,
    Rate,
    SubmittedAt,
    ApprovedAt,
    DueDate,
    Amount,
    ProofOfPayment,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Principal => "principal",
            Field::DurationMonths => "duration_months",
            Field::Rate => "rate",
            Field::SubmittedAt => "submitted_at",
            Field::ApprovedAt => "approved_at",
            Field::DueDate => "due_date",
            Field::Amount => "amount",
            Field::ProofOfPayment => "proof_of_payment",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Malformed or out-of-domain financial input. Never defaulted away.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: Field,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: Field, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(field: Field) -> Self {
        Self::new(field, "required value is missing")
    }
}

/// Reason an otherwise valid operation was refused
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EligibilityError {
    #[error("submission window is closed until {opens_on}")]
    OutsideSubmissionWindow { opens_on: NaiveDate },

    #[error("not eligible for withdrawal before {earliest}")]
    NotYetMatured { earliest: NaiveDate },

    #[error("{entity} is {actual}, expected {expected}")]
    InvalidStatus {
        entity: &'static str,
        actual: &'static str,
        expected: &'static str,
    },

    #[error("a withdrawal is already in flight for investment {investment_id}")]
    WithdrawalInFlight { investment_id: u64 },

    #[error("{entity} {id} does not belong to investor {investor_id}")]
    NotOwner {
        entity: &'static str,
        id: u64,
        investor_id: u64,
    },

    #[error("{entity} refers to {actual}, not {expected}")]
    EntityMismatch {
        entity: &'static str,
        expected: u64,
        actual: u64,
    },
}

impl EligibilityError {
    /// Stable machine-readable reason code
    pub fn code(&self) -> &'static str {
        match self {
            EligibilityError::OutsideSubmissionWindow { .. } => "outside_submission_window",
            EligibilityError::NotYetMatured { .. } => "not_yet_matured",
            EligibilityError::InvalidStatus { .. } => "invalid_status",
            EligibilityError::WithdrawalInFlight { .. } => "withdrawal_in_flight",
            EligibilityError::NotOwner { .. } => "not_owner",
            EligibilityError::EntityMismatch { .. } => "entity_mismatch",
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    NeverAuthenticated,
    IdleTimeout,
    RenewalFailed,
    LoggedOut,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EndReason::NeverAuthenticated => "no credential held",
            EndReason::IdleTimeout => "idle timeout elapsed",
            EndReason::RenewalFailed => "credential renewal failed",
            EndReason::LoggedOut => "logged out",
        };
        f.write_str(s)
    }
}

/// Session is gone; redirect to re-authentication rather than showing a generic error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session expired: {reason}")]
pub struct AuthExpired {
    pub reason: EndReason,
}

/// Umbrella error for operations that touch more than one concern
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Eligibility(#[from] EligibilityError),

    #[error(transparent)]
    AuthExpired(#[from] AuthExpired),

    #[error("{required} role required")]
    Forbidden { required: Role },
}

impl EngineError {
    /// True when the caller should send the user back to the login screen
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, EngineError::AuthExpired(_))
    }
}
