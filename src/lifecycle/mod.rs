//! Approval-flow transitions for investments, withdrawals, loans and repayments
//!
//! Each transition takes the acting user's verified [`Claims`], checks the
//! role and ownership it needs, validates the entity's current status and
//! mutates the snapshot in place. Nothing here is persisted; the caller hands
//! the updated snapshot back to the entity source.
//!
//! Every successful transition writes one [`AuditEntry`] to the
//! [`AuditSink`] the caller passes in. Refused transitions write nothing.

mod audit;
mod investment;
mod loan;

pub use audit::{AuditAction, AuditEntity, AuditEntry, AuditSink};
pub use investment::{
    approve_investment, confirm_withdrawal, pay_withdrawal, reapprove_investment,
    reject_investment, reject_withdrawal, request_withdrawal, submit_investment,
    InvestmentSubmission,
};
pub use loan::{
    approve_loan, approve_repayment, reject_loan, reject_repayment, submit_loan,
    submit_repayment, LoanApplication,
};

use crate::entities::{InvestmentStatus, LoanStatus, RepaymentStatus, WithdrawalStatus};
use crate::error::{EligibilityError, EngineError};
use crate::session::Claims;

/// Status enums that can be named in an error
trait StatusName: Copy + PartialEq {
    fn name(&self) -> &'static str;
}

impl StatusName for InvestmentStatus {
    fn name(&self) -> &'static str {
        self.as_str()
    }
}

impl StatusName for LoanStatus {
    fn name(&self) -> &'static str {
        self.as_str()
    }
}

impl StatusName for RepaymentStatus {
    fn name(&self) -> &'static str {
        self.as_str()
    }
}

impl StatusName for WithdrawalStatus {
    fn name(&self) -> &'static str {
        self.as_str()
    }
}

fn require_status<S: StatusName>(
    entity: &'static str,
    actual: S,
    expected: S,
) -> Result<(), EngineError> {
    if actual == expected {
        Ok(())
    } else {
        Err(EligibilityError::InvalidStatus {
            entity,
            actual: actual.name(),
            expected: expected.name(),
        }
        .into())
    }
}

fn require_owner(
    entity: &'static str,
    id: u64,
    owner: u64,
    actor: &Claims,
) -> Result<(), EngineError> {
    if actor.subject == owner {
        Ok(())
    } else {
        Err(EligibilityError::NotOwner {
            entity,
            id,
            investor_id: actor.subject,
        }
        .into())
    }
}

fn require_same(entity: &'static str, expected: u64, actual: u64) -> Result<(), EngineError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EligibilityError::EntityMismatch {
            entity,
            expected,
            actual,
        }
        .into())
    }
}
