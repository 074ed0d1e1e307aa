//! Investment and withdrawal transitions

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use super::audit::{emit, AuditAction, AuditEntity, AuditEntry, AuditSink};
use super::{require_owner, require_same, require_status};
use crate::calculator::Calculator;
use crate::entities::{Investment, InvestmentStatus, Withdrawal, WithdrawalStatus};
use crate::error::{EngineError, Field, ValidationError};
use crate::session::{Claims, Role};

/// What an investor submits to open an investment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentSubmission {
    pub principal: f64,
    pub duration_months: u32,
    #[serde(default)]
    pub proof_of_payment: Option<String>,
}

/// Create a pending investment. Returns it with the rate it will earn.
pub fn submit_investment(
    calc: &Calculator,
    actor: &Claims,
    id: u64,
    submission: InvestmentSubmission,
    now: DateTime<Utc>,
    audit: &mut dyn AuditSink,
) -> Result<(Investment, f64), EngineError> {
    actor.require_role(Role::Investor)?;
    let rate = calc.investment_return_rate(submission.principal, submission.duration_months)?;

    let investment = Investment {
        id,
        investor_id: actor.subject,
        principal: submission.principal,
        duration_months: submission.duration_months,
        submitted_at: now,
        approved_at: None,
        status: InvestmentStatus::Pending,
        proof_of_payment: submission.proof_of_payment,
    };
    let entry = AuditEntry::new(actor, AuditAction::Submitted, AuditEntity::Investment, id, now);
    let details = format!(
        "{:.2} for {} months at {}%",
        investment.principal, investment.duration_months, rate
    );
    emit(audit, entry.with_details(details));
    Ok((investment, rate))
}

/// pending -> approved; the term starts now
pub fn approve_investment(
    actor: &Claims,
    investment: &mut Investment,
    now: DateTime<Utc>,
    audit: &mut dyn AuditSink,
) -> Result<(), EngineError> {
    actor.require_role(Role::Admin)?;
    require_status("investment", investment.status, InvestmentStatus::Pending)?;

    investment.status = InvestmentStatus::Approved;
    investment.approved_at = Some(now);
    emit(
        audit,
        AuditEntry::new(actor, AuditAction::Approved, AuditEntity::Investment, investment.id, now),
    );
    Ok(())
}

/// pending -> rejected
pub fn reject_investment(
    actor: &Claims,
    investment: &mut Investment,
    now: DateTime<Utc>,
    audit: &mut dyn AuditSink,
) -> Result<(), EngineError> {
    actor.require_role(Role::Admin)?;
    require_status("investment", investment.status, InvestmentStatus::Pending)?;

    investment.status = InvestmentStatus::Rejected;
    emit(
        audit,
        AuditEntry::new(actor, AuditAction::Rejected, AuditEntity::Investment, investment.id, now),
    );
    Ok(())
}

/// rejected -> approved, for a rejection made in error
pub fn reapprove_investment(
    actor: &Claims,
    investment: &mut Investment,
    now: DateTime<Utc>,
    audit: &mut dyn AuditSink,
) -> Result<(), EngineError> {
    actor.require_role(Role::Admin)?;
    require_status("investment", investment.status, InvestmentStatus::Rejected)?;

    investment.status = InvestmentStatus::Approved;
    investment.approved_at = Some(now);
    let entry = AuditEntry::new(
        actor,
        AuditAction::Reapproved,
        AuditEntity::Investment,
        investment.id,
        now,
    );
    emit(audit, entry);
    Ok(())
}

/// Open a withdrawal for a matured investment, freezing the payout amount.
///
/// `existing` is every known withdrawal; only those for this investment are
/// consulted for the in-flight check.
pub fn request_withdrawal(
    calc: &Calculator,
    actor: &Claims,
    investment: &mut Investment,
    existing: &[Withdrawal],
    id: u64,
    now: DateTime<Utc>,
    audit: &mut dyn AuditSink,
) -> Result<Withdrawal, EngineError> {
    actor.require_role(Role::Investor)?;
    require_owner("investment", investment.id, investment.investor_id, actor)?;

    let in_flight = existing
        .iter()
        .any(|w| w.investment_id == investment.id && w.status.is_in_flight());
    calc.check_withdrawal(investment, in_flight, now)?;
    let amount = calc.withdrawal_amount(investment)?;

    investment.status = InvestmentStatus::WithdrawalRequested;
    emit(
        audit,
        AuditEntry::new(actor, AuditAction::Requested, AuditEntity::Withdrawal, id, now)
            .with_details(format!("investment {}, {:.2}", investment.id, amount)),
    );

    Ok(Withdrawal {
        id,
        investment_id: investment.id,
        investor_id: investment.investor_id,
        amount,
        status: WithdrawalStatus::Pending,
        requested_at: now,
        proof_of_payment: None,
        paid_at: None,
        confirmed_at: None,
    })
}

/// Approve and pay: pending -> paid with proof attached; investment -> withdrawn
pub fn pay_withdrawal(
    actor: &Claims,
    withdrawal: &mut Withdrawal,
    investment: &mut Investment,
    proof_of_payment: String,
    now: DateTime<Utc>,
    audit: &mut dyn AuditSink,
) -> Result<(), EngineError> {
    actor.require_role(Role::Admin)?;
    require_same("withdrawal", investment.id, withdrawal.investment_id)?;
    require_status("withdrawal", withdrawal.status, WithdrawalStatus::Pending)?;
    require_status(
        "investment",
        investment.status,
        InvestmentStatus::WithdrawalRequested,
    )?;
    if proof_of_payment.trim().is_empty() {
        return Err(ValidationError::missing(Field::ProofOfPayment).into());
    }

    withdrawal.status = WithdrawalStatus::Paid;
    withdrawal.proof_of_payment = Some(proof_of_payment);
    withdrawal.paid_at = Some(now);
    investment.status = InvestmentStatus::Withdrawn;
    emit(
        audit,
        AuditEntry::new(actor, AuditAction::Paid, AuditEntity::Withdrawal, withdrawal.id, now)
            .with_details(format!("investment {}, {:.2}", investment.id, withdrawal.amount)),
    );
    Ok(())
}

/// pending -> rejected; the investment returns to approved
pub fn reject_withdrawal(
    actor: &Claims,
    withdrawal: &mut Withdrawal,
    investment: &mut Investment,
    now: DateTime<Utc>,
    audit: &mut dyn AuditSink,
) -> Result<(), EngineError> {
    actor.require_role(Role::Admin)?;
    require_same("withdrawal", investment.id, withdrawal.investment_id)?;
    require_status("withdrawal", withdrawal.status, WithdrawalStatus::Pending)?;

    withdrawal.status = WithdrawalStatus::Rejected;
    if investment.status == InvestmentStatus::WithdrawalRequested {
        investment.status = InvestmentStatus::Approved;
    } else {
        debug!(
            "Investment {} left as {} after withdrawal {} rejection",
            investment.id,
            investment.status.as_str(),
            withdrawal.id
        );
    }
    emit(
        audit,
        AuditEntry::new(actor, AuditAction::Rejected, AuditEntity::Withdrawal, withdrawal.id, now),
    );
    Ok(())
}

/// Investor confirms receipt: paid -> completed
pub fn confirm_withdrawal(
    actor: &Claims,
    withdrawal: &mut Withdrawal,
    now: DateTime<Utc>,
    audit: &mut dyn AuditSink,
) -> Result<(), EngineError> {
    actor.require_role(Role::Investor)?;
    require_owner("withdrawal", withdrawal.id, withdrawal.investor_id, actor)?;
    require_status("withdrawal", withdrawal.status, WithdrawalStatus::Paid)?;

    withdrawal.status = WithdrawalStatus::Completed;
    withdrawal.confirmed_at = Some(now);
    emit(
        audit,
        AuditEntry::new(actor, AuditAction::Confirmed, AuditEntity::Withdrawal, withdrawal.id, now),
    );
    Ok(())
}
