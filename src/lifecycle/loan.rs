//! Loan and repayment transitions

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use super::audit::{emit, AuditAction, AuditEntity, AuditEntry, AuditSink};
use super::{require_owner, require_same, require_status};
use crate::calculator::{sum_currency, Calculator, LoanApplicationDecision};
use crate::entities::{Loan, LoanStatus, Repayment, RepaymentStatus};
use crate::error::{EligibilityError, EngineError, Field, ValidationError};
use crate::session::{Claims, Role};

/// What an investor submits to apply for a loan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub principal: f64,
    #[serde(default)]
    pub collateral: Option<String>,
    #[serde(default)]
    pub next_of_kin: Option<String>,
    #[serde(default)]
    pub signed_document: Option<String>,
}

/// Create a pending loan application.
///
/// Outside the submission window the application is still recorded, queued
/// for the cycle that opens next.
pub fn submit_loan(
    calc: &Calculator,
    actor: &Claims,
    id: u64,
    application: LoanApplication,
    now: DateTime<Utc>,
    audit: &mut dyn AuditSink,
) -> Result<(Loan, LoanApplicationDecision), EngineError> {
    actor.require_role(Role::Investor)?;
    let tier = calc.loan_tier(application.principal)?;
    let decision = calc.loan_application_decision(now);

    let queued_for_cycle = match decision {
        LoanApplicationDecision::Accepted => None,
        LoanApplicationDecision::Deferred { opens_on } => Some(opens_on),
    };
    let loan = Loan {
        id,
        investor_id: actor.subject,
        principal: application.principal,
        status: LoanStatus::Pending,
        submitted_at: now,
        approved_at: None,
        interest_rate: None,
        repayment_due_date: None,
        collateral: application.collateral,
        next_of_kin: application.next_of_kin,
        signed_document: application.signed_document,
        queued_for_cycle,
    };

    let details = match queued_for_cycle {
        None => format!("{:.2}, {} tier", loan.principal, tier.as_str()),
        Some(opens_on) => format!("{:.2}, queued for {}", loan.principal, opens_on),
    };
    let entry = AuditEntry::new(actor, AuditAction::Submitted, AuditEntity::Loan, id, now);
    emit(audit, entry.with_details(details));
    Ok((loan, decision))
}

/// pending -> approved inside the submission window.
///
/// Freezes the interest rate (assigned once, never recomputed) and resolves
/// the due date: `explicit_due_date` when given, otherwise approval plus the
/// grace period.
pub fn approve_loan(
    calc: &Calculator,
    actor: &Claims,
    loan: &mut Loan,
    explicit_due_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    audit: &mut dyn AuditSink,
) -> Result<(), EngineError> {
    actor.require_role(Role::Admin)?;
    require_status("loan", loan.status, LoanStatus::Pending)?;
    if !calc.loan_submission_window_open(now) {
        return Err(EligibilityError::OutsideSubmissionWindow {
            opens_on: calc.next_window_opening(now.date_naive()),
        }
        .into());
    }

    let rate = match loan.interest_rate {
        Some(rate) => rate,
        None => calc.loan_interest_rate(loan.principal)?,
    };
    let due = calc.loan_repayment_due_date(Some(now), explicit_due_date)?;
    if due <= now {
        return Err(ValidationError::new(Field::DueDate, "due date must be after approval").into());
    }

    loan.interest_rate = Some(rate);
    loan.approved_at = Some(now);
    loan.repayment_due_date = Some(due);
    loan.queued_for_cycle = None;
    loan.status = LoanStatus::Approved;

    let entry = AuditEntry::new(actor, AuditAction::Approved, AuditEntity::Loan, loan.id, now);
    emit(audit, entry.with_details(format!("{}% due {}", rate, due.date_naive())));
    Ok(())
}

/// pending -> rejected
pub fn reject_loan(
    actor: &Claims,
    loan: &mut Loan,
    now: DateTime<Utc>,
    audit: &mut dyn AuditSink,
) -> Result<(), EngineError> {
    actor.require_role(Role::Admin)?;
    require_status("loan", loan.status, LoanStatus::Pending)?;

    loan.status = LoanStatus::Rejected;
    emit(
        audit,
        AuditEntry::new(actor, AuditAction::Rejected, AuditEntity::Loan, loan.id, now),
    );
    Ok(())
}

/// Record a repayment of the full repayable amount against an approved loan
pub fn submit_repayment(
    calc: &Calculator,
    actor: &Claims,
    loan: &Loan,
    id: u64,
    proof_of_payment: String,
    now: DateTime<Utc>,
    audit: &mut dyn AuditSink,
) -> Result<Repayment, EngineError> {
    actor.require_role(Role::Investor)?;
    require_owner("loan", loan.id, loan.investor_id, actor)?;
    require_status("loan", loan.status, LoanStatus::Approved)?;
    if proof_of_payment.trim().is_empty() {
        return Err(ValidationError::missing(Field::ProofOfPayment).into());
    }

    let amount_paid = calc.loan_repayable(loan)?;
    let entry = AuditEntry::new(actor, AuditAction::Submitted, AuditEntity::Repayment, id, now);
    emit(audit, entry.with_details(format!("loan {}, {:.2}", loan.id, amount_paid)));
    Ok(Repayment {
        id,
        loan_id: loan.id,
        investor_id: loan.investor_id,
        amount_paid,
        proof_of_payment,
        status: RepaymentStatus::Pending,
        submitted_at: now,
    })
}

/// pending -> approved. Returns true when this approval settles the loan.
///
/// `history` holds the loan's other repayments; approved ones count towards
/// the repayable total. Amounts are summed in whole cents, so the loan is
/// repaid exactly when the cents paid reach the cents owed.
pub fn approve_repayment(
    calc: &Calculator,
    actor: &Claims,
    repayment: &mut Repayment,
    loan: &mut Loan,
    history: &[Repayment],
    now: DateTime<Utc>,
    audit: &mut dyn AuditSink,
) -> Result<bool, EngineError> {
    actor.require_role(Role::Admin)?;
    require_same("repayment", loan.id, repayment.loan_id)?;
    require_status("repayment", repayment.status, RepaymentStatus::Pending)?;
    let repayable = calc.loan_repayable(loan)?;

    repayment.status = RepaymentStatus::Approved;
    let paid = sum_currency(
        history
            .iter()
            .filter(|r| r.loan_id == loan.id && r.id != repayment.id)
            .filter(|r| r.status == RepaymentStatus::Approved)
            .map(|r| r.amount_paid)
            .chain(std::iter::once(repayment.amount_paid)),
    );
    let entry = AuditEntry::new(
        actor,
        AuditAction::Approved,
        AuditEntity::Repayment,
        repayment.id,
        now,
    );
    emit(
        audit,
        entry.with_details(format!("loan {}, {:.2} of {:.2} paid", loan.id, paid, repayable)),
    );

    if loan.status == LoanStatus::Approved && paid >= repayable {
        loan.status = LoanStatus::Repaid;
        debug!("Loan {} repaid", loan.id);
        return Ok(true);
    }
    debug!("Loan {} remains {}", loan.id, loan.status.as_str());
    Ok(false)
}

/// pending -> rejected
pub fn reject_repayment(
    actor: &Claims,
    repayment: &mut Repayment,
    now: DateTime<Utc>,
    audit: &mut dyn AuditSink,
) -> Result<(), EngineError> {
    actor.require_role(Role::Admin)?;
    require_status("repayment", repayment.status, RepaymentStatus::Pending)?;

    repayment.status = RepaymentStatus::Rejected;
    let entry =
        AuditEntry::new(actor, AuditAction::Rejected, AuditEntity::Repayment, repayment.id, now);
    emit(audit, entry);
    Ok(())
}
