//! Derived views of entity snapshots and the gates that decide what may happen now

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{elapsed_months, Calculator, DueBucket};
use crate::entities::{Investment, InvestmentStatus, Loan, LoanStatus};
use crate::error::{EligibilityError, EngineError, Field, ValidationError};
use crate::rates::Tier;

/// Everything the investor history screen derives from one investment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentOutlook {
    pub investment_id: u64,
    pub investor_id: u64,
    pub status: InvestmentStatus,
    pub tier: Tier,
    pub rate: f64,
    pub principal: f64,
    pub duration_months: u32,
    pub maturity_date: NaiveDate,
    pub earliest_withdrawal_date: NaiveDate,
    pub expected_return: f64,
    pub current_value: f64,
    pub can_withdraw_now: bool,
}

/// Repayment schedule row for one loan. Flat so it exports directly as CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanOutlook {
    pub loan_id: u64,
    pub investor_id: u64,
    pub status: LoanStatus,
    pub tier: Tier,
    pub principal: f64,
    pub interest_rate: Option<f64>,
    pub total_repayable: Option<f64>,
    pub due_date: Option<DateTime<Utc>>,
    pub days_left: Option<i64>,
    pub bucket: Option<DueBucket>,
}

/// Outcome of a loan application: out-of-window applications are queued, not refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum LoanApplicationDecision {
    Accepted,
    Deferred { opens_on: NaiveDate },
}

impl Calculator {
    /// Rate for an investment snapshot, derived from principal and duration
    pub fn investment_rate(&self, investment: &Investment) -> Result<f64, ValidationError> {
        self.investment_return_rate(investment.principal, investment.duration_months)
    }

    pub fn maturity_of(&self, investment: &Investment) -> Result<NaiveDate, ValidationError> {
        self.investment_maturity_date(investment.term_start(), investment.duration_months)
    }

    pub fn earliest_withdrawal_of(
        &self,
        investment: &Investment,
    ) -> Result<NaiveDate, ValidationError> {
        Ok(self.earliest_withdrawal_date(self.maturity_of(investment)?))
    }

    /// Amount a withdrawal request freezes: the expected return at maturity
    pub fn withdrawal_amount(&self, investment: &Investment) -> Result<f64, ValidationError> {
        let rate = self.investment_rate(investment)?;
        self.expected_return(investment.principal, rate, investment.duration_months)
    }

    /// Whether a withdrawal request for this investment would be accepted now
    pub fn check_withdrawal(
        &self,
        investment: &Investment,
        withdrawal_in_flight: bool,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if investment.status != InvestmentStatus::Approved {
            return Err(EligibilityError::InvalidStatus {
                entity: "investment",
                actual: investment.status.as_str(),
                expected: InvestmentStatus::Approved.as_str(),
            }
            .into());
        }
        if withdrawal_in_flight {
            return Err(EligibilityError::WithdrawalInFlight {
                investment_id: investment.id,
            }
            .into());
        }

        let today = now.date_naive();
        let earliest = self.earliest_withdrawal_of(investment)?;
        if today < earliest {
            return Err(EligibilityError::NotYetMatured { earliest }.into());
        }
        if !self.config().window.is_open(now) {
            return Err(EligibilityError::OutsideSubmissionWindow {
                opens_on: self.next_window_opening(today),
            }
            .into());
        }
        Ok(())
    }

    pub fn investment_outlook(
        &self,
        investment: &Investment,
        withdrawal_in_flight: bool,
        now: DateTime<Utc>,
    ) -> Result<InvestmentOutlook, ValidationError> {
        let tier = self.investment_tier(investment.principal)?;
        let rate = self.investment_rate(investment)?;
        let maturity_date = self.maturity_of(investment)?;
        let expected_return =
            self.expected_return(investment.principal, rate, investment.duration_months)?;
        let elapsed = elapsed_months(investment.term_start(), now, investment.duration_months);
        let current_value = super::accrued_value(
            investment.principal,
            rate,
            investment.duration_months,
            elapsed,
            self.config().accrual,
        )?;

        let can_withdraw_now = match self.check_withdrawal(investment, withdrawal_in_flight, now) {
            Ok(()) => true,
            Err(EngineError::Validation(e)) => return Err(e),
            Err(_) => false,
        };

        Ok(InvestmentOutlook {
            investment_id: investment.id,
            investor_id: investment.investor_id,
            status: investment.status,
            tier,
            rate,
            principal: investment.principal,
            duration_months: investment.duration_months,
            maturity_date,
            earliest_withdrawal_date: self.earliest_withdrawal_date(maturity_date),
            expected_return,
            current_value,
            can_withdraw_now,
        })
    }

    /// Accept into the current cycle inside the window, otherwise queue for the next one
    pub fn loan_application_decision(&self, now: DateTime<Utc>) -> LoanApplicationDecision {
        if self.loan_submission_window_open(now) {
            LoanApplicationDecision::Accepted
        } else {
            LoanApplicationDecision::Deferred {
                opens_on: self.next_window_opening(now.date_naive()),
            }
        }
    }

    /// Due date of an approved loan, explicit or approval + grace period
    pub fn due_date_of(&self, loan: &Loan) -> Result<DateTime<Utc>, ValidationError> {
        self.loan_repayment_due_date(loan.approved_at, loan.repayment_due_date)
    }

    /// Principal plus flat interest at the rate frozen at approval
    pub fn loan_repayable(&self, loan: &Loan) -> Result<f64, ValidationError> {
        let rate = loan
            .interest_rate
            .ok_or_else(|| ValidationError::missing(Field::Rate))?;
        self.repayment_expected_amount(loan.principal, rate)
    }

    pub fn loan_outlook(
        &self,
        loan: &Loan,
        now: DateTime<Utc>,
    ) -> Result<LoanOutlook, ValidationError> {
        let tier = self.loan_tier(loan.principal)?;

        let (total_repayable, due_date, due) = match loan.status {
            LoanStatus::Approved => {
                let due_date = self.due_date_of(loan)?;
                let due = self.overdue_classification(due_date, now);
                (Some(self.loan_repayable(loan)?), Some(due_date), Some(due))
            }
            LoanStatus::Repaid => {
                (Some(self.loan_repayable(loan)?), self.due_date_of(loan).ok(), None)
            }
            LoanStatus::Pending | LoanStatus::Rejected => (None, None, None),
        };

        Ok(LoanOutlook {
            loan_id: loan.id,
            investor_id: loan.investor_id,
            status: loan.status,
            tier,
            principal: loan.principal,
            interest_rate: loan.interest_rate,
            total_repayable,
            due_date,
            days_left: due.map(|d| d.days_left),
            bucket: due.map(|d| d.bucket),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    fn investment(status: InvestmentStatus) -> Investment {
        Investment {
            id: 3,
            investor_id: 7,
            principal: 150.0,
            duration_months: 6,
            submitted_at: at(2024, 1, 12),
            approved_at: Some(at(2024, 1, 15)),
            status,
            proof_of_payment: None,
        }
    }

    fn approved_loan() -> Loan {
        Loan {
            id: 9,
            investor_id: 7,
            principal: 150.0,
            status: LoanStatus::Approved,
            submitted_at: at(2024, 1, 2),
            approved_at: Some(at(2024, 1, 10)),
            interest_rate: Some(20.0),
            repayment_due_date: None,
            collateral: Some("Phone".into()),
            next_of_kin: None,
            signed_document: None,
            queued_for_cycle: None,
        }
    }

    #[test]
    fn test_withdrawal_gates() {
        let calc = Calculator::default();
        let inv = investment(InvestmentStatus::Approved);
        // Matures 2024-07-15, earliest withdrawal 2024-07-28

        let before = calc.check_withdrawal(&inv, false, at(2024, 7, 20)).unwrap_err();
        assert_eq!(
            before,
            EngineError::Eligibility(EligibilityError::NotYetMatured {
                earliest: NaiveDate::from_ymd_opt(2024, 7, 28).unwrap()
            })
        );

        assert!(calc.check_withdrawal(&inv, false, at(2024, 7, 28)).is_ok());
        assert!(calc.check_withdrawal(&inv, false, at(2024, 8, 5)).is_ok());

        let closed = calc.check_withdrawal(&inv, false, at(2024, 8, 12)).unwrap_err();
        assert_eq!(
            closed,
            EngineError::Eligibility(EligibilityError::OutsideSubmissionWindow {
                opens_on: NaiveDate::from_ymd_opt(2024, 8, 28).unwrap()
            })
        );

        let in_flight = calc.check_withdrawal(&inv, true, at(2024, 7, 28)).unwrap_err();
        assert!(matches!(
            in_flight,
            EngineError::Eligibility(EligibilityError::WithdrawalInFlight { investment_id: 3 })
        ));

        let pending = investment(InvestmentStatus::Pending);
        assert!(matches!(
            calc.check_withdrawal(&pending, false, at(2024, 7, 28)),
            Err(EngineError::Eligibility(EligibilityError::InvalidStatus { .. }))
        ));
    }

    #[test]
    fn test_investment_outlook() {
        let calc = Calculator::default();
        let inv = investment(InvestmentStatus::Approved);

        let outlook = calc.investment_outlook(&inv, false, at(2024, 3, 20)).unwrap();
        assert_eq!(outlook.tier, Tier::Medium);
        assert_eq!(outlook.rate, 12.0);
        assert_eq!(outlook.maturity_date, NaiveDate::from_ymd_opt(2024, 7, 15).unwrap());
        assert_eq!(outlook.earliest_withdrawal_date, NaiveDate::from_ymd_opt(2024, 7, 28).unwrap());
        // 150 x 1.12^6
        assert!((outlook.expected_return - 296.07).abs() < 1e-9);
        // Two whole months elapsed: 150 x 1.12^2
        assert!((outlook.current_value - 188.16).abs() < 1e-9);
        assert!(!outlook.can_withdraw_now);

        let ready = calc.investment_outlook(&inv, false, at(2024, 7, 29)).unwrap();
        assert!(ready.can_withdraw_now);
    }

    #[test]
    fn test_outlook_surfaces_validation_errors() {
        let calc = Calculator::default();
        let mut inv = investment(InvestmentStatus::Approved);
        inv.duration_months = 24;

        let err = calc.investment_outlook(&inv, false, at(2024, 3, 20)).unwrap_err();
        assert_eq!(err.field, Field::DurationMonths);
    }

    #[test]
    fn test_loan_application_decision() {
        let calc = Calculator::default();

        for day in [at(2024, 5, 30), at(2024, 6, 8)] {
            assert_eq!(calc.loan_application_decision(day), LoanApplicationDecision::Accepted);
        }
        assert_eq!(
            calc.loan_application_decision(at(2024, 6, 9)),
            LoanApplicationDecision::Deferred {
                opens_on: NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
            }
        );
    }

    #[test]
    fn test_loan_outlook() {
        let calc = Calculator::default();
        let loan = approved_loan();

        let outlook = calc.loan_outlook(&loan, at(2024, 2, 6)).unwrap();
        assert_eq!(outlook.total_repayable, Some(180.0));
        assert_eq!(
            outlook.due_date.map(|d| d.date_naive()),
            NaiveDate::from_ymd_opt(2024, 2, 9)
        );
        assert_eq!(outlook.days_left, Some(3));
        assert_eq!(outlook.bucket, Some(DueBucket::Upcoming));

        let overdue = calc.loan_outlook(&loan, at(2024, 2, 12)).unwrap();
        assert_eq!(overdue.bucket, Some(DueBucket::Overdue));
    }

    #[test]
    fn test_loan_repayable_never_defaults_rate() {
        let calc = Calculator::default();
        let mut loan = approved_loan();
        loan.interest_rate = None;

        assert_eq!(calc.loan_repayable(&loan).unwrap_err().field, Field::Rate);
        assert!(calc.loan_outlook(&loan, at(2024, 2, 6)).is_err());
    }
}
