//! Batch evaluation of entity snapshots
//!
//! Holds one [`Calculator`] and fans snapshots out across the rayon pool.
//! A snapshot that fails validation is reported in `skipped`, never counted
//! as zero.

use chrono::{DateTime, NaiveDate, Utc};
use log::warn;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::calculator::{
    reporting_window, sum_currency, Calculator, InvestmentOutlook, LoanOutlook,
};
use crate::config::EngineConfig;
use crate::entities::{
    Investment, InvestmentStatus, Loan, LoanStatus, Repayment, RepaymentStatus, Withdrawal,
    WithdrawalStatus,
};
use crate::error::ValidationError;

/// A snapshot left out of a batch result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skipped {
    pub entity: String,
    pub id: u64,
    pub error: String,
}

impl Skipped {
    fn new(entity: &str, id: u64, error: &ValidationError) -> Self {
        warn!("Skipping {} {}: {}", entity, id, error);
        Self {
            entity: entity.to_string(),
            id,
            error: error.to_string(),
        }
    }
}

/// Rows that evaluated cleanly plus the snapshots that did not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluated<T> {
    pub rows: Vec<T>,
    pub skipped: Vec<Skipped>,
}

impl<T> Evaluated<T> {
    fn collect(results: Vec<Result<T, Skipped>>) -> Self {
        let mut rows = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for result in results {
            match result {
                Ok(row) => rows.push(row),
                Err(s) => skipped.push(s),
            }
        }
        Self { rows, skipped }
    }
}

/// Admin overview for the 8th-to-7th reporting window containing `today`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,

    /// Principal of all approved investments
    pub approved_funds: f64,

    pub pending_loans: usize,
    pub active_loans: usize,
    pub rejected_loans: usize,
    pub repaid_loans: usize,
    pub total_loans: usize,

    /// Repayable totals of approved loans falling due inside the window
    pub loan_repayments_due: f64,

    /// Expected returns of approved investments withdrawable inside the window
    pub investment_payouts_due: f64,
    pub payout_investment_ids: Vec<u64>,

    pub repayments_approved_amount: f64,
    pub repayments_rejected_amount: f64,

    pub skipped: Vec<Skipped>,
}

/// One investor's totals across their own snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestorSummary {
    pub investor_id: u64,
    pub approved_investments: usize,
    pub total_invested: f64,
    pub total_returns: f64,
    pub total_loans: usize,
    pub active_loans: usize,
    pub total_repayable: f64,
    pub total_repaid: f64,
    pub pending_withdrawals: usize,
    pub skipped: Vec<Skipped>,
}

/// Pre-configured batch evaluator
#[derive(Debug, Clone, Default)]
pub struct PortfolioRunner {
    calculator: Calculator,
}

impl PortfolioRunner {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            calculator: Calculator::new(config),
        }
    }

    pub fn with_calculator(calculator: Calculator) -> Self {
        Self { calculator }
    }

    pub fn calculator(&self) -> &Calculator {
        &self.calculator
    }

    /// Investor history rows. `withdrawals` decides which investments have one in flight.
    pub fn investment_history(
        &self,
        investments: &[Investment],
        withdrawals: &[Withdrawal],
        now: DateTime<Utc>,
    ) -> Evaluated<InvestmentOutlook> {
        let in_flight: HashSet<u64> = withdrawals
            .iter()
            .filter(|w| w.status.is_in_flight())
            .map(|w| w.investment_id)
            .collect();

        let results: Vec<_> = investments
            .par_iter()
            .map(|inv| {
                self.calculator
                    .investment_outlook(inv, in_flight.contains(&inv.id), now)
                    .map_err(|e| Skipped::new("investment", inv.id, &e))
            })
            .collect();
        Evaluated::collect(results)
    }

    /// Repayment schedule rows for every loan
    pub fn loan_schedule(&self, loans: &[Loan], now: DateTime<Utc>) -> Evaluated<LoanOutlook> {
        let results: Vec<_> = loans
            .par_iter()
            .map(|loan| {
                self.calculator
                    .loan_outlook(loan, now)
                    .map_err(|e| Skipped::new("loan", loan.id, &e))
            })
            .collect();
        Evaluated::collect(results)
    }

    pub fn dashboard(
        &self,
        investments: &[Investment],
        loans: &[Loan],
        repayments: &[Repayment],
        today: NaiveDate,
    ) -> DashboardSummary {
        let (window_start, window_end) = reporting_window(today);
        let in_window = |date: NaiveDate| window_start <= date && date <= window_end;
        let mut skipped = Vec::new();

        let approved: Vec<&Investment> = investments
            .iter()
            .filter(|inv| inv.status == InvestmentStatus::Approved)
            .collect();
        let approved_funds = sum_currency(approved.iter().map(|inv| inv.principal));

        // Payouts: approved investments whose earliest withdrawal date lands in the window
        let payouts: Vec<(u64, Result<Option<f64>, ValidationError>)> = approved
            .par_iter()
            .filter(|inv| inv.approved_at.is_some())
            .map(|inv| {
                let payout = self.calculator.earliest_withdrawal_of(inv).and_then(|earliest| {
                    if in_window(earliest) {
                        self.calculator.withdrawal_amount(inv).map(Some)
                    } else {
                        Ok(None)
                    }
                });
                (inv.id, payout)
            })
            .collect();
        let mut payout_amounts = Vec::new();
        let mut payout_investment_ids = Vec::new();
        for (id, payout) in payouts {
            match payout {
                Ok(Some(amount)) => {
                    payout_amounts.push(amount);
                    payout_investment_ids.push(id);
                }
                Ok(None) => {}
                Err(e) => skipped.push(Skipped::new("investment", id, &e)),
            }
        }

        let count = |status: LoanStatus| loans.iter().filter(|l| l.status == status).count();

        let mut loans_due = Vec::new();
        for loan in loans.iter().filter(|l| l.status == LoanStatus::Approved) {
            let due = self
                .calculator
                .due_date_of(loan)
                .and_then(|due| Ok((due, self.calculator.loan_repayable(loan)?)));
            match due {
                Ok((due, repayable)) if in_window(due.date_naive()) => loans_due.push(repayable),
                Ok(_) => {}
                Err(e) => skipped.push(Skipped::new("loan", loan.id, &e)),
            }
        }

        let repayment_sum = |status: RepaymentStatus| {
            sum_currency(
                repayments
                    .iter()
                    .filter(|r| r.status == status)
                    .map(|r| r.amount_paid),
            )
        };

        payout_investment_ids.sort_unstable();
        DashboardSummary {
            window_start,
            window_end,
            approved_funds,
            pending_loans: count(LoanStatus::Pending),
            active_loans: count(LoanStatus::Approved),
            rejected_loans: count(LoanStatus::Rejected),
            repaid_loans: count(LoanStatus::Repaid),
            total_loans: loans.len(),
            loan_repayments_due: sum_currency(loans_due),
            investment_payouts_due: sum_currency(payout_amounts),
            payout_investment_ids,
            repayments_approved_amount: repayment_sum(RepaymentStatus::Approved),
            repayments_rejected_amount: repayment_sum(RepaymentStatus::Rejected),
            skipped,
        }
    }

    /// Totals for one investor. Snapshots belonging to others are ignored.
    pub fn investor_summary(
        &self,
        investor_id: u64,
        investments: &[Investment],
        loans: &[Loan],
        repayments: &[Repayment],
        withdrawals: &[Withdrawal],
    ) -> InvestorSummary {
        let mut skipped = Vec::new();

        let approved: Vec<&Investment> = investments
            .iter()
            .filter(|inv| {
                inv.investor_id == investor_id && inv.status == InvestmentStatus::Approved
            })
            .collect();
        let mut returns = Vec::new();
        for inv in &approved {
            match self.calculator.withdrawal_amount(inv) {
                Ok(amount) => returns.push(amount),
                Err(e) => skipped.push(Skipped::new("investment", inv.id, &e)),
            }
        }

        let own_loans: Vec<&Loan> = loans.iter().filter(|l| l.investor_id == investor_id).collect();
        let mut repayable = Vec::new();
        for loan in own_loans.iter().filter(|l| l.status == LoanStatus::Approved) {
            match self.calculator.loan_repayable(loan) {
                Ok(amount) => repayable.push(amount),
                Err(e) => skipped.push(Skipped::new("loan", loan.id, &e)),
            }
        }

        let own_loan_ids: HashSet<u64> = own_loans.iter().map(|l| l.id).collect();
        let total_repaid = sum_currency(
            repayments
                .iter()
                .filter(|r| {
                    own_loan_ids.contains(&r.loan_id) && r.status == RepaymentStatus::Approved
                })
                .map(|r| r.amount_paid),
        );

        InvestorSummary {
            investor_id,
            approved_investments: approved.len(),
            total_invested: sum_currency(approved.iter().map(|inv| inv.principal)),
            total_returns: sum_currency(returns),
            total_loans: own_loans.len(),
            active_loans: own_loans
                .iter()
                .filter(|l| l.status == LoanStatus::Approved)
                .count(),
            total_repayable: sum_currency(repayable),
            total_repaid,
            pending_withdrawals: withdrawals
                .iter()
                .filter(|w| w.investor_id == investor_id && w.status == WithdrawalStatus::Pending)
                .count(),
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn investment(id: u64, principal: f64, months: u32, approved: DateTime<Utc>) -> Investment {
        Investment {
            id,
            investor_id: 7,
            principal,
            duration_months: months,
            submitted_at: approved,
            approved_at: Some(approved),
            status: InvestmentStatus::Approved,
            proof_of_payment: None,
        }
    }

    fn loan(id: u64, status: LoanStatus, approved: Option<DateTime<Utc>>) -> Loan {
        Loan {
            id,
            investor_id: 7,
            principal: 150.0,
            status,
            submitted_at: at(2024, 1, 2),
            approved_at: approved,
            interest_rate: approved.map(|_| 20.0),
            repayment_due_date: None,
            collateral: None,
            next_of_kin: None,
            signed_document: None,
            queued_for_cycle: None,
        }
    }

    fn repayment(id: u64, loan_id: u64, amount: f64, status: RepaymentStatus) -> Repayment {
        Repayment {
            id,
            loan_id,
            investor_id: 7,
            amount_paid: amount,
            proof_of_payment: "slip".into(),
            status,
            submitted_at: at(2024, 2, 1),
        }
    }

    #[test]
    fn test_history_reports_bad_snapshots() {
        let runner = PortfolioRunner::default();
        let mut bad = investment(2, 150.0, 6, at(2024, 1, 15));
        bad.duration_months = 18;
        let investments = vec![investment(1, 150.0, 6, at(2024, 1, 15)), bad];

        let history = runner.investment_history(&investments, &[], at(2024, 7, 29));
        assert_eq!(history.rows.len(), 1);
        assert!(history.rows[0].can_withdraw_now);
        assert_eq!(history.skipped.len(), 1);
        assert_eq!(history.skipped[0].id, 2);
    }

    #[test]
    fn test_history_honours_in_flight_withdrawals() {
        let runner = PortfolioRunner::default();
        let investments = vec![investment(1, 150.0, 6, at(2024, 1, 15))];
        let withdrawals = vec![Withdrawal {
            id: 40,
            investment_id: 1,
            investor_id: 7,
            amount: 296.07,
            status: WithdrawalStatus::Paid,
            requested_at: at(2024, 7, 28),
            proof_of_payment: Some("transfer.pdf".into()),
            paid_at: Some(at(2024, 7, 28)),
            confirmed_at: None,
        }];

        let history = runner.investment_history(&investments, &withdrawals, at(2024, 7, 29));
        assert!(!history.rows[0].can_withdraw_now);
    }

    #[test]
    fn test_loan_schedule_rows() {
        let runner = PortfolioRunner::default();
        let loans = vec![
            loan(1, LoanStatus::Approved, Some(at(2024, 1, 5))),
            loan(2, LoanStatus::Pending, None),
        ];

        let schedule = runner.loan_schedule(&loans, at(2024, 2, 1));
        assert_eq!(schedule.rows.len(), 2);
        let approved = schedule.rows.iter().find(|r| r.loan_id == 1).unwrap();
        assert_eq!(approved.total_repayable, Some(180.0));
        assert_eq!(approved.days_left, Some(3));
        let pending = schedule.rows.iter().find(|r| r.loan_id == 2).unwrap();
        assert_eq!(pending.due_date, None);
    }

    #[test]
    fn test_dashboard_window_totals() {
        let runner = PortfolioRunner::default();
        // today 2024-07-10 -> window 2024-07-08 ..= 2024-08-07
        let investments = vec![
            // Matures 2024-07-15, withdrawable 2024-07-28: inside
            investment(1, 150.0, 6, at(2024, 1, 15)),
            // Matures 2024-09-15: outside
            investment(2, 100.0, 8, at(2024, 1, 15)),
        ];
        let loans = vec![
            // Due 2024-07-31: inside
            loan(10, LoanStatus::Approved, Some(at(2024, 7, 1))),
            // Due 2024-06-30: outside
            loan(11, LoanStatus::Approved, Some(at(2024, 5, 31))),
            loan(12, LoanStatus::Pending, None),
            loan(13, LoanStatus::Rejected, None),
        ];
        let repayments = vec![
            repayment(20, 11, 180.0, RepaymentStatus::Approved),
            repayment(21, 11, 50.0, RepaymentStatus::Rejected),
            repayment(22, 10, 180.0, RepaymentStatus::Pending),
        ];

        let summary = runner.dashboard(&investments, &loans, &repayments, date(2024, 7, 10));
        assert_eq!(summary.window_start, date(2024, 7, 8));
        assert_eq!(summary.window_end, date(2024, 8, 7));
        assert_relative_eq!(summary.approved_funds, 250.0);
        assert_eq!(summary.active_loans, 2);
        assert_eq!(summary.pending_loans, 1);
        assert_eq!(summary.rejected_loans, 1);
        assert_eq!(summary.total_loans, 4);
        assert_relative_eq!(summary.loan_repayments_due, 180.0);
        assert_eq!(summary.payout_investment_ids, vec![1]);
        assert_relative_eq!(summary.investment_payouts_due, 296.07, epsilon = 1e-9);
        assert_relative_eq!(summary.repayments_approved_amount, 180.0);
        assert_relative_eq!(summary.repayments_rejected_amount, 50.0);
        assert!(summary.skipped.is_empty());
    }

    #[test]
    fn test_dashboard_skips_loan_without_rate() {
        let runner = PortfolioRunner::default();
        let mut broken = loan(10, LoanStatus::Approved, Some(at(2024, 7, 1)));
        broken.interest_rate = None;

        let summary = runner.dashboard(&[], &[broken], &[], date(2024, 7, 10));
        assert_relative_eq!(summary.loan_repayments_due, 0.0);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].entity, "loan");
    }

    #[test]
    fn test_investor_summary() {
        let runner = PortfolioRunner::default();
        let mut other = investment(3, 500.0, 3, at(2024, 1, 15));
        other.investor_id = 8;
        let investments = vec![investment(1, 150.0, 6, at(2024, 1, 15)), other];
        let loans = vec![loan(10, LoanStatus::Approved, Some(at(2024, 7, 1)))];
        let repayments = vec![repayment(20, 10, 100.0, RepaymentStatus::Approved)];

        let summary = runner.investor_summary(7, &investments, &loans, &repayments, &[]);
        assert_eq!(summary.approved_investments, 1);
        assert_relative_eq!(summary.total_invested, 150.0);
        assert_relative_eq!(summary.total_returns, 296.07, epsilon = 1e-9);
        assert_eq!(summary.active_loans, 1);
        assert_relative_eq!(summary.total_repayable, 180.0);
        assert_relative_eq!(summary.total_repaid, 100.0);
        assert_eq!(summary.pending_withdrawals, 0);
    }
}
