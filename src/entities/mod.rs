//! Entity snapshots and CSV loading

mod data;
pub mod loader;

pub use data::{
    Investment, InvestmentStatus, Loan, LoanStatus, Repayment, RepaymentStatus, Withdrawal,
    WithdrawalStatus,
};
pub use loader::{
    load_investments, load_investments_from_reader, load_loans, load_loans_from_reader,
    load_repayments, load_repayments_from_reader, load_withdrawals, load_withdrawals_from_reader,
    write_rows, LoadError,
};
