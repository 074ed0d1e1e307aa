//! Microfinance Engine - financial lifecycle and eligibility rules for an
//! investment and lending portal
//!
//! This library provides:
//! - Tiered rate tables for investments and loans
//! - Maturity, withdrawal-eligibility, due-date and accrual calculations
//! - Approval-flow transitions for investments, withdrawals, loans and repayments,
//!   each recorded to a caller-supplied audit sink
//! - Batch portfolio evaluation (history rows, repayment schedules, dashboards)
//! - Session lifecycle management with periodic credential renewal and idle expiry

pub mod calculator;
pub mod config;
pub mod entities;
pub mod error;
pub mod lifecycle;
pub mod portfolio;
pub mod rates;
pub mod session;

// Re-export commonly used types
pub use calculator::{Calculator, DueBucket, DueStatus, InvestmentOutlook, LoanOutlook};
pub use config::{AccrualMethod, EngineConfig, SessionConfig};
pub use entities::{Investment, Loan, Repayment, Withdrawal};
pub use error::{AuthExpired, EligibilityError, EngineError, ValidationError};
pub use lifecycle::{AuditEntry, AuditSink};
pub use portfolio::{DashboardSummary, InvestorSummary, PortfolioRunner};
pub use rates::{RateTables, Tier};
pub use session::{SessionHandle, SessionRegistry, SessionState};
