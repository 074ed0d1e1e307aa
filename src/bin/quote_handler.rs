//! AWS Lambda handler for rate quotes
//!
//! Accepts a JSON request tagged by `kind` (`investment`, `loan` or `window`)
//! and returns the derived figures. Engine configuration can be overridden by
//! pointing `ENGINE_CONFIG` at a JSON file bundled with the function.

use chrono::{DateTime, NaiveDate, Utc};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use log::{info, warn};
use microfinance_engine::calculator::{reporting_window, Calculator};
use microfinance_engine::{EngineConfig, Tier, ValidationError};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum QuoteRequest {
    Investment {
        principal: f64,
        duration_months: u32,
        #[serde(default)]
        start: Option<DateTime<Utc>>,
    },
    Loan {
        principal: f64,
        #[serde(default)]
        approved_at: Option<DateTime<Utc>>,
    },
    Window {
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Quote {
    Investment {
        tier: Tier,
        rate: f64,
        maturity_date: NaiveDate,
        earliest_withdrawal_date: NaiveDate,
        expected_return: f64,
    },
    Loan {
        tier: Tier,
        interest_rate: f64,
        total_repayable: f64,
        due_date: DateTime<Utc>,
    },
    Window {
        open: bool,
        next_opening: NaiveDate,
        reporting_start: NaiveDate,
        reporting_end: NaiveDate,
    },
}

#[derive(Debug, Serialize)]
struct QuoteResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    quote: Option<Quote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    execution_time_ms: u64,
}

fn quote(calc: &Calculator, request: QuoteRequest) -> Result<Quote, ValidationError> {
    let now = Utc::now();
    match request {
        QuoteRequest::Investment { principal, duration_months, start } => {
            let rate = calc.investment_return_rate(principal, duration_months)?;
            let maturity_date =
                calc.investment_maturity_date(start.unwrap_or(now), duration_months)?;
            Ok(Quote::Investment {
                tier: calc.investment_tier(principal)?,
                rate,
                maturity_date,
                earliest_withdrawal_date: calc.earliest_withdrawal_date(maturity_date),
                expected_return: calc.expected_return(principal, rate, duration_months)?,
            })
        }
        QuoteRequest::Loan { principal, approved_at } => {
            let interest_rate = calc.loan_interest_rate(principal)?;
            Ok(Quote::Loan {
                tier: calc.loan_tier(principal)?,
                interest_rate,
                total_repayable: calc.repayment_expected_amount(principal, interest_rate)?,
                due_date: calc.loan_repayment_due_date(Some(approved_at.unwrap_or(now)), None)?,
            })
        }
        QuoteRequest::Window { at } => {
            let at = at.unwrap_or(now);
            let (reporting_start, reporting_end) = reporting_window(at.date_naive());
            Ok(Quote::Window {
                open: calc.loan_submission_window_open(at),
                next_opening: calc.next_window_opening(at.date_naive()),
                reporting_start,
                reporting_end,
            })
        }
    }
}

async fn handler(
    calc: &Calculator,
    event: LambdaEvent<QuoteRequest>,
) -> Result<QuoteResponse, Error> {
    let start = std::time::Instant::now();
    let (request, _context) = event.into_parts();
    info!("Quote request: {:?}", request);

    let (quote, error) = match quote(calc, request) {
        Ok(q) => (Some(q), None),
        Err(e) => {
            warn!("Quote rejected: {}", e);
            (None, Some(e.to_string()))
        }
    };

    Ok(QuoteResponse {
        success: error.is_none(),
        quote,
        error,
        execution_time_ms: start.elapsed().as_millis() as u64,
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let config = match std::env::var("ENGINE_CONFIG") {
        Ok(path) => EngineConfig::from_json_path(Path::new(&path))?,
        Err(_) => EngineConfig::default(),
    };
    let calc = Calculator::new(config);
    let calc = &calc;

    run(service_fn(move |event| async move { handler(calc, event).await })).await
}
