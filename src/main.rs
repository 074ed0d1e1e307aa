//! Microfinance Engine CLI
//!
//! Rate quotes, window checks and batch evaluation of CSV snapshots

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use log::info;
use microfinance_engine::calculator::{reporting_window, start_of_day};
use microfinance_engine::entities::{
    load_investments, load_loans, load_repayments, load_withdrawals, write_rows,
};
use microfinance_engine::portfolio::Skipped;
use microfinance_engine::{EngineConfig, PortfolioRunner};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(
    name = "microfinance-engine",
    version,
    about = "Microfinance lifecycle and eligibility engine"
)]
struct Cli {
    /// JSON engine configuration; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Quote an investment: tier, rate, maturity and expected return
    Investment {
        #[arg(long)]
        principal: f64,
        #[arg(long)]
        months: u32,
        /// Term start (YYYY-MM-DD), defaults to today
        #[arg(long)]
        start: Option<NaiveDate>,
    },
    /// Quote a loan: tier, rate, repayable total and due date
    Loan {
        #[arg(long)]
        principal: f64,
        /// Approval date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        approved: Option<NaiveDate>,
    },
    /// Submission window and reporting window for a date
    Window {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Investor history rows from an investments CSV
    History {
        #[arg(long)]
        investments: PathBuf,
        #[arg(long)]
        withdrawals: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Loan repayment schedule rows from a loans CSV
    Schedule {
        #[arg(long)]
        loans: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Admin dashboard summary as JSON
    Dashboard {
        #[arg(long)]
        investments: PathBuf,
        #[arg(long)]
        loans: PathBuf,
        #[arg(long)]
        repayments: PathBuf,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let runner = PortfolioRunner::new(config);

    match cli.command {
        Command::Investment { principal, months, start } => {
            quote_investment(&runner, principal, months, start)
        }
        Command::Loan { principal, approved } => quote_loan(&runner, principal, approved),
        Command::Window { date } => show_window(&runner, date),
        Command::History { investments, withdrawals, out, date } => {
            let investments = load_investments(&investments).context("Failed to load investments")?;
            let withdrawals = match withdrawals {
                Some(path) => load_withdrawals(&path).context("Failed to load withdrawals")?,
                None => Vec::new(),
            };
            info!("Loaded {} investments, {} withdrawals", investments.len(), withdrawals.len());

            let history = runner.investment_history(&investments, &withdrawals, now_or(date));
            write_csv(&out, &history.rows)?;
            println!("Wrote {} rows to {}", history.rows.len(), out.display());
            report_skipped(&history.skipped);
            Ok(())
        }
        Command::Schedule { loans, out, date } => {
            let loans = load_loans(&loans).context("Failed to load loans")?;
            info!("Loaded {} loans", loans.len());

            let schedule = runner.loan_schedule(&loans, now_or(date));
            write_csv(&out, &schedule.rows)?;
            println!("Wrote {} rows to {}", schedule.rows.len(), out.display());
            report_skipped(&schedule.skipped);
            Ok(())
        }
        Command::Dashboard { investments, loans, repayments, date } => {
            let investments = load_investments(&investments).context("Failed to load investments")?;
            let loans = load_loans(&loans).context("Failed to load loans")?;
            let repayments = load_repayments(&repayments).context("Failed to load repayments")?;

            let today = date.unwrap_or_else(|| Utc::now().date_naive());
            let summary = runner.dashboard(&investments, &loans, &repayments, today);
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

fn now_or(date: Option<NaiveDate>) -> DateTime<Utc> {
    date.map(start_of_day).unwrap_or_else(Utc::now)
}

fn quote_investment(
    runner: &PortfolioRunner,
    principal: f64,
    months: u32,
    start: Option<NaiveDate>,
) -> Result<()> {
    let calc = runner.calculator();
    let start = now_or(start);

    let tier = calc.investment_tier(principal)?;
    let rate = calc.investment_return_rate(principal, months)?;
    let maturity = calc.investment_maturity_date(start, months)?;
    let expected = calc.expected_return(principal, rate, months)?;

    println!("Investment quote");
    println!("  Principal:          {:.2}", principal);
    println!("  Tier:               {}", tier.as_str());
    println!("  Rate:               {}%", rate);
    println!("  Term:               {} months from {}", months, start.date_naive());
    println!("  Maturity:           {}", maturity);
    println!("  Earliest withdrawal {}", calc.earliest_withdrawal_date(maturity));
    println!("  Expected return:    {:.2}", expected);
    Ok(())
}

fn quote_loan(runner: &PortfolioRunner, principal: f64, approved: Option<NaiveDate>) -> Result<()> {
    let calc = runner.calculator();
    let approved = now_or(approved);

    let tier = calc.loan_tier(principal)?;
    let rate = calc.loan_interest_rate(principal)?;
    let repayable = calc.repayment_expected_amount(principal, rate)?;
    let due = calc.loan_repayment_due_date(Some(approved), None)?;

    println!("Loan quote");
    println!("  Principal:  {:.2}", principal);
    println!("  Tier:       {}", tier.as_str());
    println!("  Rate:       {}%", rate);
    println!("  Repayable:  {:.2}", repayable);
    println!("  Due:        {}", due.date_naive());
    Ok(())
}

fn show_window(runner: &PortfolioRunner, date: Option<NaiveDate>) -> Result<()> {
    let calc = runner.calculator();
    let now = now_or(date);
    let today = now.date_naive();
    let (start, end) = reporting_window(today);

    println!("Date:              {}", today);
    let open = if calc.loan_submission_window_open(now) { "open" } else { "closed" };
    println!("Submission window: {}", open);
    println!("Next opening:      {}", calc.next_window_opening(today));
    println!("Reporting window:  {} to {}", start, end);
    Ok(())
}

fn write_csv<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_rows(BufWriter::new(file), rows)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn report_skipped(skipped: &[Skipped]) {
    if skipped.is_empty() {
        return;
    }
    println!("Skipped {} snapshot(s):", skipped.len());
    for s in skipped {
        println!("  {} {}: {}", s.entity, s.id, s.error);
    }
}
