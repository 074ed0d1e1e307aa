//! Load entity snapshots from CSV and write evaluated rows back out
//!
//! Column headers are the snapshot field names; timestamps are RFC 3339
//! (`2024-03-01T09:00:00Z`) and empty cells mean "not set".

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

use super::{Investment, Loan, Repayment, Withdrawal};
use crate::error::{Field, ValidationError};
use crate::rates::{validate_duration, validate_principal};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("line {line}: {source}")]
    Invalid {
        line: u64,
        source: ValidationError,
    },
}

fn read_records<T, R>(
    reader: R,
    validate: impl Fn(&T) -> Result<(), ValidationError>,
) -> Result<Vec<T>, LoadError>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for result in csv_reader.deserialize() {
        let record: T = result?;
        // Header is line 1
        let line = records.len() as u64 + 2;
        validate(&record).map_err(|source| LoadError::Invalid { line, source })?;
        records.push(record);
    }

    Ok(records)
}

fn open(path: &Path) -> Result<File, LoadError> {
    File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn validate_investment(investment: &Investment) -> Result<(), ValidationError> {
    validate_principal(investment.principal)?;
    validate_duration(investment.duration_months)
}

fn validate_loan(loan: &Loan) -> Result<(), ValidationError> {
    validate_principal(loan.principal)?;
    match loan.interest_rate {
        Some(rate) if !rate.is_finite() || rate < 0.0 => Err(ValidationError::new(
            Field::Rate,
            format!("{} is not a valid interest rate", rate),
        )),
        _ => Ok(()),
    }
}

fn validate_amount(amount: f64) -> Result<(), ValidationError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::new(
            Field::Amount,
            format!("{} must be a positive amount", amount),
        ))
    }
}

/// Load investments from any reader (e.g., string buffer, network stream)
pub fn load_investments_from_reader<R: Read>(reader: R) -> Result<Vec<Investment>, LoadError> {
    read_records(reader, validate_investment)
}

pub fn load_investments<P: AsRef<Path>>(path: P) -> Result<Vec<Investment>, LoadError> {
    load_investments_from_reader(open(path.as_ref())?)
}

pub fn load_loans_from_reader<R: Read>(reader: R) -> Result<Vec<Loan>, LoadError> {
    read_records(reader, validate_loan)
}

pub fn load_loans<P: AsRef<Path>>(path: P) -> Result<Vec<Loan>, LoadError> {
    load_loans_from_reader(open(path.as_ref())?)
}

pub fn load_repayments_from_reader<R: Read>(reader: R) -> Result<Vec<Repayment>, LoadError> {
    read_records(reader, |r: &Repayment| validate_amount(r.amount_paid))
}

pub fn load_repayments<P: AsRef<Path>>(path: P) -> Result<Vec<Repayment>, LoadError> {
    load_repayments_from_reader(open(path.as_ref())?)
}

pub fn load_withdrawals_from_reader<R: Read>(reader: R) -> Result<Vec<Withdrawal>, LoadError> {
    read_records(reader, |w: &Withdrawal| validate_amount(w.amount))
}

pub fn load_withdrawals<P: AsRef<Path>>(path: P) -> Result<Vec<Withdrawal>, LoadError> {
    load_withdrawals_from_reader(open(path.as_ref())?)
}

/// Write any serializable rows as CSV with a header line
pub fn write_rows<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<(), LoadError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer
        .flush()
        .map_err(|e| LoadError::Csv(csv::Error::from(e)))?;
    Ok(())
}
