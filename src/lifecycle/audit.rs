//! Audit trail of approval-flow actions

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::session::{Claims, Role};

/// Kind of record an action touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntity {
    Investment,
    Withdrawal,
    Loan,
    Repayment,
}

impl AuditEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEntity::Investment => "investment",
            AuditEntity::Withdrawal => "withdrawal",
            AuditEntity::Loan => "loan",
            AuditEntity::Repayment => "repayment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Submitted,
    Requested,
    Approved,
    Reapproved,
    Rejected,
    Paid,
    Confirmed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Submitted => "submitted",
            AuditAction::Requested => "requested",
            AuditAction::Approved => "approved",
            AuditAction::Reapproved => "re-approved",
            AuditAction::Rejected => "rejected",
            AuditAction::Paid => "paid",
            AuditAction::Confirmed => "confirmed",
        }
    }
}

/// One recorded action: who did what to which record, and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: u64,
    pub role: Role,
    pub action: AuditAction,
    pub entity: AuditEntity,
    pub entity_id: u64,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub details: Option<String>,
}

impl AuditEntry {
    pub fn new(
        actor: &Claims,
        action: AuditAction,
        entity: AuditEntity,
        entity_id: u64,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            actor: actor.subject,
            role: actor.role,
            action,
            entity,
            entity_id,
            at,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.role,
            self.actor,
            self.action.as_str(),
            self.entity.as_str(),
            self.entity_id
        )?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

/// Destination for audit entries; the caller persists them
pub trait AuditSink {
    fn record(&mut self, entry: AuditEntry);
}

impl AuditSink for Vec<AuditEntry> {
    fn record(&mut self, entry: AuditEntry) {
        self.push(entry);
    }
}

/// Log and hand the entry to the sink
pub(super) fn emit(sink: &mut dyn AuditSink, entry: AuditEntry) {
    info!("{}", entry);
    sink.record(entry);
}
