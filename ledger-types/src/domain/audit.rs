//! Audit event sent to the compliance sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Transfer,
    Deposit,
    Withdrawal,
    Payroll,
}

/// Immutable record of an attempted or completed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub action: AuditAction,
    /// Outcome code of the operation (`OK`, `NO_MONEY`, ...)
    pub outcome: String,
    pub occurred_at: DateTime<Utc>,
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(action: AuditAction, outcome: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            outcome: outcome.into(),
            occurred_at: Utc::now(),
            details,
        }
    }
}
