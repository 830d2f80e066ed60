//! Customer domain model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Unique identifier for a Customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(Uuid);

impl CustomerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for CustomerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status, set by an administrative process outside the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerStatus {
    Active,
    Blocked,
    Frozen,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Active => "ACTIVE",
            CustomerStatus::Blocked => "BLOCKED",
            CustomerStatus::Frozen => "FROZEN",
        }
    }
}

impl std::fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CustomerStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(CustomerStatus::Active),
            "BLOCKED" => Ok(CustomerStatus::Blocked),
            "FROZEN" => Ok(CustomerStatus::Frozen),
            other => Err(DomainError::ValidationError(format!(
                "Unknown customer status: {}",
                other
            ))),
        }
    }
}

/// A person or organisation owning accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    /// Unique national identification number
    pub national_id: String,
    pub name: String,
    pub status: CustomerStatus,
    /// Maximum outgoing volume per calendar day, in the reference currency
    pub daily_limit: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Onboards an active customer.
    pub fn new(national_id: String, name: String, daily_limit: Decimal) -> Result<Self, DomainError> {
        if national_id.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "National ID cannot be empty".into(),
            ));
        }
        if name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Customer name cannot be empty".into(),
            ));
        }
        if daily_limit < Decimal::ZERO {
            return Err(DomainError::NegativeAmount);
        }

        Ok(Self {
            id: CustomerId::new(),
            national_id,
            name,
            status: CustomerStatus::Active,
            daily_limit,
            created_at: Utc::now(),
        })
    }

    /// Only active customers may originate money movements.
    pub fn is_active(&self) -> bool {
        self.status == CustomerStatus::Active
    }
}
