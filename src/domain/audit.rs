use super::order::OrderId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of auditable lifecycle actions.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum AuditAction {
    OrderCreated,
    OrderCancelled,
    OrderRefunded,
    DisputeRaised,
    OrderUpdated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderCreated => "OrderCreated",
            Self::OrderCancelled => "OrderCancelled",
            Self::OrderRefunded => "OrderRefunded",
            Self::DisputeRaised => "DisputeRaised",
            Self::OrderUpdated => "OrderUpdated",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one lifecycle event. Appended for every state
/// change; never mutated or deleted.
///
/// For a multi-seller order creation one entry is written per distinct
/// seller, each carrying the whole-order amount. Seller-apportioned
/// amounts are a future enhancement.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AuditLogEntry {
    pub order_id: OrderId,
    pub actor_user_id: String,
    pub seller_id: Option<String>,
    pub amount: Decimal,
    pub action: AuditAction,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        order_id: OrderId,
        actor_user_id: impl Into<String>,
        seller_id: Option<String>,
        amount: Decimal,
        action: AuditAction,
    ) -> Self {
        Self {
            order_id,
            actor_user_id: actor_user_id.into(),
            seller_id,
            amount,
            action,
            created_at: Utc::now(),
        }
    }
}
