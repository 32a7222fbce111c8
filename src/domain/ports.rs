use super::audit::AuditLogEntry;
use super::order::{Order, OrderChange, OrderId, OrderStatus};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Persists `Order` aggregates.
///
/// `transition` is the serialization point for concurrent lifecycle
/// operations: the expected-status check and the mutation are atomic, so
/// two racing transitions against the same order resolve to exactly one
/// success and one conflict.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Conflict if an order with the same id already exists.
    async fn create(&self, order: Order) -> Result<Order>;

    async fn get(&self, id: &OrderId) -> Result<Option<Order>>;

    /// Atomic conditional update. `expected = None` applies unconditionally
    /// (dispute is an override, not gated by a prior state); otherwise the
    /// change only applies while the stored status matches, else Conflict.
    async fn transition(
        &self,
        id: &OrderId,
        expected: Option<OrderStatus>,
        change: OrderChange,
    ) -> Result<Order>;

    async fn find_by_buyer(&self, buyer_id: &str) -> Result<Vec<Order>>;

    /// Orders where *any* line item belongs to the seller; a multi-seller
    /// order is visible to each of its sellers.
    async fn find_by_seller(&self, seller_id: &str) -> Result<Vec<Order>>;
}

/// Append-only audit trail. No mutation, no deletion.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: AuditLogEntry) -> Result<()>;
    async fn entries(&self) -> Result<Vec<AuditLogEntry>>;
}

/// Commission split applied at capture time: the platform keeps the fee,
/// the remainder is routed to the seller's payout destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSplit {
    pub platform_fee_minor: i64,
    pub payout_destination: String,
}

/// Thin contract against the external payment processor.
///
/// Amounts are integral minor-currency units; the engine converts. The
/// client never retries internally, and the processor's answer is
/// authoritative for payment success.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Authorize and capture in one atomic call, optionally splitting the
    /// commission. Returns the processor's payment reference.
    ///
    /// Errors are `PaymentDeclined` (method declined, with the processor's
    /// reason) or `PaymentGateway` (processor unreachable or faulted).
    async fn authorize_and_capture(
        &self,
        amount_minor: i64,
        currency: &str,
        payment_method: &str,
        split: Option<FeeSplit>,
    ) -> Result<String>;

    /// Full refund of a captured payment. Returns the refund reference
    /// only once the processor reports the refund as final.
    async fn refund(&self, payment_ref: &str) -> Result<String>;
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
    Admin,
}

/// Account record from the external user service.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub role: Role,
    /// Connected payout destination with the processor, if onboarded.
    pub payout_destination: Option<String>,
}

/// Product record from the external catalog.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub price: Decimal,
    pub seller_id: String,
}

#[async_trait]
pub trait AccountResolver: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<Account>>;
}

#[async_trait]
pub trait CatalogResolver: Send + Sync {
    async fn get(&self, product_id: &str) -> Result<Option<Listing>>;
}

pub type OrderStoreBox = Box<dyn OrderStore>;
pub type AuditLogBox = Box<dyn AuditLog>;
pub type PaymentGatewayBox = Box<dyn PaymentGateway>;
pub type AccountResolverBox = Box<dyn AccountResolver>;
pub type CatalogResolverBox = Box<dyn CatalogResolver>;
