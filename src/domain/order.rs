use crate::error::{OrderError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque order identifier, generated at creation and immutable after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for OrderId {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| OrderError::Validation(format!("invalid order id: {s}")))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
    Disputed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Disputed => "disputed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "disputed" => Ok(Self::Disputed),
            other => Err(OrderError::Validation(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}

/// Tracked independently of `OrderStatus`: a refund can follow a
/// cancellation after the payment already succeeded.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque shipping destination. Required on the cart checkout path.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(transparent)]
pub struct ShippingAddress(String);

impl ShippingAddress {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(OrderError::Validation(
                "shipping address is required".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A priced quantity of one product from one seller, snapshotted into the
/// order at creation. `unit_price` is never re-read from the catalog later.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LineItem {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub seller_id: String,
}

impl LineItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Field mutation applied through a conditional store update.
#[derive(Debug, Clone)]
pub enum OrderChange {
    /// Status to `Cancelled`; payment fields untouched until the refund lands.
    Cancel,
    /// Refund confirmed by the gateway: payment status to `Refunded`.
    RecordRefund { refund_ref: String },
    /// Status to `Disputed`, valid from any prior status.
    Dispute,
    /// Administrative status override.
    Status(OrderStatus),
}

/// The central aggregate: a buyer's committed purchase of one or more
/// line items, tracked through a fixed lifecycle.
///
/// `total_amount` equals the sum of `unit_price * quantity` over the line
/// items at creation time and is never recomputed afterwards.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: String,
    pub line_items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_intent_ref: Option<String>,
    pub refund_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_items(items: &[LineItem]) -> Result<Decimal> {
    if items.is_empty() {
        return Err(OrderError::Validation("cart is empty".to_string()));
    }
    let mut total = Decimal::ZERO;
    for item in items {
        if item.quantity == 0 {
            return Err(OrderError::Validation(format!(
                "quantity must be positive for product {}",
                item.product_id
            )));
        }
        if item.unit_price < Decimal::ZERO {
            return Err(OrderError::Validation(format!(
                "negative unit price for product {}",
                item.product_id
            )));
        }
        total += item.line_total();
    }
    Ok(total)
}

impl Order {
    /// Cart checkout: no upfront charge, order starts `pending`.
    pub fn pending(
        buyer_id: impl Into<String>,
        line_items: Vec<LineItem>,
        shipping_address: ShippingAddress,
    ) -> Result<Self> {
        let total_amount = validate_items(&line_items)?;
        let now = Utc::now();
        Ok(Self {
            id: OrderId::new(),
            buyer_id: buyer_id.into(),
            line_items,
            total_amount,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            shipping_address: Some(shipping_address),
            payment_intent_ref: None,
            refund_ref: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Single-item checkout: the charge was already captured, order starts
    /// `processing` with the gateway's payment reference attached.
    pub fn processing(
        buyer_id: impl Into<String>,
        item: LineItem,
        payment_intent_ref: impl Into<String>,
    ) -> Result<Self> {
        let line_items = vec![item];
        let total_amount = validate_items(&line_items)?;
        let now = Utc::now();
        Ok(Self {
            id: OrderId::new(),
            buyer_id: buyer_id.into(),
            line_items,
            total_amount,
            status: OrderStatus::Processing,
            payment_status: PaymentStatus::Paid,
            shipping_address: None,
            payment_intent_ref: Some(payment_intent_ref.into()),
            refund_ref: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Seller ids referenced by this order, de-duplicated, in first-seen order.
    pub fn distinct_sellers(&self) -> Vec<String> {
        let mut sellers: Vec<String> = Vec::new();
        for item in &self.line_items {
            if !sellers.contains(&item.seller_id) {
                sellers.push(item.seller_id.clone());
            }
        }
        sellers
    }

    pub fn involves_seller(&self, seller_id: &str) -> bool {
        self.line_items.iter().any(|item| item.seller_id == seller_id)
    }

    /// Applies a change and bumps `updated_at`. Callers go through the
    /// store's conditional update; this never checks the prior status itself.
    pub fn apply(&mut self, change: OrderChange) {
        match change {
            OrderChange::Cancel => self.status = OrderStatus::Cancelled,
            OrderChange::RecordRefund { refund_ref } => {
                self.payment_status = PaymentStatus::Refunded;
                self.refund_ref = Some(refund_ref);
            }
            OrderChange::Dispute => self.status = OrderStatus::Disputed,
            OrderChange::Status(status) => self.status = status,
        }
        self.updated_at = Utc::now();
    }
}

/// Converts a decimal amount to integral minor-currency units (cents),
/// rounding half-up. All amounts crossing the gateway boundary go through
/// this; the gateway itself only ever sees integers.
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    let cents = (amount * dec!(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    cents
        .to_i64()
        .ok_or_else(|| OrderError::Validation(format!("amount out of range: {amount}")))
}

/// Platform commission on a sale, rounded half-up to whole cents.
pub fn platform_fee(amount: Decimal, rate: Decimal) -> Decimal {
    (amount * rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
