use async_trait::async_trait;
use marketpay::application::engine::OrderEngine;
use marketpay::config::EngineConfig;
use marketpay::domain::audit::AuditLogEntry;
use marketpay::domain::order::{
    LineItem, Order, OrderChange, OrderId, OrderStatus, ShippingAddress,
};
use marketpay::domain::ports::{
    Account, AuditLog, FeeSplit, Listing, OrderStore, PaymentGateway, Role,
};
use marketpay::error::{OrderError, Result};
use marketpay::infrastructure::gateway::SimulatedGateway;
use marketpay::infrastructure::in_memory::{
    InMemoryAuditLog, InMemoryDirectory, InMemoryOrderStore,
};
use rust_decimal_macros::dec;
use std::time::Duration;

/// Accounts and listings shared by the engine suites.
///
/// seller-1..3 are onboarded with payout destinations; admin-1 holds the
/// admin role; intern-1 exists but has no admin role.
pub fn seeded_directory() -> InMemoryDirectory {
    let directory = InMemoryDirectory::new();
    for (id, role, payout) in [
        ("buyer-1", Role::Buyer, None),
        ("buyer-2", Role::Buyer, None),
        ("seller-1", Role::Seller, Some("acct_s1")),
        ("seller-2", Role::Seller, Some("acct_s2")),
        ("seller-3", Role::Seller, Some("acct_s3")),
        ("admin-1", Role::Admin, None),
        ("intern-1", Role::Buyer, None),
    ] {
        directory.add_account(Account {
            id: id.to_string(),
            email: format!("{id}@marketpay.test"),
            role,
            payout_destination: payout.map(str::to_string),
        });
    }
    for (id, price, seller) in [
        ("prod-a", dec!(50.00), "seller-1"),
        ("prod-b", dec!(10.00), "seller-2"),
        ("prod-c", dec!(20.00), "seller-3"),
        ("prod-free", dec!(0.00), "seller-1"),
    ] {
        directory.add_listing(Listing {
            id: id.to_string(),
            title: id.to_string(),
            price,
            seller_id: seller.to_string(),
        });
    }
    directory
}

pub struct Harness {
    pub engine: OrderEngine,
    pub store: InMemoryOrderStore,
    pub audit: InMemoryAuditLog,
    pub gateway: SimulatedGateway,
}

pub fn harness() -> Harness {
    let store = InMemoryOrderStore::new();
    let audit = InMemoryAuditLog::new();
    let gateway = SimulatedGateway::new();
    let directory = seeded_directory();
    let engine = OrderEngine::new(
        Box::new(store.clone()),
        Box::new(audit.clone()),
        Box::new(gateway.clone()),
        Box::new(directory.clone()),
        Box::new(directory),
        EngineConfig::default(),
    );
    Harness {
        engine,
        store,
        audit,
        gateway,
    }
}

/// Puts an order for `buyer` (one line item from seller-1) directly into
/// the store, in the given status.
pub async fn seed_order(store: &InMemoryOrderStore, buyer: &str, status: OrderStatus) -> Order {
    let order = Order::pending(
        buyer,
        vec![LineItem {
            product_id: "prod-a".to_string(),
            quantity: 1,
            unit_price: dec!(50.00),
            seller_id: "seller-1".to_string(),
        }],
        ShippingAddress::new("12 Main St").unwrap(),
    )
    .unwrap();
    let created = store.create(order).await.unwrap();
    if status == OrderStatus::Pending {
        created
    } else {
        store
            .transition(&created.id, None, OrderChange::Status(status))
            .await
            .unwrap()
    }
}

/// Order store whose writes always fail, for exercising the compensating
/// refund path after a successful capture.
#[derive(Default, Clone)]
pub struct FailingOrderStore;

#[async_trait]
impl OrderStore for FailingOrderStore {
    async fn create(&self, _order: Order) -> Result<Order> {
        Err(OrderError::Storage("order store offline".to_string()))
    }

    async fn get(&self, _id: &OrderId) -> Result<Option<Order>> {
        Ok(None)
    }

    async fn transition(
        &self,
        id: &OrderId,
        _expected: Option<OrderStatus>,
        _change: OrderChange,
    ) -> Result<Order> {
        Err(OrderError::NotFound(format!("order {id}")))
    }

    async fn find_by_buyer(&self, _buyer_id: &str) -> Result<Vec<Order>> {
        Ok(Vec::new())
    }

    async fn find_by_seller(&self, _seller_id: &str) -> Result<Vec<Order>> {
        Ok(Vec::new())
    }
}

/// Audit log whose appends always fail, for exercising the
/// committed-but-unaudited reporting path.
#[derive(Default, Clone)]
pub struct FailingAuditLog;

#[async_trait]
impl AuditLog for FailingAuditLog {
    async fn append(&self, _entry: AuditLogEntry) -> Result<()> {
        Err(OrderError::Storage("audit store offline".to_string()))
    }

    async fn entries(&self) -> Result<Vec<AuditLogEntry>> {
        Ok(Vec::new())
    }
}

/// Gateway whose refunds stall for a fixed delay, widening the window
/// between the cancellation claim and the refund record so concurrent
/// operations can land in between.
#[derive(Clone)]
pub struct SlowRefundGateway {
    pub inner: SimulatedGateway,
    pub refund_delay: Duration,
}

#[async_trait]
impl PaymentGateway for SlowRefundGateway {
    async fn authorize_and_capture(
        &self,
        amount_minor: i64,
        currency: &str,
        payment_method: &str,
        split: Option<FeeSplit>,
    ) -> Result<String> {
        self.inner
            .authorize_and_capture(amount_minor, currency, payment_method, split)
            .await
    }

    async fn refund(&self, payment_ref: &str) -> Result<String> {
        tokio::time::sleep(self.refund_delay).await;
        self.inner.refund(payment_ref).await
    }
}

/// Gateway that never answers within any reasonable deadline, for the
/// capture-timeout path.
#[derive(Default, Clone)]
pub struct UnresponsiveGateway;

#[async_trait]
impl PaymentGateway for UnresponsiveGateway {
    async fn authorize_and_capture(
        &self,
        _amount_minor: i64,
        _currency: &str,
        _payment_method: &str,
        _split: Option<FeeSplit>,
    ) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(OrderError::PaymentGateway("gave up".to_string()))
    }

    async fn refund(&self, _payment_ref: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(OrderError::PaymentGateway("gave up".to_string()))
    }
}
