use crate::domain::audit::AuditLogEntry;
use crate::domain::order::{Order, OrderChange, OrderId, OrderStatus};
use crate::domain::ports::{
    Account, AccountResolver, AuditLog, CatalogResolver, Listing, OrderStore,
};
use crate::error::{OrderError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};
use tokio::sync::RwLock;

/// A thread-safe in-memory order store.
///
/// The conditional update performs its expected-status check and the
/// mutation under a single write lock, which gives the compare-and-swap
/// semantics the engine relies on: two racing transitions against the same
/// order resolve to one success and one conflict.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: Order) -> Result<Order> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(OrderError::Conflict(format!(
                "order {} already exists",
                order.id
            )));
        }
        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: &OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(id).cloned())
    }

    async fn transition(
        &self,
        id: &OrderId,
        expected: Option<OrderStatus>,
        change: OrderChange,
    ) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| OrderError::NotFound(format!("order {id}")))?;
        if let Some(expected) = expected
            && order.status != expected
        {
            return Err(OrderError::Conflict(format!(
                "expected status {expected}, order is {}",
                order.status
            )));
        }
        order.apply(change);
        Ok(order.clone())
    }

    async fn find_by_buyer(&self, buyer_id: &str) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut found: Vec<Order> = orders
            .values()
            .filter(|order| order.buyer_id == buyer_id)
            .cloned()
            .collect();
        found.sort_by_key(|order| order.created_at);
        Ok(found)
    }

    async fn find_by_seller(&self, seller_id: &str) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut found: Vec<Order> = orders
            .values()
            .filter(|order| order.involves_seller(seller_id))
            .cloned()
            .collect();
        found.sort_by_key(|order| order.created_at);
        Ok(found)
    }
}

/// Append-only in-memory audit trail.
#[derive(Default, Clone)]
pub struct InMemoryAuditLog {
    entries: Arc<RwLock<Vec<AuditLogEntry>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, entry: AuditLogEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.push(entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<AuditLogEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.clone())
    }
}

/// In-memory stand-in for the external account and catalog services.
///
/// Registration is synchronous so fixtures can be loaded before the engine
/// starts; lookups go through the resolver ports.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    accounts: Arc<StdRwLock<HashMap<String, Account>>>,
    listings: Arc<StdRwLock<HashMap<String, Listing>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, account: Account) {
        self.accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account.id.clone(), account);
    }

    pub fn add_listing(&self, listing: Listing) {
        self.listings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(listing.id.clone(), listing);
    }
}

#[async_trait]
impl AccountResolver for InMemoryDirectory {
    async fn get(&self, user_id: &str) -> Result<Option<Account>> {
        let accounts = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(accounts.get(user_id).cloned())
    }
}

#[async_trait]
impl CatalogResolver for InMemoryDirectory {
    async fn get(&self, product_id: &str) -> Result<Option<Listing>> {
        let listings = self
            .listings
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(listings.get(product_id).cloned())
    }
}
