use crate::domain::audit::AuditLogEntry;
use crate::domain::order::{Order, OrderChange, OrderId, OrderStatus};
use crate::domain::ports::{AuditLog, OrderStore};
use crate::error::{OrderError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Column Family for order aggregates, keyed by order id.
pub const CF_ORDERS: &str = "orders";
/// Column Family for audit entries, keyed by an append sequence number.
pub const CF_AUDIT: &str = "audit";

fn storage_err(context: &str, err: impl std::fmt::Display) -> OrderError {
    OrderError::Storage(format!("{context}: {err}"))
}

/// Persistent store backed by RocksDB, serving both the order store and
/// the audit log (feature `storage-rocksdb`).
///
/// Orders and audit entries are serialized as JSON into separate column
/// families. Conditional updates are serialized through a single writer
/// mutex so the expected-status check and the write stay atomic.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
    audit_seq: Arc<AtomicU64>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the given path, ensuring the
    /// required column families exist and seeding the audit sequence from
    /// the last persisted entry.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_orders = ColumnFamilyDescriptor::new(CF_ORDERS, Options::default());
        let cf_audit = ColumnFamilyDescriptor::new(CF_AUDIT, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_orders, cf_audit])
            .map_err(|e| storage_err("open", e))?;

        let audit_seq = match db.cf_handle(CF_AUDIT) {
            Some(cf) => {
                let mut last = 0u64;
                if let Some(item) = db.iterator_cf(&cf, IteratorMode::End).next() {
                    let (key, _) = item.map_err(|e| storage_err("audit scan", e))?;
                    if let Ok(bytes) = <[u8; 8]>::try_from(key.as_ref()) {
                        last = u64::from_be_bytes(bytes);
                    }
                }
                last
            }
            None => 0,
        };

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
            audit_seq: Arc::new(AtomicU64::new(audit_seq)),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| OrderError::Storage(format!("column family {name} not found")))
    }

    fn read_order(&self, id: &OrderId) -> Result<Option<Order>> {
        let cf = self.cf(CF_ORDERS)?;
        let key = id.to_string();
        match self
            .db
            .get_cf(&cf, key.as_bytes())
            .map_err(|e| storage_err("get", e))?
        {
            Some(bytes) => {
                let order =
                    serde_json::from_slice(&bytes).map_err(|e| storage_err("decode order", e))?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    fn write_order(&self, order: &Order) -> Result<()> {
        let cf = self.cf(CF_ORDERS)?;
        let key = order.id.to_string();
        let value = serde_json::to_vec(order).map_err(|e| storage_err("encode order", e))?;
        self.db
            .put_cf(&cf, key.as_bytes(), value)
            .map_err(|e| storage_err("put", e))
    }

    fn scan_orders(&self, predicate: impl Fn(&Order) -> bool) -> Result<Vec<Order>> {
        let cf = self.cf(CF_ORDERS)?;
        let mut found = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_key, value) = item.map_err(|e| storage_err("scan", e))?;
            let order: Order =
                serde_json::from_slice(&value).map_err(|e| storage_err("decode order", e))?;
            if predicate(&order) {
                found.push(order);
            }
        }
        found.sort_by_key(|order| order.created_at);
        Ok(found)
    }
}

#[async_trait]
impl OrderStore for RocksDbStore {
    async fn create(&self, order: Order) -> Result<Order> {
        let _guard = self.write_lock.lock().await;
        if self.read_order(&order.id)?.is_some() {
            return Err(OrderError::Conflict(format!(
                "order {} already exists",
                order.id
            )));
        }
        self.write_order(&order)?;
        Ok(order)
    }

    async fn get(&self, id: &OrderId) -> Result<Option<Order>> {
        self.read_order(id)
    }

    async fn transition(
        &self,
        id: &OrderId,
        expected: Option<OrderStatus>,
        change: OrderChange,
    ) -> Result<Order> {
        let _guard = self.write_lock.lock().await;
        let mut order = self
            .read_order(id)?
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
        self.write_order(&order)?;
        Ok(order)
    }

    async fn find_by_buyer(&self, buyer_id: &str) -> Result<Vec<Order>> {
        self.scan_orders(|order| order.buyer_id == buyer_id)
    }

    async fn find_by_seller(&self, seller_id: &str) -> Result<Vec<Order>> {
        self.scan_orders(|order| order.involves_seller(seller_id))
    }
}

#[async_trait]
impl AuditLog for RocksDbStore {
    async fn append(&self, entry: AuditLogEntry) -> Result<()> {
        let cf = self.cf(CF_AUDIT)?;
        let seq = self.audit_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let value = serde_json::to_vec(&entry).map_err(|e| storage_err("encode entry", e))?;
        self.db
            .put_cf(&cf, seq.to_be_bytes(), value)
            .map_err(|e| storage_err("put", e))
    }

    async fn entries(&self) -> Result<Vec<AuditLogEntry>> {
        let cf = self.cf(CF_AUDIT)?;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_key, value) = item.map_err(|e| storage_err("scan", e))?;
            let entry =
                serde_json::from_slice(&value).map_err(|e| storage_err("decode entry", e))?;
            entries.push(entry);
        }
        Ok(entries)
    }
}
