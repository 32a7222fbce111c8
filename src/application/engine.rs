use crate::config::EngineConfig;
use crate::domain::audit::{AuditAction, AuditLogEntry};
use crate::domain::order::{
    LineItem, Order, OrderChange, OrderId, OrderStatus, PaymentStatus, ShippingAddress,
    platform_fee, to_minor_units,
};
use crate::domain::ports::{
    Account, AccountResolverBox, AuditLogBox, CatalogResolverBox, FeeSplit, Listing,
    OrderStoreBox, PaymentGatewayBox, Role,
};
use crate::error::{OrderError, Result};
use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

/// One cart position as submitted by the buyer. Prices are never taken
/// from the request; they are snapshotted from the catalog at checkout.
#[derive(Debug, Clone)]
pub struct CartItem {
    pub product_id: String,
    pub quantity: u32,
}

/// Seller dashboard view: the seller's orders plus volume and revenue
/// statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct SellerSummary {
    pub seller_id: String,
    pub orders: Vec<Order>,
    pub order_count: usize,
    pub pending_count: usize,
    /// Revenue over paid or completed orders, counting only this seller's
    /// own line items of each order.
    pub settled_revenue: Decimal,
}

/// The order lifecycle and payment-settlement engine.
///
/// Validates preconditions, computes amounts, drives payment-gateway calls,
/// persists state transitions through the store's conditional update, and
/// appends an audit entry for every committed transition. Owns its ports;
/// one instance serves all requests.
pub struct OrderEngine {
    orders: OrderStoreBox,
    audit: AuditLogBox,
    gateway: PaymentGatewayBox,
    accounts: AccountResolverBox,
    catalog: CatalogResolverBox,
    config: EngineConfig,
}

impl OrderEngine {
    pub fn new(
        orders: OrderStoreBox,
        audit: AuditLogBox,
        gateway: PaymentGatewayBox,
        accounts: AccountResolverBox,
        catalog: CatalogResolverBox,
        config: EngineConfig,
    ) -> Self {
        Self {
            orders,
            audit,
            gateway,
            accounts,
            catalog,
            config,
        }
    }

    async fn resolve_account(&self, user_id: &str) -> Result<Account> {
        self.accounts
            .get(user_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("account {user_id}")))
    }

    async fn resolve_listing(&self, product_id: &str) -> Result<Listing> {
        self.catalog
            .get(product_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("product {product_id}")))
    }

    /// Gateway capture with a bounded timeout. A timeout means the outcome
    /// is unknown; we fail closed and never create the order on a guess.
    async fn capture(
        &self,
        amount_minor: i64,
        payment_method: &str,
        split: Option<FeeSplit>,
    ) -> Result<String> {
        let call = self.gateway.authorize_and_capture(
            amount_minor,
            &self.config.currency,
            payment_method,
            split,
        );
        match tokio::time::timeout(self.config.gateway_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(OrderError::PaymentGateway(
                "capture timed out, outcome unknown".to_string(),
            )),
        }
    }

    async fn refund(&self, payment_ref: &str) -> Result<String> {
        match tokio::time::timeout(self.config.gateway_timeout, self.gateway.refund(payment_ref))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(OrderError::PaymentGateway(
                "refund timed out".to_string(),
            )),
        }
    }

    /// Audit append for an already-committed transition. A failure here is
    /// reported as its own kind so the gap is observable.
    async fn record(&self, entry: AuditLogEntry) -> Result<()> {
        if let Err(err) = self.audit.append(entry).await {
            error!(error = %err, "audit append failed after committed transition");
            return Err(OrderError::AuditUnrecorded(err.to_string()));
        }
        Ok(())
    }

    /// Cart checkout: creates a `pending` order with no upfront charge.
    ///
    /// Every product is resolved against the catalog and its price and
    /// seller snapshotted into the order. Nothing is persisted unless the
    /// whole cart validates.
    #[instrument(skip(self, items), fields(buyer = %buyer_id))]
    pub async fn create_cart_order(
        &self,
        buyer_id: &str,
        items: &[CartItem],
        shipping_address: &str,
    ) -> Result<Order> {
        if items.is_empty() {
            return Err(OrderError::Validation("cart is empty".to_string()));
        }
        let address = ShippingAddress::new(shipping_address)?;
        let buyer = self.resolve_account(buyer_id).await?;

        let mut line_items = Vec::with_capacity(items.len());
        for item in items {
            let listing = self.resolve_listing(&item.product_id).await?;
            line_items.push(LineItem {
                product_id: listing.id,
                quantity: item.quantity,
                unit_price: listing.price,
                seller_id: listing.seller_id,
            });
        }

        let order = Order::pending(buyer.id, line_items, address)?;
        let created = self.orders.create(order).await?;
        info!(order = %created.id, total = %created.total_amount, "cart order created");

        // One audit entry per distinct seller, each carrying the whole-order
        // amount. Seller-apportioned amounts are a future enhancement.
        for seller_id in created.distinct_sellers() {
            self.record(AuditLogEntry::new(
                created.id,
                buyer_id,
                Some(seller_id),
                created.total_amount,
                AuditAction::OrderCreated,
            ))
            .await?;
        }

        Ok(created)
    }

    /// Single-item checkout with an upfront commission-split charge.
    ///
    /// The full amount is captured in one atomic gateway call, with the
    /// platform fee retained and the remainder routed to the seller's
    /// payout destination. The order is only persisted once the gateway
    /// confirms the capture; if persistence then fails, a compensating
    /// refund is issued before the error surfaces, so a charge never
    /// outlives a missing order.
    #[instrument(skip(self), fields(buyer = %buyer_id, product = %product_id))]
    pub async fn create_direct_order(
        &self,
        buyer_id: &str,
        product_id: &str,
        payment_method: &str,
    ) -> Result<Order> {
        let buyer = self.resolve_account(buyer_id).await?;
        let listing = self.resolve_listing(product_id).await?;
        let seller = self.resolve_account(&listing.seller_id).await?;

        // Rejected before any gateway call.
        let payout_destination = seller.payout_destination.ok_or_else(|| {
            OrderError::Validation(format!(
                "seller {} has no payout destination configured",
                seller.id
            ))
        })?;
        if listing.price <= Decimal::ZERO {
            return Err(OrderError::Validation(format!(
                "listing {} is free, nothing to charge",
                listing.id
            )));
        }

        let fee = platform_fee(listing.price, self.config.commission_rate);
        let amount_minor = to_minor_units(listing.price)?;
        let fee_minor = to_minor_units(fee)?;

        let payment_ref = self
            .capture(
                amount_minor,
                payment_method,
                Some(FeeSplit {
                    platform_fee_minor: fee_minor,
                    payout_destination,
                }),
            )
            .await?;
        info!(payment_ref = %payment_ref, amount_minor, fee_minor, "charge captured");

        let item = LineItem {
            product_id: listing.id,
            quantity: 1,
            unit_price: listing.price,
            seller_id: listing.seller_id.clone(),
        };
        let order = Order::processing(buyer.id, item, payment_ref.clone())?;

        let created = match self.orders.create(order).await {
            Ok(created) => created,
            Err(err) => {
                // The charge already landed; undo it before surfacing.
                warn!(payment_ref = %payment_ref, error = %err, "store write failed after capture, refunding");
                match self.refund(&payment_ref).await {
                    Ok(refund_ref) => {
                        info!(refund_ref = %refund_ref, "compensating refund issued")
                    }
                    Err(refund_err) => {
                        error!(payment_ref = %payment_ref, error = %refund_err,
                            "compensating refund failed, charge stranded")
                    }
                }
                return Err(err);
            }
        };
        info!(order = %created.id, "direct order created");

        self.record(AuditLogEntry::new(
            created.id,
            buyer_id,
            Some(listing.seller_id),
            created.total_amount,
            AuditAction::OrderCreated,
        ))
        .await?;

        Ok(created)
    }

    /// Point lookup, restricted to the owning buyer, an admin, or a seller
    /// with a line item in the order.
    pub async fn get_order(&self, id: &OrderId, requester: &str) -> Result<Order> {
        let order = self
            .orders
            .get(id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {id}")))?;

        if order.buyer_id == requester {
            return Ok(order);
        }
        match self.accounts.get(requester).await? {
            Some(account) if account.role == Role::Admin => Ok(order),
            Some(account) if order.involves_seller(&account.id) => Ok(order),
            _ => Err(OrderError::Authorization(format!(
                "user {requester} may not view order {id}"
            ))),
        }
    }

    /// Cancels a `processing` order, refunding the captured payment.
    ///
    /// The cancellation is claimed first through the store's atomic guard,
    /// so of two concurrent cancels exactly one reaches the gateway. If the
    /// refund then fails, the claim is rolled back and the order is left in
    /// `processing` with no partial cancellation. A refund that succeeds is
    /// always recorded and audited, even if a dispute changed the status
    /// while the gateway call was in flight.
    #[instrument(skip(self), fields(order = %id, buyer = %buyer_id))]
    pub async fn cancel_order(&self, id: &OrderId, buyer_id: &str) -> Result<Order> {
        let order = self
            .orders
            .get(id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {id}")))?;

        if order.buyer_id != buyer_id {
            return Err(OrderError::Authorization(format!(
                "user {buyer_id} may not cancel order {id}"
            )));
        }
        if order.status != OrderStatus::Processing {
            return Err(OrderError::Conflict(format!(
                "only processing orders can be cancelled, order is {}",
                order.status
            )));
        }

        let claimed = self
            .orders
            .transition(id, Some(OrderStatus::Processing), OrderChange::Cancel)
            .await?;

        let cancelled = if let Some(payment_ref) = claimed.payment_intent_ref.clone() {
            match self.refund(&payment_ref).await {
                Ok(refund_ref) => {
                    info!(refund_ref = %refund_ref, "refund confirmed");
                    // Payment fields are orthogonal to status. A concurrent
                    // dispute may have moved the order off `cancelled` while
                    // the gateway was working; the refund happened either
                    // way and must land on the order unconditionally.
                    self.orders
                        .transition(id, None, OrderChange::RecordRefund { refund_ref })
                        .await?
                }
                Err(err) => {
                    warn!(error = %err, "refund failed, restoring order to processing");
                    match self
                        .orders
                        .transition(
                            id,
                            Some(OrderStatus::Cancelled),
                            OrderChange::Status(OrderStatus::Processing),
                        )
                        .await
                    {
                        Ok(_) => {}
                        Err(OrderError::Conflict(_)) => {
                            // A dispute overrode the claim; its status wins
                            // and the order stays paid.
                            warn!("order status changed during refund, leaving it");
                        }
                        Err(rollback_err) => {
                            error!(error = %rollback_err, "rollback after failed refund also failed");
                        }
                    }
                    return Err(err);
                }
            }
        } else {
            // Nothing was ever charged; the status change is the whole story.
            claimed
        };

        self.record(AuditLogEntry::new(
            cancelled.id,
            buyer_id,
            None,
            cancelled.total_amount,
            AuditAction::OrderCancelled,
        ))
        .await?;
        if cancelled.refund_ref.is_some() {
            self.record(AuditLogEntry::new(
                cancelled.id,
                buyer_id,
                None,
                cancelled.total_amount,
                AuditAction::OrderRefunded,
            ))
            .await?;
        }

        Ok(cancelled)
    }

    /// Administrative status override, guarded by the caller's view of the
    /// current status so racing updates cannot silently clobber each other.
    ///
    /// The actor is resolved before anything else; an unresolvable actor
    /// fails closed.
    #[instrument(skip(self), fields(order = %id, actor = %actor_id))]
    pub async fn update_order(
        &self,
        id: &OrderId,
        actor_id: &str,
        expected: OrderStatus,
        new_status: OrderStatus,
    ) -> Result<Order> {
        let actor = self.accounts.get(actor_id).await?.ok_or_else(|| {
            OrderError::Authorization(format!("acting user {actor_id} could not be resolved"))
        })?;
        if actor.role != Role::Admin {
            return Err(OrderError::Authorization(format!(
                "user {actor_id} lacks the admin role"
            )));
        }

        let updated = self
            .orders
            .transition(id, Some(expected), OrderChange::Status(new_status))
            .await?;
        info!(from = %expected, to = %new_status, "order status updated");

        self.record(AuditLogEntry::new(
            updated.id,
            actor_id,
            None,
            updated.total_amount,
            AuditAction::OrderUpdated,
        ))
        .await?;

        Ok(updated)
    }

    /// Marks an order disputed. Dispute is an override: it fires from any
    /// prior status, but only for the owning buyer and with a reason.
    #[instrument(skip(self, reason), fields(order = %id, buyer = %buyer_id))]
    pub async fn raise_dispute(&self, id: &OrderId, buyer_id: &str, reason: &str) -> Result<Order> {
        if reason.trim().is_empty() {
            return Err(OrderError::Validation(
                "dispute reason is required".to_string(),
            ));
        }

        let order = self
            .orders
            .get(id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {id}")))?;
        if order.buyer_id != buyer_id {
            return Err(OrderError::Authorization(format!(
                "user {buyer_id} may not raise a dispute for order {id}"
            )));
        }

        let disputed = self.orders.transition(id, None, OrderChange::Dispute).await?;
        info!(reason, "dispute raised");

        self.record(AuditLogEntry::new(
            disputed.id,
            buyer_id,
            None,
            disputed.total_amount,
            AuditAction::DisputeRaised,
        ))
        .await?;

        Ok(disputed)
    }

    pub async fn orders_for_buyer(&self, buyer_id: &str) -> Result<Vec<Order>> {
        self.orders.find_by_buyer(buyer_id).await
    }

    pub async fn orders_for_seller(&self, seller_id: &str) -> Result<Vec<Order>> {
        self.orders.find_by_seller(seller_id).await
    }

    /// Seller dashboard: the seller's orders plus revenue and volume
    /// statistics. Revenue counts paid or completed orders only, and within
    /// each order only the line items belonging to this seller.
    #[instrument(skip(self), fields(seller = %seller_id))]
    pub async fn seller_summary(&self, seller_id: &str) -> Result<SellerSummary> {
        let seller = self.resolve_account(seller_id).await?;
        let orders = self.orders.find_by_seller(&seller.id).await?;

        let order_count = orders.len();
        let pending_count = orders
            .iter()
            .filter(|order| order.status == OrderStatus::Pending)
            .count();
        let settled_revenue = orders
            .iter()
            .filter(|order| {
                order.payment_status == PaymentStatus::Paid
                    || order.status == OrderStatus::Completed
            })
            .flat_map(|order| &order.line_items)
            .filter(|item| item.seller_id == seller.id)
            .map(LineItem::line_total)
            .sum();

        Ok(SellerSummary {
            seller_id: seller.id,
            orders,
            order_count,
            pending_count,
            settled_revenue,
        })
    }

    /// Reserved for a future deferred-settlement policy. Not a silent no-op.
    pub async fn hold_in_escrow(&self, _id: &OrderId) -> Result<Order> {
        Err(OrderError::Unimplemented("escrow hold"))
    }

    /// Reserved for a future deferred-settlement policy. Not a silent no-op.
    pub async fn release_escrow(&self, _id: &OrderId) -> Result<Order> {
        Err(OrderError::Unimplemented("escrow release"))
    }

    /// Reserved: refunds outside the cancellation path are not specified.
    pub async fn refund_order(&self, _id: &OrderId) -> Result<Order> {
        Err(OrderError::Unimplemented("standalone refund"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::AuditLog;
    use crate::infrastructure::gateway::SimulatedGateway;
    use crate::infrastructure::in_memory::{
        InMemoryAuditLog, InMemoryDirectory, InMemoryOrderStore,
    };
    use rust_decimal_macros::dec;

    fn directory() -> InMemoryDirectory {
        let dir = InMemoryDirectory::new();
        dir.add_account(Account {
            id: "buyer-1".to_string(),
            email: "b1@example.com".to_string(),
            role: Role::Buyer,
            payout_destination: None,
        });
        dir.add_account(Account {
            id: "seller-1".to_string(),
            email: "s1@example.com".to_string(),
            role: Role::Seller,
            payout_destination: Some("acct_s1".to_string()),
        });
        dir.add_account(Account {
            id: "seller-2".to_string(),
            email: "s2@example.com".to_string(),
            role: Role::Seller,
            payout_destination: None,
        });
        dir.add_listing(Listing {
            id: "prod-1".to_string(),
            title: "Widget".to_string(),
            price: dec!(50.00),
            seller_id: "seller-1".to_string(),
        });
        dir.add_listing(Listing {
            id: "prod-2".to_string(),
            title: "Gadget".to_string(),
            price: dec!(10.00),
            seller_id: "seller-2".to_string(),
        });
        dir
    }

    fn engine_with(gateway: SimulatedGateway) -> (OrderEngine, InMemoryAuditLog) {
        let audit = InMemoryAuditLog::new();
        let dir = directory();
        let engine = OrderEngine::new(
            Box::new(InMemoryOrderStore::new()),
            Box::new(audit.clone()),
            Box::new(gateway),
            Box::new(dir.clone()),
            Box::new(dir),
            EngineConfig::default(),
        );
        (engine, audit)
    }

    #[tokio::test]
    async fn test_cart_order_fans_out_audit_per_seller() {
        let (engine, audit) = engine_with(SimulatedGateway::new());

        let order = engine
            .create_cart_order(
                "buyer-1",
                &[
                    CartItem {
                        product_id: "prod-1".to_string(),
                        quantity: 2,
                    },
                    CartItem {
                        product_id: "prod-2".to_string(),
                        quantity: 1,
                    },
                ],
                "12 Main St",
            )
            .await
            .unwrap();

        assert_eq!(order.total_amount, dec!(110.00));
        assert_eq!(order.status, OrderStatus::Pending);

        let entries = audit.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        let sellers: Vec<_> = entries
            .iter()
            .map(|e| e.seller_id.clone().unwrap())
            .collect();
        assert_eq!(sellers, vec!["seller-1", "seller-2"]);
        for entry in &entries {
            assert_eq!(entry.amount, dec!(110.00));
            assert_eq!(entry.action, AuditAction::OrderCreated);
        }
    }

    #[tokio::test]
    async fn test_cart_order_rejects_unknown_product() {
        let (engine, audit) = engine_with(SimulatedGateway::new());
        let result = engine
            .create_cart_order(
                "buyer-1",
                &[CartItem {
                    product_id: "prod-missing".to_string(),
                    quantity: 1,
                }],
                "12 Main St",
            )
            .await;
        assert!(matches!(result, Err(OrderError::NotFound(_))));
        assert!(audit.entries().await.unwrap().is_empty());
        assert!(engine.orders_for_buyer("buyer-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_direct_order_requires_payout_destination() {
        let gateway = SimulatedGateway::new();
        let charges = gateway.charges();
        let (engine, audit) = engine_with(gateway);

        // prod-2 belongs to seller-2, who has no payout destination
        let result = engine
            .create_direct_order("buyer-1", "prod-2", "pm_card_visa")
            .await;
        assert!(matches!(result, Err(OrderError::Validation(_))));

        // Rejected before any gateway call
        assert!(charges.lock().unwrap().is_empty());
        assert!(audit.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_direct_order_charges_with_fee_split() {
        let gateway = SimulatedGateway::new();
        let charges = gateway.charges();
        let (engine, _) = engine_with(gateway);

        let order = engine
            .create_direct_order("buyer-1", "prod-1", "pm_card_visa")
            .await
            .unwrap();
        assert_eq!(order.payment_intent_ref.as_deref(), Some("pay-1"));

        let recorded = charges.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].amount_minor, 5000);
        let split = recorded[0].split.clone().unwrap();
        assert_eq!(split.platform_fee_minor, 500);
        assert_eq!(split.payout_destination, "acct_s1");
    }

    #[tokio::test]
    async fn test_direct_order_decline_leaves_no_state() {
        let (engine, audit) = engine_with(SimulatedGateway::new());

        let result = engine
            .create_direct_order("buyer-1", "prod-1", "pm_declined_insufficient")
            .await;
        assert!(matches!(result, Err(OrderError::PaymentDeclined(_))));
        assert!(engine.orders_for_buyer("buyer-1").await.unwrap().is_empty());
        assert!(audit.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_escrow_slots_are_reserved() {
        let (engine, _) = engine_with(SimulatedGateway::new());
        let id = OrderId::new();
        assert!(matches!(
            engine.hold_in_escrow(&id).await,
            Err(OrderError::Unimplemented(_))
        ));
        assert!(matches!(
            engine.release_escrow(&id).await,
            Err(OrderError::Unimplemented(_))
        ));
        assert!(matches!(
            engine.refund_order(&id).await,
            Err(OrderError::Unimplemented(_))
        ));
    }
}
