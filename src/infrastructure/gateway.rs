use crate::domain::ports::{FeeSplit, PaymentGateway};
use crate::error::{OrderError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// One captured charge as seen by the simulated processor.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRecord {
    pub payment_ref: String,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method: String,
    pub split: Option<FeeSplit>,
}

/// Deterministic stand-in for the external payment processor.
///
/// Payment methods prefixed `pm_declined` decline, `pm_error` fault the
/// gateway; anything else captures with sequential `pay-N` references.
/// Every charge and refund is recorded so tests and the CLI can inspect
/// exactly what crossed the trust boundary.
#[derive(Default, Clone)]
pub struct SimulatedGateway {
    charge_seq: Arc<AtomicU64>,
    refund_seq: Arc<AtomicU64>,
    charges: Arc<Mutex<Vec<ChargeRecord>>>,
    refunded: Arc<Mutex<HashSet<String>>>,
    refunds: Arc<Mutex<Vec<String>>>,
    fail_refunds: Arc<AtomicBool>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent refund fail with a gateway error.
    pub fn set_fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    /// Shared view of captured charges, in capture order.
    pub fn charges(&self) -> Arc<Mutex<Vec<ChargeRecord>>> {
        Arc::clone(&self.charges)
    }

    /// Shared view of refunded payment references, in refund order.
    pub fn refunds(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.refunds)
    }

    fn known_ref(&self, payment_ref: &str) -> bool {
        self.charges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|charge| charge.payment_ref == payment_ref)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn authorize_and_capture(
        &self,
        amount_minor: i64,
        currency: &str,
        payment_method: &str,
        split: Option<FeeSplit>,
    ) -> Result<String> {
        if amount_minor <= 0 {
            return Err(OrderError::PaymentGateway(
                "capture amount must be positive".to_string(),
            ));
        }
        if payment_method.starts_with("pm_declined") {
            return Err(OrderError::PaymentDeclined(format!(
                "{payment_method} was declined"
            )));
        }
        if payment_method.starts_with("pm_error") {
            return Err(OrderError::PaymentGateway(
                "processor unavailable".to_string(),
            ));
        }

        let n = self.charge_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let payment_ref = format!("pay-{n}");
        info!(payment_ref = %payment_ref, amount_minor, currency, "simulated capture");
        self.charges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ChargeRecord {
                payment_ref: payment_ref.clone(),
                amount_minor,
                currency: currency.to_string(),
                payment_method: payment_method.to_string(),
                split,
            });
        Ok(payment_ref)
    }

    async fn refund(&self, payment_ref: &str) -> Result<String> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(OrderError::PaymentGateway(
                "refund rejected by processor".to_string(),
            ));
        }
        if !self.known_ref(payment_ref) {
            return Err(OrderError::PaymentGateway(format!(
                "unknown payment ref {payment_ref}"
            )));
        }
        {
            let mut refunded = self
                .refunded
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !refunded.insert(payment_ref.to_string()) {
                return Err(OrderError::PaymentGateway(format!(
                    "{payment_ref} was already refunded"
                )));
            }
        }

        let n = self.refund_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let refund_ref = format!("re-{n}");
        info!(payment_ref = %payment_ref, refund_ref = %refund_ref, "simulated refund");
        self.refunds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payment_ref.to_string());
        Ok(refund_ref)
    }
}
