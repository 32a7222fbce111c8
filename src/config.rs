use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

/// Engine configuration.
///
/// The commission rate is the fraction of a direct-charge sale retained by
/// the platform; the remainder is routed to the seller's payout destination.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub commission_rate: Decimal,
    pub currency: String,
    /// Upper bound on any single gateway call. A capture that exceeds this
    /// is treated as unknown-outcome and fails closed.
    pub gateway_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            commission_rate: dec!(0.10),
            currency: "usd".to_string(),
            gateway_timeout: Duration::from_secs(10),
        }
    }
}
