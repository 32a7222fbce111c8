use crate::error::{OrderError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    /// Register an account with the directory.
    Account,
    /// Register a catalog listing.
    Listing,
    /// Stage a line in the user's cart.
    Add,
    /// Submit the staged cart as a pending order.
    Checkout,
    /// Single-item direct-charge purchase.
    Buy,
    Cancel,
    Dispute,
    /// Administrative status change, `value` = `expected:new`.
    Update,
    /// Seller volume and revenue statistics, `user` = seller.
    Summary,
}

/// One scenario row.
///
/// Columns are reused across ops: `account` rows carry the role in `value`
/// and an optional payout destination in `payment_method`; `listing` rows
/// carry the seller in `user` and the price in `value`; `checkout` carries
/// the shipping address in `value`; `dispute` the reason. Order references
/// are `@N`, the N-th order created during the run.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Command {
    pub op: Op,
    pub user: String,
    pub order: Option<String>,
    pub product: Option<String>,
    pub quantity: Option<u32>,
    pub payment_method: Option<String>,
    pub value: Option<String>,
}

/// Reads scenario commands from a CSV source.
///
/// Wraps `csv::Reader` and yields `Result<Command>` lazily, so large
/// scenarios stream without loading the whole file.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(OrderError::from))
    }
}
