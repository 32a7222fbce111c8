use crate::application::engine::SellerSummary;
use crate::domain::audit::AuditLogEntry;
use crate::domain::order::Order;
use crate::error::Result;
use std::io::Write;

/// Writes the final run state as CSV: one section for orders, one for the
/// audit trail.
pub struct ReportWriter<W: Write> {
    writer: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_orders(&mut self, orders: &[Order]) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(&mut self.writer);
        csv_writer.write_record([
            "order",
            "buyer",
            "status",
            "payment_status",
            "total",
            "payment_ref",
            "refund_ref",
        ])?;
        for order in orders {
            csv_writer.write_record([
                order.id.to_string(),
                order.buyer_id.clone(),
                order.status.to_string(),
                order.payment_status.to_string(),
                order.total_amount.to_string(),
                order.payment_intent_ref.clone().unwrap_or_default(),
                order.refund_ref.clone().unwrap_or_default(),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_audit(&mut self, entries: &[AuditLogEntry]) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(&mut self.writer);
        csv_writer.write_record(["order", "actor", "seller", "amount", "action"])?;
        for entry in entries {
            csv_writer.write_record([
                entry.order_id.to_string(),
                entry.actor_user_id.clone(),
                entry.seller_id.clone().unwrap_or_default(),
                entry.amount.to_string(),
                entry.action.to_string(),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_seller_summaries(&mut self, summaries: &[SellerSummary]) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(&mut self.writer);
        csv_writer.write_record(["seller", "orders", "pending", "revenue"])?;
        for summary in summaries {
            csv_writer.write_record([
                summary.seller_id.clone(),
                summary.order_count.to_string(),
                summary.pending_count.to_string(),
                summary.settled_revenue.to_string(),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}
