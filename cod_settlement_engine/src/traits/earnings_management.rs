use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    cod_api::earnings_objects::EarningsQueryFilter,
    db_types::{EarningStatus, NewVendorEarning, OrderId, OrderStatusType, VendorBalance, VendorEarning},
};

#[derive(Debug, Clone, Error)]
pub enum EarningsError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Earning {0} does not exist")]
    EarningNotFound(i64),
    #[error("Earning {id} is {status}. {reason}")]
    InvalidStatus { id: i64, status: EarningStatus, reason: &'static str },
    #[error("Earnings can only be recorded for delivered orders. Order {order_id} is {status}")]
    OrderNotDelivered { order_id: OrderId, status: OrderStatusType },
    #[error("Invalid earning: {0}")]
    InvalidEarning(String),
}

impl From<sqlx::Error> for EarningsError {
    fn from(e: sqlx::Error) -> Self {
        EarningsError::DatabaseError(e.to_string())
    }
}

impl EarningsError {
    pub fn is_guard_violation(&self) -> bool {
        matches!(self, Self::InvalidStatus { .. } | Self::OrderNotDelivered { .. })
    }
}

/// The vendor earnings ledger.
///
/// Every status change on an earning is a conditional update on its current status, so batch jobs and payout
/// requests can run concurrently without stepping on each other.
#[allow(async_fn_in_trait)]
pub trait EarningsManagement {
    /// Inserts the earnings in one transaction. Pairs of `(vendor_id, order_id)` that already have an earning are
    /// skipped, so calling this twice for the same order does not double-count. Returns the newly inserted earnings.
    async fn record_earnings(&self, earnings: Vec<NewVendorEarning>) -> Result<Vec<VendorEarning>, EarningsError>;

    /// Moves every `pending` earning whose `available_at` is at or before `now` to `available`.
    /// Returns the earnings that were changed by this call.
    async fn make_earnings_available(&self, now: DateTime<Utc>) -> Result<Vec<VendorEarning>, EarningsError>;

    /// `pending | available -> withheld`
    async fn withhold_earning(&self, id: i64, reason: &str, at: DateTime<Utc>) -> Result<VendorEarning, EarningsError>;

    /// `withheld -> available`. The hold period is not restarted.
    async fn release_withheld_earning(&self, id: i64, at: DateTime<Utc>) -> Result<VendorEarning, EarningsError>;

    async fn fetch_earning(&self, id: i64) -> Result<Option<VendorEarning>, EarningsError>;

    /// Earnings matching the filter, oldest first.
    async fn fetch_earnings(&self, filter: EarningsQueryFilter) -> Result<Vec<VendorEarning>, EarningsError>;

    /// Sums of the vendor's net earnings per status.
    async fn vendor_balance(&self, vendor_id: i64) -> Result<VendorBalance, EarningsError>;
}
