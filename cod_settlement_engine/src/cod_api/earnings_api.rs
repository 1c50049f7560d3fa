use std::{fmt::Debug, sync::Arc};

use log::*;
use serde_json::json;

use super::record_activity;
use crate::{
    cod_api::earnings_objects::{compute_vendor_earnings, EarningsQueryFilter},
    config::EarningsConfig,
    db_types::{Cents, EarningStatus, NewActivity, Order, OrderItem, OrderStatusType, VendorBalance, VendorEarning},
    helpers::{Clock, SystemClock},
    traits::{ActivityLog, EarningsError, EarningsManagement},
};

/// The vendor earnings ledger.
///
/// Earnings are normally recorded by the order workflow when COD cash is collected. [`EarningsApi::record_earnings`]
/// is for backfills and repairs, and is idempotent per vendor and order.
pub struct EarningsApi<B> {
    db: B,
    config: EarningsConfig,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for EarningsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EarningsApi")
    }
}

impl<B> EarningsApi<B> {
    pub fn new(db: B, config: EarningsConfig) -> Self {
        Self { db, config, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EarningsConfig {
        &self.config
    }
}

impl<B> EarningsApi<B>
where B: EarningsManagement + ActivityLog
{
    /// Records one earning per vendor in the order. Only delivered or completed orders earn anything.
    ///
    /// Returns the earnings that were inserted by this call. Vendors that already have an earning for the order are
    /// skipped, so the result is empty when the call is repeated.
    pub async fn record_earnings(
        &self,
        order: &Order,
        items: &[OrderItem],
        actor: Option<i64>,
    ) -> Result<Vec<VendorEarning>, EarningsError> {
        if !matches!(order.status, OrderStatusType::Delivered | OrderStatusType::Completed) {
            return Err(EarningsError::OrderNotDelivered { order_id: order.order_id.clone(), status: order.status });
        }
        let now = self.clock.now();
        let earnings =
            compute_vendor_earnings(&order.order_id, items, &self.config, now).map_err(EarningsError::InvalidEarning)?;
        let recorded = self.db.record_earnings(earnings).await?;
        if recorded.is_empty() {
            debug!("💰️ Earnings for order {} were already recorded", order.order_id);
        } else {
            info!("💰️ Recorded {} vendor earnings for order {}", recorded.len(), order.order_id);
            let total = recorded.iter().map(|e| e.net_amount).sum::<Cents>();
            let activity = NewActivity::new(actor, "record_earnings", "order", &order.order_id, now)
                .with_properties(json!({ "earnings": recorded.len(), "net_total": total }));
            record_activity(&self.db, activity).await;
        }
        Ok(recorded)
    }

    /// Releases every pending earning whose hold period has passed. Safe to run from several schedulers at once:
    /// each earning is released exactly once.
    pub async fn make_earnings_available(&self, actor: Option<i64>) -> Result<Vec<VendorEarning>, EarningsError> {
        let now = self.clock.now();
        let released = self.db.make_earnings_available(now).await?;
        if !released.is_empty() {
            info!("💰️ {} earnings have matured and are now available", released.len());
            let activity = NewActivity::new(actor, "release_matured_earnings", "vendor_earnings", "batch", now)
                .with_properties(json!({ "ids": released.iter().map(|e| e.id).collect::<Vec<_>>() }));
            record_activity(&self.db, activity).await;
        }
        Ok(released)
    }

    pub async fn withhold_earning(
        &self,
        id: i64,
        reason: &str,
        actor: Option<i64>,
    ) -> Result<VendorEarning, EarningsError> {
        let now = self.clock.now();
        let earning = self.db.withhold_earning(id, reason, now).await?;
        info!("💰️ Earning {id} of vendor {} withheld: {reason}", earning.vendor_id);
        let activity =
            NewActivity::new(actor, "withhold", "vendor_earning", id, now).with_properties(json!({ "reason": reason }));
        record_activity(&self.db, activity).await;
        Ok(earning)
    }

    pub async fn release_withheld_earning(&self, id: i64, actor: Option<i64>) -> Result<VendorEarning, EarningsError> {
        let now = self.clock.now();
        let earning = self.db.release_withheld_earning(id, now).await?;
        info!("💰️ Withheld earning {id} of vendor {} released", earning.vendor_id);
        record_activity(&self.db, NewActivity::new(actor, "release", "vendor_earning", id, now)).await;
        Ok(earning)
    }

    pub async fn fetch_earning(&self, id: i64) -> Result<VendorEarning, EarningsError> {
        self.db.fetch_earning(id).await?.ok_or(EarningsError::EarningNotFound(id))
    }

    pub async fn vendor_balance(&self, vendor_id: i64) -> Result<VendorBalance, EarningsError> {
        self.db.vendor_balance(vendor_id).await
    }

    /// The sum of the vendor's earnings that can be paid out now.
    pub async fn available_balance(&self, vendor_id: i64) -> Result<Cents, EarningsError> {
        Ok(self.vendor_balance(vendor_id).await?.available)
    }

    pub async fn pending_balance(&self, vendor_id: i64) -> Result<Cents, EarningsError> {
        Ok(self.vendor_balance(vendor_id).await?.pending)
    }

    pub async fn withheld_balance(&self, vendor_id: i64) -> Result<Cents, EarningsError> {
        Ok(self.vendor_balance(vendor_id).await?.withheld)
    }

    pub async fn earnings_for_vendor(
        &self,
        vendor_id: i64,
        status: Option<EarningStatus>,
    ) -> Result<Vec<VendorEarning>, EarningsError> {
        let filter = EarningsQueryFilter::for_vendor(vendor_id);
        let filter = match status {
            Some(s) => filter.with_status(s),
            None => filter,
        };
        self.db.fetch_earnings(filter).await
    }

    pub async fn earnings_for_order(&self, order: &Order) -> Result<Vec<VendorEarning>, EarningsError> {
        self.db.fetch_earnings(EarningsQueryFilter::for_order(order.order_id.clone())).await
    }

    pub async fn search_earnings(&self, filter: EarningsQueryFilter) -> Result<Vec<VendorEarning>, EarningsError> {
        self.db.fetch_earnings(filter).await
    }
}
