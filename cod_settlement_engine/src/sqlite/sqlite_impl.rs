//! `SqliteDatabase` is a concrete implementation of a settlement backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Every multi-row change is composed from the functions in [`super::db`] inside a single `pool.begin()`
//! transaction, which is rolled back when dropped on an early return.
use std::fmt::Debug;

use chrono::{DateTime, NaiveDate, Utc};
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{activity, db_url, earnings, new_pool, orders, payouts, reconciliations};
use crate::{
    cod_api::{
        earnings_objects::EarningsQueryFilter,
        payout_objects::{select_earnings_for_payout, ReservedEarningsEffect},
        reconciliation_objects::{CollectionTotals, ReconciliationQueryFilter},
    },
    db_types::{
        ActivityRecord,
        Cents,
        CodReconciliation,
        EarningStatus,
        NewActivity,
        NewOrder,
        NewPayoutRequest,
        NewVendorEarning,
        Order,
        OrderAnnotation,
        OrderId,
        OrderItem,
        OrderStatusEntry,
        Payout,
        PayoutDetails,
        ReconciliationNote,
        VendorBalance,
        VendorEarning,
    },
    traits::{
        ActivityLog,
        ActivityLogError,
        EarningsError,
        EarningsManagement,
        LedgerEffect,
        OrderTransition,
        OrderWorkflowDatabase,
        PayoutError,
        PayoutManagement,
        PayoutResult,
        PayoutUpdate,
        ReconciliationError,
        ReconciliationManagement,
        ReconciliationUpdate,
        TransitionResult,
        WorkflowError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderWorkflowDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), WorkflowError> {
        if order.total_price.is_negative() {
            return Err(WorkflowError::InvalidOrder(format!("Order total cannot be negative ({})", order.total_price)));
        }
        if let Some(item) = order.items.iter().find(|i| i.quantity <= 0 || i.price_at_purchase.is_negative()) {
            return Err(WorkflowError::InvalidOrder(format!("Invalid line item '{}'", item.product_name)));
        }
        if order.items_total().is_none() {
            return Err(WorkflowError::InvalidOrder("The line items add up to more than can be represented".into()));
        }
        let mut tx = self.pool.begin().await?;
        let result = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, WorkflowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, WorkflowError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_status_history(&self, order_id: &OrderId) -> Result<Vec<OrderStatusEntry>, WorkflowError> {
        let mut conn = self.pool.acquire().await?;
        let history = orders::fetch_status_history(order_id, &mut conn).await?;
        Ok(history)
    }

    async fn fetch_annotations(&self, order_id: &OrderId) -> Result<Vec<OrderAnnotation>, WorkflowError> {
        let mut conn = self.pool.acquire().await?;
        let annotations = orders::fetch_annotations(order_id, &mut conn).await?;
        Ok(annotations)
    }

    async fn apply_transition(&self, transition: OrderTransition) -> Result<TransitionResult, WorkflowError> {
        let mut tx = self.pool.begin().await?;
        let old_order = orders::fetch_order_by_order_id(&transition.order_id, &mut tx)
            .await?
            .ok_or_else(|| WorkflowError::OrderNotFound(transition.order_id.clone()))?;
        let updated = orders::compare_and_set_status(&transition, &mut tx).await?;
        let new_order = match updated {
            Some(order) => order,
            None if transition.changes.cod_collection.is_some() && old_order.is_cod_collected() => {
                return Err(WorkflowError::CodAlreadyCollected(transition.order_id));
            },
            None => {
                debug!(
                    "🗃️ Order {} was expected to be {} but is {}. Transition to {} abandoned.",
                    transition.order_id, transition.from, old_order.status, transition.to
                );
                return Err(WorkflowError::OrderStatusChanged {
                    order_id: transition.order_id,
                    expected: transition.from,
                });
            },
        };
        let history_entry = orders::insert_status_entry(
            &new_order.order_id,
            new_order.status,
            transition.actor_id,
            transition.comment.as_deref(),
            transition.at,
            &mut tx,
        )
        .await?;
        if let Some(annotation) = &transition.annotation {
            orders::insert_annotation(&new_order.order_id, annotation, transition.at, &mut tx).await?;
        }
        let earnings = match transition.ledger_effect {
            LedgerEffect::None => Vec::new(),
            LedgerEffect::RecordEarnings(new_earnings) => {
                let mut recorded = Vec::with_capacity(new_earnings.len());
                for earning in new_earnings {
                    if let Some(e) = earnings::idempotent_insert(earning, &mut tx).await? {
                        recorded.push(e);
                    }
                }
                recorded
            },
            LedgerEffect::WithholdEarnings { reason } => {
                earnings::withhold_for_order(&new_order.order_id, &reason, transition.at, &mut tx).await?
            },
        };
        tx.commit().await?;
        debug!("🗃️ Order {} moved from {} to {}", new_order.order_id, old_order.status, new_order.status);
        Ok(TransitionResult { old_order, new_order, history_entry, earnings })
    }
}

impl EarningsManagement for SqliteDatabase {
    async fn record_earnings(&self, new_earnings: Vec<NewVendorEarning>) -> Result<Vec<VendorEarning>, EarningsError> {
        if let Some(bad) = new_earnings.iter().find(|e| {
            e.split.gross.is_negative() || e.split.net.is_negative() || !e.split.is_balanced()
        }) {
            return Err(EarningsError::InvalidEarning(format!(
                "Vendor {} on order {}: gross {}, commission {}, net {}",
                bad.vendor_id, bad.order_id, bad.split.gross, bad.split.commission, bad.split.net
            )));
        }
        let mut tx = self.pool.begin().await?;
        let mut recorded = Vec::with_capacity(new_earnings.len());
        for earning in new_earnings {
            if let Some(e) = earnings::idempotent_insert(earning, &mut tx).await? {
                recorded.push(e);
            }
        }
        tx.commit().await?;
        Ok(recorded)
    }

    async fn make_earnings_available(&self, now: DateTime<Utc>) -> Result<Vec<VendorEarning>, EarningsError> {
        let mut conn = self.pool.acquire().await?;
        let released = earnings::release_matured(now, &mut conn).await?;
        Ok(released)
    }

    async fn withhold_earning(&self, id: i64, reason: &str, at: DateTime<Utc>) -> Result<VendorEarning, EarningsError> {
        let mut tx = self.pool.begin().await?;
        let from = [EarningStatus::Pending, EarningStatus::Available];
        let result = earnings::compare_and_set_status(id, &from, EarningStatus::Withheld, Some(reason), at, &mut tx).await?;
        let earning = match result {
            Some(e) => e,
            None => {
                let existing = earnings::fetch_earning(id, &mut tx).await?.ok_or(EarningsError::EarningNotFound(id))?;
                return Err(EarningsError::InvalidStatus {
                    id,
                    status: existing.status,
                    reason: "Only pending or available earnings can be withheld",
                });
            },
        };
        tx.commit().await?;
        Ok(earning)
    }

    async fn release_withheld_earning(&self, id: i64, at: DateTime<Utc>) -> Result<VendorEarning, EarningsError> {
        let mut tx = self.pool.begin().await?;
        let from = [EarningStatus::Withheld];
        let result = earnings::compare_and_set_status(id, &from, EarningStatus::Available, None, at, &mut tx).await?;
        let earning = match result {
            Some(e) => e,
            None => {
                let existing = earnings::fetch_earning(id, &mut tx).await?.ok_or(EarningsError::EarningNotFound(id))?;
                return Err(EarningsError::InvalidStatus {
                    id,
                    status: existing.status,
                    reason: "Only withheld earnings can be released",
                });
            },
        };
        tx.commit().await?;
        Ok(earning)
    }

    async fn fetch_earning(&self, id: i64) -> Result<Option<VendorEarning>, EarningsError> {
        let mut conn = self.pool.acquire().await?;
        let earning = earnings::fetch_earning(id, &mut conn).await?;
        Ok(earning)
    }

    async fn fetch_earnings(&self, filter: EarningsQueryFilter) -> Result<Vec<VendorEarning>, EarningsError> {
        let mut conn = self.pool.acquire().await?;
        let result = earnings::search_earnings(filter, &mut conn).await?;
        Ok(result)
    }

    async fn vendor_balance(&self, vendor_id: i64) -> Result<VendorBalance, EarningsError> {
        let mut conn = self.pool.acquire().await?;
        let balance = earnings::vendor_balance(vendor_id, &mut conn).await?;
        Ok(balance)
    }
}

impl PayoutManagement for SqliteDatabase {
    async fn create_payout(&self, request: NewPayoutRequest) -> Result<PayoutResult, PayoutError> {
        let mut tx = self.pool.begin().await?;
        let available = payouts::fetch_available_earnings(request.vendor_id, &mut tx).await?;
        let balance: Cents = available.iter().map(|e| e.net_amount).sum();
        let selected = select_earnings_for_payout(&available, request.amount)
            .ok_or(PayoutError::InsufficientBalance { requested: request.amount, available: balance })?;
        let ids = selected.iter().map(|e| e.id).collect::<Vec<_>>();
        trace!("💸️ Reserving {} earnings for payout {}", ids.len(), request.payout_id);
        let reserved = payouts::move_earnings(
            &ids,
            EarningStatus::Available,
            EarningStatus::Processing,
            request.created_at,
            &mut tx,
        )
        .await?;
        let details = PayoutDetails { requested_by: request.requested_by, ..Default::default() };
        let payout = payouts::insert_payout(&request, &reserved, &details, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "💸️ Payout {} of {} created for vendor {}. {} reserved from {} earnings.",
            payout.payout_id, payout.amount, payout.vendor_id, payout.reserved_amount, payout.items_count
        );
        Ok(PayoutResult { payout, earnings: reserved })
    }

    async fn fetch_payout(&self, payout_id: &str) -> Result<Option<Payout>, PayoutError> {
        let mut conn = self.pool.acquire().await?;
        let payout = payouts::fetch_payout(payout_id, &mut conn).await?;
        Ok(payout)
    }

    async fn fetch_payouts_for_vendor(&self, vendor_id: i64) -> Result<Vec<Payout>, PayoutError> {
        let mut conn = self.pool.acquire().await?;
        let result = payouts::fetch_payouts_for_vendor(vendor_id, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_payout_earnings(&self, payout_id: &str) -> Result<Vec<VendorEarning>, PayoutError> {
        let mut conn = self.pool.acquire().await?;
        let payout = payouts::fetch_payout(payout_id, &mut conn)
            .await?
            .ok_or_else(|| PayoutError::PayoutNotFound(payout_id.to_string()))?;
        let earnings = payouts::fetch_payout_earnings(payout.id, &mut conn).await?;
        Ok(earnings)
    }

    async fn update_payout(&self, update: PayoutUpdate) -> Result<PayoutResult, PayoutError> {
        let mut tx = self.pool.begin().await?;
        let payout =
            payouts::compare_and_set_status(&update.payout_id, update.from, update.to, &update.details, update.at, &mut tx)
                .await?;
        let payout = match payout {
            Some(p) => p,
            None => {
                let exists = payouts::fetch_payout(&update.payout_id, &mut tx).await?.is_some();
                return if exists {
                    Err(PayoutError::PayoutStatusChanged { payout_id: update.payout_id, expected: update.from })
                } else {
                    Err(PayoutError::PayoutNotFound(update.payout_id))
                };
            },
        };
        let ids = payouts::reserved_earning_ids(payout.id, &mut tx).await?;
        let moves = match update.earnings_effect {
            ReservedEarningsEffect::None => None,
            ReservedEarningsEffect::MarkPaid => Some((EarningStatus::Processing, EarningStatus::Paid)),
            ReservedEarningsEffect::Release => Some((EarningStatus::Processing, EarningStatus::Available)),
            ReservedEarningsEffect::Reserve => Some((EarningStatus::Available, EarningStatus::Processing)),
        };
        if let Some((from, to)) = moves {
            payouts::move_earnings(&ids, from, to, update.at, &mut tx).await?;
        }
        let earnings = payouts::fetch_payout_earnings(payout.id, &mut tx).await?;
        tx.commit().await?;
        debug!("💸️ Payout {} moved from {} to {}", payout.payout_id, update.from, payout.status);
        Ok(PayoutResult { payout, earnings })
    }
}

impl ReconciliationManagement for SqliteDatabase {
    async fn collection_totals(
        &self,
        date: NaiveDate,
        delivery_person_id: Option<i64>,
    ) -> Result<Vec<CollectionTotals>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let totals = reconciliations::collection_totals(date, delivery_person_id, &mut conn).await?;
        Ok(totals)
    }

    async fn insert_reconciliation(
        &self,
        totals: &CollectionTotals,
        at: DateTime<Utc>,
    ) -> Result<Option<CodReconciliation>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let rec = reconciliations::idempotent_insert(totals, at, &mut conn).await?;
        Ok(rec)
    }

    async fn fetch_reconciliation(&self, id: i64) -> Result<Option<CodReconciliation>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let rec = reconciliations::fetch_reconciliation(id, &mut conn).await?;
        Ok(rec)
    }

    async fn fetch_reconciliations(
        &self,
        filter: ReconciliationQueryFilter,
    ) -> Result<Vec<CodReconciliation>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let recs = reconciliations::search_reconciliations(filter, &mut conn).await?;
        Ok(recs)
    }

    async fn update_reconciliation(&self, update: ReconciliationUpdate) -> Result<CodReconciliation, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let rec = reconciliations::compare_and_set_status(
            update.id,
            update.from,
            update.to,
            update.collected_amount,
            update.verified_by,
            update.at,
            &mut tx,
        )
        .await?;
        let rec = match rec {
            Some(r) => r,
            None => {
                let exists = reconciliations::fetch_reconciliation(update.id, &mut tx).await?.is_some();
                return if exists {
                    Err(ReconciliationError::StatusChanged { id: update.id, expected: update.from })
                } else {
                    Err(ReconciliationError::ReconciliationNotFound(update.id))
                };
            },
        };
        if let Some(note) = &update.note {
            reconciliations::insert_note(rec.id, update.actor_id, note, update.at, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(rec)
    }

    async fn auto_verify_zero_discrepancy(
        &self,
        at: DateTime<Utc>,
    ) -> Result<Vec<CodReconciliation>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let recs = reconciliations::auto_verify_zero_discrepancy(at, &mut conn).await?;
        Ok(recs)
    }

    async fn fetch_notes(&self, reconciliation_id: i64) -> Result<Vec<ReconciliationNote>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let notes = reconciliations::fetch_notes(reconciliation_id, &mut conn).await?;
        Ok(notes)
    }
}

impl ActivityLog for SqliteDatabase {
    async fn log_activity(&self, activity: NewActivity) -> Result<(), ActivityLogError> {
        let mut conn = self.pool.acquire().await?;
        activity::insert_activity(activity, &mut conn).await?;
        Ok(())
    }

    async fn fetch_activity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<ActivityRecord>, ActivityLogError> {
        let mut conn = self.pool.acquire().await?;
        let records = activity::fetch_activity(entity_type, entity_id, &mut conn).await?;
        Ok(records)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `COD_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date with the migrations embedded in this crate.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every connection in the pool. Clones of this object share the pool and are closed too.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
