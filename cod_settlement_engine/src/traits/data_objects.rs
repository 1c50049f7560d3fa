use std::fmt::Display;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    cod_api::{order_workflow_objects::OrderAction, payout_objects::ReservedEarningsEffect},
    db_types::{
        Cents,
        CodReconciliation,
        FulfillmentStatus,
        NewVendorEarning,
        Order,
        OrderAnnotation,
        OrderId,
        OrderStatusEntry,
        OrderStatusType,
        Payout,
        PayoutDetails,
        PayoutStatus,
        ReconciliationStatus,
        VendorEarning,
    },
};

//--------------------------------------   OrderTransition    ---------------------------------------------------------
/// A fully-decided status change for an order. The backend applies it atomically: the status compare-and-swap, the
/// column changes, the history entry, the annotation and the ledger effect either all happen or none do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTransition {
    pub order_id: OrderId,
    pub action: OrderAction,
    /// The status the order is expected to have. If it has changed, the transition is rejected.
    pub from: OrderStatusType,
    pub to: OrderStatusType,
    pub actor_id: Option<i64>,
    pub comment: Option<String>,
    pub changes: OrderChanges,
    pub annotation: Option<OrderAnnotation>,
    pub ledger_effect: LedgerEffect,
    pub at: DateTime<Utc>,
}

impl OrderTransition {
    pub fn new(order: &Order, action: OrderAction, to: OrderStatusType, at: DateTime<Utc>) -> Self {
        Self {
            order_id: order.order_id.clone(),
            action,
            from: order.status,
            to,
            actor_id: None,
            comment: None,
            changes: OrderChanges { fulfillment_status: action.fulfillment_effect(), ..Default::default() },
            annotation: None,
            ledger_effect: LedgerEffect::None,
            at,
        }
    }

    pub fn by(mut self, actor_id: Option<i64>) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub fn with_comment<S: Into<String>>(mut self, comment: S) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_annotation(mut self, annotation: OrderAnnotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    pub fn with_ledger_effect(mut self, effect: LedgerEffect) -> Self {
        self.ledger_effect = effect;
        self
    }

    pub fn assign_delivery_person(mut self, delivery_person_id: Option<i64>) -> Self {
        self.changes.delivery_person = Some(delivery_person_id);
        self
    }

    pub fn record_collection(mut self, amount: Cents, collected_by: Option<i64>) -> Self {
        self.changes.cod_collection = Some(CodCollection { amount, collected_by });
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderChanges {
    pub fulfillment_status: Option<FulfillmentStatus>,
    /// `Some(None)` clears the assigned delivery person
    pub delivery_person: Option<Option<i64>>,
    pub cod_collection: Option<CodCollection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodCollection {
    pub amount: Cents,
    pub collected_by: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEffect {
    #[default]
    None,
    /// Insert these earnings, skipping any `(vendor, order)` pair that already exists
    RecordEarnings(Vec<NewVendorEarning>),
    /// Withhold the order's earnings that have not been paid or reserved yet
    WithholdEarnings { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResult {
    pub old_order: Order,
    pub new_order: Order,
    pub history_entry: OrderStatusEntry,
    /// Earnings inserted or withheld by the ledger effect
    pub earnings: Vec<VendorEarning>,
}

impl Display for TransitionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Order {} moved from {} to {}", self.new_order.order_id, self.old_order.status, self.new_order.status)?;
        if !self.earnings.is_empty() {
            write!(f, " ({} earnings affected)", self.earnings.len())?;
        }
        Ok(())
    }
}

//--------------------------------------     PayoutUpdate     ---------------------------------------------------------
/// A status change for a payout, applied with a compare-and-swap on `from`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutUpdate {
    pub payout_id: String,
    pub from: PayoutStatus,
    pub to: PayoutStatus,
    pub details: PayoutDetails,
    pub earnings_effect: ReservedEarningsEffect,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutResult {
    pub payout: Payout,
    /// The earnings reserved by the payout, in their state after the change
    pub earnings: Vec<VendorEarning>,
}

//--------------------------------------  ReconciliationUpdate  --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationUpdate {
    pub id: i64,
    pub from: ReconciliationStatus,
    pub to: ReconciliationStatus,
    /// A new cash count. The discrepancy is recomputed from it.
    pub collected_amount: Option<Cents>,
    pub verified_by: Option<i64>,
    pub note: Option<String>,
    pub actor_id: Option<i64>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    /// Reconciliations created by this run
    pub created: Vec<CodReconciliation>,
    /// Delivery people that already had a reconciliation for the day
    pub skipped: Vec<i64>,
}

impl DailyReport {
    pub fn new(date: NaiveDate) -> Self {
        Self { date, created: Vec::new(), skipped: Vec::new() }
    }
}
