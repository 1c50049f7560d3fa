use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use log::*;
use serde_json::json;

use super::record_activity;
use crate::{
    cod_api::{
        earnings_objects::compute_vendor_earnings,
        order_workflow_objects::{transition, OrderAction, WorkflowState},
    },
    config::EarningsConfig,
    db_types::{
        CancellationInfo,
        Cents,
        CodCollectionInfo,
        DeliveryFailureInfo,
        NewActivity,
        NewOrder,
        Order,
        OrderAnnotation,
        OrderId,
        OrderStatusEntry,
    },
    events::{CodCollectedEvent, DeliveryFailedEvent, EventProducers, OrderStatusChangedEvent},
    helpers::{Clock, SystemClock},
    traits::{ActivityLog, LedgerEffect, OrderTransition, OrderWorkflowDatabase, TransitionResult, WorkflowError},
};

/// `CodOrderWorkflowApi` moves cash on delivery orders through their lifecycle.
///
/// Every operation follows the same steps:
/// 1. The order is loaded and the action is checked against the transition table. Guard violations are returned
///    without touching the database.
/// 2. The transition is applied by the backend in a single transaction, together with its history entry, annotation
///    and ledger effect.
/// 3. Only after the commit, the activity log is written and events are published.
///
/// | Operation                    | From               | To                                        |
/// |------------------------------|--------------------|-------------------------------------------|
/// | [`Self::confirm_order`]          | `pending`          | `confirmed`                               |
/// | [`Self::start_processing`]       | `confirmed`        | `processing`                              |
/// | [`Self::mark_out_for_delivery`]  | `processing`       | `out_for_delivery`                        |
/// | [`Self::confirm_cod_collection`] | `out_for_delivery` | `delivered` (records vendor earnings)     |
/// | [`Self::handle_delivery_failure`]| `out_for_delivery` | `processing` if rescheduled, else `failed` |
/// | [`Self::complete_order`]         | `delivered`        | `completed`                               |
/// | [`Self::cancel_order`]           | any non-terminal   | `cancelled` (withholds unpaid earnings)   |
pub struct CodOrderWorkflowApi<B> {
    db: B,
    earnings_config: EarningsConfig,
    clock: Arc<dyn Clock>,
    producers: EventProducers,
}

impl<B> Debug for CodOrderWorkflowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CodOrderWorkflowApi")
    }
}

impl<B> CodOrderWorkflowApi<B> {
    pub fn new(db: B, earnings_config: EarningsConfig, producers: EventProducers) -> Self {
        Self { db, earnings_config, clock: Arc::new(SystemClock), producers }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> CodOrderWorkflowApi<B>
where B: OrderWorkflowDatabase + ActivityLog
{
    /// Stores an order placed by the checkout flow. Idempotent: the second parameter is `false` if the order already
    /// existed, in which case nothing was changed.
    pub async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), WorkflowError> {
        let result = self.db.insert_order(order).await?;
        if result.1 {
            info!("🔄️📦️ Order {} placed for {}", result.0.order_id, result.0.total_price);
        }
        Ok(result)
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, WorkflowError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| WorkflowError::OrderNotFound(order_id.clone()))
    }

    /// `pending -> confirmed`
    pub async fn confirm_order(&self, order_id: &OrderId, actor: Option<i64>) -> Result<Order, WorkflowError> {
        let order = self.fetch_order(order_id).await?;
        let result = self.apply(&order, OrderAction::Confirm, actor, |t| t.with_comment("Order confirmed")).await?;
        Ok(result.new_order)
    }

    /// `confirmed -> processing`. The fulfillment status becomes `preparing`.
    pub async fn start_processing(&self, order_id: &OrderId, actor: Option<i64>) -> Result<Order, WorkflowError> {
        let order = self.fetch_order(order_id).await?;
        let result =
            self.apply(&order, OrderAction::StartProcessing, actor, |t| t.with_comment("Order processing started")).await?;
        Ok(result.new_order)
    }

    /// `processing -> out_for_delivery`, assigning the delivery person.
    pub async fn mark_out_for_delivery(
        &self,
        order_id: &OrderId,
        delivery_person_id: i64,
        actor: Option<i64>,
    ) -> Result<Order, WorkflowError> {
        let order = self.fetch_order(order_id).await?;
        let result = self
            .apply(&order, OrderAction::MarkOutForDelivery, actor, |t| {
                t.assign_delivery_person(Some(delivery_person_id))
                    .with_comment(format!("Out for delivery with delivery person {delivery_person_id}"))
            })
            .await?;
        Ok(result.new_order)
    }

    /// `out_for_delivery -> delivered`.
    ///
    /// The collected amount and time are recorded exactly once, and the vendor earnings for the order are recorded in
    /// the same transaction. The amount is not checked against the order total: differences are settled by the daily
    /// reconciliation. A mismatch is logged and kept in the collection annotation.
    pub async fn confirm_cod_collection(
        &self,
        order_id: &OrderId,
        amount: Cents,
        collected_by: Option<i64>,
        actor: Option<i64>,
    ) -> Result<Order, WorkflowError> {
        if amount.is_negative() {
            return Err(WorkflowError::InvalidAmount(amount));
        }
        let order = self.fetch_order(order_id).await?;
        transition(&order, OrderAction::ConfirmCodCollection)?;
        if amount != order.total_price {
            warn!(
                "🔄️💵️ Collected {amount} for order {} but its total is {}. The difference will show up in \
                 reconciliation.",
                order.order_id, order.total_price
            );
        }
        let items = self.db.fetch_order_items(order_id).await?;
        let now = self.clock.now();
        let earnings =
            compute_vendor_earnings(order_id, &items, &self.earnings_config, now).map_err(WorkflowError::InvalidOrder)?;
        let info = CodCollectionInfo { amount, expected: order.total_price, collected_by, at: now };
        let result = self
            .apply_at(&order, OrderAction::ConfirmCodCollection, actor, now, |t| {
                t.record_collection(amount, collected_by)
                    .with_annotation(OrderAnnotation::CodCollection(info))
                    .with_ledger_effect(LedgerEffect::RecordEarnings(earnings))
                    .with_comment(format!("Cash on delivery payment of {amount} collected"))
            })
            .await?;
        debug!("🔄️💵️ {} vendor earnings recorded for order {}", result.earnings.len(), order.order_id);
        let event = CodCollectedEvent::new(result.new_order.clone(), amount, collected_by);
        for producer in &self.producers.cod_collected_producer {
            producer.publish_event(event.clone()).await;
        }
        Ok(result.new_order)
    }

    /// `out_for_delivery -> processing` when `reschedule` is set, otherwise `out_for_delivery -> failed`.
    ///
    /// The failure is recorded as an annotation. Attempts are not capped. A rescheduled order is unassigned from its
    /// delivery person, so the next dispatch assigns one afresh.
    pub async fn handle_delivery_failure(
        &self,
        order_id: &OrderId,
        reason: &str,
        attempt: u32,
        reschedule: bool,
        actor: Option<i64>,
    ) -> Result<Order, WorkflowError> {
        let order = self.fetch_order(order_id).await?;
        let action = if reschedule { OrderAction::RescheduleDelivery } else { OrderAction::FailDelivery };
        let info = DeliveryFailureInfo {
            reason: reason.to_string(),
            attempt,
            delivery_person_id: order.delivery_person_id,
            rescheduled: reschedule,
            at: self.clock.now(),
        };
        let annotation = OrderAnnotation::DeliveryFailure(info.clone());
        let result = self
            .apply(&order, action, actor, |t| {
                let t = t.with_annotation(annotation).with_comment(format!("Delivery attempt {attempt} failed: {reason}"));
                if reschedule {
                    t.assign_delivery_person(None)
                } else {
                    t
                }
            })
            .await?;
        let event = DeliveryFailedEvent::new(result.new_order.clone(), info);
        for producer in &self.producers.delivery_failed_producer {
            producer.publish_event(event.clone()).await;
        }
        Ok(result.new_order)
    }

    /// `delivered -> completed`. The COD payment must have been collected.
    pub async fn complete_order(&self, order_id: &OrderId, actor: Option<i64>) -> Result<Order, WorkflowError> {
        let order = self.fetch_order(order_id).await?;
        let result = self.apply(&order, OrderAction::Complete, actor, |t| t.with_comment("Order completed")).await?;
        Ok(result.new_order)
    }

    /// Cancels any order that is not completed, cancelled or refunded. This is the only transition available to
    /// non-COD orders. Earnings of the order that have not been reserved or paid yet are withheld.
    pub async fn cancel_order(&self, order_id: &OrderId, reason: &str, actor: Option<i64>) -> Result<Order, WorkflowError> {
        let order = self.fetch_order(order_id).await?;
        let info = CancellationInfo {
            reason: reason.to_string(),
            actor_id: actor,
            previous_status: order.status,
            at: self.clock.now(),
        };
        let result = self
            .apply(&order, OrderAction::Cancel, actor, |t| {
                t.with_annotation(OrderAnnotation::Cancellation(info))
                    .with_ledger_effect(LedgerEffect::WithholdEarnings { reason: format!("Order cancelled: {reason}") })
                    .with_comment(format!("Order cancelled: {reason}"))
            })
            .await?;
        if !result.earnings.is_empty() {
            info!("🔄️📦️ {} earnings withheld after order {} was cancelled", result.earnings.len(), order.order_id);
        }
        Ok(result.new_order)
    }

    /// Where the order is in the workflow, and which actions are currently legal.
    pub async fn get_workflow_state(&self, order_id: &OrderId) -> Result<WorkflowState, WorkflowError> {
        let order = self.fetch_order(order_id).await?;
        Ok(WorkflowState::for_order(&order))
    }

    pub async fn status_history(&self, order_id: &OrderId) -> Result<Vec<OrderStatusEntry>, WorkflowError> {
        self.db.fetch_status_history(order_id).await
    }

    pub async fn annotations(&self, order_id: &OrderId) -> Result<Vec<OrderAnnotation>, WorkflowError> {
        self.db.fetch_annotations(order_id).await
    }

    async fn apply<F>(
        &self,
        order: &Order,
        action: OrderAction,
        actor: Option<i64>,
        customize: F,
    ) -> Result<TransitionResult, WorkflowError>
    where
        F: FnOnce(OrderTransition) -> OrderTransition,
    {
        self.apply_at(order, action, actor, self.clock.now(), customize).await
    }

    /// Applies the transition with every timestamp in it taken from `now`.
    async fn apply_at<F>(
        &self,
        order: &Order,
        action: OrderAction,
        actor: Option<i64>,
        now: DateTime<Utc>,
        customize: F,
    ) -> Result<TransitionResult, WorkflowError>
    where
        F: FnOnce(OrderTransition) -> OrderTransition,
    {
        let to = transition(order, action).map_err(|e| {
            debug!("🔄️📦️ {action} rejected for order {} ({}): {e}", order.order_id, order.status);
            e
        })?;
        let request = customize(OrderTransition::new(order, action, to, now).by(actor));
        let result = self.db.apply_transition(request).await?;
        info!("🔄️📦️ {result}");
        let activity = NewActivity::new(actor, action.as_str(), "order", order.order_id.as_str(), now).with_properties(
            json!({ "from": result.old_order.status, "to": result.new_order.status, "earnings": result.earnings.len() }),
        );
        record_activity(&self.db, activity).await;
        let event = OrderStatusChangedEvent::new(result.new_order.clone(), result.old_order.status, action, actor);
        for producer in &self.producers.order_status_changed_producer {
            producer.publish_event(event.clone()).await;
        }
        Ok(result)
    }
}
