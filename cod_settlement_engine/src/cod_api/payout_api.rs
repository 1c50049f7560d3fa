use std::{fmt::Debug, sync::Arc};

use log::*;
use serde_json::json;

use super::record_activity;
use crate::{
    cod_api::payout_objects::{invalid_payout_transition_message, payout_transition, PayoutAction},
    config::PayoutConfig,
    db_types::{Cents, NewActivity, NewPayoutRequest, Payout, PayoutDetails, VendorEarning},
    events::{EventProducers, PayoutCompletedEvent, PayoutFailedEvent},
    helpers::{new_payout_reference, Clock, SystemClock},
    traits::{ActivityLog, PayoutError, PayoutManagement, PayoutResult, PayoutUpdate},
};

/// `PayoutApi` turns a vendor's available earnings into a payout and drives the payout to completion.
///
/// ```text
///   pending ──start_processing──► processing ──complete──► completed
///      │                             │
///      │                             ├──fail──► failed ──retry──► pending
///      └──────────cancel─────────────┴──cancel──► cancelled
/// ```
///
/// The earnings reserved when the payout is created stay attached to it. Completing the payout marks exactly those
/// earnings as paid, failing or cancelling it makes them available again, and a retry reserves the same earnings
/// again.
pub struct PayoutApi<B> {
    db: B,
    config: PayoutConfig,
    clock: Arc<dyn Clock>,
    producers: EventProducers,
}

impl<B> Debug for PayoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PayoutApi")
    }
}

impl<B> PayoutApi<B> {
    pub fn new(db: B, config: PayoutConfig, producers: EventProducers) -> Self {
        Self { db, config, clock: Arc::new(SystemClock), producers }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &PayoutConfig {
        &self.config
    }
}

impl<B> PayoutApi<B>
where B: PayoutManagement + ActivityLog
{
    /// Creates a `pending` payout of `amount` for the vendor, reserving whole available earnings oldest-first until
    /// the amount is covered.
    ///
    /// The processing fee is charged on the requested amount. The reserved earnings can add up to more than the
    /// amount; the excess is reported by [`Payout::overshoot`] and is not paid out.
    pub async fn create_payout_request(
        &self,
        vendor_id: i64,
        amount: Cents,
        requested_by: Option<i64>,
    ) -> Result<PayoutResult, PayoutError> {
        if !amount.is_positive() {
            return Err(PayoutError::InvalidAmount(amount));
        }
        if amount < self.config.minimum_amount {
            return Err(PayoutError::BelowMinimum { requested: amount, minimum: self.config.minimum_amount });
        }
        let now = self.clock.now();
        let request = NewPayoutRequest {
            payout_id: new_payout_reference(vendor_id, now),
            vendor_id,
            amount,
            processing_fee: self.config.processing_fee.fee_for(amount),
            requested_by,
            created_at: now,
        };
        let result = self.db.create_payout(request).await.map_err(|e| {
            warn!("💸️ Payout request of {amount} for vendor {vendor_id} was rejected. {e}");
            e
        })?;
        let payout = &result.payout;
        info!(
            "💸️ Payout {} created for vendor {vendor_id}: {} requested, {} fee, {} reserved from {} earnings",
            payout.payout_id, payout.amount, payout.processing_fee, payout.reserved_amount, payout.items_count
        );
        if payout.overshoot().is_positive() {
            debug!("💸️ Payout {} reserved {} more than was requested", payout.payout_id, payout.overshoot());
        }
        let activity = NewActivity::new(requested_by, "create", "payout", &payout.payout_id, now).with_properties(json!({
            "vendor_id": vendor_id,
            "amount": payout.amount,
            "reserved_amount": payout.reserved_amount,
            "earnings": result.earnings.iter().map(|e| e.id).collect::<Vec<_>>(),
        }));
        record_activity(&self.db, activity).await;
        Ok(result)
    }

    /// `pending -> processing`
    pub async fn start_processing(&self, payout_id: &str, actor: Option<i64>) -> Result<Payout, PayoutError> {
        let result = self
            .change_status(payout_id, PayoutAction::StartProcessing, actor, |d| {
                d.processed_by = actor;
            })
            .await?;
        Ok(result.payout)
    }

    /// `processing -> completed`. The reserved earnings are marked as paid.
    pub async fn complete_payout(
        &self,
        payout_id: &str,
        transfer_reference: Option<String>,
        actor: Option<i64>,
    ) -> Result<PayoutResult, PayoutError> {
        let result = self
            .change_status(payout_id, PayoutAction::Complete, actor, |d| {
                d.transfer_reference = transfer_reference;
                d.failure_reason = None;
            })
            .await?;
        let event = PayoutCompletedEvent::new(result.payout.clone());
        for producer in &self.producers.payout_completed_producer {
            producer.publish_event(event.clone()).await;
        }
        Ok(result)
    }

    /// `processing -> failed`. The reserved earnings become available again.
    pub async fn fail_payout(&self, payout_id: &str, reason: &str, actor: Option<i64>) -> Result<PayoutResult, PayoutError> {
        let result = self
            .change_status(payout_id, PayoutAction::Fail, actor, |d| {
                d.failure_reason = Some(reason.to_string());
            })
            .await?;
        let event = PayoutFailedEvent::new(result.payout.clone(), reason.to_string());
        for producer in &self.producers.payout_failed_producer {
            producer.publish_event(event.clone()).await;
        }
        Ok(result)
    }

    /// `pending | processing -> cancelled`. The reserved earnings become available again.
    pub async fn cancel_payout(
        &self,
        payout_id: &str,
        reason: &str,
        actor: Option<i64>,
    ) -> Result<PayoutResult, PayoutError> {
        self.change_status(payout_id, PayoutAction::Cancel, actor, |d| {
            d.cancellation_reason = Some(reason.to_string());
        })
        .await
    }

    /// `failed -> pending`. The same earnings are reserved again. If any of them was claimed by another payout in the
    /// meantime, the retry fails with [`PayoutError::EarningsChanged`] and the payout stays failed.
    pub async fn retry_payout(&self, payout_id: &str, actor: Option<i64>) -> Result<PayoutResult, PayoutError> {
        self.change_status(payout_id, PayoutAction::Retry, actor, |d| {
            d.retries += 1;
        })
        .await
    }

    pub async fn fetch_payout(&self, payout_id: &str) -> Result<Payout, PayoutError> {
        self.db.fetch_payout(payout_id).await?.ok_or_else(|| PayoutError::PayoutNotFound(payout_id.to_string()))
    }

    pub async fn payouts_for_vendor(&self, vendor_id: i64) -> Result<Vec<Payout>, PayoutError> {
        self.db.fetch_payouts_for_vendor(vendor_id).await
    }

    pub async fn payout_earnings(&self, payout_id: &str) -> Result<Vec<VendorEarning>, PayoutError> {
        self.db.fetch_payout_earnings(payout_id).await
    }

    async fn change_status<F>(
        &self,
        payout_id: &str,
        action: PayoutAction,
        actor: Option<i64>,
        update_details: F,
    ) -> Result<PayoutResult, PayoutError>
    where
        F: FnOnce(&mut PayoutDetails),
    {
        let payout = self.fetch_payout(payout_id).await?;
        let (to, earnings_effect) = payout_transition(payout.status, action).ok_or_else(|| {
            PayoutError::InvalidTransition {
                action,
                status: payout.status,
                message: invalid_payout_transition_message(action, payout.status),
            }
        })?;
        let mut details = payout.details().clone();
        update_details(&mut details);
        let now = self.clock.now();
        let update = PayoutUpdate {
            payout_id: payout.payout_id.clone(),
            from: payout.status,
            to,
            details,
            earnings_effect,
            at: now,
        };
        let result = self.db.update_payout(update).await?;
        info!("💸️ Payout {payout_id} moved from {} to {} ({action})", payout.status, result.payout.status);
        let activity = NewActivity::new(actor, action.to_string(), "payout", payout_id, now)
            .with_properties(json!({ "from": payout.status, "to": result.payout.status }));
        record_activity(&self.db, activity).await;
        Ok(result)
    }
}
