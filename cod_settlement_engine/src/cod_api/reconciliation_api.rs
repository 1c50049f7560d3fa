use std::{fmt::Debug, sync::Arc};

use chrono::NaiveDate;
use log::*;
use serde_json::json;

use super::record_activity;
use crate::{
    cod_api::reconciliation_objects::{
        can_verify,
        status_after_count,
        ReconciliationQueryFilter,
        ReconciliationSummary,
    },
    db_types::{Cents, CodReconciliation, NewActivity, ReconciliationNote, ReconciliationStatus},
    helpers::{Clock, SystemClock},
    traits::{ActivityLog, DailyReport, ReconciliationError, ReconciliationManagement, ReconciliationUpdate},
};

/// The daily audit of the cash that delivery people collect.
///
/// A reconciliation is created `pending` per delivery person and day. A physical cash count either verifies it or
/// puts it in dispute, and a disputed reconciliation is closed by resolving it.
pub struct ReconciliationApi<B> {
    db: B,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B) -> Self {
        Self { db, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl<B> ReconciliationApi<B>
where B: ReconciliationManagement + ActivityLog
{
    /// Creates a `pending` reconciliation for every delivery person who collected COD cash on `date`, or for the
    /// given delivery person only.
    ///
    /// Delivery people that already have a reconciliation for the day are skipped and listed in
    /// [`DailyReport::skipped`]. Existing reconciliations are never overwritten.
    pub async fn generate_daily_report(
        &self,
        date: NaiveDate,
        delivery_person_id: Option<i64>,
        actor: Option<i64>,
    ) -> Result<DailyReport, ReconciliationError> {
        let totals = self.db.collection_totals(date, delivery_person_id).await?;
        debug!("🧾️ {} delivery people collected COD cash on {date}", totals.len());
        let now = self.clock.now();
        let mut report = DailyReport::new(date);
        for t in &totals {
            match self.db.insert_reconciliation(t, now).await? {
                Some(rec) => {
                    if rec.discrepancy != Cents::ZERO {
                        warn!(
                            "🧾️ Delivery person {} reported {} on {date} but {} was expected ({})",
                            rec.delivery_person_id, rec.collected_amount, rec.total_cod_amount, rec.discrepancy
                        );
                    }
                    report.created.push(rec);
                },
                None => {
                    trace!("🧾️ Reconciliation for delivery person {} on {date} already exists", t.delivery_person_id);
                    report.skipped.push(t.delivery_person_id);
                },
            }
        }
        info!(
            "🧾️ Daily report for {date}: {} reconciliations created, {} skipped",
            report.created.len(),
            report.skipped.len()
        );
        if !report.created.is_empty() {
            let activity = NewActivity::new(actor, "generate_daily_report", "cod_reconciliation", date, now)
                .with_properties(json!({ "created": report.created.iter().map(|r| r.id).collect::<Vec<_>>() }));
            record_activity(&self.db, activity).await;
        }
        Ok(report)
    }

    /// Records a physical cash count. The discrepancy is recomputed from `actual_amount`; the reconciliation is
    /// verified if it is zero and disputed otherwise.
    pub async fn verify_collection(
        &self,
        id: i64,
        actual_amount: Cents,
        notes: Option<&str>,
        actor: Option<i64>,
    ) -> Result<CodReconciliation, ReconciliationError> {
        if actual_amount.is_negative() {
            return Err(ReconciliationError::InvalidAmount(format!("{actual_amount} is negative")));
        }
        let rec = self.fetch_reconciliation(id).await?;
        if !can_verify(rec.status) {
            return Err(ReconciliationError::InvalidStatus { id, status: rec.status, action: "verified" });
        }
        let discrepancy = actual_amount - rec.total_cod_amount;
        let to = status_after_count(discrepancy);
        let note = match notes {
            Some(n) => format!("Cash count of {actual_amount} ({discrepancy} discrepancy): {n}"),
            None => format!("Cash count of {actual_amount} ({discrepancy} discrepancy)"),
        };
        let now = self.clock.now();
        let update = ReconciliationUpdate {
            id,
            from: rec.status,
            to,
            collected_amount: Some(actual_amount),
            verified_by: (to == ReconciliationStatus::Verified).then_some(actor).flatten(),
            note: Some(note),
            actor_id: actor,
            at: now,
        };
        let updated = self.db.update_reconciliation(update).await?;
        info!("🧾️ Reconciliation {id} counted at {actual_amount}: {} with {}", updated.status, updated.discrepancy);
        let activity = NewActivity::new(actor, "verify_collection", "cod_reconciliation", id, now).with_properties(
            json!({ "from": rec.status, "to": updated.status, "collected": actual_amount, "discrepancy": discrepancy }),
        );
        record_activity(&self.db, activity).await;
        Ok(updated)
    }

    /// Resolves the reconciliation if a resolution is given, otherwise marks it as disputed. The reason (and
    /// resolution) are appended to the audit trail. Monetary fields are left untouched.
    pub async fn handle_discrepancy(
        &self,
        id: i64,
        reason: &str,
        resolution: Option<&str>,
        actor: Option<i64>,
    ) -> Result<CodReconciliation, ReconciliationError> {
        let rec = self.fetch_reconciliation(id).await?;
        if rec.status == ReconciliationStatus::Resolved {
            return Err(ReconciliationError::InvalidStatus { id, status: rec.status, action: "disputed or resolved" });
        }
        let (to, note) = match resolution {
            Some(r) => (ReconciliationStatus::Resolved, format!("{reason}. Resolution: {r}")),
            None => (ReconciliationStatus::Disputed, reason.to_string()),
        };
        let now = self.clock.now();
        let update = ReconciliationUpdate {
            id,
            from: rec.status,
            to,
            collected_amount: None,
            verified_by: None,
            note: Some(note),
            actor_id: actor,
            at: now,
        };
        let updated = self.db.update_reconciliation(update).await?;
        info!("🧾️ Reconciliation {id} moved from {} to {}: {reason}", rec.status, updated.status);
        let activity = NewActivity::new(actor, "handle_discrepancy", "cod_reconciliation", id, now)
            .with_properties(json!({ "from": rec.status, "to": updated.status, "reason": reason }));
        record_activity(&self.db, activity).await;
        Ok(updated)
    }

    /// Verifies every pending reconciliation whose discrepancy is zero.
    pub async fn auto_verify_zero_discrepancy(
        &self,
        actor: Option<i64>,
    ) -> Result<Vec<CodReconciliation>, ReconciliationError> {
        let now = self.clock.now();
        let verified = self.db.auto_verify_zero_discrepancy(now).await?;
        info!("🧾️ {} reconciliations with no discrepancy were verified automatically", verified.len());
        if !verified.is_empty() {
            let activity = NewActivity::new(actor, "auto_verify", "cod_reconciliation", "batch", now)
                .with_properties(json!({ "ids": verified.iter().map(|r| r.id).collect::<Vec<_>>() }));
            record_activity(&self.db, activity).await;
        }
        Ok(verified)
    }

    pub async fn fetch_reconciliation(&self, id: i64) -> Result<CodReconciliation, ReconciliationError> {
        self.db.fetch_reconciliation(id).await?.ok_or(ReconciliationError::ReconciliationNotFound(id))
    }

    pub async fn fetch_reconciliations(
        &self,
        filter: ReconciliationQueryFilter,
    ) -> Result<Vec<CodReconciliation>, ReconciliationError> {
        self.db.fetch_reconciliations(filter).await
    }

    /// Totals over all reconciliations dated between `from` and `to`, inclusive.
    pub async fn reconciliation_summary(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<ReconciliationSummary, ReconciliationError> {
        let recs = self.db.fetch_reconciliations(ReconciliationQueryFilter::between(from, to)).await?;
        Ok(ReconciliationSummary::from_reconciliations(&recs))
    }

    pub async fn notes(&self, id: i64) -> Result<Vec<ReconciliationNote>, ReconciliationError> {
        self.db.fetch_notes(id).await
    }
}
