use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db_types::{Cents, CodReconciliation, ReconciliationStatus};

/// The expected and reported COD cash of one delivery person for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionTotals {
    pub date: NaiveDate,
    pub delivery_person_id: i64,
    pub orders_count: i64,
    pub expected: Cents,
    pub collected: Cents,
}

impl CollectionTotals {
    pub fn discrepancy(&self) -> Cents {
        self.collected - self.expected
    }
}

/// Whether a reconciliation in `status` may still be verified against a cash count.
pub fn can_verify(status: ReconciliationStatus) -> bool {
    matches!(status, ReconciliationStatus::Pending | ReconciliationStatus::Disputed)
}

/// The status a cash count leaves a reconciliation in.
pub fn status_after_count(discrepancy: Cents) -> ReconciliationStatus {
    if discrepancy == Cents::ZERO {
        ReconciliationStatus::Verified
    } else {
        ReconciliationStatus::Disputed
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationQueryFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub delivery_person_id: Option<i64>,
    pub statuses: Vec<ReconciliationStatus>,
}

impl ReconciliationQueryFilter {
    pub fn for_date(date: NaiveDate) -> Self {
        Self { from: Some(date), to: Some(date), ..Default::default() }
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from: Some(from), to: Some(to), ..Default::default() }
    }

    pub fn with_delivery_person(mut self, delivery_person_id: i64) -> Self {
        self.delivery_person_id = Some(delivery_person_id);
        self
    }

    pub fn with_status(mut self, status: ReconciliationStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.delivery_person_id.is_none() && self.statuses.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub reconciliations: i64,
    pub orders: i64,
    pub expected: Cents,
    pub collected: Cents,
    pub discrepancy: Cents,
    pub pending: i64,
    pub verified: i64,
    pub disputed: i64,
    pub resolved: i64,
}

impl ReconciliationSummary {
    pub fn from_reconciliations(recs: &[CodReconciliation]) -> Self {
        recs.iter().fold(Self::default(), |mut acc, r| {
            acc.reconciliations += 1;
            acc.orders += r.total_orders_count;
            acc.expected = acc.expected + r.total_cod_amount;
            acc.collected = acc.collected + r.collected_amount;
            acc.discrepancy = acc.discrepancy + r.discrepancy;
            match r.status {
                ReconciliationStatus::Pending => acc.pending += 1,
                ReconciliationStatus::Verified => acc.verified += 1,
                ReconciliationStatus::Disputed => acc.disputed += 1,
                ReconciliationStatus::Resolved => acc.resolved += 1,
            }
            acc
        })
    }

    /// True when every reconciliation in the period is either verified or resolved.
    pub fn is_settled(&self) -> bool {
        self.pending == 0 && self.disputed == 0
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;

    fn rec(status: ReconciliationStatus, expected: i64, collected: i64) -> CodReconciliation {
        let now = Utc::now();
        CodReconciliation {
            id: 1,
            date: now.date_naive(),
            delivery_person_id: 3,
            total_orders_count: 2,
            total_cod_amount: Cents::from(expected),
            collected_amount: Cents::from(collected),
            discrepancy: Cents::from(collected - expected),
            status,
            verified_by: None,
            verified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn counting_cash() {
        assert_eq!(status_after_count(Cents::ZERO), ReconciliationStatus::Verified);
        assert_eq!(status_after_count(Cents::from(500)), ReconciliationStatus::Disputed);
        assert_eq!(status_after_count(Cents::from(-1)), ReconciliationStatus::Disputed);
        assert!(can_verify(ReconciliationStatus::Disputed));
        assert!(!can_verify(ReconciliationStatus::Resolved));
        assert!(!can_verify(ReconciliationStatus::Verified));
    }

    #[test]
    fn summaries() {
        let recs = [
            rec(ReconciliationStatus::Verified, 50_000, 50_000),
            rec(ReconciliationStatus::Disputed, 20_000, 19_500),
            rec(ReconciliationStatus::Pending, 1_000, 1_000),
        ];
        let summary = ReconciliationSummary::from_reconciliations(&recs);
        assert_eq!(summary.reconciliations, 3);
        assert_eq!(summary.orders, 6);
        assert_eq!(summary.expected, Cents::from(71_000));
        assert_eq!(summary.discrepancy, Cents::from(-500));
        assert_eq!(summary.discrepancy, summary.collected - summary.expected);
        assert!(!summary.is_settled());
        assert!(ReconciliationSummary::default().is_settled());
    }
}
