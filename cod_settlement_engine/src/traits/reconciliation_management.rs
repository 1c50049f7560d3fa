use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::{
    cod_api::reconciliation_objects::{CollectionTotals, ReconciliationQueryFilter},
    db_types::{CodReconciliation, ReconciliationNote, ReconciliationStatus},
    traits::data_objects::ReconciliationUpdate,
};

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Reconciliation {0} does not exist")]
    ReconciliationNotFound(i64),
    #[error("Reconciliation {id} is {status} and cannot be {action}")]
    InvalidStatus { id: i64, status: ReconciliationStatus, action: &'static str },
    #[error("Reconciliation {id} is no longer {expected}. It was changed by another operation.")]
    StatusChanged { id: i64, expected: ReconciliationStatus },
    #[error("Invalid cash count: {0}")]
    InvalidAmount(String),
}

impl From<sqlx::Error> for ReconciliationError {
    fn from(e: sqlx::Error) -> Self {
        ReconciliationError::DatabaseError(e.to_string())
    }
}

impl ReconciliationError {
    pub fn is_guard_violation(&self) -> bool {
        matches!(self, Self::InvalidStatus { .. } | Self::StatusChanged { .. } | Self::InvalidAmount(_))
    }
}

/// Persistence contract for the daily COD cash audit.
#[allow(async_fn_in_trait)]
pub trait ReconciliationManagement {
    /// Per delivery person totals of the delivered COD orders whose cash was collected on `date` (UTC).
    async fn collection_totals(
        &self,
        date: NaiveDate,
        delivery_person_id: Option<i64>,
    ) -> Result<Vec<CollectionTotals>, ReconciliationError>;

    /// Stores a `pending` reconciliation for the totals. If one already exists for the date and delivery person,
    /// nothing is written and `None` is returned. Uniqueness is enforced by the database, so concurrent callers
    /// cannot create duplicates.
    async fn insert_reconciliation(
        &self,
        totals: &CollectionTotals,
        at: DateTime<Utc>,
    ) -> Result<Option<CodReconciliation>, ReconciliationError>;

    async fn fetch_reconciliation(&self, id: i64) -> Result<Option<CodReconciliation>, ReconciliationError>;

    /// Reconciliations matching the filter, ordered by date and delivery person.
    async fn fetch_reconciliations(
        &self,
        filter: ReconciliationQueryFilter,
    ) -> Result<Vec<CodReconciliation>, ReconciliationError>;

    /// Applies the update with a compare-and-swap on the status, and appends the note, in one transaction.
    async fn update_reconciliation(&self, update: ReconciliationUpdate) -> Result<CodReconciliation, ReconciliationError>;

    /// Verifies every `pending` reconciliation with a zero discrepancy. Returns the reconciliations changed by this
    /// call.
    async fn auto_verify_zero_discrepancy(
        &self,
        at: DateTime<Utc>,
    ) -> Result<Vec<CodReconciliation>, ReconciliationError>;

    /// The audit trail of a reconciliation, oldest first.
    async fn fetch_notes(&self, reconciliation_id: i64) -> Result<Vec<ReconciliationNote>, ReconciliationError>;
}
