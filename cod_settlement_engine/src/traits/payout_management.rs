use thiserror::Error;

use crate::{
    cod_api::payout_objects::PayoutAction,
    db_types::{Cents, NewPayoutRequest, Payout, PayoutStatus, VendorEarning},
    traits::data_objects::{PayoutResult, PayoutUpdate},
};

#[derive(Debug, Clone, Error)]
pub enum PayoutError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Payout amount must be positive, not {0}")]
    InvalidAmount(Cents),
    #[error("Requested payout of {requested} is below the minimum payout amount of {minimum}")]
    BelowMinimum { requested: Cents, minimum: Cents },
    #[error("Requested payout of {requested} exceeds the available balance of {available}")]
    InsufficientBalance { requested: Cents, available: Cents },
    #[error("The earnings for this payout changed while they were being reserved. {0}")]
    EarningsChanged(String),
    #[error("Payout {0} does not exist")]
    PayoutNotFound(String),
    #[error("{message}")]
    InvalidTransition { action: PayoutAction, status: PayoutStatus, message: String },
    #[error("Payout {payout_id} is no longer {expected}. It was changed by another operation.")]
    PayoutStatusChanged { payout_id: String, expected: PayoutStatus },
}

impl From<sqlx::Error> for PayoutError {
    fn from(e: sqlx::Error) -> Self {
        PayoutError::DatabaseError(e.to_string())
    }
}

impl PayoutError {
    pub fn is_guard_violation(&self) -> bool {
        !matches!(self, Self::DatabaseError(_) | Self::PayoutNotFound(_))
    }
}

/// Persistence contract for vendor payouts.
///
/// A payout owns the exact set of earnings it reserved when it was created. Every later status change acts on that
/// set only.
#[allow(async_fn_in_trait)]
pub trait PayoutManagement {
    /// In a single atomic transaction:
    /// * Loads the vendor's available earnings, oldest first, and checks that they cover the requested amount.
    /// * Selects whole earnings oldest-first until the amount is covered.
    /// * Moves each selected earning from `available` to `processing` with a compare-and-swap. If any of them is no
    ///   longer available, `EarningsChanged` is returned and nothing is written.
    /// * Stores the payout with status `pending`, and links it to the reserved earnings.
    async fn create_payout(&self, request: NewPayoutRequest) -> Result<PayoutResult, PayoutError>;

    async fn fetch_payout(&self, payout_id: &str) -> Result<Option<Payout>, PayoutError>;

    /// The vendor's payouts, newest first.
    async fn fetch_payouts_for_vendor(&self, vendor_id: i64) -> Result<Vec<Payout>, PayoutError>;

    /// The earnings reserved by the payout, oldest first.
    async fn fetch_payout_earnings(&self, payout_id: &str) -> Result<Vec<VendorEarning>, PayoutError>;

    /// Changes the payout status from `update.from` to `update.to` with a compare-and-swap, replaces its details and
    /// applies the effect to its reserved earnings, all in one transaction.
    async fn update_payout(&self, update: PayoutUpdate) -> Result<PayoutResult, PayoutError>;
}
