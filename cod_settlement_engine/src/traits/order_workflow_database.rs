use thiserror::Error;

use crate::{
    cod_api::order_workflow_objects::TransitionError,
    db_types::{Cents, NewOrder, Order, OrderAnnotation, OrderId, OrderItem, OrderStatusEntry, OrderStatusType},
    traits::data_objects::{OrderTransition, TransitionResult},
};

#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("{0}")]
    InvalidTransition(#[from] TransitionError),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} is no longer {expected}. It was changed by another operation.")]
    OrderStatusChanged { order_id: OrderId, expected: OrderStatusType },
    #[error("Cash on delivery payment for order {0} has already been recorded")]
    CodAlreadyCollected(OrderId),
    #[error("The collected amount cannot be negative ({0})")]
    InvalidAmount(Cents),
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
}

impl From<sqlx::Error> for WorkflowError {
    fn from(e: sqlx::Error) -> Self {
        WorkflowError::DatabaseError(e.to_string())
    }
}

impl WorkflowError {
    /// Guard violations are expected business outcomes that the caller can act on. Everything else is a fault.
    pub fn is_guard_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition(_) | Self::OrderStatusChanged { .. } | Self::CodAlreadyCollected(_) | Self::InvalidAmount(_)
        )
    }
}

/// Persistence contract for the COD order workflow.
///
/// Orders are created by the external checkout flow; [`Self::insert_order`] exists so that imports and tests can seed
/// them. Afterwards, orders only change through [`Self::apply_transition`].
#[allow(async_fn_in_trait)]
pub trait OrderWorkflowDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores the order and its line items in a single atomic transaction.
    /// This call is idempotent. Returns `true` in the second parameter if the order was inserted, or `false` if it
    /// already existed.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), WorkflowError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, WorkflowError>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, WorkflowError>;

    /// The status history of the order, oldest first.
    async fn fetch_status_history(&self, order_id: &OrderId) -> Result<Vec<OrderStatusEntry>, WorkflowError>;

    /// The typed annotations recorded against the order, oldest first.
    async fn fetch_annotations(&self, order_id: &OrderId) -> Result<Vec<OrderAnnotation>, WorkflowError>;

    /// Applies a status transition in a single atomic transaction:
    /// * The order status is changed from `transition.from` to `transition.to` with a compare-and-swap. If the order
    ///   is not in `from` anymore, `OrderStatusChanged` is returned and nothing is written.
    /// * Any column changes in `transition.changes` are written. A COD collection is only ever written once.
    /// * A status history entry is appended.
    /// * The annotation, if any, is appended.
    /// * The ledger effect, if any, is applied.
    async fn apply_transition(&self, transition: OrderTransition) -> Result<TransitionResult, WorkflowError>;
}
