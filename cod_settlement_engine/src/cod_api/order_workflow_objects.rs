//! The COD order state machine.
//!
//! [`TRANSITIONS`] is the only place where legal `(status, action) -> status` moves are defined. Both
//! [`transition`] (used when an action is attempted) and [`legal_actions`] (used to present the workflow state of an
//! order) are derived from it, together with the two guards that do not depend on the status alone:
//!
//! * Only cash on delivery orders take part in the workflow. Any order may be cancelled.
//! * An order can only be completed once its COD payment has been recorded.
//!
//! | From               | Action                 | To                 |
//! |--------------------|------------------------|--------------------|
//! | `pending`          | `Confirm`              | `confirmed`        |
//! | `confirmed`        | `StartProcessing`      | `processing`       |
//! | `processing`       | `MarkOutForDelivery`   | `out_for_delivery` |
//! | `out_for_delivery` | `ConfirmCodCollection` | `delivered`        |
//! | `out_for_delivery` | `RescheduleDelivery`   | `processing`       |
//! | `out_for_delivery` | `FailDelivery`         | `failed`           |
//! | `delivered`        | `Complete`             | `completed`        |
//! | any non-terminal   | `Cancel`               | `cancelled`        |
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::{FulfillmentStatus, Order, OrderId, OrderStatusType};

use OrderStatusType::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Confirm,
    StartProcessing,
    MarkOutForDelivery,
    ConfirmCodCollection,
    RescheduleDelivery,
    FailDelivery,
    Complete,
    Cancel,
}

impl OrderAction {
    pub const ALL: [OrderAction; 8] = [
        Self::Confirm,
        Self::StartProcessing,
        Self::MarkOutForDelivery,
        Self::ConfirmCodCollection,
        Self::RescheduleDelivery,
        Self::FailDelivery,
        Self::Complete,
        Self::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::StartProcessing => "start_processing",
            Self::MarkOutForDelivery => "mark_out_for_delivery",
            Self::ConfirmCodCollection => "confirm_cod_collection",
            Self::RescheduleDelivery => "reschedule_delivery",
            Self::FailDelivery => "fail_delivery",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }

    /// The fulfillment status an order moves to as a side effect of this action, if any.
    pub fn fulfillment_effect(&self) -> Option<FulfillmentStatus> {
        match self {
            Self::StartProcessing | Self::RescheduleDelivery => Some(FulfillmentStatus::Preparing),
            Self::MarkOutForDelivery => Some(FulfillmentStatus::Dispatched),
            Self::ConfirmCodCollection => Some(FulfillmentStatus::Fulfilled),
            _ => None,
        }
    }

    /// Explains why this action is not available for an order in `status`.
    fn requirement(&self, status: OrderStatusType) -> String {
        match self {
            Self::Confirm => "Order must be pending to be confirmed".into(),
            Self::StartProcessing => "Order must be confirmed before processing can start".into(),
            Self::MarkOutForDelivery => "Order must be processing to be sent out for delivery".into(),
            Self::ConfirmCodCollection => "Order must be out for delivery to collect payment".into(),
            Self::RescheduleDelivery | Self::FailDelivery => {
                "Order must be out for delivery to record a delivery failure".into()
            },
            Self::Complete => "Order must be delivered to be completed".into(),
            Self::Cancel => format!("Order cannot be cancelled once it is {status}"),
        }
    }
}

impl Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const TRANSITIONS: &[(OrderStatusType, OrderAction, OrderStatusType)] = &[
    (Pending, OrderAction::Confirm, Confirmed),
    (Confirmed, OrderAction::StartProcessing, Processing),
    (Processing, OrderAction::MarkOutForDelivery, OutForDelivery),
    (OutForDelivery, OrderAction::ConfirmCodCollection, Delivered),
    (OutForDelivery, OrderAction::RescheduleDelivery, Processing),
    (OutForDelivery, OrderAction::FailDelivery, Failed),
    (Delivered, OrderAction::Complete, Completed),
    (Pending, OrderAction::Cancel, Cancelled),
    (Confirmed, OrderAction::Cancel, Cancelled),
    (Processing, OrderAction::Cancel, Cancelled),
    (OutForDelivery, OrderAction::Cancel, Cancelled),
    (Delivered, OrderAction::Cancel, Cancelled),
    (Failed, OrderAction::Cancel, Cancelled),
];

/// Looks up the target status for `action` from `status` in the transition table.
pub fn next_status(status: OrderStatusType, action: OrderAction) -> Option<OrderStatusType> {
    TRANSITIONS.iter().find(|(from, a, _)| *from == status && *a == action).map(|(_, _, to)| *to)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    NotCashOnDelivery,
    CodNotCollected,
    WrongStatus { action: OrderAction, status: OrderStatusType },
}

impl Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotCashOnDelivery => f.write_str("This is not a cash on delivery order"),
            Self::CodNotCollected => f.write_str("Cash on delivery payment has not been collected"),
            Self::WrongStatus { action, status } => f.write_str(&action.requirement(*status)),
        }
    }
}

impl std::error::Error for TransitionError {}

/// Decides whether `action` may be applied to `order`, and if so, which status the order moves to.
pub fn transition(order: &Order, action: OrderAction) -> Result<OrderStatusType, TransitionError> {
    if action != OrderAction::Cancel && !order.is_cod() {
        return Err(TransitionError::NotCashOnDelivery);
    }
    let to = next_status(order.status, action).ok_or(TransitionError::WrongStatus { action, status: order.status })?;
    if action == OrderAction::Complete && !order.is_cod_collected() {
        return Err(TransitionError::CodNotCollected);
    }
    Ok(to)
}

/// Every action that [`transition`] would currently accept for `order`.
pub fn legal_actions(order: &Order) -> Vec<OrderAction> {
    OrderAction::ALL.into_iter().filter(|a| transition(order, *a).is_ok()).collect()
}

/// A read-only projection of where an order is in the COD workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub fulfillment_status: FulfillmentStatus,
    pub is_cod: bool,
    pub cod_collected: bool,
    pub delivery_person_id: Option<i64>,
    pub available_actions: Vec<OrderAction>,
}

impl WorkflowState {
    pub fn for_order(order: &Order) -> Self {
        Self {
            order_id: order.order_id.clone(),
            status: order.status,
            fulfillment_status: order.fulfillment_status,
            is_cod: order.is_cod(),
            cod_collected: order.is_cod_collected(),
            delivery_person_id: order.delivery_person_id,
            available_actions: legal_actions(order),
        }
    }

    pub fn can(&self, action: OrderAction) -> bool {
        self.available_actions.contains(&action)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
