use serde::{Deserialize, Serialize};

use crate::{
    cod_api::order_workflow_objects::OrderAction,
    db_types::{Cents, DeliveryFailureInfo, Order, OrderStatusType, Payout},
};

/// Published after every committed order transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub previous_status: OrderStatusType,
    pub action: OrderAction,
    pub actor_id: Option<i64>,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, previous_status: OrderStatusType, action: OrderAction, actor_id: Option<i64>) -> Self {
        Self { order, previous_status, action, actor_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodCollectedEvent {
    pub order: Order,
    pub amount: Cents,
    pub collected_by: Option<i64>,
}

impl CodCollectedEvent {
    pub fn new(order: Order, amount: Cents, collected_by: Option<i64>) -> Self {
        Self { order, amount, collected_by }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailedEvent {
    pub order: Order,
    pub failure: DeliveryFailureInfo,
}

impl DeliveryFailedEvent {
    pub fn new(order: Order, failure: DeliveryFailureInfo) -> Self {
        Self { order, failure }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutCompletedEvent {
    pub payout: Payout,
}

impl PayoutCompletedEvent {
    pub fn new(payout: Payout) -> Self {
        Self { payout }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutFailedEvent {
    pub payout: Payout,
    pub reason: String,
}

impl PayoutFailedEvent {
    pub fn new(payout: Payout, reason: String) -> Self {
        Self { payout, reason }
    }
}
