use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    CodCollectedEvent,
    DeliveryFailedEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderStatusChangedEvent,
    PayoutCompletedEvent,
    PayoutFailedEvent,
};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_status_changed_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub cod_collected_producer: Vec<EventProducer<CodCollectedEvent>>,
    pub delivery_failed_producer: Vec<EventProducer<DeliveryFailedEvent>>,
    pub payout_completed_producer: Vec<EventProducer<PayoutCompletedEvent>>,
    pub payout_failed_producer: Vec<EventProducer<PayoutFailedEvent>>,
}

pub struct EventHandlers {
    pub on_order_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_cod_collected: Option<EventHandler<CodCollectedEvent>>,
    pub on_delivery_failed: Option<EventHandler<DeliveryFailedEvent>>,
    pub on_payout_completed: Option<EventHandler<PayoutCompletedEvent>>,
    pub on_payout_failed: Option<EventHandler<PayoutFailedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_status_changed: hooks.on_order_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_cod_collected: hooks.on_cod_collected.map(|f| EventHandler::new(buffer_size, f)),
            on_delivery_failed: hooks.on_delivery_failed.map(|f| EventHandler::new(buffer_size, f)),
            on_payout_completed: hooks.on_payout_completed.map(|f| EventHandler::new(buffer_size, f)),
            on_payout_failed: hooks.on_payout_failed.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_status_changed {
            result.order_status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_cod_collected {
            result.cod_collected_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_delivery_failed {
            result.delivery_failed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payout_completed {
            result.payout_completed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payout_failed {
            result.payout_failed_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task for every registered handler. Each one shuts down once all of its producers have been dropped.
    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_cod_collected {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_delivery_failed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payout_completed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payout_failed {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_cod_collected: Option<Handler<CodCollectedEvent>>,
    pub on_delivery_failed: Option<Handler<DeliveryFailedEvent>>,
    pub on_payout_completed: Option<Handler<PayoutCompletedEvent>>,
    pub on_payout_failed: Option<Handler<PayoutFailedEvent>>,
}

impl EventHooks {
    pub fn on_order_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_cod_collected<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(CodCollectedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_cod_collected = Some(Arc::new(f));
        self
    }

    pub fn on_delivery_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DeliveryFailedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_delivery_failed = Some(Arc::new(f));
        self
    }

    pub fn on_payout_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PayoutCompletedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payout_completed = Some(Arc::new(f));
        self
    }

    pub fn on_payout_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PayoutFailedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payout_failed = Some(Arc::new(f));
        self
    }
}
