use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use cod_settlement_engine::{
    config::EarningsConfig,
    db_types::{Cents, NewOrder, NewOrderItem, Order, OrderId, PaymentMethod, Rate},
    events::EventProducers,
    helpers::FixedClock,
    CodOrderWorkflowApi,
    SqliteDatabase,
};

pub const DRIVER: i64 = 7;
pub const ADMIN: i64 = 1;

pub fn start_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-03-05T10:00:00Z").unwrap().with_timezone(&Utc)
}

pub fn workflow_api(
    db: &SqliteDatabase,
    config: EarningsConfig,
    clock: &FixedClock,
) -> CodOrderWorkflowApi<SqliteDatabase> {
    CodOrderWorkflowApi::new(db.clone(), config, EventProducers::default()).with_clock(Arc::new(clock.clone()))
}

/// A COD order whose total is the sum of its `(vendor_id, price)` items, one unit each.
pub fn cod_order(order_id: &str, items: &[(i64, i64)], at: DateTime<Utc>) -> NewOrder {
    let total = items.iter().map(|(_, p)| *p).sum::<i64>();
    items.iter().enumerate().fold(
        NewOrder::new(OrderId::from(order_id), "alice".into(), Cents::from(total)).created_at(at),
        |order, (i, (vendor, price))| {
            order.with_item(NewOrderItem::new(*vendor, format!("item {i}"), 1, Cents::from(*price)))
        },
    )
}

pub fn prepaid_order(order_id: &str, total: i64, at: DateTime<Utc>) -> NewOrder {
    NewOrder::new(OrderId::from(order_id), "bob".into(), Cents::from(total))
        .with_payment_method(PaymentMethod::Other)
        .with_item(NewOrderItem::new(11, "prepaid item", 1, Cents::from(total)))
        .created_at(at)
}

/// Takes a freshly inserted order to `out_for_delivery` with the given delivery person.
pub async fn dispatch(api: &CodOrderWorkflowApi<SqliteDatabase>, order_id: &OrderId, driver: i64) -> Order {
    api.confirm_order(order_id, Some(ADMIN)).await.expect("Error confirming order");
    api.start_processing(order_id, Some(ADMIN)).await.expect("Error starting processing");
    api.mark_out_for_delivery(order_id, driver, Some(ADMIN)).await.expect("Error dispatching order")
}

/// Inserts the order and drives it to `delivered`, collecting `collected` cents.
pub async fn deliver(
    api: &CodOrderWorkflowApi<SqliteDatabase>,
    order: NewOrder,
    driver: i64,
    collected: i64,
) -> Order {
    let (order, _) = api.insert_order(order).await.expect("Error inserting order");
    dispatch(api, &order.order_id, driver).await;
    api.confirm_cod_collection(&order.order_id, Cents::from(collected), Some(driver), Some(driver))
        .await
        .expect("Error confirming collection")
}

pub fn zero_commission_for(vendors: &[i64]) -> EarningsConfig {
    vendors.iter().fold(EarningsConfig::default(), |config, v| config.with_vendor_rate(*v, Rate::from_bps(0)))
}

pub fn after_hold_period(clock: &FixedClock) {
    clock.advance(Duration::days(EarningsConfig::default().hold_period_days) + Duration::hours(1));
}
