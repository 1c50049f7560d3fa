use chrono::{DateTime, Duration, NaiveDate, Utc};
use cod_settlement_engine::{
    config::{PayoutFee, RestrictedAreas},
    db_types::{Cents, NewOrder, NewOrderItem, OrderId, OrderStatusType, PaymentMethod, PayoutStatus, Rate, ReconciliationStatus},
    helpers::Clock,
    DeliveryAddress,
    ReconciliationQueryFilter,
};
use cucumber::{given, then, when};

use crate::cucumber::CodWorld;

const ADMIN: Option<i64> = Some(1);

//--------------------------------------        Setup         ---------------------------------------------------------

#[given(expr = "the time is {string}")]
async fn set_time(world: &mut CodWorld, time: String) {
    let now = DateTime::parse_from_rfc3339(&time).expect("Not a RFC3339 timestamp").with_timezone(&Utc);
    world.system().clock.set(now);
}

#[given(expr = "vendor {int} pays {int}% commission")]
async fn vendor_rate(world: &mut CodWorld, vendor: i64, percent: i64) {
    let config = world.system().earnings_config.clone().with_vendor_rate(vendor, Rate::from_percent(percent));
    world.system_mut().earnings_config = config;
}

#[given(expr = "the minimum payout is {int} cents with a fixed fee of {int} cents")]
async fn payout_config(world: &mut CodWorld, minimum: i64, fee: i64) {
    let config = &mut world.system_mut().payout_config;
    config.minimum_amount = Cents::from(minimum);
    config.processing_fee = PayoutFee::Fixed(Cents::from(fee));
}

#[given(expr = "cash on delivery is not offered in {string}")]
async fn restricted_state(world: &mut CodWorld, state: String) {
    world.system_mut().cod_config.restricted_areas = RestrictedAreas { states: vec![state], ..Default::default() };
}

#[when(expr = "{int} days pass")]
async fn days_pass(world: &mut CodWorld, days: i64) {
    world.system().clock.advance(Duration::days(days));
}

#[when(expr = "{int} minutes pass")]
async fn minutes_pass(world: &mut CodWorld, minutes: i64) {
    world.system().clock.advance(Duration::minutes(minutes));
}

//--------------------------------------        Orders        ---------------------------------------------------------

#[when(expr = "COD order {word} for {int} cents from vendor {int} is placed")]
async fn place_cod_order(world: &mut CodWorld, order_id: String, price: i64, vendor: i64) {
    place_order(world, order_id, price, vendor, PaymentMethod::Cod).await;
}

#[when(expr = "prepaid order {word} for {int} cents from vendor {int} is placed")]
async fn place_prepaid_order(world: &mut CodWorld, order_id: String, price: i64, vendor: i64) {
    place_order(world, order_id, price, vendor, PaymentMethod::Other).await;
}

async fn place_order(world: &mut CodWorld, order_id: String, price: i64, vendor: i64, method: PaymentMethod) {
    let now = world.system().clock.now();
    let order = NewOrder::new(OrderId::from(order_id), "alice".into(), Cents::from(price))
        .with_payment_method(method)
        .with_item(NewOrderItem::new(vendor, "Widget", 1, Cents::from(price)))
        .created_at(now);
    world.system().workflow().insert_order(order).await.expect("Error inserting order");
}

#[when(expr = "order {word} is confirmed")]
async fn confirm(world: &mut CodWorld, order_id: String) {
    world.system().workflow().confirm_order(&OrderId::from(order_id), ADMIN).await.expect("Error confirming order");
}

#[when(expr = "order {word} is out for delivery with delivery person {int}")]
async fn out_for_delivery(world: &mut CodWorld, order_id: String, driver: i64) {
    let api = world.system().workflow();
    let id = OrderId::from(order_id);
    let order = api.fetch_order(&id).await.expect("Order does not exist");
    if order.status == OrderStatusType::Pending {
        api.confirm_order(&id, ADMIN).await.expect("Error confirming order");
    }
    if matches!(order.status, OrderStatusType::Pending | OrderStatusType::Confirmed) {
        api.start_processing(&id, ADMIN).await.expect("Error starting processing");
    }
    api.mark_out_for_delivery(&id, driver, ADMIN).await.expect("Error dispatching order");
}

#[when(expr = "delivery person {int} collects {int} cents for order {word}")]
async fn collect(world: &mut CodWorld, driver: i64, amount: i64, order_id: String) {
    let result = world
        .system()
        .workflow()
        .confirm_cod_collection(&OrderId::from(order_id), Cents::from(amount), Some(driver), Some(driver))
        .await;
    world.last_error = result.err().map(|e| e.to_string());
}

#[when(expr = "delivery of order {word} fails because {string} and is rescheduled")]
async fn delivery_rescheduled(world: &mut CodWorld, order_id: String, reason: String) {
    delivery_failure(world, order_id, reason, true).await;
}

#[when(expr = "delivery of order {word} fails because {string}")]
async fn delivery_failed(world: &mut CodWorld, order_id: String, reason: String) {
    delivery_failure(world, order_id, reason, false).await;
}

async fn delivery_failure(world: &mut CodWorld, order_id: String, reason: String, reschedule: bool) {
    let api = world.system().workflow();
    let id = OrderId::from(order_id);
    let attempt = api.annotations(&id).await.expect("Error fetching annotations").len() as u32 + 1;
    api.handle_delivery_failure(&id, &reason, attempt, reschedule, None).await.expect("Error recording failure");
}

#[when(expr = "order {word} is completed")]
async fn complete(world: &mut CodWorld, order_id: String) {
    let result = world.system().workflow().complete_order(&OrderId::from(order_id), ADMIN).await;
    world.last_error = result.err().map(|e| e.to_string());
}

#[when(expr = "order {word} is cancelled because {string}")]
async fn cancel(world: &mut CodWorld, order_id: String, reason: String) {
    let result = world.system().workflow().cancel_order(&OrderId::from(order_id), &reason, ADMIN).await;
    world.last_error = result.err().map(|e| e.to_string());
}

#[when(expr = "I try to confirm order {word}")]
async fn try_confirm(world: &mut CodWorld, order_id: String) {
    let result = world.system().workflow().confirm_order(&OrderId::from(order_id), ADMIN).await;
    world.last_error = result.err().map(|e| e.to_string());
}

#[then(expr = "order {word} has status {word}")]
async fn check_status(world: &mut CodWorld, order_id: String, status: String) {
    let order = world.system().workflow().fetch_order(&OrderId::from(order_id)).await.expect("Order does not exist");
    let expected = status.parse::<OrderStatusType>().expect("Not a valid order status");
    assert_eq!(order.status, expected);
}

#[then(expr = "order {word} went through {string}")]
async fn check_history(world: &mut CodWorld, order_id: String, path: String) {
    let history = world.system().workflow().status_history(&OrderId::from(order_id)).await.expect("No history");
    let statuses = history.iter().map(|e| e.status.to_string()).collect::<Vec<_>>().join(" > ");
    assert_eq!(statuses, path);
}

#[then(expr = "order {word} has collected {int} cents")]
async fn check_collected(world: &mut CodWorld, order_id: String, amount: i64) {
    let order = world.system().workflow().fetch_order(&OrderId::from(order_id)).await.expect("Order does not exist");
    assert!(order.is_cod_collected());
    assert_eq!(order.cod_amount_collected, Some(Cents::from(amount)));
}

#[then(expr = "order {word} can only be {string}")]
async fn check_actions(world: &mut CodWorld, order_id: String, actions: String) {
    let state = world.system().workflow().get_workflow_state(&OrderId::from(order_id)).await.expect("No state");
    let legal = state.available_actions.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
    assert_eq!(legal, actions);
}

#[then(expr = "the request is rejected with {string}")]
async fn check_rejected(world: &mut CodWorld, message: String) {
    let err = world.last_error.take().expect("The last request succeeded");
    assert!(err.contains(&message), "'{err}' does not contain '{message}'");
}

#[then("the request succeeds")]
async fn check_succeeded(world: &mut CodWorld) {
    assert_eq!(world.last_error.take(), None);
}

//--------------------------------------       Earnings       ---------------------------------------------------------

#[when("the earnings release job runs")]
async fn release_earnings(world: &mut CodWorld) {
    world.system().earnings().make_earnings_available(None).await.expect("Error releasing earnings");
}

#[then(expr = "vendor {int} has {int} cents {word}")]
async fn check_balance(world: &mut CodWorld, vendor: i64, amount: i64, bucket: String) {
    let balance = world.system().earnings().vendor_balance(vendor).await.expect("Error fetching balance");
    let actual = match bucket.as_str() {
        "pending" => balance.pending,
        "available" => balance.available,
        "withheld" => balance.withheld,
        "processing" => balance.processing,
        "paid" => balance.paid,
        other => panic!("Unknown balance bucket {other}"),
    };
    assert_eq!(actual, Cents::from(amount), "{balance:?}");
}

#[then(expr = "order {word} earned vendor {int} {int} cents after {int} cents commission")]
async fn check_earning(world: &mut CodWorld, order_id: String, vendor: i64, net: i64, commission: i64) {
    let api = world.system().workflow();
    let order = api.fetch_order(&OrderId::from(order_id)).await.expect("Order does not exist");
    let earnings = world.system().earnings().earnings_for_order(&order).await.expect("Error fetching earnings");
    let earning = earnings.iter().find(|e| e.vendor_id == vendor).expect("No earning for vendor");
    assert_eq!(earning.net_amount, Cents::from(net));
    assert_eq!(earning.commission, Cents::from(commission));
    assert_eq!(earning.net_amount + earning.commission, earning.amount);
}

//--------------------------------------        Payouts       ---------------------------------------------------------

#[when(expr = "vendor {int} requests a payout of {int} cents")]
async fn request_payout(world: &mut CodWorld, vendor: i64, amount: i64) {
    match world.system().payouts().create_payout_request(vendor, Cents::from(amount), Some(vendor)).await {
        Ok(result) => {
            world.last_payout = Some(result.payout);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e.to_string()),
    }
}

#[when("the payout starts processing")]
async fn payout_processing(world: &mut CodWorld) {
    let id = world.payout_id();
    let payout = world.system().payouts().start_processing(&id, ADMIN).await.expect("Error processing payout");
    world.last_payout = Some(payout);
}

#[when(expr = "the payout is completed with transfer {word}")]
async fn payout_completed(world: &mut CodWorld, reference: String) {
    let id = world.payout_id();
    let result = world.system().payouts().complete_payout(&id, Some(reference), ADMIN).await;
    match result {
        Ok(r) => world.last_payout = Some(r.payout),
        Err(e) => world.last_error = Some(e.to_string()),
    }
}

#[when(expr = "the payout fails because {string}")]
async fn payout_failed(world: &mut CodWorld, reason: String) {
    let id = world.payout_id();
    let result = world.system().payouts().fail_payout(&id, &reason, ADMIN).await.expect("Error failing payout");
    world.last_payout = Some(result.payout);
}

#[when("the payout is retried")]
async fn payout_retried(world: &mut CodWorld) {
    let id = world.payout_id();
    match world.system().payouts().retry_payout(&id, ADMIN).await {
        Ok(r) => world.last_payout = Some(r.payout),
        Err(e) => world.last_error = Some(e.to_string()),
    }
}

#[then(expr = "the payout is for {int} cents with a fee of {int} cents and {int} cents reserved")]
async fn check_payout(world: &mut CodWorld, amount: i64, fee: i64, reserved: i64) {
    let payout = world.last_payout.as_ref().expect("No payout");
    assert_eq!(payout.amount, Cents::from(amount));
    assert_eq!(payout.processing_fee, Cents::from(fee));
    assert_eq!(payout.net_amount, Cents::from(amount - fee));
    assert_eq!(payout.reserved_amount, Cents::from(reserved));
}

#[then(expr = "the payout status is {word}")]
async fn check_payout_status(world: &mut CodWorld, status: String) {
    let id = world.payout_id();
    let payout = world.system().payouts().fetch_payout(&id).await.expect("Payout does not exist");
    assert_eq!(payout.status, status.parse::<PayoutStatus>().expect("Not a payout status"));
}

//--------------------------------------    Reconciliation    ---------------------------------------------------------

fn parse_date(date: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("Dates must be YYYY-MM-DD")
}

#[when(expr = "the daily reconciliation runs for {word}")]
async fn daily_reconciliation(world: &mut CodWorld, date: String) {
    let report =
        world.system().reconciliation().generate_daily_report(parse_date(&date), None, ADMIN).await.expect("Error");
    world.last_reconciliations = report.created;
}

#[then(expr = "{int} reconciliations were created")]
async fn check_created(world: &mut CodWorld, count: usize) {
    assert_eq!(world.last_reconciliations.len(), count);
}

#[when(expr = "the cash of delivery person {int} on {word} is counted at {int} cents")]
async fn count_cash(world: &mut CodWorld, driver: i64, date: String, amount: i64) {
    let api = world.system().reconciliation();
    let filter = ReconciliationQueryFilter::for_date(parse_date(&date)).with_delivery_person(driver);
    let rec = api.fetch_reconciliations(filter).await.expect("Error").pop().expect("No reconciliation");
    api.verify_collection(rec.id, Cents::from(amount), Some("Counted at the depot"), ADMIN)
        .await
        .expect("Error verifying collection");
}

#[when(expr = "the discrepancy of delivery person {int} on {word} is resolved with {string}")]
async fn resolve(world: &mut CodWorld, driver: i64, date: String, resolution: String) {
    let api = world.system().reconciliation();
    let filter = ReconciliationQueryFilter::for_date(parse_date(&date)).with_delivery_person(driver);
    let rec = api.fetch_reconciliations(filter).await.expect("Error").pop().expect("No reconciliation");
    api.handle_discrepancy(rec.id, "Cash short", Some(&resolution), ADMIN).await.expect("Error resolving");
}

#[when("zero discrepancy reconciliations are verified automatically")]
async fn auto_verify(world: &mut CodWorld) {
    world.system().reconciliation().auto_verify_zero_discrepancy(None).await.expect("Error auto-verifying");
}

#[then(expr = "delivery person {int} on {word} has a discrepancy of {int} cents and is {word}")]
async fn check_reconciliation(world: &mut CodWorld, driver: i64, date: String, discrepancy: i64, status: String) {
    let filter = ReconciliationQueryFilter::for_date(parse_date(&date)).with_delivery_person(driver);
    let recs = world.system().reconciliation().fetch_reconciliations(filter).await.expect("Error");
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].discrepancy, Cents::from(discrepancy));
    assert_eq!(recs[0].discrepancy, recs[0].collected_amount - recs[0].total_cod_amount);
    assert_eq!(recs[0].status, status.parse::<ReconciliationStatus>().expect("Not a reconciliation status"));
}

//--------------------------------------    COD eligibility   ---------------------------------------------------------

#[when(expr = "a customer in {string}, {string} checks out {int} cents with phone {string}")]
async fn check_eligibility(world: &mut CodWorld, city: String, state: String, amount: i64, phone: String) {
    let address = DeliveryAddress::new("1 Main Street", city.as_str(), state.as_str(), "10001");
    let phone = (!phone.is_empty()).then_some(phone);
    let result = world.system().eligibility().validate(Some(&address), Cents::from(amount), phone.as_deref());
    world.last_availability = Some(result);
}

#[then("cash on delivery is offered")]
async fn check_offered(world: &mut CodWorld) {
    let result = world.last_availability.as_ref().expect("No availability check");
    assert!(result.available, "{:?}", result.errors);
}

#[then(expr = "cash on delivery is refused because {string}")]
async fn check_refused(world: &mut CodWorld, reason: String) {
    let result = world.last_availability.as_ref().expect("No availability check");
    assert!(!result.available);
    assert!(result.errors.iter().any(|e| e.contains(&reason)), "{:?}", result.errors);
}

#[then(expr = "the COD fee is {int} cents")]
async fn check_fee(world: &mut CodWorld, fee: i64) {
    let result = world.last_availability.as_ref().expect("No availability check");
    assert_eq!(result.cod_fee, Cents::from(fee));
}

#[then("the order is flagged for verification")]
async fn check_flagged(world: &mut CodWorld) {
    let result = world.last_availability.as_ref().expect("No availability check");
    assert!(result.requires_verification);
}
