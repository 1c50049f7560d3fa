use std::sync::Arc;

use chrono::Duration;
use cod_settlement_engine::{
    config::EarningsConfig,
    db_types::{Cents, CommissionSplit, EarningStatus, NewVendorEarning, OrderId, Rate},
    helpers::FixedClock,
    traits::{ActivityLog, EarningsError, EarningsManagement, OrderWorkflowDatabase},
    EarningsApi,
    EarningsQueryFilter,
};

use crate::support::{
    prepare_env::{prepare_test_env, tear_down},
    seed::{after_hold_period, cod_order, deliver, start_time, workflow_api, ADMIN, DRIVER},
};

mod support;

#[tokio::test]
async fn commission_is_taken_at_the_vendor_rate() {
    let db = prepare_test_env().await;
    let clock = FixedClock::new(start_time());
    let config = EarningsConfig::default().with_vendor_rate(31, Rate::from_bps(750));
    let workflow = workflow_api(&db, config.clone(), &clock);
    let api = EarningsApi::new(db.clone(), config).with_clock(Arc::new(clock.clone()));

    let order = deliver(&workflow, cod_order("2001", &[(30, 10_000), (31, 10_001)], start_time()), DRIVER, 20_001).await;
    let earnings = api.earnings_for_order(&order).await.unwrap();
    assert_eq!(earnings.len(), 2);
    assert_eq!(earnings[0].vendor_id, 30);
    assert_eq!(earnings[0].amount, Cents::from(10_000));
    assert_eq!(earnings[0].commission, Cents::from(1_000));
    assert_eq!(earnings[0].net_amount, Cents::from(9_000));
    assert_eq!(earnings[0].status, EarningStatus::Pending);
    // 7.5% of 100.01 is 7.50075, floored to 750 cents
    assert_eq!(earnings[1].vendor_id, 31);
    assert_eq!(earnings[1].commission, Cents::from(750));
    assert_eq!(earnings[1].net_amount, Cents::from(9_251));
    for e in &earnings {
        assert_eq!(e.net_amount + e.commission, e.amount);
    }
    tear_down(db).await;
}

#[tokio::test]
async fn vendor_earnings_are_never_negative() {
    let db = prepare_test_env().await;
    let clock = FixedClock::new(start_time());
    let config = EarningsConfig::default().with_vendor_rate(32, Rate::from_bps(15_000));
    let workflow = workflow_api(&db, config.clone(), &clock);
    let api = EarningsApi::new(db.clone(), config).with_clock(Arc::new(clock.clone()));

    let order = deliver(&workflow, cod_order("2010", &[(32, 10_000)], start_time()), DRIVER, 10_000).await;
    let earnings = api.earnings_for_order(&order).await.unwrap();
    assert_eq!(earnings.len(), 1);
    assert_eq!(earnings[0].commission, Cents::from(10_000));
    assert_eq!(earnings[0].net_amount, Cents::ZERO);

    let overdrawn = NewVendorEarning {
        vendor_id: 33,
        order_id: OrderId::from("2010"),
        split: CommissionSplit { gross: Cents::from(10_000), commission: Cents::from(15_000), net: Cents::from(-5_000) },
        available_at: start_time(),
        created_at: start_time(),
    };
    let err = db.record_earnings(vec![overdrawn]).await.expect_err("A negative net earning was recorded");
    assert!(matches!(err, EarningsError::InvalidEarning(_)), "{err}");
    assert_eq!(api.vendor_balance(33).await.unwrap().lifetime_total(), Cents::ZERO);
    tear_down(db).await;
}

#[tokio::test]
async fn recording_earnings_twice_does_not_double_count() {
    let db = prepare_test_env().await;
    let clock = FixedClock::new(start_time());
    let workflow = workflow_api(&db, EarningsConfig::default(), &clock);
    let api = EarningsApi::new(db.clone(), EarningsConfig::default()).with_clock(Arc::new(clock.clone()));

    let order = deliver(&workflow, cod_order("2002", &[(30, 10_000)], start_time()), DRIVER, 10_000).await;
    let items = workflow.db().fetch_order_items(&order.order_id).await.unwrap();
    let again = api.record_earnings(&order, &items, Some(ADMIN)).await.unwrap();
    assert!(again.is_empty());
    let balance = api.vendor_balance(30).await.unwrap();
    assert_eq!(balance.pending, Cents::from(9_000));
    assert_eq!(balance.lifetime_total(), Cents::from(9_000));
    tear_down(db).await;
}

#[tokio::test]
async fn earnings_need_a_delivered_order() {
    let db = prepare_test_env().await;
    let clock = FixedClock::new(start_time());
    let workflow = workflow_api(&db, EarningsConfig::default(), &clock);
    let api = EarningsApi::new(db.clone(), EarningsConfig::default()).with_clock(Arc::new(clock.clone()));
    let (order, _) = workflow.insert_order(cod_order("2003", &[(30, 10_000)], start_time())).await.unwrap();
    let items = workflow.db().fetch_order_items(&order.order_id).await.unwrap();
    let err = api.record_earnings(&order, &items, None).await.unwrap_err();
    assert!(matches!(err, EarningsError::OrderNotDelivered { .. }));
    assert!(err.is_guard_violation());
    tear_down(db).await;
}

#[tokio::test]
async fn earnings_mature_after_the_hold_period() {
    let db = prepare_test_env().await;
    let clock = FixedClock::new(start_time());
    let workflow = workflow_api(&db, EarningsConfig::default(), &clock);
    let api = EarningsApi::new(db.clone(), EarningsConfig::default()).with_clock(Arc::new(clock.clone()));
    deliver(&workflow, cod_order("2004", &[(30, 10_000)], start_time()), DRIVER, 10_000).await;

    clock.advance(Duration::days(6));
    let released = api.make_earnings_available(None).await.unwrap();
    assert!(released.is_empty());
    assert_eq!(api.available_balance(30).await.unwrap(), Cents::ZERO);
    assert_eq!(api.pending_balance(30).await.unwrap(), Cents::from(9_000));

    clock.advance(Duration::days(1));
    let released = api.make_earnings_available(None).await.unwrap();
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].status, EarningStatus::Available);
    assert_eq!(api.available_balance(30).await.unwrap(), Cents::from(9_000));
    assert_eq!(api.pending_balance(30).await.unwrap(), Cents::ZERO);

    let released = api.make_earnings_available(None).await.unwrap();
    assert!(released.is_empty(), "A second release must be a no-op");

    let activity = db.fetch_activity("vendor_earnings", "batch").await.unwrap();
    assert_eq!(activity.len(), 1);
    tear_down(db).await;
}

#[tokio::test]
async fn concurrent_releases_change_each_earning_once() {
    let db = prepare_test_env().await;
    let clock = FixedClock::new(start_time());
    let workflow = workflow_api(&db, EarningsConfig::default(), &clock);
    let api = EarningsApi::new(db.clone(), EarningsConfig::default()).with_clock(Arc::new(clock.clone()));
    for i in 0..5 {
        deliver(&workflow, cod_order(&format!("2010{i}"), &[(30, 1_000), (32, 2_000)], start_time()), DRIVER, 3_000)
            .await;
    }
    after_hold_period(&clock);
    let (a, b) = tokio::join!(api.make_earnings_available(None), api.make_earnings_available(None));
    let released = a.map(|v| v.len()).unwrap_or(0) + b.map(|v| v.len()).unwrap_or(0);
    assert!(released <= 10);
    // Whatever happened above, one more sweep leaves every earning available exactly once
    api.make_earnings_available(None).await.unwrap();
    let available = api.earnings_for_vendor(30, Some(EarningStatus::Available)).await.unwrap();
    assert_eq!(available.len(), 5);
    assert_eq!(api.available_balance(32).await.unwrap(), Cents::from(5 * 1_800));
    tear_down(db).await;
}

#[tokio::test]
async fn withholding_and_releasing_an_earning() {
    let db = prepare_test_env().await;
    let clock = FixedClock::new(start_time());
    let workflow = workflow_api(&db, EarningsConfig::default(), &clock);
    let api = EarningsApi::new(db.clone(), EarningsConfig::default()).with_clock(Arc::new(clock.clone()));
    let order = deliver(&workflow, cod_order("2005", &[(30, 10_000)], start_time()), DRIVER, 10_000).await;
    let earning = api.earnings_for_order(&order).await.unwrap().remove(0);

    let withheld = api.withhold_earning(earning.id, "Quality complaint", Some(ADMIN)).await.unwrap();
    assert_eq!(withheld.status, EarningStatus::Withheld);
    assert_eq!(withheld.withheld_reason.as_deref(), Some("Quality complaint"));
    assert_eq!(api.withheld_balance(30).await.unwrap(), Cents::from(9_000));

    let err = api.withhold_earning(earning.id, "Twice", None).await.unwrap_err();
    assert!(matches!(err, EarningsError::InvalidStatus { status: EarningStatus::Withheld, .. }));

    let released = api.release_withheld_earning(earning.id, Some(ADMIN)).await.unwrap();
    assert_eq!(released.status, EarningStatus::Available);
    assert_eq!(released.withheld_reason, None);
    assert_eq!(api.withheld_balance(30).await.unwrap(), Cents::ZERO);
    assert_eq!(api.available_balance(30).await.unwrap(), Cents::from(9_000));

    let err = api.release_withheld_earning(earning.id, None).await.unwrap_err();
    assert!(err.is_guard_violation());
    let err = api.fetch_earning(9_999).await.unwrap_err();
    assert!(matches!(err, EarningsError::EarningNotFound(9_999)));

    let filtered = api
        .search_earnings(EarningsQueryFilter::for_vendor(30).with_status(EarningStatus::Available).since(start_time()))
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    tear_down(db).await;
}
