use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    config::EarningsConfig,
    db_types::{Cents, EarningStatus, NewVendorEarning, OrderId, OrderItem},
};

/// Groups the line items of an order by vendor and splits each vendor's gross into commission and net, using the
/// vendor's commission rate. Every earning becomes available `hold_period_days` after `now`.
///
/// The items are checked with [`validate_items`] first. Vendors are returned in ascending id order.
pub fn compute_vendor_earnings(
    order_id: &OrderId,
    items: &[OrderItem],
    config: &EarningsConfig,
    now: DateTime<Utc>,
) -> Result<Vec<NewVendorEarning>, String> {
    validate_items(items)?;
    let mut gross_by_vendor = BTreeMap::<i64, Cents>::new();
    for item in items {
        let gross = gross_by_vendor.entry(item.vendor_id).or_default();
        *gross = item
            .line_total()
            .and_then(|line| gross.checked_add(line))
            .ok_or_else(|| format!("The items of vendor {} add up to more than can be represented", item.vendor_id))?;
    }
    let available_at = now + Duration::days(config.hold_period_days);
    let earnings = gross_by_vendor
        .into_iter()
        .map(|(vendor_id, gross)| NewVendorEarning {
            vendor_id,
            order_id: order_id.clone(),
            split: gross.apply_commission(config.commission_rate_for(vendor_id)),
            available_at,
            created_at: now,
        })
        .collect();
    Ok(earnings)
}

/// Checks an order's line items before any earnings are derived from them.
pub fn validate_items(items: &[OrderItem]) -> Result<(), String> {
    let mut total = Cents::ZERO;
    for item in items {
        if item.quantity <= 0 {
            return Err(format!("Item '{}' has a non-positive quantity ({})", item.product_name, item.quantity));
        }
        if item.price_at_purchase.is_negative() {
            return Err(format!("Item '{}' has a negative price ({})", item.product_name, item.price_at_purchase));
        }
        total = item.line_total().and_then(|line| total.checked_add(line)).ok_or_else(|| {
            format!(
                "Item '{}' ({} x {}) takes the order total beyond what can be represented",
                item.product_name, item.quantity, item.price_at_purchase
            )
        })?;
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EarningsQueryFilter {
    pub vendor_id: Option<i64>,
    pub order_id: Option<OrderId>,
    pub statuses: Vec<EarningStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl EarningsQueryFilter {
    pub fn for_vendor(vendor_id: i64) -> Self {
        Self { vendor_id: Some(vendor_id), ..Default::default() }
    }

    pub fn for_order(order_id: OrderId) -> Self {
        Self { order_id: Some(order_id), ..Default::default() }
    }

    pub fn with_status(mut self, status: EarningStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.vendor_id.is_none()
            && self.order_id.is_none()
            && self.statuses.is_empty()
            && self.since.is_none()
            && self.until.is_none()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::Rate;

    fn item(vendor_id: i64, quantity: i64, price: i64) -> OrderItem {
        OrderItem {
            id: 0,
            order_id: OrderId::from("1001"),
            vendor_id,
            product_name: format!("product-{vendor_id}"),
            quantity,
            price_at_purchase: Cents::from(price),
        }
    }

    #[test]
    fn single_vendor_at_ten_percent() {
        let now = Utc::now();
        let config = EarningsConfig::default();
        let earnings = compute_vendor_earnings(&OrderId::from("1001"), &[item(5, 1, 10_000)], &config, now).unwrap();
        assert_eq!(earnings.len(), 1);
        let e = &earnings[0];
        assert_eq!(e.vendor_id, 5);
        assert_eq!(e.split.gross, Cents::from(10_000));
        assert_eq!(e.split.commission, Cents::from(1_000));
        assert_eq!(e.split.net, Cents::from(9_000));
        assert_eq!(e.available_at, now + Duration::days(7));
    }

    #[test]
    fn items_are_grouped_by_vendor() {
        let config = EarningsConfig::default().with_vendor_rate(2, Rate::from_bps(750));
        let items = [item(2, 3, 333), item(1, 1, 5_000), item(2, 1, 1)];
        let earnings = compute_vendor_earnings(&OrderId::from("1001"), &items, &config, Utc::now()).unwrap();
        let vendors: Vec<_> = earnings.iter().map(|e| e.vendor_id).collect();
        assert_eq!(vendors, vec![1, 2]);
        let v2 = &earnings[1];
        assert_eq!(v2.split.gross, Cents::from(1_000));
        // 7.5% of 1000 is exactly 75
        assert_eq!(v2.split.commission, Cents::from(75));
        assert!(earnings.iter().all(|e| e.split.is_balanced()));
    }

    #[test]
    fn commission_is_floored() {
        let config = EarningsConfig::default();
        let earnings = compute_vendor_earnings(&OrderId::from("1"), &[item(1, 1, 999)], &config, Utc::now()).unwrap();
        assert_eq!(earnings[0].split.commission, Cents::from(99));
        assert_eq!(earnings[0].split.net, Cents::from(900));
    }

    #[test]
    fn invalid_items() {
        assert!(validate_items(&[item(1, 1, 100), item(2, 2, 0)]).is_ok());
        assert!(validate_items(&[item(1, 0, 100)]).is_err());
        assert!(validate_items(&[item(1, 1, -5)]).is_err());
    }

    #[test]
    fn oversized_line_totals_are_rejected() {
        assert!(validate_items(&[item(1, i64::MAX / 2, 3)]).is_err());
        assert!(validate_items(&[item(1, 1, i64::MAX), item(2, 1, 1)]).is_err());
        let config = EarningsConfig::default();
        let result = compute_vendor_earnings(&OrderId::from("1"), &[item(1, i64::MAX, 2)], &config, Utc::now());
        assert!(result.is_err());
    }
}
