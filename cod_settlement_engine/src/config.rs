//! Tunables for the settlement core.
//!
//! Every value has a default, and can be overridden from `COD_*` environment variables with
//! [`SettlementConfig::from_env_or_default`]. Monetary values are given in cents and percentages in percent with up
//! to two decimal places (e.g. `COD_FEE_PERCENTAGE=2.5`).
use std::{collections::HashMap, env, str::FromStr};

use cod_common::helpers::{parse_env_var, parse_list};
use log::*;
use serde::{Deserialize, Serialize};

use crate::db_types::{Cents, Rate};

const DEFAULT_MIN_COD_ORDER: Cents = Cents::from_const(50_000);
const DEFAULT_MAX_COD_ORDER: Cents = Cents::from_const(50_000_000);
const DEFAULT_COD_FIXED_FEE: Cents = Cents::from_const(5_000);
const DEFAULT_COD_FEE_PERCENTAGE: Rate = Rate::from_percent(2);
const DEFAULT_HIGH_VALUE_THRESHOLD: Cents = Cents::from_const(1_000_000);
const DEFAULT_DELIVERY_DAYS: (u32, u32) = (3, 7);
const DEFAULT_COMMISSION_RATE: Rate = Rate::from_percent(10);
const DEFAULT_HOLD_PERIOD_DAYS: i64 = 7;
const DEFAULT_PAYOUT_MINIMUM: Cents = Cents::from_const(10_000);
const DEFAULT_PAYOUT_FEE: PayoutFee = PayoutFee::Percentage(Rate::from_percent(2));

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SettlementConfig {
    pub cod: CodConfig,
    pub earnings: EarningsConfig,
    pub payouts: PayoutConfig,
}

impl SettlementConfig {
    pub fn from_env_or_default() -> Self {
        Self {
            cod: CodConfig::from_env_or_default(),
            earnings: EarningsConfig::from_env_or_default(),
            payouts: PayoutConfig::from_env_or_default(),
        }
    }
}

//--------------------------------------      CodConfig       ---------------------------------------------------------
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CodConfig {
    pub min_order_amount: Cents,
    pub max_order_amount: Cents,
    pub fixed_fee: Cents,
    /// The COD surcharge is the higher of `fixed_fee` and this percentage of the order amount
    pub fee_percentage: Rate,
    /// Orders at or above this amount are flagged for manual verification
    pub high_value_threshold: Cents,
    pub restricted_areas: RestrictedAreas,
    pub delivery_estimate: DeliveryEstimate,
}

impl Default for CodConfig {
    fn default() -> Self {
        Self {
            min_order_amount: DEFAULT_MIN_COD_ORDER,
            max_order_amount: DEFAULT_MAX_COD_ORDER,
            fixed_fee: DEFAULT_COD_FIXED_FEE,
            fee_percentage: DEFAULT_COD_FEE_PERCENTAGE,
            high_value_threshold: DEFAULT_HIGH_VALUE_THRESHOLD,
            restricted_areas: RestrictedAreas::default(),
            delivery_estimate: DeliveryEstimate { min_days: DEFAULT_DELIVERY_DAYS.0, max_days: DEFAULT_DELIVERY_DAYS.1 },
        }
    }
}

impl CodConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let min_order_amount = env_or("COD_MIN_ORDER_AMOUNT", defaults.min_order_amount.value()).into();
        let max_order_amount = env_or("COD_MAX_ORDER_AMOUNT", defaults.max_order_amount.value()).into();
        let fixed_fee = env_or("COD_FIXED_FEE", defaults.fixed_fee.value()).into();
        let fee_percentage = env_or("COD_FEE_PERCENTAGE", defaults.fee_percentage);
        let high_value_threshold = env_or("COD_HIGH_VALUE_THRESHOLD", defaults.high_value_threshold.value()).into();
        let restricted_areas = RestrictedAreas {
            states: env::var("COD_RESTRICTED_STATES").map(|s| parse_list(&s)).unwrap_or_default(),
            cities: env::var("COD_RESTRICTED_CITIES").map(|s| parse_list(&s)).unwrap_or_default(),
            postal_codes: env::var("COD_RESTRICTED_POSTAL_CODES").map(|s| parse_list(&s)).unwrap_or_default(),
        };
        let min_days = env_or("COD_DELIVERY_DAYS_MIN", defaults.delivery_estimate.min_days);
        let max_days = env_or("COD_DELIVERY_DAYS_MAX", defaults.delivery_estimate.max_days);
        let delivery_estimate = if min_days <= max_days {
            DeliveryEstimate { min_days, max_days }
        } else {
            warn!("🪛️ COD_DELIVERY_DAYS_MIN ({min_days}) exceeds COD_DELIVERY_DAYS_MAX ({max_days}). Using defaults.");
            defaults.delivery_estimate
        };
        let mut config = Self {
            min_order_amount,
            max_order_amount,
            fixed_fee,
            fee_percentage,
            high_value_threshold,
            restricted_areas,
            delivery_estimate,
        };
        if config.min_order_amount > config.max_order_amount {
            warn!(
                "🪛️ COD_MIN_ORDER_AMOUNT ({}) exceeds COD_MAX_ORDER_AMOUNT ({}). Reverting both to defaults.",
                config.min_order_amount, config.max_order_amount
            );
            config.min_order_amount = defaults.min_order_amount;
            config.max_order_amount = defaults.max_order_amount;
        }
        config
    }
}

/// Locations where cash on delivery is not offered. Matching is case-insensitive.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RestrictedAreas {
    pub states: Vec<String>,
    pub cities: Vec<String>,
    pub postal_codes: Vec<String>,
}

impl RestrictedAreas {
    pub fn is_empty(&self) -> bool {
        self.states.is_empty() && self.cities.is_empty() && self.postal_codes.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEstimate {
    pub min_days: u32,
    pub max_days: u32,
}

//--------------------------------------    EarningsConfig    ---------------------------------------------------------
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EarningsConfig {
    pub default_commission_rate: Rate,
    /// Per-vendor overrides of the default commission rate
    pub vendor_commission_rates: HashMap<i64, Rate>,
    /// Days between delivery and an earning becoming available for payout
    pub hold_period_days: i64,
}

impl Default for EarningsConfig {
    fn default() -> Self {
        Self {
            default_commission_rate: DEFAULT_COMMISSION_RATE,
            vendor_commission_rates: HashMap::new(),
            hold_period_days: DEFAULT_HOLD_PERIOD_DAYS,
        }
    }
}

impl EarningsConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let default_commission_rate = env_or("COD_DEFAULT_COMMISSION_RATE", defaults.default_commission_rate);
        let vendor_commission_rates =
            env::var("COD_VENDOR_COMMISSION_RATES").map(|s| parse_vendor_rates(&s)).unwrap_or_default();
        let hold_period_days = match env_or("COD_EARNINGS_HOLD_DAYS", defaults.hold_period_days) {
            d if d < 0 => {
                warn!("🪛️ COD_EARNINGS_HOLD_DAYS cannot be negative. Using the default, {DEFAULT_HOLD_PERIOD_DAYS}.");
                DEFAULT_HOLD_PERIOD_DAYS
            },
            d => d,
        };
        Self { default_commission_rate, vendor_commission_rates, hold_period_days }
    }

    pub fn commission_rate_for(&self, vendor_id: i64) -> Rate {
        self.vendor_commission_rates.get(&vendor_id).copied().unwrap_or(self.default_commission_rate)
    }

    pub fn with_vendor_rate(mut self, vendor_id: i64, rate: Rate) -> Self {
        self.vendor_commission_rates.insert(vendor_id, rate);
        self
    }
}

/// Parses `"12:7.5,15:10"` into `{12: 7.5%, 15: 10%}`. Invalid entries are logged and skipped.
fn parse_vendor_rates(s: &str) -> HashMap<i64, Rate> {
    parse_list(s)
        .into_iter()
        .filter_map(|entry| {
            let parsed = entry
                .split_once(':')
                .and_then(|(vendor, rate)| Some((vendor.trim().parse::<i64>().ok()?, rate.parse::<Rate>().ok()?)));
            if parsed.is_none() {
                warn!("🪛️ Ignoring invalid vendor commission rate entry '{entry}'. Expected <vendor_id>:<percent>");
            }
            parsed
        })
        .collect()
}

//--------------------------------------     PayoutConfig     ---------------------------------------------------------
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutFee {
    Percentage(Rate),
    Fixed(Cents),
}

impl PayoutFee {
    /// The processing fee for a payout of `amount`. The fee never exceeds the amount.
    pub fn fee_for(&self, amount: Cents) -> Cents {
        let fee = match self {
            PayoutFee::Percentage(rate) => amount.percentage(*rate),
            PayoutFee::Fixed(fee) => *fee,
        };
        fee.min(amount).max(Cents::ZERO)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PayoutConfig {
    pub minimum_amount: Cents,
    pub processing_fee: PayoutFee,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self { minimum_amount: DEFAULT_PAYOUT_MINIMUM, processing_fee: DEFAULT_PAYOUT_FEE }
    }
}

impl PayoutConfig {
    pub fn from_env_or_default() -> Self {
        let minimum_amount = env_or("COD_PAYOUT_MINIMUM", DEFAULT_PAYOUT_MINIMUM.value()).into();
        let fee_type = env::var("COD_PAYOUT_FEE_TYPE").unwrap_or_else(|_| "percentage".into());
        let fee_value = env::var("COD_PAYOUT_FEE_VALUE").ok();
        let processing_fee = match (fee_type.trim().to_lowercase().as_str(), fee_value) {
            (_, None) => DEFAULT_PAYOUT_FEE,
            ("percentage", Some(v)) => v.parse::<Rate>().map(PayoutFee::Percentage).unwrap_or_else(|e| {
                warn!("🪛️ COD_PAYOUT_FEE_VALUE is not a valid percentage. {e}. Using the default.");
                DEFAULT_PAYOUT_FEE
            }),
            ("fixed", Some(v)) => v.trim().parse::<i64>().map(|c| PayoutFee::Fixed(Cents::from(c))).unwrap_or_else(|e| {
                warn!("🪛️ COD_PAYOUT_FEE_VALUE is not a valid amount in cents. {e}. Using the default.");
                DEFAULT_PAYOUT_FEE
            }),
            (other, Some(_)) => {
                warn!("🪛️ COD_PAYOUT_FEE_TYPE must be 'percentage' or 'fixed', not '{other}'. Using the default.");
                DEFAULT_PAYOUT_FEE
            },
        };
        Self { minimum_amount, processing_fee }
    }
}

fn env_or<T: FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match parse_env_var::<T>(key) {
        Ok(Some(v)) => v,
        Ok(None) => default,
        Err(raw) => {
            error!("🪛️ {raw} is not a valid value for {key}. Using the default, {default}, instead.");
            default
        },
    }
}
