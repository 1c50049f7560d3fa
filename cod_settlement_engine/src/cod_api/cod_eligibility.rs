//! Decides whether cash on delivery can be offered for a checkout, and what it costs.
//!
//! The validator is a pure function of its inputs and the [`CodConfig`]. Every rule is evaluated, so a rejected
//! checkout reports all of its problems at once.
use serde::{Deserialize, Serialize};

use crate::{
    config::{CodConfig, DeliveryEstimate},
    db_types::Cents,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub line1: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

impl DeliveryAddress {
    pub fn new<S: Into<String>>(line1: S, city: S, state: S, postal_code: S) -> Self {
        Self {
            line1: line1.into(),
            city: city.into(),
            state: state.into(),
            postal_code: postal_code.into(),
            ..Default::default()
        }
    }

    pub fn with_phone<S: Into<String>>(mut self, phone: S) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodAvailability {
    pub available: bool,
    pub errors: Vec<String>,
    /// The surcharge for paying on delivery
    pub cod_fee: Cents,
    pub delivery_estimate: DeliveryEstimate,
    /// High-value orders are accepted but flagged for manual review
    pub requires_verification: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CodEligibility {
    config: CodConfig,
}

impl CodEligibility {
    pub fn new(config: CodConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodConfig {
        &self.config
    }

    pub fn validate(&self, address: Option<&DeliveryAddress>, amount: Cents, phone: Option<&str>) -> CodAvailability {
        let mut errors = Vec::new();
        let config = &self.config;
        if amount < config.min_order_amount || amount > config.max_order_amount {
            errors.push(format!(
                "Cash on delivery is only available for orders between {} and {}",
                config.min_order_amount, config.max_order_amount
            ));
        }
        if address.map(|a| self.is_restricted(a)).unwrap_or(false) {
            errors.push("Cash on delivery is not available for your delivery location".to_string());
        }
        let has_phone = |p: &&str| !p.trim().is_empty();
        let phone = phone.filter(has_phone).or_else(|| address.and_then(|a| a.phone.as_deref()).filter(has_phone));
        if phone.is_none() {
            errors.push("A phone number is required for cash on delivery orders".to_string());
        }
        CodAvailability {
            available: errors.is_empty(),
            errors,
            cod_fee: self.cod_fee(amount),
            delivery_estimate: config.delivery_estimate,
            requires_verification: amount >= config.high_value_threshold,
        }
    }

    /// `max(fixed fee, fee percentage of amount)`
    pub fn cod_fee(&self, amount: Cents) -> Cents {
        self.config.fixed_fee.higher_of(amount.percentage(self.config.fee_percentage))
    }

    fn is_restricted(&self, address: &DeliveryAddress) -> bool {
        let areas = &self.config.restricted_areas;
        if areas.is_empty() {
            return false;
        }
        matches_any(&areas.states, &address.state)
            || matches_any(&areas.cities, &address.city)
            || matches_any(&areas.postal_codes, &address.postal_code)
    }
}

fn matches_any(list: &[String], value: &str) -> bool {
    list.iter().any(|r| r.trim().eq_ignore_ascii_case(value.trim()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{config::RestrictedAreas, db_types::Rate};

    fn validator() -> CodEligibility {
        let config = CodConfig {
            restricted_areas: RestrictedAreas {
                states: vec!["Borno".into()],
                cities: vec!["Maiduguri".into()],
                postal_codes: vec!["600001".into()],
            },
            ..Default::default()
        };
        CodEligibility::new(config)
    }

    fn lagos() -> DeliveryAddress {
        DeliveryAddress::new("12 Marina Rd", "Lagos", "Lagos", "100001").with_phone("+2348012345678")
    }

    #[test]
    fn eligible_order() {
        let result = validator().validate(Some(&lagos()), Cents::from_units(1_000), None);
        assert!(result.available);
        assert!(result.errors.is_empty());
        assert!(!result.requires_verification);
        assert_eq!(result.delivery_estimate, DeliveryEstimate { min_days: 3, max_days: 7 });
    }

    #[test]
    fn restricted_state_is_rejected_case_insensitively() {
        let mut address = lagos();
        address.state = "BORNO".into();
        let result = validator().validate(Some(&address), Cents::from_units(1_000), Some("0800"));
        assert!(!result.available);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("delivery location"));
    }

    #[test]
    fn restricted_city_or_postal_code() {
        let mut by_city = lagos();
        by_city.city = " maiduguri ".into();
        assert!(!validator().validate(Some(&by_city), Cents::from_units(1_000), None).available);
        let mut by_code = lagos();
        by_code.postal_code = "600001".into();
        assert!(!validator().validate(Some(&by_code), Cents::from_units(1_000), None).available);
    }

    #[test]
    fn all_errors_are_collected() {
        let mut address = lagos();
        address.state = "Borno".into();
        address.phone = None;
        let result = validator().validate(Some(&address), Cents::from_units(100), None);
        assert!(!result.available);
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors[0].contains("between $500.00 and $500000.00"));
        assert!(result.errors[1].contains("delivery location"));
        assert!(result.errors[2].contains("phone number"));
    }

    #[test]
    fn phone_can_come_from_the_argument() {
        let mut address = lagos();
        address.phone = None;
        let v = validator();
        assert!(v.validate(Some(&address), Cents::from_units(1_000), Some("+234 801")).available);
        assert!(!v.validate(Some(&address), Cents::from_units(1_000), Some("   ")).available);
        assert!(v.validate(None, Cents::from_units(1_000), Some("+234 801")).available);
    }

    #[test]
    fn blank_phone_argument_falls_back_to_the_address() {
        let v = validator();
        assert!(v.validate(Some(&lagos()), Cents::from_units(1_000), Some("")).available);
        assert!(v.validate(Some(&lagos()), Cents::from_units(1_000), Some("  ")).available);
        let blank = lagos().with_phone(" ");
        let result = v.validate(Some(&blank), Cents::from_units(1_000), Some(""));
        assert!(!result.available);
        assert!(result.errors[0].contains("phone number"));
    }

    #[test]
    fn nothing_is_restricted_without_configured_areas() {
        let v = CodEligibility::new(CodConfig::default());
        assert!(v.config().restricted_areas.is_empty());
        let mut address = lagos();
        address.state = "Borno".into();
        address.city = "Maiduguri".into();
        assert!(v.validate(Some(&address), Cents::from_units(1_000), None).available);
        assert!(!validator().validate(Some(&address), Cents::from_units(1_000), None).available);
    }

    #[test]
    fn amount_bounds_are_inclusive() {
        let v = validator();
        assert!(v.validate(None, Cents::from_units(500), Some("1")).available);
        assert!(v.validate(None, Cents::from_units(500_000), Some("1")).available);
        assert!(!v.validate(None, Cents::from_units(500_000) + Cents::from(1), Some("1")).available);
    }

    #[test]
    fn fee_is_the_higher_of_fixed_and_percentage() {
        let v = validator();
        // 2% of $1000 is $20, less than the $50 fixed fee
        assert_eq!(v.cod_fee(Cents::from_units(1_000)), Cents::from_units(50));
        // 2% of $10,000 is $200
        assert_eq!(v.cod_fee(Cents::from_units(10_000)), Cents::from_units(200));
        let custom = CodEligibility::new(CodConfig { fee_percentage: Rate::from_bps(250), ..Default::default() });
        assert_eq!(custom.cod_fee(Cents::from(1_000_001)), Cents::from(25_000));
    }

    #[test]
    fn high_value_orders_need_verification_but_are_not_blocked() {
        let result = validator().validate(Some(&lagos()), Cents::from_units(10_000), None);
        assert!(result.available);
        assert!(result.requires_verification);
        let result = validator().validate(Some(&lagos()), Cents::from_units(9_999), None);
        assert!(!result.requires_verification);
    }
}
