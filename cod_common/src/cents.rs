use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::{op, Rate};

//--------------------------------------        Cents         ---------------------------------------------------------
/// A monetary amount in minor units. No floating point is ever involved in arithmetic on this type.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a Cents> for Cents {
    fn sum<I: Iterator<Item = &'a Cents>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Cents {
    type Error = CentsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(CentsConversionError(format!("Value {} is too large to convert to Cents", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub const fn from_const(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Whole currency units, e.g. `Cents::from_units(500)` is $500.00. Saturates at the limits of `i64`.
    pub fn from_units(units: i64) -> Self {
        Self(units.saturating_mul(100))
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiplies by an integer quantity. `None` on overflow.
    pub fn checked_times(self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Self)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// `rate` of this amount, rounded towards zero.
    pub fn percentage(self, rate: Rate) -> Self {
        // i128 keeps `amount * bps` exact for any i64 amount
        let product = i128::from(self.0) * i128::from(rate.bps());
        #[allow(clippy::cast_possible_truncation)]
        Self((product / i128::from(Rate::BPS_PER_UNIT)) as i64)
    }

    pub fn higher_of(self, other: Self) -> Self {
        self.max(other)
    }

    /// Splits a gross amount into the platform commission and the vendor's net share.
    /// The commission is floored and the net is derived by subtraction, so `commission + net == gross` always.
    pub fn apply_commission(self, rate: Rate) -> CommissionSplit {
        let commission = self.percentage(rate);
        CommissionSplit { gross: self, commission, net: self - commission }
    }
}

//--------------------------------------   CommissionSplit    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub gross: Cents,
    pub commission: Cents,
    pub net: Cents,
}

impl CommissionSplit {
    pub fn is_balanced(&self) -> bool {
        self.commission + self.net == self.gross
    }
}
