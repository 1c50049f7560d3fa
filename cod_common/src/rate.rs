use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

//--------------------------------------         Rate         ---------------------------------------------------------
/// A percentage expressed in basis points (1% == 100 bps). Rates are always between 0% and 100%.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Rate(i64);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RateError {
    #[error("Rates cannot be negative: {0}")]
    Negative(String),
    #[error("Not a valid percentage: {0}")]
    InvalidFormat(String),
    #[error("Rates cannot exceed 100%: {0}")]
    AboveMaximum(String),
}

impl Rate {
    pub const BPS_PER_UNIT: i64 = 10_000;

    /// Out-of-range values are clamped to `[0, 100%]`.
    pub const fn from_bps(bps: i64) -> Self {
        Self(if bps < 0 {
            0
        } else if bps > Self::BPS_PER_UNIT {
            Self::BPS_PER_UNIT
        } else {
            bps
        })
    }

    pub const fn from_percent(percent: i64) -> Self {
        Self::from_bps(percent.saturating_mul(100))
    }

    pub fn bps(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac == 0 {
            write!(f, "{whole}%")
        } else {
            write!(f, "{whole}.{frac:02}%")
        }
    }
}

/// Parses a percentage with at most two decimal places, with or without a trailing `%`, e.g. `"2.5"` or `"10%"`.
impl FromStr for Rate {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_end_matches('%').trim();
        if s.starts_with('-') {
            return Err(RateError::Negative(s.to_string()));
        }
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if frac.len() > 2 || (whole.is_empty() && frac.is_empty()) {
            return Err(RateError::InvalidFormat(s.to_string()));
        }
        let invalid = || RateError::InvalidFormat(s.to_string());
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let whole = if whole.is_empty() { 0 } else { whole.parse::<i64>().map_err(|_| invalid())? };
        let frac = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse::<i64>().map_err(|_| invalid())?,
        };
        let bps = whole.checked_mul(100).and_then(|w| w.checked_add(frac));
        match bps {
            Some(bps) if bps <= Self::BPS_PER_UNIT => Ok(Self(bps)),
            _ => Err(RateError::AboveMaximum(s.to_string())),
        }
    }
}
