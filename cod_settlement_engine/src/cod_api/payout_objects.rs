use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::{Cents, PayoutStatus, VendorEarning};

use PayoutStatus::*;

/// Walks `available` oldest-first and takes whole earnings until their net amounts cover `amount`.
///
/// Earnings are never split, so the returned set can sum to more than `amount`. Returns `None` if the earnings cannot
/// cover the amount at all. The input is expected to be sorted by `created_at` ascending.
pub fn select_earnings_for_payout(available: &[VendorEarning], amount: Cents) -> Option<Vec<&VendorEarning>> {
    let mut selected = Vec::new();
    let mut covered = Cents::ZERO;
    for earning in available {
        if covered >= amount {
            break;
        }
        covered = covered + earning.net_amount;
        selected.push(earning);
    }
    (covered >= amount).then_some(selected)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutAction {
    StartProcessing,
    Complete,
    Fail,
    Cancel,
    Retry,
}

impl PayoutAction {
    fn past_tense(&self) -> &'static str {
        match self {
            Self::StartProcessing => "processed",
            Self::Complete => "completed",
            Self::Fail => "marked as failed",
            Self::Cancel => "cancelled",
            Self::Retry => "retried",
        }
    }
}

impl Display for PayoutAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::StartProcessing => "start_processing",
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::Cancel => "cancel",
            Self::Retry => "retry",
        };
        f.write_str(s)
    }
}

/// What happens to the earnings reserved by a payout when it changes status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservedEarningsEffect {
    None,
    /// `processing -> paid`
    MarkPaid,
    /// `processing -> available`
    Release,
    /// `available -> processing`. Fails if any of the earnings is no longer available.
    Reserve,
}

pub const PAYOUT_TRANSITIONS: &[(PayoutStatus, PayoutAction, PayoutStatus, ReservedEarningsEffect)] = &[
    (Pending, PayoutAction::StartProcessing, Processing, ReservedEarningsEffect::None),
    (Processing, PayoutAction::Complete, Completed, ReservedEarningsEffect::MarkPaid),
    (Processing, PayoutAction::Fail, Failed, ReservedEarningsEffect::Release),
    (Pending, PayoutAction::Cancel, Cancelled, ReservedEarningsEffect::Release),
    (Processing, PayoutAction::Cancel, Cancelled, ReservedEarningsEffect::Release),
    (Failed, PayoutAction::Retry, Pending, ReservedEarningsEffect::Reserve),
];

/// The target status and earnings effect of `action` for a payout in `status`, if the move is legal.
pub fn payout_transition(status: PayoutStatus, action: PayoutAction) -> Option<(PayoutStatus, ReservedEarningsEffect)> {
    PAYOUT_TRANSITIONS.iter().find(|(from, a, _, _)| *from == status && *a == action).map(|(_, _, to, e)| (*to, *e))
}

pub fn invalid_payout_transition_message(action: PayoutAction, status: PayoutStatus) -> String {
    format!("A payout cannot be {} while it is {status}", action.past_tense())
}
