mod clock;
mod payout_reference;

pub use clock::{Clock, FixedClock, SystemClock};
pub use payout_reference::new_payout_reference;
