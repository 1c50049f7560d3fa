use chrono::{DateTime, Utc};
use rand::Rng;

/// Generates a unique, human-readable payout reference, e.g. `PO-12-20240105093000-9f3a1c2b`.
pub fn new_payout_reference(vendor_id: i64, at: DateTime<Utc>) -> String {
    let nonce: u32 = rand::thread_rng().gen();
    format!("PO-{vendor_id}-{}-{nonce:08x}", at.format("%Y%m%d%H%M%S"))
}
