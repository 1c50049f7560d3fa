//! # COD settlement public API
//!
//! The `cod_api` module exposes the programmatic API of the settlement engine. The API is modular, so clients can
//! pick the parts they need:
//!
//! * [`order_workflow_api`] drives COD orders through the state machine defined in [`order_workflow_objects`].
//! * [`cod_eligibility`] decides whether cash on delivery is offered at checkout. It is pure and needs no backend.
//! * [`earnings_api`] maintains the vendor earnings ledger.
//! * [`payout_api`] turns available earnings into payouts and drives them to completion.
//! * [`reconciliation_api`] audits the cash that delivery people hand over each day.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits the API needs.
//!
//! ```rust,ignore
//! use cod_settlement_engine::{CodOrderWorkflowApi, SqliteDatabase, events::EventProducers};
//! let db = SqliteDatabase::new_with_url("sqlite://data/cod.db", 5).await?;
//! let api = CodOrderWorkflowApi::new(db, EarningsConfig::default(), EventProducers::default());
//! let order = api.confirm_order(&"1001".into(), Some(admin_id)).await?;
//! ```
//!
//! Guard violations (wrong status, non-COD order, amount above the balance, ...) are returned as `Err` values whose
//! message explains what is wrong. Use `is_guard_violation()` on the error to tell them apart from database faults.
use log::*;

use crate::{db_types::NewActivity, traits::ActivityLog};

pub mod cod_eligibility;
pub mod earnings_api;
pub mod earnings_objects;
pub mod order_workflow_api;
pub mod order_workflow_objects;
pub mod payout_api;
pub mod payout_objects;
pub mod reconciliation_api;
pub mod reconciliation_objects;

/// Writes to the activity log. Failures are logged and swallowed.
async fn record_activity<B: ActivityLog>(db: &B, activity: NewActivity) {
    let summary = format!("{} on {} {}", activity.action, activity.entity_type, activity.entity_id);
    match db.log_activity(activity).await {
        Ok(()) => trace!("📋️ Recorded activity: {summary}"),
        Err(e) => warn!("📋️ Could not record activity ({summary}): {e}"),
    }
}
