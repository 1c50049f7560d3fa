//! # Settlement backends
//!
//! This module provides the interface contracts that settlement database *backends* must implement.
//!
//! * [`OrderWorkflowDatabase`] stores orders, their status history and annotations, and applies state machine
//!   transitions atomically.
//! * [`EarningsManagement`] is the vendor earnings ledger.
//! * [`PayoutManagement`] reserves earnings into payouts and drives payout status changes.
//! * [`ReconciliationManagement`] stores the daily cash audits of delivery people.
//! * [`ActivityLog`] is a best-effort audit side channel.
//!
//! Backends never decide whether a transition is legal. That is done by the API objects in [`crate::cod_api`]. The
//! backends guarantee that a decided transition is applied all-or-nothing, and only if nobody else got there first.
mod activity_log;
mod data_objects;
mod earnings_management;
mod order_workflow_database;
mod payout_management;
mod reconciliation_management;

pub use activity_log::{ActivityLog, ActivityLogError};
pub use data_objects::{
    CodCollection,
    DailyReport,
    LedgerEffect,
    OrderChanges,
    OrderTransition,
    PayoutResult,
    PayoutUpdate,
    ReconciliationUpdate,
    TransitionResult,
};
pub use earnings_management::{EarningsError, EarningsManagement};
pub use order_workflow_database::{OrderWorkflowDatabase, WorkflowError};
pub use payout_management::{PayoutError, PayoutManagement};
pub use reconciliation_management::{ReconciliationError, ReconciliationManagement};
