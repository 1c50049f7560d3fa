//! COD Settlement Engine
//!
//! The settlement engine handles the money side of cash on delivery (COD) orders in a multi-vendor marketplace. It
//! drives COD orders from placement to completion, turns collected cash into vendor earnings, pays those earnings out
//! and audits the cash that delivery people hand over every day.
//!
//! The library is divided into these sections:
//! 1. The backend contracts ([`mod@traits`]) and their SQLite implementation ([`SqliteDatabase`]). You should never
//!    need to touch the database directly. Use the public API instead. The exception is the data types stored in
//!    the database. These are defined in the [`mod@db_types`] module and are public.
//! 2. The public API ([`mod@cod_api`]). [`CodOrderWorkflowApi`], [`EarningsApi`], [`PayoutApi`] and
//!    [`ReconciliationApi`] enforce the business rules and hand validated changes to the backend. [`CodEligibility`]
//!    decides at checkout whether cash on delivery is offered at all.
//! 3. Configuration ([`mod@config`]), with defaults that can be overridden from `COD_*` environment variables.
//!
//! The engine also emits events after order and payout changes have been committed, for example when COD cash has
//! been collected or a payout has completed. See [`mod@events`] for how to hook into them.
pub mod cod_api;
pub mod config;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use cod_api::{
    cod_eligibility::{CodAvailability, CodEligibility, DeliveryAddress},
    earnings_api::EarningsApi,
    earnings_objects::EarningsQueryFilter,
    order_workflow_api::CodOrderWorkflowApi,
    order_workflow_objects::{OrderAction, TransitionError, WorkflowState},
    payout_api::PayoutApi,
    payout_objects::PayoutAction,
    reconciliation_api::ReconciliationApi,
    reconciliation_objects::{ReconciliationQueryFilter, ReconciliationSummary},
};
pub use config::SettlementConfig;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
