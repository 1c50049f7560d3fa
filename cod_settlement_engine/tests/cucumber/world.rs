use std::sync::Arc;

use cod_settlement_engine::{
    config::{CodConfig, EarningsConfig, PayoutConfig},
    db_types::{CodReconciliation, Payout},
    events::EventProducers,
    helpers::FixedClock,
    traits::OrderWorkflowDatabase,
    CodAvailability,
    CodEligibility,
    CodOrderWorkflowApi,
    EarningsApi,
    PayoutApi,
    ReconciliationApi,
    SqliteDatabase,
};
use cucumber::World;
use log::*;

use crate::support::{prepare_env::prepare_test_env, seed::start_time};

#[derive(Default, Debug, World)]
pub struct CodWorld {
    pub system: Option<SettlementSystem>,
    pub last_error: Option<String>,
    pub last_payout: Option<Payout>,
    pub last_reconciliations: Vec<CodReconciliation>,
    pub last_availability: Option<CodAvailability>,
}

/// A migrated database plus the configuration and clock that every API in a scenario shares.
#[derive(Debug)]
pub struct SettlementSystem {
    pub db: SqliteDatabase,
    pub clock: FixedClock,
    pub cod_config: CodConfig,
    pub earnings_config: EarningsConfig,
    pub payout_config: PayoutConfig,
}

impl SettlementSystem {
    pub async fn new() -> Self {
        let db = prepare_test_env().await;
        debug!("🥒️ Created database: {}", db.url());
        Self {
            db,
            clock: FixedClock::new(start_time()),
            cod_config: CodConfig::default(),
            earnings_config: EarningsConfig::default(),
            payout_config: PayoutConfig::default(),
        }
    }

    pub fn db_url(&self) -> &str {
        self.db.url()
    }

    pub fn workflow(&self) -> CodOrderWorkflowApi<SqliteDatabase> {
        CodOrderWorkflowApi::new(self.db.clone(), self.earnings_config.clone(), EventProducers::default())
            .with_clock(Arc::new(self.clock.clone()))
    }

    pub fn earnings(&self) -> EarningsApi<SqliteDatabase> {
        EarningsApi::new(self.db.clone(), self.earnings_config.clone()).with_clock(Arc::new(self.clock.clone()))
    }

    pub fn payouts(&self) -> PayoutApi<SqliteDatabase> {
        PayoutApi::new(self.db.clone(), self.payout_config.clone(), EventProducers::default())
            .with_clock(Arc::new(self.clock.clone()))
    }

    pub fn reconciliation(&self) -> ReconciliationApi<SqliteDatabase> {
        ReconciliationApi::new(self.db.clone()).with_clock(Arc::new(self.clock.clone()))
    }

    pub fn eligibility(&self) -> CodEligibility {
        CodEligibility::new(self.cod_config.clone())
    }
}

impl CodWorld {
    pub fn system(&self) -> &SettlementSystem {
        self.system.as_ref().expect("Settlement system not initialised")
    }

    pub fn system_mut(&mut self) -> &mut SettlementSystem {
        self.system.as_mut().expect("Settlement system not initialised")
    }

    pub fn payout_id(&self) -> String {
        self.last_payout.as_ref().map(|p| p.payout_id.clone()).expect("No payout has been created")
    }
}
