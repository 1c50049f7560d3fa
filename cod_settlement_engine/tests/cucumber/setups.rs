use cucumber::given;

use crate::cucumber::{CodWorld, SettlementSystem};

#[given("a fresh install")]
async fn fresh_database(world: &mut CodWorld) {
    let system = SettlementSystem::new().await;
    world.system = Some(system);
}
