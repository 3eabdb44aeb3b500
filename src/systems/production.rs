use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::{
    config::Rules,
    engine::{System, SystemContext},
    events::GameEvent,
    resources::ResourceKind,
    rng::SystemRng,
    workers::WorkerPool,
    world::GameState,
};

/// Bread the non-chef population eats per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreadDemand {
    pub consumers: u64,
    pub needed: u64,
}

pub fn bread_demand(state: &GameState, rules: &Rules) -> BreadDemand {
    let consumers = state
        .population()
        .saturating_sub(state.buildings.restaurant.workers);
    let needed = if consumers == 0 {
        0
    } else {
        ((consumers as f64).sqrt() * rules.bread.consumption_factor).ceil() as u64
    };
    BreadDemand { consumers, needed }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub bread_baked: u64,
    pub bread_needed: u64,
    pub bread_eaten: u64,
    /// False when the bread gate closed and gatherers stood idle.
    pub worked: bool,
    pub output: BTreeMap<ResourceKind, u64>,
    pub wood_multiplier: f64,
    pub water_multiplier: f64,
}

/// One production step: bake, feed, then gather. The order is fixed.
pub fn produce(state: &mut GameState, rules: &Rules) -> TickReport {
    state.ticks += 1;

    let bread_baked = bake(state, rules);

    let demand = bread_demand(state, rules);
    let bread_eaten = if demand.needed == 0 {
        0
    } else if state.resources.debit(ResourceKind::Bread, demand.needed).is_ok() {
        demand.needed
    } else {
        0
    };
    let worked = demand.needed == 0 || bread_eaten > 0;

    let mut output = BTreeMap::new();
    if worked {
        for resource in WorkerPool::GATHERING {
            let workers = state.workers.gatherers(resource);
            let bonus = 1 + state.buildings.bonus_level(resource) as u64;
            let multiplier = bonus as f64 * state.disaster.multiplier(rules, resource);
            let amount = (workers as f64 * multiplier).floor() as u64;
            state.resources.credit(resource, amount);
            output.insert(resource, amount);
        }
    }

    let report = TickReport {
        tick: state.ticks,
        bread_baked,
        bread_needed: demand.needed,
        bread_eaten,
        worked,
        output,
        wood_multiplier: state.disaster.wood_multiplier(rules),
        water_multiplier: state.disaster.water_multiplier(rules),
    };
    debug!(
        tick = report.tick,
        baked = report.bread_baked,
        needed = report.bread_needed,
        worked = report.worked,
        "production tick"
    );
    report
}

/// Each chef turns one water and one food into one bread per batch, for as
/// long as both last.
fn bake(state: &mut GameState, rules: &Rules) -> u64 {
    let restaurant = &state.buildings.restaurant;
    let level_factor = if rules.bread.level_bonus {
        restaurant.level.max(1) as u64
    } else {
        1
    };
    let batches = restaurant
        .workers
        .saturating_mul(rules.bread.per_chef)
        .saturating_mul(level_factor);
    let baked = batches
        .min(state.resources.get(ResourceKind::Water))
        .min(state.resources.get(ResourceKind::Food));
    if baked == 0 {
        return 0;
    }
    let paid = state
        .resources
        .debit(ResourceKind::Water, baked)
        .and_then(|_| state.resources.debit(ResourceKind::Food, baked));
    debug_assert!(paid.is_ok());
    state.resources.credit(ResourceKind::Bread, baked);
    baked
}

pub struct ProductionSystem;

impl ProductionSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProductionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ProductionSystem {
    fn name(&self) -> &str {
        "production"
    }

    fn period(&self, rules: &Rules) -> Duration {
        rules.production_interval()
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        state: &mut GameState,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let report = produce(state, ctx.rules);
        state.record(GameEvent::Production { report });
        Ok(())
    }
}
