use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use crate::{
    config::Rules,
    disaster,
    engine::{System, SystemContext},
    rng::SystemRng,
    world::GameState,
};

/// Rolls for a random disaster every interval while the village is large
/// enough to attract one.
pub struct DisasterRollSystem;

impl DisasterRollSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DisasterRollSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for DisasterRollSystem {
    fn name(&self) -> &str {
        "disaster_roll"
    }

    fn period(&self, rules: &Rules) -> Duration {
        rules.roll_interval()
    }

    fn armed(&self, state: &GameState, rules: &Rules) -> bool {
        !state.finished && state.population() >= rules.disasters.population_threshold
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        state: &mut GameState,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        if state.disaster.active.is_some() {
            return Ok(());
        }
        if !rng.chance(ctx.rules.disasters.roll_probability) {
            debug!(at_ms = ctx.now.as_millis() as u64, "disaster roll missed");
            return Ok(());
        }
        let kinds = disaster::eligible_kinds(state, ctx.rules);
        if let Some(&kind) = rng.pick(&kinds) {
            disaster::activate(state, ctx.rules, kind, rng)?;
        }
        Ok(())
    }
}
