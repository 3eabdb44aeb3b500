//! Disaster state machine: `Idle -> Active(kind) -> Idle`.
//!
//! Activation applies the effect once. Ending is driven by the expiry
//! deadline stored in [`DisasterState::expires_at`], by the last fire being
//! put out, or by a forced stop.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    buildings::BuildingKind,
    config::Rules,
    error::{GameError, GameResult},
    events::GameEvent,
    map,
    resources::ResourceKind,
    rng::SystemRng,
    workers,
    world::GameState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisasterKind {
    Wildfire,
    Drought,
    Earthquake,
    Plague,
}

impl DisasterKind {
    pub const ALL: [DisasterKind; 4] = [
        DisasterKind::Drought,
        DisasterKind::Earthquake,
        DisasterKind::Wildfire,
        DisasterKind::Plague,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DisasterKind::Wildfire => "wildfire",
            DisasterKind::Drought => "drought",
            DisasterKind::Earthquake => "earthquake",
            DisasterKind::Plague => "plague",
        }
    }

    fn duration(self, rules: &Rules) -> Duration {
        let d = &rules.disasters;
        Duration::from_millis(match self {
            DisasterKind::Wildfire => d.wildfire.duration_ms,
            DisasterKind::Drought => d.drought.duration_ms,
            DisasterKind::Earthquake => d.earthquake.shake_ms,
            DisasterKind::Plague => d.plague.duration_ms,
        })
    }
}

impl fmt::Display for DisasterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisasterKind {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DisasterKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| GameError::UnknownDisaster(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The effect was applied at once and left nothing behind.
    Immediate,
    Expired,
    Extinguished,
    Forced,
    PopulationDropped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisasterState {
    pub active: Option<DisasterKind>,
    pub wildfire_nodes: BTreeSet<usize>,
    pub drought_active: bool,
    pub plague_active: bool,
    pub expires_at: Option<Duration>,
}

impl DisasterState {
    pub fn wood_multiplier(&self, rules: &Rules) -> f64 {
        if self.wildfire_nodes.is_empty() {
            1.0
        } else {
            rules.disasters.wildfire.wood_multiplier
        }
    }

    pub fn water_multiplier(&self, rules: &Rules) -> f64 {
        if self.drought_active {
            rules.disasters.drought.water_multiplier
        } else {
            1.0
        }
    }

    pub fn multiplier(&self, rules: &Rules, resource: ResourceKind) -> f64 {
        match resource {
            ResourceKind::Wood => self.wood_multiplier(rules),
            ResourceKind::Water => self.water_multiplier(rules),
            _ => 1.0,
        }
    }

    pub fn remaining(&self, now: Duration) -> Option<Duration> {
        self.expires_at.map(|at| at.saturating_sub(now))
    }
}

/// Kinds a periodic roll may pick at the current population.
pub fn eligible_kinds(state: &GameState, rules: &Rules) -> Vec<DisasterKind> {
    let population = state.population();
    DisasterKind::ALL
        .into_iter()
        .filter(|kind| match (kind, rules.disasters.plague_min_population) {
            (DisasterKind::Plague, Some(min)) => population >= min,
            _ => true,
        })
        .collect()
}

/// Starts `kind` and applies its effect.
pub fn activate(
    state: &mut GameState,
    rules: &Rules,
    kind: DisasterKind,
    rng: &mut SystemRng<'_>,
) -> GameResult<()> {
    if let Some(active) = state.disaster.active {
        return Err(GameError::DisasterAlreadyActive(active));
    }
    info!(disaster = %kind, population = state.population(), "disaster started");
    state.disaster.active = Some(kind);
    state.disaster.expires_at = Some(state.clock + kind.duration(rules));
    state.record(GameEvent::DisasterStarted { kind });

    match kind {
        DisasterKind::Drought => {
            let drought = &rules.disasters.drought;
            lose(state, ResourceKind::Water, drought.water_loss, kind);
            lose(state, ResourceKind::Food, drought.food_loss, kind);
            state.disaster.drought_active = true;
        }
        DisasterKind::Earthquake => {
            earthquake(state, rules, rng);
            finish(state, EndReason::Immediate);
        }
        DisasterKind::Wildfire => {
            lose(state, ResourceKind::Wood, rules.disasters.wildfire.wood_loss, kind);
            let nodes = map::indices_of(&state.nodes, ResourceKind::Wood);
            state.disaster.wildfire_nodes.extend(nodes.iter().copied());
            state.record(GameEvent::FireStarted { nodes });
            if state.disaster.wildfire_nodes.is_empty() {
                finish(state, EndReason::Extinguished);
            }
        }
        DisasterKind::Plague => {
            state.disaster.plague_active = true;
            plague(state, rules, rng);
        }
    }
    Ok(())
}

fn lose(state: &mut GameState, resource: ResourceKind, fraction: f64, cause: DisasterKind) {
    let amount = state.resources.force_lose(resource, fraction);
    state.record(GameEvent::ResourceLost {
        resource,
        amount,
        cause,
    });
}

fn earthquake(state: &mut GameState, rules: &Rules, rng: &mut SystemRng<'_>) {
    let Some(&building) = rng.pick(&BuildingKind::ALL) else {
        return;
    };
    let level = state.buildings.level(building);
    let damage = if level > 1 {
        let change = state.buildings.demote(rules, building);
        let released = workers::release_overflow(&mut state.buildings, &mut state.workers);
        if released > 0 {
            state.record(GameEvent::WorkersReleased { count: released });
        }
        change
    } else {
        if level == 1 {
            lose(
                state,
                ResourceKind::Stone,
                rules.disasters.earthquake.stone_loss,
                DisasterKind::Earthquake,
            );
        }
        None
    };
    state.record(GameEvent::EarthquakeStruck {
        building,
        damage,
        shake_ms: rules.disasters.earthquake.shake_ms,
    });
}

fn plague(state: &mut GameState, rules: &Rules, rng: &mut SystemRng<'_>) {
    let head = state.headcount();
    let chefs = state.buildings.restaurant.workers;
    let available = head.idle + chefs;
    let plague_rules = &rules.disasters.plague;
    let rate = rng.fraction_in(plague_rules.min_loss, plague_rules.max_loss);
    let deaths = ((available as f64 * rate).ceil() as u64).min(available);
    if deaths == 0 {
        state.record(GameEvent::PopulationLost {
            deaths: 0,
            chefs_lost: 0,
            population: head.total,
            house_level: None,
        });
        return;
    }
    let chefs_lost = deaths.min(chefs);
    state.buildings.restaurant.workers -= chefs_lost;
    state.buildings.house.population -= deaths;
    let house_level = state.buildings.settle_house_level(rules);
    info!(deaths, chefs_lost, population = state.population(), "plague deaths");
    state.record(GameEvent::PopulationLost {
        deaths,
        chefs_lost,
        population: state.population(),
        house_level,
    });
}

/// Puts out one burning node. The wildfire ends with the last one.
pub fn extinguish(state: &mut GameState, node: usize) -> GameResult<usize> {
    if node >= state.nodes.len() {
        return Err(GameError::UnknownNode(node));
    }
    if !state.disaster.wildfire_nodes.remove(&node) {
        return Err(GameError::NodeNotBurning(node));
    }
    let remaining = state.disaster.wildfire_nodes.len();
    state.record(GameEvent::FireExtinguished { node, remaining });
    if remaining == 0 && state.disaster.active == Some(DisasterKind::Wildfire) {
        finish(state, EndReason::Extinguished);
    }
    Ok(remaining)
}

/// Ends the active disaster if its deadline has passed.
pub fn expire_due(state: &mut GameState, now: Duration) -> Option<DisasterKind> {
    match state.disaster.expires_at {
        Some(at) if at <= now && state.disaster.active.is_some() => {
            finish(state, EndReason::Expired)
        }
        Some(at) if at <= now => {
            state.disaster.expires_at = None;
            None
        }
        _ => None,
    }
}

/// Stops the active disaster right away.
pub fn force_end(state: &mut GameState, reason: EndReason) -> GameResult<DisasterKind> {
    finish(state, reason).ok_or(GameError::NoActiveDisaster)
}

fn finish(state: &mut GameState, reason: EndReason) -> Option<DisasterKind> {
    let kind = state.disaster.active.take()?;
    match kind {
        DisasterKind::Wildfire => state.disaster.wildfire_nodes.clear(),
        DisasterKind::Drought => state.disaster.drought_active = false,
        DisasterKind::Plague => state.disaster.plague_active = false,
        DisasterKind::Earthquake => {}
    }
    state.disaster.expires_at = None;
    info!(disaster = %kind, ?reason, "disaster ended");
    state.record(GameEvent::DisasterEnded { kind, reason });
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        buildings::{House, Restaurant},
        rng::RngManager,
    };

    fn town(population: u64) -> GameState {
        let mut state = GameState::new();
        state.buildings.house = House {
            level: 5,
            population,
        };
        state
    }

    #[test]
    fn second_activation_is_rejected() {
        let rules = Rules::default();
        let mut rng = RngManager::new(1);
        let mut state = town(32);
        state.resources.credit(ResourceKind::Water, 10);
        activate(&mut state, &rules, DisasterKind::Drought, &mut rng.stream("t")).unwrap();
        let before = state.clone();
        let err = activate(&mut state, &rules, DisasterKind::Wildfire, &mut rng.stream("t"));
        assert_eq!(err, Err(GameError::DisasterAlreadyActive(DisasterKind::Drought)));
        assert_eq!(state.disaster, before.disaster);
        assert_eq!(state.resources, before.resources);
    }

    #[test]
    fn drought_takes_water_and_food() {
        let rules = Rules::default();
        let mut rng = RngManager::new(1);
        let mut state = town(32);
        state.resources.credit(ResourceKind::Water, 55);
        state.resources.credit(ResourceKind::Food, 10);
        activate(&mut state, &rules, DisasterKind::Drought, &mut rng.stream("t")).unwrap();
        assert_eq!(state.resources.get(ResourceKind::Water), 44);
        assert_eq!(state.resources.get(ResourceKind::Food), 7);
        assert!(state.disaster.drought_active);
        assert_eq!(state.disaster.water_multiplier(&rules), 0.7);
        assert_eq!(state.disaster.expires_at, Some(Duration::from_secs(20)));
    }

    #[test]
    fn wildfire_burns_every_wood_node_until_extinguished() {
        let rules = Rules::default();
        let mut rng = RngManager::new(1);
        let mut state = town(32);
        state.resources.credit(ResourceKind::Wood, 9);
        activate(&mut state, &rules, DisasterKind::Wildfire, &mut rng.stream("t")).unwrap();
        assert_eq!(state.resources.get(ResourceKind::Wood), 5);
        assert_eq!(
            state.disaster.wildfire_nodes.iter().copied().collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
        assert_eq!(extinguish(&mut state, 6), Err(GameError::NodeNotBurning(6)));
        assert_eq!(extinguish(&mut state, 99), Err(GameError::UnknownNode(99)));
        for node in 0..4 {
            extinguish(&mut state, node).unwrap();
        }
        assert_eq!(state.disaster.active, Some(DisasterKind::Wildfire));
        assert_eq!(extinguish(&mut state, 4), Ok(0));
        assert_eq!(state.disaster.active, None);
        assert_eq!(state.disaster.expires_at, None);
    }

    #[test]
    fn plague_kills_chefs_first_and_settles_house_level() {
        let rules = Rules::default();
        let mut rng = RngManager::new(5);
        let mut state = town(32);
        state.buildings.restaurant = Restaurant {
            level: 2,
            workers: 8,
        };
        state.workers.wood = 24;
        // available = 0 idle + 8 chefs
        activate(&mut state, &rules, DisasterKind::Plague, &mut rng.stream("t")).unwrap();
        let deaths = 32 - state.population();
        assert!((1..=3).contains(&deaths), "deaths = {deaths}");
        assert_eq!(state.buildings.restaurant.workers, 8 - deaths);
        assert_eq!(state.workers.wood, 24);
        assert_eq!(state.buildings.house.level, 5);
        assert!(state.disaster.plague_active);
    }

    #[test]
    fn expiry_clears_effects() {
        let rules = Rules::default();
        let mut rng = RngManager::new(1);
        let mut state = town(32);
        activate(&mut state, &rules, DisasterKind::Wildfire, &mut rng.stream("t")).unwrap();
        assert_eq!(expire_due(&mut state, Duration::from_secs(29)), None);
        assert_eq!(
            expire_due(&mut state, Duration::from_secs(30)),
            Some(DisasterKind::Wildfire)
        );
        assert!(state.disaster.wildfire_nodes.is_empty());
        assert_eq!(force_end(&mut state, EndReason::Forced), Err(GameError::NoActiveDisaster));
    }

    #[test]
    fn plague_excluded_below_secondary_threshold() {
        let mut rules = Rules::default();
        rules.disasters.plague_min_population = Some(64);
        let state = town(32);
        assert!(!eligible_kinds(&state, &rules).contains(&DisasterKind::Plague));
    }
}
