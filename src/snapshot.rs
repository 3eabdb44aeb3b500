//! Read-only views of the game handed to renderers and hosts.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    buildings::{BuildAction, BuildingKind},
    config::Rules,
    disaster::DisasterKind,
    map,
    resources::ResourceKind,
    systems::bread_demand,
    workers::{Headcount, WorkerPool},
    world::GameState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BreadStatus {
    Sufficient,
    Low,
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreadView {
    pub status: BreadStatus,
    pub needed: u64,
    pub consumers: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildingView {
    pub level: u32,
    pub next_action: BuildAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chefs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_chefs: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisasterView {
    pub active: Option<DisasterKind>,
    pub wildfire_nodes: Vec<usize>,
    pub drought_active: bool,
    pub plague_active: bool,
    pub remaining_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub index: usize,
    pub resource: ResourceKind,
    pub glyph: &'static str,
    pub x: f32,
    pub y: f32,
    pub burning: bool,
    pub workers: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameSnapshot {
    pub clock_ms: u64,
    pub tick: u64,
    pub resources: BTreeMap<ResourceKind, u64>,
    pub buildings: BTreeMap<&'static str, BuildingView>,
    pub workers: WorkerPool,
    pub population: Headcount,
    pub population_goal: u64,
    pub bread: BreadView,
    pub disaster: DisasterView,
    pub nodes: Vec<NodeView>,
    pub finished: bool,
}

impl GameSnapshot {
    pub fn capture(state: &GameState, rules: &Rules) -> Self {
        let demand = bread_demand(state, rules);
        let bread = state.resources.get(ResourceKind::Bread);
        let status = if demand.needed == 0 || bread >= demand.needed {
            BreadStatus::Sufficient
        } else if bread > 0 {
            BreadStatus::Low
        } else {
            BreadStatus::None
        };

        let b = &state.buildings;
        let plain = |kind: BuildingKind| BuildingView {
            level: b.level(kind),
            next_action: b.next_action(kind),
            population: None,
            chefs: None,
            max_chefs: None,
        };
        let buildings = BTreeMap::from([
            (
                "house",
                BuildingView {
                    population: Some(b.house.population),
                    ..plain(BuildingKind::House)
                },
            ),
            (
                "restaurant",
                BuildingView {
                    chefs: Some(b.restaurant.workers),
                    max_chefs: Some(b.restaurant.max_chefs(rules.max_chefs_per_restaurant_level)),
                    ..plain(BuildingKind::Restaurant)
                },
            ),
            ("sawmill", plain(BuildingKind::Sawmill)),
            ("quarry", plain(BuildingKind::Quarry)),
            ("waterplant", plain(BuildingKind::Waterplant)),
            ("farm", plain(BuildingKind::Farm)),
        ]);

        let spread = map::distribute_workers(&state.nodes, &state.workers);
        let nodes = state
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| NodeView {
                index,
                resource: node.resource,
                glyph: node.glyph,
                x: node.x,
                y: node.y,
                burning: state.disaster.wildfire_nodes.contains(&index),
                workers: spread[index],
            })
            .collect();

        Self {
            clock_ms: state.clock.as_millis() as u64,
            tick: state.ticks,
            resources: state.resources.iter().collect(),
            buildings,
            workers: state.workers.clone(),
            population: state.headcount(),
            population_goal: rules.population_goal,
            bread: BreadView {
                status,
                needed: demand.needed,
                consumers: demand.consumers,
            },
            disaster: DisasterView {
                active: state.disaster.active,
                wildfire_nodes: state.disaster.wildfire_nodes.iter().copied().collect(),
                drought_active: state.disaster.drought_active,
                plague_active: state.disaster.plague_active,
                remaining_ms: state
                    .disaster
                    .remaining(state.clock)
                    .map(|left| left.as_millis() as u64),
            },
            nodes,
            finished: state.finished,
        }
    }
}
