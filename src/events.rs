use serde::Serialize;

use crate::{
    buildings::{BuildingKind, LevelChange},
    disaster::{DisasterKind, EndReason},
    resources::ResourceKind,
    systems::TickReport,
    workers::JobKind,
};

/// Everything a renderer may want to react to, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    Harvested {
        node: usize,
        resource: ResourceKind,
    },
    Construction {
        change: LevelChange,
    },
    WorkersAssigned {
        job: JobKind,
        count: u64,
    },
    WorkersReleased {
        count: u64,
    },
    ResourceGranted {
        resource: ResourceKind,
        amount: u64,
    },
    Production {
        report: TickReport,
    },
    DisasterStarted {
        kind: DisasterKind,
    },
    DisasterEnded {
        kind: DisasterKind,
        reason: EndReason,
    },
    ResourceLost {
        resource: ResourceKind,
        amount: u64,
        cause: DisasterKind,
    },
    EarthquakeStruck {
        building: BuildingKind,
        damage: Option<LevelChange>,
        shake_ms: u64,
    },
    FireStarted {
        nodes: Vec<usize>,
    },
    FireExtinguished {
        node: usize,
        remaining: usize,
    },
    PopulationLost {
        deaths: u64,
        chefs_lost: u64,
        population: u64,
        house_level: Option<LevelChange>,
    },
    GameFinished {
        population: u64,
    },
}
