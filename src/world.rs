use std::time::Duration;

use crate::{
    buildings::Buildings,
    disaster::DisasterState,
    events::GameEvent,
    map::{self, ResourceNode},
    resources::ResourceLedger,
    workers::{self, Headcount, WorkerPool},
};

/// The whole game. Owned by an [`Engine`](crate::engine::Engine); renderers
/// only ever see it through snapshots.
#[derive(Debug, Clone)]
pub struct GameState {
    pub resources: ResourceLedger,
    pub buildings: Buildings,
    pub workers: WorkerPool,
    pub nodes: Vec<ResourceNode>,
    pub disaster: DisasterState,
    pub clock: Duration,
    pub ticks: u64,
    pub finished: bool,
    pub(crate) journal: Vec<GameEvent>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        Self::with_nodes(map::default_nodes())
    }

    pub fn with_nodes(nodes: Vec<ResourceNode>) -> Self {
        Self {
            resources: ResourceLedger::new(),
            buildings: Buildings::default(),
            workers: WorkerPool::default(),
            nodes,
            disaster: DisasterState::default(),
            clock: Duration::ZERO,
            ticks: 0,
            finished: false,
            journal: Vec::new(),
        }
    }

    pub fn population(&self) -> u64 {
        self.buildings.house.population
    }

    pub fn headcount(&self) -> Headcount {
        workers::headcount(&self.buildings, &self.workers)
    }

    pub fn record(&mut self, event: GameEvent) {
        self.journal.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.journal)
    }
}
