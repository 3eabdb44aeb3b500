use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    buildings::Buildings,
    error::{GameError, GameResult},
    resources::ResourceKind,
};

/// A job a resident can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Wood,
    Stone,
    Food,
    Water,
    Restaurant,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::Wood,
        JobKind::Stone,
        JobKind::Food,
        JobKind::Water,
        JobKind::Restaurant,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Wood => "wood",
            JobKind::Stone => "stone",
            JobKind::Food => "food",
            JobKind::Water => "water",
            JobKind::Restaurant => "restaurant",
        }
    }

    /// The resource a gatherer of this job produces; `None` for chefs.
    pub fn gathers(self) -> Option<ResourceKind> {
        match self {
            JobKind::Wood => Some(ResourceKind::Wood),
            JobKind::Stone => Some(ResourceKind::Stone),
            JobKind::Food => Some(ResourceKind::Food),
            JobKind::Water => Some(ResourceKind::Water),
            JobKind::Restaurant => None,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|job| job.as_str() == s)
            .ok_or_else(|| GameError::UnknownJob(s.to_string()))
    }
}

/// Gatherers per resource. Chefs live on the restaurant record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPool {
    pub wood: u64,
    pub stone: u64,
    pub food: u64,
    pub water: u64,
}

impl WorkerPool {
    pub const GATHERING: [ResourceKind; 4] = [
        ResourceKind::Wood,
        ResourceKind::Stone,
        ResourceKind::Food,
        ResourceKind::Water,
    ];

    pub fn gatherers(&self, resource: ResourceKind) -> u64 {
        match resource {
            ResourceKind::Wood => self.wood,
            ResourceKind::Stone => self.stone,
            ResourceKind::Food => self.food,
            ResourceKind::Water => self.water,
            ResourceKind::Bread => 0,
        }
    }

    fn gatherers_mut(&mut self, resource: ResourceKind) -> Option<&mut u64> {
        match resource {
            ResourceKind::Wood => Some(&mut self.wood),
            ResourceKind::Stone => Some(&mut self.stone),
            ResourceKind::Food => Some(&mut self.food),
            ResourceKind::Water => Some(&mut self.water),
            ResourceKind::Bread => None,
        }
    }

    pub fn total_gatherers(&self) -> u64 {
        self.wood + self.stone + self.food + self.water
    }
}

/// Population split derived from the house and the assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Headcount {
    pub total: u64,
    pub assigned: u64,
    pub idle: u64,
}

pub fn headcount(buildings: &Buildings, pool: &WorkerPool) -> Headcount {
    let total = buildings.house.population;
    let assigned = pool.total_gatherers() + buildings.restaurant.workers;
    Headcount {
        total,
        assigned,
        idle: total.saturating_sub(assigned),
    }
}

/// Moves one resident into (`delta > 0`) or out of (`delta < 0`) `job`.
/// Returns the job's new count.
pub fn assign(
    buildings: &mut Buildings,
    pool: &mut WorkerPool,
    max_chefs_per_level: u64,
    job: JobKind,
    delta: i32,
) -> GameResult<u64> {
    if delta.abs() != 1 {
        return Err(GameError::InvalidCommand(format!(
            "worker delta must be +1 or -1, got {delta}"
        )));
    }
    if delta > 0 {
        if headcount(buildings, pool).idle == 0 {
            return Err(GameError::NoIdleWorkers);
        }
        if job == JobKind::Restaurant {
            let restaurant = &mut buildings.restaurant;
            let max = restaurant.max_chefs(max_chefs_per_level);
            if restaurant.workers >= max {
                return Err(GameError::WorkerCapExceeded {
                    level: restaurant.level,
                    max,
                });
            }
            restaurant.workers += 1;
            return Ok(restaurant.workers);
        }
    }

    let slot = match job.gathers() {
        Some(resource) => pool
            .gatherers_mut(resource)
            .ok_or(GameError::UnknownJob(job.to_string()))?,
        None => &mut buildings.restaurant.workers,
    };
    if delta > 0 {
        *slot += 1;
    } else {
        if *slot == 0 {
            return Err(GameError::NoWorkersAssigned { job });
        }
        *slot -= 1;
    }
    Ok(*slot)
}

/// Releases assignments until they fit inside the population again.
/// Gatherers go first (water, food, stone, wood), chefs last.
pub fn release_overflow(buildings: &mut Buildings, pool: &mut WorkerPool) -> u64 {
    let mut overflow = headcount(buildings, pool)
        .assigned
        .saturating_sub(buildings.house.population);
    let mut released = 0;
    for resource in WorkerPool::GATHERING.into_iter().rev() {
        if overflow == 0 {
            break;
        }
        if let Some(slot) = pool.gatherers_mut(resource) {
            let take = (*slot).min(overflow);
            *slot -= take;
            overflow -= take;
            released += take;
        }
    }
    let chefs = buildings.restaurant.workers.min(overflow);
    buildings.restaurant.workers -= chefs;
    released + chefs
}
