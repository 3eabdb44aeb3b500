use std::fmt;

use thiserror::Error;

use crate::{
    buildings::BuildingKind, disaster::DisasterKind, resources::ResourceKind, workers::JobKind,
};

/// One short line of a cost bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub resource: ResourceKind,
    pub required: u64,
    pub available: u64,
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} needed, {} available",
            self.required, self.resource, self.available
        )
    }
}

/// Rejections surfaced to the player. None of them leave the engine in a
/// partially mutated state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    #[error("not enough resources ({})", join_shortfalls(.shortfalls))]
    InsufficientResources { shortfalls: Vec<Shortfall> },
    #[error("no idle population to assign")]
    NoIdleWorkers,
    #[error("restaurant level {level} allows at most {max} chefs")]
    WorkerCapExceeded { level: u32, max: u64 },
    #[error("no workers assigned to {job}")]
    NoWorkersAssigned { job: JobKind },
    #[error("a {0} is already in progress")]
    DisasterAlreadyActive(DisasterKind),
    #[error("no disaster is active")]
    NoActiveDisaster,
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("unknown resource: {0}")]
    UnknownResource(String),
    #[error("unknown disaster type: {0} (expected drought, earthquake, wildfire or plague)")]
    UnknownDisaster(String),
    #[error("unknown building: {0}")]
    UnknownBuilding(String),
    #[error("unknown job: {0}")]
    UnknownJob(String),
    #[error("no resource node with index {0}")]
    UnknownNode(usize),
    #[error("node {0} is not burning")]
    NodeNotBurning(usize),
    #[error("{0} is already built")]
    AlreadyBuilt(BuildingKind),
    #[error("{0} has not been built yet")]
    NotBuilt(BuildingKind),
    #[error("the game is finished")]
    GameFinished,
}

fn join_shortfalls(shortfalls: &[Shortfall]) -> String {
    shortfalls
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type GameResult<T> = Result<T, GameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortfall_message_lists_every_line() {
        let err = GameError::InsufficientResources {
            shortfalls: vec![
                Shortfall {
                    resource: ResourceKind::Wood,
                    required: 20,
                    available: 4,
                },
                Shortfall {
                    resource: ResourceKind::Stone,
                    required: 10,
                    available: 0,
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "not enough resources (20 wood needed, 4 available, 10 stone needed, 0 available)"
        );
    }
}
