pub mod buildings;
pub mod command;
pub mod config;
pub mod disaster;
pub mod engine;
pub mod error;
pub mod events;
pub mod map;
pub mod resources;
pub mod rng;
pub mod script;
pub mod snapshot;
pub mod systems;
pub mod web;
pub mod workers;
pub mod world;

pub use config::{Rules, RulesLoader};
pub use engine::{Engine, EngineBuilder, EngineSettings};
pub use error::{GameError, GameResult};
pub use snapshot::GameSnapshot;
