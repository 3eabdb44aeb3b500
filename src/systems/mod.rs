mod disaster_roll;
mod production;

pub use disaster_roll::DisasterRollSystem;
pub use production::{bread_demand, produce, BreadDemand, ProductionSystem, TickReport};
