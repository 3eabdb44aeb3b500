use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::{
    buildings::{BuildAction, BuildingKind, LevelChange},
    command::Command,
    config::Rules,
    disaster::{self, DisasterKind, EndReason},
    error::{GameError, GameResult},
    events::GameEvent,
    resources::ResourceKind,
    rng::{RngManager, SystemRng},
    snapshot::GameSnapshot,
    systems::{self, DisasterRollSystem, ProductionSystem, TickReport},
    workers::{self, JobKind},
    world::GameState,
};

const COMMAND_STREAM: &str = "disaster";
const MIN_PERIOD: Duration = Duration::from_millis(1);

pub struct EngineSettings {
    pub seed: u64,
    pub rules: Rules,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
    state: Option<GameState>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
            state: None,
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    /// Registers production and the disaster roll, in that order.
    pub fn with_default_systems(self) -> Self {
        self.with_system(ProductionSystem::new())
            .with_system(DisasterRollSystem::new())
    }

    pub fn with_state(mut self, state: GameState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn build(self) -> Engine {
        let mut engine = Engine {
            rng: RngManager::new(self.settings.seed),
            rules: self.settings.rules,
            state: self.state.unwrap_or_default(),
            systems: self
                .systems
                .into_iter()
                .map(|system| ScheduledSystem {
                    system,
                    next_due: None,
                })
                .collect(),
        };
        engine.sync_schedule();
        engine
    }
}

struct ScheduledSystem {
    system: Box<dyn System>,
    next_due: Option<Duration>,
}

/// One firing inside [`Engine::advance_time`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemRunReport {
    pub name: String,
    pub at: Duration,
}

enum Deadline {
    Expiry,
    System(usize),
}

pub struct Engine {
    rules: Rules,
    state: GameState,
    rng: RngManager,
    systems: Vec<ScheduledSystem>,
}

impl Engine {
    /// Moves the clock forward by `dt`, firing every deadline that falls
    /// inside the window in time order. Disaster expiry fires before any
    /// system due at the same instant; systems tie in registration order.
    pub fn advance_time(&mut self, dt: Duration) -> Result<Vec<SystemRunReport>> {
        let target = self.state.clock + dt;
        let mut reports = Vec::new();

        while !self.state.finished {
            let Some((at, deadline)) = self.next_deadline(target) else {
                break;
            };
            let population = self.state.population();
            self.state.clock = at;
            match deadline {
                Deadline::Expiry => {
                    disaster::expire_due(&mut self.state, at);
                    reports.push(SystemRunReport {
                        name: "disaster_expiry".to_string(),
                        at,
                    });
                }
                Deadline::System(index) => {
                    let scheduled = &mut self.systems[index];
                    let name = scheduled.system.name().to_string();
                    let ctx = SystemContext {
                        now: at,
                        rules: &self.rules,
                    };
                    let mut rng = self.rng.stream(&name);
                    scheduled.system.run(&ctx, &mut self.state, &mut rng)?;
                    scheduled.next_due = Some(at + period_of(&*scheduled.system, &self.rules));
                    debug!(system = %name, at_ms = at.as_millis() as u64, "system fired");
                    reports.push(SystemRunReport { name, at });
                }
            }
            self.reconcile(population);
        }

        self.state.clock = target;
        Ok(reports)
    }

    fn next_deadline(&self, target: Duration) -> Option<(Duration, Deadline)> {
        let expiry = self
            .state
            .disaster
            .expires_at
            .filter(|at| *at <= target)
            .map(|at| (at, Deadline::Expiry));
        let system = self
            .systems
            .iter()
            .enumerate()
            .filter_map(|(index, scheduled)| scheduled.next_due.map(|at| (at, index)))
            .filter(|(at, _)| *at <= target)
            .min()
            .map(|(at, index)| (at, Deadline::System(index)));
        match (expiry, system) {
            (Some(expiry), Some(system)) if system.0 < expiry.0 => Some(system),
            (Some(expiry), _) => Some(expiry),
            (None, system) => system,
        }
    }

    /// Arms systems that just became eligible and disarms the rest.
    fn sync_schedule(&mut self) {
        let now = self.state.clock;
        for scheduled in &mut self.systems {
            let armed = scheduled.system.armed(&self.state, &self.rules);
            match (armed, scheduled.next_due) {
                (true, None) => {
                    scheduled.next_due = Some(now + period_of(&*scheduled.system, &self.rules));
                }
                (false, Some(_)) => {
                    debug!(system = scheduled.system.name(), "system disarmed");
                    scheduled.next_due = None;
                }
                _ => {}
            }
        }
    }

    /// Restores the cross-component invariants after any mutation.
    /// `population_before` is the headcount before the mutation; an active
    /// disaster is cancelled only when the village fell through the threshold.
    fn reconcile(&mut self, population_before: u64) {
        let released = workers::release_overflow(&mut self.state.buildings, &mut self.state.workers);
        if released > 0 {
            self.state.record(GameEvent::WorkersReleased { count: released });
        }
        let threshold = self.rules.disasters.population_threshold;
        if population_before >= threshold && self.state.population() < threshold {
            if let Ok(kind) = disaster::force_end(&mut self.state, EndReason::PopulationDropped) {
                info!(
                    disaster = %kind,
                    population = self.state.population(),
                    "village shrank below the disaster threshold"
                );
            }
        }
        self.sync_schedule();
    }

    fn ensure_running(&self) -> GameResult<()> {
        if self.state.finished {
            Err(GameError::GameFinished)
        } else {
            Ok(())
        }
    }

    /// Runs the production step once without moving the clock.
    pub fn tick(&mut self) -> GameResult<TickReport> {
        self.ensure_running()?;
        let population = self.state.population();
        let report = systems::produce(&mut self.state, &self.rules);
        self.state.record(GameEvent::Production {
            report: report.clone(),
        });
        self.reconcile(population);
        Ok(report)
    }

    pub fn harvest(&mut self, node: usize) -> GameResult<ResourceKind> {
        self.ensure_running()?;
        let resource = self
            .state
            .nodes
            .get(node)
            .map(|n| n.resource)
            .ok_or(GameError::UnknownNode(node))?;
        self.state.resources.credit(resource, 1);
        self.state.record(GameEvent::Harvested { node, resource });
        Ok(resource)
    }

    pub fn build(&mut self, kind: BuildingKind) -> GameResult<LevelChange> {
        self.construct(kind, BuildAction::Build)
    }

    pub fn upgrade(&mut self, kind: BuildingKind) -> GameResult<LevelChange> {
        self.construct(kind, BuildAction::Upgrade)
    }

    fn construct(&mut self, kind: BuildingKind, action: BuildAction) -> GameResult<LevelChange> {
        self.ensure_running()?;
        let population = self.state.population();
        let change = self
            .state
            .buildings
            .apply(&self.rules, &mut self.state.resources, kind, action)
            .inspect_err(|err| debug!(building = %kind, %err, "construction rejected"))?;
        info!(building = %kind, level = change.to, "construction finished");
        self.state.record(GameEvent::Construction { change });

        if kind == BuildingKind::House && self.state.population() >= self.rules.population_goal {
            let reached = self.state.population();
            self.state.finished = true;
            info!(population = reached, "population goal reached");
            self.state
                .record(GameEvent::GameFinished { population: reached });
        }
        self.reconcile(population);
        Ok(change)
    }

    pub fn assign_worker(&mut self, job: JobKind, delta: i32) -> GameResult<u64> {
        self.ensure_running()?;
        let count = workers::assign(
            &mut self.state.buildings,
            &mut self.state.workers,
            self.rules.max_chefs_per_restaurant_level,
            job,
            delta,
        )?;
        self.state.record(GameEvent::WorkersAssigned { job, count });
        Ok(count)
    }

    /// Puts out one burning node and returns how many still burn.
    pub fn extinguish_fire(&mut self, node: usize) -> GameResult<usize> {
        self.ensure_running()?;
        let population = self.state.population();
        let remaining = disaster::extinguish(&mut self.state, node)?;
        self.reconcile(population);
        Ok(remaining)
    }

    pub fn execute_command(&mut self, text: &str) -> GameResult<Command> {
        self.ensure_running()?;
        let command = Command::parse(text).inspect_err(|err| warn!(%err, text, "command rejected"))?;
        match command {
            Command::Grant { resource, amount } => {
                self.state.resources.credit(resource, amount);
                info!(%resource, amount, "resources granted");
                self.state
                    .record(GameEvent::ResourceGranted { resource, amount });
            }
            Command::StartDisaster(kind) => {
                self.trigger_disaster(kind)?;
            }
            Command::EndDisaster => {
                self.end_disaster()?;
            }
        }
        Ok(command)
    }

    /// Starts `kind` regardless of population or roll outcome.
    pub fn trigger_disaster(&mut self, kind: DisasterKind) -> GameResult<()> {
        self.ensure_running()?;
        let population = self.state.population();
        let mut rng = self.rng.stream(COMMAND_STREAM);
        disaster::activate(&mut self.state, &self.rules, kind, &mut rng)?;
        self.reconcile(population);
        Ok(())
    }

    pub fn end_disaster(&mut self) -> GameResult<DisasterKind> {
        self.ensure_running()?;
        let population = self.state.population();
        let kind = disaster::force_end(&mut self.state, EndReason::Forced)?;
        self.reconcile(population);
        Ok(kind)
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot::capture(&self.state, &self.rules)
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.state.drain_events()
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn clock(&self) -> Duration {
        self.state.clock
    }

    pub fn is_finished(&self) -> bool {
        self.state.finished
    }

    /// When the named system fires next, if it is armed.
    pub fn next_due(&self, name: &str) -> Option<Duration> {
        self.systems
            .iter()
            .find(|scheduled| scheduled.system.name() == name)
            .and_then(|scheduled| scheduled.next_due)
    }
}

/// Periods shorter than a millisecond are scheduled a millisecond apart so
/// the clock always moves forward.
fn period_of(system: &dyn System, rules: &Rules) -> Duration {
    system.period(rules).max(MIN_PERIOD)
}

pub struct SystemContext<'a> {
    pub now: Duration,
    pub rules: &'a Rules,
}

/// A periodic step driven by the engine clock.
pub trait System: Send {
    fn name(&self) -> &str;

    fn period(&self, rules: &Rules) -> Duration;

    /// Whether the system should be on the schedule at all.
    fn armed(&self, state: &GameState, _rules: &Rules) -> bool {
        !state.finished
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        state: &mut GameState,
        rng: &mut SystemRng<'_>,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::House;

    fn engine_with(state: GameState, rules: Rules) -> Engine {
        EngineBuilder::new(EngineSettings { seed: 7, rules })
            .with_default_systems()
            .with_state(state)
            .build()
    }

    #[test]
    fn production_fires_on_its_interval() {
        let mut engine = engine_with(GameState::new(), Rules::default());
        assert_eq!(engine.next_due("production"), Some(Duration::from_secs(2)));
        assert_eq!(engine.next_due("disaster_roll"), None);

        let fired = engine.advance_time(Duration::from_millis(6500)).unwrap();
        let at: Vec<_> = fired.iter().map(|r| r.at.as_secs()).collect();
        assert_eq!(at, vec![2, 4, 6]);
        assert_eq!(engine.state().ticks, 3);
        assert_eq!(engine.clock(), Duration::from_millis(6500));
        assert_eq!(engine.next_due("production"), Some(Duration::from_secs(8)));
    }

    #[test]
    fn expiry_precedes_systems_at_the_same_instant() {
        let mut rules = Rules::default();
        rules.disasters.drought.duration_ms = 4_000;
        let mut state = GameState::new();
        state.buildings.house = House {
            level: 5,
            population: 32,
        };
        state.resources.credit(ResourceKind::Bread, 1_000);
        let mut engine = engine_with(state, rules);
        engine.trigger_disaster(DisasterKind::Drought).unwrap();

        let fired = engine.advance_time(Duration::from_secs(6)).unwrap();
        let names: Vec<_> = fired.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["production", "disaster_expiry", "production", "production"]
        );
        assert_eq!(engine.state().disaster.active, None);
        assert!(!engine.state().disaster.drought_active);
    }

    #[test]
    fn zero_periods_still_let_the_clock_move() {
        let mut rules = Rules::default();
        rules.production_interval_ms = 0;
        let mut engine = engine_with(GameState::new(), rules);
        assert_eq!(engine.next_due("production"), Some(Duration::from_millis(1)));
        let fired = engine.advance_time(Duration::from_millis(5)).unwrap();
        assert_eq!(fired.len(), 5);
        assert_eq!(engine.state().ticks, 5);
        assert_eq!(engine.clock(), Duration::from_millis(5));
    }

    #[test]
    fn mutators_are_rejected_after_the_goal() {
        let mut rules = Rules::default();
        rules.population_goal = 2;
        let mut engine = engine_with(GameState::new(), rules);
        engine.execute_command("wood: 10").unwrap();
        engine.execute_command("stone: 5").unwrap();
        engine.build(BuildingKind::House).unwrap();
        assert!(engine.is_finished());
        assert_eq!(engine.harvest(0), Err(GameError::GameFinished));
        assert_eq!(engine.execute_command("wood: 1"), Err(GameError::GameFinished));
        assert_eq!(engine.tick(), Err(GameError::GameFinished));
        assert!(engine.advance_time(Duration::from_secs(10)).unwrap().is_empty());
        assert_eq!(engine.clock(), Duration::from_secs(10));
    }
}
