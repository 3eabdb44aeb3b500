use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    config::Rules,
    error::{GameError, GameResult},
    resources::{CostBundle, ResourceKind, ResourceLedger},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildingKind {
    House,
    Restaurant,
    Sawmill,
    Quarry,
    Waterplant,
    Farm,
}

impl BuildingKind {
    pub const ALL: [BuildingKind; 6] = [
        BuildingKind::House,
        BuildingKind::Restaurant,
        BuildingKind::Sawmill,
        BuildingKind::Quarry,
        BuildingKind::Waterplant,
        BuildingKind::Farm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BuildingKind::House => "house",
            BuildingKind::Restaurant => "restaurant",
            BuildingKind::Sawmill => "sawmill",
            BuildingKind::Quarry => "quarry",
            BuildingKind::Waterplant => "waterplant",
            BuildingKind::Farm => "farm",
        }
    }

    /// The production building that boosts gatherers of `resource`.
    pub fn boosting(resource: ResourceKind) -> Option<BuildingKind> {
        match resource {
            ResourceKind::Wood => Some(BuildingKind::Sawmill),
            ResourceKind::Stone => Some(BuildingKind::Quarry),
            ResourceKind::Food => Some(BuildingKind::Farm),
            ResourceKind::Water => Some(BuildingKind::Waterplant),
            ResourceKind::Bread => None,
        }
    }
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildingKind {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildingKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| GameError::UnknownBuilding(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildAction {
    Build,
    Upgrade,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct House {
    pub level: u32,
    pub population: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restaurant {
    pub level: u32,
    /// Assigned chefs.
    pub workers: u64,
}

impl Restaurant {
    pub fn max_chefs(&self, per_level: u64) -> u64 {
        (self.level as u64).saturating_mul(per_level)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buildings {
    pub house: House,
    pub restaurant: Restaurant,
    pub sawmill: u32,
    pub quarry: u32,
    pub waterplant: u32,
    pub farm: u32,
}

/// What changed when a building went up or down a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelChange {
    pub kind: BuildingKind,
    pub from: u32,
    pub to: u32,
}

impl Buildings {
    pub fn level(&self, kind: BuildingKind) -> u32 {
        match kind {
            BuildingKind::House => self.house.level,
            BuildingKind::Restaurant => self.restaurant.level,
            BuildingKind::Sawmill => self.sawmill,
            BuildingKind::Quarry => self.quarry,
            BuildingKind::Waterplant => self.waterplant,
            BuildingKind::Farm => self.farm,
        }
    }

    fn level_mut(&mut self, kind: BuildingKind) -> &mut u32 {
        match kind {
            BuildingKind::House => &mut self.house.level,
            BuildingKind::Restaurant => &mut self.restaurant.level,
            BuildingKind::Sawmill => &mut self.sawmill,
            BuildingKind::Quarry => &mut self.quarry,
            BuildingKind::Waterplant => &mut self.waterplant,
            BuildingKind::Farm => &mut self.farm,
        }
    }

    /// Level of the building that boosts `resource`, or 0.
    pub fn bonus_level(&self, resource: ResourceKind) -> u32 {
        BuildingKind::boosting(resource)
            .map(|kind| self.level(kind))
            .unwrap_or(0)
    }

    pub fn cost(&self, rules: &Rules, kind: BuildingKind, action: BuildAction) -> CostBundle {
        let table = rules.costs.for_kind(kind);
        match action {
            BuildAction::Build => table.build.clone(),
            BuildAction::Upgrade => table.upgrade_rate.scaled(self.level(kind) as u64),
        }
    }

    /// The action that applies next: build at level 0, upgrade afterwards.
    pub fn next_action(&self, kind: BuildingKind) -> BuildAction {
        if self.level(kind) == 0 {
            BuildAction::Build
        } else {
            BuildAction::Upgrade
        }
    }

    /// Pays for `action` and raises the level. State is untouched on error.
    pub fn apply(
        &mut self,
        rules: &Rules,
        ledger: &mut ResourceLedger,
        kind: BuildingKind,
        action: BuildAction,
    ) -> GameResult<LevelChange> {
        let from = self.level(kind);
        match action {
            BuildAction::Build if from > 0 => return Err(GameError::AlreadyBuilt(kind)),
            BuildAction::Upgrade if from == 0 => return Err(GameError::NotBuilt(kind)),
            _ => {}
        }
        let cost = self.cost(rules, kind, action);
        ledger.debit_all(&cost)?;
        let to = from + 1;
        *self.level_mut(kind) = to;
        if kind == BuildingKind::House {
            self.house.population = rules.population_curve.capacity(to);
        }
        Ok(LevelChange { kind, from, to })
    }

    /// Drops one level and recomputes derived fields. Worker counts above the
    /// new bounds are left for the caller to reconcile.
    pub fn demote(&mut self, rules: &Rules, kind: BuildingKind) -> Option<LevelChange> {
        let from = self.level(kind);
        if from == 0 {
            return None;
        }
        let to = from - 1;
        *self.level_mut(kind) = to;
        match kind {
            BuildingKind::House => {
                self.house.population = rules.population_curve.capacity(to);
            }
            BuildingKind::Restaurant => {
                let max = self
                    .restaurant
                    .max_chefs(rules.max_chefs_per_restaurant_level);
                self.restaurant.workers = self.restaurant.workers.min(max);
            }
            _ => {}
        }
        Some(LevelChange { kind, from, to })
    }

    /// Lowers the house level while population sits below the previous
    /// level's capacity.
    pub fn settle_house_level(&mut self, rules: &Rules) -> Option<LevelChange> {
        let from = self.house.level;
        let mut level = from;
        while level > 1 && self.house.population < rules.population_curve.capacity(level - 1) {
            level -= 1;
        }
        if level == from {
            return None;
        }
        self.house.level = level;
        Some(LevelChange {
            kind: BuildingKind::House,
            from,
            to: level,
        })
    }
}
