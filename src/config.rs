use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    buildings::BuildingKind,
    resources::{CostBundle, ResourceKind},
};

fn default_population_goal() -> u64 {
    128
}

fn default_disaster_threshold() -> u64 {
    32
}

fn default_max_chefs_per_level() -> u64 {
    4
}

fn default_tick_ms() -> u64 {
    2_000
}

fn default_roll_interval_ms() -> u64 {
    10_000
}

fn default_roll_probability() -> f64 {
    0.2
}

fn default_bread_per_chef() -> u64 {
    1
}

fn default_bread_factor() -> f64 {
    1.5
}

fn default_wildfire_wood_multiplier() -> f64 {
    0.5
}

fn default_drought_water_multiplier() -> f64 {
    0.7
}

/// House capacity as a function of level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PopulationCurve {
    /// `2^level`
    Doubling,
    /// `level * per_level`
    Linear { per_level: u64 },
}

impl Default for PopulationCurve {
    fn default() -> Self {
        PopulationCurve::Doubling
    }
}

impl PopulationCurve {
    pub fn capacity(self, level: u32) -> u64 {
        if level == 0 {
            return 0;
        }
        match self {
            PopulationCurve::Doubling => 1_u64.checked_shl(level).unwrap_or(u64::MAX),
            PopulationCurve::Linear { per_level } => per_level.saturating_mul(level as u64),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingCost {
    pub build: CostBundle,
    pub upgrade_rate: CostBundle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostTable {
    #[serde(default = "CostTable::house")]
    pub house: BuildingCost,
    #[serde(default = "CostTable::restaurant")]
    pub restaurant: BuildingCost,
    #[serde(default = "CostTable::sawmill")]
    pub sawmill: BuildingCost,
    #[serde(default = "CostTable::quarry")]
    pub quarry: BuildingCost,
    #[serde(default = "CostTable::waterplant")]
    pub waterplant: BuildingCost,
    #[serde(default = "CostTable::farm")]
    pub farm: BuildingCost,
}

impl CostTable {
    fn pair(
        build: [(ResourceKind, u64); 2],
        upgrade_rate: [(ResourceKind, u64); 2],
    ) -> BuildingCost {
        BuildingCost {
            build: CostBundle::new(build),
            upgrade_rate: CostBundle::new(upgrade_rate),
        }
    }

    fn house() -> BuildingCost {
        use ResourceKind::*;
        Self::pair([(Wood, 10), (Stone, 5)], [(Wood, 20), (Stone, 10)])
    }

    fn restaurant() -> BuildingCost {
        use ResourceKind::*;
        Self::pair([(Wood, 15), (Stone, 8)], [(Wood, 30), (Stone, 15)])
    }

    fn sawmill() -> BuildingCost {
        use ResourceKind::*;
        Self::pair([(Wood, 50), (Stone, 20)], [(Wood, 100), (Stone, 40)])
    }

    fn quarry() -> BuildingCost {
        use ResourceKind::*;
        Self::pair([(Wood, 20), (Stone, 50)], [(Wood, 40), (Stone, 100)])
    }

    fn waterplant() -> BuildingCost {
        use ResourceKind::*;
        Self::pair([(Wood, 30), (Stone, 30)], [(Wood, 60), (Stone, 60)])
    }

    fn farm() -> BuildingCost {
        use ResourceKind::*;
        Self::pair([(Wood, 40), (Water, 20)], [(Wood, 80), (Water, 40)])
    }

    pub fn for_kind(&self, kind: BuildingKind) -> &BuildingCost {
        match kind {
            BuildingKind::House => &self.house,
            BuildingKind::Restaurant => &self.restaurant,
            BuildingKind::Sawmill => &self.sawmill,
            BuildingKind::Quarry => &self.quarry,
            BuildingKind::Waterplant => &self.waterplant,
            BuildingKind::Farm => &self.farm,
        }
    }
}

impl Default for CostTable {
    fn default() -> Self {
        Self {
            house: Self::house(),
            restaurant: Self::restaurant(),
            sawmill: Self::sawmill(),
            quarry: Self::quarry(),
            waterplant: Self::waterplant(),
            farm: Self::farm(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreadRules {
    #[serde(default = "default_bread_per_chef")]
    pub per_chef: u64,
    /// Multiply each chef's batches by the restaurant level.
    #[serde(default)]
    pub level_bonus: bool,
    /// Consumption is `ceil(sqrt(consumers) * factor)`.
    #[serde(default = "default_bread_factor")]
    pub consumption_factor: f64,
}

impl Default for BreadRules {
    fn default() -> Self {
        Self {
            per_chef: default_bread_per_chef(),
            level_bonus: false,
            consumption_factor: default_bread_factor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisasterRules {
    #[serde(default = "default_disaster_threshold")]
    pub population_threshold: u64,
    #[serde(default = "default_roll_interval_ms")]
    pub roll_interval_ms: u64,
    #[serde(default = "default_roll_probability")]
    pub roll_probability: f64,
    /// Plague is left out of rolls below this population.
    #[serde(default)]
    pub plague_min_population: Option<u64>,
    #[serde(default)]
    pub drought: DroughtRules,
    #[serde(default)]
    pub earthquake: EarthquakeRules,
    #[serde(default)]
    pub wildfire: WildfireRules,
    #[serde(default)]
    pub plague: PlagueRules,
}

impl Default for DisasterRules {
    fn default() -> Self {
        Self {
            population_threshold: default_disaster_threshold(),
            roll_interval_ms: default_roll_interval_ms(),
            roll_probability: default_roll_probability(),
            plague_min_population: None,
            drought: DroughtRules::default(),
            earthquake: EarthquakeRules::default(),
            wildfire: WildfireRules::default(),
            plague: PlagueRules::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DroughtRules {
    pub duration_ms: u64,
    pub water_loss: f64,
    pub food_loss: f64,
    pub water_multiplier: f64,
}

impl Default for DroughtRules {
    fn default() -> Self {
        Self {
            duration_ms: 20_000,
            water_loss: 0.2,
            food_loss: 0.3,
            water_multiplier: default_drought_water_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EarthquakeRules {
    pub shake_ms: u64,
    pub stone_loss: f64,
}

impl Default for EarthquakeRules {
    fn default() -> Self {
        Self {
            shake_ms: 1_000,
            stone_loss: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WildfireRules {
    pub duration_ms: u64,
    pub wood_loss: f64,
    pub wood_multiplier: f64,
}

impl Default for WildfireRules {
    fn default() -> Self {
        Self {
            duration_ms: 30_000,
            wood_loss: 0.5,
            wood_multiplier: default_wildfire_wood_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlagueRules {
    pub duration_ms: u64,
    pub min_loss: f64,
    pub max_loss: f64,
}

impl Default for PlagueRules {
    fn default() -> Self {
        Self {
            duration_ms: 5_000,
            min_loss: 0.1,
            max_loss: 0.3,
        }
    }
}

/// Every tunable of a session. One rule set applies to the whole game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rules {
    #[serde(default = "default_population_goal")]
    pub population_goal: u64,
    #[serde(default)]
    pub population_curve: PopulationCurve,
    #[serde(default = "default_max_chefs_per_level")]
    pub max_chefs_per_restaurant_level: u64,
    #[serde(default = "default_tick_ms")]
    pub production_interval_ms: u64,
    #[serde(default)]
    pub bread: BreadRules,
    #[serde(default)]
    pub costs: CostTable,
    #[serde(default)]
    pub disasters: DisasterRules,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            population_goal: default_population_goal(),
            population_curve: PopulationCurve::default(),
            max_chefs_per_restaurant_level: default_max_chefs_per_level(),
            production_interval_ms: default_tick_ms(),
            bread: BreadRules::default(),
            costs: CostTable::default(),
            disasters: DisasterRules::default(),
        }
    }
}

impl Rules {
    pub fn production_interval(&self) -> Duration {
        Duration::from_millis(self.production_interval_ms)
    }

    pub fn roll_interval(&self) -> Duration {
        Duration::from_millis(self.disasters.roll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.population_goal == 0 {
            bail!("population_goal must be greater than zero");
        }
        if self.production_interval_ms == 0 {
            bail!("production_interval_ms must be greater than zero");
        }
        let disasters = &self.disasters;
        if disasters.roll_interval_ms == 0 {
            bail!("disasters.roll_interval_ms must be greater than zero");
        }
        if !(0.0..=1.0).contains(&disasters.roll_probability) {
            bail!(
                "disasters.roll_probability must be within [0, 1], got {}",
                disasters.roll_probability
            );
        }
        let fractions = [
            ("drought.water_loss", disasters.drought.water_loss),
            ("drought.food_loss", disasters.drought.food_loss),
            ("drought.water_multiplier", disasters.drought.water_multiplier),
            ("earthquake.stone_loss", disasters.earthquake.stone_loss),
            ("wildfire.wood_loss", disasters.wildfire.wood_loss),
            ("wildfire.wood_multiplier", disasters.wildfire.wood_multiplier),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                bail!("disasters.{name} must be within [0, 1], got {value}");
            }
        }
        let plague = &disasters.plague;
        if !(0.0 <= plague.min_loss && plague.min_loss < plague.max_loss && plague.max_loss <= 1.0)
        {
            bail!(
                "disasters.plague loss range must satisfy 0 <= min < max <= 1, got [{}, {})",
                plague.min_loss,
                plague.max_loss
            );
        }
        if self.bread.consumption_factor < 0.0 {
            bail!("bread.consumption_factor must not be negative");
        }
        Ok(())
    }
}

pub struct RulesLoader {
    base_dir: PathBuf,
}

impl RulesLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Rules> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read rules file {}", path.display()))?;
        let rules: Rules = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        rules
            .validate()
            .with_context(|| format!("Invalid rules in {}", path.display()))?;
        Ok(rules)
    }
}
