use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, GameResult, Shortfall};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Wood,
    Stone,
    Food,
    Water,
    Bread,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Wood,
        ResourceKind::Stone,
        ResourceKind::Food,
        ResourceKind::Water,
        ResourceKind::Bread,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Wood => "wood",
            ResourceKind::Stone => "stone",
            ResourceKind::Food => "food",
            ResourceKind::Water => "water",
            ResourceKind::Bread => "bread",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| GameError::UnknownResource(s.to_string()))
    }
}

/// Resources paid together, keyed by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostBundle(BTreeMap<ResourceKind, u64>);

impl CostBundle {
    pub fn new(lines: impl IntoIterator<Item = (ResourceKind, u64)>) -> Self {
        let mut bundle = BTreeMap::new();
        for (kind, amount) in lines {
            let entry: &mut u64 = bundle.entry(kind).or_default();
            *entry = entry.saturating_add(amount);
        }
        Self(bundle)
    }

    pub fn scaled(&self, factor: u64) -> Self {
        Self(
            self.0
                .iter()
                .map(|(&kind, &amount)| (kind, amount.saturating_mul(factor)))
                .collect(),
        )
    }

    pub fn get(&self, kind: ResourceKind) -> u64 {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    pub fn lines(&self) -> impl Iterator<Item = (ResourceKind, u64)> + '_ {
        self.0.iter().map(|(&kind, &amount)| (kind, amount))
    }
}

/// Non-negative stock of the five resources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceLedger {
    amounts: [u64; 5],
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_amounts(amounts: impl IntoIterator<Item = (ResourceKind, u64)>) -> Self {
        let mut ledger = Self::new();
        for (kind, amount) in amounts {
            ledger.credit(kind, amount);
        }
        ledger
    }

    pub fn get(&self, kind: ResourceKind) -> u64 {
        self.amounts[kind.slot()]
    }

    pub fn credit(&mut self, kind: ResourceKind, amount: u64) {
        let slot = &mut self.amounts[kind.slot()];
        *slot = slot.saturating_add(amount);
    }

    pub fn debit(&mut self, kind: ResourceKind, amount: u64) -> GameResult<()> {
        let available = self.get(kind);
        if available < amount {
            return Err(GameError::InsufficientResources {
                shortfalls: vec![Shortfall {
                    resource: kind,
                    required: amount,
                    available,
                }],
            });
        }
        self.amounts[kind.slot()] = available - amount;
        Ok(())
    }

    /// Checks every line before touching the stock, so a failed payment
    /// leaves the ledger as it was.
    pub fn debit_all(&mut self, cost: &CostBundle) -> GameResult<()> {
        let shortfalls: Vec<Shortfall> = cost
            .lines()
            .filter(|&(kind, required)| required > self.get(kind))
            .map(|(kind, required)| Shortfall {
                resource: kind,
                required,
                available: self.get(kind),
            })
            .collect();
        if !shortfalls.is_empty() {
            return Err(GameError::InsufficientResources { shortfalls });
        }
        for (kind, required) in cost.lines() {
            self.amounts[kind.slot()] -= required;
        }
        Ok(())
    }

    /// Removes `floor(current * fraction)` and returns what was lost.
    pub fn force_lose(&mut self, kind: ResourceKind, fraction: f64) -> u64 {
        let current = self.get(kind);
        let fraction = fraction.clamp(0.0, 1.0);
        let lost = ((current as f64 * fraction).floor() as u64).min(current);
        self.amounts[kind.slot()] = current - lost;
        lost
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, u64)> + '_ {
        ResourceKind::ALL
            .into_iter()
            .map(move |kind| (kind, self.get(kind)))
    }
}
