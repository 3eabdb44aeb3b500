//! Debug console commands of the form `key: value`.

use crate::{
    disaster::DisasterKind,
    error::{GameError, GameResult},
    resources::ResourceKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Grant { resource: ResourceKind, amount: u64 },
    StartDisaster(DisasterKind),
    EndDisaster,
}

impl Command {
    pub fn parse(text: &str) -> GameResult<Self> {
        let text = text.trim().to_lowercase();
        let parts: Vec<&str> = text.split(':').map(str::trim).collect();
        let [key, value] = parts.as_slice() else {
            return Err(GameError::InvalidCommand(
                "expected `<resource>: <amount>` or `disaster: <type>`".into(),
            ));
        };

        if *key == "disaster" {
            if *value == "end" {
                return Ok(Command::EndDisaster);
            }
            return value.parse().map(Command::StartDisaster);
        }

        let resource: ResourceKind = key.parse()?;
        let amount = value
            .parse::<u64>()
            .ok()
            .filter(|amount| *amount > 0)
            .ok_or_else(|| {
                GameError::InvalidCommand(format!("amount must be a positive integer, got `{value}`"))
            })?;
        Ok(Command::Grant { resource, amount })
    }
}
