//! Line-based play scripts for headless runs.
//!
//! ```text
//! # comments and blank lines are skipped
//! cmd wood: 10
//! cmd stone: 5
//! build house
//! assign wood +1
//! harvest 0 3
//! wait 2.5
//! tick
//! ```

use std::{fs, path::Path, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{buildings::BuildingKind, engine::Engine, workers::JobKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Harvest { node: usize, times: u32 },
    Build(BuildingKind),
    Upgrade(BuildingKind),
    Assign { job: JobKind, delta: i32 },
    Extinguish(usize),
    Command(String),
    Wait(Duration),
    Tick,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    pub line: usize,
    pub step: Step,
}

#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    pub line: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptOutcome {
    pub applied: usize,
    pub rejected: Vec<Rejection>,
}

pub fn load_script(path: impl AsRef<Path>) -> Result<Vec<ScriptStep>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    parse_script(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn parse_script(text: &str) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let step = parse_step(line).with_context(|| format!("line {}: `{line}`", index + 1))?;
        steps.push(ScriptStep {
            line: index + 1,
            step,
        });
    }
    Ok(steps)
}

fn parse_step(line: &str) -> Result<Step> {
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let args: Vec<&str> = rest.split_whitespace().collect();
    let step = match (verb.to_lowercase().as_str(), args.as_slice()) {
        ("harvest", [node]) => Step::Harvest {
            node: node.parse()?,
            times: 1,
        },
        ("harvest", [node, times]) => Step::Harvest {
            node: node.parse()?,
            times: times.parse()?,
        },
        ("build", [kind]) => Step::Build(kind.parse()?),
        ("upgrade", [kind]) => Step::Upgrade(kind.parse()?),
        ("assign", [job, delta]) => Step::Assign {
            job: job.parse()?,
            delta: match *delta {
                "+1" | "1" => 1,
                "-1" => -1,
                other => bail!("worker delta must be +1 or -1, got `{other}`"),
            },
        },
        ("extinguish", [node]) => Step::Extinguish(node.parse()?),
        ("cmd", _) if !rest.is_empty() => Step::Command(rest.to_string()),
        ("wait", [secs]) => {
            let secs: f64 = secs.parse()?;
            Step::Wait(
                Duration::try_from_secs_f64(secs)
                    .map_err(|err| anyhow!("invalid wait `{secs}`: {err}"))?,
            )
        }
        ("tick", []) => Step::Tick,
        _ => bail!("unrecognised step"),
    };
    Ok(step)
}

/// Plays `steps` against `engine`. Rejected game actions are collected and
/// the run carries on; only engine failures abort it.
pub fn run_script(engine: &mut Engine, steps: &[ScriptStep]) -> Result<ScriptOutcome> {
    let mut outcome = ScriptOutcome::default();
    for ScriptStep { line, step } in steps {
        debug!(line, ?step, "script step");
        let result = match step {
            Step::Harvest { node, times } => {
                (0..*times).try_for_each(|_| engine.harvest(*node).map(|_| ()))
            }
            Step::Build(kind) => engine.build(*kind).map(|_| ()),
            Step::Upgrade(kind) => engine.upgrade(*kind).map(|_| ()),
            Step::Assign { job, delta } => engine.assign_worker(*job, *delta).map(|_| ()),
            Step::Extinguish(node) => engine.extinguish_fire(*node).map(|_| ()),
            Step::Command(text) => engine.execute_command(text).map(|_| ()),
            Step::Tick => engine.tick().map(|_| ()),
            Step::Wait(dt) => {
                engine.advance_time(*dt)?;
                Ok(())
            }
        };
        match result {
            Ok(()) => outcome.applied += 1,
            Err(err) => {
                warn!(line, %err, "script step rejected");
                outcome.rejected.push(Rejection {
                    line: *line,
                    error: err.to_string(),
                });
            }
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_step_kind() {
        let steps = parse_script(
            "# warm up\n\
             harvest 3\n\
             harvest 0 5\n\
             build house\n\
             upgrade farm\n\
             assign restaurant +1\n\
             assign wood -1\n\
             extinguish 2\n\
             cmd disaster: wildfire\n\
             \n\
             wait 1.5\n\
             tick\n",
        )
        .unwrap();
        let kinds: Vec<_> = steps.iter().map(|s| s.step.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                Step::Harvest { node: 3, times: 1 },
                Step::Harvest { node: 0, times: 5 },
                Step::Build(BuildingKind::House),
                Step::Upgrade(BuildingKind::Farm),
                Step::Assign {
                    job: JobKind::Restaurant,
                    delta: 1
                },
                Step::Assign {
                    job: JobKind::Wood,
                    delta: -1
                },
                Step::Extinguish(2),
                Step::Command("disaster: wildfire".into()),
                Step::Wait(Duration::from_millis(1500)),
                Step::Tick,
            ]
        );
        assert_eq!(steps[0].line, 2);
        assert_eq!(steps.last().map(|s| s.line), Some(12));
    }

    #[test]
    fn reports_the_offending_line() {
        let err = parse_script("tick\nbuild castle\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
        assert!(parse_script("assign wood +2").is_err());
        assert!(parse_script("wait -1").is_err());
        assert!(parse_script("cmd").is_err());
    }
}
