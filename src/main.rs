use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hamlet::{
    engine::{EngineBuilder, EngineSettings},
    script::{self, ScriptOutcome},
    snapshot::GameSnapshot,
    web::{self, WebServerConfig},
    Rules, RulesLoader,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Bread Hamlet village simulation")]
struct Cli {
    #[command(subcommand)]
    command: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Play a script headlessly and print the final snapshot as JSON
    Simulate {
        #[command(flatten)]
        game: GameArgs,

        /// Script of player actions, one per line
        #[arg(long)]
        script: Option<PathBuf>,

        /// Extra simulated seconds to run after the script
        #[arg(long, default_value_t = 0)]
        seconds: u64,
    },
    /// Serve the browser UI and drive the clock in real time
    Serve {
        #[command(flatten)]
        game: GameArgs,

        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Milliseconds of real time between clock advances
        #[arg(long, default_value_t = 100)]
        frame_ms: u64,
    },
}

#[derive(Debug, Args)]
struct GameArgs {
    /// Rules YAML file (built-in defaults when omitted)
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Seed for every random roll
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

impl GameArgs {
    fn load_rules(&self) -> Result<Rules> {
        match &self.rules {
            Some(path) => RulesLoader::new(".").load(path),
            None => Ok(Rules::default()),
        }
    }
}

#[derive(Serialize)]
struct SimulationReport {
    seed: u64,
    script: ScriptOutcome,
    snapshot: GameSnapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hamlet=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Mode::Simulate {
            game,
            script: script_path,
            seconds,
        } => {
            let rules = game.load_rules()?;
            let mut engine = EngineBuilder::new(EngineSettings {
                seed: game.seed,
                rules,
            })
            .with_default_systems()
            .build();

            let outcome = match &script_path {
                Some(path) => {
                    let steps = script::load_script(path)?;
                    script::run_script(&mut engine, &steps)?
                }
                None => ScriptOutcome::default(),
            };
            if seconds > 0 {
                engine.advance_time(Duration::from_secs(seconds))?;
            }
            info!(
                applied = outcome.applied,
                rejected = outcome.rejected.len(),
                population = engine.state().population(),
                finished = engine.is_finished(),
                "simulation complete"
            );

            let report = SimulationReport {
                seed: game.seed,
                script: outcome,
                snapshot: engine.snapshot(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Mode::Serve {
            game,
            host,
            port,
            frame_ms,
        } => {
            let rules = game.load_rules()?;
            web::run(WebServerConfig {
                rules,
                seed: game.seed,
                host,
                port,
                frame_ms,
            })
            .await?;
        }
    }
    Ok(())
}
