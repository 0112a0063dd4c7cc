//! Headless battle runner
//!
//! Loads a database from RON files, puts a party against a troop and lets the
//! scoring AI play both sides until the battle ends. Event lines go to the log;
//! the outcome and rewards are printed as JSON.

use clap::Parser;
use rpg_battle::{
    BattleContext, BattleEngineError, BattleManager, BattleOutcome, Database, Party, Phase,
    Rewards, ScoringAI, TurnRng,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rpg-battle")]
#[command(about = "Run a battle between a party and a troop and report the outcome")]
struct Args {
    /// Directory holding the RON data tables
    #[arg(long, default_value = "data")]
    data: PathBuf,

    /// Troop to fight
    #[arg(long, default_value_t = 1)]
    troop: u32,

    /// Actors in the party, in formation order
    #[arg(long, value_delimiter = ',', default_value = "1")]
    actors: Vec<u32>,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Whether the party may run away
    #[arg(long)]
    can_escape: bool,

    /// Whether a defeat continues the game instead of ending it
    #[arg(long)]
    can_lose: bool,

    /// Tick limit before the run is abandoned
    #[arg(long, default_value_t = 10_000)]
    max_ticks: u32,
}

#[derive(Serialize)]
struct Report {
    outcome: Option<BattleOutcome>,
    turns: u32,
    ticks: u32,
    seed: u64,
    rewards: Rewards,
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Args::parse();
    match run(&args) {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!(%err, "failed to serialize report");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            error!(%err, "battle failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<Report, BattleEngineError> {
    let db = Arc::new(Database::load_from_dir(&args.data)?);
    let mut party = Party::new(&db);
    for actor_id in &args.actors {
        party.add_actor(&db, *actor_id)?;
    }

    let seed = args.seed.unwrap_or_else(rand::random);
    let ctx = BattleContext::new(db, party, TurnRng::seeded(seed));
    let mut manager = BattleManager::new(ctx);
    manager.setup(args.troop, args.can_escape, args.can_lose)?;
    manager.on_encounter()?;

    let behavior = ScoringAI::new();
    let mut ticks = 0;
    while manager.phase() != Phase::Finished && ticks < args.max_ticks {
        if manager.is_inputting() {
            manager.decide_party_actions(&behavior)?;
        } else {
            manager.update()?;
        }
        for event in manager.drain_events() {
            if let Some(line) = event.format() {
                info!("{line}");
            }
        }
        ticks += 1;
    }

    Ok(Report {
        outcome: manager.outcome(),
        turns: manager.context().troop.turn_count(),
        ticks,
        seed,
        rewards: manager.rewards().clone(),
    })
}
