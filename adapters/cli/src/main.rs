#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs Essence Defence levels headlessly.

mod layout_transfer;
mod level_file;

use std::{fmt, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use essence_defence_core::{Command, Event, GameState};
use essence_defence_system_bootstrap::{Simulation, WaveNotice};
use essence_defence_world::query;
use log::{info, warn};

use self::level_file::LevelSetup;

/// Runs a level without rendering and reports how it went.
#[derive(Debug, Parser)]
#[command(name = "essence-defence")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML level file; the built-in demo level is used when omitted.
    #[arg(long)]
    level: Option<PathBuf>,

    /// Maximum number of ticks to simulate.
    #[arg(long, default_value_t = 1_200)]
    ticks: u32,

    /// Simulated milliseconds per tick.
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Print the level layout as a transfer string and exit.
    #[arg(long)]
    export_layout: bool,

    /// Replace the level layout with a transfer string before running.
    #[arg(long, value_name = "LAYOUT")]
    import_layout: Option<String>,
}

/// Entry point for the Essence Defence command-line interface.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut setup = match &cli.level {
        Some(path) => level_file::load(path)?,
        None => level_file::demo()?,
    };

    if let Some(encoded) = &cli.import_layout {
        setup.config.layout =
            layout_transfer::decode(encoded).context("failed to import layout")?;
        info!(
            "imported {}x{} layout",
            setup.config.layout.columns, setup.config.layout.rows
        );
    }

    if cli.export_layout {
        println!("{}", layout_transfer::encode(&setup.config.layout)?);
        return Ok(());
    }

    let summary = run(setup, cli.ticks, Duration::from_millis(cli.tick_ms))?;
    println!("{summary}");
    Ok(())
}

fn run(setup: LevelSetup, ticks: u32, dt: Duration) -> Result<RunSummary> {
    info!("level layout:\n{}", setup.config.layout.render());
    let mut simulation = Simulation::new(setup.config).context("level failed to load")?;
    let mut summary = RunSummary::default();
    let mut events = Vec::new();
    let mut notices = Vec::new();

    for placement in setup.placements {
        events.clear();
        simulation.submit(
            Command::PlaceTower {
                kind: placement.kind,
                cell: placement.cell,
            },
            &mut events,
        );
        for event in &events {
            if let Event::TowerPlacementRejected { reason, .. } = event {
                warn!("initial placement {placement:?} rejected: {reason}");
            }
        }
    }

    for _ in 0..ticks {
        events.clear();
        notices.clear();
        simulation.step(dt, &mut events, &mut notices);
        summary.ticks += 1;
        summary.record(&events, &notices);

        if simulation.game_state() != GameState::Running {
            break;
        }
    }

    let economy = query::economy(simulation.world());
    summary.hp = economy.hp();
    summary.max_hp = economy.max_hp();
    summary.essence = economy.essence();
    summary.loops = simulation.director().loops_completed();
    summary.state = simulation.game_state();
    Ok(summary)
}

#[derive(Debug)]
struct RunSummary {
    ticks: u32,
    spawned: u32,
    destroyed: u32,
    leaked: u32,
    waves: u32,
    loops: u32,
    hp: u32,
    max_hp: u32,
    essence: u32,
    state: GameState,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            ticks: 0,
            spawned: 0,
            destroyed: 0,
            leaked: 0,
            waves: 0,
            loops: 0,
            hp: 0,
            max_hp: 0,
            essence: 0,
            state: GameState::Running,
        }
    }
}

impl RunSummary {
    fn record(&mut self, events: &[Event], notices: &[WaveNotice]) {
        for event in events {
            match event {
                Event::EnemySpawned { .. } => self.spawned += 1,
                Event::EnemyDestroyed { .. } => self.destroyed += 1,
                Event::EnemyReachedCore { .. } => self.leaked += 1,
                _ => {}
            }
        }
        self.waves += notices
            .iter()
            .filter(|notice| matches!(notice, WaveNotice::AwaitingClear { .. }))
            .count() as u32;
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self.state {
            GameState::Running => "still running".to_owned(),
            GameState::GameOver(reason) => format!("game over ({reason:?})"),
        };
        writeln!(f, "{outcome} after {} ticks", self.ticks)?;
        writeln!(
            f,
            "waves released: {} across {} completed loops",
            self.waves, self.loops
        )?;
        writeln!(
            f,
            "enemies: {} spawned, {} destroyed, {} reached the core",
            self.spawned, self.destroyed, self.leaked
        )?;
        write!(
            f,
            "core: {}/{} hp, {} essence",
            self.hp, self.max_hp, self.essence
        )
    }
}
