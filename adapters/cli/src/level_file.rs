//! TOML level files understood by the command-line runner.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use essence_defence_core::{
    level::DEFAULT_CORE_RADIUS, CardDefinition, CellCoord, DamageTypeDefinition, EconomyConfig,
    EnemyDefinition, LevelConfig, LevelLayout, TowerDefinition, TowerKindId, WaveSchedule,
};
use serde::Deserialize;

const SUPPORTED_LEVEL_VERSION: u32 = 1;
const DEMO_LEVEL: &str = include_str!("../levels/demo.toml");

/// Validated level plus the towers placed before the first tick.
#[derive(Debug)]
pub(crate) struct LevelSetup {
    pub(crate) config: LevelConfig,
    pub(crate) placements: Vec<Placement>,
}

/// Tower placed for free when the run starts.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub(crate) struct Placement {
    pub(crate) kind: TowerKindId,
    pub(crate) cell: CellCoord,
}

#[derive(Debug, Deserialize)]
struct LevelFile {
    version: u32,
    layout: LayoutSection,
    enemies: Vec<EnemyDefinition>,
    towers: Vec<TowerDefinition>,
    damage_types: Vec<DamageTypeDefinition>,
    #[serde(default)]
    cards: Vec<CardDefinition>,
    schedule: WaveSchedule,
    economy: EconomyConfig,
    #[serde(default = "default_core_radius")]
    core_radius: f32,
    #[serde(default)]
    placements: Vec<Placement>,
}

#[derive(Debug, Deserialize)]
struct LayoutSection {
    cell_size: f32,
    rows: String,
    waypoints: Vec<CellCoord>,
}

fn default_core_radius() -> f32 {
    DEFAULT_CORE_RADIUS
}

/// Reads and validates a level file from disk.
pub(crate) fn load(path: &Path) -> Result<LevelSetup> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read level file at {}", path.display()))?;
    parse(&contents).with_context(|| format!("invalid level file {}", path.display()))
}

/// Returns the built-in demo level.
pub(crate) fn demo() -> Result<LevelSetup> {
    parse(DEMO_LEVEL).context("built-in demo level is invalid")
}

fn parse(contents: &str) -> Result<LevelSetup> {
    let file: LevelFile = toml::from_str(contents).context("failed to parse level toml")?;
    if file.version != SUPPORTED_LEVEL_VERSION {
        bail!(
            "unsupported level version {}; expected {}",
            file.version,
            SUPPORTED_LEVEL_VERSION
        );
    }

    let layout = LevelLayout::parse(
        &file.layout.rows,
        file.layout.cell_size,
        file.layout.waypoints,
    )
    .context("failed to parse level layout")?;

    let config = LevelConfig {
        layout,
        enemies: file.enemies,
        towers: file.towers,
        damage_types: file.damage_types,
        cards: file.cards,
        schedule: file.schedule,
        economy: file.economy,
        core_radius: file.core_radius,
    };
    config.validate().context("level failed validation")?;

    Ok(LevelSetup {
        config,
        placements: file.placements,
    })
}
