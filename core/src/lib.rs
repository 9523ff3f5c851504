#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Essence Defence simulation.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters and systems submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! for systems and presentation layers to react to deterministically. Level
//! data is handed over once as an immutable [`LevelConfig`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod damage;
pub mod layout;
pub mod level;

pub use damage::{DamageProfile, DamageProfileDelta, DamageTypeDefinition, DamageTypeId};
pub use glam::Vec3;
pub use layout::{flatten, unflatten, CellMarker, LayoutError, LevelLayout, TileKind};
pub use level::{
    CardDefinition, CardEffect, ConfigError, Difficulty, EconomyConfig, EnemyDefinition,
    LevelConfig, LevelStep, TierModel, TowerDefinition, WaveSchedule, WaveSpec,
};

/// Lifecycle of a running level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    /// Waves are running and commands are accepted.
    Running,
    /// The level ended; gameplay commands are ignored.
    GameOver(GameOverReason),
}

/// Why a level ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameOverReason {
    /// Player HP reached zero.
    CoreDestroyed,
    /// The wave director hit its loop ceiling.
    LoopCeiling,
}

/// Ranking applied by a tower when choosing among enemies in range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetPolicy {
    /// Nearest enemy first.
    #[default]
    Closest,
    /// Most distant enemy first.
    Farthest,
    /// Highest current health first.
    Strongest,
    /// Lowest current health first.
    Weakest,
}

/// Phase of a tower's fire cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FireState {
    /// Ready to start a firing round as soon as an enemy is in range.
    Idle,
    /// Releasing the shots of a round.
    Firing,
    /// Waiting for the cooldown between rounds to elapse.
    Cooldown,
}

/// Object a card is played on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardTarget {
    /// A grid cell, used by build cards.
    Cell(CellCoord),
    /// An existing tower, used by upgrade cards.
    Tower(TowerId),
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Requests that a new enemy enter the level at a spawn cell.
    SpawnEnemy {
        /// Type of enemy to create.
        enemy_type: EnemyTypeId,
        /// Stat scaling of the current wave loop.
        difficulty: Difficulty,
    },
    /// Requests placement of a tower without spending essence.
    PlaceTower {
        /// Kind of tower to construct.
        kind: TowerKindId,
        /// Cell that hosts the tower.
        cell: CellCoord,
    },
    /// Requests removal of an existing tower.
    RemoveTower {
        /// Identifier of the tower targeted for removal.
        tower: TowerId,
    },
    /// Redeems a released shot of a tower against the chosen enemy.
    FireShot {
        /// Tower releasing the shot.
        tower: TowerId,
        /// Enemy the shot is aimed at.
        target: EnemyId,
    },
    /// Changes the ranking a tower uses to pick targets.
    SetTargetPolicy {
        /// Tower to update.
        tower: TowerId,
        /// Policy applied from now on.
        policy: TargetPolicy,
    },
    /// Pays for and resolves a card.
    PlayCard {
        /// Card being played.
        card: CardId,
        /// Object the card is played on.
        target: CardTarget,
    },
    /// Ends the level.
    EndGame {
        /// Why the level ended.
        reason: GameOverReason,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that an enemy entered the level.
    EnemySpawned {
        /// Identifier assigned to the enemy.
        enemy: EnemyId,
        /// Type of the enemy.
        enemy_type: EnemyTypeId,
        /// World position of the spawn cell.
        position: Vec3,
    },
    /// Reports that a spawn request was rejected.
    EnemySpawnRejected {
        /// Requested enemy type.
        enemy_type: EnemyTypeId,
        /// Why the spawn failed.
        reason: SpawnError,
    },
    /// Reports damage actually applied to an enemy.
    EnemyDamaged {
        /// Enemy that took damage.
        enemy: EnemyId,
        /// Tower credited with the damage, if it still exists.
        source: Option<TowerId>,
        /// Damage type that dealt the damage.
        damage_type: DamageTypeId,
        /// Health actually removed.
        applied: f32,
        /// Health left after the hit.
        remaining: f32,
    },
    /// Confirms that an enemy was destroyed by damage.
    EnemyDestroyed {
        /// Identifier of the destroyed enemy.
        enemy: EnemyId,
        /// Tower credited with the kill, if any.
        killer: Option<TowerId>,
        /// Essence granted for the kill.
        essence_reward: u32,
    },
    /// Confirms that an enemy reached the core and left the level.
    EnemyReachedCore {
        /// Identifier of the enemy.
        enemy: EnemyId,
        /// HP the enemy removed from the player.
        core_damage: u32,
    },
    /// Reports an enemy that ran out of waypoints away from the core.
    EnemyStranded {
        /// Identifier of the enemy, removed from the level.
        enemy: EnemyId,
        /// Position where the path ended.
        position: Vec3,
    },
    /// Reports that the player lost HP.
    PlayerDamaged {
        /// HP actually removed.
        amount: u32,
        /// HP left.
        hp: u32,
    },
    /// Reports the new essence balance.
    EssenceChanged {
        /// Essence available after the change.
        essence: u32,
    },
    /// Confirms that a tower was placed.
    TowerPlaced {
        /// Identifier assigned to the tower.
        tower: TowerId,
        /// Kind of tower placed.
        kind: TowerKindId,
        /// Cell hosting the tower.
        cell: CellCoord,
    },
    /// Reports that a tower placement request was rejected.
    TowerPlacementRejected {
        /// Requested tower kind.
        kind: TowerKindId,
        /// Requested cell.
        cell: CellCoord,
        /// Why the placement failed.
        reason: PlacementError,
    },
    /// Confirms that a tower was removed and its firing sequence torn down.
    TowerRemoved {
        /// Identifier of the removed tower.
        tower: TowerId,
        /// Cell the tower occupied.
        cell: CellCoord,
    },
    /// Reports that a tower removal request was rejected.
    TowerRemovalRejected {
        /// Identifier of the tower targeted for removal.
        tower: TowerId,
        /// Why the removal failed.
        reason: RemovalError,
    },
    /// Announces that a tower started a firing round.
    FiringRoundStarted {
        /// Tower that started firing.
        tower: TowerId,
        /// Shots the round releases.
        shots: u32,
    },
    /// Announces a released shot awaiting a target this tick.
    ShotReady {
        /// Tower that released the shot.
        tower: TowerId,
    },
    /// Announces that a tower finished its round and entered cooldown.
    FiringRoundEnded {
        /// Tower that finished firing.
        tower: TowerId,
    },
    /// Reports that a `FireShot` command was rejected.
    ShotRejected {
        /// Tower named by the command.
        tower: TowerId,
        /// Enemy named by the command.
        target: EnemyId,
        /// Why the shot was rejected.
        reason: ShotError,
    },
    /// Confirms that a projectile left a tower.
    ProjectileLaunched {
        /// Identifier of the projectile.
        projectile: ProjectileId,
        /// Tower that launched it.
        tower: TowerId,
        /// Enemy it homes in on.
        target: EnemyId,
    },
    /// Reports that a projectile hit.
    ProjectileImpact {
        /// Identifier of the projectile.
        projectile: ProjectileId,
        /// Impact point.
        position: Vec3,
        /// Number of enemies damaged by the impact.
        enemies_hit: u32,
    },
    /// Reports that a projectile vanished without hitting anything.
    ProjectileFizzled {
        /// Identifier of the projectile.
        projectile: ProjectileId,
    },
    /// Confirms that a tower gained a level.
    TowerLeveledUp {
        /// Tower that levelled up.
        tower: TowerId,
        /// Level reached.
        level: u32,
    },
    /// Confirms that a tower reached a new tier.
    TowerTierUpgraded {
        /// Tower that was upgraded.
        tower: TowerId,
        /// Tier reached.
        tier: u32,
    },
    /// Confirms that a tower's damage profiles changed.
    DamageProfileUpgraded {
        /// Tower that was upgraded.
        tower: TowerId,
        /// Damage type that was added or strengthened.
        damage_type: DamageTypeId,
    },
    /// Confirms that a tower's targeting policy changed.
    TargetPolicyChanged {
        /// Tower that was updated.
        tower: TowerId,
        /// Policy now in effect.
        policy: TargetPolicy,
    },
    /// Confirms that a card resolved and its cost was paid.
    CardPlayed {
        /// Card that was played.
        card: CardId,
        /// Essence left after paying.
        essence: u32,
    },
    /// Reports that a card could not be played; no essence was spent.
    CardRejected {
        /// Card that was requested.
        card: CardId,
        /// Why the card failed.
        reason: CardError,
    },
    /// Announces that the level ended.
    GameOver {
        /// Why the level ended.
        reason: GameOverReason,
    },
}

/// Unique identifier assigned to an enemy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnemyId(u32);

impl EnemyId {
    /// Creates a new enemy identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a tower.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TowerId(u32);

impl TowerId {
    /// Creates a new tower identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the tower identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to an in-flight projectile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectileId(u32);

impl ProjectileId {
    /// Creates a new projectile identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of an enemy type in the level's enemy table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnemyTypeId(u32);

impl EnemyTypeId {
    /// Creates a new enemy type identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of a tower kind in the level's tower table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TowerKindId(u32);

impl TowerKindId {
    /// Creates a new tower kind identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of a card in the level's card list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(u32);

impl CardId {
    /// Creates a new card identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Returns the cell displaced by the provided offsets, if it stays non-negative.
    #[must_use]
    pub fn offset(self, columns: i32, rows: i32) -> Option<CellCoord> {
        Some(Self::new(
            self.column.checked_add_signed(columns)?,
            self.row.checked_add_signed(rows)?,
        ))
    }
}

/// Reasons a tower placement request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum PlacementError {
    /// The level ended, so placement is disabled.
    #[error("the level has ended")]
    Inactive,
    /// The requested cell lies outside the grid.
    #[error("cell lies outside the grid")]
    OutOfBounds,
    /// The requested cell cannot host towers.
    #[error("cell is not buildable")]
    NotBuildable,
    /// The requested cell already hosts a tower.
    #[error("cell already hosts a tower")]
    Occupied,
    /// The requested tower kind has no definition.
    #[error("unknown tower kind")]
    UnknownTowerKind,
}

/// Reasons a tower removal request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum RemovalError {
    /// The level ended, so removal is disabled.
    #[error("the level has ended")]
    Inactive,
    /// No tower with the provided identifier exists.
    #[error("no such tower")]
    MissingTower,
}

/// Reasons a tower upgrade is rejected. Rejected upgrades never change state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum UpgradeError {
    /// No tower with the provided identifier exists.
    #[error("no such tower")]
    MissingTower,
    /// The damage type is not declared by the level.
    #[error("damage type {0:?} is not declared")]
    UnknownDamageType(DamageTypeId),
    /// The tower kind does not accept the damage type.
    #[error("tower does not accept damage type {0:?}")]
    DamageTypeNotAccepted(DamageTypeId),
    /// A delta was merged into a profile of another damage type.
    #[error("expected damage type {expected:?}, found {actual:?}")]
    DamageTypeMismatch {
        /// Type of the profile being upgraded.
        expected: DamageTypeId,
        /// Type carried by the delta.
        actual: DamageTypeId,
    },
    /// Every damage slot of the current tier is taken.
    #[error("all {tier} damage slots are in use")]
    SlotsFull {
        /// Current tier, which is also the slot count.
        tier: u32,
    },
    /// The requested tier does not directly follow the current one.
    #[error("tier {requested} does not follow tier {current}")]
    TierOutOfSequence {
        /// Tier the tower has.
        current: u32,
        /// Tier the card offers.
        requested: u32,
    },
    /// The tower already has its highest tier.
    #[error("tower is already at its maximum tier {max}")]
    MaxTierReached {
        /// Highest tier of the tower kind.
        max: u32,
    },
}

/// Reasons a card cannot be played. A rejected card costs nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum CardError {
    /// The level ended, so cards are disabled.
    #[error("the level has ended")]
    Inactive,
    /// The card has no definition.
    #[error("unknown card")]
    UnknownCard,
    /// The player cannot pay for the card.
    #[error("card costs {cost} essence but only {available} is available")]
    InsufficientEssence {
        /// Essence the card costs.
        cost: u32,
        /// Essence the player has.
        available: u32,
    },
    /// The target kind does not match the card effect.
    #[error("card cannot be played on this target")]
    InvalidTarget,
    /// The build effect failed.
    #[error("placement failed: {0}")]
    Placement(PlacementError),
    /// The upgrade effect failed.
    #[error("upgrade failed: {0}")]
    Upgrade(UpgradeError),
}

/// Reasons an enemy spawn request is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum SpawnError {
    /// The level ended, so spawning is disabled.
    #[error("the level has ended")]
    Inactive,
    /// The enemy type has no definition.
    #[error("unknown enemy type")]
    UnknownEnemyType,
}

/// Reasons a `FireShot` command is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum ShotError {
    /// The level ended, so firing is disabled.
    #[error("the level has ended")]
    Inactive,
    /// No tower with the provided identifier exists.
    #[error("no such tower")]
    MissingTower,
    /// The target is no longer alive.
    #[error("target is not alive")]
    MissingTarget,
    /// The tower has no released shot waiting for a target.
    #[error("tower has no shot ready")]
    NoShotPending,
}

/// Immutable representation of a single enemy used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnemySnapshot {
    /// Unique identifier assigned to the enemy.
    pub id: EnemyId,
    /// Type of the enemy.
    pub enemy_type: EnemyTypeId,
    /// World position of the enemy.
    pub position: Vec3,
    /// Current health.
    pub health: f32,
    /// Maximum health after difficulty scaling.
    pub max_health: f32,
    /// Index of the waypoint the enemy is walking toward.
    pub waypoint_index: usize,
}

/// Read-only snapshot describing all live enemies in registry order.
#[derive(Clone, Debug, Default)]
pub struct EnemyView {
    snapshots: Vec<EnemySnapshot>,
}

impl EnemyView {
    /// Creates a new enemy view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<EnemySnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured enemy snapshots in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &EnemySnapshot> {
        self.snapshots.iter()
    }

    /// Looks up the snapshot of a single enemy.
    #[must_use]
    pub fn get(&self, id: EnemyId) -> Option<&EnemySnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Number of live enemies captured.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether no enemies were captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<EnemySnapshot> {
        self.snapshots
    }
}

/// Immutable representation of a single tower used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct TowerSnapshot {
    /// Identifier allocated to the tower by the world.
    pub id: TowerId,
    /// Kind of tower that was constructed.
    pub kind: TowerKindId,
    /// Cell hosting the tower.
    pub cell: CellCoord,
    /// World position of the tower.
    pub position: Vec3,
    /// Current one-based tier.
    pub tier: u32,
    /// Current level within the tier.
    pub level: u32,
    /// Experience accumulated toward the next level.
    pub xp: f32,
    /// Targeting radius.
    pub range: f32,
    /// Targeting policy.
    pub policy: TargetPolicy,
    /// Phase of the fire cycle.
    pub fire_state: FireState,
    /// Cooldown left before the tower is ready again.
    pub cooldown_remaining: Duration,
    /// Impact radius of area-effect towers.
    pub area_radius: Option<f32>,
    /// Damage profiles in slot order.
    pub profiles: Vec<DamageProfile>,
}

/// Read-only snapshot describing all towers in identifier order.
#[derive(Clone, Debug, Default)]
pub struct TowerView {
    snapshots: Vec<TowerSnapshot>,
}

impl TowerView {
    /// Creates a new tower view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<TowerSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured tower snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &TowerSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up the snapshot of a single tower.
    #[must_use]
    pub fn get(&self, id: TowerId) -> Option<&TowerSnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<TowerSnapshot> {
        self.snapshots
    }
}

/// Target chosen for a released shot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TowerTarget {
    /// Tower releasing the shot.
    pub tower: TowerId,
    /// Enemy selected as the target.
    pub enemy: EnemyId,
    /// World position of the tower.
    pub tower_position: Vec3,
    /// World position of the enemy when it was selected.
    pub enemy_position: Vec3,
}
