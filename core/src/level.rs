//! Immutable level data handed to the simulation at initialization.

use std::{collections::HashSet, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    damage::{DamageProfile, DamageProfileDelta, DamageTypeDefinition, DamageTypeId},
    layout::{LayoutError, LevelLayout},
    CardId, EnemyTypeId, TargetPolicy, TowerKindId,
};

/// Default factor applied to the difficulty multiplier after every wave loop.
pub const DEFAULT_DIFFICULTY_GROWTH: f32 = 1.6;
/// Default number of wave loops after which the director forces a game over.
pub const DEFAULT_LOOP_CEILING: u32 = 10_000;
/// Default distance from the core inside which an enemy counts as arrived.
pub const DEFAULT_CORE_RADIUS: f32 = 0.5;

/// Highest tier fire rate a level may declare, in shots per round.
pub const MAX_FIRE_RATE: f32 = 100.0;

const DIFFICULTY_SPEED_SCALING: f32 = 0.1;
const MIN_SPEED_SCALE: f32 = 0.1;

/// Stat scaling applied to enemies spawned during a wave loop.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Difficulty(f32);

impl Difficulty {
    /// Difficulty of the first loop.
    pub const BASE: Self = Self(1.0);
    /// Largest multiplier a loop can reach.
    pub const MAX: Self = Self(f32::MAX);

    /// Creates a difficulty from a raw multiplier. Invalid values fall back to the base.
    #[must_use]
    pub fn new(multiplier: f32) -> Self {
        if multiplier.is_finite() && multiplier > 0.0 {
            Self(multiplier)
        } else {
            Self::BASE
        }
    }

    /// Raw multiplier.
    #[must_use]
    pub const fn multiplier(self) -> f32 {
        self.0
    }

    /// Factor applied to an enemy's maximum health.
    #[must_use]
    pub const fn health_scale(self) -> f32 {
        self.0
    }

    /// Factor applied to an enemy's movement speed.
    #[must_use]
    pub fn speed_scale(self) -> f32 {
        (1.0 + (self.0 - 1.0) * DIFFICULTY_SPEED_SCALING).max(MIN_SPEED_SCALE)
    }

    /// Difficulty of the following loop, saturating at [`Difficulty::MAX`].
    #[must_use]
    pub fn escalate(self, growth_factor: f32) -> Self {
        let next = self.0 * growth_factor;
        if next.is_nan() || next <= 0.0 {
            self
        } else {
            Self(next.min(Self::MAX.0))
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::BASE
    }
}

/// Stat table entry for a single enemy type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyDefinition {
    /// Identifier referenced by waves.
    pub id: EnemyTypeId,
    /// Display name.
    pub name: String,
    /// Health at difficulty 1.0.
    pub max_health: f32,
    /// Flat reduction applied to every direct hit.
    #[serde(default)]
    pub armor: f32,
    /// Movement speed in world units per second.
    pub speed: f32,
    /// Player HP removed when the enemy reaches the core.
    pub core_damage: u32,
    /// Essence granted to the player when the enemy is destroyed.
    #[serde(default)]
    pub essence_reward: u32,
}

/// Stat growth unlocked by reaching the next level within a tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelStep {
    /// Experience needed to reach this level from the previous one.
    pub xp_required: f32,
    /// Direct damage added to every damage profile.
    #[serde(default)]
    pub damage: f32,
    /// Range added to the tower.
    #[serde(default)]
    pub range: f32,
    /// Shots per second added to the tower.
    #[serde(default)]
    pub fire_rate: f32,
    /// Seconds added to the cooldown between rounds; negative values shorten it.
    #[serde(default)]
    pub fire_cooldown: f32,
}

/// Base stats of one tower tier together with its level table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TierModel {
    /// Targeting radius in world units.
    pub range: f32,
    /// Shots per firing round, also shots per second while firing.
    pub fire_rate: f32,
    /// Seconds between firing rounds.
    pub fire_cooldown: f32,
    /// Projectile speed in world units per second; zero resolves hits instantly.
    #[serde(default)]
    pub projectile_speed: f32,
    /// Impact radius for area-effect towers.
    #[serde(default)]
    pub area_radius: Option<f32>,
    /// Level table, indexed by the level being reached minus one.
    #[serde(default)]
    pub levels: Vec<LevelStep>,
}

impl TierModel {
    /// Reports whether the tier can fire: finite non-negative range and
    /// cooldown, a fire rate in `(0, MAX_FIRE_RATE]` and finite level steps.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        let steps_finite = self.levels.iter().all(|step| {
            [step.xp_required, step.damage, step.range, step.fire_rate, step.fire_cooldown]
                .iter()
                .all(|value| value.is_finite())
        });
        self.range.is_finite()
            && self.range >= 0.0
            && self.fire_rate > 0.0
            && self.fire_rate <= MAX_FIRE_RATE
            && self.fire_cooldown.is_finite()
            && self.fire_cooldown >= 0.0
            && steps_finite
    }
}

/// Stat table entry for a single tower kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TowerDefinition {
    /// Identifier referenced by cards and placement commands.
    pub kind: TowerKindId,
    /// Display name.
    pub name: String,
    /// Damage profile every newly built tower starts with.
    pub base_damage: DamageProfile,
    /// Tier models, tier 1 first.
    pub tiers: Vec<TierModel>,
    /// Damage types upgrades may add; empty accepts every declared type.
    #[serde(default)]
    pub accepted_damage_types: Vec<DamageTypeId>,
    /// Targeting policy applied to newly built towers.
    #[serde(default)]
    pub policy: TargetPolicy,
}

impl TowerDefinition {
    /// Highest tier the tower can reach. Tiers are counted from one.
    #[must_use]
    pub fn max_tier(&self) -> u32 {
        u32::try_from(self.tiers.len()).unwrap_or(u32::MAX)
    }

    /// Returns the model for the provided one-based tier.
    #[must_use]
    pub fn tier_model(&self, tier: u32) -> Option<&TierModel> {
        let index = usize::try_from(tier.checked_sub(1)?).ok()?;
        self.tiers.get(index)
    }

    /// Reports whether upgrades of the provided damage type may be applied.
    #[must_use]
    pub fn accepts(&self, damage_type: DamageTypeId) -> bool {
        self.accepted_damage_types.is_empty()
            || damage_type == self.base_damage.damage_type
            || self.accepted_damage_types.contains(&damage_type)
    }
}

/// A single batch of enemies released by the wave director.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveSpec {
    /// Seconds to wait after the previous wave clears before spawning.
    #[serde(default)]
    pub wait_before_start: f32,
    /// Enemy type released by the wave.
    pub enemy_type: EnemyTypeId,
    /// Number of enemies released.
    pub count: u32,
    /// Seconds between two consecutive spawns.
    pub spawn_interval: f32,
}

impl WaveSpec {
    /// Delay before the first spawn.
    #[must_use]
    pub fn wait_duration(&self) -> Duration {
        seconds(self.wait_before_start)
    }

    /// Delay between consecutive spawns.
    #[must_use]
    pub fn interval_duration(&self) -> Duration {
        seconds(self.spawn_interval)
    }
}

/// Ordered wave list plus the tunables of the wave director.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveSchedule {
    /// Seconds the director waits before announcing the first wave.
    #[serde(default)]
    pub initial_delay: f32,
    /// Waves released in order during every loop.
    pub waves: Vec<WaveSpec>,
    /// Factor applied to the difficulty after each completed loop.
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f32,
    /// Number of completed loops that forces a game over.
    #[serde(default = "default_loop_ceiling")]
    pub loop_ceiling: u32,
}

impl WaveSchedule {
    /// Creates a schedule using the default growth factor and loop ceiling.
    #[must_use]
    pub fn new(initial_delay: f32, waves: Vec<WaveSpec>) -> Self {
        Self {
            initial_delay,
            waves,
            growth_factor: DEFAULT_DIFFICULTY_GROWTH,
            loop_ceiling: DEFAULT_LOOP_CEILING,
        }
    }

    /// Delay before the first wave is announced.
    #[must_use]
    pub fn initial_delay_duration(&self) -> Duration {
        seconds(self.initial_delay)
    }
}

fn default_growth_factor() -> f32 {
    DEFAULT_DIFFICULTY_GROWTH
}

fn default_loop_ceiling() -> u32 {
    DEFAULT_LOOP_CEILING
}

fn default_core_radius() -> f32 {
    DEFAULT_CORE_RADIUS
}

/// Starting values of the player economy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Maximum and starting player HP.
    pub max_hp: u32,
    /// Essence available at the start of the level.
    pub starting_essence: u32,
}

/// Effect applied when a card is played.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum CardEffect {
    /// Builds a tower of the given kind on the targeted cell.
    BuildTower {
        /// Kind of tower to build.
        kind: TowerKindId,
    },
    /// Raises the targeted tower to the given one-based tier.
    UpgradeTier {
        /// Tier the tower reaches when the card resolves.
        tier: u32,
    },
    /// Adds the delta onto the targeted tower's damage profiles.
    DamageUpgrade {
        /// Additive change applied to the matching profile.
        delta: DamageProfileDelta,
    },
}

/// Card the player can pay essence to play.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardDefinition {
    /// Identifier referenced by `PlayCard` commands.
    pub id: CardId,
    /// Display name.
    pub name: String,
    /// Essence spent when the card resolves successfully.
    pub cost: u32,
    /// Effect applied by the card.
    #[serde(flatten)]
    pub effect: CardEffect,
}

/// Everything the simulation needs to run a level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Grid layout and waypoint list.
    pub layout: LevelLayout,
    /// Enemy stat table.
    pub enemies: Vec<EnemyDefinition>,
    /// Tower stat table.
    pub towers: Vec<TowerDefinition>,
    /// Declared damage types.
    pub damage_types: Vec<DamageTypeDefinition>,
    /// Cards available to the player.
    #[serde(default)]
    pub cards: Vec<CardDefinition>,
    /// Wave list and director tunables.
    pub schedule: WaveSchedule,
    /// Starting player economy.
    pub economy: EconomyConfig,
    /// Distance from the core inside which an enemy counts as arrived.
    #[serde(default = "default_core_radius")]
    pub core_radius: f32,
}

impl LevelConfig {
    /// Looks up an enemy definition.
    #[must_use]
    pub fn enemy(&self, id: EnemyTypeId) -> Option<&EnemyDefinition> {
        self.enemies.iter().find(|definition| definition.id == id)
    }

    /// Looks up a tower definition.
    #[must_use]
    pub fn tower(&self, kind: TowerKindId) -> Option<&TowerDefinition> {
        self.towers.iter().find(|definition| definition.kind == kind)
    }

    /// Looks up a card definition.
    #[must_use]
    pub fn card(&self, id: CardId) -> Option<&CardDefinition> {
        self.cards.iter().find(|definition| definition.id == id)
    }

    /// Reports whether the damage type is declared by the level.
    #[must_use]
    pub fn has_damage_type(&self, id: DamageTypeId) -> bool {
        self.damage_types.iter().any(|definition| definition.id == id)
    }

    /// Checks that every cross reference resolves and stats are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        if !(self.layout.cell_size.is_finite() && self.layout.cell_size > 0.0) {
            return Err(ConfigError::InvalidCellSize);
        }
        if self.economy.max_hp == 0 {
            return Err(ConfigError::NoPlayerHp);
        }

        let mut damage_types = HashSet::new();
        for definition in &self.damage_types {
            if !damage_types.insert(definition.id) {
                return Err(ConfigError::DuplicateDamageType(definition.id));
            }
        }

        let mut enemies = HashSet::new();
        for definition in &self.enemies {
            if !enemies.insert(definition.id) {
                return Err(ConfigError::DuplicateEnemyType(definition.id));
            }
            let usable = definition.max_health.is_finite()
                && definition.max_health > 0.0
                && definition.speed.is_finite()
                && definition.speed >= 0.0
                && definition.armor >= 0.0;
            if !usable {
                return Err(ConfigError::InvalidEnemyStats(definition.id));
            }
        }

        let mut towers = HashSet::new();
        for definition in &self.towers {
            if !towers.insert(definition.kind) {
                return Err(ConfigError::DuplicateTowerKind(definition.kind));
            }
            if definition.tiers.is_empty() {
                return Err(ConfigError::TowerWithoutTiers(definition.kind));
            }
            if !definition.tiers.iter().all(TierModel::is_usable) {
                return Err(ConfigError::InvalidTowerStats(definition.kind));
            }
            if !damage_types.contains(&definition.base_damage.damage_type) {
                return Err(ConfigError::UnknownDamageType(
                    definition.base_damage.damage_type,
                ));
            }
            if let Some(unknown) = definition
                .accepted_damage_types
                .iter()
                .find(|id| !damage_types.contains(id))
            {
                return Err(ConfigError::UnknownDamageType(*unknown));
            }
        }

        for (index, wave) in self.schedule.waves.iter().enumerate() {
            if !enemies.contains(&wave.enemy_type) {
                return Err(ConfigError::UnknownEnemyType {
                    wave: index,
                    enemy_type: wave.enemy_type,
                });
            }
        }

        let mut cards = HashSet::new();
        for card in &self.cards {
            if !cards.insert(card.id) {
                return Err(ConfigError::DuplicateCard(card.id));
            }
            match card.effect {
                CardEffect::BuildTower { kind } if !towers.contains(&kind) => {
                    return Err(ConfigError::UnknownTowerKind {
                        card: card.id,
                        kind,
                    });
                }
                CardEffect::DamageUpgrade { delta }
                    if !damage_types.contains(&delta.damage_type) =>
                {
                    return Err(ConfigError::UnknownDamageType(delta.damage_type));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Reasons level data is rejected at load time.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ConfigError {
    /// The layout is malformed.
    #[error("invalid layout: {0}")]
    Layout(#[from] LayoutError),
    /// Two enemy definitions share an identifier.
    #[error("enemy type {0:?} is defined twice")]
    DuplicateEnemyType(EnemyTypeId),
    /// Two tower definitions share an identifier.
    #[error("tower kind {0:?} is defined twice")]
    DuplicateTowerKind(TowerKindId),
    /// Two cards share an identifier.
    #[error("card {0:?} is defined twice")]
    DuplicateCard(CardId),
    /// Two damage type declarations share an identifier.
    #[error("damage type {0:?} is declared twice")]
    DuplicateDamageType(DamageTypeId),
    /// A wave references an enemy type without a definition.
    #[error("wave {wave} references unknown enemy type {enemy_type:?}")]
    UnknownEnemyType {
        /// Zero-based wave index.
        wave: usize,
        /// Missing enemy type.
        enemy_type: EnemyTypeId,
    },
    /// A card references a tower kind without a definition.
    #[error("card {card:?} references unknown tower kind {kind:?}")]
    UnknownTowerKind {
        /// Offending card.
        card: CardId,
        /// Missing tower kind.
        kind: TowerKindId,
    },
    /// A profile, upgrade or acceptance list references an undeclared damage type.
    #[error("damage type {0:?} is not declared")]
    UnknownDamageType(DamageTypeId),
    /// A tower kind has no tier models.
    #[error("tower kind {0:?} has no tiers")]
    TowerWithoutTiers(TowerKindId),
    /// An enemy definition carries unusable stats.
    #[error("enemy type {0:?} has invalid stats")]
    InvalidEnemyStats(EnemyTypeId),
    /// A tower tier carries unusable stats.
    #[error("tower kind {0:?} has invalid tier stats")]
    InvalidTowerStats(TowerKindId),
    /// The layout's cell size is not a positive finite number.
    #[error("cell size must be positive and finite")]
    InvalidCellSize,
    /// The player would start the level without HP.
    #[error("economy must grant the player at least one hp")]
    NoPlayerHp,
}

/// Converts authoring seconds into a duration, treating invalid input as zero.
#[must_use]
pub fn seconds(value: f32) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f32(value)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CellCoord;

    #[test]
    fn difficulty_escalates_by_growth_factor() {
        let next = Difficulty::BASE.escalate(DEFAULT_DIFFICULTY_GROWTH);
        assert!((next.multiplier() - 1.6).abs() < 1e-6);
        assert!((next.health_scale() - 1.6).abs() < 1e-6);
        assert!(next.speed_scale() > 1.0);
    }

    #[test]
    fn difficulty_saturates_instead_of_resetting() {
        let mut difficulty = Difficulty::BASE;
        for _ in 0..DEFAULT_LOOP_CEILING {
            let next = difficulty.escalate(DEFAULT_DIFFICULTY_GROWTH);
            assert!(next.multiplier() >= difficulty.multiplier());
            assert!(next.multiplier().is_finite());
            difficulty = next;
        }
        assert_eq!(difficulty, Difficulty::MAX);
        assert_eq!(difficulty.escalate(f32::NAN), difficulty);
    }

    #[test]
    fn invalid_difficulty_falls_back_to_base() {
        assert_eq!(Difficulty::new(f32::NAN), Difficulty::BASE);
        assert_eq!(Difficulty::new(-2.0), Difficulty::BASE);
    }

    #[test]
    fn tiers_are_counted_from_one() {
        let model = TierModel {
            range: 3.0,
            fire_rate: 1.0,
            fire_cooldown: 1.0,
            projectile_speed: 0.0,
            area_radius: None,
            levels: Vec::new(),
        };
        let definition = TowerDefinition {
            kind: TowerKindId::new(1),
            name: "Arrow".to_owned(),
            base_damage: DamageProfile::direct(DamageTypeId::new(0), 1.0),
            tiers: vec![model.clone(), model],
            accepted_damage_types: vec![DamageTypeId::new(3)],
            policy: TargetPolicy::Closest,
        };

        assert_eq!(definition.max_tier(), 2);
        assert!(definition.tier_model(0).is_none());
        assert!(definition.tier_model(1).is_some());
        assert!(definition.tier_model(3).is_none());
        assert!(definition.accepts(DamageTypeId::new(0)));
        assert!(definition.accepts(DamageTypeId::new(3)));
        assert!(!definition.accepts(DamageTypeId::new(4)));
    }

    fn level() -> LevelConfig {
        let arcane = DamageTypeId::new(0);
        let grunt = EnemyTypeId::new(0);
        LevelConfig {
            layout: LevelLayout::parse("S.C", 1.0, vec![CellCoord::new(2, 0)])
                .expect("layout parses"),
            enemies: vec![EnemyDefinition {
                id: grunt,
                name: "Grunt".to_owned(),
                max_health: 10.0,
                armor: 0.0,
                speed: 1.0,
                core_damage: 1,
                essence_reward: 1,
            }],
            towers: vec![TowerDefinition {
                kind: TowerKindId::new(0),
                name: "Spire".to_owned(),
                base_damage: DamageProfile::direct(arcane, 1.0),
                tiers: vec![TierModel {
                    range: 2.0,
                    fire_rate: 2.0,
                    fire_cooldown: 1.0,
                    projectile_speed: 0.0,
                    area_radius: None,
                    levels: Vec::new(),
                }],
                accepted_damage_types: Vec::new(),
                policy: TargetPolicy::Closest,
            }],
            damage_types: vec![DamageTypeDefinition {
                id: arcane,
                name: "Arcane".to_owned(),
            }],
            cards: Vec::new(),
            schedule: WaveSchedule::new(
                0.0,
                vec![WaveSpec {
                    wait_before_start: 0.0,
                    enemy_type: grunt,
                    count: 1,
                    spawn_interval: 1.0,
                }],
            ),
            economy: EconomyConfig {
                max_hp: 5,
                starting_essence: 0,
            },
            core_radius: DEFAULT_CORE_RADIUS,
        }
    }

    #[test]
    fn unusable_cell_sizes_are_rejected() {
        assert_eq!(level().validate(), Ok(()));

        for cell_size in [0.0, -1.0, f32::INFINITY, f32::NAN] {
            let mut config = level();
            config.layout.cell_size = cell_size;
            assert_eq!(
                config.validate(),
                Err(ConfigError::InvalidCellSize),
                "cell size {cell_size}"
            );
        }
    }

    #[test]
    fn player_needs_hp_to_start() {
        let mut config = level();
        config.economy.max_hp = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoPlayerHp));
    }

    #[test]
    fn fire_rate_must_stay_within_bounds() {
        let kind = TowerKindId::new(0);
        for fire_rate in [0.0, MAX_FIRE_RATE + 1.0, f32::INFINITY, f32::NAN] {
            let mut config = level();
            config.towers[0].tiers[0].fire_rate = fire_rate;
            assert_eq!(
                config.validate(),
                Err(ConfigError::InvalidTowerStats(kind)),
                "fire rate {fire_rate}"
            );
        }

        let mut config = level();
        config.towers[0].tiers[0].fire_rate = MAX_FIRE_RATE;
        assert_eq!(config.validate(), Ok(()));

        let mut config = level();
        config.towers[0].tiers[0].fire_cooldown = f32::INFINITY;
        assert_eq!(config.validate(), Err(ConfigError::InvalidTowerStats(kind)));
    }

    #[test]
    fn negative_seconds_become_zero() {
        assert_eq!(seconds(-1.0), Duration::ZERO);
        assert_eq!(seconds(f32::INFINITY), Duration::ZERO);
        assert_eq!(seconds(0.5), Duration::from_millis(500));
    }
}
