#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Essence Defence.
//!
//! The world owns the grid, the enemy and tower registries, projectiles and
//! the player economy. It is mutated exclusively through [`apply`]; everything
//! else reads it through [`query`].

mod combat;
pub mod economy;
mod enemies;
pub mod grid;
mod projectiles;
mod towers;

use std::{sync::Arc, time::Duration};

use essence_defence_core::{
    CardEffect, CardError, CardId, CardTarget, CellCoord, Command, ConfigError,
    DamageProfileDelta, Difficulty, EnemyId, EnemyTypeId, Event, GameOverReason, GameState,
    LevelConfig, PlacementError, RemovalError, ShotError, SpawnError, TargetPolicy, TowerId,
    TowerKindId, UpgradeError, Vec3,
};
use log::{debug, error, info, warn};

use crate::{
    combat::{collect_dead, resolve_area_attack, resolve_attack, resolve_core_reach},
    economy::PlayerEconomy,
    enemies::{Enemy, EnemyRegistry, MoveOutcome},
    grid::GridModel,
    projectiles::{Flight, ProjectileArena},
    towers::{Tower, TowerRegistry},
};

/// Represents the authoritative simulation state of one level.
#[derive(Debug)]
pub struct World {
    level: LevelConfig,
    grid: GridModel,
    enemies: EnemyRegistry,
    towers: TowerRegistry,
    projectiles: ProjectileArena,
    economy: PlayerEconomy,
    state: GameState,
    waypoints: Arc<[Vec3]>,
    spawn_points: Vec<Vec3>,
    next_spawn: usize,
    core_position: Vec3,
    tick_index: u64,
}

impl World {
    /// Creates a running world for the provided level.
    ///
    /// Level data is validated once here; a broken cross reference is a hard
    /// configuration error.
    pub fn new(level: LevelConfig) -> Result<Self, ConfigError> {
        level.validate()?;

        let grid = GridModel::from_layout(&level.layout);
        let waypoints: Arc<[Vec3]> = level
            .layout
            .waypoints
            .iter()
            .filter_map(|cell| grid.center_of(*cell))
            .collect();
        let spawn_points: Vec<Vec3> = grid.spawn_cells().map(|cell| cell.position()).collect();
        let core_position = grid
            .target_cells()
            .next()
            .map(|cell| cell.position())
            .or_else(|| waypoints.last().copied())
            .unwrap_or(level.layout.origin);

        if let Some(last) = waypoints.last() {
            if last.distance(core_position) > level.core_radius {
                warn!(
                    "final waypoint {:?} lies outside the core radius; enemies will strand",
                    last
                );
            }
        }

        info!(
            "level loaded: {}x{} grid, {} waypoints, {} waves",
            grid.columns(),
            grid.rows(),
            waypoints.len(),
            level.schedule.waves.len()
        );

        Ok(Self {
            economy: PlayerEconomy::new(level.economy),
            grid,
            enemies: EnemyRegistry::default(),
            towers: TowerRegistry::new(),
            projectiles: ProjectileArena::default(),
            state: GameState::Running,
            waypoints,
            spawn_points,
            next_spawn: 0,
            core_position,
            tick_index: 0,
            level,
        })
    }

    fn is_running(&self) -> bool {
        self.state == GameState::Running
    }

    fn tick(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        self.tick_index = self.tick_index.saturating_add(1);
        out_events.push(Event::TimeAdvanced { dt });

        self.move_enemies(dt, out_events);
        if self.economy.is_defeated() {
            self.end_game(GameOverReason::CoreDestroyed, out_events);
            return;
        }

        self.tick_damage_over_time(dt, out_events);
        self.advance_projectiles(dt, out_events);
        self.advance_fire_cycles(dt, out_events);
    }

    fn move_enemies(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let core = self.core_position;
        let core_radius = self.level.core_radius;
        let mut finished = Vec::new();
        for enemy in self.enemies.iter_mut() {
            match enemy.advance(dt, core, core_radius) {
                MoveOutcome::Moving => {}
                outcome => finished.push((enemy.id, outcome)),
            }
        }

        for (id, outcome) in finished {
            let Some(enemy) = self.enemies.remove(id) else {
                continue;
            };
            if outcome == MoveOutcome::ReachedCore {
                resolve_core_reach(enemy, &mut self.economy, out_events);
            } else {
                error!(
                    "enemy {} ran out of waypoints at {:?} away from the core",
                    id.get(),
                    enemy.position
                );
                out_events.push(Event::EnemyStranded {
                    enemy: id,
                    position: enemy.position,
                });
            }
        }
    }

    fn tick_damage_over_time(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let mut credits = Vec::new();
        for enemy in self.enemies.iter_mut() {
            for hit in enemy.tick_effects(dt) {
                out_events.push(Event::EnemyDamaged {
                    enemy: enemy.id,
                    source: hit.source,
                    damage_type: hit.damage_type,
                    applied: hit.applied,
                    remaining: enemy.health,
                });
                if let Some(source) = hit.source {
                    credits.push((source, hit.applied));
                }
            }
        }

        for (tower, amount) in credits {
            self.credit_experience(tower, amount, out_events);
        }
        collect_dead(&mut self.enemies, &mut self.economy, out_events);
    }

    fn advance_projectiles(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        for landing in self.projectiles.advance(dt, &self.enemies) {
            let projectile = landing.projectile;
            if landing.flight == Flight::Lost {
                debug!("projectile {} lost its target", projectile.id.get());
                out_events.push(Event::ProjectileFizzled {
                    projectile: projectile.id,
                });
                continue;
            }

            let summary = match projectile.area_radius {
                Some(radius) => resolve_area_attack(
                    &mut self.enemies,
                    projectile.position,
                    radius,
                    &projectile.profiles,
                    Some(projectile.tower),
                    out_events,
                ),
                None => resolve_attack(
                    &mut self.enemies,
                    projectile.target,
                    &projectile.profiles,
                    Some(projectile.tower),
                    out_events,
                ),
            };
            out_events.push(Event::ProjectileImpact {
                projectile: projectile.id,
                position: projectile.position,
                enemies_hit: summary.enemies_hit,
            });
            self.credit_experience(projectile.tower, summary.damage_dealt, out_events);
        }
        collect_dead(&mut self.enemies, &mut self.economy, out_events);
    }

    fn advance_fire_cycles(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        for tower in self.towers.iter_mut() {
            let in_range = self.enemies.any_within(tower.position, tower.stats.range);
            let report = tower.tick(dt, in_range);
            if let Some(shots) = report.started {
                out_events.push(Event::FiringRoundStarted {
                    tower: tower.id,
                    shots,
                });
            }
            for _ in 0..report.released {
                out_events.push(Event::ShotReady { tower: tower.id });
            }
            if report.ended {
                out_events.push(Event::FiringRoundEnded { tower: tower.id });
            }
        }
    }

    fn spawn_enemy(
        &mut self,
        enemy_type: EnemyTypeId,
        difficulty: Difficulty,
        out_events: &mut Vec<Event>,
    ) {
        let Some(definition) = self.level.enemy(enemy_type) else {
            error!("spawn requested for unknown enemy type {}", enemy_type.get());
            out_events.push(Event::EnemySpawnRejected {
                enemy_type,
                reason: SpawnError::UnknownEnemyType,
            });
            return;
        };

        let position = if self.spawn_points.is_empty() {
            self.core_position
        } else {
            let position = self.spawn_points[self.next_spawn % self.spawn_points.len()];
            self.next_spawn = self.next_spawn.wrapping_add(1);
            position
        };

        let id = self.enemies.allocate_id();
        self.enemies.insert(Enemy::spawn(
            id,
            definition,
            difficulty,
            position,
            Arc::clone(&self.waypoints),
        ));
        out_events.push(Event::EnemySpawned {
            enemy: id,
            enemy_type,
            position,
        });
    }

    fn place_tower(
        &mut self,
        kind: TowerKindId,
        cell: CellCoord,
        out_events: &mut Vec<Event>,
    ) -> Result<TowerId, PlacementError> {
        let definition = self
            .level
            .tower(kind)
            .ok_or(PlacementError::UnknownTowerKind)?;
        let id = self.towers.peek_id();
        let position = self
            .grid
            .center_of(cell)
            .ok_or(PlacementError::OutOfBounds)?;
        let tower =
            Tower::build(id, definition, cell, position).ok_or(PlacementError::UnknownTowerKind)?;
        self.grid.set_occupant(cell, id)?;
        self.towers.insert(tower);

        info!(
            "tower {} of kind {} placed at ({}, {})",
            id.get(),
            kind.get(),
            cell.column(),
            cell.row()
        );
        out_events.push(Event::TowerPlaced {
            tower: id,
            kind,
            cell,
        });
        Ok(id)
    }

    fn remove_tower(
        &mut self,
        id: TowerId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), RemovalError> {
        let mut tower = self.towers.remove(id).ok_or(RemovalError::MissingTower)?;
        if tower.stop_firing() {
            out_events.push(Event::FiringRoundEnded { tower: id });
        }
        let _ = self.grid.clear_occupant(tower.cell);
        for projectile in self.projectiles.cancel_from(id) {
            out_events.push(Event::ProjectileFizzled { projectile });
        }

        info!("tower {} removed", id.get());
        out_events.push(Event::TowerRemoved {
            tower: id,
            cell: tower.cell,
        });
        Ok(())
    }

    fn fire_shot(
        &mut self,
        tower_id: TowerId,
        target: EnemyId,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ShotError> {
        let tower = self
            .towers
            .get_mut(tower_id)
            .ok_or(ShotError::MissingTower)?;
        let target_position = self
            .enemies
            .get(target)
            .filter(|enemy| enemy.is_alive())
            .map(|enemy| enemy.position)
            .ok_or(ShotError::MissingTarget)?;
        if !tower.take_shot() {
            return Err(ShotError::NoShotPending);
        }

        if tower.stats.projectile_speed > 0.0 {
            let projectile = self.projectiles.launch(
                tower_id,
                target,
                tower.position,
                target_position,
                tower.stats.projectile_speed,
                tower.profiles.clone(),
                tower.stats.area_radius,
            );
            debug!(
                "tower {} launched projectile {} at enemy {}",
                tower_id.get(),
                projectile.get(),
                target.get()
            );
            out_events.push(Event::ProjectileLaunched {
                projectile,
                tower: tower_id,
                target,
            });
            return Ok(());
        }

        debug!("tower {} fired at enemy {}", tower_id.get(), target.get());
        let profiles = tower.profiles.clone();
        let summary = match tower.stats.area_radius {
            Some(radius) => resolve_area_attack(
                &mut self.enemies,
                target_position,
                radius,
                &profiles,
                Some(tower_id),
                out_events,
            ),
            None => resolve_attack(
                &mut self.enemies,
                target,
                &profiles,
                Some(tower_id),
                out_events,
            ),
        };
        self.credit_experience(tower_id, summary.damage_dealt, out_events);
        collect_dead(&mut self.enemies, &mut self.economy, out_events);
        Ok(())
    }

    fn credit_experience(&mut self, tower_id: TowerId, amount: f32, out_events: &mut Vec<Event>) {
        let Some(tower) = self.towers.get_mut(tower_id) else {
            return;
        };
        let Some(definition) = self.level.tower(tower.kind) else {
            return;
        };
        for level in tower.gain_xp(amount, definition) {
            info!("tower {} reached level {}", tower_id.get(), level);
            out_events.push(Event::TowerLeveledUp {
                tower: tower_id,
                level,
            });
        }
    }

    fn set_target_policy(
        &mut self,
        tower_id: TowerId,
        policy: TargetPolicy,
        out_events: &mut Vec<Event>,
    ) {
        match self.towers.get_mut(tower_id) {
            Some(tower) => {
                tower.policy = policy;
                out_events.push(Event::TargetPolicyChanged {
                    tower: tower_id,
                    policy,
                });
            }
            None => error!("target policy change for missing tower {}", tower_id.get()),
        }
    }

    fn play_card(
        &mut self,
        card: CardId,
        target: CardTarget,
        out_events: &mut Vec<Event>,
    ) -> Result<(), CardError> {
        let definition = self.level.card(card).ok_or(CardError::UnknownCard)?;
        let cost = definition.cost;
        let effect = definition.effect;
        self.economy.can_afford(cost)?;

        match (effect, target) {
            (CardEffect::BuildTower { kind }, CardTarget::Cell(cell)) => {
                let _ = self
                    .place_tower(kind, cell, out_events)
                    .map_err(CardError::Placement)?;
            }
            (CardEffect::UpgradeTier { tier }, CardTarget::Tower(tower)) => {
                self.upgrade_tier(tower, tier, out_events)
                    .map_err(CardError::Upgrade)?;
            }
            (CardEffect::DamageUpgrade { delta }, CardTarget::Tower(tower)) => {
                self.upgrade_damage(tower, &delta, out_events)
                    .map_err(CardError::Upgrade)?;
            }
            _ => return Err(CardError::InvalidTarget),
        }

        self.economy.spend(cost)?;
        out_events.push(Event::CardPlayed {
            card,
            essence: self.economy.essence(),
        });
        out_events.push(Event::EssenceChanged {
            essence: self.economy.essence(),
        });
        Ok(())
    }

    fn upgrade_tier(
        &mut self,
        tower_id: TowerId,
        tier: u32,
        out_events: &mut Vec<Event>,
    ) -> Result<(), UpgradeError> {
        let tower = self
            .towers
            .get_mut(tower_id)
            .ok_or(UpgradeError::MissingTower)?;
        let definition = self
            .level
            .tower(tower.kind)
            .ok_or(UpgradeError::MissingTower)?;
        tower.upgrade_tier(tier, definition)?;

        info!("tower {} upgraded to tier {}", tower_id.get(), tier);
        out_events.push(Event::TowerTierUpgraded {
            tower: tower_id,
            tier,
        });
        Ok(())
    }

    fn upgrade_damage(
        &mut self,
        tower_id: TowerId,
        delta: &DamageProfileDelta,
        out_events: &mut Vec<Event>,
    ) -> Result<(), UpgradeError> {
        if !self.level.has_damage_type(delta.damage_type) {
            return Err(UpgradeError::UnknownDamageType(delta.damage_type));
        }
        let tower = self
            .towers
            .get_mut(tower_id)
            .ok_or(UpgradeError::MissingTower)?;
        let definition = self
            .level
            .tower(tower.kind)
            .ok_or(UpgradeError::MissingTower)?;
        if let Err(error) = tower.apply_upgrade(delta, definition) {
            warn!("upgrade of tower {} rejected: {}", tower_id.get(), error);
            return Err(error);
        }

        out_events.push(Event::DamageProfileUpgraded {
            tower: tower_id,
            damage_type: delta.damage_type,
        });
        Ok(())
    }

    fn end_game(&mut self, reason: GameOverReason, out_events: &mut Vec<Event>) {
        if !self.is_running() {
            return;
        }
        self.state = GameState::GameOver(reason);
        for tower in self.towers.iter_mut() {
            if tower.stop_firing() {
                out_events.push(Event::FiringRoundEnded { tower: tower.id });
            }
        }

        info!("game over after {} ticks: {:?}", self.tick_index, reason);
        out_events.push(Event::GameOver { reason });
    }

    fn reject_inactive(command: Command, out_events: &mut Vec<Event>) {
        match command {
            Command::SpawnEnemy { enemy_type, .. } => out_events.push(Event::EnemySpawnRejected {
                enemy_type,
                reason: SpawnError::Inactive,
            }),
            Command::PlaceTower { kind, cell } => out_events.push(Event::TowerPlacementRejected {
                kind,
                cell,
                reason: PlacementError::Inactive,
            }),
            Command::RemoveTower { tower } => out_events.push(Event::TowerRemovalRejected {
                tower,
                reason: RemovalError::Inactive,
            }),
            Command::FireShot { tower, target } => out_events.push(Event::ShotRejected {
                tower,
                target,
                reason: ShotError::Inactive,
            }),
            Command::PlayCard { card, .. } => out_events.push(Event::CardRejected {
                card,
                reason: CardError::Inactive,
            }),
            Command::Tick { .. } | Command::SetTargetPolicy { .. } | Command::EndGame { .. } => {}
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    if !world.is_running() {
        World::reject_inactive(command, out_events);
        return;
    }

    match command {
        Command::Tick { dt } => world.tick(dt, out_events),
        Command::SpawnEnemy {
            enemy_type,
            difficulty,
        } => world.spawn_enemy(enemy_type, difficulty, out_events),
        Command::PlaceTower { kind, cell } => {
            if let Err(reason) = world.place_tower(kind, cell, out_events) {
                debug!("placement of kind {} rejected: {}", kind.get(), reason);
                out_events.push(Event::TowerPlacementRejected { kind, cell, reason });
            }
        }
        Command::RemoveTower { tower } => {
            if let Err(reason) = world.remove_tower(tower, out_events) {
                error!("removal of tower {} rejected: {}", tower.get(), reason);
                out_events.push(Event::TowerRemovalRejected { tower, reason });
            }
        }
        Command::FireShot { tower, target } => {
            if let Err(reason) = world.fire_shot(tower, target, out_events) {
                debug!("shot of tower {} rejected: {}", tower.get(), reason);
                out_events.push(Event::ShotRejected {
                    tower,
                    target,
                    reason,
                });
            }
        }
        Command::SetTargetPolicy { tower, policy } => {
            world.set_target_policy(tower, policy, out_events);
        }
        Command::PlayCard { card, target } => {
            if let Err(reason) = world.play_card(card, target, out_events) {
                debug!("card {} rejected: {}", card.get(), reason);
                out_events.push(Event::CardRejected { card, reason });
            }
        }
        Command::EndGame { reason } => world.end_game(reason, out_events),
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use essence_defence_core::{
        CellCoord, EnemyView, GameState, LevelConfig, TowerId, TowerView, Vec3,
    };

    use super::World;
    use crate::{economy::PlayerEconomy, grid::GridModel};

    /// Provides read-only access to the level grid.
    #[must_use]
    pub fn grid(world: &World) -> &GridModel {
        &world.grid
    }

    /// Level data the world was created from.
    #[must_use]
    pub fn level(world: &World) -> &LevelConfig {
        &world.level
    }

    /// Captures a read-only view of the live enemies.
    #[must_use]
    pub fn enemy_view(world: &World) -> EnemyView {
        world.enemies.view()
    }

    /// Captures a read-only view of the placed towers.
    #[must_use]
    pub fn tower_view(world: &World) -> TowerView {
        world.towers.view()
    }

    /// Number of enemies currently in the level.
    #[must_use]
    pub fn live_enemy_count(world: &World) -> usize {
        world.enemies.len()
    }

    /// Player HP and essence.
    #[must_use]
    pub fn economy(world: &World) -> &PlayerEconomy {
        &world.economy
    }

    /// Whether the level is still running.
    #[must_use]
    pub fn game_state(world: &World) -> GameState {
        world.state
    }

    /// Tower standing on the provided cell, if any.
    #[must_use]
    pub fn tower_at(world: &World, cell: CellCoord) -> Option<TowerId> {
        world.towers.tower_at(cell)
    }

    /// World position of the core.
    #[must_use]
    pub fn core_position(world: &World) -> Vec3 {
        world.core_position
    }

    /// World positions of the waypoints enemies walk, in order.
    #[must_use]
    pub fn waypoints(world: &World) -> &[Vec3] {
        &world.waypoints
    }

    /// Number of projectiles in flight.
    #[must_use]
    pub fn projectile_count(world: &World) -> usize {
        world.projectiles.len()
    }

    /// Number of ticks processed so far.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }
}
