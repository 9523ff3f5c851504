//! Homing projectiles travelling from towers to their targets.

use std::time::Duration;

use essence_defence_core::{DamageProfile, EnemyId, ProjectileId, TowerId, Vec3};

use crate::enemies::{EnemyRegistry, WAYPOINT_EPSILON};

/// Projectile carrying a frozen copy of its tower's damage profiles.
#[derive(Clone, Debug)]
pub(crate) struct Projectile {
    pub(crate) id: ProjectileId,
    pub(crate) tower: TowerId,
    pub(crate) target: EnemyId,
    pub(crate) position: Vec3,
    pub(crate) last_known: Vec3,
    pub(crate) speed: f32,
    pub(crate) profiles: Vec<DamageProfile>,
    pub(crate) area_radius: Option<f32>,
}

/// Result of moving a projectile for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flight {
    InFlight,
    /// Reached its target, or the last known point for area projectiles.
    Arrived,
    /// Lost its target and vanishes without effect.
    Lost,
}

impl Projectile {
    fn step(&mut self, dt: Duration, enemies: &EnemyRegistry) -> Flight {
        let target_alive = match enemies.get(self.target).filter(|enemy| enemy.is_alive()) {
            Some(enemy) => {
                self.last_known = enemy.position;
                true
            }
            None => false,
        };

        if !target_alive && self.area_radius.is_none() {
            return Flight::Lost;
        }

        let travel = self.speed * dt.as_secs_f32();
        let offset = self.last_known - self.position;
        let distance = offset.length();
        if distance <= travel + WAYPOINT_EPSILON {
            self.position = self.last_known;
            return Flight::Arrived;
        }

        self.position += offset / distance * travel;
        Flight::InFlight
    }
}

/// Projectile that finished its flight this tick.
#[derive(Clone, Debug)]
pub(crate) struct Landing {
    pub(crate) projectile: Projectile,
    pub(crate) flight: Flight,
}

/// Arena of in-flight projectiles in launch order.
#[derive(Debug, Default)]
pub(crate) struct ProjectileArena {
    entries: Vec<Projectile>,
    next_projectile_id: u32,
}

impl ProjectileArena {
    /// Launches a projectile from `origin` toward the target's current position.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn launch(
        &mut self,
        tower: TowerId,
        target: EnemyId,
        origin: Vec3,
        target_position: Vec3,
        speed: f32,
        profiles: Vec<DamageProfile>,
        area_radius: Option<f32>,
    ) -> ProjectileId {
        let id = ProjectileId::new(self.next_projectile_id);
        self.next_projectile_id = self.next_projectile_id.saturating_add(1);
        self.entries.push(Projectile {
            id,
            tower,
            target,
            position: origin,
            last_known: target_position,
            speed,
            profiles,
            area_radius,
        });
        id
    }

    /// Moves every projectile and returns those whose flight ended.
    pub(crate) fn advance(&mut self, dt: Duration, enemies: &EnemyRegistry) -> Vec<Landing> {
        let mut landed = Vec::new();
        let mut flying = Vec::with_capacity(self.entries.len());
        for mut projectile in self.entries.drain(..) {
            match projectile.step(dt, enemies) {
                Flight::InFlight => flying.push(projectile),
                flight => landed.push(Landing { projectile, flight }),
            }
        }
        self.entries = flying;
        landed
    }

    /// Cancels every projectile launched by the tower.
    pub(crate) fn cancel_from(&mut self, tower: TowerId) -> Vec<ProjectileId> {
        let mut cancelled = Vec::new();
        self.entries.retain(|projectile| {
            if projectile.tower == tower {
                cancelled.push(projectile.id);
                false
            } else {
                true
            }
        });
        cancelled
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
