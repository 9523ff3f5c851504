//! Enemy agents and the registry that owns them.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use essence_defence_core::{
    level::seconds, DamageProfile, DamageTypeId, Difficulty, EnemyDefinition, EnemyId,
    EnemySnapshot, EnemyTypeId, EnemyView, TowerId, Vec3,
};

/// Distance under which an enemy counts as standing on a waypoint.
pub(crate) const WAYPOINT_EPSILON: f32 = 0.01;

const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Damage-over-time effect keyed by damage type on an enemy.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DotEffect {
    damage_type: DamageTypeId,
    source: Option<TowerId>,
    damage_per_tick: f32,
    interval: Duration,
    remaining: Duration,
    since_tick: Duration,
}

impl DotEffect {
    /// Builds the effect a profile registers on hit, if it carries one.
    pub(crate) fn from_profile(profile: &DamageProfile, source: Option<TowerId>) -> Option<Self> {
        if !profile.has_damage_over_time() {
            return None;
        }

        Some(Self {
            damage_type: profile.damage_type,
            source,
            damage_per_tick: profile.damage_over_time / profile.dot_tick_rate,
            interval: seconds(profile.dot_tick_rate.recip()).max(MIN_TICK_INTERVAL),
            remaining: seconds(profile.dot_duration),
            since_tick: Duration::ZERO,
        })
    }

    /// Same-type reapplication refreshes rather than stacks: the longer
    /// remaining lifetime and the stronger tick win, the tick phase is kept.
    fn refresh(&mut self, incoming: Self) {
        self.remaining = self.remaining.max(incoming.remaining);
        self.damage_per_tick = self.damage_per_tick.max(incoming.damage_per_tick);
        if incoming.source.is_some() {
            self.source = incoming.source;
        }
    }

    fn advance(&mut self, dt: Duration) -> u32 {
        let budget = dt.min(self.remaining);
        self.remaining -= budget;
        self.since_tick += budget;

        let mut ticks = 0;
        while self.since_tick >= self.interval {
            self.since_tick -= self.interval;
            ticks += 1;
        }
        ticks
    }

    fn expired(&self) -> bool {
        self.remaining.is_zero()
    }
}

/// Damage delivered by one effect during a tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct DotHit {
    pub(crate) damage_type: DamageTypeId,
    pub(crate) source: Option<TowerId>,
    pub(crate) applied: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct SlowEffect {
    multiplier: f32,
    remaining: Duration,
}

/// Result of an enemy's motion step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MoveOutcome {
    /// Still walking its path.
    Moving,
    /// Walked its last waypoint and stands at the core.
    ReachedCore,
    /// Ran out of waypoints away from the core.
    Stranded,
}

/// A live enemy walking the waypoint path.
#[derive(Clone, Debug)]
pub(crate) struct Enemy {
    pub(crate) id: EnemyId,
    pub(crate) enemy_type: EnemyTypeId,
    pub(crate) health: f32,
    pub(crate) max_health: f32,
    pub(crate) armor: f32,
    pub(crate) position: Vec3,
    pub(crate) waypoint_index: usize,
    waypoints: Arc<[Vec3]>,
    speed: f32,
    pub(crate) core_damage: u32,
    pub(crate) essence_reward: u32,
    dots: BTreeMap<DamageTypeId, DotEffect>,
    slow: Option<SlowEffect>,
    pub(crate) last_attacker: Option<TowerId>,
}

impl Enemy {
    /// Creates an enemy at a spawn point with stats scaled by the difficulty.
    pub(crate) fn spawn(
        id: EnemyId,
        definition: &EnemyDefinition,
        difficulty: Difficulty,
        position: Vec3,
        waypoints: Arc<[Vec3]>,
    ) -> Self {
        let max_health = (definition.max_health * difficulty.health_scale()).min(f32::MAX);
        Self {
            id,
            enemy_type: definition.id,
            health: max_health,
            max_health,
            armor: definition.armor,
            position,
            waypoint_index: 0,
            waypoints,
            speed: (definition.speed * difficulty.speed_scale()).min(f32::MAX),
            core_damage: definition.core_damage,
            essence_reward: definition.essence_reward,
            dots: BTreeMap::new(),
            slow: None,
            last_attacker: None,
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Removes up to `amount` health and returns what was actually removed.
    ///
    /// Health never leaves `[0, health]`; over-kill applies only the
    /// remaining health, and invalid amounts apply nothing.
    pub(crate) fn take_damage(&mut self, amount: f32) -> f32 {
        if !(amount > 0.0) || !self.is_alive() {
            return 0.0;
        }

        let applied = amount.min(self.health);
        self.health = (self.health - applied).max(0.0);
        applied
    }

    pub(crate) fn register_dot(&mut self, effect: DotEffect) {
        match self.dots.get_mut(&effect.damage_type) {
            Some(existing) => existing.refresh(effect),
            None => {
                let _ = self.dots.insert(effect.damage_type, effect);
            }
        }
    }

    /// Applies a slow. The strongest active slow wins; durations refresh.
    pub(crate) fn apply_slow(&mut self, multiplier: f32, duration: Duration) {
        let multiplier = multiplier.clamp(0.0, 1.0);
        self.slow = Some(match self.slow {
            Some(current) => SlowEffect {
                multiplier: current.multiplier.min(multiplier),
                remaining: current.remaining.max(duration),
            },
            None => SlowEffect {
                multiplier,
                remaining: duration,
            },
        });
    }

    pub(crate) fn current_speed(&self) -> f32 {
        let slow = self.slow.map_or(1.0, |slow| slow.multiplier);
        self.speed * slow
    }

    /// Walks toward the current waypoint, carrying leftover travel into the
    /// following waypoints.
    pub(crate) fn advance(&mut self, dt: Duration, core: Vec3, core_radius: f32) -> MoveOutcome {
        let mut travel = self.current_speed() * dt.as_secs_f32();
        self.tick_slow(dt);

        loop {
            let Some(waypoint) = self.waypoints.get(self.waypoint_index).copied() else {
                return if self.position.distance(core) <= core_radius + WAYPOINT_EPSILON {
                    MoveOutcome::ReachedCore
                } else {
                    MoveOutcome::Stranded
                };
            };

            let offset = waypoint - self.position;
            let distance = offset.length();
            if distance <= WAYPOINT_EPSILON {
                self.position = waypoint;
                self.waypoint_index += 1;
                continue;
            }

            if travel <= 0.0 {
                return MoveOutcome::Moving;
            }

            if travel >= distance {
                self.position = waypoint;
                self.waypoint_index += 1;
                travel -= distance;
                continue;
            }

            self.position += offset / distance * travel;
            return MoveOutcome::Moving;
        }
    }

    /// Advances every damage-over-time effect and applies due ticks.
    ///
    /// Effects of different types tick independently, so their damage stacks.
    pub(crate) fn tick_effects(&mut self, dt: Duration) -> Vec<DotHit> {
        let mut due = Vec::new();
        for effect in self.dots.values_mut() {
            let ticks = effect.advance(dt);
            if ticks > 0 {
                due.push((effect.damage_type, effect.source, effect.damage_per_tick, ticks));
            }
        }
        self.dots.retain(|_, effect| !effect.expired());

        let mut hits = Vec::with_capacity(due.len());
        for (damage_type, source, damage_per_tick, ticks) in due {
            let mut applied = 0.0;
            for _ in 0..ticks {
                applied += self.take_damage(damage_per_tick);
            }
            if applied > 0.0 {
                if source.is_some() {
                    self.last_attacker = source;
                }
                hits.push(DotHit {
                    damage_type,
                    source,
                    applied,
                });
            }
        }
        hits
    }

    pub(crate) fn snapshot(&self) -> EnemySnapshot {
        EnemySnapshot {
            id: self.id,
            enemy_type: self.enemy_type,
            position: self.position,
            health: self.health,
            max_health: self.max_health,
            waypoint_index: self.waypoint_index,
        }
    }

    fn tick_slow(&mut self, dt: Duration) {
        if let Some(slow) = &mut self.slow {
            slow.remaining = slow.remaining.saturating_sub(dt);
            if slow.remaining.is_zero() {
                self.slow = None;
            }
        }
    }
}

/// Registry of live enemies kept in spawn order.
#[derive(Debug, Default)]
pub(crate) struct EnemyRegistry {
    entries: Vec<Enemy>,
    next_enemy_id: u32,
}

impl EnemyRegistry {
    pub(crate) fn allocate_id(&mut self) -> EnemyId {
        let id = EnemyId::new(self.next_enemy_id);
        self.next_enemy_id = self.next_enemy_id.saturating_add(1);
        id
    }

    pub(crate) fn insert(&mut self, enemy: Enemy) {
        debug_assert!(self.entries.last().map_or(true, |last| last.id < enemy.id));
        self.entries.push(enemy);
    }

    pub(crate) fn get(&self, id: EnemyId) -> Option<&Enemy> {
        self.position(id).map(|index| &self.entries[index])
    }

    pub(crate) fn get_mut(&mut self, id: EnemyId) -> Option<&mut Enemy> {
        self.position(id).map(|index| &mut self.entries[index])
    }

    pub(crate) fn remove(&mut self, id: EnemyId) -> Option<Enemy> {
        self.position(id).map(|index| self.entries.remove(index))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Enemy> {
        self.entries.iter_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Identifiers of live enemies within `radius` of `point`, in registry order.
    pub(crate) fn ids_within(&self, point: Vec3, radius: f32) -> Vec<EnemyId> {
        self.entries
            .iter()
            .filter(|enemy| enemy.is_alive() && enemy.position.distance(point) <= radius)
            .map(|enemy| enemy.id)
            .collect()
    }

    pub(crate) fn any_within(&self, point: Vec3, radius: f32) -> bool {
        self.entries
            .iter()
            .any(|enemy| enemy.is_alive() && enemy.position.distance(point) <= radius)
    }

    /// Removes every enemy whose health reached zero.
    pub(crate) fn drain_dead(&mut self) -> Vec<Enemy> {
        let (dead, alive): (Vec<Enemy>, Vec<Enemy>) =
            std::mem::take(&mut self.entries).into_iter().partition(|enemy| !enemy.is_alive());
        self.entries = alive;
        dead
    }

    pub(crate) fn view(&self) -> EnemyView {
        EnemyView::from_snapshots(self.entries.iter().map(Enemy::snapshot).collect())
    }

    fn position(&self, id: EnemyId) -> Option<usize> {
        self.entries.binary_search_by_key(&id, |enemy| enemy.id).ok()
    }
}
