//! Authoritative tower state: fire cycles, upgrades and progression.

use std::{collections::BTreeMap, time::Duration};

use essence_defence_core::{
    level::{seconds, MAX_FIRE_RATE},
    CellCoord, DamageProfile, DamageProfileDelta, FireState, TargetPolicy, TierModel,
    TowerDefinition, TowerId, TowerKindId, TowerSnapshot, TowerView, UpgradeError, Vec3,
};

/// Combat stats taken from the current tier and grown by level-ups.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct TowerStats {
    pub(crate) range: f32,
    pub(crate) fire_rate: f32,
    pub(crate) fire_cooldown: Duration,
    pub(crate) projectile_speed: f32,
    pub(crate) area_radius: Option<f32>,
}

impl TowerStats {
    fn from_model(model: &TierModel) -> Self {
        Self {
            range: model.range.max(0.0),
            fire_rate: model.fire_rate,
            fire_cooldown: seconds(model.fire_cooldown),
            projectile_speed: model.projectile_speed.max(0.0),
            area_radius: model.area_radius.filter(|radius| *radius > 0.0),
        }
    }

    fn shots_per_round(&self) -> u32 {
        (self.fire_rate.min(MAX_FIRE_RATE).round() as u32).max(1)
    }

    fn shot_interval(&self) -> Duration {
        seconds(self.fire_rate.min(MAX_FIRE_RATE).recip())
    }
}

/// Resumable fire state of a tower. Firing and cooldown never overlap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FireCycle {
    Idle,
    Firing {
        shots_remaining: u32,
        until_next_shot: Duration,
    },
    Cooldown {
        remaining: Duration,
    },
}

/// What happened to a tower's fire cycle during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct FireReport {
    pub(crate) started: Option<u32>,
    pub(crate) released: u32,
    pub(crate) ended: bool,
}

/// Tower stored inside the world.
#[derive(Clone, Debug)]
pub(crate) struct Tower {
    pub(crate) id: TowerId,
    pub(crate) kind: TowerKindId,
    pub(crate) cell: CellCoord,
    pub(crate) position: Vec3,
    pub(crate) tier: u32,
    pub(crate) level: u32,
    pub(crate) xp: f32,
    pub(crate) stats: TowerStats,
    pub(crate) policy: TargetPolicy,
    pub(crate) cycle: FireCycle,
    pub(crate) profiles: Vec<DamageProfile>,
    pub(crate) pending_shots: u32,
}

impl Tower {
    /// Builds a tier-one tower, or `None` when the definition has no tiers.
    pub(crate) fn build(
        id: TowerId,
        definition: &TowerDefinition,
        cell: CellCoord,
        position: Vec3,
    ) -> Option<Self> {
        let model = definition.tier_model(1)?;
        Some(Self {
            id,
            kind: definition.kind,
            cell,
            position,
            tier: 1,
            level: 0,
            xp: 0.0,
            stats: TowerStats::from_model(model),
            policy: definition.policy,
            cycle: FireCycle::Idle,
            profiles: vec![definition.base_damage],
            pending_shots: 0,
        })
    }

    /// Advances the fire cycle.
    ///
    /// A finished cooldown leaves the tower idle; an idle tower with a target
    /// in range opens a round whose first shot is released immediately. Shots
    /// released on earlier ticks and never redeemed are discarded here.
    pub(crate) fn tick(&mut self, dt: Duration, target_in_range: bool) -> FireReport {
        let mut report = FireReport::default();
        self.pending_shots = 0;

        if let FireCycle::Cooldown { remaining } = &mut self.cycle {
            *remaining = remaining.saturating_sub(dt);
            if remaining.is_zero() {
                self.cycle = FireCycle::Idle;
            }
            if !matches!(self.cycle, FireCycle::Idle) {
                return report;
            }
        }

        if self.cycle == FireCycle::Idle {
            if !target_in_range {
                return report;
            }
            let shots = self.stats.shots_per_round();
            report.started = Some(shots);
            self.cycle = FireCycle::Firing {
                shots_remaining: shots,
                until_next_shot: Duration::ZERO,
            };
        }

        if let FireCycle::Firing {
            shots_remaining,
            until_next_shot,
        } = &mut self.cycle
        {
            let mut budget = dt;
            while *shots_remaining > 0 && *until_next_shot <= budget {
                budget -= *until_next_shot;
                *shots_remaining -= 1;
                *until_next_shot = self.stats.shot_interval();
                report.released += 1;
            }

            if *shots_remaining == 0 {
                self.cycle = FireCycle::Cooldown {
                    remaining: self.stats.fire_cooldown,
                };
                report.ended = true;
            } else {
                *until_next_shot -= budget;
            }
        }

        self.pending_shots = report.released;
        report
    }

    /// Redeems one released shot, returning whether one was available.
    pub(crate) fn take_shot(&mut self) -> bool {
        if self.pending_shots == 0 {
            return false;
        }
        self.pending_shots -= 1;
        true
    }

    /// Tears down an in-flight round. Returns whether a round was running.
    pub(crate) fn stop_firing(&mut self) -> bool {
        self.pending_shots = 0;
        let was_firing = matches!(self.cycle, FireCycle::Firing { .. });
        if was_firing {
            self.cycle = FireCycle::Idle;
        }
        was_firing
    }

    /// Merges the delta into its damage type's profile or opens a new slot.
    ///
    /// Slots are capped by the tier. A rejected upgrade leaves the tower
    /// untouched.
    pub(crate) fn apply_upgrade(
        &mut self,
        delta: &DamageProfileDelta,
        definition: &TowerDefinition,
    ) -> Result<(), UpgradeError> {
        if !definition.accepts(delta.damage_type) {
            return Err(UpgradeError::DamageTypeNotAccepted(delta.damage_type));
        }

        if let Some(profile) = self
            .profiles
            .iter_mut()
            .find(|profile| profile.damage_type == delta.damage_type)
        {
            return profile.merge(delta);
        }

        if self.profiles.len() >= self.tier as usize {
            return Err(UpgradeError::SlotsFull { tier: self.tier });
        }

        self.profiles.push(DamageProfile::from_delta(delta));
        Ok(())
    }

    /// Moves the tower to the next tier. Tiers cannot be skipped.
    pub(crate) fn upgrade_tier(
        &mut self,
        tier: u32,
        definition: &TowerDefinition,
    ) -> Result<(), UpgradeError> {
        let max = definition.max_tier();
        if self.tier >= max {
            return Err(UpgradeError::MaxTierReached { max });
        }
        if tier != self.tier + 1 {
            return Err(UpgradeError::TierOutOfSequence {
                current: self.tier,
                requested: tier,
            });
        }
        let model = definition
            .tier_model(tier)
            .ok_or(UpgradeError::MaxTierReached { max })?;

        self.stats = TowerStats::from_model(model);
        self.tier = tier;
        self.level = 0;
        self.xp = 0.0;
        Ok(())
    }

    /// Accrues experience and applies every level-up it pays for.
    ///
    /// Thresholds are subtracted so surplus carries over. Returns the levels
    /// reached, in order.
    pub(crate) fn gain_xp(&mut self, amount: f32, definition: &TowerDefinition) -> Vec<u32> {
        let mut reached = Vec::new();
        if !(amount > 0.0) {
            return reached;
        }
        self.xp += amount;

        let Some(model) = definition.tier_model(self.tier) else {
            return reached;
        };

        while let Some(step) = model.levels.get(self.level as usize) {
            if self.xp < step.xp_required {
                break;
            }
            self.xp -= step.xp_required.max(0.0);
            self.stats.range = (self.stats.range + step.range).max(0.0);
            if self.stats.fire_rate + step.fire_rate > 0.0 {
                self.stats.fire_rate += step.fire_rate;
            }
            self.stats.fire_cooldown =
                seconds(self.stats.fire_cooldown.as_secs_f32() + step.fire_cooldown);
            for profile in &mut self.profiles {
                profile.damage = (profile.damage + step.damage).max(0.0);
            }
            self.level += 1;
            reached.push(self.level);
        }
        reached
    }

    pub(crate) fn fire_state(&self) -> FireState {
        match self.cycle {
            FireCycle::Idle => FireState::Idle,
            FireCycle::Firing { .. } => FireState::Firing,
            FireCycle::Cooldown { .. } => FireState::Cooldown,
        }
    }

    pub(crate) fn cooldown_remaining(&self) -> Duration {
        match self.cycle {
            FireCycle::Cooldown { remaining } => remaining,
            FireCycle::Idle | FireCycle::Firing { .. } => Duration::ZERO,
        }
    }

    pub(crate) fn snapshot(&self) -> TowerSnapshot {
        TowerSnapshot {
            id: self.id,
            kind: self.kind,
            cell: self.cell,
            position: self.position,
            tier: self.tier,
            level: self.level,
            xp: self.xp,
            range: self.stats.range,
            policy: self.policy,
            fire_state: self.fire_state(),
            cooldown_remaining: self.cooldown_remaining(),
            area_radius: self.stats.area_radius,
            profiles: self.profiles.clone(),
        }
    }
}

/// Registry that stores towers and manages identifier allocation.
#[derive(Debug)]
pub(crate) struct TowerRegistry {
    entries: BTreeMap<TowerId, Tower>,
    next_tower_id: TowerId,
}

impl TowerRegistry {
    /// Creates an empty tower registry with a reset identifier counter.
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_tower_id: TowerId::new(0),
        }
    }

    /// Identifier the next inserted tower receives.
    pub(crate) fn peek_id(&self) -> TowerId {
        self.next_tower_id
    }

    pub(crate) fn insert(&mut self, tower: Tower) {
        self.next_tower_id = TowerId::new(tower.id.get().saturating_add(1));
        let _ = self.entries.insert(tower.id, tower);
    }

    pub(crate) fn get_mut(&mut self, id: TowerId) -> Option<&mut Tower> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: TowerId) -> Option<Tower> {
        self.entries.remove(&id)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tower> {
        self.entries.values_mut()
    }

    pub(crate) fn tower_at(&self, cell: CellCoord) -> Option<TowerId> {
        self.entries
            .values()
            .find(|tower| tower.cell == cell)
            .map(|tower| tower.id)
    }

    pub(crate) fn view(&self) -> TowerView {
        TowerView::from_snapshots(self.entries.values().map(Tower::snapshot).collect())
    }
}
