//! Damage types and the per-type profiles towers apply on hit.

use serde::{Deserialize, Serialize};

use crate::UpgradeError;

/// Identifier of a damage type declared by the level data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DamageTypeId(u32);

impl DamageTypeId {
    /// Creates a new damage type identifier with the provided numeric value.
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

/// Declaration of a damage type available to towers and upgrade cards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageTypeDefinition {
    /// Identifier referenced by profiles and upgrades.
    pub id: DamageTypeId,
    /// Display name of the damage type.
    pub name: String,
}

/// Per-damage-type stats applied to an enemy when a tower hits it.
///
/// `damage_over_time` is expressed as damage per second. While the effect is
/// active it is delivered in `dot_tick_rate` ticks per second, each tick
/// applying `damage_over_time / dot_tick_rate`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DamageProfile {
    /// Damage type this profile represents.
    pub damage_type: DamageTypeId,
    /// Direct damage applied on hit.
    pub damage: f32,
    /// Damage per second delivered by the over-time effect.
    #[serde(default)]
    pub damage_over_time: f32,
    /// Lifetime of the over-time and slow effects in seconds.
    #[serde(default)]
    pub dot_duration: f32,
    /// Over-time ticks delivered per second.
    #[serde(default)]
    pub dot_tick_rate: f32,
    /// Movement speed multiplier applied to hit enemies; `1.0` means no slow.
    #[serde(default = "unit_multiplier")]
    pub speed_multiplier: f32,
}

fn unit_multiplier() -> f32 {
    1.0
}

impl DamageProfile {
    /// Creates a profile that only deals direct damage.
    #[must_use]
    pub const fn direct(damage_type: DamageTypeId, damage: f32) -> Self {
        Self {
            damage_type,
            damage,
            damage_over_time: 0.0,
            dot_duration: 0.0,
            dot_tick_rate: 0.0,
            speed_multiplier: 1.0,
        }
    }

    /// Creates a profile from an upgrade delta applied to an empty profile.
    #[must_use]
    pub fn from_delta(delta: &DamageProfileDelta) -> Self {
        let mut profile = Self::direct(delta.damage_type, 0.0);
        profile.accumulate(delta);
        profile
    }

    /// Reports whether hits register a damage-over-time effect.
    #[must_use]
    pub fn has_damage_over_time(&self) -> bool {
        self.damage_over_time > 0.0 && self.dot_duration > 0.0 && self.dot_tick_rate > 0.0
    }

    /// Reports whether hits slow the target.
    #[must_use]
    pub fn slows(&self) -> bool {
        self.speed_multiplier < 1.0 && self.dot_duration > 0.0
    }

    /// Adds the delta onto this profile.
    ///
    /// Upgrades never override existing values. A delta for a different
    /// damage type is rejected and leaves the profile untouched.
    pub fn merge(&mut self, delta: &DamageProfileDelta) -> Result<(), UpgradeError> {
        if delta.damage_type != self.damage_type {
            return Err(UpgradeError::DamageTypeMismatch {
                expected: self.damage_type,
                actual: delta.damage_type,
            });
        }

        self.accumulate(delta);
        Ok(())
    }

    fn accumulate(&mut self, delta: &DamageProfileDelta) {
        self.damage = non_negative(self.damage + delta.damage);
        self.damage_over_time = non_negative(self.damage_over_time + delta.damage_over_time);
        self.dot_duration = non_negative(self.dot_duration + delta.dot_duration);
        self.dot_tick_rate = non_negative(self.dot_tick_rate + delta.dot_tick_rate);
        self.speed_multiplier = (self.speed_multiplier + delta.speed_multiplier).clamp(0.0, 1.0);
    }
}

/// Additive change carried by a damage upgrade.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DamageProfileDelta {
    /// Damage type the upgrade targets.
    pub damage_type: DamageTypeId,
    /// Added direct damage.
    #[serde(default)]
    pub damage: f32,
    /// Added damage per second over time.
    #[serde(default)]
    pub damage_over_time: f32,
    /// Added effect lifetime in seconds.
    #[serde(default)]
    pub dot_duration: f32,
    /// Added ticks per second.
    #[serde(default)]
    pub dot_tick_rate: f32,
    /// Added speed multiplier; negative values strengthen the slow.
    #[serde(default)]
    pub speed_multiplier: f32,
}

impl DamageProfileDelta {
    /// Creates a delta that only raises direct damage.
    #[must_use]
    pub const fn direct(damage_type: DamageTypeId, damage: f32) -> Self {
        Self {
            damage_type,
            damage,
            damage_over_time: 0.0,
            dot_duration: 0.0,
            dot_tick_rate: 0.0,
            speed_multiplier: 0.0,
        }
    }
}

fn non_negative(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRE: DamageTypeId = DamageTypeId::new(1);
    const FROST: DamageTypeId = DamageTypeId::new(2);

    #[test]
    fn merge_adds_onto_existing_values() {
        let mut profile = DamageProfile::direct(FIRE, 10.0);
        let delta = DamageProfileDelta {
            damage_over_time: 4.0,
            dot_duration: 2.0,
            dot_tick_rate: 2.0,
            ..DamageProfileDelta::direct(FIRE, 5.0)
        };

        profile.merge(&delta).expect("same type merges");
        profile.merge(&delta).expect("same type merges");

        assert_eq!(profile.damage, 20.0);
        assert_eq!(profile.damage_over_time, 8.0);
        assert_eq!(profile.dot_duration, 4.0);
        assert!(profile.has_damage_over_time());
    }

    #[test]
    fn merge_rejects_mismatched_type_without_mutation() {
        let mut profile = DamageProfile::direct(FIRE, 10.0);
        let result = profile.merge(&DamageProfileDelta::direct(FROST, 3.0));

        assert_eq!(
            result,
            Err(UpgradeError::DamageTypeMismatch {
                expected: FIRE,
                actual: FROST,
            })
        );
        assert_eq!(profile, DamageProfile::direct(FIRE, 10.0));
    }

    #[test]
    fn speed_multiplier_stays_within_unit_interval() {
        let mut profile = DamageProfile::direct(FROST, 0.0);
        let delta = DamageProfileDelta {
            speed_multiplier: -0.75,
            dot_duration: 1.0,
            ..DamageProfileDelta::direct(FROST, 0.0)
        };

        profile.merge(&delta).expect("same type merges");
        assert!((profile.speed_multiplier - 0.25).abs() < f32::EPSILON);
        assert!(profile.slows());

        profile.merge(&delta).expect("same type merges");
        assert_eq!(profile.speed_multiplier, 0.0);
    }

    #[test]
    fn profile_from_delta_starts_without_slow() {
        let profile = DamageProfile::from_delta(&DamageProfileDelta::direct(FROST, 2.0));
        assert_eq!(profile.damage, 2.0);
        assert_eq!(profile.speed_multiplier, 1.0);
        assert!(!profile.slows());
        assert!(!profile.has_damage_over_time());
    }
}
