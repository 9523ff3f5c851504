//! Attack resolution: direct damage, effects, kills and core hits.

use essence_defence_core::{level::seconds, DamageProfile, EnemyId, Event, TowerId, Vec3};
use log::debug;

use crate::{
    economy::PlayerEconomy,
    enemies::{DotEffect, Enemy, EnemyRegistry},
};

/// Outcome of one resolved attack.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct AttackSummary {
    pub(crate) enemies_hit: u32,
    pub(crate) damage_dealt: f32,
}

impl AttackSummary {
    fn record(&mut self, applied: f32) {
        self.enemies_hit += 1;
        self.damage_dealt += applied;
    }
}

/// Resolves every profile against a single enemy.
pub(crate) fn resolve_attack(
    enemies: &mut EnemyRegistry,
    target: EnemyId,
    profiles: &[DamageProfile],
    source: Option<TowerId>,
    out_events: &mut Vec<Event>,
) -> AttackSummary {
    let mut summary = AttackSummary::default();
    if let Some(enemy) = enemies.get_mut(target).filter(|enemy| enemy.is_alive()) {
        summary.record(strike(enemy, profiles, source, out_events));
    }
    summary
}

/// Resolves every profile against all live enemies within `radius` of `point`.
///
/// The affected set is computed once before any damage lands.
pub(crate) fn resolve_area_attack(
    enemies: &mut EnemyRegistry,
    point: Vec3,
    radius: f32,
    profiles: &[DamageProfile],
    source: Option<TowerId>,
    out_events: &mut Vec<Event>,
) -> AttackSummary {
    let mut summary = AttackSummary::default();
    for id in enemies.ids_within(point, radius) {
        if let Some(enemy) = enemies.get_mut(id) {
            summary.record(strike(enemy, profiles, source, out_events));
        }
    }
    summary
}

fn strike(
    enemy: &mut Enemy,
    profiles: &[DamageProfile],
    source: Option<TowerId>,
    out_events: &mut Vec<Event>,
) -> f32 {
    let mut total = 0.0;
    for profile in profiles {
        // Armor is a flat reduction on direct hits only.
        let direct = (profile.damage - enemy.armor).max(0.0);
        let applied = enemy.take_damage(direct);
        if applied > 0.0 {
            total += applied;
            out_events.push(Event::EnemyDamaged {
                enemy: enemy.id,
                source,
                damage_type: profile.damage_type,
                applied,
                remaining: enemy.health,
            });
        }

        if let Some(effect) = DotEffect::from_profile(profile, source) {
            enemy.register_dot(effect);
        }
        if profile.slows() {
            enemy.apply_slow(profile.speed_multiplier, seconds(profile.dot_duration));
        }
    }

    if source.is_some() {
        enemy.last_attacker = source;
    }
    total
}

/// Removes dead enemies, paying out their essence rewards.
pub(crate) fn collect_dead(
    enemies: &mut EnemyRegistry,
    economy: &mut PlayerEconomy,
    out_events: &mut Vec<Event>,
) {
    let mut earned = 0;
    for enemy in enemies.drain_dead() {
        debug!("enemy {} destroyed", enemy.id.get());
        economy.earn(enemy.essence_reward);
        earned += enemy.essence_reward;
        out_events.push(Event::EnemyDestroyed {
            enemy: enemy.id,
            killer: enemy.last_attacker,
            essence_reward: enemy.essence_reward,
        });
    }

    if earned > 0 {
        out_events.push(Event::EssenceChanged {
            essence: economy.essence(),
        });
    }
}

/// Transfers an arriving enemy's core damage to the player.
pub(crate) fn resolve_core_reach(
    enemy: Enemy,
    economy: &mut PlayerEconomy,
    out_events: &mut Vec<Event>,
) {
    let amount = economy.damage(enemy.core_damage);
    debug!(
        "enemy {} reached the core for {} damage",
        enemy.id.get(),
        enemy.core_damage
    );
    out_events.push(Event::EnemyReachedCore {
        enemy: enemy.id,
        core_damage: enemy.core_damage,
    });
    out_events.push(Event::PlayerDamaged {
        amount,
        hp: economy.hp(),
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use essence_defence_core::{
        DamageTypeId, Difficulty, EconomyConfig, EnemyDefinition, EnemyTypeId,
    };

    const ARCANE: DamageTypeId = DamageTypeId::new(0);
    const FROST: DamageTypeId = DamageTypeId::new(2);

    fn definition(armor: f32) -> EnemyDefinition {
        EnemyDefinition {
            id: EnemyTypeId::new(1),
            name: "Brute".to_owned(),
            max_health: 50.0,
            armor,
            speed: 1.0,
            core_damage: 30,
            essence_reward: 4,
        }
    }

    fn registry(positions: &[Vec3], armor: f32) -> EnemyRegistry {
        let mut registry = EnemyRegistry::default();
        for position in positions {
            let id = registry.allocate_id();
            registry.insert(Enemy::spawn(
                id,
                &definition(armor),
                Difficulty::BASE,
                *position,
                vec![Vec3::new(100.0, 0.0, 0.0)].into(),
            ));
        }
        registry
    }

    fn economy(max_hp: u32) -> PlayerEconomy {
        PlayerEconomy::new(EconomyConfig {
            max_hp,
            starting_essence: 0,
        })
    }

    #[test]
    fn armor_reduces_direct_damage_down_to_zero() {
        let mut enemies = registry(&[Vec3::ZERO], 4.0);
        let mut events = Vec::new();

        let summary = resolve_attack(
            &mut enemies,
            EnemyId::new(0),
            &[DamageProfile::direct(ARCANE, 10.0), DamageProfile::direct(FROST, 3.0)],
            Some(TowerId::new(1)),
            &mut events,
        );

        assert_eq!(summary.enemies_hit, 1);
        assert_eq!(summary.damage_dealt, 6.0);
        assert_eq!(events.len(), 1);
        assert_eq!(enemies.get(EnemyId::new(0)).map(|enemy| enemy.health), Some(44.0));
    }

    #[test]
    fn area_attack_hits_every_enemy_inside_the_radius() {
        let mut enemies = registry(
            &[Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0)],
            0.0,
        );
        let mut events = Vec::new();

        let summary = resolve_area_attack(
            &mut enemies,
            Vec3::ZERO,
            1.5,
            &[DamageProfile::direct(ARCANE, 60.0)],
            None,
            &mut events,
        );

        assert_eq!(summary.enemies_hit, 2);
        assert_eq!(summary.damage_dealt, 100.0);
        assert_eq!(enemies.ids_within(Vec3::ZERO, 100.0), vec![EnemyId::new(2)]);
    }

    #[test]
    fn slowing_profiles_slow_the_target() {
        let mut enemies = registry(&[Vec3::ZERO], 0.0);
        let profile = DamageProfile {
            speed_multiplier: 0.5,
            dot_duration: 2.0,
            ..DamageProfile::direct(FROST, 1.0)
        };

        let _ = resolve_attack(&mut enemies, EnemyId::new(0), &[profile], None, &mut Vec::new());

        let enemy = enemies.get(EnemyId::new(0)).expect("alive");
        assert_eq!(enemy.current_speed(), 0.5);
    }

    #[test]
    fn dead_enemies_pay_out_to_the_killer() {
        let mut enemies = registry(&[Vec3::ZERO, Vec3::X], 0.0);
        let mut economy = economy(10);
        let mut events = Vec::new();

        let _ = resolve_attack(
            &mut enemies,
            EnemyId::new(1),
            &[DamageProfile::direct(ARCANE, 80.0)],
            Some(TowerId::new(3)),
            &mut events,
        );
        events.clear();
        collect_dead(&mut enemies, &mut economy, &mut events);

        assert_eq!(
            events,
            vec![
                Event::EnemyDestroyed {
                    enemy: EnemyId::new(1),
                    killer: Some(TowerId::new(3)),
                    essence_reward: 4,
                },
                Event::EssenceChanged { essence: 4 },
            ]
        );
        assert_eq!(enemies.len(), 1);
    }

    #[test]
    fn core_reach_reduces_hp_by_exactly_the_core_damage() {
        let mut enemies = registry(&[Vec3::ZERO, Vec3::X], 0.0);
        let mut economy = economy(50);
        let mut events = Vec::new();

        let first = enemies.remove(EnemyId::new(0)).expect("present");
        resolve_core_reach(first, &mut economy, &mut events);
        assert_eq!(economy.hp(), 20);

        let second = enemies.remove(EnemyId::new(1)).expect("present");
        resolve_core_reach(second, &mut economy, &mut events);
        assert_eq!(economy.hp(), 0);
        assert_eq!(
            events.last(),
            Some(&Event::PlayerDamaged { amount: 20, hp: 0 })
        );
        assert_eq!(enemies.len(), 0);
    }

    #[test]
    fn damage_over_time_keeps_the_tower_credited() {
        let mut enemies = registry(&[Vec3::ZERO], 0.0);
        let profile = DamageProfile {
            damage_over_time: 5.0,
            dot_duration: 1.0,
            dot_tick_rate: 1.0,
            ..DamageProfile::direct(ARCANE, 0.0)
        };

        let summary = resolve_attack(
            &mut enemies,
            EnemyId::new(0),
            &[profile],
            Some(TowerId::new(9)),
            &mut Vec::new(),
        );
        assert_eq!(summary.damage_dealt, 0.0);

        let enemy = enemies.get_mut(EnemyId::new(0)).expect("alive");
        let hits = enemy.tick_effects(Duration::from_secs(1));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, Some(TowerId::new(9)));
        assert_eq!(hits[0].applied, 5.0);
    }
}
