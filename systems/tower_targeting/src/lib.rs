#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that assigns targets to the shots towers release.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
};

use essence_defence_core::{
    EnemyId, EnemySnapshot, EnemyView, Event, TargetPolicy, TowerId, TowerTarget, TowerView, Vec3,
};

/// Picks the enemy a tower with the given policy and range should shoot.
///
/// Live enemies within `range` of `origin` are ranked by the policy; ties keep
/// registry order. The first candidate not contained in `exclude` wins.
#[must_use]
pub fn select_target(
    policy: TargetPolicy,
    origin: Vec3,
    range: f32,
    enemies: &EnemyView,
    exclude: &BTreeSet<EnemyId>,
) -> Option<EnemyId> {
    rank_candidates(policy, origin, range, enemies)
        .into_iter()
        .map(|candidate| candidate.id)
        .find(|id| !exclude.contains(id))
}

fn rank_candidates(
    policy: TargetPolicy,
    origin: Vec3,
    range: f32,
    enemies: &EnemyView,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = enemies
        .iter()
        .filter(|snapshot| snapshot.health > 0.0)
        .filter_map(|snapshot| Candidate::within(snapshot, origin, range))
        .collect();

    // Stable sort keeps registry order between equally ranked enemies.
    candidates.sort_by(|left, right| left.compare(right, policy));
    candidates
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate {
    id: EnemyId,
    distance: f32,
    health: f32,
}

impl Candidate {
    fn within(snapshot: &EnemySnapshot, origin: Vec3, range: f32) -> Option<Self> {
        let distance = snapshot.position.distance(origin);
        (distance <= range).then_some(Self {
            id: snapshot.id,
            distance,
            health: snapshot.health,
        })
    }

    fn compare(&self, other: &Self, policy: TargetPolicy) -> Ordering {
        match policy {
            TargetPolicy::Closest => self.distance.total_cmp(&other.distance),
            TargetPolicy::Farthest => other.distance.total_cmp(&self.distance),
            TargetPolicy::Strongest => other.health.total_cmp(&self.health),
            TargetPolicy::Weakest => self.health.total_cmp(&other.health),
        }
    }
}

/// Tower targeting system that spreads the shots of a round across enemies.
///
/// Every enemy targeted during a firing round is excluded from the rest of
/// that round. Once every candidate has been targeted the exclusions are
/// dropped and the round starts over from the best-ranked enemy.
#[derive(Debug, Default)]
pub struct TowerTargeting {
    rounds: BTreeMap<TowerId, BTreeSet<EnemyId>>,
}

impl TowerTargeting {
    /// Creates a new tower targeting system with no rounds in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a target to every `ShotReady` event in the batch.
    ///
    /// The output buffer is cleared before populating it with the latest
    /// assignments. Shots without an enemy in range produce no entry. Rounds
    /// of towers missing from `towers` are forgotten.
    pub fn handle(
        &mut self,
        events: &[Event],
        towers: &TowerView,
        enemies: &EnemyView,
        out: &mut Vec<TowerTarget>,
    ) {
        out.clear();

        for event in events {
            match event {
                Event::FiringRoundStarted { tower, .. } => {
                    self.rounds.entry(*tower).or_default().clear();
                }
                Event::ShotReady { tower } => {
                    if let Some(target) = self.assign(*tower, towers, enemies) {
                        out.push(target);
                    }
                }
                Event::FiringRoundEnded { tower } | Event::TowerRemoved { tower, .. } => {
                    let _ = self.rounds.remove(tower);
                }
                _ => {}
            }
        }

        self.rounds.retain(|tower, _| towers.get(*tower).is_some());
    }

    fn assign(
        &mut self,
        tower_id: TowerId,
        towers: &TowerView,
        enemies: &EnemyView,
    ) -> Option<TowerTarget> {
        let tower = towers.get(tower_id)?;
        let excluded = self.rounds.entry(tower_id).or_default();

        let ranked = rank_candidates(tower.policy, tower.position, tower.range, enemies);
        let chosen = match ranked.iter().find(|candidate| !excluded.contains(&candidate.id)) {
            Some(candidate) => candidate.id,
            None => {
                excluded.clear();
                ranked.first()?.id
            }
        };
        let _ = excluded.insert(chosen);

        let enemy = enemies.get(chosen)?;
        Some(TowerTarget {
            tower: tower_id,
            enemy: chosen,
            tower_position: tower.position,
            enemy_position: enemy.position,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use essence_defence_core::{
        CellCoord, DamageProfile, DamageTypeId, EnemyTypeId, FireState, TowerKindId,
        TowerSnapshot,
    };

    fn enemy(id: u32, x: f32, health: f32) -> EnemySnapshot {
        EnemySnapshot {
            id: EnemyId::new(id),
            enemy_type: EnemyTypeId::new(0),
            position: Vec3::new(x, 0.0, 0.0),
            health,
            max_health: 100.0,
            waypoint_index: 0,
        }
    }

    fn tower(id: u32, policy: TargetPolicy, range: f32) -> TowerSnapshot {
        TowerSnapshot {
            id: TowerId::new(id),
            kind: TowerKindId::new(0),
            cell: CellCoord::new(0, 0),
            position: Vec3::ZERO,
            tier: 1,
            level: 0,
            xp: 0.0,
            range,
            policy,
            fire_state: FireState::Firing,
            cooldown_remaining: Duration::ZERO,
            area_radius: None,
            profiles: vec![DamageProfile::direct(DamageTypeId::new(0), 1.0)],
        }
    }

    fn enemies() -> EnemyView {
        EnemyView::from_snapshots(vec![
            enemy(4, 3.0, 40.0),
            enemy(1, 1.0, 80.0),
            enemy(2, -2.0, 10.0),
            enemy(3, 9.0, 500.0),
        ])
    }

    #[test]
    fn policies_rank_enemies_in_range() {
        let view = enemies();
        let none = BTreeSet::new();
        let pick = |policy| select_target(policy, Vec3::ZERO, 5.0, &view, &none);

        assert_eq!(pick(TargetPolicy::Closest), Some(EnemyId::new(1)));
        assert_eq!(pick(TargetPolicy::Farthest), Some(EnemyId::new(4)));
        assert_eq!(pick(TargetPolicy::Strongest), Some(EnemyId::new(1)));
        assert_eq!(pick(TargetPolicy::Weakest), Some(EnemyId::new(2)));
    }

    #[test]
    fn excluded_enemies_are_skipped() {
        let view = enemies();
        let exclude = BTreeSet::from([EnemyId::new(1)]);

        assert_eq!(
            select_target(TargetPolicy::Closest, Vec3::ZERO, 5.0, &view, &exclude),
            Some(EnemyId::new(2))
        );

        let everyone = BTreeSet::from([EnemyId::new(1), EnemyId::new(2), EnemyId::new(4)]);
        assert_eq!(
            select_target(TargetPolicy::Closest, Vec3::ZERO, 5.0, &view, &everyone),
            None
        );
    }

    #[test]
    fn ties_follow_registry_order() {
        let view = EnemyView::from_snapshots(vec![
            enemy(7, -1.0, 5.0),
            enemy(3, 1.0, 5.0),
            enemy(5, 1.0, 5.0),
        ]);
        let none = BTreeSet::new();

        for policy in [
            TargetPolicy::Closest,
            TargetPolicy::Farthest,
            TargetPolicy::Strongest,
            TargetPolicy::Weakest,
        ] {
            assert_eq!(
                select_target(policy, Vec3::ZERO, 2.0, &view, &none),
                Some(EnemyId::new(3)),
                "{policy:?}"
            );
        }
    }

    #[test]
    fn selection_is_deterministic() {
        let view = enemies();
        let none = BTreeSet::new();
        let first = select_target(TargetPolicy::Weakest, Vec3::ZERO, 20.0, &view, &none);
        for _ in 0..10 {
            assert_eq!(
                select_target(TargetPolicy::Weakest, Vec3::ZERO, 20.0, &view, &none),
                first
            );
        }
    }

    #[test]
    fn dead_and_distant_enemies_are_ignored() {
        let view = EnemyView::from_snapshots(vec![enemy(1, 1.0, 0.0), enemy(2, 30.0, 5.0)]);
        assert_eq!(
            select_target(TargetPolicy::Closest, Vec3::ZERO, 10.0, &view, &BTreeSet::new()),
            None
        );
    }

    #[test]
    fn round_spreads_shots_across_distinct_enemies() {
        let mut system = TowerTargeting::new();
        let towers = TowerView::from_snapshots(vec![tower(0, TargetPolicy::Closest, 5.0)]);
        let view = enemies();
        let tower_id = TowerId::new(0);
        let mut out = Vec::new();

        system.handle(
            &[
                Event::FiringRoundStarted {
                    tower: tower_id,
                    shots: 4,
                },
                Event::ShotReady { tower: tower_id },
            ],
            &towers,
            &view,
            &mut out,
        );
        assert_eq!(out[0].enemy, EnemyId::new(1));

        let mut picked = Vec::new();
        for _ in 0..3 {
            system.handle(&[Event::ShotReady { tower: tower_id }], &towers, &view, &mut out);
            picked.push(out[0].enemy);
        }

        assert_eq!(
            picked,
            vec![EnemyId::new(2), EnemyId::new(4), EnemyId::new(1)]
        );
    }

    #[test]
    fn new_round_forgets_previous_exclusions() {
        let mut system = TowerTargeting::new();
        let towers = TowerView::from_snapshots(vec![tower(0, TargetPolicy::Closest, 5.0)]);
        let view = enemies();
        let tower_id = TowerId::new(0);
        let mut out = Vec::new();

        let round = [
            Event::FiringRoundStarted {
                tower: tower_id,
                shots: 1,
            },
            Event::ShotReady { tower: tower_id },
            Event::FiringRoundEnded { tower: tower_id },
        ];
        system.handle(&round, &towers, &view, &mut out);
        assert_eq!(out[0].enemy, EnemyId::new(1));
        system.handle(&round, &towers, &view, &mut out);
        assert_eq!(out[0].enemy, EnemyId::new(1));
    }

    #[test]
    fn rounds_of_vanished_towers_are_dropped() {
        let mut system = TowerTargeting::new();
        let towers = TowerView::from_snapshots(vec![
            tower(0, TargetPolicy::Closest, 5.0),
            tower(1, TargetPolicy::Closest, 5.0),
        ]);
        let view = enemies();
        let mut out = Vec::new();

        system.handle(
            &[
                Event::FiringRoundStarted {
                    tower: TowerId::new(0),
                    shots: 3,
                },
                Event::ShotReady {
                    tower: TowerId::new(0),
                },
                Event::FiringRoundStarted {
                    tower: TowerId::new(1),
                    shots: 3,
                },
            ],
            &towers,
            &view,
            &mut out,
        );
        assert_eq!(system.rounds.len(), 2);

        let remaining = TowerView::from_snapshots(vec![tower(1, TargetPolicy::Closest, 5.0)]);
        system.handle(&[], &remaining, &view, &mut out);

        assert!(out.is_empty());
        assert_eq!(
            system.rounds.keys().copied().collect::<Vec<_>>(),
            vec![TowerId::new(1)]
        );
    }

    #[test]
    fn shots_without_targets_or_towers_produce_nothing() {
        let mut system = TowerTargeting::new();
        let towers = TowerView::from_snapshots(vec![tower(0, TargetPolicy::Closest, 0.5)]);
        let mut out = vec![TowerTarget {
            tower: TowerId::new(9),
            enemy: EnemyId::new(9),
            tower_position: Vec3::ZERO,
            enemy_position: Vec3::ZERO,
        }];

        system.handle(
            &[
                Event::ShotReady {
                    tower: TowerId::new(0),
                },
                Event::ShotReady {
                    tower: TowerId::new(5),
                },
            ],
            &towers,
            &enemies(),
            &mut out,
        );
        assert!(out.is_empty());
    }
}
