#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that turns target assignments into firing commands.

use essence_defence_core::{Command, GameState, TowerTarget, TowerView};

/// Tower combat system that redeems released shots against assigned targets.
#[derive(Debug, Default)]
pub struct TowerCombat {
    scratch: Vec<Command>,
}

impl TowerCombat {
    /// Creates a new tower combat system with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits one `Command::FireShot` per assignment whose tower still exists.
    pub fn handle(
        &mut self,
        game_state: GameState,
        towers: &TowerView,
        tower_targets: &[TowerTarget],
        out: &mut Vec<Command>,
    ) {
        if game_state != GameState::Running || tower_targets.is_empty() {
            return;
        }

        self.scratch.clear();

        for target in tower_targets {
            if towers.get(target.tower).is_some() {
                self.scratch.push(Command::FireShot {
                    tower: target.tower,
                    target: target.enemy,
                });
            }
        }

        if self.scratch.is_empty() {
            return;
        }

        out.reserve(self.scratch.len());
        out.append(&mut self.scratch);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use essence_defence_core::{
        CellCoord, EnemyId, FireState, GameOverReason, TargetPolicy, TowerId, TowerKindId,
        TowerSnapshot, Vec3,
    };

    #[test]
    fn finished_level_is_silent() {
        let mut system = TowerCombat::new();
        let towers = TowerView::from_snapshots(vec![snapshot(1)]);
        let mut out = Vec::new();

        system.handle(
            GameState::GameOver(GameOverReason::CoreDestroyed),
            &towers,
            &[target(1, 7)],
            &mut out,
        );

        assert!(out.is_empty());
    }

    #[test]
    fn every_assignment_becomes_a_shot() {
        let mut system = TowerCombat::new();
        let towers = TowerView::from_snapshots(vec![snapshot(2), snapshot(5)]);
        let targets = vec![target(2, 4), target(5, 1), target(2, 6)];
        let mut out = Vec::new();

        system.handle(GameState::Running, &towers, &targets, &mut out);

        assert_eq!(
            out,
            vec![
                Command::FireShot {
                    tower: TowerId::new(2),
                    target: EnemyId::new(4),
                },
                Command::FireShot {
                    tower: TowerId::new(5),
                    target: EnemyId::new(1),
                },
                Command::FireShot {
                    tower: TowerId::new(2),
                    target: EnemyId::new(6),
                },
            ],
        );
    }

    #[test]
    fn missing_towers_are_skipped() {
        let mut system = TowerCombat::new();
        let towers = TowerView::from_snapshots(vec![snapshot(8)]);
        let targets = vec![target(8, 2), target(42, 3)];
        let mut out = Vec::new();

        system.handle(GameState::Running, &towers, &targets, &mut out);

        assert_eq!(
            out,
            vec![Command::FireShot {
                tower: TowerId::new(8),
                target: EnemyId::new(2),
            }],
        );
    }

    fn snapshot(tower: u32) -> TowerSnapshot {
        TowerSnapshot {
            id: TowerId::new(tower),
            kind: TowerKindId::new(0),
            cell: CellCoord::new(tower, 0),
            position: Vec3::ZERO,
            tier: 1,
            level: 0,
            xp: 0.0,
            range: 3.0,
            policy: TargetPolicy::Closest,
            fire_state: FireState::Firing,
            cooldown_remaining: Duration::ZERO,
            area_radius: None,
            profiles: Vec::new(),
        }
    }

    fn target(tower: u32, enemy: u32) -> TowerTarget {
        TowerTarget {
            tower: TowerId::new(tower),
            enemy: EnemyId::new(enemy),
            tower_position: Vec3::ZERO,
            enemy_position: Vec3::ZERO,
        }
    }
}
