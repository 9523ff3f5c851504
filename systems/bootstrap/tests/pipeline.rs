use std::time::Duration;

use essence_defence_core::{
    CardDefinition, CardEffect, CardId, CellCoord, Command, DamageProfile, DamageTypeDefinition,
    DamageTypeId, Difficulty, EconomyConfig, EnemyDefinition, EnemyTypeId, Event, GameOverReason,
    GameState, LevelConfig, LevelLayout, TargetPolicy, TierModel, TowerDefinition, TowerKindId,
    WaveSchedule, WaveSpec,
};
use essence_defence_system_bootstrap::{BuilderInput, DirectorPhase, Simulation, WaveNotice};
use essence_defence_world::query;

const ARCANE: DamageTypeId = DamageTypeId::new(0);
const GRUNT: EnemyTypeId = EnemyTypeId::new(0);
const VOLLEY: TowerKindId = TowerKindId::new(0);
const BUILD_VOLLEY: CardId = CardId::new(0);
const TOWER_CELL: CellCoord = CellCoord::new(3, 0);
const STEP: Duration = Duration::from_millis(100);

fn level(waves: &[u32]) -> LevelConfig {
    let layout = LevelLayout::parse(
        "
        BBBBBBBB
        S......C
        BBBBBBBB
        ",
        1.0,
        vec![CellCoord::new(7, 1)],
    )
    .expect("layout parses");

    LevelConfig {
        layout,
        enemies: vec![EnemyDefinition {
            id: GRUNT,
            name: "Grunt".to_owned(),
            max_health: 10.0,
            armor: 0.0,
            speed: 1.0,
            core_damage: 4,
            essence_reward: 3,
        }],
        towers: vec![TowerDefinition {
            kind: VOLLEY,
            name: "Volley".to_owned(),
            base_damage: DamageProfile::direct(ARCANE, 10.0),
            tiers: vec![TierModel {
                range: 3.0,
                fire_rate: 3.0,
                fire_cooldown: 0.5,
                projectile_speed: 0.0,
                area_radius: None,
                levels: Vec::new(),
            }],
            accepted_damage_types: Vec::new(),
            policy: TargetPolicy::Closest,
        }],
        damage_types: vec![DamageTypeDefinition {
            id: ARCANE,
            name: "Arcane".to_owned(),
        }],
        cards: vec![CardDefinition {
            id: BUILD_VOLLEY,
            name: "Volley".to_owned(),
            cost: 10,
            effect: CardEffect::BuildTower { kind: VOLLEY },
        }],
        schedule: WaveSchedule::new(
            0.5,
            waves
                .iter()
                .map(|count| WaveSpec {
                    wait_before_start: 0.5,
                    enemy_type: GRUNT,
                    count: *count,
                    spawn_interval: 1.0,
                })
                .collect(),
        ),
        economy: EconomyConfig {
            max_hp: 10,
            starting_essence: 20,
        },
        core_radius: 0.5,
    }
}

fn defended(level: LevelConfig) -> Simulation {
    let mut simulation = Simulation::new(level).expect("level is valid");
    let mut events = Vec::new();
    simulation.handle_input(
        Some(BUILD_VOLLEY),
        BuilderInput::new(true, false, Some(TOWER_CELL)),
        &mut events,
    );
    assert!(
        events
            .iter()
            .any(|event| matches!(event, Event::TowerPlaced { .. })),
        "build card should place a tower: {events:?}"
    );
    simulation
}

#[derive(Debug, Default, PartialEq)]
struct Transcript {
    events: Vec<Event>,
    notices: Vec<WaveNotice>,
}

fn run_until<F>(simulation: &mut Simulation, max_steps: usize, mut stop: F) -> Transcript
where
    F: FnMut(&Simulation, &Transcript) -> bool,
{
    let mut transcript = Transcript::default();
    for _ in 0..max_steps {
        simulation.step(STEP, &mut transcript.events, &mut transcript.notices);
        if stop(simulation, &transcript) {
            break;
        }
    }
    transcript
}

#[test]
fn defended_loop_clears_every_wave_and_escalates() {
    let mut simulation = defended(level(&[2, 3, 1]));

    let transcript = run_until(&mut simulation, 600, |simulation, _| {
        simulation.director().loops_completed() >= 1
    });

    let awaiting: Vec<usize> = transcript
        .notices
        .iter()
        .take_while(|notice| !matches!(notice, WaveNotice::WaveComplete { .. }))
        .filter_map(|notice| match notice {
            WaveNotice::AwaitingClear { wave } => Some(*wave),
            _ => None,
        })
        .collect();
    assert_eq!(awaiting, vec![0, 1, 2]);

    assert_eq!(simulation.director().loops_completed(), 1);
    assert!((simulation.director().difficulty().multiplier() - 1.6).abs() < 1e-6);

    let kills = transcript
        .events
        .iter()
        .filter(|event| matches!(event, Event::EnemyDestroyed { .. }))
        .count();
    assert_eq!(kills, 6);

    let economy = query::economy(simulation.world());
    assert_eq!(economy.hp(), 10, "no enemy should slip past the volley");
    assert_eq!(economy.essence(), 20 - 10 + 6 * 3);
    assert_eq!(simulation.game_state(), GameState::Running);
}

#[test]
fn undefended_core_falls() {
    let mut simulation = Simulation::new(level(&[3])).expect("level is valid");

    let transcript = run_until(&mut simulation, 300, |simulation, _| {
        simulation.game_state() != GameState::Running
    });

    assert_eq!(
        simulation.game_state(),
        GameState::GameOver(GameOverReason::CoreDestroyed)
    );
    assert_eq!(query::economy(simulation.world()).hp(), 0);
    assert_eq!(simulation.director().phase(), DirectorPhase::GameOver);
    assert_eq!(
        transcript.notices.last(),
        Some(&WaveNotice::GameOver {
            reason: GameOverReason::CoreDestroyed,
        })
    );

    let damage: Vec<u32> = transcript
        .events
        .iter()
        .filter_map(|event| match event {
            Event::PlayerDamaged { amount, .. } => Some(*amount),
            _ => None,
        })
        .collect();
    assert_eq!(damage, vec![4, 4, 2]);
}

#[test]
fn host_spawned_enemies_do_not_release_the_next_wave() {
    let mut config = level(&[1, 1]);
    config.economy.max_hp = 100;
    let mut simulation = Simulation::new(config).expect("level is valid");
    let mut events = Vec::new();
    simulation.submit(
        Command::SpawnEnemy {
            enemy_type: GRUNT,
            difficulty: Difficulty::BASE,
        },
        &mut events,
    );
    assert!(matches!(events.as_slice(), [Event::EnemySpawned { .. }]));

    let mut live_at_release = None;
    let transcript = run_until(&mut simulation, 300, |simulation, transcript| {
        let released = transcript
            .notices
            .iter()
            .any(|notice| matches!(notice, WaveNotice::Announcing { wave: 1, .. }));
        if released {
            live_at_release = Some(query::live_enemy_count(simulation.world()));
        }
        released
    });

    assert_eq!(live_at_release, Some(0), "wave 1 must wait for wave 0 to clear");
    let leaked = transcript
        .events
        .iter()
        .filter(|event| matches!(event, Event::EnemyReachedCore { .. }))
        .count();
    assert_eq!(leaked, 2);
}

#[test]
fn loop_ceiling_ends_the_level_through_the_world() {
    let mut config = level(&[1]);
    config.schedule.loop_ceiling = 1;
    let mut simulation = defended(config);

    let transcript = run_until(&mut simulation, 300, |simulation, _| {
        simulation.game_state() != GameState::Running
    });

    assert_eq!(
        simulation.game_state(),
        GameState::GameOver(GameOverReason::LoopCeiling)
    );
    assert!(transcript.events.contains(&Event::GameOver {
        reason: GameOverReason::LoopCeiling,
    }));
    assert_eq!(simulation.director().phase(), DirectorPhase::GameOver);
}

#[test]
fn deterministic_replay_matches_between_runs() {
    let replay = || {
        let mut simulation = defended(level(&[2, 3, 1]));
        run_until(&mut simulation, 200, |_, _| false)
    };

    let first = replay();
    let second = replay();

    assert_eq!(first, second, "replay diverged between runs");
    assert!(first
        .events
        .iter()
        .any(|event| matches!(event, Event::EnemyDestroyed { .. })));
    assert!(!first
        .events
        .iter()
        .any(|event| matches!(event, Event::ShotRejected { .. })));
}

#[test]
fn input_removes_towers_until_the_level_ends() {
    let mut simulation = defended(level(&[1]));
    assert_eq!(query::economy(simulation.world()).essence(), 10);

    let mut events = Vec::new();
    simulation.handle_input(
        None,
        BuilderInput::new(false, true, Some(TOWER_CELL)),
        &mut events,
    );
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::TowerRemoved { .. })));
    assert_eq!(query::tower_at(simulation.world(), TOWER_CELL), None);

    simulation.submit(
        Command::EndGame {
            reason: GameOverReason::LoopCeiling,
        },
        &mut events,
    );
    events.clear();
    simulation.handle_input(
        Some(BUILD_VOLLEY),
        BuilderInput::new(true, false, Some(TOWER_CELL)),
        &mut events,
    );

    assert!(events.is_empty(), "a finished level accepts no input");
    assert_eq!(query::economy(simulation.world()).essence(), 10);
}
