#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Bootstrap system that wires the world and the pure systems into one pipeline.

use std::time::Duration;

use essence_defence_core::{
    CardId, Command, ConfigError, Event, GameState, LevelConfig, TowerTarget,
};
use essence_defence_system_builder::Builder;
use essence_defence_system_tower_combat::TowerCombat;
use essence_defence_system_tower_targeting::TowerTargeting;
use essence_defence_system_wave_director::WaveDirector;
use essence_defence_world::{self as world, query, World};
use log::debug;

pub use essence_defence_system_builder::BuilderInput;
pub use essence_defence_system_wave_director::{DirectorPhase, WaveNotice};

/// Owns the world and every system, and runs them in a fixed order per tick.
///
/// Each step advances the world clock, lets the wave director react, assigns
/// targets to released shots and redeems them. Events the director could not
/// observe during a step are carried into the next one.
#[derive(Debug)]
pub struct Simulation {
    world: World,
    director: WaveDirector,
    targeting: TowerTargeting,
    combat: TowerCombat,
    builder: Builder,
    unseen: Vec<Event>,
    commands: Vec<Command>,
    targets: Vec<TowerTarget>,
}

impl Simulation {
    /// Validates the level and assembles a simulation ready for its first tick.
    pub fn new(level: LevelConfig) -> Result<Self, ConfigError> {
        let director = WaveDirector::new(level.schedule.clone());
        let world = World::new(level)?;

        Ok(Self {
            world,
            director,
            targeting: TowerTargeting::new(),
            combat: TowerCombat::new(),
            builder: Builder::new(),
            unseen: Vec::new(),
            commands: Vec::new(),
            targets: Vec::new(),
        })
    }

    /// Read-only access to the authoritative world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Read-only access to the wave director.
    #[must_use]
    pub fn director(&self) -> &WaveDirector {
        &self.director
    }

    /// Reports whether the level is still being played.
    #[must_use]
    pub fn game_state(&self) -> GameState {
        query::game_state(&self.world)
    }

    /// Runs one tick of the pipeline.
    ///
    /// Every event emitted during the step is appended to `out_events`; phase
    /// changes of the director are appended to `out_notices`.
    pub fn step(
        &mut self,
        dt: Duration,
        out_events: &mut Vec<Event>,
        out_notices: &mut Vec<WaveNotice>,
    ) {
        let start = out_events.len();
        world::apply(&mut self.world, Command::Tick { dt }, out_events);

        self.unseen.extend_from_slice(&out_events[start..]);
        self.director
            .handle(&self.unseen, &mut self.commands, out_notices);
        self.unseen.clear();

        let directed = out_events.len();
        self.execute(out_events);

        let towers = query::tower_view(&self.world);
        self.targeting.handle(
            &out_events[start..],
            &towers,
            &query::enemy_view(&self.world),
            &mut self.targets,
        );
        self.combat.handle(
            query::game_state(&self.world),
            &towers,
            &self.targets,
            &mut self.commands,
        );
        self.execute(out_events);

        self.unseen.extend_from_slice(&out_events[directed..]);
        debug!(
            "tick {} produced {} events",
            query::tick_index(&self.world),
            out_events.len() - start
        );
    }

    /// Applies a command from the host outside the tick pipeline.
    pub fn submit(&mut self, command: Command, out_events: &mut Vec<Event>) {
        let start = out_events.len();
        world::apply(&mut self.world, command, out_events);
        self.unseen.extend_from_slice(&out_events[start..]);
    }

    /// Translates resolved pointer input and the selected card into commands.
    pub fn handle_input(
        &mut self,
        selected_card: Option<CardId>,
        input: BuilderInput,
        out_events: &mut Vec<Event>,
    ) {
        let ended = match query::game_state(&self.world) {
            GameState::GameOver(reason) => vec![Event::GameOver { reason }],
            GameState::Running => Vec::new(),
        };
        let card = selected_card.and_then(|id| {
            query::level(&self.world)
                .cards
                .iter()
                .find(|card| card.id == id)
        });
        let world = &self.world;
        self.builder.handle(
            &ended,
            card,
            input,
            |cell| query::tower_at(world, cell),
            &mut self.commands,
        );

        let start = out_events.len();
        self.execute(out_events);
        self.unseen.extend_from_slice(&out_events[start..]);
    }

    fn execute(&mut self, out_events: &mut Vec<Event>) {
        for command in self.commands.drain(..) {
            world::apply(&mut self.world, command, out_events);
        }
    }
}
