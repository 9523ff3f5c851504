#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic wave director that sequences enemy spawns over time.

use std::{collections::BTreeSet, time::Duration};

use essence_defence_core::{
    Command, Difficulty, EnemyId, EnemyTypeId, Event, GameOverReason, WaveSchedule, WaveSpec,
};
use log::{info, warn};

/// Current step of the director's state machine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DirectorPhase {
    /// The director has not observed any time yet.
    Idle,
    /// Counting down the initial delay before the first loop.
    Waiting {
        /// Time left before the first wave is announced.
        remaining: Duration,
    },
    /// A wave was announced and waits for its start delay.
    Announcing {
        /// Index of the wave within the schedule.
        wave: usize,
        /// Wave being announced.
        spec: WaveSpec,
        /// Time left before the first spawn.
        remaining: Duration,
    },
    /// Enemies of a wave are being released.
    Spawning {
        /// Index of the wave within the schedule.
        wave: usize,
        /// Wave being released.
        spec: WaveSpec,
        /// Enemies released so far.
        spawned: u32,
        /// Time left before the next release.
        until_next: Duration,
    },
    /// Every enemy of a wave was released; waiting for the level to clear.
    AwaitingClear {
        /// Index of the wave within the schedule.
        wave: usize,
    },
    /// The schedule has no waves; nothing will ever spawn.
    WaveComplete,
    /// The level ended.
    GameOver,
}

/// Notification published whenever the director changes phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WaveNotice {
    /// The initial delay started.
    Waiting {
        /// Length of the delay.
        delay: Duration,
    },
    /// A wave was announced.
    Announcing {
        /// Loop the wave belongs to, starting at zero.
        loop_index: u32,
        /// Index of the wave within the schedule.
        wave: usize,
        /// Enemy type the wave releases.
        enemy_type: EnemyTypeId,
        /// Number of enemies the wave releases.
        count: u32,
    },
    /// The first enemy of a wave is about to be released.
    Spawning {
        /// Index of the wave within the schedule.
        wave: usize,
    },
    /// Every enemy of the wave was released.
    AwaitingClear {
        /// Index of the wave within the schedule.
        wave: usize,
    },
    /// A full pass over the schedule ended.
    WaveComplete {
        /// Loops completed so far.
        loops_completed: u32,
        /// Difficulty applied to the next loop.
        difficulty: Difficulty,
    },
    /// The director stopped for good.
    GameOver {
        /// Why the level ended.
        reason: GameOverReason,
    },
}

/// Pure system that turns elapsed time into `SpawnEnemy` commands.
#[derive(Debug)]
pub struct WaveDirector {
    schedule: WaveSchedule,
    phase: DirectorPhase,
    difficulty: Difficulty,
    loops_completed: u32,
    unanswered: u32,
    tracked: BTreeSet<EnemyId>,
}

impl WaveDirector {
    /// Creates an idle director for the provided schedule.
    #[must_use]
    pub fn new(schedule: WaveSchedule) -> Self {
        Self {
            schedule,
            phase: DirectorPhase::Idle,
            difficulty: Difficulty::BASE,
            loops_completed: 0,
            unanswered: 0,
            tracked: BTreeSet::new(),
        }
    }

    /// Current phase of the state machine.
    #[must_use]
    pub const fn phase(&self) -> DirectorPhase {
        self.phase
    }

    /// Difficulty stamped onto the enemies the director spawns.
    #[must_use]
    pub const fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Number of completed passes over the schedule.
    #[must_use]
    pub const fn loops_completed(&self) -> u32 {
        self.loops_completed
    }

    /// Enemies spawned by the director that have not left the level yet.
    ///
    /// Spawn requests the world has not answered yet count as live.
    #[must_use]
    pub fn live_enemies(&self) -> u32 {
        let tracked = u32::try_from(self.tracked.len()).unwrap_or(u32::MAX);
        tracked.saturating_add(self.unanswered)
    }

    /// Consumes world events and emits spawn or end-game commands.
    ///
    /// Time reported through `TimeAdvanced` drives every countdown. The
    /// world answers the director's `SpawnEnemy` commands in order, so the
    /// first spawn outcomes seen after a request belong to the director;
    /// only departures of those enemies release the `AwaitingClear` phase.
    /// Phase changes are appended to `notices` in the order they happen.
    pub fn handle(
        &mut self,
        events: &[Event],
        out: &mut Vec<Command>,
        notices: &mut Vec<WaveNotice>,
    ) {
        let mut elapsed = Duration::ZERO;
        for event in events {
            match event {
                Event::TimeAdvanced { dt } => elapsed = elapsed.saturating_add(*dt),
                Event::EnemySpawned { enemy, .. } if self.unanswered > 0 => {
                    self.unanswered -= 1;
                    let _ = self.tracked.insert(*enemy);
                }
                Event::EnemySpawnRejected { .. } if self.unanswered > 0 => {
                    self.unanswered -= 1;
                }
                Event::EnemyDestroyed { enemy, .. }
                | Event::EnemyReachedCore { enemy, .. }
                | Event::EnemyStranded { enemy, .. } => {
                    let _ = self.tracked.remove(enemy);
                }
                Event::GameOver { reason } => self.finish(*reason, notices),
                _ => {}
            }
        }

        self.advance(elapsed, out, notices);
    }

    fn advance(
        &mut self,
        mut budget: Duration,
        out: &mut Vec<Command>,
        notices: &mut Vec<WaveNotice>,
    ) {
        loop {
            match self.phase {
                DirectorPhase::Idle => {
                    let delay = self.schedule.initial_delay_duration();
                    self.phase = DirectorPhase::Waiting { remaining: delay };
                    notices.push(WaveNotice::Waiting { delay });
                }
                DirectorPhase::Waiting { remaining } => {
                    if budget < remaining {
                        self.phase = DirectorPhase::Waiting {
                            remaining: remaining - budget,
                        };
                        return;
                    }
                    budget -= remaining;
                    self.begin_loop(notices);
                }
                DirectorPhase::Announcing {
                    wave,
                    spec,
                    remaining,
                } => {
                    if budget < remaining {
                        self.phase = DirectorPhase::Announcing {
                            wave,
                            spec,
                            remaining: remaining - budget,
                        };
                        return;
                    }
                    budget -= remaining;
                    self.phase = DirectorPhase::Spawning {
                        wave,
                        spec,
                        spawned: 0,
                        until_next: Duration::ZERO,
                    };
                    notices.push(WaveNotice::Spawning { wave });
                }
                DirectorPhase::Spawning {
                    wave,
                    spec,
                    mut spawned,
                    mut until_next,
                } => {
                    while spawned < spec.count && until_next <= budget {
                        budget -= until_next;
                        out.push(Command::SpawnEnemy {
                            enemy_type: spec.enemy_type,
                            difficulty: self.difficulty,
                        });
                        self.unanswered = self.unanswered.saturating_add(1);
                        spawned += 1;
                        until_next = spec.interval_duration();
                    }

                    if spawned < spec.count {
                        self.phase = DirectorPhase::Spawning {
                            wave,
                            spec,
                            spawned,
                            until_next: until_next - budget,
                        };
                        return;
                    }
                    self.phase = DirectorPhase::AwaitingClear { wave };
                    notices.push(WaveNotice::AwaitingClear { wave });
                }
                DirectorPhase::AwaitingClear { wave } => {
                    if self.live_enemies() > 0 {
                        return;
                    }
                    match self.schedule.waves.get(wave + 1).copied() {
                        Some(spec) => self.announce(wave + 1, spec, notices),
                        None => self.complete_loop(out, notices),
                    }
                }
                DirectorPhase::WaveComplete | DirectorPhase::GameOver => return,
            }
        }
    }

    fn begin_loop(&mut self, notices: &mut Vec<WaveNotice>) {
        match self.schedule.waves.first().copied() {
            Some(spec) => self.announce(0, spec, notices),
            None => {
                warn!("wave schedule is empty; no enemies will spawn");
                self.phase = DirectorPhase::WaveComplete;
                notices.push(WaveNotice::WaveComplete {
                    loops_completed: self.loops_completed,
                    difficulty: self.difficulty,
                });
            }
        }
    }

    fn announce(&mut self, wave: usize, spec: WaveSpec, notices: &mut Vec<WaveNotice>) {
        info!(
            "loop {} wave {}: {} enemies of type {}",
            self.loops_completed,
            wave,
            spec.count,
            spec.enemy_type.get()
        );
        self.phase = DirectorPhase::Announcing {
            wave,
            spec,
            remaining: spec.wait_duration(),
        };
        notices.push(WaveNotice::Announcing {
            loop_index: self.loops_completed,
            wave,
            enemy_type: spec.enemy_type,
            count: spec.count,
        });
    }

    fn complete_loop(&mut self, out: &mut Vec<Command>, notices: &mut Vec<WaveNotice>) {
        self.loops_completed = self.loops_completed.saturating_add(1);
        self.difficulty = self.difficulty.escalate(self.schedule.growth_factor);
        info!(
            "loop {} complete; difficulty now {:.3}",
            self.loops_completed,
            self.difficulty.multiplier()
        );
        notices.push(WaveNotice::WaveComplete {
            loops_completed: self.loops_completed,
            difficulty: self.difficulty,
        });

        if self.loops_completed >= self.schedule.loop_ceiling {
            out.push(Command::EndGame {
                reason: GameOverReason::LoopCeiling,
            });
            self.finish(GameOverReason::LoopCeiling, notices);
        } else {
            self.begin_loop(notices);
        }
    }

    fn finish(&mut self, reason: GameOverReason, notices: &mut Vec<WaveNotice>) {
        if self.phase == DirectorPhase::GameOver {
            return;
        }
        info!("wave director stopped: {:?}", reason);
        self.phase = DirectorPhase::GameOver;
        notices.push(WaveNotice::GameOver { reason });
    }
}
