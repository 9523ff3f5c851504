#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure builder system that turns cursor input and the selected card into
//! card plays and tower removals.

use essence_defence_core::{
    CardDefinition, CardEffect, CardTarget, CellCoord, Command, Event, TowerId,
};

/// Input snapshot distilled from adapter-provided frame input data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuilderInput {
    /// Indicates whether the player confirmed the selected card on this frame.
    pub confirm_action: bool,
    /// Indicates whether the player requested tower removal on this frame.
    pub remove_action: bool,
    /// Grid cell under the cursor, already resolved from its world position.
    pub cursor_cell: Option<CellCoord>,
}

impl BuilderInput {
    /// Creates a new input descriptor with explicit field values.
    #[must_use]
    pub const fn new(
        confirm_action: bool,
        remove_action: bool,
        cursor_cell: Option<CellCoord>,
    ) -> Self {
        Self {
            confirm_action,
            remove_action,
            cursor_cell,
        }
    }
}

/// Builder system that translates input into card and removal commands.
#[derive(Debug, Clone)]
pub struct Builder {
    active: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Creates a new builder system instance.
    #[must_use]
    pub const fn new() -> Self {
        Self { active: true }
    }

    /// Consumes world events and adapter-derived input to emit builder commands.
    ///
    /// Build cards target the hovered cell; upgrade cards target the tower on
    /// it and are dropped when the cell is empty. The `tower_at` closure should
    /// mirror the semantics of the world's `query::tower_at` helper.
    pub fn handle<F>(
        &mut self,
        events: &[Event],
        selected_card: Option<&CardDefinition>,
        input: BuilderInput,
        mut tower_at: F,
        out: &mut Vec<Command>,
    ) where
        F: FnMut(CellCoord) -> Option<TowerId>,
    {
        if events
            .iter()
            .any(|event| matches!(event, Event::GameOver { .. }))
        {
            self.active = false;
        }

        if !self.active {
            return;
        }

        let Some(cell) = input.cursor_cell else {
            return;
        };

        if input.confirm_action {
            if let Some(card) = selected_card {
                let target = match card.effect {
                    CardEffect::BuildTower { .. } => Some(CardTarget::Cell(cell)),
                    CardEffect::UpgradeTier { .. } | CardEffect::DamageUpgrade { .. } => {
                        tower_at(cell).map(CardTarget::Tower)
                    }
                };
                if let Some(target) = target {
                    out.push(Command::PlayCard {
                        card: card.id,
                        target,
                    });
                }
            }
        }

        if input.remove_action {
            if let Some(tower) = tower_at(cell) {
                out.push(Command::RemoveTower { tower });
            }
        }
    }
}
