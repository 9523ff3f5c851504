//! Player hit points and essence balance.

use essence_defence_core::{CardError, EconomyConfig};

/// Hit points and spendable essence of the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerEconomy {
    hp: u32,
    max_hp: u32,
    essence: u32,
}

impl PlayerEconomy {
    pub(crate) fn new(config: EconomyConfig) -> Self {
        Self {
            hp: config.max_hp,
            max_hp: config.max_hp,
            essence: config.starting_essence,
        }
    }

    /// Hit points left.
    #[must_use]
    pub const fn hp(&self) -> u32 {
        self.hp
    }

    /// Hit points the level started with.
    #[must_use]
    pub const fn max_hp(&self) -> u32 {
        self.max_hp
    }

    /// Essence available for cards.
    #[must_use]
    pub const fn essence(&self) -> u32 {
        self.essence
    }

    /// Reports whether the core has been destroyed.
    #[must_use]
    pub const fn is_defeated(&self) -> bool {
        self.hp == 0
    }

    /// Removes hit points, floored at zero. Returns the amount removed.
    pub(crate) fn damage(&mut self, amount: u32) -> u32 {
        let applied = amount.min(self.hp);
        self.hp -= applied;
        applied
    }

    pub(crate) fn earn(&mut self, amount: u32) {
        self.essence = self.essence.saturating_add(amount);
    }

    pub(crate) fn can_afford(&self, cost: u32) -> Result<(), CardError> {
        if self.essence < cost {
            return Err(CardError::InsufficientEssence {
                cost,
                available: self.essence,
            });
        }
        Ok(())
    }

    pub(crate) fn spend(&mut self, cost: u32) -> Result<(), CardError> {
        self.can_afford(cost)?;
        self.essence -= cost;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn economy() -> PlayerEconomy {
        PlayerEconomy::new(EconomyConfig {
            max_hp: 100,
            starting_essence: 20,
        })
    }

    #[test]
    fn damage_is_floored_at_zero() {
        let mut economy = economy();
        assert_eq!(economy.damage(30), 30);
        assert_eq!(economy.hp(), 70);
        assert_eq!(economy.damage(500), 70);
        assert_eq!(economy.hp(), 0);
        assert!(economy.is_defeated());
    }

    #[test]
    fn spending_requires_enough_essence() {
        let mut economy = economy();
        assert_eq!(
            economy.spend(25),
            Err(CardError::InsufficientEssence {
                cost: 25,
                available: 20,
            })
        );
        assert_eq!(economy.essence(), 20);

        economy.earn(10);
        economy.spend(25).expect("affordable");
        assert_eq!(economy.essence(), 5);
    }
}
