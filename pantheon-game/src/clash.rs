//! Champion clash: the player's patron duels a rival god in a short
//! rock-paper-scissors bout. The outcome moves influence and resets the
//! challenger's loyalty.
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ClashConfig;
use crate::dice::Dice;
use crate::economy::PlayerEconomyState;
use crate::error::PantheonError;
use crate::ledger::InfluenceLedger;
use crate::numbers::{non_negative, probability};
use crate::pantheon::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Strike,
    Feint,
    Guard,
}

impl Stance {
    pub const ALL: [Self; 3] = [Self::Strike, Self::Feint, Self::Guard];

    /// Strike beats Feint, Feint beats Guard, Guard beats Strike.
    #[must_use]
    pub const fn beats(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Strike, Self::Feint) | (Self::Feint, Self::Guard) | (Self::Guard, Self::Strike)
        )
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Strike => "strike",
            Self::Feint => "feint",
            Self::Guard => "guard",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClashSide {
    Challenger,
    Opponent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub challenger: Stance,
    pub opponent: Stance,
    /// Side that landed a hit; `None` when both chose the same stance.
    pub hit: Option<ClashSide>,
}

/// A clash in progress. The stake is held in escrow until it settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClashState {
    pub champion: EntityId,
    pub opponent: EntityId,
    pub stake: f64,
    pub challenger_health: u32,
    pub opponent_health: u32,
    #[serde(default)]
    pub exchanges: Vec<Exchange>,
}

/// Outcome of one call into the clash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClashProgress {
    pub exchange: Exchange,
    pub challenger_health: u32,
    pub opponent_health: u32,
    pub settlement: Option<ClashSettlement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClashSettlement {
    pub winner: ClashSide,
    pub winning_entity: EntityId,
    pub losing_entity: EntityId,
    pub influence_moved: f64,
    /// Balance returned to the player; zero on defeat.
    pub payout: f64,
    pub loyalty_forfeited: f64,
}

/// The god who answers a challenge issued by `patron`'s champion: the
/// dominant god, or the strongest rival when the patron itself dominates.
#[must_use]
pub fn choose_opponent(ledger: &InfluenceLedger, patron: &str) -> Option<EntityId> {
    match ledger.dominant() {
        Some(dominant) if dominant.as_str() != patron => Some(dominant.clone()),
        _ => ledger.strongest_except(patron).cloned(),
    }
}

impl ClashState {
    #[must_use]
    pub fn new(champion: EntityId, opponent: EntityId, stake: f64, config: &ClashConfig) -> Self {
        Self {
            champion,
            opponent,
            stake: non_negative(stake),
            challenger_health: config.health,
            opponent_health: config.health,
            exchanges: Vec::new(),
        }
    }

    /// Play one exchange. The opponent's stance is drawn uniformly.
    pub fn exchange(
        &mut self,
        stance: Stance,
        config: &ClashConfig,
        dice: &mut dyn Dice,
    ) -> Exchange {
        let opponent = Stance::ALL[dice.pick(Stance::ALL.len())];
        let hit = if stance.beats(opponent) {
            self.opponent_health = self.opponent_health.saturating_sub(config.hit_damage);
            Some(ClashSide::Challenger)
        } else if opponent.beats(stance) {
            self.challenger_health = self.challenger_health.saturating_sub(config.hit_damage);
            Some(ClashSide::Opponent)
        } else {
            None
        };
        let exchange = Exchange {
            challenger: stance,
            opponent,
            hit,
        };
        self.exchanges.push(exchange);
        exchange
    }

    #[must_use]
    pub const fn winner(&self) -> Option<ClashSide> {
        if self.opponent_health == 0 {
            Some(ClashSide::Challenger)
        } else if self.challenger_health == 0 {
            Some(ClashSide::Opponent)
        } else {
            None
        }
    }

    /// Move influence, reset loyalty and pay out a finished clash.
    ///
    /// # Errors
    ///
    /// Returns [`PantheonError::NoActiveClash`] if nobody has fallen yet, or a
    /// ledger error if either god lost its entry.
    pub fn settle(
        &self,
        economy: &mut PlayerEconomyState,
        ledger: &mut InfluenceLedger,
        config: &ClashConfig,
    ) -> Result<ClashSettlement, PantheonError> {
        let winner = self.winner().ok_or(PantheonError::NoActiveClash)?;
        let (winning_entity, losing_entity) = match winner {
            ClashSide::Challenger => (self.champion.clone(), self.opponent.clone()),
            ClashSide::Opponent => (self.opponent.clone(), self.champion.clone()),
        };
        let loser_influence = ledger
            .get(losing_entity.as_str())
            .ok_or_else(|| PantheonError::UnknownEntity(losing_entity.clone()))?;
        let moved = ledger.transfer(
            losing_entity.as_str(),
            winning_entity.as_str(),
            loser_influence * probability(config.transfer_fraction),
        )?;

        let loyalty_forfeited = economy
            .loyalty
            .insert(self.champion.clone(), 0.0)
            .unwrap_or(0.0);
        let payout = match winner {
            ClashSide::Challenger => {
                self.stake * non_negative(config.stake_return_multiplier)
                    + non_negative(config.victory_bonus)
            }
            ClashSide::Opponent => 0.0,
        };
        economy.balance += payout;
        economy.peak_balance = economy.peak_balance.max(economy.balance);
        info!(
            "clash settled: {winning_entity} beat {losing_entity}, moved {:.2}, payout {payout:.2}",
            moved.credited
        );
        Ok(ClashSettlement {
            winner,
            winning_entity,
            losing_entity,
            influence_moved: moved.credited,
            payout,
            loyalty_forfeited,
        })
    }
}
