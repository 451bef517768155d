use std::fmt;

use pantheon_game::{Choice, EntityId, GameDescriptor, PantheonSession, Stance};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Decision returned by a [`PlayerPolicy`] for one round.
#[derive(Debug, Clone)]
pub struct PolicyDecision {
    /// Patron to pledge to before the wager, if it differs from the current one.
    pub pledge: Option<EntityId>,
    pub game_index: usize,
    /// Share of the current balance to stake (at least 1 is always staked).
    pub stake_fraction: f64,
    pub choice: Option<Choice>,
    pub activate_ultimate: bool,
    pub rationale: Option<String>,
}

impl PolicyDecision {
    #[must_use]
    pub fn wager(game_index: usize, stake_fraction: f64) -> Self {
        Self {
            pledge: None,
            game_index,
            stake_fraction,
            choice: None,
            activate_ultimate: false,
            rationale: None,
        }
    }

    #[must_use]
    pub fn pledging(mut self, patron: Option<EntityId>) -> Self {
        self.pledge = patron;
        self
    }

    #[must_use]
    pub const fn choosing(mut self, choice: Option<Choice>) -> Self {
        self.choice = choice;
        self
    }

    #[must_use]
    pub const fn with_ultimate(mut self, activate: bool) -> Self {
        self.activate_ultimate = activate;
        self
    }

    #[must_use]
    pub fn because(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

/// Policy interface for automated play.
pub trait PlayerPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Decide the next wager.
    fn decide(
        &mut self,
        session: &PantheonSession,
        floor: &[GameDescriptor],
        round: usize,
    ) -> PolicyDecision;

    /// Stance for the given exchange of a champion clash.
    fn stance(&mut self, exchange: usize) -> Stance;
}

/// Built-in player archetypes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameplayStrategy {
    /// Pledges once and plays its patron's own game.
    Devout,
    /// Changes patron every ten rounds and walks the whole floor.
    Fickle,
    /// Follows the dominant god and plays the richest game with big stakes.
    HighRoller,
    /// Seeded random play.
    Wanderer,
}

impl GameplayStrategy {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            GameplayStrategy::Devout => "Devout",
            GameplayStrategy::Fickle => "Fickle",
            GameplayStrategy::HighRoller => "High Roller",
            GameplayStrategy::Wanderer => "Wanderer",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn PlayerPolicy + Send> {
        match self {
            GameplayStrategy::Devout => Box::new(DevoutPolicy),
            GameplayStrategy::Fickle => Box::new(FicklePolicy),
            GameplayStrategy::HighRoller => Box::new(HighRollerPolicy),
            GameplayStrategy::Wanderer => Box::new(WandererPolicy::new(seed)),
        }
    }
}

impl fmt::Display for GameplayStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn token_for(game: &GameDescriptor, index: usize) -> Option<Choice> {
    let tokens = game.choice_rule.tokens();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens[index % tokens.len()])
    }
}

fn current_patron(session: &PantheonSession) -> Option<EntityId> {
    session.economy().patron.clone()
}

struct DevoutPolicy;
struct FicklePolicy;
struct HighRollerPolicy;

struct WandererPolicy {
    rng: ChaCha20Rng,
}

impl WandererPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl PlayerPolicy for DevoutPolicy {
    fn name(&self) -> &'static str {
        "Devout"
    }

    fn decide(
        &mut self,
        session: &PantheonSession,
        floor: &[GameDescriptor],
        round: usize,
    ) -> PolicyDecision {
        let patron = current_patron(session).or_else(|| session.pantheon().ids().next().cloned());
        let owned = patron.as_ref().and_then(|id| {
            floor
                .iter()
                .position(|game| game.owner.as_ref() == Some(id))
        });
        let game_index = owned.unwrap_or(0);
        let rationale = if owned.is_some() {
            "patron's own game"
        } else {
            "patron owns no game"
        };

        PolicyDecision::wager(game_index, 0.02)
            .pledging(patron)
            .choosing(floor.get(game_index).and_then(|game| token_for(game, round)))
            .with_ultimate(true)
            .because(rationale)
    }

    fn stance(&mut self, exchange: usize) -> Stance {
        if exchange % 2 == 0 {
            Stance::Guard
        } else {
            Stance::Strike
        }
    }
}

impl PlayerPolicy for FicklePolicy {
    fn name(&self) -> &'static str {
        "Fickle"
    }

    fn decide(
        &mut self,
        session: &PantheonSession,
        floor: &[GameDescriptor],
        round: usize,
    ) -> PolicyDecision {
        let roster: Vec<&EntityId> = session.pantheon().ids().collect();
        let pledge = if round % 10 == 0 && !roster.is_empty() {
            Some(roster[(round / 10) % roster.len()].clone())
        } else {
            current_patron(session)
        };
        let game_index = if floor.is_empty() { 0 } else { round % floor.len() };

        PolicyDecision::wager(game_index, 0.05)
            .pledging(pledge)
            .choosing(floor.get(game_index).and_then(|game| token_for(game, round)))
            .with_ultimate(true)
            .because(format!("rotation {}", round / 10))
    }

    fn stance(&mut self, exchange: usize) -> Stance {
        Stance::ALL[exchange % Stance::ALL.len()]
    }
}

impl PlayerPolicy for HighRollerPolicy {
    fn name(&self) -> &'static str {
        "High Roller"
    }

    fn decide(
        &mut self,
        session: &PantheonSession,
        floor: &[GameDescriptor],
        round: usize,
    ) -> PolicyDecision {
        let dominant = session.dominant().map(|god| god.id.clone());
        let (game_index, multiplier) = floor
            .iter()
            .enumerate()
            .map(|(idx, game)| (idx, game.payout_multiplier))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, 0.0));

        PolicyDecision::wager(game_index, 0.15)
            .pledging(dominant.or_else(|| current_patron(session)))
            .choosing(floor.get(game_index).and_then(|game| token_for(game, round)))
            .with_ultimate(true)
            .because(format!("multiplier {multiplier:.2}"))
    }

    fn stance(&mut self, _exchange: usize) -> Stance {
        Stance::Strike
    }
}

impl PlayerPolicy for WandererPolicy {
    fn name(&self) -> &'static str {
        "Wanderer"
    }

    fn decide(
        &mut self,
        session: &PantheonSession,
        floor: &[GameDescriptor],
        _round: usize,
    ) -> PolicyDecision {
        let roster: Vec<&EntityId> = session.pantheon().ids().collect();
        let pledge = if !roster.is_empty() && self.rng.gen_bool(0.1) {
            Some(roster[self.rng.gen_range(0..roster.len())].clone())
        } else {
            current_patron(session)
        };
        let game_index = if floor.is_empty() {
            0
        } else {
            self.rng.gen_range(0..floor.len())
        };
        let token = self.rng.gen_range(0..8_usize);
        let fraction = self.rng.gen_range(0.01..0.1);

        PolicyDecision::wager(game_index, fraction)
            .pledging(pledge)
            .choosing(floor.get(game_index).and_then(|game| token_for(game, token)))
            .with_ultimate(self.rng.gen_bool(0.5))
            .because(format!("stake {:.0}%", fraction * 100.0))
    }

    fn stance(&mut self, _exchange: usize) -> Stance {
        Stance::ALL[self.rng.gen_range(0..Stance::ALL.len())]
    }
}
