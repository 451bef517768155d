//! Game descriptors and the requests a player submits for one round.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pantheon::EntityId;

/// How a player's choice maps onto the outcome of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChoiceRule {
    /// Pure chance: no choice is taken.
    None,
    /// Call heads or tails.
    Sides,
    /// Pick which of `count` cups hides the prize.
    Cups { count: u8 },
    /// Pick which of `count` cards is the winner.
    Cards { count: u8 },
}

/// A token the player commits to before the draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Choice {
    Heads,
    Tails,
    Cup(u8),
    Card(u8),
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heads => f.write_str("heads"),
            Self::Tails => f.write_str("tails"),
            Self::Cup(index) => write!(f, "cup {}", index + 1),
            Self::Card(index) => write!(f, "card {}", index + 1),
        }
    }
}

impl ChoiceRule {
    /// Every token this rule accepts, in a fixed order.
    #[must_use]
    pub fn tokens(self) -> Vec<Choice> {
        match self {
            Self::None => Vec::new(),
            Self::Sides => vec![Choice::Heads, Choice::Tails],
            Self::Cups { count } => (0..count).map(Choice::Cup).collect(),
            Self::Cards { count } => (0..count).map(Choice::Card).collect(),
        }
    }

    #[must_use]
    pub const fn takes_choice(self) -> bool {
        !matches!(self, Self::None)
    }

    /// A choice game needs at least two tokens for the draw to decide
    /// anything.
    #[must_use]
    pub const fn is_playable(self) -> bool {
        match self {
            Self::None | Self::Sides => true,
            Self::Cups { count } | Self::Cards { count } => count >= 2,
        }
    }

    /// Whether `choice` is an acceptable submission for this rule.
    #[must_use]
    pub fn accepts(self, choice: Option<Choice>) -> bool {
        if !self.is_playable() {
            return false;
        }
        match (self, choice) {
            (Self::None, None) => true,
            (Self::None, Some(_)) | (_, None) => false,
            (Self::Sides, Some(token)) => matches!(token, Choice::Heads | Choice::Tails),
            (Self::Cups { count }, Some(Choice::Cup(index)))
            | (Self::Cards { count }, Some(Choice::Card(index))) => index < count,
            _ => false,
        }
    }
}

/// Static description of a game on the floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameDescriptor {
    pub tag: String,
    pub win_chance: f64,
    pub payout_multiplier: f64,
    #[serde(default)]
    pub owner: Option<EntityId>,
    pub choice_rule: ChoiceRule,
}

impl GameDescriptor {
    #[must_use]
    pub fn new(tag: impl Into<String>, win_chance: f64, payout_multiplier: f64) -> Self {
        Self {
            tag: tag.into(),
            win_chance,
            payout_multiplier,
            owner: None,
            choice_rule: ChoiceRule::None,
        }
    }

    #[must_use]
    pub fn owned_by(mut self, owner: impl Into<EntityId>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    #[must_use]
    pub const fn with_choice_rule(mut self, rule: ChoiceRule) -> Self {
        self.choice_rule = rule;
        self
    }

    /// The floor games of the standard build.
    #[must_use]
    pub fn standard_floor() -> Vec<Self> {
        vec![
            Self::new("wheel_of_dawn", 0.45, 2.0).owned_by("solara"),
            Self::new("coin_of_fates", 0.5, 1.9).with_choice_rule(ChoiceRule::Sides),
            Self::new("tidal_cups", 1.0 / 3.0, 2.8)
                .owned_by("thalassor")
                .with_choice_rule(ChoiceRule::Cups { count: 3 }),
            Self::new("tricksters_cards", 0.25, 3.8)
                .owned_by("mercurio")
                .with_choice_rule(ChoiceRule::Cards { count: 4 }),
            Self::new("forge_dice", 0.3, 3.2).owned_by("kragmor"),
        ]
    }
}

/// One wager submitted by the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRequest {
    pub game: GameDescriptor,
    pub stake: f64,
    #[serde(default)]
    pub choice: Option<Choice>,
}

impl RoundRequest {
    #[must_use]
    pub const fn new(game: GameDescriptor, stake: f64) -> Self {
        Self {
            game,
            stake,
            choice: None,
        }
    }

    #[must_use]
    pub const fn with_choice(mut self, choice: Choice) -> Self {
        self.choice = Some(choice);
        self
    }
}
