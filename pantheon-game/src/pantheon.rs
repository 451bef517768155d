//! The roster of gods: static data describing boons, calamities, ultimates
//! and the passive dominion each god exerts while it leads in influence.
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::effects::EffectKind;

/// Stable identifier of a god.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// What an unlocked loyalty boon does when its chance fires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoonEffect {
    /// On a winning round, multiply the payout.
    Fortune { chance: f64, multiplier: f64 },
    /// On a losing round, return a fraction of the stake.
    Consolation { chance: f64, fraction: f64 },
    /// Add a flat amount regardless of the verdict.
    Offering { chance: f64, amount: f64 },
}

impl BoonEffect {
    #[must_use]
    pub const fn chance(&self) -> f64 {
        match *self {
            Self::Fortune { chance, .. }
            | Self::Consolation { chance, .. }
            | Self::Offering { chance, .. } => chance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyBoon {
    pub name: String,
    pub threshold: f64,
    pub effect: BoonEffect,
}

/// Punishment a scorned god inflicts on the payout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalamityEffect {
    /// Remove a fraction of the payout.
    Drain { fraction: f64 },
    /// Wipe the payout entirely.
    Smite,
    /// Subtract a flat amount from the payout.
    Tithe { amount: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calamity {
    pub name: String,
    pub chance: f64,
    pub effect: CalamityEffect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UltimatePower {
    pub name: String,
    pub cost: f64,
    pub grants: EffectKind,
    pub duration: u32,
    pub potency: f64,
    /// Activation also costs a share of the player's loyalty to this god.
    #[serde(default)]
    pub self_sacrifice: bool,
}

/// Global effect applied while a god holds the plurality of influence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Dominion {
    pub description: String,
    #[serde(default)]
    pub win_chance_delta: f64,
    #[serde(default)]
    pub payout_multiplier_delta: f64,
    #[serde(default)]
    pub mischief_chance: f64,
    #[serde(default)]
    pub windfall_chance: f64,
    #[serde(default)]
    pub windfall_amount: f64,
    #[serde(default)]
    pub reprieve_chance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub epithet: String,
    pub domain: String,
    pub starting_influence: f64,
    #[serde(default)]
    pub boons: Vec<LoyaltyBoon>,
    pub calamity: Calamity,
    pub ultimate: UltimatePower,
    #[serde(default)]
    pub dominion: Dominion,
}

impl Entity {
    /// Boons unlocked at `loyalty`, in ascending threshold order.
    #[must_use]
    pub fn unlocked_boons(&self, loyalty: f64) -> Vec<&LoyaltyBoon> {
        let mut boons: Vec<&LoyaltyBoon> = self
            .boons
            .iter()
            .filter(|boon| boon.threshold <= loyalty)
            .collect();
        boons.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));
        boons
    }

    /// Standard kit for a god created through the ascension ritual.
    #[must_use]
    pub fn ascended(id: EntityId, name: impl Into<String>, epithet: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            epithet: epithet.into(),
            domain: String::from("apotheosis"),
            starting_influence: 0.0,
            boons: vec![
                boon("Echo of Mortality", 0.0, BoonEffect::Consolation {
                    chance: 0.2,
                    fraction: 0.25,
                }),
                boon("Self-Made Fortune", 200.0, BoonEffect::Fortune {
                    chance: 0.2,
                    multiplier: 1.5,
                }),
            ],
            calamity: Calamity {
                name: String::from("Envy of the Risen"),
                chance: 0.05,
                effect: CalamityEffect::Drain { fraction: 0.3 },
            },
            ultimate: UltimatePower {
                name: String::from("Apotheosis"),
                cost: 1_000.0,
                grants: EffectKind::PayoutBoost,
                duration: 5,
                potency: 2.0,
                self_sacrifice: false,
            },
            dominion: Dominion {
                description: String::from("The newly risen favor the bold: +2% win chance."),
                win_chance_delta: 0.02,
                ..Dominion::default()
            },
        }
    }
}

fn boon(name: &str, threshold: f64, effect: BoonEffect) -> LoyaltyBoon {
    LoyaltyBoon {
        name: name.to_string(),
        threshold,
        effect,
    }
}

/// Ordered roster of gods. Never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pantheon {
    entities: Vec<Entity>,
}

impl Default for Pantheon {
    fn default() -> Self {
        Self::standard()
    }
}

impl Pantheon {
    #[must_use]
    pub const fn new(entities: Vec<Entity>) -> Self {
        Self { entities }
    }

    /// Load a roster from JSON of the form `{"entities": [...]}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into valid roster data.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id.as_str() == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entities.iter().map(|entity| &entity.id)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// God with the lowest starting influence; ties go to roster order.
    #[must_use]
    pub fn weakest_starting(&self) -> Option<&Entity> {
        self.entities.iter().reduce(|weakest, candidate| {
            if candidate.starting_influence < weakest.starting_influence {
                candidate
            } else {
                weakest
            }
        })
    }

    /// A new roster with `replaced` swapped for `entity` in the same slot.
    #[must_use]
    pub fn with_replacement(&self, replaced: &str, entity: Entity) -> Self {
        let entities = self
            .entities
            .iter()
            .map(|existing| {
                if existing.id.as_str() == replaced {
                    entity.clone()
                } else {
                    existing.clone()
                }
            })
            .collect();
        Self { entities }
    }

    /// The six gods of the standard game.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(vec![
            Entity {
                id: EntityId::from("solara"),
                name: String::from("Solara"),
                epithet: String::from("the Dawnfire"),
                domain: String::from("sun"),
                starting_influence: 120.0,
                boons: vec![
                    boon("Morning Favor", 50.0, BoonEffect::Fortune {
                        chance: 0.25,
                        multiplier: 1.25,
                    }),
                    boon("Gilded Offering", 150.0, BoonEffect::Offering {
                        chance: 0.2,
                        amount: 20.0,
                    }),
                    boon("Zenith Blessing", 400.0, BoonEffect::Fortune {
                        chance: 0.15,
                        multiplier: 1.5,
                    }),
                ],
                calamity: Calamity {
                    name: String::from("Scorching Glare"),
                    chance: 0.08,
                    effect: CalamityEffect::Drain { fraction: 0.5 },
                },
                ultimate: UltimatePower {
                    name: String::from("Noonday Radiance"),
                    cost: 1_000.0,
                    grants: EffectKind::LuckIncrease,
                    duration: 5,
                    potency: 1.25,
                    self_sacrifice: false,
                },
                dominion: Dominion {
                    description: String::from(
                        "Sunlit tables: +3% win chance, payouts trimmed by 0.1x, rare windfalls.",
                    ),
                    win_chance_delta: 0.03,
                    payout_multiplier_delta: -0.1,
                    windfall_chance: 0.02,
                    windfall_amount: 25.0,
                    ..Dominion::default()
                },
            },
            Entity {
                id: EntityId::from("nyxara"),
                name: String::from("Nyxara"),
                epithet: String::from("Veil of Night"),
                domain: String::from("night"),
                starting_influence: 100.0,
                boons: vec![
                    boon("Shadowed Mercy", 40.0, BoonEffect::Consolation {
                        chance: 0.3,
                        fraction: 0.25,
                    }),
                    boon("Moonlit Gambit", 200.0, BoonEffect::Fortune {
                        chance: 0.2,
                        multiplier: 1.3,
                    }),
                ],
                calamity: Calamity {
                    name: String::from("Starless Hour"),
                    chance: 0.05,
                    effect: CalamityEffect::Smite,
                },
                ultimate: UltimatePower {
                    name: String::from("Eclipse Pact"),
                    cost: 800.0,
                    grants: EffectKind::LossForgiveness,
                    duration: 3,
                    potency: 1.0,
                    self_sacrifice: true,
                },
                dominion: Dominion {
                    description: String::from(
                        "Night games: -2% win chance and the odd verdict flipped in the dark.",
                    ),
                    win_chance_delta: -0.02,
                    mischief_chance: 0.03,
                    ..Dominion::default()
                },
            },
            Entity {
                id: EntityId::from("thalassor"),
                name: String::from("Thalassor"),
                epithet: String::from("the Tidebinder"),
                domain: String::from("sea"),
                starting_influence: 110.0,
                boons: vec![
                    boon("Driftwood Gift", 60.0, BoonEffect::Offering {
                        chance: 0.25,
                        amount: 15.0,
                    }),
                    boon("Returning Tide", 250.0, BoonEffect::Consolation {
                        chance: 0.25,
                        fraction: 0.5,
                    }),
                ],
                calamity: Calamity {
                    name: String::from("Undertow"),
                    chance: 0.1,
                    effect: CalamityEffect::Tithe { amount: 40.0 },
                },
                ultimate: UltimatePower {
                    name: String::from("Rising Tide"),
                    cost: 1_200.0,
                    grants: EffectKind::PayoutBoost,
                    duration: 3,
                    potency: 1.75,
                    self_sacrifice: false,
                },
                dominion: Dominion {
                    description: String::from(
                        "Tidal grace: payouts swell by 0.05x and some losses wash back.",
                    ),
                    payout_multiplier_delta: 0.05,
                    reprieve_chance: 0.04,
                    ..Dominion::default()
                },
            },
            Entity {
                id: EntityId::from("kragmor"),
                name: String::from("Kragmor"),
                epithet: String::from("the Forge-Father"),
                domain: String::from("forge"),
                starting_influence: 130.0,
                boons: vec![
                    boon("Tempered Luck", 100.0, BoonEffect::Fortune {
                        chance: 0.3,
                        multiplier: 1.2,
                    }),
                    boon("Hammerfall", 300.0, BoonEffect::Fortune {
                        chance: 0.2,
                        multiplier: 1.4,
                    }),
                    boon("Tribute of Iron", 600.0, BoonEffect::Offering {
                        chance: 0.3,
                        amount: 60.0,
                    }),
                ],
                calamity: Calamity {
                    name: String::from("Slag Tax"),
                    chance: 0.12,
                    effect: CalamityEffect::Drain { fraction: 0.25 },
                },
                ultimate: UltimatePower {
                    name: String::from("Anvil Oath"),
                    cost: 1_500.0,
                    grants: EffectKind::HalfReaping,
                    duration: 5,
                    potency: 1.0,
                    self_sacrifice: true,
                },
                dominion: Dominion {
                    description: String::from(
                        "Forge law: -4% win chance, but every win rings 0.2x louder.",
                    ),
                    win_chance_delta: -0.04,
                    payout_multiplier_delta: 0.2,
                    ..Dominion::default()
                },
            },
            Entity {
                id: EntityId::from("verdana"),
                name: String::from("Verdana"),
                epithet: String::from("the Harvest Mother"),
                domain: String::from("harvest"),
                starting_influence: 90.0,
                boons: vec![
                    boon("Gleaner's Share", 30.0, BoonEffect::Consolation {
                        chance: 0.2,
                        fraction: 0.2,
                    }),
                    boon("First Fruits", 120.0, BoonEffect::Offering {
                        chance: 0.3,
                        amount: 10.0,
                    }),
                ],
                calamity: Calamity {
                    name: String::from("Blight"),
                    chance: 0.1,
                    effect: CalamityEffect::Tithe { amount: 25.0 },
                },
                ultimate: UltimatePower {
                    name: String::from("Bountiful Season"),
                    cost: 900.0,
                    grants: EffectKind::PayoutBoost,
                    duration: 4,
                    potency: 1.5,
                    self_sacrifice: false,
                },
                dominion: Dominion {
                    description: String::from(
                        "Harvest festival: small windfalls are common and a few losses are spared.",
                    ),
                    windfall_chance: 0.05,
                    windfall_amount: 10.0,
                    reprieve_chance: 0.02,
                    ..Dominion::default()
                },
            },
            Entity {
                id: EntityId::from("mercurio"),
                name: String::from("Mercurio"),
                epithet: String::from("Thief of Odds"),
                domain: String::from("trickery"),
                starting_influence: 80.0,
                boons: vec![
                    boon("Sleight of Hand", 25.0, BoonEffect::Fortune {
                        chance: 0.15,
                        multiplier: 2.0,
                    }),
                    boon("Pickpocket's Rebate", 175.0, BoonEffect::Consolation {
                        chance: 0.35,
                        fraction: 0.3,
                    }),
                ],
                calamity: Calamity {
                    name: String::from("Vanishing Purse"),
                    chance: 0.06,
                    effect: CalamityEffect::Smite,
                },
                ultimate: UltimatePower {
                    name: String::from("Loaded Dice"),
                    cost: 700.0,
                    grants: EffectKind::LuckIncrease,
                    duration: 3,
                    potency: 1.4,
                    self_sacrifice: false,
                },
                dominion: Dominion {
                    description: String::from(
                        "Trickster's hour: verdicts flip at times and coins fall from nowhere.",
                    ),
                    mischief_chance: 0.05,
                    windfall_chance: 0.03,
                    windfall_amount: 40.0,
                    ..Dominion::default()
                },
            },
        ])
    }
}

impl<'a> IntoIterator for &'a Pantheon {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
