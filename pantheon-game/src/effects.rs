//! Time-limited blessings carried by the player between rounds.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of temporary effect the pipeline knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Scales the effective win chance before evaluation.
    LuckIncrease,
    /// Multiplies the payout of a winning round.
    PayoutBoost,
    /// Refunds the stake of a losing round.
    LossForgiveness,
    /// Halves the amount a loss takes from the balance.
    HalfReaping,
}

impl EffectKind {
    pub const ALL: &'static [Self] = &[
        Self::LuckIncrease,
        Self::PayoutBoost,
        Self::LossForgiveness,
        Self::HalfReaping,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::LuckIncrease => "luck_increase",
            Self::PayoutBoost => "payout_boost",
            Self::LossForgiveness => "loss_forgiveness",
            Self::HalfReaping => "half_reaping",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporaryEffect {
    pub kind: EffectKind,
    pub rounds_remaining: u32,
    pub potency: f64,
}

impl TemporaryEffect {
    #[must_use]
    pub const fn new(kind: EffectKind, rounds: u32, potency: f64) -> Self {
        Self {
            kind,
            rounds_remaining: rounds,
            potency,
        }
    }
}

/// Ordered list of effects currently affecting the player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActiveEffects(Vec<TemporaryEffect>);

impl ActiveEffects {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Add an effect at the end of the list. Zero-round grants are dropped.
    pub fn grant(&mut self, effect: TemporaryEffect) {
        if effect.rounds_remaining > 0 {
            self.0.push(effect);
        }
    }

    #[must_use]
    pub fn is_active(&self, kind: EffectKind) -> bool {
        self.0.iter().any(|effect| effect.kind == kind)
    }

    /// Strongest potency among active effects of `kind`.
    #[must_use]
    pub fn potency(&self, kind: EffectKind) -> Option<f64> {
        self.0
            .iter()
            .filter(|effect| effect.kind == kind)
            .map(|effect| effect.potency)
            .reduce(f64::max)
    }

    /// Count one resolved round against every effect, dropping spent ones.
    ///
    /// Returns the kinds that expired on this tick.
    pub fn tick(&mut self) -> Vec<EffectKind> {
        let mut expired = Vec::new();
        self.0.retain_mut(|effect| {
            effect.rounds_remaining = effect.rounds_remaining.saturating_sub(1);
            if effect.rounds_remaining == 0 {
                expired.push(effect.kind);
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TemporaryEffect> {
        self.0.iter()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a ActiveEffects {
    type Item = &'a TemporaryEffect;
    type IntoIter = std::slice::Iter<'a, TemporaryEffect>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<TemporaryEffect> for ActiveEffects {
    fn from_iter<T: IntoIterator<Item = TemporaryEffect>>(iter: T) -> Self {
        let mut effects = Self::new();
        for effect in iter {
            effects.grant(effect);
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_lasts_exactly_its_round_count() {
        let mut effects = ActiveEffects::new();
        effects.grant(TemporaryEffect::new(EffectKind::PayoutBoost, 3, 2.0));
        for _ in 0..2 {
            assert!(effects.is_active(EffectKind::PayoutBoost));
            assert!(effects.tick().is_empty());
        }
        assert!(effects.is_active(EffectKind::PayoutBoost));
        assert_eq!(effects.tick(), vec![EffectKind::PayoutBoost]);
        assert!(!effects.is_active(EffectKind::PayoutBoost));
        assert!(effects.is_empty());
    }

    #[test]
    fn potency_reports_strongest_of_kind() {
        let effects: ActiveEffects = [
            TemporaryEffect::new(EffectKind::LuckIncrease, 2, 1.2),
            TemporaryEffect::new(EffectKind::LuckIncrease, 1, 1.5),
            TemporaryEffect::new(EffectKind::HalfReaping, 1, 1.0),
        ]
        .into_iter()
        .collect();
        assert_eq!(effects.potency(EffectKind::LuckIncrease), Some(1.5));
        assert_eq!(effects.potency(EffectKind::PayoutBoost), None);
        assert_eq!(effects.len(), 3);
    }

    #[test]
    fn zero_round_grants_are_ignored() {
        let mut effects = ActiveEffects::new();
        effects.grant(TemporaryEffect::new(EffectKind::HalfReaping, 0, 1.0));
        assert!(effects.is_empty());
    }

    #[test]
    fn effect_kinds_serialize_as_snake_case() {
        let json = serde_json::to_string(&EffectKind::LossForgiveness).unwrap();
        assert_eq!(json, "\"loss_forgiveness\"");
        assert_eq!(EffectKind::ALL.len(), 4);
        assert_eq!(EffectKind::HalfReaping.to_string(), "half_reaping");
    }
}
