//! Rare divine rescues for a player on a losing streak or whose balance has
//! collapsed from its peak.
//!
//! The monitor runs after every round. When a trigger holds and nothing is
//! outstanding it stores one [`InterventionEvent`]; the event does nothing
//! until the player claims it.
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::InterventionConfig;
use crate::dice::Dice;
use crate::economy::PlayerEconomyState;
use crate::effects::{EffectKind, TemporaryEffect};
use crate::error::PantheonError;
use crate::ledger::InfluenceLedger;
use crate::numbers::non_negative;
use crate::pantheon::{EntityId, Pantheon};

/// What a claimed intervention hands over. Exactly one per event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InterventionGrant {
    Balance { amount: f64 },
    Effect { effect: TemporaryEffect },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InterventionTrigger {
    LosingStreak { streak: u32 },
    Collapse { balance: f64, peak: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionEvent {
    pub entity: EntityId,
    pub message: String,
    pub trigger: InterventionTrigger,
    pub grant: InterventionGrant,
}

/// Check the trigger conditions against the post-round state.
#[must_use]
pub fn trigger(
    state: &PlayerEconomyState,
    config: &InterventionConfig,
) -> Option<InterventionTrigger> {
    if state.losing_streak >= config.streak_threshold {
        return Some(InterventionTrigger::LosingStreak {
            streak: state.losing_streak,
        });
    }
    if state.balance < state.peak_balance * config.collapse_ratio {
        return Some(InterventionTrigger::Collapse {
            balance: state.balance,
            peak: state.peak_balance,
        });
    }
    None
}

/// Possibly emit an intervention. Returns `true` when one fired this round.
///
/// The streak check is deterministic; a single draw then picks the grant.
pub fn monitor(
    state: &mut PlayerEconomyState,
    ledger: &InfluenceLedger,
    pantheon: &Pantheon,
    config: &InterventionConfig,
    dice: &mut dyn Dice,
) -> bool {
    if state.intervention.is_some() {
        return false;
    }
    let Some(trigger) = trigger(state, config) else {
        return false;
    };
    let Some(entity) = state.patron.clone().or_else(|| ledger.dominant().cloned()) else {
        return false;
    };

    let grant = match dice.pick(3) {
        0 => InterventionGrant::Balance {
            amount: non_negative(config.balance_grant),
        },
        1 => InterventionGrant::Effect {
            effect: TemporaryEffect::new(
                EffectKind::LossForgiveness,
                config.effect_rounds,
                config.forgiveness_potency,
            ),
        },
        _ => InterventionGrant::Effect {
            effect: TemporaryEffect::new(
                EffectKind::PayoutBoost,
                config.effect_rounds,
                config.boost_potency,
            ),
        },
    };
    let name = pantheon
        .get(entity.as_str())
        .map_or_else(|| entity.to_string(), |god| god.name.clone());
    let message = match grant {
        InterventionGrant::Balance { amount } => {
            format!("{name} takes pity and offers {amount:.0} to rebuild your fortune.")
        }
        InterventionGrant::Effect { effect } => format!(
            "{name} reaches down with a blessing of {} for {} rounds.",
            effect.kind, effect.rounds_remaining
        ),
    };
    info!("intervention by {entity} ({trigger:?}): {grant:?}");
    state.intervention = Some(InterventionEvent {
        entity,
        message,
        trigger,
        grant,
    });
    true
}

/// Apply the outstanding intervention once and reset the losing streak.
///
/// # Errors
///
/// Returns [`PantheonError::NoIntervention`] when nothing is waiting.
pub fn claim(state: &mut PlayerEconomyState) -> Result<InterventionEvent, PantheonError> {
    let event = state
        .intervention
        .take()
        .ok_or(PantheonError::NoIntervention)?;
    match event.grant {
        InterventionGrant::Balance { amount } => {
            state.balance += non_negative(amount);
            state.peak_balance = state.peak_balance.max(state.balance);
        }
        InterventionGrant::Effect { effect } => state.effects.grant(effect),
    }
    state.losing_streak = 0;
    info!("claimed intervention from {}", event.entity);
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::dice::ScriptedDice;

    fn setup() -> (PlayerEconomyState, InfluenceLedger, Pantheon, InterventionConfig) {
        let pantheon = Pantheon::standard();
        let ledger = InfluenceLedger::from_pantheon(&pantheon);
        let config = EngineConfig::default();
        (
            PlayerEconomyState::new(1_000.0),
            ledger,
            pantheon,
            config.intervention,
        )
    }

    #[test]
    fn streak_below_threshold_is_quiet() {
        let (mut state, ledger, pantheon, config) = setup();
        state.losing_streak = 4;
        let mut dice = ScriptedDice::new([0.0]);
        assert!(!monitor(&mut state, &ledger, &pantheon, &config, &mut dice));
        assert_eq!(dice.draws(), 0);
        assert!(state.intervention.is_none());
    }

    #[test]
    fn streak_of_five_fires_once() {
        let (mut state, ledger, pantheon, config) = setup();
        state.losing_streak = 5;
        let mut dice = ScriptedDice::new([0.0, 0.0]);
        assert!(monitor(&mut state, &ledger, &pantheon, &config, &mut dice));
        let event = state.intervention.clone().unwrap();
        assert_eq!(event.entity, EntityId::from("kragmor"));
        assert_eq!(event.trigger, InterventionTrigger::LosingStreak { streak: 5 });
        assert!(matches!(event.grant, InterventionGrant::Balance { .. }));

        state.losing_streak = 6;
        assert!(!monitor(&mut state, &ledger, &pantheon, &config, &mut dice));
        assert_eq!(dice.draws(), 1);
    }

    #[test]
    fn collapse_triggers_with_patron_as_intervener() {
        let (mut state, ledger, pantheon, config) = setup();
        state.patron = Some(EntityId::from("verdana"));
        state.peak_balance = 1_000.0;
        state.balance = 99.0;
        let mut dice = ScriptedDice::new([0.9]);
        assert!(monitor(&mut state, &ledger, &pantheon, &config, &mut dice));
        let event = state.intervention.as_ref().unwrap();
        assert_eq!(event.entity, EntityId::from("verdana"));
        assert!(matches!(event.trigger, InterventionTrigger::Collapse { .. }));
        assert!(matches!(
            event.grant,
            InterventionGrant::Effect { effect } if effect.kind == EffectKind::PayoutBoost
        ));
    }

    #[test]
    fn claim_applies_grant_and_resets_streak() {
        let (mut state, ledger, pantheon, config) = setup();
        state.losing_streak = 5;
        state.balance = 10.0;
        let mut dice = ScriptedDice::new([0.0]);
        monitor(&mut state, &ledger, &pantheon, &config, &mut dice);
        let event = claim(&mut state).unwrap();
        assert!(matches!(
            event.grant,
            InterventionGrant::Balance { amount } if (amount - 250.0).abs() < 1e-9
        ));
        assert!((state.balance - 260.0).abs() < 1e-9);
        assert_eq!(state.losing_streak, 0);
        assert_eq!(claim(&mut state), Err(PantheonError::NoIntervention));
    }

    #[test]
    fn effect_grant_lands_in_active_effects() {
        let (mut state, ledger, pantheon, config) = setup();
        state.losing_streak = 7;
        let mut dice = ScriptedDice::new([0.5]);
        monitor(&mut state, &ledger, &pantheon, &config, &mut dice);
        claim(&mut state).unwrap();
        assert!(state.effects.is_active(EffectKind::LossForgiveness));
    }
}
