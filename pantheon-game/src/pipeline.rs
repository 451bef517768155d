//! Modifier pipeline: the fixed, ordered chain of stages that turns a base
//! verdict into a final payout.
//!
//! Two stages act before the draw (they shape the odds the evaluator sees);
//! the rest transform `(win, payout)` in order, each reading the flag as left
//! by the stage before it. The last stage re-derives the canonical verdict
//! from the payout alone.
use log::debug;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::dice::Dice;
use crate::effects::{ActiveEffects, EffectKind};
use crate::error::PantheonError;
use crate::evaluator::{Evaluation, evaluate};
use crate::game::RoundRequest;
use crate::numbers::{non_negative, probability};
use crate::pantheon::{BoonEffect, CalamityEffect, Dominion, Entity};

/// Narration lines collected while a round resolves.
pub type EffectLog = SmallVec<[String; 6]>;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    LuckIncrease,
    DominionSkew,
    BasePayout,
    DominionPostRoll,
    PatronBoons,
    RivalCalamity,
    PayoutBoost,
    LossForgiveness,
    Canonical,
}

impl Stage {
    pub const ORDER: [Self; 9] = [
        Self::LuckIncrease,
        Self::DominionSkew,
        Self::BasePayout,
        Self::DominionPostRoll,
        Self::PatronBoons,
        Self::RivalCalamity,
        Self::PayoutBoost,
        Self::LossForgiveness,
        Self::Canonical,
    ];

    #[must_use]
    pub const fn runs_before_draw(self) -> bool {
        matches!(self, Self::LuckIncrease | Self::DominionSkew)
    }
}

/// Everything the pipeline reads from the rest of the session.
#[derive(Debug, Clone)]
pub struct PipelineInput<'a> {
    pub request: &'a RoundRequest,
    pub patron: Option<&'a Entity>,
    pub patron_loyalty: f64,
    /// Scorned gods, oldest abandonment first.
    pub scorned: Vec<&'a Entity>,
    pub dominant: Option<&'a Entity>,
    pub effects: &'a ActiveEffects,
    pub near_miss_band: f64,
}

/// Odds after the pre-draw stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Odds {
    pub win_chance: f64,
    pub payout_multiplier: f64,
}

/// Value threaded through the post-draw stages.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundState {
    pub win: bool,
    pub payout: f64,
    pub stake: f64,
    pub multiplier: f64,
    pub messages: EffectLog,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageTrace {
    pub stage: Stage,
    pub win: bool,
    pub payout: f64,
}

/// Final product of the pipeline for one round.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub evaluation: Evaluation,
    pub odds: Odds,
    /// Canonical verdict: `payout >= stake`.
    pub win: bool,
    pub payout: f64,
    pub messages: EffectLog,
    pub trace: Vec<StageTrace>,
}

/// Run every stage in [`Stage::ORDER`] for one round.
///
/// # Errors
///
/// Returns [`PantheonError::InvalidChoice`] if the request's choice is outside
/// the game's domain; nothing is drawn in that case.
pub fn resolve(
    input: &PipelineInput<'_>,
    dice: &mut dyn Dice,
) -> Result<Resolution, PantheonError> {
    let game = &input.request.game;
    let mut messages = EffectLog::new();
    let mut odds = Odds {
        win_chance: probability(game.win_chance),
        payout_multiplier: non_negative(game.payout_multiplier),
    };
    for stage in Stage::ORDER.into_iter().filter(|stage| stage.runs_before_draw()) {
        odds = match stage {
            Stage::LuckIncrease => apply_luck(odds, input.effects, &mut messages),
            _ => apply_dominion_skew(odds, input.dominant, &mut messages),
        };
    }

    let evaluation = evaluate(
        game,
        input.request.choice,
        odds.win_chance,
        input.near_miss_band,
        dice,
    )?;
    let mut state = RoundState {
        win: evaluation.win,
        payout: 0.0,
        stake: non_negative(input.request.stake),
        multiplier: odds.payout_multiplier,
        messages,
    };
    let mut trace = Vec::with_capacity(Stage::ORDER.len());

    for stage in Stage::ORDER.into_iter().filter(|stage| !stage.runs_before_draw()) {
        state = match stage {
            Stage::BasePayout => base_payout(state),
            Stage::DominionPostRoll => match input.dominant {
                Some(entity) => dominion_post_roll(state, entity, dice),
                None => state,
            },
            Stage::PatronBoons => match input.patron {
                Some(patron) => patron_boons(state, patron, input.patron_loyalty, dice),
                None => state,
            },
            Stage::RivalCalamity => rival_calamity(state, &input.scorned, dice),
            Stage::PayoutBoost => payout_boost(state, input.effects),
            Stage::LossForgiveness => loss_forgiveness(state, input.effects),
            _ => canonical(state),
        };
        state.payout = non_negative(state.payout);
        debug!(
            "pipeline stage={stage:?} win={} payout={:.2}",
            state.win, state.payout
        );
        trace.push(StageTrace {
            stage,
            win: state.win,
            payout: state.payout,
        });
    }

    Ok(Resolution {
        evaluation,
        odds,
        win: state.win,
        payout: state.payout,
        messages: state.messages,
        trace,
    })
}

/// Stage 1: an active luck blessing scales the win chance.
#[must_use]
pub fn apply_luck(odds: Odds, effects: &ActiveEffects, messages: &mut EffectLog) -> Odds {
    let Some(potency) = effects.potency(EffectKind::LuckIncrease) else {
        return odds;
    };
    messages.push(format!("Luck blessing sharpens your odds (x{potency:.2})."));
    Odds {
        win_chance: probability(odds.win_chance * potency),
        ..odds
    }
}

/// Stage 2: the dominant god skews chance and multiplier.
#[must_use]
pub fn apply_dominion_skew(
    odds: Odds,
    dominant: Option<&Entity>,
    messages: &mut EffectLog,
) -> Odds {
    let Some(entity) = dominant else {
        return odds;
    };
    let dominion = &entity.dominion;
    if dominion.win_chance_delta == 0.0 && dominion.payout_multiplier_delta == 0.0 {
        return odds;
    }
    messages.push(format!("{} holds sway: {}", entity.name, dominion.description));
    Odds {
        win_chance: probability(odds.win_chance + dominion.win_chance_delta),
        payout_multiplier: non_negative(odds.payout_multiplier + dominion.payout_multiplier_delta),
    }
}

/// Stage 3: payout from the verdict alone.
#[must_use]
pub fn base_payout(mut state: RoundState) -> RoundState {
    state.payout = if state.win {
        state.stake * state.multiplier
    } else {
        0.0
    };
    state
}

/// Stage 4: mischief, windfall and reprieve of the dominant god, each with a
/// fresh draw. A zero chance consumes no draw.
pub fn dominion_post_roll(
    mut state: RoundState,
    entity: &Entity,
    dice: &mut dyn Dice,
) -> RoundState {
    let dominion: &Dominion = &entity.dominion;
    if dominion.mischief_chance > 0.0 && dice.chance(dominion.mischief_chance) {
        state.win = !state.win;
        state = base_payout(state);
        state
            .messages
            .push(format!("{} flips the verdict on a whim.", entity.name));
    }
    if dominion.windfall_chance > 0.0 && dice.chance(dominion.windfall_chance) {
        state.payout += non_negative(dominion.windfall_amount);
        state.messages.push(format!(
            "A windfall of {:.0} falls from {}'s hand.",
            dominion.windfall_amount, entity.name
        ));
    }
    if !state.win && dominion.reprieve_chance > 0.0 && dice.chance(dominion.reprieve_chance) {
        state.payout = state.stake;
        state
            .messages
            .push(format!("{} grants a reprieve; your stake returns.", entity.name));
    }
    state
}

/// Stage 5: every unlocked patron boon, lowest threshold first.
pub fn patron_boons(
    mut state: RoundState,
    patron: &Entity,
    loyalty: f64,
    dice: &mut dyn Dice,
) -> RoundState {
    for boon in patron.unlocked_boons(loyalty) {
        if !dice.chance(boon.effect.chance()) {
            continue;
        }
        match boon.effect {
            BoonEffect::Fortune { multiplier, .. } if state.win => {
                state.payout *= non_negative(multiplier);
                state
                    .messages
                    .push(format!("{}: {} multiplies your winnings.", patron.name, boon.name));
            }
            BoonEffect::Consolation { fraction, .. } if !state.win => {
                state.payout += state.stake * non_negative(fraction);
                state
                    .messages
                    .push(format!("{}: {} softens the loss.", patron.name, boon.name));
            }
            BoonEffect::Offering { amount, .. } => {
                state.payout += non_negative(amount);
                state.messages.push(format!(
                    "{}: {} leaves an offering of {amount:.0}.",
                    patron.name, boon.name
                ));
            }
            _ => {}
        }
    }
    state
}

/// Stage 6: the first scorned god whose calamity fires strikes; the rest wait.
pub fn rival_calamity(
    mut state: RoundState,
    scorned: &[&Entity],
    dice: &mut dyn Dice,
) -> RoundState {
    for rival in scorned {
        if !dice.chance(rival.calamity.chance) {
            continue;
        }
        state.payout = match rival.calamity.effect {
            CalamityEffect::Drain { fraction } => state.payout * (1.0 - probability(fraction)),
            CalamityEffect::Smite => 0.0,
            CalamityEffect::Tithe { amount } => state.payout - non_negative(amount),
        };
        state.messages.push(format!(
            "{} remembers your betrayal: {}.",
            rival.name, rival.calamity.name
        ));
        break;
    }
    state
}

/// Stage 7: an active payout boost multiplies winning payouts.
#[must_use]
pub fn payout_boost(mut state: RoundState, effects: &ActiveEffects) -> RoundState {
    if !state.win {
        return state;
    }
    if let Some(potency) = effects.potency(EffectKind::PayoutBoost) {
        state.payout *= non_negative(potency);
        state
            .messages
            .push(format!("Payout blessing multiplies your winnings (x{potency:.2})."));
    }
    state
}

/// Stage 8: an active loss forgiveness refunds the stake of a losing round.
#[must_use]
pub fn loss_forgiveness(mut state: RoundState, effects: &ActiveEffects) -> RoundState {
    if state.win || !effects.is_active(EffectKind::LossForgiveness) {
        return state;
    }
    state.payout = state.stake;
    state
        .messages
        .push(String::from("Forgiveness blessing returns your stake."));
    state
}

/// Stage 9: the canonical verdict is whatever the payout says.
#[must_use]
pub fn canonical(mut state: RoundState) -> RoundState {
    state.win = state.payout >= state.stake;
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedDice;
    use crate::effects::TemporaryEffect;
    use crate::game::GameDescriptor;
    use crate::pantheon::Pantheon;

    fn state(win: bool, payout: f64) -> RoundState {
        RoundState {
            win,
            payout,
            stake: 10.0,
            multiplier: 2.0,
            messages: EffectLog::new(),
        }
    }

    fn input<'a>(
        request: &'a RoundRequest,
        effects: &'a ActiveEffects,
    ) -> PipelineInput<'a> {
        PipelineInput {
            request,
            patron: None,
            patron_loyalty: 0.0,
            scorned: Vec::new(),
            dominant: None,
            effects,
            near_miss_band: 0.05,
        }
    }

    #[test]
    fn stage_order_is_fixed() {
        let pre: Vec<_> = Stage::ORDER
            .iter()
            .filter(|stage| stage.runs_before_draw())
            .collect();
        assert_eq!(pre, vec![&Stage::LuckIncrease, &Stage::DominionSkew]);
        assert_eq!(Stage::ORDER.last(), Some(&Stage::Canonical));
    }

    #[test]
    fn plain_round_wins_and_pays_multiplier() {
        let request = RoundRequest::new(GameDescriptor::new("wheel", 0.5, 2.0), 10.0);
        let effects = ActiveEffects::new();
        let mut dice = ScriptedDice::new([0.2]);
        let resolution = resolve(&input(&request, &effects), &mut dice).unwrap();
        assert!(resolution.win);
        assert!((resolution.payout - 20.0).abs() < 1e-9);
        assert_eq!(resolution.trace.len(), 7);
        assert_eq!(dice.draws(), 1);
    }

    #[test]
    fn luck_applies_before_the_draw() {
        let request = RoundRequest::new(GameDescriptor::new("wheel", 0.4, 2.0), 10.0);
        let mut effects = ActiveEffects::new();
        effects.grant(TemporaryEffect::new(EffectKind::LuckIncrease, 2, 1.5));
        // 0.55 loses at 0.4 but wins at 0.6.
        let mut dice = ScriptedDice::new([0.55]);
        let resolution = resolve(&input(&request, &effects), &mut dice).unwrap();
        assert!((resolution.odds.win_chance - 0.6).abs() < 1e-9);
        assert!(resolution.evaluation.win);
        assert!(resolution.win);
    }

    #[test]
    fn dominion_skew_clamps_chance_and_multiplier() {
        let pantheon = Pantheon::standard();
        let kragmor = pantheon.get("kragmor").unwrap();
        let mut messages = EffectLog::new();
        let odds = apply_dominion_skew(
            Odds {
                win_chance: 0.02,
                payout_multiplier: 2.0,
            },
            Some(kragmor),
            &mut messages,
        );
        assert!(odds.win_chance.abs() < f64::EPSILON);
        assert!((odds.payout_multiplier - 2.2).abs() < 1e-9);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn mischief_inverts_and_recomputes_payout() {
        let pantheon = Pantheon::standard();
        let mercurio = pantheon.get("mercurio").unwrap();
        // mischief fires, windfall misses.
        let mut dice = ScriptedDice::new([0.01, 0.9]);
        let next = dominion_post_roll(base_payout(state(false, 0.0)), mercurio, &mut dice);
        assert!(next.win);
        assert!((next.payout - 20.0).abs() < 1e-9);
        assert_eq!(dice.draws(), 2);
    }

    #[test]
    fn reprieve_only_considered_on_loss() {
        let pantheon = Pantheon::standard();
        let thalassor = pantheon.get("thalassor").unwrap();
        let mut dice = ScriptedDice::new([0.0]);
        let won = dominion_post_roll(base_payout(state(true, 0.0)), thalassor, &mut dice);
        assert_eq!(dice.draws(), 0);
        assert!((won.payout - 20.0).abs() < 1e-9);
        let lost = dominion_post_roll(base_payout(state(false, 0.0)), thalassor, &mut dice);
        assert!((lost.payout - 10.0).abs() < 1e-9);
        assert_eq!(dice.draws(), 1);
    }

    #[test]
    fn reprieve_pays_exactly_the_stake() {
        let pantheon = Pantheon::standard();
        let thalassor = pantheon.get("thalassor").unwrap();
        let mut dice = ScriptedDice::new([0.0]);
        let lost = dominion_post_roll(state(false, 30.0), thalassor, &mut dice);
        assert!((lost.payout - 10.0).abs() < 1e-9);
    }

    #[test]
    fn all_unlocked_boons_apply_in_threshold_order() {
        let pantheon = Pantheon::standard();
        let solara = pantheon.get("solara").unwrap();
        // Morning Favor (x1.25) fires, Gilded Offering (+20) fires, Zenith (x1.5) fires.
        let mut dice = ScriptedDice::new([0.0, 0.0, 0.0]);
        let next = patron_boons(state(true, 20.0), solara, 500.0, &mut dice);
        assert!((next.payout - (20.0 * 1.25 + 20.0) * 1.5).abs() < 1e-9);
        assert_eq!(next.messages.len(), 3);
    }

    #[test]
    fn locked_boons_draw_nothing() {
        let pantheon = Pantheon::standard();
        let solara = pantheon.get("solara").unwrap();
        let mut dice = ScriptedDice::new([0.0]);
        let next = patron_boons(state(true, 20.0), solara, 10.0, &mut dice);
        assert_eq!(dice.draws(), 0);
        assert!((next.payout - 20.0).abs() < 1e-9);
    }

    #[test]
    fn only_first_firing_calamity_applies() {
        let pantheon = Pantheon::standard();
        let nyxara = pantheon.get("nyxara").unwrap();
        let solara = pantheon.get("solara").unwrap();
        let scorned = vec![solara, nyxara];
        // solara's calamity misses, nyxara's smites, nothing further is drawn.
        let mut dice = ScriptedDice::new([0.9, 0.0, 0.0]);
        let next = rival_calamity(state(true, 20.0), &scorned, &mut dice);
        assert!(next.payout.abs() < f64::EPSILON);
        assert_eq!(dice.draws(), 2);
    }

    #[test]
    fn tithe_never_drives_payout_negative() {
        let pantheon = Pantheon::standard();
        let thalassor = pantheon.get("thalassor").unwrap();
        let request = RoundRequest::new(GameDescriptor::new("wheel", 0.5, 2.0), 10.0);
        let effects = ActiveEffects::new();
        let mut pipeline = input(&request, &effects);
        pipeline.scorned = vec![thalassor];
        let mut dice = ScriptedDice::new([0.2, 0.0]);
        let resolution = resolve(&pipeline, &mut dice).unwrap();
        assert!(resolution.payout >= 0.0);
        assert!(resolution.payout.abs() < f64::EPSILON);
        assert!(!resolution.win);
    }

    #[test]
    fn forgiveness_turns_loss_into_canonical_win() {
        let request = RoundRequest::new(GameDescriptor::new("wheel", 0.1, 2.0), 10.0);
        let mut effects = ActiveEffects::new();
        effects.grant(TemporaryEffect::new(EffectKind::LossForgiveness, 1, 1.0));
        let mut dice = ScriptedDice::new([0.9]);
        let resolution = resolve(&input(&request, &effects), &mut dice).unwrap();
        assert!(!resolution.evaluation.win);
        assert!((resolution.payout - 10.0).abs() < 1e-9);
        assert!(resolution.win, "payout == stake counts as a win");
    }

    #[test]
    fn forgiveness_sets_payout_to_the_stake() {
        let mut effects = ActiveEffects::new();
        effects.grant(TemporaryEffect::new(EffectKind::LossForgiveness, 1, 1.0));
        let forgiven = loss_forgiveness(state(false, 30.0), &effects);
        assert!((forgiven.payout - 10.0).abs() < 1e-9);
        let untouched = loss_forgiveness(state(true, 30.0), &effects);
        assert!((untouched.payout - 30.0).abs() < 1e-9);
    }

    #[test]
    fn boost_only_multiplies_wins() {
        let mut effects = ActiveEffects::new();
        effects.grant(TemporaryEffect::new(EffectKind::PayoutBoost, 1, 2.0));
        let won = payout_boost(state(true, 20.0), &effects);
        assert!((won.payout - 40.0).abs() < 1e-9);
        let lost = payout_boost(state(false, 3.0), &effects);
        assert!((lost.payout - 3.0).abs() < 1e-9);
    }

    #[test]
    fn canonical_verdict_follows_payout() {
        assert!(canonical(state(false, 10.0)).win);
        assert!(!canonical(state(true, 9.99)).win);
    }
}
