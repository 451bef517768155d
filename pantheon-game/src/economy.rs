//! Per-player economy: allegiance, loyalty and charge counters, temporary
//! effects, scorn, and the running balance.
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{EchoConfig, EconomyConfig};
use crate::dice::Dice;
use crate::effects::{ActiveEffects, EffectKind, TemporaryEffect};
use crate::error::PantheonError;
use crate::intervention::InterventionEvent;
use crate::ledger::InfluenceLedger;
use crate::numbers::{non_negative, probability};
use crate::pantheon::{EntityId, Pantheon};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEconomyState {
    pub patron: Option<EntityId>,
    #[serde(default)]
    pub loyalty: BTreeMap<EntityId, f64>,
    #[serde(default)]
    pub charge: BTreeMap<EntityId, f64>,
    #[serde(default)]
    pub effects: ActiveEffects,
    /// Abandoned patrons, most recent last.
    #[serde(default)]
    pub scorned: Vec<EntityId>,
    #[serde(default)]
    pub resentment: f64,
    #[serde(default)]
    pub losing_streak: u32,
    pub peak_balance: f64,
    pub balance: f64,
    #[serde(default)]
    pub intervention: Option<InterventionEvent>,
    #[serde(default)]
    pub ascended: bool,
}

/// What changed when the player swore allegiance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PledgeReport {
    pub patron: EntityId,
    pub abandoned: Option<EntityId>,
    /// The new patron had been scorned and is now forgiven.
    pub reconciled: bool,
}

/// Counters credited on a canonical win.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Accrual {
    pub loyalty: f64,
    pub charge: f64,
}

/// A win that rebounded onto the most recently scorned god.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub target: EntityId,
    pub payout: f64,
    pub influence_moved: f64,
}

/// Result of a successful ultimate activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UltimateActivation {
    pub entity: EntityId,
    pub name: String,
    pub effect: TemporaryEffect,
    pub loyalty_sacrificed: f64,
}

impl PlayerEconomyState {
    #[must_use]
    pub fn new(starting_balance: f64) -> Self {
        let balance = non_negative(starting_balance);
        Self {
            patron: None,
            loyalty: BTreeMap::new(),
            charge: BTreeMap::new(),
            effects: ActiveEffects::new(),
            scorned: Vec::new(),
            resentment: 0.0,
            losing_streak: 0,
            peak_balance: balance,
            balance,
            intervention: None,
            ascended: false,
        }
    }

    #[must_use]
    pub fn loyalty_to(&self, id: &str) -> f64 {
        self.loyalty.get(id).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn charge_for(&self, id: &str) -> f64 {
        self.charge.get(id).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn patron_loyalty(&self) -> f64 {
        self.patron
            .as_ref()
            .map_or(0.0, |patron| self.loyalty_to(patron.as_str()))
    }

    #[must_use]
    pub fn is_scorned(&self, id: &str) -> bool {
        self.scorned.iter().any(|scorned| scorned.as_str() == id)
    }

    #[must_use]
    pub fn most_recent_scorned(&self) -> Option<&EntityId> {
        self.scorned.last()
    }

    /// Share of all loyalty that belongs to the patron, in `[0, 1]`.
    #[must_use]
    pub fn focus_score(&self) -> f64 {
        let total: f64 = self.loyalty.values().copied().map(non_negative).sum();
        if total <= 0.0 {
            return 0.0;
        }
        probability(self.patron_loyalty() / total)
    }

    /// Swear allegiance to `id`. The previous patron is scorned and
    /// resentment grows; pledging to a scorned god forgives it.
    ///
    /// # Errors
    ///
    /// Returns [`PantheonError::UnknownEntity`] when `id` is not in the roster.
    pub fn pledge(
        &mut self,
        pantheon: &Pantheon,
        id: &str,
        echo: &EchoConfig,
    ) -> Result<PledgeReport, PantheonError> {
        let Some(entity) = pantheon.get(id) else {
            return Err(PantheonError::UnknownEntity(EntityId::new(id)));
        };
        let target = entity.id.clone();
        if self.patron.as_ref() == Some(&target) {
            return Ok(PledgeReport {
                patron: target,
                abandoned: None,
                reconciled: false,
            });
        }

        let abandoned = self.patron.take();
        if let Some(previous) = &abandoned {
            self.scorned.retain(|scorned| scorned != previous);
            self.scorned.push(previous.clone());
            self.resentment += non_negative(echo.resentment_per_abandonment);
        }
        let before = self.scorned.len();
        self.scorned.retain(|scorned| *scorned != target);
        let reconciled = self.scorned.len() != before;
        self.patron = Some(target.clone());
        info!(
            "pledged to {target} abandoned={abandoned:?} reconciled={reconciled} resentment={:.0}",
            self.resentment
        );
        Ok(PledgeReport {
            patron: target,
            abandoned,
            reconciled,
        })
    }

    /// Credit loyalty and charge toward the patron after a canonical win.
    pub fn accrue(&mut self, stake: f64, economy: &EconomyConfig) -> Accrual {
        let Some(patron) = self.patron.clone() else {
            return Accrual::default();
        };
        let stake = non_negative(stake);
        let accrual = Accrual {
            loyalty: stake * non_negative(economy.loyalty_rate),
            charge: stake * non_negative(economy.charge_rate),
        };
        *self.loyalty.entry(patron.clone()).or_insert(0.0) += accrual.loyalty;
        *self.charge.entry(patron).or_insert(0.0) += accrual.charge;
        accrual
    }

    /// Debit the stake and credit the payout. On a losing round the stake
    /// charged is halved while the half-reaping blessing is active. Returns
    /// the balance change.
    pub fn settle_balance(&mut self, stake: f64, payout: f64, economy: &EconomyConfig) -> f64 {
        let stake = non_negative(stake);
        let payout = non_negative(payout);
        let charged = if payout < stake && self.effects.is_active(EffectKind::HalfReaping) {
            stake * probability(economy.half_reaping_factor)
        } else {
            stake
        };
        let net = payout - charged;
        let before = self.balance;
        self.balance = non_negative(self.balance + net);
        self.balance - before
    }

    /// Resentment may echo a winning round onto the most recently scorned
    /// god: the payout is multiplied and the stake moves from the patron's
    /// influence to the scorned god's. Draws only when every precondition
    /// holds.
    ///
    /// # Errors
    ///
    /// Propagates ledger errors when either god is missing from the ledger.
    pub fn echo(
        &self,
        ledger: &mut InfluenceLedger,
        stake: f64,
        payout: f64,
        echo: &EchoConfig,
        dice: &mut dyn Dice,
    ) -> Result<Option<Echo>, PantheonError> {
        let (Some(patron), Some(target)) = (&self.patron, self.most_recent_scorned()) else {
            return Ok(None);
        };
        if self.resentment <= 0.0 {
            return Ok(None);
        }
        let chance = echo.chance(self.resentment);
        if chance <= 0.0 || !dice.chance(chance) {
            return Ok(None);
        }
        let moved = ledger.transfer(patron.as_str(), target.as_str(), non_negative(stake))?;
        Ok(Some(Echo {
            target: target.clone(),
            payout: non_negative(payout * echo.payout_multiplier),
            influence_moved: moved.credited,
        }))
    }

    /// Update the streak and the peak watermark after a round.
    pub fn record_verdict(&mut self, win: bool) {
        self.losing_streak = if win {
            0
        } else {
            self.losing_streak.saturating_add(1)
        };
        self.peak_balance = self.peak_balance.max(self.balance);
    }

    /// Spend `id`'s accumulated charge on its ultimate.
    ///
    /// # Errors
    ///
    /// Returns [`PantheonError::UnknownEntity`] for an id outside the roster
    /// and [`PantheonError::InsufficientCharge`] when the charge is below cost.
    pub fn activate_ultimate(
        &mut self,
        id: &str,
        pantheon: &Pantheon,
        economy: &EconomyConfig,
    ) -> Result<UltimateActivation, PantheonError> {
        let entity = pantheon
            .get(id)
            .ok_or_else(|| PantheonError::UnknownEntity(EntityId::from(id)))?;
        let god = entity.id.clone();
        let ultimate = &entity.ultimate;
        let charge = self.charge_for(id);
        if charge < ultimate.cost {
            return Err(PantheonError::InsufficientCharge {
                entity: god,
                charge,
                cost: ultimate.cost,
            });
        }

        let effect = TemporaryEffect::new(ultimate.grants, ultimate.duration, ultimate.potency);
        self.effects.grant(effect);
        self.charge.insert(god.clone(), 0.0);
        let mut loyalty_sacrificed = 0.0;
        if ultimate.self_sacrifice {
            let loyalty = self.loyalty_to(id);
            let kept = 1.0 - probability(economy.self_sacrifice_fraction);
            let remaining = non_negative(loyalty * kept);
            loyalty_sacrificed = loyalty - remaining;
            self.loyalty.insert(god.clone(), remaining);
        }
        info!(
            "{} activated {} ({} for {} rounds)",
            entity.name, ultimate.name, ultimate.grants, ultimate.duration
        );
        Ok(UltimateActivation {
            entity: god,
            name: ultimate.name.clone(),
            effect,
            loyalty_sacrificed,
        })
    }

    /// Age every temporary effect by one round.
    pub fn tick_effects(&mut self) -> Vec<EffectKind> {
        self.effects.tick()
    }

    /// Point every reference to `old` at `new`.
    pub fn remap_entity(&mut self, old: &str, new: &EntityId) {
        if self.patron.as_ref().is_some_and(|patron| patron.as_str() == old) {
            self.patron = Some(new.clone());
        }
        for scorned in &mut self.scorned {
            if scorned.as_str() == old {
                *scorned = new.clone();
            }
        }
        for map in [&mut self.loyalty, &mut self.charge] {
            if let Some(value) = map.remove(old) {
                map.insert(new.clone(), value);
            }
        }
        if let Some(event) = &mut self.intervention
            && event.entity.as_str() == old
        {
            event.entity = new.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::dice::ScriptedDice;

    fn pledged(id: &str) -> (PlayerEconomyState, Pantheon, EngineConfig) {
        let pantheon = Pantheon::standard();
        let config = EngineConfig::default();
        let mut state = PlayerEconomyState::new(config.economy.starting_balance);
        state.pledge(&pantheon, id, &config.echo).unwrap();
        (state, pantheon, config)
    }

    #[test]
    fn pledging_away_scorns_previous_patron() {
        let (mut state, pantheon, config) = pledged("solara");
        let report = state.pledge(&pantheon, "nyxara", &config.echo).unwrap();
        assert_eq!(report.abandoned, Some(EntityId::from("solara")));
        assert_eq!(state.scorned, vec![EntityId::from("solara")]);
        assert!((state.resentment - 50.0).abs() < f64::EPSILON);

        state.pledge(&pantheon, "kragmor", &config.echo).unwrap();
        assert_eq!(state.most_recent_scorned(), Some(&EntityId::from("nyxara")));

        let report = state.pledge(&pantheon, "solara", &config.echo).unwrap();
        assert!(report.reconciled);
        assert!(!state.is_scorned("solara"));
        assert_eq!(state.scorned, vec![
            EntityId::from("nyxara"),
            EntityId::from("kragmor")
        ]);
        assert!((state.resentment - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn repledging_same_patron_changes_nothing() {
        let (mut state, pantheon, config) = pledged("solara");
        let before = state.clone();
        state.pledge(&pantheon, "solara", &config.echo).unwrap();
        assert_eq!(state, before);
        assert!(state.pledge(&pantheon, "nobody", &config.echo).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn accrual_follows_stake() {
        let (mut state, _, config) = pledged("verdana");
        let gained = state.accrue(40.0, &config.economy);
        assert!((gained.loyalty - 10.0).abs() < 1e-9);
        assert!((gained.charge - 4.0).abs() < 1e-9);
        assert!((state.patron_loyalty() - 10.0).abs() < 1e-9);
        let mut unpledged = PlayerEconomyState::new(100.0);
        assert_eq!(unpledged.accrue(40.0, &config.economy), Accrual::default());
    }

    #[test]
    fn half_reaping_halves_losses_only() {
        let (mut state, _, config) = pledged("kragmor");
        state
            .effects
            .grant(TemporaryEffect::new(EffectKind::HalfReaping, 2, 1.0));
        let lost = state.settle_balance(100.0, 0.0, &config.economy);
        assert!((lost + 50.0).abs() < 1e-9);
        let won = state.settle_balance(100.0, 300.0, &config.economy);
        assert!((won - 200.0).abs() < 1e-9);
    }

    #[test]
    fn half_reaping_halves_the_stake_before_a_partial_payout() {
        let (mut state, _, config) = pledged("kragmor");
        state
            .effects
            .grant(TemporaryEffect::new(EffectKind::HalfReaping, 1, 1.0));
        let consoled = state.settle_balance(10.0, 2.5, &config.economy);
        assert!((consoled + 2.5).abs() < 1e-9);

        let (mut plain, _, config) = pledged("kragmor");
        let consoled = plain.settle_balance(10.0, 2.5, &config.economy);
        assert!((consoled + 7.5).abs() < 1e-9);
    }

    #[test]
    fn balance_never_goes_negative() {
        let mut state = PlayerEconomyState::new(5.0);
        state.settle_balance(50.0, 0.0, &EconomyConfig::default());
        assert!(state.balance.abs() < f64::EPSILON);
    }

    #[test]
    fn echo_requires_resentment_and_moves_stake() {
        let (mut state, pantheon, config) = pledged("solara");
        let mut ledger = InfluenceLedger::from_pantheon(&pantheon);
        let mut dice = ScriptedDice::new([0.0]);
        assert!(
            state
                .echo(&mut ledger, 10.0, 20.0, &config.echo, &mut dice)
                .unwrap()
                .is_none()
        );
        assert_eq!(dice.draws(), 0);

        state.pledge(&pantheon, "nyxara", &config.echo).unwrap();
        let echo = state
            .echo(&mut ledger, 10.0, 20.0, &config.echo, &mut dice)
            .unwrap()
            .unwrap();
        assert_eq!(echo.target, EntityId::from("solara"));
        assert!((echo.payout - 40.0).abs() < 1e-9);
        assert!((ledger.get("solara").unwrap() - 130.0).abs() < 1e-9);
        assert!((ledger.get("nyxara").unwrap() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn ultimate_requires_full_charge_and_resets_it() {
        let (mut state, pantheon, config) = pledged("solara");
        state.charge.insert(EntityId::from("solara"), 999.0);
        let before = state.clone();
        let err = state.activate_ultimate("solara", &pantheon, &config.economy).unwrap_err();
        assert!(matches!(err, PantheonError::InsufficientCharge { .. }));
        assert_eq!(state, before);

        state.charge.insert(EntityId::from("solara"), 1_000.0);
        let activation = state.activate_ultimate("solara", &pantheon, &config.economy).unwrap();
        assert_eq!(activation.effect.kind, EffectKind::LuckIncrease);
        assert!(state.charge_for("solara").abs() < f64::EPSILON);
        assert!(state.effects.is_active(EffectKind::LuckIncrease));

        let err = state.activate_ultimate("nobody", &pantheon, &config.economy).unwrap_err();
        assert!(matches!(err, PantheonError::UnknownEntity(_)));
    }

    #[test]
    fn self_sacrifice_costs_a_fifth_of_loyalty() {
        let (mut state, pantheon, config) = pledged("nyxara");
        state.charge.insert(EntityId::from("nyxara"), 800.0);
        state.loyalty.insert(EntityId::from("nyxara"), 100.0);
        let activation = state.activate_ultimate("nyxara", &pantheon, &config.economy).unwrap();
        assert!((activation.loyalty_sacrificed - 20.0).abs() < 1e-9);
        assert!((state.loyalty_to("nyxara") - 80.0).abs() < 1e-9);

        state.charge.insert(EntityId::from("nyxara"), 800.0);
        state.loyalty.insert(EntityId::from("nyxara"), 0.0);
        state.activate_ultimate("nyxara", &pantheon, &config.economy).unwrap();
        assert!(state.loyalty_to("nyxara").abs() < f64::EPSILON);
    }

    #[test]
    fn streak_and_peak_track_verdicts() {
        let mut state = PlayerEconomyState::new(100.0);
        state.record_verdict(false);
        state.record_verdict(false);
        assert_eq!(state.losing_streak, 2);
        state.balance = 250.0;
        state.record_verdict(true);
        assert_eq!(state.losing_streak, 0);
        assert!((state.peak_balance - 250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn focus_score_is_patron_share() {
        let (mut state, _, _) = pledged("solara");
        assert!(state.focus_score().abs() < f64::EPSILON);
        state.loyalty.insert(EntityId::from("solara"), 30.0);
        state.loyalty.insert(EntityId::from("nyxara"), 10.0);
        assert!((state.focus_score() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn remap_rewrites_every_reference() {
        let (mut state, pantheon, config) = pledged("mercurio");
        state.loyalty.insert(EntityId::from("mercurio"), 12.0);
        state.pledge(&pantheon, "solara", &config.echo).unwrap();
        state.pledge(&pantheon, "mercurio", &config.echo).unwrap();
        state.remap_entity("mercurio", &EntityId::from("ascendant"));
        assert_eq!(state.patron, Some(EntityId::from("ascendant")));
        assert!((state.loyalty_to("ascendant") - 12.0).abs() < f64::EPSILON);
        assert!(!state.loyalty.contains_key("mercurio"));
    }
}
