//! A single player's session: roster, influence ledger, economy and the fate
//! stream, driven through the player actions.
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::ascension::{self, AscensionOutcome, AscensionRequest};
use crate::clash::{ClashProgress, ClashState, Stance, choose_opponent};
use crate::config::{ConfigError, EngineConfig};
use crate::dice::{Dice, FateStream};
use crate::economy::{Accrual, Echo, PlayerEconomyState, PledgeReport, UltimateActivation};
use crate::effects::EffectKind;
use crate::error::PantheonError;
use crate::evaluator::validate_choice;
use crate::game::{Choice, RoundRequest};
use crate::intervention::{self, InterventionEvent};
use crate::ledger::{InfluenceLedger, Redistribution};
use crate::narration::{NarrationRequest, Narrator, TemplateNarrator, narrate_or_fallback};
use crate::pantheon::{Entity, EntityId, Pantheon};
use crate::pipeline::{EffectLog, PipelineInput, resolve};
use crate::snapshot::{SNAPSHOT_VERSION, Snapshot, SnapshotError};

/// Everything a finished round reports back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub game: String,
    pub stake: f64,
    /// Canonical verdict: `payout >= stake`.
    pub win: bool,
    pub payout: f64,
    pub near_miss: bool,
    pub messages: EffectLog,
    pub roll: f64,
    pub effective_win_chance: f64,
    pub winning_token: Option<Choice>,
    pub echo: Option<Echo>,
    pub balance: f64,
    pub balance_delta: f64,
    pub redistribution: Option<Redistribution>,
    pub accrual: Accrual,
    pub expired_effects: Vec<EffectKind>,
    pub intervention_fired: bool,
    pub narration: String,
}

pub struct PantheonSession<D: Dice = FateStream> {
    config: EngineConfig,
    pantheon: Pantheon,
    ledger: InfluenceLedger,
    economy: PlayerEconomyState,
    clash: Option<ClashState>,
    dice: D,
    seed: u64,
    rounds_played: u64,
    narrator: Box<dyn Narrator>,
}

impl PantheonSession<FateStream> {
    /// Fresh session over the standard roster, seeded from `seed`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` fails validation.
    pub fn new(seed: u64, config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_pantheon(seed, config, Pantheon::standard())
    }

    /// Fresh seeded session over a custom roster.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` fails validation.
    pub fn with_pantheon(
        seed: u64,
        config: EngineConfig,
        pantheon: Pantheon,
    ) -> Result<Self, ConfigError> {
        let dice = FateStream::from_user_seed(seed);
        let mut session = PantheonSession::with_dice(dice, config, pantheon)?;
        session.seed = seed;
        Ok(session)
    }

    /// Rebuild a seeded session from a snapshot, fast-forwarding the fate
    /// stream past every draw the snapshot had consumed.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot fails verification or `config` fails
    /// validation.
    pub fn restore(snapshot: Snapshot, config: EngineConfig) -> Result<Self, SnapshotError> {
        config.validate()?;
        snapshot.verify()?;
        let mut dice = FateStream::from_user_seed(snapshot.seed);
        for _ in 0..snapshot.draws {
            dice.roll();
        }
        Ok(Self {
            config,
            pantheon: snapshot.pantheon,
            ledger: snapshot.influence,
            economy: snapshot.economy,
            clash: snapshot.clash,
            dice,
            seed: snapshot.seed,
            rounds_played: snapshot.rounds_played,
            narrator: Box::new(TemplateNarrator),
        })
    }
}

impl<D: Dice> PantheonSession<D> {
    /// Session driven by an arbitrary dice source.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` fails validation.
    pub fn with_dice(
        dice: D,
        config: EngineConfig,
        pantheon: Pantheon,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let ledger = InfluenceLedger::from_pantheon(&pantheon);
        let economy = PlayerEconomyState::new(config.economy.starting_balance);
        Ok(Self {
            config,
            pantheon,
            ledger,
            economy,
            clash: None,
            dice,
            seed: 0,
            rounds_played: 0,
            narrator: Box::new(TemplateNarrator),
        })
    }

    #[must_use]
    pub fn with_narrator(mut self, narrator: Box<dyn Narrator>) -> Self {
        self.narrator = narrator;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn pantheon(&self) -> &Pantheon {
        &self.pantheon
    }

    #[must_use]
    pub const fn ledger(&self) -> &InfluenceLedger {
        &self.ledger
    }

    #[must_use]
    pub const fn economy(&self) -> &PlayerEconomyState {
        &self.economy
    }

    #[must_use]
    pub const fn clash(&self) -> Option<&ClashState> {
        self.clash.as_ref()
    }

    #[must_use]
    pub const fn balance(&self) -> f64 {
        self.economy.balance
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub const fn rounds_played(&self) -> u64 {
        self.rounds_played
    }

    #[must_use]
    pub fn draws(&self) -> u64 {
        self.dice.draws()
    }

    #[must_use]
    pub fn dominant(&self) -> Option<&Entity> {
        self.ledger
            .dominant()
            .and_then(|id| self.pantheon.get(id.as_str()))
    }

    #[must_use]
    pub fn patron(&self) -> Option<&Entity> {
        self.economy
            .patron
            .as_ref()
            .and_then(|id| self.pantheon.get(id.as_str()))
    }

    #[must_use]
    pub const fn pending_intervention(&self) -> Option<&InterventionEvent> {
        self.economy.intervention.as_ref()
    }

    /// Swear allegiance to a god.
    ///
    /// # Errors
    ///
    /// Rejects unknown gods and pledges made during a clash.
    pub fn pledge(&mut self, id: &str) -> Result<PledgeReport, PantheonError> {
        if self.clash.is_some() {
            return Err(PantheonError::ClashInProgress);
        }
        self.economy.pledge(&self.pantheon, id, &self.config.echo)
    }

    /// Resolve one wager end to end.
    ///
    /// # Errors
    ///
    /// Rejects the request, leaving the session untouched, when a clash is
    /// underway, the stake is invalid or exceeds the balance, the owner is
    /// unknown, or the choice does not fit the game.
    pub fn play_round(&mut self, request: &RoundRequest) -> Result<RoundOutcome, PantheonError> {
        self.validate_round(request)?;
        let stake = request.stake;

        let resolution = {
            let patron = self
                .economy
                .patron
                .as_ref()
                .and_then(|id| self.pantheon.get(id.as_str()));
            let scorned = self
                .economy
                .scorned
                .iter()
                .filter_map(|id| self.pantheon.get(id.as_str()))
                .collect();
            let dominant = self
                .ledger
                .dominant()
                .and_then(|id| self.pantheon.get(id.as_str()));
            let input = PipelineInput {
                request,
                patron,
                patron_loyalty: self.economy.patron_loyalty(),
                scorned,
                dominant,
                effects: &self.economy.effects,
                near_miss_band: self.config.economy.near_miss_band,
            };
            resolve(&input, &mut self.dice)?
        };
        let mut messages = resolution.messages;
        let mut payout = resolution.payout;

        let echo = if resolution.win {
            self.economy.echo(
                &mut self.ledger,
                stake,
                payout,
                &self.config.echo,
                &mut self.dice,
            )?
        } else {
            None
        };
        if let Some(echo) = &echo {
            payout = echo.payout;
            messages.push(format!(
                "Your winnings echo toward {}, who remembers you.",
                self.entity_name(&echo.target)
            ));
        }

        let balance_delta = self
            .economy
            .settle_balance(stake, payout, &self.config.economy);

        let target = request
            .game
            .owner
            .as_ref()
            .filter(|owner| self.ledger.contains(owner.as_str()))
            .or(self.economy.patron.as_ref())
            .cloned();
        let redistribution = match target {
            Some(target) => Some(self.ledger.redistribute(
                target.as_str(),
                stake,
                self.config.economy.redistribution_fraction,
                resolution.win,
            )?),
            None => None,
        };

        let accrual = if resolution.win {
            self.economy.accrue(stake, &self.config.economy)
        } else {
            Accrual::default()
        };

        let expired_effects = self.economy.tick_effects();
        for kind in &expired_effects {
            messages.push(format!("The {kind} blessing fades."));
        }
        self.economy.record_verdict(resolution.win);

        let intervention_fired = intervention::monitor(
            &mut self.economy,
            &self.ledger,
            &self.pantheon,
            &self.config.intervention,
            &mut self.dice,
        );
        if intervention_fired && let Some(event) = &self.economy.intervention {
            messages.push(event.message.clone());
        }

        let narration = narrate_or_fallback(
            self.narrator.as_ref(),
            &NarrationRequest {
                game: request.game.tag.clone(),
                win: resolution.win,
                stake,
                payout_multiplier: resolution.odds.payout_multiplier,
                focus_score: self.economy.focus_score(),
            },
        );
        self.rounds_played += 1;
        debug!(
            "round {} {} stake={stake:.2} payout={payout:.2} balance={:.2}",
            self.rounds_played,
            request.game.tag,
            self.economy.balance
        );

        Ok(RoundOutcome {
            game: request.game.tag.clone(),
            stake,
            win: resolution.win,
            payout,
            near_miss: resolution.evaluation.near_miss,
            messages,
            roll: resolution.evaluation.roll,
            effective_win_chance: resolution.odds.win_chance,
            winning_token: resolution.evaluation.winning_token,
            echo,
            balance: self.economy.balance,
            balance_delta,
            redistribution,
            accrual,
            expired_effects,
            intervention_fired,
            narration,
        })
    }

    fn validate_round(&self, request: &RoundRequest) -> Result<(), PantheonError> {
        if self.clash.is_some() {
            return Err(PantheonError::ClashInProgress);
        }
        self.validate_stake(request.stake)?;
        if let Some(owner) = &request.game.owner
            && !self.pantheon.contains(owner.as_str())
            && !self.ledger.contains(owner.as_str())
        {
            return Err(PantheonError::UnknownEntity(owner.clone()));
        }
        validate_choice(&request.game, request.choice)
    }

    fn validate_stake(&self, stake: f64) -> Result<(), PantheonError> {
        if !stake.is_finite() || stake <= 0.0 {
            return Err(PantheonError::InvalidStake(stake));
        }
        if stake > self.economy.balance {
            return Err(PantheonError::StakeExceedsBalance {
                stake,
                balance: self.economy.balance,
            });
        }
        Ok(())
    }

    fn entity_name(&self, id: &EntityId) -> String {
        self.pantheon
            .get(id.as_str())
            .map_or_else(|| id.to_string(), |entity| entity.name.clone())
    }

    /// Spend a god's charge on its ultimate power.
    ///
    /// # Errors
    ///
    /// Rejects an unknown god or a charge below the ultimate's cost.
    pub fn activate_ultimate(&mut self, id: &str) -> Result<UltimateActivation, PantheonError> {
        self.economy
            .activate_ultimate(id, &self.pantheon, &self.config.economy)
    }

    /// Apply the outstanding intervention.
    ///
    /// # Errors
    ///
    /// Returns [`PantheonError::NoIntervention`] when none is waiting.
    pub fn claim_intervention(&mut self) -> Result<InterventionEvent, PantheonError> {
        intervention::claim(&mut self.economy)
    }

    /// Send the patron's champion against a rival, escrowing `stake`, and play
    /// the opening exchange.
    ///
    /// # Errors
    ///
    /// Rejects a second clash, a missing patron, an invalid stake, or a
    /// pantheon with no rival to answer.
    pub fn issue_clash_challenge(
        &mut self,
        stake: f64,
        stance: Stance,
    ) -> Result<ClashProgress, PantheonError> {
        if self.clash.is_some() {
            return Err(PantheonError::ClashInProgress);
        }
        let champion = self.economy.patron.clone().ok_or(PantheonError::NoPatron)?;
        self.validate_stake(stake)?;
        let opponent =
            choose_opponent(&self.ledger, champion.as_str()).ok_or(PantheonError::NoRival)?;

        self.economy.balance -= stake;
        info!("{champion} challenges {opponent} with {stake:.2} in escrow");
        self.clash = Some(ClashState::new(champion, opponent, stake, &self.config.clash));
        self.resolve_clash(stance)
    }

    /// Play the next exchange of the clash underway, settling it once a
    /// champion falls.
    ///
    /// # Errors
    ///
    /// Returns [`PantheonError::NoActiveClash`] when no clash is underway.
    pub fn resolve_clash(&mut self, stance: Stance) -> Result<ClashProgress, PantheonError> {
        let clash = self.clash.as_mut().ok_or(PantheonError::NoActiveClash)?;
        let exchange = clash.exchange(stance, &self.config.clash, &mut self.dice);
        let challenger_health = clash.challenger_health;
        let opponent_health = clash.opponent_health;
        let settlement = if clash.winner().is_some() {
            let finished = clash.clone();
            let settlement =
                finished.settle(&mut self.economy, &mut self.ledger, &self.config.clash)?;
            self.clash = None;
            Some(settlement)
        } else {
            None
        };
        Ok(ClashProgress {
            exchange,
            challenger_health,
            opponent_health,
            settlement,
        })
    }

    /// Perform the one-time ascension ritual.
    ///
    /// # Errors
    ///
    /// Rejects a repeat ascension, an unaffordable one, a taken id, or an
    /// attempt during a clash.
    pub fn ascend(
        &mut self,
        request: &AscensionRequest,
    ) -> Result<AscensionOutcome, PantheonError> {
        if self.clash.is_some() {
            return Err(PantheonError::ClashInProgress);
        }
        let (pantheon, outcome) = ascension::ascend(
            request,
            &self.pantheon,
            &mut self.ledger,
            &mut self.economy,
            self.config.ascension_cost.0,
        )?;
        self.pantheon = pantheon;
        Ok(outcome)
    }

    /// Capture the session for persistence.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized for its checksum.
    pub fn snapshot(&self) -> Result<Snapshot, SnapshotError> {
        Snapshot {
            version: SNAPSHOT_VERSION,
            seed: self.seed,
            draws: self.dice.draws(),
            rounds_played: self.rounds_played,
            pantheon: self.pantheon.clone(),
            influence: self.ledger.clone(),
            economy: self.economy.clone(),
            clash: self.clash.clone(),
            checksum: 0,
        }
        .seal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedDice;
    use crate::game::{ChoiceRule, GameDescriptor};

    fn scripted(rolls: impl IntoIterator<Item = f64>) -> PantheonSession<ScriptedDice> {
        PantheonSession::with_dice(
            ScriptedDice::new(rolls),
            EngineConfig::default(),
            Pantheon::standard(),
        )
        .unwrap()
    }

    fn plain_game() -> GameDescriptor {
        GameDescriptor::new("plain", 0.5, 2.0)
    }

    #[test]
    fn rejected_requests_touch_nothing() {
        let mut session = scripted([0.1]);
        let coin = GameDescriptor::new("coin", 0.5, 1.9).with_choice_rule(ChoiceRule::Sides);
        let before = session.snapshot().unwrap();
        assert!(matches!(
            session.play_round(&RoundRequest::new(coin, 10.0)),
            Err(PantheonError::InvalidChoice { .. })
        ));
        assert!(matches!(
            session.play_round(&RoundRequest::new(plain_game(), 0.0)),
            Err(PantheonError::InvalidStake(_))
        ));
        assert!(matches!(
            session.play_round(&RoundRequest::new(plain_game(), 5_000.0)),
            Err(PantheonError::StakeExceedsBalance { .. })
        ));
        let ghost = plain_game().owned_by("ghost");
        assert!(matches!(
            session.play_round(&RoundRequest::new(ghost, 10.0)),
            Err(PantheonError::UnknownEntity(_))
        ));
        assert_eq!(session.snapshot().unwrap(), before);
        assert_eq!(session.draws(), 0);
    }

    #[test]
    fn winning_round_settles_every_subsystem() {
        // Kragmor dominates: 0.5 - 0.04 = 0.46 chance, 2.2x multiplier.
        let mut session = scripted([0.1]);
        session.pledge("solara").unwrap();
        let outcome = session
            .play_round(&RoundRequest::new(plain_game(), 100.0))
            .unwrap();
        assert!(outcome.win);
        assert!((outcome.payout - 220.0).abs() < 1e-9);
        assert!((outcome.balance - 1_120.0).abs() < 1e-9);
        assert!((outcome.accrual.loyalty - 25.0).abs() < 1e-9);
        assert!((session.economy().charge_for("solara") - 10.0).abs() < 1e-9);
        let moved = outcome.redistribution.unwrap();
        assert!((moved.moved_in - 50.0).abs() < 1e-9);
        assert!((session.ledger().get("solara").unwrap() - 170.0).abs() < 1e-9);
        assert!(!outcome.narration.is_empty());
        assert_eq!(session.rounds_played(), 1);
    }

    #[test]
    fn unowned_game_without_patron_leaves_ledger_alone() {
        let mut session = scripted([0.9]);
        let before = session.ledger().clone();
        let outcome = session
            .play_round(&RoundRequest::new(plain_game(), 10.0))
            .unwrap();
        assert!(!outcome.win);
        assert!(outcome.redistribution.is_none());
        assert_eq!(session.ledger(), &before);
        assert!((session.balance() - 990.0).abs() < 1e-9);
    }

    #[test]
    fn rounds_are_blocked_during_a_clash() {
        let mut session = scripted([0.5]);
        session.pledge("solara").unwrap();
        let progress = session.issue_clash_challenge(50.0, Stance::Strike).unwrap();
        assert!(progress.settlement.is_none());
        assert!((session.balance() - 950.0).abs() < 1e-9);
        assert_eq!(
            session.play_round(&RoundRequest::new(plain_game(), 10.0)),
            Err(PantheonError::ClashInProgress)
        );
        assert_eq!(
            session.issue_clash_challenge(10.0, Stance::Guard),
            Err(PantheonError::ClashInProgress)
        );
    }

    #[test]
    fn clash_requires_patron() {
        let mut session = scripted([]);
        assert_eq!(
            session.issue_clash_challenge(10.0, Stance::Strike),
            Err(PantheonError::NoPatron)
        );
        assert_eq!(session.resolve_clash(Stance::Strike), Err(PantheonError::NoActiveClash));
    }

    #[test]
    fn seeded_snapshot_restores_mid_stream() {
        let mut session = PantheonSession::new(42, EngineConfig::default()).unwrap();
        session.pledge("thalassor").unwrap();
        let game = GameDescriptor::standard_floor().remove(0);
        for _ in 0..3 {
            session.play_round(&RoundRequest::new(game.clone(), 10.0)).unwrap();
        }
        let snapshot = session.snapshot().unwrap();
        let mut restored = PantheonSession::restore(snapshot, EngineConfig::default()).unwrap();
        let a = session.play_round(&RoundRequest::new(game.clone(), 10.0)).unwrap();
        let b = restored.play_round(&RoundRequest::new(game, 10.0)).unwrap();
        assert_eq!(a, b);
        assert_eq!(session.snapshot().unwrap(), restored.snapshot().unwrap());
    }

    #[test]
    fn restore_rejects_an_invalid_config() {
        let session = PantheonSession::new(42, EngineConfig::default()).unwrap();
        let snapshot = session.snapshot().unwrap();
        let mut config = EngineConfig::default();
        config.intervention.streak_threshold = 0;
        let err = PantheonSession::restore(snapshot, config).err().unwrap();
        assert!(matches!(err, SnapshotError::Config(ConfigError::StreakThreshold)));
    }
}
