use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use log::debug;
use pantheon_game::{
    AscensionOutcome, AscensionRequest, ClashSettlement, EngineConfig, GameDescriptor,
    PantheonError, PantheonSession, RoundOutcome, RoundRequest, Snapshot, UltimateActivation,
};

use super::policy::{GameplayStrategy, PlayerPolicy};

pub const DEFAULT_ROUNDS: usize = 60;
const CLASH_STAKE_FRACTION: f64 = 0.1;
const MAX_CLASH_EXCHANGES: usize = 64;

/// Declarative plan for running a simulated session.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub strategy: GameplayStrategy,
    pub rounds: usize,
    pub config: EngineConfig,
    /// Round before which the patron's champion is sent into a clash.
    pub clash_at: Option<usize>,
    /// Round before which the player ascends.
    pub ascend_at: Option<usize>,
    /// Replay the plan and restore its final snapshot to check determinism.
    pub verify_replay: bool,
    pub expectations: Vec<SimulationExpectation>,
}

impl SimulationPlan {
    #[must_use]
    pub fn new(strategy: GameplayStrategy) -> Self {
        Self {
            strategy,
            rounds: DEFAULT_ROUNDS,
            config: EngineConfig::default(),
            clash_at: None,
            ascend_at: None,
            verify_replay: false,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn with_clash_at(mut self, round: usize) -> Self {
        self.clash_at = Some(round);
        self
    }

    #[must_use]
    pub const fn with_ascension_at(mut self, round: usize) -> Self {
        self.ascend_at = Some(round);
        self
    }

    #[must_use]
    pub const fn with_replay_check(mut self) -> Self {
        self.verify_replay = true;
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SimulationExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

/// Assertion hook run after a simulation completes.
type SimulationExpectationFn =
    Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SimulationExpectation(SimulationExpectationFn);

impl std::fmt::Debug for SimulationExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationExpectation").finish()
    }
}

impl SimulationExpectation {
    pub fn evaluate(&self, summary: &SimulationSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SimulationExpectation
where
    F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// One played round and what the player did around it.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub round: usize,
    pub policy_name: &'static str,
    pub rationale: Option<String>,
    pub claimed_intervention: bool,
    pub ultimate: Option<UltimateActivation>,
    pub outcome: RoundOutcome,
}

/// A clash fought during the run.
#[derive(Debug, Clone)]
pub struct ClashRecord {
    pub stake: f64,
    pub exchanges: usize,
    pub balance_before: f64,
    pub balance_after: f64,
    pub champion_loyalty_after: f64,
    pub settlement: ClashSettlement,
}

#[derive(Debug, Clone, Default)]
pub struct SessionMetrics {
    pub rounds_played: usize,
    pub wins: usize,
    pub losses: usize,
    pub near_misses: usize,
    pub echoes: usize,
    pub pledges: usize,
    pub interventions_fired: usize,
    pub interventions_claimed: usize,
    pub ultimates_fired: usize,
    pub peak_balance: f64,
    /// Actions the engine refused for reasons a scripted player should never hit.
    pub rejected_actions: Vec<String>,
}

impl SessionMetrics {
    fn record(&mut self, outcome: &RoundOutcome) {
        self.rounds_played += 1;
        if outcome.win {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        if outcome.near_miss {
            self.near_misses += 1;
        }
        if outcome.echo.is_some() {
            self.echoes += 1;
        }
        if outcome.intervention_fired {
            self.interventions_fired += 1;
        }
        self.peak_balance = self.peak_balance.max(outcome.balance);
    }
}

/// Outcome of a simulated session.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub strategy: GameplayStrategy,
    pub config: EngineConfig,
    pub turns: Vec<TurnRecord>,
    pub metrics: SessionMetrics,
    pub final_balance: f64,
    pub final_influence: Vec<(String, f64)>,
    pub checksum: u64,
    pub clash: Option<ClashRecord>,
    pub ascension: Option<AscensionOutcome>,
    /// Set when the plan asked for a replay: both runs produced the same rounds.
    pub replay_matched: Option<bool>,
    /// Set when the plan asked for a replay: the restored snapshot matched.
    pub restore_matched: Option<bool>,
    /// The run stopped early because the balance could not cover a stake.
    pub bankrupt: bool,
}

/// Headless deterministic runner for the engine.
#[derive(Clone, Debug)]
pub struct GameTester {
    verbose: bool,
}

impl GameTester {
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Run a plan for a seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects an action the scripted player
    /// is expected to be allowed to take.
    pub fn run_plan(&self, plan: &SimulationPlan, seed: u64) -> Result<SimulationSummary> {
        let mut summary = self.play(plan, seed)?;
        if plan.verify_replay {
            let replay = self.play(plan, seed)?;
            let same_rounds = replay.turns.len() == summary.turns.len()
                && replay
                    .turns
                    .iter()
                    .zip(&summary.turns)
                    .all(|(a, b)| a.outcome == b.outcome);
            summary.replay_matched = Some(same_rounds && replay.checksum == summary.checksum);
        }
        Ok(summary)
    }

    fn play(&self, plan: &SimulationPlan, seed: u64) -> Result<SimulationSummary> {
        let mut session = PantheonSession::new(seed, plan.config.clone())
            .context("engine configuration rejected")?;
        let mut policy = plan.strategy.create_policy(seed);
        let mut floor = GameDescriptor::standard_floor();
        let mut turns = Vec::with_capacity(plan.rounds);
        let mut metrics = SessionMetrics {
            peak_balance: session.balance(),
            ..SessionMetrics::default()
        };
        let mut clash = None;
        let mut ascension = None;
        let mut bankrupt = false;

        for round in 0..plan.rounds {
            if plan.ascend_at == Some(round) {
                let request = AscensionRequest::new("ascended", "The Ascended", "Who Was Mortal");
                match session.ascend(&request) {
                    Ok(outcome) => {
                        rebind_floor(&mut floor, &outcome);
                        ascension = Some(outcome);
                    }
                    Err(err) => metrics
                        .rejected_actions
                        .push(format!("round {round}: ascension refused: {err}")),
                }
            }

            if plan.clash_at == Some(round) {
                clash = run_clash(&mut session, policy.as_mut())?;
            }

            let claimed_intervention = if session.pending_intervention().is_some() {
                session.claim_intervention()?;
                metrics.interventions_claimed += 1;
                true
            } else {
                false
            };

            let decision = policy.decide(&session, &floor, round);
            if let Some(target) = &decision.pledge
                && session.economy().patron.as_ref() != Some(target)
            {
                session
                    .pledge(target.as_str())
                    .with_context(|| format!("round {round}: pledge to {target} refused"))?;
                metrics.pledges += 1;
            }

            let patron = session.economy().patron.clone();
            let ultimate = if decision.activate_ultimate
                && let Some(patron) = patron
            {
                match session.activate_ultimate(patron.as_str()) {
                    Ok(activation) => {
                        metrics.ultimates_fired += 1;
                        Some(activation)
                    }
                    Err(PantheonError::InsufficientCharge { .. }) => None,
                    Err(err) => {
                        metrics
                            .rejected_actions
                            .push(format!("round {round}: ultimate refused: {err}"));
                        None
                    }
                }
            } else {
                None
            };

            let balance = session.balance();
            let stake = (balance * decision.stake_fraction).floor().max(1.0);
            if stake > balance {
                bankrupt = true;
                break;
            }
            let game = floor
                .get(decision.game_index)
                .cloned()
                .context("policy picked a game that is not on the floor")?;
            let mut request = RoundRequest::new(game, stake);
            if let Some(choice) = decision.choice {
                request = request.with_choice(choice);
            }

            let outcome = session
                .play_round(&request)
                .with_context(|| format!("round {round}: wager refused"))?;
            metrics.record(&outcome);
            if self.verbose {
                debug!(
                    "seed {seed} round {round}: {} stake {stake:.0} -> {} paid {:.2} bal {:.2}",
                    outcome.game,
                    if outcome.win { "win" } else { "loss" },
                    outcome.payout,
                    outcome.balance
                );
            }
            turns.push(TurnRecord {
                round,
                policy_name: policy.name(),
                rationale: decision.rationale,
                claimed_intervention,
                ultimate,
                outcome,
            });
        }

        let snapshot = session.snapshot()?;
        let restore_matched = if plan.verify_replay {
            Some(restore_matches(&snapshot, &plan.config)?)
        } else {
            None
        };

        Ok(SimulationSummary {
            seed,
            strategy: plan.strategy,
            config: plan.config.clone(),
            turns,
            metrics,
            final_balance: session.balance(),
            final_influence: session
                .ledger()
                .iter()
                .map(|(id, value)| (id.to_string(), value))
                .collect(),
            checksum: snapshot.checksum,
            clash,
            ascension,
            replay_matched: None,
            restore_matched,
            bankrupt,
        })
    }
}

/// Point the replaced god's floor games at its successor.
fn rebind_floor(floor: &mut [GameDescriptor], outcome: &AscensionOutcome) {
    for game in floor.iter_mut() {
        if game.owner.as_ref() == Some(&outcome.replaced) {
            game.owner = Some(outcome.ascended.clone());
        }
    }
}

fn run_clash(
    session: &mut PantheonSession,
    policy: &mut (dyn PlayerPolicy + Send),
) -> Result<Option<ClashRecord>> {
    let Some(champion) = session.economy().patron.clone() else {
        return Ok(None);
    };
    let balance_before = session.balance();
    let stake = (balance_before * CLASH_STAKE_FRACTION).floor().max(1.0);
    if stake > balance_before {
        return Ok(None);
    }

    let mut progress = session.issue_clash_challenge(stake, policy.stance(0))?;
    let mut exchanges = 1;
    while progress.settlement.is_none() {
        ensure!(
            exchanges < MAX_CLASH_EXCHANGES,
            "clash did not settle within {MAX_CLASH_EXCHANGES} exchanges"
        );
        progress = session.resolve_clash(policy.stance(exchanges))?;
        exchanges += 1;
    }
    let settlement = progress
        .settlement
        .context("clash loop ended without a settlement")?;

    Ok(Some(ClashRecord {
        stake,
        exchanges,
        balance_before,
        balance_after: session.balance(),
        champion_loyalty_after: session.economy().loyalty_to(champion.as_str()),
        settlement,
    }))
}

fn restore_matches(snapshot: &Snapshot, config: &EngineConfig) -> Result<bool> {
    let json = snapshot.to_json()?;
    let parsed = Snapshot::from_json(&json)?;
    let restored = PantheonSession::restore(parsed, config.clone())?;
    Ok(restored.snapshot()? == *snapshot && restored.draws() == snapshot.draws)
}
