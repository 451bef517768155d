//! Named logic scenarios: a simulation plan plus the expectations checked
//! against every run of it.

use anyhow::{Result, ensure};
use pantheon_game::{EngineConfig, Pantheon};

use crate::logic::{GameplayStrategy, SimulationPlan, SimulationSummary};

const MASS_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub plan: SimulationPlan,
}

impl TestScenario {
    #[must_use]
    pub fn simulation(name: impl Into<String>, plan: SimulationPlan) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }
}

fn smoke_expectation(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.metrics.rounds_played > 0,
        "session should play at least one round"
    );
    for turn in &summary.turns {
        ensure!(
            !turn.outcome.narration.trim().is_empty(),
            "round {} has no narration",
            turn.round
        );
    }
    Ok(())
}

fn ledger_invariants(summary: &SimulationSummary) -> Result<()> {
    for turn in &summary.turns {
        let outcome = &turn.outcome;
        ensure!(
            outcome.payout >= 0.0,
            "round {}: negative payout {:.4}",
            turn.round,
            outcome.payout
        );
        ensure!(
            outcome.win == (outcome.payout >= outcome.stake),
            "round {}: verdict {} disagrees with payout {:.4} on stake {:.0}",
            turn.round,
            outcome.win,
            outcome.payout,
            outcome.stake
        );
        ensure!(
            outcome.balance >= 0.0,
            "round {}: negative balance {:.4}",
            turn.round,
            outcome.balance
        );
        if let Some(moved) = outcome.redistribution {
            let expected = moved.moved_out + moved.floor_injection;
            ensure!(
                (moved.moved_in - expected).abs() < MASS_TOLERANCE,
                "round {}: redistribution moved {:.6} in but {:.6} out",
                turn.round,
                moved.moved_in,
                expected
            );
        }
    }
    for (id, value) in &summary.final_influence {
        ensure!(*value >= 1.0, "{id} fell below the influence floor ({value:.4})");
    }
    ensure!(
        summary.metrics.rejected_actions.is_empty(),
        "engine refused actions: {}",
        summary.metrics.rejected_actions.join("; ")
    );
    Ok(())
}

fn replay_expectation(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.replay_matched == Some(true),
        "replaying seed {} produced different rounds",
        summary.seed
    );
    ensure!(
        summary.restore_matched == Some(true),
        "restored snapshot diverged for seed {}",
        summary.seed
    );
    Ok(())
}

/// Recompute the losing streak from the played rounds and require an
/// intervention on every round where it reaches the threshold.
fn intervention_expectation(summary: &SimulationSummary) -> Result<()> {
    let threshold = summary.config.intervention.streak_threshold;
    let mut streak = 0_u32;
    for turn in &summary.turns {
        if turn.claimed_intervention {
            streak = 0;
        }
        streak = if turn.outcome.win { 0 } else { streak + 1 };
        if streak >= threshold {
            ensure!(
                turn.outcome.intervention_fired,
                "round {}: losing streak {streak} reached {threshold} without an intervention",
                turn.round
            );
        }
    }
    let outstanding = summary
        .metrics
        .interventions_fired
        .saturating_sub(summary.metrics.interventions_claimed);
    ensure!(
        outstanding <= 1,
        "{} interventions fired but only {} claimed",
        summary.metrics.interventions_fired,
        summary.metrics.interventions_claimed
    );
    Ok(())
}

fn ultimate_expectation(summary: &SimulationSummary) -> Result<()> {
    let costliest = Pantheon::standard()
        .iter()
        .map(|god| god.ultimate.cost)
        .fold(0.0, f64::max);
    let spendable: f64 = summary
        .turns
        .iter()
        .rev()
        .skip(1)
        .map(|turn| turn.outcome.accrual.charge)
        .sum();
    if spendable >= costliest {
        ensure!(
            summary.metrics.ultimates_fired > 0,
            "accrued {spendable:.0} charge but never fired an ultimate"
        );
    }
    for turn in &summary.turns {
        if let Some(activation) = &turn.ultimate {
            ensure!(
                activation.effect.rounds_remaining > 0,
                "round {}: {} granted an already expired effect",
                turn.round,
                activation.name
            );
            ensure!(
                activation.loyalty_sacrificed >= 0.0,
                "round {}: negative loyalty sacrifice",
                turn.round
            );
        }
    }
    Ok(())
}

fn echo_expectation(summary: &SimulationSummary) -> Result<()> {
    for turn in &summary.turns {
        if let Some(echo) = &turn.outcome.echo {
            ensure!(turn.outcome.win, "round {}: echo on a loss", turn.round);
            ensure!(echo.payout >= 0.0, "round {}: negative echo payout", turn.round);
        }
    }
    if summary.metrics.echoes > 0 {
        ensure!(
            summary.metrics.pledges >= 2,
            "echoes need a scorned god but only {} pledges were made",
            summary.metrics.pledges
        );
    }
    Ok(())
}

fn clash_expectation(summary: &SimulationSummary) -> Result<()> {
    let Some(record) = &summary.clash else {
        anyhow::bail!("no clash was fought");
    };
    let expected = record.balance_before - record.stake + record.settlement.payout;
    ensure!(
        (record.balance_after - expected).abs() < MASS_TOLERANCE,
        "clash left balance {:.2}, expected {expected:.2}",
        record.balance_after
    );
    ensure!(
        record.champion_loyalty_after.abs() < f64::EPSILON,
        "champion loyalty survived the clash ({:.2})",
        record.champion_loyalty_after
    );
    ensure!(
        record.settlement.influence_moved >= 0.0,
        "clash moved negative influence"
    );
    Ok(())
}

fn ascension_expectation(summary: &SimulationSummary) -> Result<()> {
    let Some(outcome) = &summary.ascension else {
        anyhow::bail!("ascension never happened");
    };
    let ids: Vec<&str> = summary
        .final_influence
        .iter()
        .map(|(id, _)| id.as_str())
        .collect();
    ensure!(
        ids.contains(&outcome.ascended.as_str()),
        "ascended god {} has no influence entry",
        outcome.ascended
    );
    ensure!(
        !ids.contains(&outcome.replaced.as_str()),
        "replaced god {} still holds influence",
        outcome.replaced
    );
    Ok(())
}

fn strategy_scenario(name: &'static str, strategy: GameplayStrategy) -> TestScenario {
    TestScenario::simulation(
        name,
        SimulationPlan::new(strategy)
            .with_rounds(120)
            .with_expectation(smoke_expectation)
            .with_expectation(ledger_invariants),
    )
}

fn generous_charge() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.economy.charge_rate = 25.0;
    config
}

fn cheap_ascension() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.ascension_cost.0 = 100.0;
    config
}

pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let scenario = match name.to_lowercase().as_str() {
        "smoke" => TestScenario::simulation(
            "Smoke Test",
            SimulationPlan::new(GameplayStrategy::Fickle)
                .with_rounds(40)
                .with_expectation(smoke_expectation),
        ),
        "ledger-invariants" | "invariants" => TestScenario::simulation(
            "Ledger Invariants Sweep",
            SimulationPlan::new(GameplayStrategy::Wanderer)
                .with_rounds(200)
                .with_expectation(ledger_invariants),
        ),
        "deterministic-replay" | "deterministic" => TestScenario::simulation(
            "Deterministic Replay and Restore",
            SimulationPlan::new(GameplayStrategy::Wanderer)
                .with_rounds(60)
                .with_clash_at(20)
                .with_replay_check()
                .with_expectation(replay_expectation),
        ),
        "intervention-rescue" | "intervention" => TestScenario::simulation(
            "Intervention Rescue",
            SimulationPlan::new(GameplayStrategy::HighRoller)
                .with_rounds(80)
                .with_expectation(intervention_expectation)
                .with_expectation(ledger_invariants),
        ),
        "ultimate-cycle" | "ultimate" => TestScenario::simulation(
            "Ultimate Charge Cycle",
            SimulationPlan::new(GameplayStrategy::Devout)
                .with_rounds(80)
                .with_config(generous_charge())
                .with_expectation(ultimate_expectation)
                .with_expectation(ledger_invariants),
        ),
        "echo-resentment" | "echo" => TestScenario::simulation(
            "Echo of Resentment",
            SimulationPlan::new(GameplayStrategy::Fickle)
                .with_rounds(100)
                .with_expectation(echo_expectation)
                .with_expectation(ledger_invariants),
        ),
        "champion-clash" | "clash" => TestScenario::simulation(
            "Champion Clash",
            SimulationPlan::new(GameplayStrategy::Devout)
                .with_rounds(30)
                .with_clash_at(15)
                .with_expectation(clash_expectation)
                .with_expectation(ledger_invariants),
        ),
        "ascension" => TestScenario::simulation(
            "Ascension Ritual",
            SimulationPlan::new(GameplayStrategy::Fickle)
                .with_rounds(50)
                .with_config(cheap_ascension())
                .with_ascension_at(10)
                .with_expectation(ascension_expectation)
                .with_expectation(ledger_invariants),
        ),
        "devout-strategy" | "devout" => {
            strategy_scenario("Devout Strategy Test", GameplayStrategy::Devout)
        }
        "fickle-strategy" | "fickle" => {
            strategy_scenario("Fickle Strategy Test", GameplayStrategy::Fickle)
        }
        "high-roller-strategy" | "high-roller" => {
            strategy_scenario("High Roller Strategy Test", GameplayStrategy::HighRoller)
        }
        "wanderer-strategy" | "wanderer" => {
            strategy_scenario("Wanderer Strategy Test", GameplayStrategy::Wanderer)
        }
        _ => return None,
    };
    Some(scenario)
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    vec![
        ("smoke", "Smoke Test"),
        ("ledger-invariants", "Ledger Invariants Sweep"),
        ("deterministic-replay", "Deterministic Replay and Restore"),
        ("intervention-rescue", "Intervention Rescue"),
        ("ultimate-cycle", "Ultimate Charge Cycle"),
        ("echo-resentment", "Echo of Resentment"),
        ("champion-clash", "Champion Clash"),
        ("ascension", "Ascension Ritual"),
        ("devout-strategy", "Devout Strategy Test"),
        ("fickle-strategy", "Fickle Strategy Test"),
        ("high-roller-strategy", "High Roller Strategy Test"),
        ("wanderer-strategy", "Wanderer Strategy Test"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::simulation::GameTester;

    #[test]
    fn every_listed_scenario_resolves() {
        for (key, description) in list_scenarios() {
            let scenario = get_scenario(key).unwrap();
            assert_eq!(scenario.name, description);
            assert!(!scenario.plan.expectations.is_empty());
        }
        assert!(get_scenario("no-such-scenario").is_none());
    }

    #[test]
    fn aliases_resolve_case_insensitively() {
        assert_eq!(get_scenario("CLASH").unwrap().name, "Champion Clash");
        assert_eq!(get_scenario("echo").unwrap().name, "Echo of Resentment");
    }

    #[test]
    fn listed_scenarios_pass_for_a_seed() {
        let tester = GameTester::new(false);
        for (key, _) in list_scenarios() {
            let scenario = get_scenario(key).unwrap();
            let summary = tester.run_plan(&scenario.plan, 1337).unwrap();
            for expectation in &scenario.plan.expectations {
                expectation
                    .evaluate(&summary)
                    .unwrap_or_else(|err| panic!("{key}: {err:#}"));
            }
        }
    }
}
