use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::common::scenario::TestScenario;
use crate::common::util::format_influence;
use crate::logic::simulation::{GameTester, SimulationPlan, SimulationSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

pub struct LogicTester {
    tester: GameTester,
    verbose: bool,
}

impl LogicTester {
    pub const fn new(verbose: bool) -> Self {
        Self {
            tester: GameTester::new(verbose),
            verbose,
        }
    }

    pub fn run_scenario(
        &self,
        scenario: &TestScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (strategy: {} seed: {})",
                    scenario.name.bright_white(),
                    scenario.plan.strategy,
                    seed
                );
            }

            results.push(self.run_single_scenario(scenario, seed, iterations));
        }

        results
    }

    fn run_single_scenario(
        &self,
        scenario: &TestScenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let (successes, failures, performance_data) =
            self.run_simulation_iterations(&scenario.plan, seed, iterations);

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name.clone(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
        }
    }

    fn run_simulation_iterations(
        &self,
        plan: &SimulationPlan,
        seed: u64,
        iterations: usize,
    ) -> (usize, Vec<String>, Vec<Duration>) {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            let verdict = match self.tester.run_plan(plan, iteration_seed) {
                Ok(summary) => match evaluate_expectations(plan, &summary) {
                    None => Ok(summary),
                    Some(err) => Err(format!("{err} | {}", describe_summary(&summary))),
                },
                Err(err) => Err(format!("{err:#}")),
            };

            match verdict {
                Ok(summary) => {
                    successes += 1;
                    let duration = start_time.elapsed();
                    performance_data.push(duration);

                    if self.verbose {
                        println!(
                            "  ✅ Iteration {}/{} passed ({duration:?}) rounds:{} near-misses:{}",
                            i + 1,
                            iterations,
                            summary.metrics.rounds_played,
                            summary.metrics.near_misses
                        );
                        println!(
                            "     ↳ Balance: {:.2} (peak {:.2})",
                            summary.final_balance, summary.metrics.peak_balance
                        );
                        println!(
                            "     ↳ Influence: {}",
                            format_influence(&summary.final_influence)
                        );
                        if let Some(clash) = &summary.clash {
                            println!(
                                "     ↳ Clash won by {} after {} exchanges",
                                clash.settlement.winning_entity, clash.exchanges
                            );
                        }
                    }
                }
                Err(err) => {
                    failures.push(format!(
                        "Iteration {} (strategy {}, seed {}): {}",
                        i + 1,
                        plan.strategy,
                        iteration_seed,
                        err
                    ));

                    if self.verbose {
                        println!(
                            "  ❌ Iteration {}/{} failed: {}",
                            i + 1,
                            iterations,
                            err.red()
                        );
                    }
                }
            }
        }

        (successes, failures, performance_data)
    }
}

fn evaluate_expectations(plan: &SimulationPlan, summary: &SimulationSummary) -> Option<String> {
    for expectation in &plan.expectations {
        if let Err(err) = expectation.evaluate(summary) {
            return Some(err.to_string());
        }
    }
    None
}

fn describe_summary(summary: &SimulationSummary) -> String {
    let last = summary.turns.last().map_or_else(
        || "no rounds played".to_string(),
        |turn| {
            format!(
                "last round {} ({}): {} stake {:.0} payout {:.2} [{}]",
                turn.round,
                turn.policy_name,
                turn.outcome.game,
                turn.outcome.stake,
                turn.outcome.payout,
                turn.rationale.as_deref().unwrap_or("-")
            )
        },
    );
    let status = if summary.bankrupt { "bankrupt" } else { "solvent" };
    format!(
        "rounds {} wins {} balance {:.2} ({status}) | {last}",
        summary.metrics.rounds_played, summary.metrics.wins, summary.final_balance
    )
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::GameplayStrategy;

    #[test]
    fn failing_expectation_is_reported_per_iteration() {
        let scenario = TestScenario::simulation(
            "Always Fails",
            SimulationPlan::new(GameplayStrategy::Devout)
                .with_rounds(3)
                .with_expectation(|_: &SimulationSummary| -> anyhow::Result<()> {
                    anyhow::bail!("nope")
                }),
        );
        let results = LogicTester::new(false).run_scenario(&scenario, &[1, 2], 2);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.passed));
        assert_eq!(results[0].failures.len(), 2);
        assert!(results[0].failures[0].contains("nope"));
        assert_eq!(results[0].successful_iterations, 0);
    }

    #[test]
    fn passing_scenario_records_durations() {
        let scenario = TestScenario::simulation(
            "Passes",
            SimulationPlan::new(GameplayStrategy::Fickle).with_rounds(5),
        );
        let results = LogicTester::new(false).run_scenario(&scenario, &[9], 3);
        assert!(results[0].passed);
        assert_eq!(results[0].performance_data.len(), 3);
    }

    #[test]
    fn result_serializes_durations_as_millis() {
        let result = ScenarioResult {
            scenario_name: "x".to_string(),
            seed: 1,
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            failures: Vec::new(),
            average_duration: Duration::from_millis(12),
            performance_data: vec![Duration::from_millis(12)],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["average_duration"], 12);
        assert_eq!(json["performance_data"][0], 12);
    }
}
