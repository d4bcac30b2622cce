//! Synthetic runs: random pass/fail per step without touching a document.
//!
//! Used to exercise report generation and CI wiring when no page is at hand.

use crate::outcome::{ScenarioResult, StepResult, SuiteBuilder, SuiteResult};
use crate::scenario::{Scenario, Suite};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::Range;

pub const DEFAULT_PASS_RATE: f64 = 0.9;
pub const SIMULATED_FAILURE: &str = "simulated failure";

const STEP_DURATION_MS: Range<u64> = 20..250;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationOptions {
    /// Probability that any single step passes, clamped to `0.0..=1.0`.
    pub pass_rate: f64,
    /// Fixed seed for reproducible runs; `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            pass_rate: DEFAULT_PASS_RATE,
            seed: None,
        }
    }
}

pub fn simulate_suite(suite: &Suite, options: SimulationOptions) -> SuiteResult {
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let pass_rate = if options.pass_rate.is_nan() {
        DEFAULT_PASS_RATE
    } else {
        options.pass_rate.clamp(0.0, 1.0)
    };

    let mut builder = SuiteBuilder::new(suite.kind);
    let mut total_ms = 0;
    for category in &suite.categories {
        builder.begin_category(&category.name);
        for scenario in &category.scenarios {
            let result = simulate_scenario(scenario, pass_rate, &mut rng);
            total_ms += result.duration_ms;
            builder.record(result);
        }
    }
    builder.finish(total_ms)
}

fn simulate_scenario(scenario: &Scenario, pass_rate: f64, rng: &mut StdRng) -> ScenarioResult {
    let steps: Vec<StepResult> = scenario
        .steps
        .iter()
        .map(|step| {
            let passed = rng.gen_bool(pass_rate);
            StepResult {
                step: step.clone(),
                passed,
                error: (!passed).then(|| SIMULATED_FAILURE.to_string()),
                duration_ms: rng.gen_range(STEP_DURATION_MS),
                actual: None,
            }
        })
        .collect();
    let duration_ms = steps.iter().map(|step| step.duration_ms).sum();
    ScenarioResult::from_steps(
        scenario.name.clone(),
        scenario.description.clone(),
        steps,
        duration_ms,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::parse_suite;
    use pretty_assertions::assert_eq;

    const SUITE: &str = r##"
category nav {
  scenario home {
    navigate /
    visible nav
    click "#home-link"
  }
  scenario events {
    navigate /events
    count .event
  }
}
category forms {
  scenario signup {
    type "#email" ada@example.org
    click "#submit"
  }
}
"##;

    fn suite() -> Suite {
        parse_suite(SUITE).expect("suite parses")
    }

    fn flags(result: &SuiteResult) -> Vec<bool> {
        result
            .categories
            .iter()
            .flat_map(|category| &category.scenarios)
            .flat_map(|scenario| &scenario.steps)
            .map(|step| step.passed)
            .collect()
    }

    #[test]
    fn same_seed_same_outcome() {
        let options = SimulationOptions {
            pass_rate: 0.5,
            seed: Some(42),
        };
        let first = simulate_suite(&suite(), options);
        let second = simulate_suite(&suite(), options);
        assert_eq!(flags(&first), flags(&second));
        assert_eq!(first.summary, second.summary);
    }

    #[test]
    fn certain_rates_are_deterministic() {
        let all_pass = simulate_suite(
            &suite(),
            SimulationOptions {
                pass_rate: 1.0,
                seed: None,
            },
        );
        assert!(!all_pass.has_failures());
        assert_eq!(all_pass.summary.total_steps, 7);

        let all_fail = simulate_suite(
            &suite(),
            SimulationOptions {
                pass_rate: 0.0,
                seed: None,
            },
        );
        assert_eq!(all_fail.summary.failed_scenarios, 3);
        assert_eq!(all_fail.summary.errors.len(), 7);
        assert_eq!(
            all_fail.summary.errors[0].error.as_deref(),
            Some(SIMULATED_FAILURE)
        );
    }

    #[test]
    fn durations_add_up() {
        let result = simulate_suite(
            &suite(),
            SimulationOptions {
                pass_rate: 0.9,
                seed: Some(7),
            },
        );
        let scenario_total: u64 = result
            .categories
            .iter()
            .flat_map(|category| &category.scenarios)
            .map(|scenario| scenario.duration_ms)
            .sum();
        assert_eq!(result.duration_ms, scenario_total);
    }
}
