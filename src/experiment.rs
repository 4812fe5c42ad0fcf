//! Single-run experiment entry point.
//!
//! [`run_single_experiment`] runs the optimizer once with a flat parameter
//! set and always collects per-generation statistics, so parameter sweeps can
//! be driven and recorded by an external harness.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use tracing::info;

use crate::error::Result;
use crate::ga::{AdaptiveConfig, GeneticOptimizer, OptimizerConfig};
use crate::models::{GenerationStats, ScheduleRequest, Termination, WeightConfig};

/// Flat parameter set of one experiment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ExperimentParams {
    pub population_size: usize,
    pub max_generations: usize,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub elite_size: usize,
    /// Enable the adaptive rate controller with default bounds.
    pub adaptive: bool,
    pub time_limit_ms: Option<u64>,
    pub seed: Option<u64>,
}

impl Default for ExperimentParams {
    fn default() -> Self {
        let base = OptimizerConfig::default();
        Self {
            population_size: base.population_size,
            max_generations: base.max_generations,
            mutation_rate: base.mutation_rate,
            crossover_rate: base.crossover_rate,
            elite_size: base.elite_size,
            adaptive: false,
            time_limit_ms: None,
            seed: None,
        }
    }
}

impl ExperimentParams {
    /// Optimizer configuration for these parameters, with statistics enabled.
    pub fn to_config(&self) -> OptimizerConfig {
        let mut config = OptimizerConfig {
            population_size: self.population_size,
            max_generations: self.max_generations,
            mutation_rate: self.mutation_rate,
            crossover_rate: self.crossover_rate,
            elite_size: self.elite_size,
            time_limit_ms: self.time_limit_ms,
            seed: self.seed,
            collect_stats: true,
            ..OptimizerConfig::default()
        };
        if self.adaptive {
            let adaptive = AdaptiveConfig {
                base_mutation_rate: self.mutation_rate,
                base_crossover_rate: self.crossover_rate,
                ..AdaptiveConfig::default()
            };
            config.adaptive = Some(adaptive);
        }
        config
    }
}

/// Outcome of one experiment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ExperimentResult {
    pub params: ExperimentParams,
    pub best_fitness: f64,
    pub generations: usize,
    pub duration_ms: u64,
    pub termination: Termination,
    pub stats: Vec<GenerationStats>,
}

/// Runs the optimizer once with `params`.
pub fn run_single_experiment(
    request: &ScheduleRequest,
    weights: WeightConfig,
    params: ExperimentParams,
) -> Result<ExperimentResult> {
    let outcome = GeneticOptimizer::new(request, weights, params.to_config())?.run()?;
    let duration_ms = outcome.duration.as_millis() as u64;
    info!(
        best_fitness = outcome.best_fitness,
        generations = outcome.generations,
        duration_ms,
        "experiment finished"
    );
    Ok(ExperimentResult {
        params,
        best_fitness: outcome.best_fitness,
        generations: outcome.generations,
        duration_ms,
        termination: outcome.termination,
        stats: outcome.stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TimetableError;
    use crate::models::ClassRequest;
    use chrono::NaiveDate;

    fn request() -> ScheduleRequest {
        ScheduleRequest::new(
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        )
        .with_class(ClassRequest::new(1, "Math"))
        .with_class(ClassRequest::new(2, "Art"))
        .with_class(ClassRequest::new(3, "Biology"))
    }

    #[test]
    fn test_params_to_config() {
        let params = ExperimentParams {
            mutation_rate: 0.2,
            adaptive: true,
            seed: Some(5),
            ..ExperimentParams::default()
        };
        let config = params.to_config();
        assert!(config.collect_stats);
        assert_eq!(config.seed, Some(5));
        let adaptive = config.adaptive.as_ref().expect("adaptive enabled");
        assert_eq!(adaptive.base_mutation_rate, 0.2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_run_single_experiment() {
        let params = ExperimentParams {
            population_size: 12,
            max_generations: 8,
            seed: Some(21),
            ..ExperimentParams::default()
        };
        let result =
            run_single_experiment(&request(), WeightConfig::default(), params.clone()).unwrap();
        assert_eq!(result.params, params);
        assert_eq!(result.generations, 8);
        assert_eq!(result.stats.len(), 9);
        assert_eq!(result.stats.last().map(|s| s.best_fitness), Some(result.best_fitness));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = ExperimentParams {
            population_size: 4,
            elite_size: 4,
            ..ExperimentParams::default()
        };
        assert!(matches!(
            run_single_experiment(&request(), WeightConfig::default(), params),
            Err(TimetableError::InvalidConfig(_))
        ));
    }
}
