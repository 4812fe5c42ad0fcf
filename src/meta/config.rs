//! Meta-optimizer configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimetableError};
use crate::ga::{OptimizerConfig, Selection};
use crate::models::WeightConfig;
use crate::parallel::ParallelOptions;

/// Configuration of the outer weight-tuning GA.
///
/// Every weight vector is scored by one inner [`GeneticOptimizer`](crate::ga::GeneticOptimizer)
/// run built from `inner`, capped at `eval_time_limit_ms`.
///
/// ```
/// use u_timetable::meta::MetaConfig;
///
/// let config = MetaConfig::default()
///     .with_population_size(6)
///     .with_generations(3)
///     .with_seed(1);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MetaConfig {
    /// Weight vectors per outer generation.
    pub population_size: usize,
    /// Outer generations after the initial one.
    pub generations: usize,
    pub elite_size: usize,
    pub selection: Selection,
    pub crossover_rate: f64,
    /// BLX-α extension of the parent interval.
    pub blend_alpha: f64,
    /// Per-weight mutation probability.
    pub mutation_rate: f64,
    /// Gaussian step as a fraction of each weight's search range.
    pub mutation_sigma: f64,
    /// Initial perturbation as a fraction of each weight's search range.
    pub initial_spread: f64,
    /// Wall-clock cap of one inner run.
    pub eval_time_limit_ms: u64,
    /// Template of the inner optimizer; its seed, time limit and
    /// parallel evaluation flag are overridden per run.
    pub inner: OptimizerConfig,
    /// Weights of the first individual and centre of the initial spread.
    pub base_weights: WeightConfig,
    /// Score weight vectors concurrently.
    pub parallel: bool,
    pub parallel_options: ParallelOptions,
    pub seed: Option<u64>,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            population_size: 8,
            generations: 5,
            elite_size: 1,
            selection: Selection::Tournament(2),
            crossover_rate: 0.8,
            blend_alpha: 0.5,
            mutation_rate: 0.3,
            mutation_sigma: 0.1,
            initial_spread: 0.25,
            eval_time_limit_ms: 2_000,
            inner: OptimizerConfig::fast(),
            base_weights: WeightConfig::default(),
            parallel: true,
            parallel_options: ParallelOptions::default(),
            seed: None,
        }
    }
}

impl MetaConfig {
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    pub fn with_generations(mut self, n: usize) -> Self {
        self.generations = n;
        self
    }

    pub fn with_elite_size(mut self, n: usize) -> Self {
        self.elite_size = n;
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_mutation(mut self, rate: f64, sigma: f64) -> Self {
        self.mutation_rate = rate;
        self.mutation_sigma = sigma;
        self
    }

    pub fn with_blend_alpha(mut self, alpha: f64) -> Self {
        self.blend_alpha = alpha;
        self
    }

    pub fn with_eval_time_limit_ms(mut self, ms: u64) -> Self {
        self.eval_time_limit_ms = ms;
        self
    }

    pub fn with_inner(mut self, inner: OptimizerConfig) -> Self {
        self.inner = inner;
        self
    }

    pub fn with_base_weights(mut self, weights: WeightConfig) -> Self {
        self.base_weights = weights;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.population_size < 2 {
            return Err(TimetableError::config("meta population_size must be at least 2"));
        }
        if self.elite_size >= self.population_size {
            return Err(TimetableError::config(
                "meta elite_size must be smaller than population_size",
            ));
        }
        if let Selection::Tournament(0) = self.selection {
            return Err(TimetableError::config("tournament size must be at least 1"));
        }
        for (name, rate) in [
            ("crossover_rate", self.crossover_rate),
            ("mutation_rate", self.mutation_rate),
            ("initial_spread", self.initial_spread),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(TimetableError::config(format!(
                    "meta {name} must be within [0, 1]"
                )));
            }
        }
        if !self.blend_alpha.is_finite() || self.blend_alpha < 0.0 {
            return Err(TimetableError::config("blend_alpha must be non-negative"));
        }
        if !self.mutation_sigma.is_finite() || self.mutation_sigma <= 0.0 {
            return Err(TimetableError::config("mutation_sigma must be positive"));
        }
        if self.eval_time_limit_ms == 0 {
            return Err(TimetableError::config("eval_time_limit_ms must be positive"));
        }
        self.inner.validate()?;
        self.base_weights.validate()?;
        self.parallel_options.validate()
    }
}
