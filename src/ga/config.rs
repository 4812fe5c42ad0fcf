//! Optimizer configuration.
//!
//! [`OptimizerConfig`] holds all parameters of the generation loop;
//! [`AdaptiveConfig`] those of the optional rate controller.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::crossover::CrossoverMethod;
use super::selection::Selection;
use crate::error::{Result, TimetableError};
use crate::parallel::ParallelOptions;

/// Configuration for the timetable GA.
///
/// # Defaults
///
/// ```
/// use u_timetable::ga::OptimizerConfig;
///
/// let config = OptimizerConfig::default();
/// assert_eq!(config.population_size, 50);
/// assert_eq!(config.max_generations, 200);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_timetable::ga::{OptimizerConfig, Selection};
///
/// let config = OptimizerConfig::default()
///     .with_population_size(80)
///     .with_selection(Selection::Tournament(4))
///     .with_mutation_rate(0.15)
///     .with_seed(7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OptimizerConfig {
    /// Number of chromosomes per generation.
    pub population_size: usize,

    /// Generation cap.
    pub max_generations: usize,

    /// Chromosomes carried unchanged into the next generation.
    pub elite_size: usize,

    /// Parent selection strategy.
    pub selection: Selection,

    /// Probability of recombining a selected pair (0.0–1.0).
    pub crossover_rate: f64,

    /// Per-gene re-roll probability (0.0–1.0).
    pub mutation_rate: f64,

    /// Crossover operators to choose from.
    pub crossover_methods: Vec<CrossoverMethod>,

    /// Generation from which operators are picked by learned weight instead of uniformly.
    pub method_adaptation_start: usize,

    /// Generations between operator weight updates.
    pub method_update_interval: usize,

    /// Relative best-fitness improvement below which a window counts as converged.
    pub convergence_threshold: f64,

    /// Generations the improvement is measured over.
    ///
    /// Set to 0 to disable convergence-based termination.
    pub convergence_window: usize,

    /// Optional wall-clock limit in milliseconds, checked once per generation.
    pub time_limit_ms: Option<u64>,

    /// Adaptive rate control; `None` keeps rates fixed.
    pub adaptive: Option<AdaptiveConfig>,

    /// Evaluate fitness on a worker pool.
    pub parallel_fitness: bool,

    /// Worker pool settings.
    pub parallel: ParallelOptions,

    /// Record per-generation statistics.
    pub collect_stats: bool,

    /// Random seed; `None` draws one.
    pub seed: Option<u64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            max_generations: 200,
            elite_size: 2,
            selection: Selection::default(),
            crossover_rate: 0.8,
            mutation_rate: 0.1,
            crossover_methods: CrossoverMethod::ALL.to_vec(),
            method_adaptation_start: 20,
            method_update_interval: 10,
            convergence_threshold: 1e-4,
            convergence_window: 30,
            time_limit_ms: None,
            adaptive: None,
            parallel_fitness: true,
            parallel: ParallelOptions::default(),
            collect_stats: false,
            seed: None,
        }
    }
}

impl OptimizerConfig {
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = n;
        self
    }

    pub fn with_elite_size(mut self, n: usize) -> Self {
        self.elite_size = n;
        self
    }

    pub fn with_selection(mut self, sel: Selection) -> Self {
        self.selection = sel;
        self
    }

    /// Equivalent to `.with_selection(Selection::Tournament(k))`.
    pub fn with_tournament_size(self, k: usize) -> Self {
        self.with_selection(Selection::Tournament(k))
    }

    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate;
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    pub fn with_crossover_methods(mut self, methods: Vec<CrossoverMethod>) -> Self {
        self.crossover_methods = methods;
        self
    }

    pub fn with_method_adaptation(mut self, start: usize, interval: usize) -> Self {
        self.method_adaptation_start = start;
        self.method_update_interval = interval;
        self
    }

    /// Sets the relative convergence threshold.
    pub fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    pub fn with_convergence_window(mut self, window: usize) -> Self {
        self.convergence_window = window;
        self
    }

    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    pub fn with_adaptive(mut self, adaptive: AdaptiveConfig) -> Self {
        self.adaptive = Some(adaptive);
        self
    }

    pub fn with_parallel_fitness(mut self, parallel: bool) -> Self {
        self.parallel_fitness = parallel;
        self
    }

    pub fn with_parallel_options(mut self, options: ParallelOptions) -> Self {
        self.parallel = options;
        self
    }

    pub fn with_collect_stats(mut self, collect: bool) -> Self {
        self.collect_stats = collect;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Small population, few generations, 10s budget.
    pub fn fast() -> Self {
        Self {
            population_size: 30,
            max_generations: 100,
            convergence_window: 20,
            convergence_threshold: 1e-3,
            time_limit_ms: Some(10_000),
            ..Self::default()
        }
    }

    /// Moderate population with adaptive rates, 30s budget.
    pub fn balanced() -> Self {
        Self {
            population_size: 60,
            max_generations: 300,
            convergence_window: 40,
            time_limit_ms: Some(30_000),
            adaptive: Some(AdaptiveConfig::default()),
            ..Self::default()
        }
    }

    /// Large population with adaptive rates, 60s budget.
    pub fn quality() -> Self {
        Self {
            population_size: 120,
            max_generations: 600,
            elite_size: 4,
            convergence_window: 60,
            convergence_threshold: 5e-5,
            time_limit_ms: Some(60_000),
            adaptive: Some(AdaptiveConfig::default()),
            ..Self::default()
        }
    }

    /// Picks a preset from the number of genes to place.
    ///
    /// - `gene_count < 50` → [`fast()`](Self::fast)
    /// - `50 ≤ gene_count < 200` → [`balanced()`](Self::balanced)
    /// - `gene_count ≥ 200` → [`quality()`](Self::quality)
    pub fn auto_select(gene_count: usize) -> Self {
        if gene_count < 50 {
            Self::fast()
        } else if gene_count < 200 {
            Self::balanced()
        } else {
            Self::quality()
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.population_size < 2 {
            return Err(TimetableError::config("population_size must be at least 2"));
        }
        if self.max_generations == 0 {
            return Err(TimetableError::config("max_generations must be at least 1"));
        }
        if self.elite_size >= self.population_size {
            return Err(TimetableError::config(
                "elite_size must be smaller than population_size",
            ));
        }
        if let Selection::Tournament(0) = self.selection {
            return Err(TimetableError::config("tournament size must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(TimetableError::config("crossover_rate must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(TimetableError::config("mutation_rate must be within [0, 1]"));
        }
        if self.crossover_methods.is_empty() {
            return Err(TimetableError::config("at least one crossover method is required"));
        }
        if self.method_update_interval == 0 {
            return Err(TimetableError::config(
                "method_update_interval must be at least 1",
            ));
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold < 0.0 {
            return Err(TimetableError::config(
                "convergence_threshold must be non-negative",
            ));
        }
        if self.time_limit_ms == Some(0) {
            return Err(TimetableError::config("time_limit_ms must be positive or None"));
        }
        if let Some(adaptive) = &self.adaptive {
            adaptive.validate()?;
        }
        self.parallel.validate()
    }
}

/// Parameters of the adaptive rate controller.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AdaptiveConfig {
    pub base_mutation_rate: f64,
    pub min_mutation_rate: f64,
    pub max_mutation_rate: f64,
    pub base_crossover_rate: f64,
    pub min_crossover_rate: f64,
    pub max_crossover_rate: f64,
    /// Amount the crossover rate moves per adaptation.
    pub crossover_step: f64,
    /// Diversity below which mutation is boosted.
    pub diversity_threshold: f64,
    /// Samples kept in the fitness and diversity histories.
    pub history_window: usize,
    /// Generations between adaptations.
    pub adaptation_interval: usize,
    /// Mutation multiplier applied when diversity collapses (> 1).
    pub increase_factor: f64,
    /// Fraction of the excess over base kept per healthy adaptation.
    pub decay_factor: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            base_mutation_rate: 0.1,
            min_mutation_rate: 0.01,
            max_mutation_rate: 0.5,
            base_crossover_rate: 0.8,
            min_crossover_rate: 0.5,
            max_crossover_rate: 0.95,
            crossover_step: 0.05,
            diversity_threshold: 0.3,
            history_window: 10,
            adaptation_interval: 5,
            increase_factor: 1.5,
            decay_factor: 0.9,
        }
    }
}

impl AdaptiveConfig {
    pub fn with_mutation_bounds(mut self, min: f64, base: f64, max: f64) -> Self {
        self.min_mutation_rate = min;
        self.base_mutation_rate = base;
        self.max_mutation_rate = max;
        self
    }

    pub fn with_diversity_threshold(mut self, threshold: f64) -> Self {
        self.diversity_threshold = threshold;
        self
    }

    pub fn with_adaptation_interval(mut self, interval: usize) -> Self {
        self.adaptation_interval = interval;
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let ordered = |min: f64, base: f64, max: f64| {
            0.0 <= min && min <= base && base < max && max <= 1.0
        };
        if !ordered(
            self.min_mutation_rate,
            self.base_mutation_rate,
            self.max_mutation_rate,
        ) {
            return Err(TimetableError::config(
                "mutation rates must satisfy 0 <= min <= base < max <= 1",
            ));
        }
        if !ordered(
            self.min_crossover_rate,
            self.base_crossover_rate,
            self.max_crossover_rate,
        ) {
            return Err(TimetableError::config(
                "crossover rates must satisfy 0 <= min <= base < max <= 1",
            ));
        }
        if self.increase_factor.is_nan() || self.increase_factor <= 1.0 {
            return Err(TimetableError::config("increase_factor must exceed 1"));
        }
        if !(0.0..=1.0).contains(&self.decay_factor) {
            return Err(TimetableError::config("decay_factor must be within [0, 1]"));
        }
        if self.history_window < 2 {
            return Err(TimetableError::config("history_window must be at least 2"));
        }
        if self.adaptation_interval == 0 {
            return Err(TimetableError::config("adaptation_interval must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OptimizerConfig::default();
        assert_eq!(config.population_size, 50);
        assert_eq!(config.elite_size, 2);
        assert_eq!(config.selection, Selection::Tournament(3));
        assert_eq!(config.crossover_methods.len(), 4);
        assert_eq!(config.method_adaptation_start, 20);
        assert!(config.parallel_fitness);
        assert!(config.adaptive.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = OptimizerConfig::default()
            .with_population_size(20)
            .with_max_generations(10)
            .with_elite_size(1)
            .with_selection(Selection::Rank)
            .with_crossover_rate(0.6)
            .with_mutation_rate(0.05)
            .with_parallel_fitness(false)
            .with_seed(42);

        assert_eq!(config.population_size, 20);
        assert_eq!(config.selection, Selection::Rank);
        assert_eq!(config.crossover_rate, 0.6);
        assert_eq!(config.mutation_rate, 0.05);
        assert!(config.validate().is_ok());
        assert!(!config.parallel_fitness);
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn test_validate_rejects() {
        let bad = [
            OptimizerConfig::default().with_population_size(1),
            OptimizerConfig::default().with_max_generations(0),
            OptimizerConfig::default().with_population_size(4).with_elite_size(4),
            OptimizerConfig::default().with_tournament_size(0),
            OptimizerConfig::default().with_crossover_methods(Vec::new()),
            OptimizerConfig::default().with_time_limit_ms(0),
            OptimizerConfig::default().with_method_adaptation(20, 0),
            OptimizerConfig::default().with_crossover_rate(-3.0),
            OptimizerConfig::default().with_mutation_rate(1.5),
            OptimizerConfig::default().with_mutation_rate(f64::NAN),
            OptimizerConfig::default().with_convergence_threshold(-1.0),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(TimetableError::InvalidConfig(_))),
                "{config:?}"
            );
        }
    }

    #[test]
    fn test_presets_valid() {
        for config in [
            OptimizerConfig::fast(),
            OptimizerConfig::balanced(),
            OptimizerConfig::quality(),
        ] {
            assert!(config.validate().is_ok());
        }
        assert!(OptimizerConfig::balanced().adaptive.is_some());
    }

    #[test]
    fn test_auto_select_boundaries() {
        assert_eq!(OptimizerConfig::auto_select(49), OptimizerConfig::fast());
        assert_eq!(OptimizerConfig::auto_select(50), OptimizerConfig::balanced());
        assert_eq!(OptimizerConfig::auto_select(200), OptimizerConfig::quality());
    }

    #[test]
    fn test_adaptive_validation() {
        assert!(AdaptiveConfig::default().validate().is_ok());
        let inverted = AdaptiveConfig::default().with_mutation_bounds(0.3, 0.1, 0.5);
        assert!(inverted.validate().is_err());
        let nested = OptimizerConfig::default().with_adaptive(inverted);
        assert!(nested.validate().is_err());
        let flat = AdaptiveConfig {
            increase_factor: 1.0,
            ..AdaptiveConfig::default()
        };
        assert!(flat.validate().is_err());
    }
}
