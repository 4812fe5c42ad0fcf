//! Generation loop.
//!
//! [`GeneticOptimizer`] drives a [`PopulationManager`] through an explicit
//! state machine:
//!
//! ```text
//! Initializing → Evolving ─┬→ Converged ──────┐
//!                          ├→ TimeLimit ──────┼→ Done
//!                          └→ MaxGenerations ─┘
//! ```
//!
//! A run whose population never contains a chromosome satisfying the hard
//! constraints ends in [`TimetableError::NoValidSolution`].

use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use super::adaptive::AdaptiveController;
use super::chromosome::Chromosome;
use super::config::OptimizerConfig;
use super::crossover::CrossoverMethod;
use super::fitness::FitnessCalculator;
use super::population::PopulationManager;
use super::types::Individual;
use crate::error::{Result, TimetableError};
use crate::models::{
    GenerationStats, ScheduleMetadata, ScheduleRequest, ScheduleResponse, Termination,
    WeightConfig,
};
use crate::parallel::{ParallelOptions, WorkerPool};
use crate::random::rng_from_option;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initializing,
    Evolving,
    Terminated(Termination),
    Done,
}

/// Raw result of a run.
#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    /// Best chromosome seen during the run.
    pub best: Chromosome,
    pub best_fitness: f64,
    pub termination: Termination,
    pub generations: usize,
    pub duration: Duration,
    /// Times the incumbent best improved.
    pub solutions_found: usize,
    /// Per-generation statistics, empty unless collection was requested.
    pub stats: Vec<GenerationStats>,
    pub final_mutation_rate: f64,
    pub final_crossover_rate: f64,
    pub method_weights: Vec<(CrossoverMethod, f64)>,
}

/// Timetable genetic optimizer.
///
/// # Usage
///
/// ```
/// use chrono::NaiveDate;
/// use u_timetable::ga::{GeneticOptimizer, OptimizerConfig};
/// use u_timetable::models::{ClassRequest, ScheduleRequest, WeightConfig};
///
/// let request = ScheduleRequest::new(
///     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
///     NaiveDate::from_ymd_opt(2024, 1, 12).unwrap(),
/// )
/// .with_class(ClassRequest::new(1, "Math"))
/// .with_class(ClassRequest::new(2, "Art"));
///
/// let config = OptimizerConfig::default()
///     .with_population_size(10)
///     .with_max_generations(5)
///     .with_seed(42);
/// let response = GeneticOptimizer::new(&request, WeightConfig::default(), config)
///     .unwrap()
///     .optimize()
///     .unwrap();
/// assert_eq!(response.assignments.len(), 4);
/// ```
#[derive(Debug)]
pub struct GeneticOptimizer {
    config: OptimizerConfig,
    fitness: FitnessCalculator,
    population: PopulationManager,
    adaptive: Option<AdaptiveController>,
    pool: WorkerPool,
}

impl GeneticOptimizer {
    /// Validates the inputs and prepares a run.
    pub fn new(
        request: &ScheduleRequest,
        weights: WeightConfig,
        config: OptimizerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let fitness = FitnessCalculator::new(request, weights)?;
        let population = PopulationManager::new(request, &config, rng_from_option(config.seed))?;
        let adaptive = config
            .adaptive
            .clone()
            .map(|a| AdaptiveController::new(a, config.mutation_rate, config.crossover_rate));
        let pool = if config.parallel_fitness {
            WorkerPool::new(config.parallel.clone())
        } else {
            WorkerPool::new(ParallelOptions::serial())
        };

        Ok(Self {
            config,
            fitness,
            population,
            adaptive,
            pool,
        })
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn fitness_calculator(&self) -> &FitnessCalculator {
        &self.fitness
    }

    /// Runs to termination and returns the raw outcome.
    pub fn run(mut self) -> Result<OptimizationOutcome> {
        let started = Instant::now();
        let mut state = State::Initializing;
        let mut best: Option<Chromosome> = None;
        let mut solutions_found = 0usize;
        let mut best_history: Vec<f64> = Vec::new();
        let mut stats: Vec<GenerationStats> = Vec::new();
        let mut termination = Termination::MaxGenerations;

        info!(
            population = self.config.population_size,
            max_generations = self.config.max_generations,
            seed = ?self.config.seed,
            "starting timetable optimization"
        );

        while state != State::Done {
            state = match state {
                State::Initializing => {
                    self.population.initialize();
                    self.evaluate_pending();
                    self.observe(&mut best, &mut solutions_found, &mut best_history, &mut stats);
                    debug!("population initialized");
                    State::Evolving
                }
                State::Evolving => {
                    self.apply_adaptation();
                    self.population.evolve();
                    self.evaluate_pending();
                    self.population.record_offspring_outcomes();
                    self.observe(&mut best, &mut solutions_found, &mut best_history, &mut stats);

                    match self.check_termination(started, &best_history) {
                        Some(reason) => State::Terminated(reason),
                        None => State::Evolving,
                    }
                }
                State::Terminated(reason) => {
                    debug!(?reason, generation = self.population.generation(), "terminated");
                    termination = reason;
                    State::Done
                }
                State::Done => State::Done,
            };
        }

        let generations = self.population.generation();
        let best = match best {
            Some(b) if b.fitness().is_finite() => b,
            _ => {
                error!(generations, "no chromosome satisfied the hard constraints");
                return Err(TimetableError::NoValidSolution { generations });
            }
        };

        let duration = started.elapsed();
        info!(
            best_fitness = best.fitness(),
            generations,
            ?termination,
            duration_ms = duration.as_millis() as u64,
            solutions_found,
            "timetable optimization finished"
        );

        Ok(OptimizationOutcome {
            best_fitness: best.fitness(),
            best,
            termination,
            generations,
            duration,
            solutions_found,
            stats,
            final_mutation_rate: self.population.mutation_rate(),
            final_crossover_rate: self.population.crossover_rate(),
            method_weights: self.population.method_weights(),
        })
    }

    /// Runs and converts the best chromosome into a dated schedule.
    pub fn optimize(self) -> Result<ScheduleResponse> {
        let collect = self.config.collect_stats;
        let outcome = self.run()?;
        Ok(ScheduleResponse {
            assignments: outcome.best.decode(),
            metadata: ScheduleMetadata {
                score: outcome.best_fitness,
                duration_ms: outcome.duration.as_millis() as u64,
                solutions_found: outcome.solutions_found,
                generations: outcome.generations,
                gap: None,
                termination: outcome.termination,
                generation_stats: collect.then_some(outcome.stats),
            },
        })
    }

    /// Scores every unevaluated chromosome; failed tasks score `-∞`.
    fn evaluate_pending(&mut self) {
        let pending = self.population.pending_indices();
        if pending.is_empty() {
            return;
        }

        let calculator = &self.fitness;
        let chromosomes = self.population.population();
        let batch: Vec<&Chromosome> = pending.iter().map(|&i| &chromosomes[i]).collect();
        let results = self.pool.map(&batch, |c| calculator.calculate_fitness(c));

        for (&index, result) in pending.iter().zip(results) {
            let fitness = match result {
                Ok(f) => f,
                Err(failure) => {
                    error!(index, %failure, "fitness evaluation failed");
                    f64::NEG_INFINITY
                }
            };
            self.population.set_fitness(index, fitness);
        }
    }

    fn apply_adaptation(&mut self) {
        let Some(controller) = self.adaptive.as_mut() else {
            return;
        };
        let generation = self.population.generation();
        if !controller.should_adapt(generation) {
            return;
        }
        let s = self.population.population_stats();
        if let Some(rates) = controller.adapt_parameters(generation, s.best, s.avg, s.diversity) {
            self.population
                .set_rates(rates.mutation_rate, rates.crossover_rate);
        }
    }

    fn observe(
        &self,
        best: &mut Option<Chromosome>,
        solutions_found: &mut usize,
        best_history: &mut Vec<f64>,
        stats: &mut Vec<GenerationStats>,
    ) {
        let s = self.population.population_stats();
        if let Some(current) = self.population.best_solution() {
            let improved = current.fitness().is_finite()
                && best
                    .as_ref()
                    .map_or(true, |b| current.fitness() > b.fitness());
            if improved {
                let mut incumbent = current.clone();
                incumbent.check_constraints(self.fitness.constraints());
                *best = Some(incumbent);
                *solutions_found += 1;
            }
        }

        let best_fitness = best.as_ref().map_or(f64::NEG_INFINITY, Individual::fitness);
        best_history.push(best_fitness);

        let generation = self.population.generation();
        debug!(
            generation,
            best = best_fitness,
            avg = s.avg,
            diversity = s.diversity,
            "generation complete"
        );
        if self.config.collect_stats {
            stats.push(GenerationStats {
                generation,
                best_fitness,
                avg_fitness: s.avg,
                diversity: s.diversity,
            });
        }
    }

    fn check_termination(&self, started: Instant, best_history: &[f64]) -> Option<Termination> {
        if let Some(limit) = self.config.time_limit_ms {
            if started.elapsed() >= Duration::from_millis(limit) {
                return Some(Termination::TimeLimit);
            }
        }
        if self.population.generation() >= self.config.max_generations {
            return Some(Termination::MaxGenerations);
        }
        if has_converged(
            best_history,
            self.config.convergence_window,
            self.config.convergence_threshold,
        ) {
            return Some(Termination::Converged);
        }
        None
    }
}

/// Whether the best fitness improved by less than `threshold` (relative to
/// `max(|old|, 1)`) over the last `window` generations.
fn has_converged(best_history: &[f64], window: usize, threshold: f64) -> bool {
    if window == 0 || best_history.len() <= window {
        return false;
    }
    let new = best_history[best_history.len() - 1];
    let old = best_history[best_history.len() - 1 - window];
    if !new.is_finite() || !old.is_finite() {
        return false;
    }
    new - old <= threshold * old.abs().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::AdaptiveConfig;
    use crate::models::{ClassRequest, ScheduleConstraints, TimeSlot};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn two_class_request() -> ScheduleRequest {
        ScheduleRequest::new(date(2024, 1, 1), date(2024, 1, 5))
            .with_class(ClassRequest::new(1, "Math"))
            .with_class(ClassRequest::new(2, "Art"))
            .with_constraints(
                ScheduleConstraints::default()
                    .with_min_periods_per_week(1)
                    .with_max_classes_per_day(2),
            )
    }

    fn small_config() -> OptimizerConfig {
        OptimizerConfig::default()
            .with_population_size(10)
            .with_max_generations(5)
            .with_seed(42)
    }

    #[test]
    fn test_end_to_end_two_classes() {
        let request = two_class_request();
        let optimizer =
            GeneticOptimizer::new(&request, WeightConfig::default(), small_config()).unwrap();
        let calculator = optimizer.fitness_calculator().clone();
        let outcome = optimizer.run().unwrap();

        let assignments = outcome.best.decode();
        assert_eq!(assignments.len(), 2);
        assert_eq!(outcome.best_fitness, outcome.best.fitness());
        assert_eq!(calculator.calculate_fitness(&outcome.best), outcome.best_fitness);
        assert_eq!(outcome.generations, 5);
        assert_eq!(outcome.termination, Termination::MaxGenerations);

        let response = GeneticOptimizer::new(&request, WeightConfig::default(), small_config())
            .unwrap()
            .optimize()
            .unwrap();
        assert_eq!(response.assignments.len(), 2);
        assert_eq!(response.assignments_for(1).count(), 1);
        assert_eq!(response.assignments_for(2).count(), 1);
        assert_eq!(response.assignments_for(3).count(), 0);
        assert_eq!(response.metadata.score, outcome.best_fitness);
        assert!(response.metadata.gap.is_none());
        assert!(response.metadata.generation_stats.is_none());
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let request = two_class_request();
        let run = || {
            GeneticOptimizer::new(&request, WeightConfig::default(), small_config())
                .unwrap()
                .run()
                .unwrap()
        };
        let (a, b) = (run(), run());
        assert_eq!(a.best.genes, b.best.genes);
        assert_eq!(a.best_fitness, b.best_fitness);
    }

    #[test]
    fn test_infeasible_request_fails() {
        // Two classes, two periods each, at most one class per week.
        let request = two_class_request().with_constraints(
            ScheduleConstraints::default()
                .with_min_periods_per_week(2)
                .with_max_classes_per_week(1),
        );
        let result = GeneticOptimizer::new(&request, WeightConfig::default(), small_config())
            .unwrap()
            .run();
        assert!(matches!(
            result,
            Err(TimetableError::NoValidSolution { generations: 5 })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = small_config().with_population_size(1);
        assert!(matches!(
            GeneticOptimizer::new(&two_class_request(), WeightConfig::default(), config),
            Err(TimetableError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_collect_stats_and_adaptive() {
        let request = ScheduleRequest::new(date(2024, 1, 1), date(2024, 1, 26))
            .with_class(ClassRequest::new(1, "Math").with_preferred(vec![TimeSlot::new(1, 2)]))
            .with_class(ClassRequest::new(2, "Art").with_avoided(vec![TimeSlot::new(5, 8)]))
            .with_class(ClassRequest::new(3, "History"))
            .with_constraints(ScheduleConstraints::default().with_min_periods_per_week(2));
        let config = OptimizerConfig::default()
            .with_population_size(16)
            .with_max_generations(25)
            .with_adaptive(AdaptiveConfig::default())
            .with_method_adaptation(5, 5)
            .with_collect_stats(true)
            .with_seed(3);
        let response = GeneticOptimizer::new(&request, WeightConfig::default(), config)
            .unwrap()
            .optimize()
            .unwrap();

        let stats = response.metadata.generation_stats.expect("stats collected");
        assert_eq!(stats.len(), response.metadata.generations + 1);
        for pair in stats.windows(2) {
            assert!(pair[1].best_fitness >= pair[0].best_fitness);
        }
        assert!(response.metadata.solutions_found >= 1);
        assert_eq!(response.assignments.len(), 3 * 2 * 4);
    }

    #[test]
    fn test_convergence_detection() {
        assert!(!has_converged(&[1.0, 2.0], 5, 1e-4));
        assert!(has_converged(&[5.0, 5.0, 5.0], 2, 1e-4));
        assert!(!has_converged(&[5.0, 6.0, 7.0], 2, 1e-4));
        assert!(!has_converged(&[f64::NEG_INFINITY, 1.0, 1.0], 2, 1e-4));
        assert!(!has_converged(&[5.0, 5.0, 5.0], 0, 1e-4));
    }

    #[test]
    fn test_converged_termination() {
        let config = OptimizerConfig::default()
            .with_population_size(10)
            .with_max_generations(500)
            .with_convergence_window(3)
            .with_convergence_threshold(1.0)
            .with_seed(9);
        let outcome = GeneticOptimizer::new(&two_class_request(), WeightConfig::default(), config)
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(outcome.termination, Termination::Converged);
        assert!(outcome.generations < 500);
    }

    #[test]
    fn test_time_limit_termination() {
        let config = OptimizerConfig::default()
            .with_population_size(10)
            .with_max_generations(1_000_000)
            .with_convergence_window(0)
            .with_time_limit_ms(20)
            .with_seed(13);
        let outcome = GeneticOptimizer::new(&two_class_request(), WeightConfig::default(), config)
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(outcome.termination, Termination::TimeLimit);
        assert!(outcome.generations >= 1);
        assert!(outcome.generations < 1_000_000);
        assert!(outcome.duration >= Duration::from_millis(20));
    }
}
