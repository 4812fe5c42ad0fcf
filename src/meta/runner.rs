//! Outer GA over fitness weights.

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, warn};

use super::config::MetaConfig;
use super::types::WeightChromosome;
use crate::error::{Result, TimetableError};
use crate::ga::{GeneticOptimizer, Individual};
use crate::models::{ScheduleRequest, WeightConfig};
use crate::parallel::{ParallelOptions, WorkerPool};
use crate::random::{derive_seed, rng_from_option};

/// Result of a meta-optimization.
#[derive(Debug, Clone)]
pub struct MetaResult {
    pub best_weights: WeightConfig,
    /// Best inner-run score achieved with `best_weights`.
    pub best_fitness: f64,
    pub generations: usize,
    /// Best score after the initial population and after each generation.
    pub history: Vec<f64>,
    /// Inner optimizer runs performed.
    pub evaluations: usize,
}

/// Tunes [`WeightConfig`]s for one request.
///
/// A weight vector's fitness is the best score an inner
/// [`GeneticOptimizer`] reaches with it. Inner runs always evaluate
/// serially; weight vectors themselves may be scored concurrently.
#[derive(Debug)]
pub struct MetaOptimizer {
    request: ScheduleRequest,
    config: MetaConfig,
    pool: WorkerPool,
}

impl MetaOptimizer {
    pub fn new(request: &ScheduleRequest, config: MetaConfig) -> Result<Self> {
        config.validate()?;
        request.validate()?;
        let pool = if config.parallel {
            WorkerPool::new(config.parallel_options.clone())
        } else {
            WorkerPool::new(ParallelOptions::serial())
        };
        Ok(Self {
            request: request.clone(),
            config,
            pool,
        })
    }

    pub fn optimize(&self) -> Result<MetaResult> {
        let config = &self.config;
        let mut rng = rng_from_option(config.seed);

        info!(
            population = config.population_size,
            generations = config.generations,
            eval_time_limit_ms = config.eval_time_limit_ms,
            "starting weight meta-optimization"
        );

        let mut population = Vec::with_capacity(config.population_size);
        population.push(WeightChromosome::from_config(&config.base_weights));
        while population.len() < config.population_size {
            population.push(WeightChromosome::random_around(
                &config.base_weights,
                config.initial_spread,
                &mut rng,
            ));
        }

        let mut evaluations = self.evaluate(&mut population, &mut rng);
        let mut best = best_of(&population);
        let mut history = vec![best.fitness()];

        for generation in 1..=config.generations {
            population = self.next_generation(population, &mut rng);
            evaluations += self.evaluate(&mut population, &mut rng);

            let candidate = best_of(&population);
            if candidate.fitness() > best.fitness() {
                best = candidate;
            }
            history.push(best.fitness());
            debug!(generation, best = best.fitness(), evaluations, "meta generation complete");
        }

        if !best.fitness().is_finite() {
            warn!("no weight vector produced a valid schedule");
            return Err(TimetableError::NoValidSolution {
                generations: config.generations,
            });
        }

        info!(
            best_fitness = best.fitness(),
            evaluations, "weight meta-optimization finished"
        );

        Ok(MetaResult {
            best_weights: best.to_config(),
            best_fitness: best.fitness(),
            generations: config.generations,
            history,
            evaluations,
        })
    }

    fn next_generation(
        &self,
        mut ranked: Vec<WeightChromosome>,
        rng: &mut StdRng,
    ) -> Vec<WeightChromosome> {
        let config = &self.config;
        ranked.sort_by(|a, b| b.fitness().total_cmp(&a.fitness()));

        let mut next: Vec<WeightChromosome> =
            ranked.iter().take(config.elite_size).cloned().collect();
        while next.len() < config.population_size {
            let p1 = &ranked[config.selection.select(&ranked, rng)];
            let p2 = &ranked[config.selection.select(&ranked, rng)];
            let (mut c1, mut c2) = if rng.random::<f64>() < config.crossover_rate {
                p1.blend_crossover(p2, config.blend_alpha, rng)
            } else {
                (p1.clone(), p2.clone())
            };
            c1.mutate(config.mutation_rate, config.mutation_sigma, rng);
            next.push(c1);
            if next.len() < config.population_size {
                c2.mutate(config.mutation_rate, config.mutation_sigma, rng);
                next.push(c2);
            }
        }
        next
    }

    /// Scores unevaluated weight vectors; returns the number of inner runs.
    fn evaluate(&self, population: &mut [WeightChromosome], rng: &mut StdRng) -> usize {
        let jobs: Vec<(usize, WeightConfig, u64)> = population
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_evaluated())
            .map(|(i, c)| (i, c.to_config(), derive_seed(rng)))
            .collect();

        let results = self
            .pool
            .map(&jobs, |(_, weights, seed)| self.score(weights, *seed));

        for ((index, _, _), result) in jobs.iter().zip(results) {
            let fitness = result.unwrap_or_else(|failure| {
                warn!(%failure, "weight evaluation failed");
                f64::NEG_INFINITY
            });
            population[*index].set_fitness(fitness);
        }
        jobs.len()
    }

    /// Best score of one inner run, `-∞` if it fails.
    fn score(&self, weights: &WeightConfig, seed: u64) -> f64 {
        let inner = self
            .config
            .inner
            .clone()
            .with_parallel_fitness(false)
            .with_time_limit_ms(self.config.eval_time_limit_ms)
            .with_seed(seed);

        let outcome = GeneticOptimizer::new(&self.request, weights.clone(), inner)
            .and_then(GeneticOptimizer::run);
        match outcome {
            Ok(outcome) => outcome.best_fitness,
            Err(e) => {
                warn!(error = %e, "inner optimization failed");
                f64::NEG_INFINITY
            }
        }
    }
}

fn best_of(population: &[WeightChromosome]) -> WeightChromosome {
    population
        .iter()
        .max_by(|a, b| a.fitness().total_cmp(&b.fitness()))
        .cloned()
        .unwrap_or_else(|| WeightChromosome::from_config(&WeightConfig::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::OptimizerConfig;
    use crate::models::{ClassRequest, ScheduleConstraints, TimeSlot, WeightKey};
    use chrono::NaiveDate;

    fn request() -> ScheduleRequest {
        ScheduleRequest::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 12).unwrap(),
        )
        .with_class(ClassRequest::new(1, "Math").with_preferred(vec![TimeSlot::new(2, 2)]))
        .with_class(ClassRequest::new(2, "Art").with_avoided(vec![TimeSlot::new(1, 1)]))
    }

    fn config() -> MetaConfig {
        MetaConfig::default()
            .with_population_size(4)
            .with_generations(2)
            .with_inner(
                OptimizerConfig::default()
                    .with_population_size(8)
                    .with_max_generations(4),
            )
            .with_seed(17)
    }

    #[test]
    fn test_meta_optimize_small() {
        let result = MetaOptimizer::new(&request(), config()).unwrap().optimize().unwrap();

        assert_eq!(result.history.len(), 3);
        for pair in result.history.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        assert!(result.best_fitness.is_finite());
        assert_eq!(result.best_fitness, *result.history.last().unwrap());
        assert!(result.evaluations >= 4);
        assert!(result.best_weights.validate().is_ok());
        for key in WeightKey::ALL {
            let (low, high) = key.bounds();
            let v = result.best_weights.get(key);
            assert!(v >= low && v <= high);
        }
    }

    #[test]
    fn test_serial_and_parallel_agree() {
        let serial = MetaOptimizer::new(&request(), config().with_parallel(false))
            .unwrap()
            .optimize()
            .unwrap();
        let parallel = MetaOptimizer::new(&request(), config()).unwrap().optimize().unwrap();
        assert_eq!(serial.best_weights, parallel.best_weights);
        assert_eq!(serial.history, parallel.history);
    }

    #[test]
    fn test_infeasible_request_fails() {
        let request = request().with_constraints(
            ScheduleConstraints::default()
                .with_min_periods_per_week(3)
                .with_max_classes_per_week(2),
        );
        let result = MetaOptimizer::new(&request, config().with_parallel(false))
            .unwrap()
            .optimize();
        assert!(matches!(result, Err(TimetableError::NoValidSolution { .. })));
    }
}
