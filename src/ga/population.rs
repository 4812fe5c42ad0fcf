//! Population state and generation replacement.
//!
//! [`PopulationManager`] owns the chromosomes of the current generation, the
//! generator driving selection and variation, and per-operator statistics
//! used to bias crossover method choice toward operators whose offspring
//! beat their parents.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;

use super::chromosome::{Chromosome, Lineage};
use super::config::OptimizerConfig;
use super::crossover::CrossoverMethod;
use super::selection::Selection;
use super::types::{best_index, compare_fitness, Individual};
use crate::error::Result;
use crate::models::{Horizon, ScheduleRequest};
use crate::random::probability;

/// Upper bound on chromosome pairs compared when measuring diversity.
const DIVERSITY_SAMPLE_PAIRS: usize = 100;

/// Usage record of one crossover operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MethodStats {
    pub method: CrossoverMethod,
    /// Selection weight, normalised across methods.
    pub weight: f64,
    /// Evaluated offspring since the last weight update.
    pub uses: usize,
    /// Offspring that beat their fitter parent since the last update.
    pub improvements: usize,
}

/// Summary of one generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationStats {
    pub best: f64,
    /// Mean over valid chromosomes, `-∞` when there are none.
    pub avg: f64,
    /// Mean normalised Hamming distance between chromosomes, in `[0, 1]`.
    pub diversity: f64,
}

/// Population of timetable chromosomes.
#[derive(Debug)]
pub struct PopulationManager {
    request: ScheduleRequest,
    horizon: Horizon,
    population: Vec<Chromosome>,
    generation: usize,
    population_size: usize,
    elite_size: usize,
    selection: Selection,
    mutation_rate: f64,
    crossover_rate: f64,
    methods: Vec<MethodStats>,
    adaptation_start: usize,
    update_interval: usize,
    rng: StdRng,
}

impl PopulationManager {
    pub fn new(request: &ScheduleRequest, config: &OptimizerConfig, rng: StdRng) -> Result<Self> {
        config.validate()?;
        let horizon = request.horizon()?;

        let mut methods: Vec<CrossoverMethod> = config.crossover_methods.clone();
        methods.sort();
        methods.dedup();
        let initial_weight = 1.0 / methods.len() as f64;

        Ok(Self {
            request: request.clone(),
            horizon,
            population: Vec::with_capacity(config.population_size),
            generation: 0,
            population_size: config.population_size,
            elite_size: config.elite_size,
            selection: config.selection,
            mutation_rate: config.mutation_rate,
            crossover_rate: config.crossover_rate,
            methods: methods
                .into_iter()
                .map(|method| MethodStats {
                    method,
                    weight: initial_weight,
                    uses: 0,
                    improvements: 0,
                })
                .collect(),
            adaptation_start: config.method_adaptation_start,
            update_interval: config.method_update_interval,
            rng,
        })
    }

    /// Fills the population with random, unevaluated chromosomes.
    pub fn initialize(&mut self) {
        let mut population = Vec::with_capacity(self.population_size);
        for _ in 0..self.population_size {
            population.push(Chromosome::random(&self.request, self.horizon, &mut self.rng));
        }
        self.population = population;
        self.generation = 0;
    }

    /// Index of a parent chosen by the configured selection strategy.
    ///
    /// # Panics
    /// Panics if the population is empty.
    pub fn select_parent(&mut self) -> usize {
        self.selection.select(&self.population, &mut self.rng)
    }

    /// Picks a crossover operator: uniformly before the adaptation start,
    /// in proportion to learned weights afterwards.
    pub fn select_crossover_method(&mut self) -> CrossoverMethod {
        if self.generation < self.adaptation_start {
            return self
                .methods
                .choose(&mut self.rng)
                .map_or(CrossoverMethod::SinglePoint, |s| s.method);
        }

        let total: f64 = self.methods.iter().map(|s| s.weight).sum();
        if total <= 0.0 || !total.is_finite() {
            return self
                .methods
                .choose(&mut self.rng)
                .map_or(CrossoverMethod::SinglePoint, |s| s.method);
        }
        let mut roll = self.rng.random_range(0.0..total);
        for stat in &self.methods {
            roll -= stat.weight;
            if roll <= 0.0 {
                return stat.method;
            }
        }
        self.methods
            .last()
            .map_or(CrossoverMethod::SinglePoint, |s| s.method)
    }

    /// Recomputes weights as `(improvements + 1) / (uses + 2)`, normalised,
    /// and resets the counters.
    pub fn update_crossover_weights(&mut self) {
        let raw: Vec<f64> = self
            .methods
            .iter()
            .map(|s| (s.improvements as f64 + 1.0) / (s.uses as f64 + 2.0))
            .collect();
        let total: f64 = raw.iter().sum();
        for (stat, w) in self.methods.iter_mut().zip(raw) {
            stat.weight = w / total;
            stat.uses = 0;
            stat.improvements = 0;
        }
    }

    /// Credits crossover methods for evaluated offspring and clears their lineage.
    ///
    /// Returns the number of offspring that improved on their fitter parent.
    pub fn record_offspring_outcomes(&mut self) -> usize {
        let mut improved = 0;
        for chromosome in &mut self.population {
            if !chromosome.is_evaluated() {
                continue;
            }
            let Some(lineage) = chromosome.lineage.take() else {
                continue;
            };
            let Some(stat) = self.methods.iter_mut().find(|s| s.method == lineage.method) else {
                continue;
            };
            stat.uses += 1;
            if chromosome.fitness() > lineage.parent_fitness {
                stat.improvements += 1;
                improved += 1;
            }
        }
        improved
    }

    /// Replaces the population with the next generation.
    ///
    /// Elites are carried unchanged; the rest are offspring of selected
    /// parents, recombined with probability `crossover_rate` and then mutated.
    /// Offspring identical to an evaluated parent keep its fitness.
    pub fn evolve(&mut self) {
        self.population.sort_by(|a, b| compare_fitness(b.fitness(), a.fitness()));

        let mut next: Vec<Chromosome> = Vec::with_capacity(self.population_size);
        for elite in self.population.iter().take(self.elite_size) {
            let mut elite = elite.clone();
            elite.lineage = None;
            next.push(elite);
        }

        while next.len() < self.population_size {
            let i = self.select_parent();
            let j = self.select_parent();
            let method = if self.rng.random::<f64>() < self.crossover_rate {
                Some(self.select_crossover_method())
            } else {
                None
            };
            let (p1, p2) = (&self.population[i], &self.population[j]);

            let (mut c1, mut c2) = match method {
                Some(method) => {
                    let (mut c1, mut c2) = p1.crossover(p2, method, &mut self.rng);
                    let lineage = Lineage {
                        method,
                        parent_fitness: p1.fitness().max(p2.fitness()),
                    };
                    c1.lineage = Some(lineage);
                    c2.lineage = Some(lineage);
                    (c1, c2)
                }
                None => {
                    let mut c1 = p1.clone();
                    let mut c2 = p2.clone();
                    c1.lineage = None;
                    c2.lineage = None;
                    (c1, c2)
                }
            };

            c1.mutate(self.mutation_rate, &mut self.rng);
            next.push(c1);
            if next.len() < self.population_size {
                c2.mutate(self.mutation_rate, &mut self.rng);
                next.push(c2);
            }
        }

        self.population = next;
        self.generation += 1;

        if self.generation >= self.adaptation_start
            && self.generation % self.update_interval == 0
        {
            self.update_crossover_weights();
        }
    }

    /// The fittest chromosome, `None` for an empty population.
    pub fn best_solution(&self) -> Option<&Chromosome> {
        best_index(&self.population).map(|i| &self.population[i])
    }

    pub fn population_stats(&self) -> PopulationStats {
        let best = self
            .best_solution()
            .map_or(f64::NEG_INFINITY, Individual::fitness);

        let valid: Vec<f64> = self
            .population
            .iter()
            .map(Individual::fitness)
            .filter(|f| f.is_finite())
            .collect();
        let avg = if valid.is_empty() {
            f64::NEG_INFINITY
        } else {
            valid.iter().sum::<f64>() / valid.len() as f64
        };

        PopulationStats {
            best,
            avg,
            diversity: self.diversity(),
        }
    }

    /// Mean pairwise distance over all pairs, or a fixed spread of
    /// [`DIVERSITY_SAMPLE_PAIRS`] pairs for large populations.
    fn diversity(&self) -> f64 {
        let n = self.population.len();
        if n < 2 {
            return 0.0;
        }

        let mut pairs: Vec<(usize, usize)> = Vec::new();
        if n * (n - 1) / 2 <= DIVERSITY_SAMPLE_PAIRS {
            for i in 0..n {
                for j in i + 1..n {
                    pairs.push((i, j));
                }
            }
        } else {
            for p in 0..DIVERSITY_SAMPLE_PAIRS {
                let i = (p * 7919) % n;
                let j = (i + 1 + p % (n - 1)) % n;
                pairs.push((i, j));
            }
        }

        let total: f64 = pairs
            .iter()
            .map(|&(i, j)| self.population[i].distance(&self.population[j]))
            .sum();
        total / pairs.len() as f64
    }

    pub fn population(&self) -> &[Chromosome] {
        &self.population
    }

    /// Indices of chromosomes awaiting evaluation.
    pub fn pending_indices(&self) -> Vec<usize> {
        self.population
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_evaluated())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn set_fitness(&mut self, index: usize, fitness: f64) {
        if let Some(chromosome) = self.population.get_mut(index) {
            chromosome.set_fitness(fitness);
        }
    }

    /// Overrides the variation rates, clamped to `[0, 1]`. Non-finite rates
    /// become 0.
    pub fn set_rates(&mut self, mutation_rate: f64, crossover_rate: f64) {
        self.mutation_rate = probability(mutation_rate);
        self.crossover_rate = probability(crossover_rate);
    }

    pub fn mutation_rate(&self) -> f64 {
        self.mutation_rate
    }

    pub fn crossover_rate(&self) -> f64 {
        self.crossover_rate
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn method_stats(&self) -> &[MethodStats] {
        &self.methods
    }

    /// Current `(method, weight)` pairs.
    pub fn method_weights(&self) -> Vec<(CrossoverMethod, f64)> {
        self.methods.iter().map(|s| (s.method, s.weight)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassRequest, ScheduleConstraints};
    use crate::random::create_rng;
    use chrono::NaiveDate;

    fn request() -> ScheduleRequest {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 19).unwrap();
        let mut req = ScheduleRequest::new(start, end).with_constraints(
            ScheduleConstraints::default()
                .with_min_periods_per_week(2)
                .with_max_classes_per_day(4),
        );
        for id in 0..4 {
            req = req.with_class(ClassRequest::new(id, format!("class-{id}")));
        }
        req
    }

    fn config() -> OptimizerConfig {
        OptimizerConfig::default()
            .with_population_size(12)
            .with_elite_size(2)
            .with_method_adaptation(2, 2)
    }

    fn manager() -> PopulationManager {
        let mut m = PopulationManager::new(&request(), &config(), create_rng(42)).unwrap();
        m.initialize();
        m
    }

    fn score_all(m: &mut PopulationManager) {
        for i in m.pending_indices() {
            // Earlier placements score higher.
            let f = -m.population()[i]
                .genes
                .iter()
                .map(|g| g.day_of_week as f64)
                .sum::<f64>();
            m.set_fitness(i, f);
        }
    }

    #[test]
    fn test_initialize_fills_population() {
        let m = manager();
        assert_eq!(m.population().len(), 12);
        assert_eq!(m.pending_indices().len(), 12);
        assert_eq!(m.population()[0].len(), 4 * 2 * 3);
    }

    #[test]
    fn test_select_parent_favors_fitter() {
        let mut m = manager();
        for i in 0..12 {
            m.set_fitness(i, i as f64);
        }
        let mut counts = [0usize; 12];
        for _ in 0..300 {
            let i = m.select_parent();
            assert!(i < 12);
            counts[i] += 1;
        }
        assert!(counts[11] > counts[0], "{counts:?}");
        assert!(counts[11] > 300 / 12);
    }

    #[test]
    fn test_evolve_keeps_elites_and_size() {
        let mut m = manager();
        score_all(&mut m);
        let best_before = m.population_stats().best;
        m.evolve();
        assert_eq!(m.population().len(), 12);
        assert_eq!(m.generation(), 1);
        assert_eq!(m.population()[0].fitness(), best_before);
        assert!(m.population()[0].lineage.is_none());
    }

    #[test]
    fn test_best_never_regresses_with_elitism() {
        let mut m = manager();
        score_all(&mut m);
        let mut best = m.population_stats().best;
        for _ in 0..10 {
            m.evolve();
            score_all(&mut m);
            m.record_offspring_outcomes();
            let now = m.population_stats().best;
            assert!(now >= best);
            best = now;
        }
    }

    #[test]
    fn test_record_outcomes_and_weight_update() {
        let mut m = manager();
        score_all(&mut m);
        m.evolve();
        score_all(&mut m);
        m.record_offspring_outcomes();
        let uses: usize = m.method_stats().iter().map(|s| s.uses).sum();
        assert!(uses > 0);
        assert!(m.population().iter().all(|c| c.lineage.is_none()));

        m.update_crossover_weights();
        let total: f64 = m.method_weights().iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(m.method_stats().iter().all(|s| s.uses == 0 && s.improvements == 0));
    }

    #[test]
    fn test_weight_formula() {
        let mut m = manager();
        for (k, stat) in m.methods.iter_mut().enumerate() {
            stat.uses = 8;
            stat.improvements = if k == 0 { 8 } else { 0 };
        }
        m.update_crossover_weights();
        let w = m.method_weights();
        // Raw 0.9 for the winner and 0.1 for each other method.
        assert!((w[0].1 - 0.9 / 1.2).abs() < 1e-12);
        assert!((w[1].1 - 0.1 / 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_method_choice_follows_weights() {
        let mut m = manager();
        m.generation = 5;
        for stat in &mut m.methods {
            stat.weight = if stat.method == CrossoverMethod::Uniform { 1.0 } else { 0.0 };
        }
        for _ in 0..50 {
            assert_eq!(m.select_crossover_method(), CrossoverMethod::Uniform);
        }
    }

    #[test]
    fn test_stats_exclude_invalid_from_average() {
        let mut m = manager();
        for i in 0..12 {
            let f = if i % 2 == 0 { f64::NEG_INFINITY } else { 10.0 };
            m.set_fitness(i, f);
        }
        let stats = m.population_stats();
        assert_eq!(stats.best, 10.0);
        assert_eq!(stats.avg, 10.0);
        assert!(stats.diversity > 0.0 && stats.diversity <= 1.0);
    }

    #[test]
    fn test_diversity_zero_for_clones() {
        let mut m = manager();
        let first = m.population()[0].clone();
        m.population = vec![first; 30];
        assert_eq!(m.population_stats().diversity, 0.0);
    }

    #[test]
    fn test_set_rates_clamped() {
        let mut m = manager();
        m.set_rates(1.7, -0.2);
        assert_eq!(m.mutation_rate(), 1.0);
        assert_eq!(m.crossover_rate(), 0.0);

        m.set_rates(f64::NAN, f64::NAN);
        assert_eq!(m.mutation_rate(), 0.0);
        assert_eq!(m.crossover_rate(), 0.0);
        score_all(&mut m);
        m.evolve();
        assert_eq!(m.population().len(), 12);
    }
}
