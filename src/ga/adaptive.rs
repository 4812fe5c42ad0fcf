//! Diversity- and convergence-driven rate control.
//!
//! Every `adaptation_interval` generations the controller appends the latest
//! best fitness and diversity to bounded histories and derives new rates:
//!
//! - mutation rises by `increase_factor` when diversity is below threshold or
//!   trending down, and otherwise decays back toward its base;
//! - crossover steps down when the search stagnates and back toward its base
//!   while it keeps improving.
//!
//! Both rates are always clamped to their configured bounds.

use std::collections::VecDeque;

use tracing::debug;

use super::config::AdaptiveConfig;

/// Convergence rate below which the search counts as stagnating.
const STAGNATION_RATE: f64 = 0.1;

/// Rates produced by one adaptation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptedRates {
    pub mutation_rate: f64,
    pub crossover_rate: f64,
}

#[derive(Debug, Clone)]
pub struct AdaptiveController {
    config: AdaptiveConfig,
    fitness_history: VecDeque<f64>,
    diversity_history: VecDeque<f64>,
    mutation_rate: f64,
    crossover_rate: f64,
    last_adaptation: usize,
}

impl AdaptiveController {
    pub fn new(config: AdaptiveConfig, initial_mutation: f64, initial_crossover: f64) -> Self {
        let window = config.history_window.max(2);
        let mutation_rate =
            initial_mutation.clamp(config.min_mutation_rate, config.max_mutation_rate);
        let crossover_rate =
            initial_crossover.clamp(config.min_crossover_rate, config.max_crossover_rate);
        Self {
            config,
            fitness_history: VecDeque::with_capacity(window),
            diversity_history: VecDeque::with_capacity(window),
            mutation_rate,
            crossover_rate,
            last_adaptation: 0,
        }
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    pub fn mutation_rate(&self) -> f64 {
        self.mutation_rate
    }

    pub fn crossover_rate(&self) -> f64 {
        self.crossover_rate
    }

    pub fn should_adapt(&self, generation: usize) -> bool {
        generation.saturating_sub(self.last_adaptation) >= self.config.adaptation_interval
    }

    /// Least-squares slope of the diversity history; 0 with fewer than two samples.
    pub fn diversity_trend(&self) -> f64 {
        let n = self.diversity_history.len();
        if n < 2 {
            return 0.0;
        }
        let nf = n as f64;
        let mean_x = (nf - 1.0) / 2.0;
        let mean_y = self.diversity_history.iter().sum::<f64>() / nf;
        let (mut num, mut den) = (0.0, 0.0);
        for (x, y) in self.diversity_history.iter().enumerate() {
            let dx = x as f64 - mean_x;
            num += dx * (y - mean_y);
            den += dx * dx;
        }
        if den == 0.0 {
            0.0
        } else {
            num / den
        }
    }

    /// Relative best-fitness improvement per sample, in `[0, 1]`.
    ///
    /// 0.5 with fewer than two samples, 0 for a flat history.
    pub fn convergence_rate(&self) -> f64 {
        let n = self.fitness_history.len();
        let (Some(&first), Some(&last)) =
            (self.fitness_history.front(), self.fitness_history.back())
        else {
            return 0.5;
        };
        if n < 2 {
            return 0.5;
        }
        if !last.is_finite() {
            return 0.0;
        }
        if !first.is_finite() {
            return 1.0;
        }
        let delta = (last - first).max(0.0);
        if delta == 0.0 {
            return 0.0;
        }
        let relative = delta / first.abs().max(1.0);
        (relative / (n as f64 - 1.0)).clamp(0.0, 1.0)
    }

    /// Next mutation rate for the observed diversity and its trend.
    pub fn adjust_mutation_rate(&self, diversity: f64, trend: f64) -> f64 {
        let c = &self.config;
        let rate = if diversity < c.diversity_threshold || trend < 0.0 {
            self.mutation_rate.max(c.base_mutation_rate) * c.increase_factor
        } else {
            c.base_mutation_rate + (self.mutation_rate - c.base_mutation_rate) * c.decay_factor
        };
        rate.clamp(c.min_mutation_rate, c.max_mutation_rate)
    }

    /// Next crossover rate for the observed convergence rate.
    pub fn adjust_crossover_rate(&self, convergence_rate: f64) -> f64 {
        let c = &self.config;
        let rate = if convergence_rate < STAGNATION_RATE {
            self.crossover_rate - c.crossover_step
        } else if self.crossover_rate < c.base_crossover_rate {
            (self.crossover_rate + c.crossover_step).min(c.base_crossover_rate)
        } else {
            (self.crossover_rate - c.crossover_step).max(c.base_crossover_rate)
        };
        rate.clamp(c.min_crossover_rate, c.max_crossover_rate)
    }

    /// Records the generation and returns new rates when an adaptation is due.
    pub fn adapt_parameters(
        &mut self,
        generation: usize,
        best_fitness: f64,
        avg_fitness: f64,
        diversity: f64,
    ) -> Option<AdaptedRates> {
        if !self.should_adapt(generation) {
            return None;
        }

        push_bounded(&mut self.fitness_history, best_fitness, self.config.history_window);
        push_bounded(&mut self.diversity_history, diversity, self.config.history_window);

        let trend = self.diversity_trend();
        let convergence = self.convergence_rate();
        self.mutation_rate = self.adjust_mutation_rate(diversity, trend);
        self.crossover_rate = self.adjust_crossover_rate(convergence);
        self.last_adaptation = generation;

        debug!(
            generation,
            best_fitness,
            avg_fitness,
            diversity,
            trend,
            convergence,
            mutation_rate = self.mutation_rate,
            crossover_rate = self.crossover_rate,
            "adapted rates"
        );

        Some(AdaptedRates {
            mutation_rate: self.mutation_rate,
            crossover_rate: self.crossover_rate,
        })
    }
}

fn push_bounded(history: &mut VecDeque<f64>, value: f64, window: usize) {
    if history.len() == window.max(1) {
        history.pop_front();
    }
    history.push_back(value);
}
