//! Core trait shared by timetable chromosomes and weight chromosomes.
//!
//! Both GA layers (schedule search and weight tuning) select parents through
//! the same [`Selection`](super::Selection) strategies, which only need to read
//! an individual's fitness.

use std::cmp::Ordering;

/// A candidate solution carrying its own fitness.
///
/// Higher fitness is better (maximization). `f64::NEG_INFINITY` marks an
/// individual that violates hard constraints or has not been evaluated.
///
/// # Implementing
///
/// ```ignore
/// #[derive(Clone)]
/// struct MySolution {
///     genes: Vec<f64>,
///     fitness: f64,
/// }
///
/// impl Individual for MySolution {
///     fn fitness(&self) -> f64 { self.fitness }
///     fn set_fitness(&mut self, f: f64) { self.fitness = f; }
/// }
/// ```
pub trait Individual: Clone + Send + Sync {
    /// Returns the current fitness (`-∞` when invalid or unevaluated).
    fn fitness(&self) -> f64;

    /// Stores a freshly computed fitness.
    fn set_fitness(&mut self, fitness: f64);
}

/// Total order on fitness values treating NaN as equal.
pub(crate) fn compare_fitness(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Index of the fittest individual, `None` for an empty slice.
pub(crate) fn best_index<I: Individual>(population: &[I]) -> Option<usize> {
    population
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| compare_fitness(a.fitness(), b.fitness()))
        .map(|(i, _)| i)
}
