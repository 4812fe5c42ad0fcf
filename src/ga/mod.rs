//! Genetic algorithm for weekly timetables.
//!
//! # Core Types
//!
//! - [`Chromosome`] / [`Gene`]: a candidate schedule, one gene per class occurrence
//! - [`FitnessCalculator`]: multi-term scoring, `-∞` for hard-constraint violations
//! - [`PopulationManager`]: elitist replacement with adaptively weighted crossover operators
//! - [`AdaptiveController`]: diversity/convergence-driven mutation and crossover rates
//! - [`GeneticOptimizer`]: the generation loop and its termination rules
//!
//! # Submodules
//!
//! - [`crossover`]: single-point, two-point, uniform and order-based operators
//! - [`constraints`]: shared hard-constraint evaluation
//!
//! # References
//!
//! - Holland (1975), *Adaptation in Natural and Artificial Systems*
//! - Goldberg (1989), *Genetic Algorithms in Search, Optimization, and Machine Learning*
//! - Srinivas & Patnaik (1994), "Adaptive probabilities of crossover and mutation in genetic algorithms"

mod adaptive;
mod chromosome;
mod config;
pub mod constraints;
pub mod crossover;
mod fitness;
mod optimizer;
mod population;
mod selection;
mod types;

pub use adaptive::{AdaptedRates, AdaptiveController};
pub use chromosome::{Chromosome, Gene, GeneKey, Lineage};
pub use config::{AdaptiveConfig, OptimizerConfig};
pub use constraints::{ConstraintReport, Run, Violation};
pub use crossover::CrossoverMethod;
pub use fitness::{FitnessBreakdown, FitnessCalculator, CONFLICT_PENALTY, OVERLAP_PENALTY};
pub use optimizer::{GeneticOptimizer, OptimizationOutcome};
pub use population::{MethodStats, PopulationManager, PopulationStats};
pub use selection::Selection;
pub use types::Individual;
