//! Meta-optimization of fitness weights.
//!
//! An outer GA evolves [`WeightChromosome`]s. Each is scored by running the
//! timetable optimizer with that weight vector under a short time budget.
//!
//! # Operators
//!
//! - Selection: shared [`Selection`](crate::ga::Selection) strategies
//! - Crossover: BLX-α blend (Eshelman & Schaffer, 1993)
//! - Mutation: Gaussian, scaled to each weight's search range
//!
//! # References
//!
//! - Grefenstette (1986), "Optimization of Control Parameters for Genetic Algorithms"

mod config;
mod runner;
mod types;

pub use config::MetaConfig;
pub use runner::{MetaOptimizer, MetaResult};
pub use types::WeightChromosome;
