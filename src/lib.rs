//! Periodic timetabling engine.
//!
//! Places every occurrence of a set of recurring classes into a
//! Monday–Friday × 8-period weekly grid across a dated horizon, maximizing a
//! weighted multi-term fitness under hard daily, weekly and consecutive-class
//! limits.
//!
//! - [`models`]: requests, constraints, weights, dated horizon and responses
//! - [`ga`]: chromosome encoding, crossover operators, fitness terms,
//!   population management, adaptive rate control and the generation loop
//! - [`parallel`]: order-preserving fitness evaluation on a rayon pool
//! - [`meta`]: an outer GA tuning the fitness weights
//! - [`experiment`]: single-run entry point for parameter studies
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use u_timetable::ga::{GeneticOptimizer, OptimizerConfig};
//! use u_timetable::models::{
//!     ClassRequest, ScheduleConstraints, ScheduleRequest, TimeSlot, WeightConfig,
//! };
//!
//! let request = ScheduleRequest::new(
//!     NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 9, 27).unwrap(),
//! )
//! .with_class(ClassRequest::new(1, "Algebra").with_preferred(vec![TimeSlot::new(1, 2)]))
//! .with_class(ClassRequest::new(2, "Drawing").with_conflicts(vec![TimeSlot::new(5, 8)]))
//! .with_constraints(ScheduleConstraints::default().with_min_periods_per_week(2));
//!
//! let config = OptimizerConfig::fast().with_max_generations(20).with_seed(7);
//! let response = GeneticOptimizer::new(&request, WeightConfig::default(), config)
//!     .unwrap()
//!     .optimize()
//!     .unwrap();
//!
//! assert_eq!(response.assignments.len(), 2 * 2 * 4);
//! assert!(response.metadata.score.is_finite());
//! ```
//!
//! # Logging
//!
//! Progress is reported through [`tracing`]; install a subscriber in the
//! host application to see it.

pub mod error;
pub mod experiment;
pub mod ga;
pub mod meta;
pub mod models;
pub mod parallel;
pub mod random;

pub use error::{Result, TaskFailure, TimetableError};
pub use experiment::{run_single_experiment, ExperimentParams, ExperimentResult};
pub use ga::{GeneticOptimizer, OptimizerConfig};
pub use meta::{MetaConfig, MetaOptimizer, MetaResult};
pub use models::{ScheduleRequest, ScheduleResponse, WeightConfig};
