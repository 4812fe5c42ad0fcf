//! Schedule response handed back to the service layer.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use chrono::NaiveDate;

use super::request::ClassId;

/// One dated class occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ScheduleAssignment {
    pub class_id: ClassId,
    pub date: NaiveDate,
    pub day_of_week: u8,
    pub period: u8,
}

/// Why the generation loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Termination {
    /// Best fitness stopped improving over the convergence window.
    Converged,
    /// Wall-clock budget exhausted.
    TimeLimit,
    /// Generation budget exhausted.
    MaxGenerations,
}

/// Population statistics recorded for one generation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct GenerationStats {
    pub generation: usize,
    pub best_fitness: f64,
    pub avg_fitness: f64,
    pub diversity: f64,
}

/// Run metadata.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ScheduleMetadata {
    /// Fitness of the returned schedule.
    pub score: f64,
    pub duration_ms: u64,
    /// Number of times the incumbent best solution improved.
    pub solutions_found: usize,
    pub generations: usize,
    /// Optimality gap; not defined for a metaheuristic.
    pub gap: Option<f64>,
    pub termination: Termination,
    /// Per-generation statistics, present when collection was requested.
    pub generation_stats: Option<Vec<GenerationStats>>,
}

/// A complete schedule.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ScheduleResponse {
    pub assignments: Vec<ScheduleAssignment>,
    pub metadata: ScheduleMetadata,
}

impl ScheduleResponse {
    /// Assignments of one class in date order.
    pub fn assignments_for(
        &self,
        class_id: ClassId,
    ) -> impl Iterator<Item = &ScheduleAssignment> {
        self.assignments.iter().filter(move |a| a.class_id == class_id)
    }
}
