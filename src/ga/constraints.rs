//! Hard-constraint evaluation shared by validation and fitness scoring.
//!
//! [`evaluate`] tallies a gene list once and yields both the feasibility
//! verdict used by [`Chromosome::validate`](super::Chromosome::validate) and
//! the consecutive-run/overlap data the fitness calculator penalises, so the
//! two can never disagree about what a run or a daily load is.

use std::collections::BTreeMap;
use std::fmt;

use super::chromosome::Gene;
use crate::models::{ConsecutiveRule, ScheduleConstraints, PERIODS_PER_DAY};

/// A maximal block of back-to-back periods on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub week: u32,
    pub day_of_week: u8,
    pub first_period: u8,
    pub length: usize,
}

/// A broken hard constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    DailyLimit {
        week: u32,
        day_of_week: u8,
        count: usize,
        limit: usize,
    },
    WeeklyLimit {
        week: u32,
        count: usize,
        limit: usize,
    },
    ConsecutiveLimit { run: Run, limit: usize },
    ConsecutiveForbidden { run: Run },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DailyLimit {
                week,
                day_of_week,
                count,
                limit,
            } => write!(
                f,
                "week {week}, day {day_of_week}: {count} classes exceed the daily limit of {limit}"
            ),
            Violation::WeeklyLimit { week, count, limit } => write!(
                f,
                "week {week}: {count} classes exceed the weekly limit of {limit}"
            ),
            Violation::ConsecutiveLimit { run, limit } => write!(
                f,
                "week {}, day {}: {} consecutive periods from period {} exceed the limit of {limit}",
                run.week, run.day_of_week, run.length, run.first_period
            ),
            Violation::ConsecutiveForbidden { run } => write!(
                f,
                "week {}, day {}: {} back-to-back periods from period {} but consecutive classes are not allowed",
                run.week, run.day_of_week, run.length, run.first_period
            ),
        }
    }
}

/// Load of one `(week, day)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayLoad {
    /// Genes placed on the day.
    pub count: usize,
    /// Bit `p - 1` set when period `p` is occupied.
    pub occupied: u16,
}

impl DayLoad {
    /// Distinct periods in use.
    pub fn distinct_periods(&self) -> usize {
        self.occupied.count_ones() as usize
    }
}

/// Everything learned from one pass over a gene list.
#[derive(Debug, Clone, Default)]
pub struct ConstraintReport {
    pub violations: Vec<Violation>,
    /// Per-`(week, day)` loads, in calendar order.
    pub day_loads: BTreeMap<(u32, u8), DayLoad>,
    /// Genes per week.
    pub week_counts: BTreeMap<u32, usize>,
    /// All runs of length ≥ 2.
    pub runs: Vec<Run>,
    /// Genes sharing a `(week, day, period)` with an earlier gene.
    pub overlaps: usize,
}

impl ConstraintReport {
    pub fn is_feasible(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Tallies `genes` and checks them against `constraints`.
pub fn evaluate(genes: &[Gene], constraints: &ScheduleConstraints) -> ConstraintReport {
    let mut report = ConstraintReport::default();

    for gene in genes {
        let load = report
            .day_loads
            .entry((gene.week, gene.day_of_week))
            .or_default();
        load.count += 1;
        if (1..=PERIODS_PER_DAY).contains(&gene.period) {
            let bit = 1u16 << (gene.period - 1);
            if load.occupied & bit != 0 {
                report.overlaps += 1;
            }
            load.occupied |= bit;
        }
        *report.week_counts.entry(gene.week).or_insert(0) += 1;
    }

    for (&(week, day_of_week), load) in &report.day_loads {
        if load.count > constraints.max_classes_per_day {
            report.violations.push(Violation::DailyLimit {
                week,
                day_of_week,
                count: load.count,
                limit: constraints.max_classes_per_day,
            });
        }
        for run in runs_of(week, day_of_week, load.occupied) {
            if !constraints.allow_consecutive_classes {
                report.violations.push(Violation::ConsecutiveForbidden { run });
            } else if constraints.consecutive_classes_rule == ConsecutiveRule::Hard
                && run.length > constraints.max_consecutive_classes
            {
                report.violations.push(Violation::ConsecutiveLimit {
                    run,
                    limit: constraints.max_consecutive_classes,
                });
            }
            report.runs.push(run);
        }
    }

    for (&week, &count) in &report.week_counts {
        if count > constraints.max_classes_per_week {
            report.violations.push(Violation::WeeklyLimit {
                week,
                count,
                limit: constraints.max_classes_per_week,
            });
        }
    }

    report
}

/// Maximal runs of length ≥ 2 in an occupancy mask.
fn runs_of(week: u32, day_of_week: u8, occupied: u16) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut start: Option<u8> = None;

    for period in 1..=PERIODS_PER_DAY + 1 {
        let busy = period <= PERIODS_PER_DAY && occupied & (1 << (period - 1)) != 0;
        match (busy, start) {
            (true, None) => start = Some(period),
            (false, Some(first)) => {
                let length = usize::from(period - first);
                if length >= 2 {
                    runs.push(Run {
                        week,
                        day_of_week,
                        first_period: first,
                        length,
                    });
                }
                start = None;
            }
            _ => {}
        }
    }
    runs
}
