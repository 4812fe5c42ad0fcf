//! Multi-term fitness scoring.
//!
//! [`FitnessCalculator::calculate_fitness`] returns `-∞` for chromosomes that
//! break a hard constraint and otherwise the plain sum of the terms below.
//! Each term is a public method so it can be inspected on its own.
//!
//! | Term | Contribution |
//! |---|---|
//! | conflict | `-1000` per gene on one of its class's conflict slots |
//! | required | `required_periods` per gene on a required slot |
//! | preference | `preference_weight × preferred_periods` per preferred match |
//! | avoidance | `avoidance_weight × avoid_periods` per avoided match |
//! | distribution | per class, `distribution / (1 + var(per-week counts))` |
//! | consecutive | per run of `L ≥ 2`, `consecutive_classes × (L-1)²` plus `consecutive_classes × (L-max)` over a soft limit |
//! | early scheduling | per gene, `earlier_dates × (1 - (5·week + day - 1) / total_days)` |
//! | final week | `final_week_compression × (5 - days used) / 5` when the last week is used |
//! | day usage | `day_usage × distinct days used / total_days` |
//! | daily balance | `daily_balance × Σ_weeks var(per-day counts)` |
//! | overlap | `-500` per gene on an already occupied `(week, day, period)` |

use std::collections::{BTreeMap, HashMap};

use super::chromosome::{Chromosome, Gene};
use super::constraints::{self, ConstraintReport, Run};
use super::types::Individual;
use crate::error::Result;
use crate::models::{
    ClassId, ConsecutiveRule, Horizon, ScheduleConstraints, ScheduleRequest, TimeSlot,
    WeightConfig, DAYS_PER_WEEK, PERIODS_PER_DAY,
};

/// Penalty per gene placed on a conflict slot.
pub const CONFLICT_PENALTY: f64 = -1000.0;

/// Penalty per gene stacked onto an occupied slot.
pub const OVERLAP_PENALTY: f64 = -500.0;

const CONFLICT: u8 = 1;
const PREFERRED: u8 = 1 << 1;
const REQUIRED: u8 = 1 << 2;
const AVOID: u8 = 1 << 3;

const SLOTS_PER_WEEK: usize = DAYS_PER_WEEK as usize * PERIODS_PER_DAY as usize;

/// Precomputed slot rules of one class.
#[derive(Debug, Clone)]
struct ClassProfile {
    flags: [u8; SLOTS_PER_WEEK],
    preference_weight: f64,
    avoidance_weight: f64,
}

impl ClassProfile {
    fn flags_at(&self, gene: &Gene) -> u8 {
        slot_index(gene.day_of_week, gene.period).map_or(0, |i| self.flags[i])
    }
}

fn slot_index(day_of_week: u8, period: u8) -> Option<usize> {
    TimeSlot::new(day_of_week, period)
        .is_in_range()
        .then(|| (day_of_week as usize - 1) * PERIODS_PER_DAY as usize + (period as usize - 1))
}

/// Every term of one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FitnessBreakdown {
    pub conflict: f64,
    pub required: f64,
    pub preference: f64,
    pub avoidance: f64,
    pub distribution: f64,
    pub consecutive: f64,
    pub early_scheduling: f64,
    pub final_week: f64,
    pub day_usage: f64,
    pub daily_balance: f64,
    pub overlap: f64,
    /// Whether all hard constraints held.
    pub feasible: bool,
}

impl FitnessBreakdown {
    /// Sum of all terms, `-∞` when infeasible.
    pub fn total(&self) -> f64 {
        if !self.feasible {
            return f64::NEG_INFINITY;
        }
        self.conflict
            + self.required
            + self.preference
            + self.avoidance
            + self.distribution
            + self.consecutive
            + self.early_scheduling
            + self.final_week
            + self.day_usage
            + self.daily_balance
            + self.overlap
    }
}

/// Scores chromosomes for one request and weight vector.
///
/// Immutable after construction and shared by reference across worker threads.
#[derive(Debug, Clone)]
pub struct FitnessCalculator {
    profiles: HashMap<ClassId, ClassProfile>,
    class_ids: Vec<ClassId>,
    weights: WeightConfig,
    constraints: ScheduleConstraints,
    horizon: Horizon,
}

impl FitnessCalculator {
    /// Builds a calculator, validating the request and the weights.
    pub fn new(request: &ScheduleRequest, weights: WeightConfig) -> Result<Self> {
        request.validate()?;
        weights.validate()?;

        let mut profiles = HashMap::with_capacity(request.classes.len());
        for class in &request.classes {
            let mut flags = [0u8; SLOTS_PER_WEEK];
            let rules = [
                (&class.conflicts, CONFLICT),
                (&class.preferred_periods, PREFERRED),
                (&class.required_periods, REQUIRED),
                (&class.avoid_periods, AVOID),
            ];
            for (slots, flag) in rules {
                for slot in slots {
                    if let Some(i) = slot_index(slot.day_of_week, slot.period) {
                        flags[i] |= flag;
                    }
                }
            }
            profiles.insert(
                class.id,
                ClassProfile {
                    flags,
                    preference_weight: class.preference_weight,
                    avoidance_weight: class.avoidance_weight,
                },
            );
        }

        Ok(Self {
            profiles,
            class_ids: request.classes.iter().map(|c| c.id).collect(),
            weights,
            constraints: request.constraints.clone(),
            horizon: request.horizon()?,
        })
    }

    pub fn weights(&self) -> &WeightConfig {
        &self.weights
    }

    pub fn constraints(&self) -> &ScheduleConstraints {
        &self.constraints
    }

    pub fn horizon(&self) -> &Horizon {
        &self.horizon
    }

    /// Fitness of `chromosome`; `-∞` if it breaks a hard constraint.
    pub fn calculate_fitness(&self, chromosome: &Chromosome) -> f64 {
        let report = chromosome.constraint_report(&self.constraints);
        if !report.is_feasible() {
            return f64::NEG_INFINITY;
        }
        self.terms(&chromosome.genes, &report).total()
    }

    /// Scores `chromosome` in place, recording its violations.
    pub fn evaluate(&self, chromosome: &mut Chromosome) -> f64 {
        let report = chromosome.constraint_report(&self.constraints);
        chromosome.violations = report.violations.iter().map(ToString::to_string).collect();
        let fitness = if report.is_feasible() {
            self.terms(&chromosome.genes, &report).total()
        } else {
            f64::NEG_INFINITY
        };
        chromosome.set_fitness(fitness);
        fitness
    }

    /// All terms of `chromosome`, computed even when it is infeasible.
    pub fn breakdown(&self, chromosome: &Chromosome) -> FitnessBreakdown {
        let report = chromosome.constraint_report(&self.constraints);
        self.terms(&chromosome.genes, &report)
    }

    fn terms(&self, genes: &[Gene], report: &ConstraintReport) -> FitnessBreakdown {
        FitnessBreakdown {
            conflict: self.conflict_score(genes),
            required: self.required_score(genes),
            preference: self.preference_score(genes),
            avoidance: self.avoidance_score(genes),
            distribution: self.distribution_score(genes),
            consecutive: self.consecutive_score(&report.runs),
            early_scheduling: self.early_scheduling_score(genes),
            final_week: self.final_week_score(genes),
            day_usage: self.day_usage_score(report),
            daily_balance: self.daily_balance_score(report),
            overlap: self.overlap_score(report),
            feasible: report.is_feasible(),
        }
    }

    fn count_flag<'a>(
        &'a self,
        genes: &'a [Gene],
        flag: u8,
    ) -> impl Iterator<Item = &'a ClassProfile> + 'a {
        let profiles = &self.profiles;
        genes.iter().filter_map(move |gene| {
            profiles
                .get(&gene.class_id)
                .filter(|p| p.flags_at(gene) & flag != 0)
        })
    }

    pub fn conflict_score(&self, genes: &[Gene]) -> f64 {
        CONFLICT_PENALTY * self.count_flag(genes, CONFLICT).count() as f64
    }

    pub fn required_score(&self, genes: &[Gene]) -> f64 {
        self.weights.required_periods * self.count_flag(genes, REQUIRED).count() as f64
    }

    pub fn preference_score(&self, genes: &[Gene]) -> f64 {
        self.count_flag(genes, PREFERRED)
            .map(|p| p.preference_weight * self.weights.preferred_periods)
            .sum()
    }

    pub fn avoidance_score(&self, genes: &[Gene]) -> f64 {
        self.count_flag(genes, AVOID)
            .map(|p| p.avoidance_weight * self.weights.avoid_periods)
            .sum()
    }

    /// Rewards classes spread evenly across the weeks of the horizon.
    pub fn distribution_score(&self, genes: &[Gene]) -> f64 {
        let weeks = self.horizon.total_weeks() as usize;
        let mut counts: HashMap<ClassId, Vec<f64>> = self
            .class_ids
            .iter()
            .map(|&id| (id, vec![0.0; weeks]))
            .collect();
        for gene in genes {
            if let Some(per_week) = counts.get_mut(&gene.class_id) {
                if let Some(slot) = per_week.get_mut(gene.week as usize) {
                    *slot += 1.0;
                }
            }
        }
        counts
            .values()
            .map(|per_week| self.weights.distribution / (1.0 + variance(per_week)))
            .sum()
    }

    pub fn consecutive_score(&self, runs: &[Run]) -> f64 {
        let w = self.weights.consecutive_classes;
        let max = self.constraints.max_consecutive_classes;
        let soft = self.constraints.consecutive_classes_rule == ConsecutiveRule::Soft;
        runs.iter()
            .map(|run| {
                let l = run.length as f64;
                let mut score = w * (l - 1.0).powi(2);
                if soft && run.length > max {
                    score += w * (run.length - max) as f64;
                }
                score
            })
            .sum()
    }

    pub fn early_scheduling_score(&self, genes: &[Gene]) -> f64 {
        let total_days = self.horizon.total_days() as f64;
        if total_days == 0.0 {
            return 0.0;
        }
        genes
            .iter()
            .map(|g| {
                let position = (DAYS_PER_WEEK as f64) * g.week as f64 + g.day_of_week as f64 - 1.0;
                self.weights.earlier_dates * (1.0 - position / total_days)
            })
            .sum()
    }

    /// Rewards packing the last week into few days.
    pub fn final_week_score(&self, genes: &[Gene]) -> f64 {
        let mut days = 0u8;
        for gene in genes.iter().filter(|g| self.horizon.is_final_week(g.week)) {
            if (1..=DAYS_PER_WEEK).contains(&gene.day_of_week) {
                days |= 1 << (gene.day_of_week - 1);
            }
        }
        if days == 0 {
            return 0.0;
        }
        let unused = DAYS_PER_WEEK as f64 - days.count_ones() as f64;
        self.weights.final_week_compression * unused / DAYS_PER_WEEK as f64
    }

    pub fn day_usage_score(&self, report: &ConstraintReport) -> f64 {
        let total_days = self.horizon.total_days() as f64;
        if total_days == 0.0 {
            return 0.0;
        }
        self.weights.day_usage * report.day_loads.len() as f64 / total_days
    }

    /// Penalises uneven per-day loads within each week.
    pub fn daily_balance_score(&self, report: &ConstraintReport) -> f64 {
        let mut per_week: BTreeMap<u32, [f64; DAYS_PER_WEEK as usize]> = BTreeMap::new();
        for (&(week, day), load) in &report.day_loads {
            if (1..=DAYS_PER_WEEK).contains(&day) {
                per_week.entry(week).or_default()[day as usize - 1] += load.count as f64;
            }
        }
        let spread: f64 = per_week.values().map(|days| variance(days)).sum();
        self.weights.daily_balance * spread
    }

    pub fn overlap_score(&self, report: &ConstraintReport) -> f64 {
        OVERLAP_PENALTY * report.overlaps as f64
    }

    /// Re-runs constraint evaluation on raw genes.
    pub fn report(&self, genes: &[Gene]) -> ConstraintReport {
        constraints::evaluate(genes, &self.constraints)
    }
}

/// Population variance, `0` for fewer than one value.
fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}
