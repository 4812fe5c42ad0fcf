//! Timetable chromosome.
//!
//! # Encoding
//!
//! A chromosome is an ordered list of [`Gene`]s, one per class occurrence:
//! for every class, `min_periods_per_week` genes per week of the horizon.
//! A gene's `class_id` and `week` are fixed at initialisation; mutation and
//! crossover move occurrences between days and periods.

use rand::seq::IndexedRandom;
use rand::Rng;

use super::constraints::{self, ConstraintReport};
use super::crossover::CrossoverMethod;
use super::types::Individual;
use crate::error::{Result, TimetableError};
use crate::models::{
    ClassId, Horizon, ScheduleAssignment, ScheduleConstraints, ScheduleRequest, ScheduleResponse,
    TimeSlot, DAYS_PER_WEEK, PERIODS_PER_DAY,
};
use crate::random::probability;

/// Identity of a gene for order-preserving operators: `(class_id, week)`.
pub type GeneKey = (ClassId, u32);

/// One `(class, day, period, week)` assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gene {
    pub class_id: ClassId,
    /// 1 = Monday … 5 = Friday.
    pub day_of_week: u8,
    /// 1 … 8.
    pub period: u8,
    /// 0-based week index within the horizon.
    pub week: u32,
}

impl Gene {
    pub fn new(class_id: ClassId, day_of_week: u8, period: u8, week: u32) -> Self {
        Self {
            class_id,
            day_of_week,
            period,
            week,
        }
    }

    pub fn slot(&self) -> TimeSlot {
        TimeSlot::new(self.day_of_week, self.period)
    }

    pub fn key(&self) -> GeneKey {
        (self.class_id, self.week)
    }

    /// Re-rolls day and period within the days available in this gene's week.
    fn reroll<R: Rng>(&mut self, horizon: &Horizon, rng: &mut R) {
        self.day_of_week = random_day(horizon, self.week, rng);
        self.period = rng.random_range(1..=PERIODS_PER_DAY);
    }
}

fn random_day<R: Rng>(horizon: &Horizon, week: u32, rng: &mut R) -> u8 {
    let days = horizon.available_days(week);
    days.choose(rng)
        .copied()
        .unwrap_or_else(|| rng.random_range(1..=DAYS_PER_WEEK))
}

/// Crossover provenance of an offspring, consumed once it has been evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lineage {
    pub method: CrossoverMethod,
    /// Fitness of the fitter parent.
    pub parent_fitness: f64,
}

/// A candidate schedule.
#[derive(Debug, Clone)]
pub struct Chromosome {
    pub genes: Vec<Gene>,
    /// Human-readable hard-constraint violations from the last check.
    pub violations: Vec<String>,
    pub lineage: Option<Lineage>,
    fitness: Option<f64>,
    horizon: Horizon,
}

impl Individual for Chromosome {
    fn fitness(&self) -> f64 {
        self.fitness.unwrap_or(f64::NEG_INFINITY)
    }

    fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }
}

impl Chromosome {
    /// Creates an empty chromosome over `horizon`.
    pub fn new(horizon: Horizon) -> Self {
        Self::from_genes(horizon, Vec::new())
    }

    /// Wraps an existing gene list.
    pub fn from_genes(horizon: Horizon, genes: Vec<Gene>) -> Self {
        Self {
            genes,
            violations: Vec::new(),
            lineage: None,
            fitness: None,
            horizon,
        }
    }

    /// Creates a randomly initialised chromosome for `request`.
    pub fn random<R: Rng>(request: &ScheduleRequest, horizon: Horizon, rng: &mut R) -> Self {
        let mut chromosome = Self::new(horizon);
        chromosome.initialize_random(request, rng);
        chromosome
    }

    /// Replaces the genes with one random placement per class occurrence.
    ///
    /// Placements respect only the day/period grid, not the constraints.
    pub fn initialize_random<R: Rng>(&mut self, request: &ScheduleRequest, rng: &mut R) {
        let per_week = request.constraints.min_periods_per_week;
        let weeks = self.horizon.total_weeks();
        self.genes.clear();
        self.genes.reserve(request.expected_gene_count(weeks));

        for class in &request.classes {
            for week in 0..weeks {
                for _ in 0..per_week {
                    let mut gene = Gene::new(class.id, 1, 1, week);
                    gene.reroll(&self.horizon, rng);
                    self.genes.push(gene);
                }
            }
        }
        self.invalidate();
    }

    /// Re-rolls day and period of each gene independently with probability `rate`.
    ///
    /// Returns the number of genes re-rolled. `class_id` and `week` never change.
    pub fn mutate<R: Rng>(&mut self, rate: f64, rng: &mut R) -> usize {
        let rate = probability(rate);
        let horizon = self.horizon;
        let mut mutated = 0;
        for gene in &mut self.genes {
            if rng.random_bool(rate) {
                gene.reroll(&horizon, rng);
                mutated += 1;
            }
        }
        if mutated > 0 {
            self.invalidate();
        }
        mutated
    }

    /// Recombines with `other`, returning two unevaluated children.
    ///
    /// # Panics
    /// Panics if the chromosomes have different lengths.
    pub fn crossover<R: Rng>(
        &self,
        other: &Chromosome,
        method: CrossoverMethod,
        rng: &mut R,
    ) -> (Chromosome, Chromosome) {
        let (g1, g2) = method.apply(&self.genes, &other.genes, rng);
        (
            Chromosome::from_genes(self.horizon, g1),
            Chromosome::from_genes(self.horizon, g2),
        )
    }

    /// Converts an externally produced schedule into a chromosome.
    ///
    /// Fails when an assignment falls on a weekend, outside the horizon, or
    /// on a period outside the daily grid.
    pub fn encode(response: &ScheduleResponse, horizon: Horizon) -> Result<Self> {
        let genes = response
            .assignments
            .iter()
            .map(|a| {
                let (week, day) = horizon.locate(a.date).ok_or_else(|| {
                    TimetableError::request(format!(
                        "assignment of class {} on {} is outside the schedule horizon",
                        a.class_id, a.date
                    ))
                })?;
                if !TimeSlot::new(day, a.period).is_in_range() {
                    return Err(TimetableError::request(format!(
                        "assignment of class {} on {} uses period {} outside the daily grid",
                        a.class_id, a.date, a.period
                    )));
                }
                Ok(Gene::new(a.class_id, day, a.period, week))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_genes(horizon, genes))
    }

    /// Emits one dated assignment per gene, ordered by date then period.
    pub fn decode(&self) -> Vec<ScheduleAssignment> {
        let mut assignments: Vec<ScheduleAssignment> = self
            .genes
            .iter()
            .map(|g| ScheduleAssignment {
                class_id: g.class_id,
                date: self.horizon.date_of(g.week, g.day_of_week),
                day_of_week: g.day_of_week,
                period: g.period,
            })
            .collect();
        assignments.sort_by_key(|a| (a.date, a.period, a.class_id));
        assignments
    }

    /// Whether every hard constraint holds.
    pub fn validate(&self, constraints: &ScheduleConstraints) -> bool {
        self.constraint_report(constraints).is_feasible()
    }

    /// Validates and records violation descriptions on the chromosome.
    pub fn check_constraints(&mut self, constraints: &ScheduleConstraints) -> bool {
        let report = self.constraint_report(constraints);
        self.violations = report.violations.iter().map(ToString::to_string).collect();
        report.is_feasible()
    }

    pub fn constraint_report(&self, constraints: &ScheduleConstraints) -> ConstraintReport {
        constraints::evaluate(&self.genes, constraints)
    }

    /// Fraction of positions whose gene differs from `other`, in `[0, 1]`.
    pub fn distance(&self, other: &Chromosome) -> f64 {
        let longest = self.genes.len().max(other.genes.len());
        if longest == 0 {
            return 0.0;
        }
        let same = self
            .genes
            .iter()
            .zip(&other.genes)
            .filter(|(a, b)| a == b)
            .count();
        (longest - same) as f64 / longest as f64
    }

    pub fn horizon(&self) -> &Horizon {
        &self.horizon
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    /// Forgets the fitness after the genes changed.
    pub fn invalidate(&mut self) {
        self.fitness = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassRequest, ScheduleMetadata, Termination};
    use crate::random::create_rng;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn request(classes: u32, per_week: usize, end: NaiveDate) -> ScheduleRequest {
        let mut req = ScheduleRequest::new(date(2024, 1, 1), end).with_constraints(
            ScheduleConstraints::default()
                .with_min_periods_per_week(per_week)
                .with_max_classes_per_day(2),
        );
        for id in 0..classes {
            req = req.with_class(ClassRequest::new(id, format!("class-{id}")));
        }
        req
    }

    fn chromosome_of(genes: Vec<Gene>) -> Chromosome {
        let horizon = Horizon::new(date(2024, 1, 1), date(2024, 1, 12)).unwrap();
        Chromosome::from_genes(horizon, genes)
    }

    #[test]
    fn test_initialize_random_gene_count_and_ranges() {
        let req = request(3, 2, date(2024, 1, 26));
        let horizon = req.horizon().unwrap();
        let mut rng = create_rng(42);
        let c = Chromosome::random(&req, horizon, &mut rng);

        assert_eq!(c.len(), req.expected_gene_count(horizon.total_weeks()));
        assert_eq!(c.len(), 3 * 2 * 4);
        for g in &c.genes {
            assert!((1..=5).contains(&g.day_of_week));
            assert!((1..=8).contains(&g.period));
            assert!(g.week < 4);
        }
        assert!(!c.is_evaluated());
    }

    #[test]
    fn test_initialize_random_respects_partial_weeks() {
        // Wednesday to the following Tuesday.
        let mut req = request(2, 3, date(2024, 1, 9));
        req.start_date = date(2024, 1, 3);
        let horizon = req.horizon().unwrap();
        let mut rng = create_rng(9);
        let c = Chromosome::random(&req, horizon, &mut rng);
        for g in &c.genes {
            assert!(horizon.contains(horizon.date_of(g.week, g.day_of_week)));
        }
    }

    #[test]
    fn test_mutate_changes_subset_keeps_identity() {
        let req = request(4, 2, date(2024, 1, 26));
        let horizon = req.horizon().unwrap();
        let mut rng = create_rng(42);
        let original = Chromosome::random(&req, horizon, &mut rng);
        let mut mutated = original.clone();

        mutated.mutate(0.5, &mut rng);

        let changed = original
            .genes
            .iter()
            .zip(&mutated.genes)
            .filter(|(a, b)| a.day_of_week != b.day_of_week || a.period != b.period)
            .count();
        assert!(changed > 0 && changed < original.len(), "changed {changed}");
        for (a, b) in original.genes.iter().zip(&mutated.genes) {
            assert_eq!(a.class_id, b.class_id);
            assert_eq!(a.week, b.week);
        }
    }

    #[test]
    fn test_mutate_zero_rate_keeps_fitness() {
        let req = request(2, 1, date(2024, 1, 5));
        let horizon = req.horizon().unwrap();
        let mut rng = create_rng(1);
        let mut c = Chromosome::random(&req, horizon, &mut rng);
        c.set_fitness(4.0);
        assert_eq!(c.mutate(0.0, &mut rng), 0);
        assert!(c.is_evaluated());
    }

    #[test]
    fn test_mutate_non_finite_rate_is_noop() {
        let req = request(2, 1, date(2024, 1, 5));
        let horizon = req.horizon().unwrap();
        let mut rng = create_rng(3);
        let mut c = Chromosome::random(&req, horizon, &mut rng);
        let before = c.genes.clone();
        assert_eq!(c.mutate(f64::NAN, &mut rng), 0);
        assert_eq!(c.mutate(f64::INFINITY, &mut rng), 0);
        assert_eq!(c.genes, before);
    }

    #[test]
    fn test_validate_daily_cap() {
        let constraints = ScheduleConstraints::default().with_max_classes_per_day(2);
        let crowded = chromosome_of(vec![
            Gene::new(1, 1, 1, 0),
            Gene::new(2, 1, 4, 0),
            Gene::new(3, 1, 7, 0),
        ]);
        assert!(!crowded.validate(&constraints));

        let balanced = chromosome_of(vec![Gene::new(1, 1, 2, 0), Gene::new(2, 3, 5, 0)]);
        assert!(balanced.validate(&constraints));
    }

    #[test]
    fn test_check_constraints_records_violations() {
        let constraints = ScheduleConstraints::default().with_max_classes_per_day(2);
        let mut crowded = chromosome_of(vec![
            Gene::new(1, 2, 1, 0),
            Gene::new(2, 2, 4, 0),
            Gene::new(3, 2, 7, 0),
        ]);
        assert!(!crowded.check_constraints(&constraints));
        assert_eq!(crowded.violations.len(), 1);
        assert!(crowded.violations[0].contains("3 classes"));
    }

    #[test]
    fn test_encode_decode_inverse() {
        let horizon = Horizon::new(date(2024, 1, 1), date(2024, 1, 12)).unwrap();
        let c = Chromosome::from_genes(
            horizon,
            vec![Gene::new(1, 1, 3, 0), Gene::new(2, 5, 8, 1), Gene::new(1, 3, 1, 1)],
        );
        let assignments = c.decode();
        assert_eq!(assignments[0].date, date(2024, 1, 1));
        assert_eq!(assignments[1].date, date(2024, 1, 10));
        assert_eq!(assignments[2].date, date(2024, 1, 12));

        let response = ScheduleResponse {
            assignments,
            metadata: ScheduleMetadata {
                score: 0.0,
                duration_ms: 0,
                solutions_found: 0,
                generations: 0,
                gap: None,
                termination: Termination::MaxGenerations,
                generation_stats: None,
            },
        };
        let encoded = Chromosome::encode(&response, horizon).unwrap();
        let mut expected = c.genes.clone();
        expected.sort_by_key(|g| (g.week, g.day_of_week, g.period));
        assert_eq!(encoded.genes, expected);
    }

    #[test]
    fn test_encode_rejects_weekend() {
        let horizon = Horizon::new(date(2024, 1, 1), date(2024, 1, 12)).unwrap();
        let response = single_assignment(date(2024, 1, 6), 6, 1);
        assert!(Chromosome::encode(&response, horizon).is_err());
    }

    #[test]
    fn test_encode_rejects_period_outside_grid() {
        let horizon = Horizon::new(date(2024, 1, 1), date(2024, 1, 12)).unwrap();
        for period in [0, 9] {
            let response = single_assignment(date(2024, 1, 2), 2, period);
            assert!(matches!(
                Chromosome::encode(&response, horizon),
                Err(TimetableError::InvalidRequest(_))
            ));
        }
        let response = single_assignment(date(2024, 1, 2), 2, 8);
        let encoded = Chromosome::encode(&response, horizon).unwrap();
        assert_eq!(encoded.genes, vec![Gene::new(1, 2, 8, 0)]);
    }

    fn single_assignment(date: NaiveDate, day_of_week: u8, period: u8) -> ScheduleResponse {
        ScheduleResponse {
            assignments: vec![ScheduleAssignment {
                class_id: 1,
                date,
                day_of_week,
                period,
            }],
            metadata: ScheduleMetadata {
                score: 0.0,
                duration_ms: 0,
                solutions_found: 0,
                generations: 0,
                gap: None,
                termination: Termination::MaxGenerations,
                generation_stats: None,
            },
        }
    }

    #[test]
    fn test_distance() {
        let a = chromosome_of(vec![Gene::new(1, 1, 1, 0), Gene::new(2, 2, 2, 0)]);
        let b = chromosome_of(vec![Gene::new(1, 1, 1, 0), Gene::new(2, 3, 2, 0)]);
        assert_eq!(a.distance(&a), 0.0);
        assert!((a.distance(&b) - 0.5).abs() < 1e-12);
        assert_eq!(Chromosome::new(*a.horizon()).distance(&Chromosome::new(*a.horizon())), 0.0);
    }

    #[test]
    fn test_crossover_children_unevaluated() {
        let req = request(3, 1, date(2024, 1, 12));
        let horizon = req.horizon().unwrap();
        let mut rng = create_rng(2);
        let mut p1 = Chromosome::random(&req, horizon, &mut rng);
        let mut p2 = Chromosome::random(&req, horizon, &mut rng);
        p1.set_fitness(1.0);
        p2.set_fitness(2.0);
        for method in CrossoverMethod::ALL {
            let (c1, c2) = p1.crossover(&p2, method, &mut rng);
            assert_eq!(c1.len(), p1.len());
            assert_eq!(c2.len(), p2.len());
            assert!(!c1.is_evaluated() && !c2.is_evaluated());
        }
    }

    proptest! {
        #[test]
        fn prop_random_genes_in_grid(
            seed in any::<u64>(),
            classes in 1u32..6,
            per_week in 1usize..4,
        ) {
            let req = request(classes, per_week, date(2024, 2, 2));
            let horizon = req.horizon().unwrap();
            let mut rng = create_rng(seed);
            let mut c = Chromosome::random(&req, horizon, &mut rng);
            c.mutate(0.7, &mut rng);
            for g in &c.genes {
                prop_assert!((1..=5).contains(&g.day_of_week));
                prop_assert!((1..=8).contains(&g.period));
            }
        }

        #[test]
        fn prop_mutation_preserves_identities(seed in any::<u64>(), rate in 0.0f64..=1.0) {
            let req = request(3, 2, date(2024, 1, 19));
            let horizon = req.horizon().unwrap();
            let mut rng = create_rng(seed);
            let original = Chromosome::random(&req, horizon, &mut rng);
            let mut mutated = original.clone();
            mutated.mutate(rate, &mut rng);
            let keys = |c: &Chromosome| c.genes.iter().map(Gene::key).collect::<Vec<_>>();
            prop_assert_eq!(keys(&original), keys(&mutated));
        }
    }
}
