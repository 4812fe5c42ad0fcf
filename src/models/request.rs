//! Schedule request: classes, their weekly rules, and global constraints.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use chrono::NaiveDate;

use super::horizon::Horizon;
use crate::error::{Result, TimetableError};

/// Identifier of a recurring class.
pub type ClassId = u32;

/// Teaching days per week (Monday through Friday).
pub const DAYS_PER_WEEK: u8 = 5;

/// Periods per teaching day.
pub const PERIODS_PER_DAY: u8 = 8;

/// A weekly `(day_of_week, period)` slot, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct TimeSlot {
    /// 1 = Monday … 5 = Friday.
    pub day_of_week: u8,
    /// 1 … [`PERIODS_PER_DAY`].
    pub period: u8,
}

impl TimeSlot {
    /// Creates a slot.
    pub fn new(day_of_week: u8, period: u8) -> Self {
        Self {
            day_of_week,
            period,
        }
    }

    /// Whether both coordinates lie within the weekly grid.
    pub fn is_in_range(&self) -> bool {
        (1..=DAYS_PER_WEEK).contains(&self.day_of_week)
            && (1..=PERIODS_PER_DAY).contains(&self.period)
    }
}

/// How strictly `max_consecutive_classes` is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ConsecutiveRule {
    /// Longer runs make a schedule invalid.
    Hard,
    /// Longer runs are only penalised.
    #[default]
    Soft,
}

/// Global limits applying to every week of the schedule.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ScheduleConstraints {
    /// Maximum classes on a single day.
    pub max_classes_per_day: usize,
    /// Maximum classes in a single week.
    pub max_classes_per_week: usize,
    /// Occurrences of every class per week.
    pub min_periods_per_week: usize,
    /// Longest allowed run of back-to-back periods on one day.
    pub max_consecutive_classes: usize,
    /// Whether runs longer than `max_consecutive_classes` are hard violations.
    pub consecutive_classes_rule: ConsecutiveRule,
    /// When false, any two adjacent periods on the same day are invalid.
    pub allow_consecutive_classes: bool,
}

impl Default for ScheduleConstraints {
    fn default() -> Self {
        Self {
            max_classes_per_day: 3,
            max_classes_per_week: 12,
            min_periods_per_week: 1,
            max_consecutive_classes: 2,
            consecutive_classes_rule: ConsecutiveRule::Soft,
            allow_consecutive_classes: true,
        }
    }
}

impl ScheduleConstraints {
    pub fn with_max_classes_per_day(mut self, n: usize) -> Self {
        self.max_classes_per_day = n;
        self
    }

    pub fn with_max_classes_per_week(mut self, n: usize) -> Self {
        self.max_classes_per_week = n;
        self
    }

    pub fn with_min_periods_per_week(mut self, n: usize) -> Self {
        self.min_periods_per_week = n;
        self
    }

    pub fn with_max_consecutive_classes(mut self, n: usize) -> Self {
        self.max_consecutive_classes = n;
        self
    }

    pub fn with_consecutive_rule(mut self, rule: ConsecutiveRule) -> Self {
        self.consecutive_classes_rule = rule;
        self
    }

    pub fn with_allow_consecutive(mut self, allow: bool) -> Self {
        self.allow_consecutive_classes = allow;
        self
    }

    /// Validates the limits.
    pub fn validate(&self) -> Result<()> {
        if self.max_classes_per_day == 0 {
            return Err(TimetableError::request("maxClassesPerDay must be at least 1"));
        }
        if self.max_classes_per_week == 0 {
            return Err(TimetableError::request("maxClassesPerWeek must be at least 1"));
        }
        if self.max_consecutive_classes == 0 {
            return Err(TimetableError::request(
                "maxConsecutiveClasses must be at least 1",
            ));
        }
        Ok(())
    }
}

/// A recurring class and its per-week slot rules.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ClassRequest {
    pub id: ClassId,
    pub name: String,
    /// Slots the class must never occupy.
    pub conflicts: Vec<TimeSlot>,
    pub preferred_periods: Vec<TimeSlot>,
    pub required_periods: Vec<TimeSlot>,
    pub avoid_periods: Vec<TimeSlot>,
    /// Multiplier on the preferred-period reward.
    pub preference_weight: f64,
    /// Multiplier on the avoided-period penalty.
    pub avoidance_weight: f64,
}

impl ClassRequest {
    /// Creates a class with no slot rules and unit weights.
    pub fn new(id: ClassId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            conflicts: Vec::new(),
            preferred_periods: Vec::new(),
            required_periods: Vec::new(),
            avoid_periods: Vec::new(),
            preference_weight: 1.0,
            avoidance_weight: 1.0,
        }
    }

    pub fn with_conflicts(mut self, slots: Vec<TimeSlot>) -> Self {
        self.conflicts = slots;
        self
    }

    pub fn with_preferred(mut self, slots: Vec<TimeSlot>) -> Self {
        self.preferred_periods = slots;
        self
    }

    pub fn with_required(mut self, slots: Vec<TimeSlot>) -> Self {
        self.required_periods = slots;
        self
    }

    pub fn with_avoided(mut self, slots: Vec<TimeSlot>) -> Self {
        self.avoid_periods = slots;
        self
    }

    pub fn with_preference_weight(mut self, weight: f64) -> Self {
        self.preference_weight = weight;
        self
    }

    pub fn with_avoidance_weight(mut self, weight: f64) -> Self {
        self.avoidance_weight = weight;
        self
    }

    fn all_slots(&self) -> impl Iterator<Item = &TimeSlot> {
        self.conflicts
            .iter()
            .chain(&self.preferred_periods)
            .chain(&self.required_periods)
            .chain(&self.avoid_periods)
    }
}

/// A complete timetabling request.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ScheduleRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub classes: Vec<ClassRequest>,
    pub constraints: ScheduleConstraints,
}

impl ScheduleRequest {
    /// Creates a request spanning `start_date..=end_date` with default constraints.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            classes: Vec::new(),
            constraints: ScheduleConstraints::default(),
        }
    }

    pub fn with_class(mut self, class: ClassRequest) -> Self {
        self.classes.push(class);
        self
    }

    pub fn with_constraints(mut self, constraints: ScheduleConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Builds the dated horizon of this request.
    pub fn horizon(&self) -> Result<Horizon> {
        Horizon::new(self.start_date, self.end_date)
    }

    /// Looks up a class by id.
    pub fn class(&self, id: ClassId) -> Option<&ClassRequest> {
        self.classes.iter().find(|c| c.id == id)
    }

    /// Number of genes in a fully initialised chromosome.
    pub fn expected_gene_count(&self, total_weeks: u32) -> usize {
        self.classes.len() * self.constraints.min_periods_per_week * total_weeks as usize
    }

    /// Validates dates, constraints, class ids and slot coordinates.
    pub fn validate(&self) -> Result<()> {
        self.horizon()?;
        self.constraints.validate()?;

        let mut seen = std::collections::HashSet::new();
        for class in &self.classes {
            if !seen.insert(class.id) {
                return Err(TimetableError::request(format!(
                    "duplicate class id {}",
                    class.id
                )));
            }
            if let Some(slot) = class.all_slots().find(|s| !s.is_in_range()) {
                return Err(TimetableError::request(format!(
                    "class {} references slot (day {}, period {}) outside the weekly grid",
                    class.id, slot.day_of_week, slot.period
                )));
            }
            if !class.preference_weight.is_finite() || !class.avoidance_weight.is_finite() {
                return Err(TimetableError::request(format!(
                    "class {} has a non-finite weight",
                    class.id
                )));
            }
        }
        Ok(())
    }
}
