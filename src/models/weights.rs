//! Fitness-term weights.
//!
//! Reward weights are non-negative, penalty weights non-positive. The
//! meta-optimizer addresses individual weights through [`WeightKey`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimetableError};

/// Weight of every fitness term.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct WeightConfig {
    pub required_periods: f64,
    pub preferred_periods: f64,
    pub avoid_periods: f64,
    pub distribution: f64,
    pub consecutive_classes: f64,
    pub earlier_dates: f64,
    pub final_week_compression: f64,
    pub day_usage: f64,
    pub daily_balance: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            required_periods: 10.0,
            preferred_periods: 5.0,
            avoid_periods: -5.0,
            distribution: 3.0,
            consecutive_classes: -4.0,
            earlier_dates: 1.0,
            final_week_compression: 1.0,
            day_usage: 2.0,
            daily_balance: -1.0,
        }
    }
}

impl WeightConfig {
    /// Reads one weight.
    pub fn get(&self, key: WeightKey) -> f64 {
        match key {
            WeightKey::RequiredPeriods => self.required_periods,
            WeightKey::PreferredPeriods => self.preferred_periods,
            WeightKey::AvoidPeriods => self.avoid_periods,
            WeightKey::Distribution => self.distribution,
            WeightKey::ConsecutiveClasses => self.consecutive_classes,
            WeightKey::EarlierDates => self.earlier_dates,
            WeightKey::FinalWeekCompression => self.final_week_compression,
            WeightKey::DayUsage => self.day_usage,
            WeightKey::DailyBalance => self.daily_balance,
        }
    }

    /// Overwrites one weight.
    pub fn set(&mut self, key: WeightKey, value: f64) {
        let slot = match key {
            WeightKey::RequiredPeriods => &mut self.required_periods,
            WeightKey::PreferredPeriods => &mut self.preferred_periods,
            WeightKey::AvoidPeriods => &mut self.avoid_periods,
            WeightKey::Distribution => &mut self.distribution,
            WeightKey::ConsecutiveClasses => &mut self.consecutive_classes,
            WeightKey::EarlierDates => &mut self.earlier_dates,
            WeightKey::FinalWeekCompression => &mut self.final_week_compression,
            WeightKey::DayUsage => &mut self.day_usage,
            WeightKey::DailyBalance => &mut self.daily_balance,
        };
        *slot = value;
    }

    /// Rejects non-finite weights.
    pub fn validate(&self) -> Result<()> {
        for key in WeightKey::ALL {
            if !self.get(key).is_finite() {
                return Err(TimetableError::config(format!(
                    "weight {} is not finite",
                    key.name()
                )));
            }
        }
        Ok(())
    }
}

/// Names every fitness weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WeightKey {
    RequiredPeriods,
    PreferredPeriods,
    AvoidPeriods,
    Distribution,
    ConsecutiveClasses,
    EarlierDates,
    FinalWeekCompression,
    DayUsage,
    DailyBalance,
}

impl WeightKey {
    pub const ALL: [WeightKey; 9] = [
        WeightKey::RequiredPeriods,
        WeightKey::PreferredPeriods,
        WeightKey::AvoidPeriods,
        WeightKey::Distribution,
        WeightKey::ConsecutiveClasses,
        WeightKey::EarlierDates,
        WeightKey::FinalWeekCompression,
        WeightKey::DayUsage,
        WeightKey::DailyBalance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WeightKey::RequiredPeriods => "required_periods",
            WeightKey::PreferredPeriods => "preferred_periods",
            WeightKey::AvoidPeriods => "avoid_periods",
            WeightKey::Distribution => "distribution",
            WeightKey::ConsecutiveClasses => "consecutive_classes",
            WeightKey::EarlierDates => "earlier_dates",
            WeightKey::FinalWeekCompression => "final_week_compression",
            WeightKey::DayUsage => "day_usage",
            WeightKey::DailyBalance => "daily_balance",
        }
    }

    /// Whether the weight scales a penalty (kept non-positive).
    pub fn is_penalty(self) -> bool {
        matches!(
            self,
            WeightKey::AvoidPeriods | WeightKey::ConsecutiveClasses | WeightKey::DailyBalance
        )
    }

    /// Search range `(low, high)` used when sampling or mutating this weight.
    pub fn bounds(self) -> (f64, f64) {
        match self {
            WeightKey::RequiredPeriods => (0.0, 30.0),
            WeightKey::PreferredPeriods => (0.0, 15.0),
            WeightKey::AvoidPeriods => (-15.0, 0.0),
            WeightKey::Distribution => (0.0, 10.0),
            WeightKey::ConsecutiveClasses => (-12.0, 0.0),
            WeightKey::EarlierDates => (0.0, 5.0),
            WeightKey::FinalWeekCompression => (0.0, 5.0),
            WeightKey::DayUsage => (0.0, 6.0),
            WeightKey::DailyBalance => (-5.0, 0.0),
        }
    }
}

impl std::fmt::Display for WeightKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
