//! Dated week grid of a schedule.
//!
//! Week 0 starts on the Monday of the week containing `start_date`, so week
//! indices and weekday offsets are stable regardless of which weekday the
//! request starts on. For a Monday start, `week = (date - start_date).days / 7`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use chrono::{Datelike, Duration, NaiveDate};

use super::request::DAYS_PER_WEEK;
use crate::error::{Result, TimetableError};

/// The dated range of weeks a schedule spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Horizon {
    start_date: NaiveDate,
    end_date: NaiveDate,
    anchor: NaiveDate,
    total_weeks: u32,
}

impl Horizon {
    /// Creates the horizon for `start_date..=end_date`.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self> {
        if end_date < start_date {
            return Err(TimetableError::request(format!(
                "end date {end_date} precedes start date {start_date}"
            )));
        }
        let offset = start_date.weekday().num_days_from_monday();
        let anchor = start_date - Duration::days(i64::from(offset));
        let span = (end_date - anchor).num_days();
        let total_weeks = u32::try_from(span / 7 + 1)
            .map_err(|_| TimetableError::request("date range too long"))?;
        Ok(Self {
            start_date,
            end_date,
            anchor,
            total_weeks,
        })
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// Monday of week 0.
    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub fn total_weeks(&self) -> u32 {
        self.total_weeks
    }

    /// Total teaching days in the grid (`5 × total_weeks`).
    pub fn total_days(&self) -> usize {
        self.total_weeks as usize * DAYS_PER_WEEK as usize
    }

    /// Date of `day_of_week` (1-based) in `week`.
    pub fn date_of(&self, week: u32, day_of_week: u8) -> NaiveDate {
        let offset = 7 * i64::from(week) + i64::from(day_of_week) - 1;
        self.anchor + Duration::days(offset)
    }

    /// Maps a date back to `(week, day_of_week)`.
    ///
    /// Returns `None` for weekends and dates outside the week grid.
    pub fn locate(&self, date: NaiveDate) -> Option<(u32, u8)> {
        let offset = (date - self.anchor).num_days();
        if offset < 0 {
            return None;
        }
        let week = u32::try_from(offset / 7).ok()?;
        let weekday = (offset % 7) as u8;
        if weekday >= DAYS_PER_WEEK || week >= self.total_weeks {
            return None;
        }
        Some((week, weekday + 1))
    }

    /// Whether `date` lies within `start_date..=end_date`.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Teaching days of `week` whose date lies inside the request range.
    ///
    /// Falls back to the full week when none does (a weekend-only week).
    pub fn available_days(&self, week: u32) -> Vec<u8> {
        let days: Vec<u8> = (1..=DAYS_PER_WEEK)
            .filter(|&d| self.contains(self.date_of(week, d)))
            .collect();
        if days.is_empty() {
            (1..=DAYS_PER_WEEK).collect()
        } else {
            days
        }
    }

    pub fn is_final_week(&self, week: u32) -> bool {
        week + 1 == self.total_weeks
    }
}
