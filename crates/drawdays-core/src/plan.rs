//! Calendar-to-plan mapping.
//!
//! Every function here is pure: the reference `today` is always passed in,
//! never read from the clock, so a month grid can be reproduced exactly.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::datetime::{add_days, end_of_week, first_day_of_month, last_day_of_month, start_of_week};

/// Date range of the practice program: `duration_days` consecutive days
/// starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanWindow {
    start: NaiveDate,
    duration_days: u32,
}

impl PlanWindow {
    /// Panics when `duration_days` is zero.
    pub fn new(start: NaiveDate, duration_days: u32) -> Self {
        assert!(duration_days >= 1, "plan window needs at least one day");
        Self {
            start,
            duration_days,
        }
    }

    pub fn try_new(start: NaiveDate, duration_days: u32) -> anyhow::Result<Self> {
        if duration_days == 0 {
            anyhow::bail!("plan duration must be at least one day");
        }
        Ok(Self::new(start, duration_days))
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn duration_days(&self) -> u32 {
        self.duration_days
    }

    /// Zero-based plan day of `date`, or `None` outside the window.
    pub fn day_index(&self, date: NaiveDate) -> Option<u32> {
        let offset = (date - self.start).num_days();
        if (0..i64::from(self.duration_days)).contains(&offset) {
            u32::try_from(offset).ok()
        } else {
            None
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.day_index(date).is_some()
    }

    pub fn final_day(&self) -> NaiveDate {
        add_days(self.start, i64::from(self.duration_days) - 1)
    }

    pub fn date_for_day(&self, index: u32) -> Option<NaiveDate> {
        (index < self.duration_days).then(|| add_days(self.start, i64::from(index)))
    }
}

/// Which plan days already have recorded work, keyed by plan day index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactFlags {
    flags: Vec<bool>,
}

impl ArtifactFlags {
    pub fn new(duration_days: u32) -> Self {
        Self {
            flags: vec![false; duration_days as usize],
        }
    }

    /// Builds flags for `window` from the indices that have work.
    /// Indices past the end of the plan are dropped.
    pub fn from_days<I>(window: &PlanWindow, days: I) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        let mut flags = Self::new(window.duration_days());
        for day in days {
            flags.set(day);
        }
        flags
    }

    pub fn set(&mut self, day_index: u32) {
        if let Some(slot) = self.flags.get_mut(day_index as usize) {
            *slot = true;
        }
    }

    pub fn get(&self, day_index: u32) -> bool {
        self.flags.get(day_index as usize).copied().unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.flags.iter().filter(|flag| **flag).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// Leading or trailing day from a neighbouring month.
    Outside,
    Today,
    /// Unlocked and already has work.
    Done,
    /// Unlocked, no work yet.
    Open,
    Locked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub plan_day_index: Option<u32>,
    pub in_month: bool,
    pub is_today: bool,
    pub is_unlocked: bool,
    pub is_final_day: bool,
    pub has_artifact: bool,
}

impl DayCell {
    pub fn in_plan(&self) -> bool {
        self.plan_day_index.is_some()
    }

    pub fn state(&self) -> CellState {
        if !self.in_month {
            CellState::Outside
        } else if self.is_today {
            CellState::Today
        } else if self.is_unlocked && self.has_artifact {
            CellState::Done
        } else if self.is_unlocked {
            CellState::Open
        } else {
            CellState::Locked
        }
    }

    /// Label pair shown under the day number, e.g. `("Day 4", "view")`.
    /// In-month days outside the plan get an empty label and `off-plan`;
    /// days from neighbouring months get no caption.
    pub fn caption(&self) -> Option<(String, &'static str)> {
        if !self.in_month {
            return None;
        }
        let Some(index) = self.plan_day_index else {
            return Some((String::new(), "off-plan"));
        };
        let status = if self.is_unlocked { "view" } else { "locked" };
        Some((format!("Day {}", index + 1), status))
    }
}

/// Builds every cell of the month containing `month_anchor`, padded with
/// neighbouring days to whole weeks starting on `week_start`.
#[tracing::instrument(level = "debug", skip(window, artifacts))]
pub fn compute_month_grid(
    month_anchor: NaiveDate,
    window: &PlanWindow,
    today: NaiveDate,
    artifacts: &ArtifactFlags,
    week_start: Weekday,
) -> Vec<DayCell> {
    let month_first = first_day_of_month(month_anchor.year(), month_anchor.month());
    let month_last = last_day_of_month(month_anchor.year(), month_anchor.month());
    let grid_start = start_of_week(month_first, week_start);
    let grid_end = end_of_week(month_last, week_start);

    let mut cells = Vec::with_capacity(42);
    let mut date = grid_start;
    while date <= grid_end {
        cells.push(build_cell(date, month_first, window, today, artifacts));
        date = add_days(date, 1);
    }

    tracing::debug!(
        month = %month_first.format("%Y-%m"),
        cells = cells.len(),
        "computed month grid"
    );
    cells
}

fn build_cell(
    date: NaiveDate,
    month_first: NaiveDate,
    window: &PlanWindow,
    today: NaiveDate,
    artifacts: &ArtifactFlags,
) -> DayCell {
    let in_month = date.year() == month_first.year() && date.month() == month_first.month();
    let plan_day_index = window.day_index(date);
    let final_index = window.duration_days() - 1;

    DayCell {
        date,
        plan_day_index,
        in_month,
        is_today: date == today,
        is_unlocked: in_month && plan_day_index.is_some() && date <= today,
        is_final_day: plan_day_index == Some(final_index),
        has_artifact: plan_day_index.is_some_and(|idx| artifacts.get(idx)),
    }
}
