//! Weekly aggregation: per-day rollups with a leave overlay.
//!
//! Pure read-side logic. Durations are summed in minutes and formatted as
//! `HH:MM` only at the serialization edge; pre-formatted strings are never
//! added together.

use chrono::NaiveDate;
use serde::Serialize;

use crate::clock::Minutes;
use crate::types::{Activity, LeaveKind, LeaveStatus};

/// Fixed deduction for a short leave, in minutes.
const SHORT_LEAVE_MINUTES: Minutes = Minutes::new(120);

/// A worked entry as seen by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkedEntry {
    pub date: NaiveDate,
    pub duration: Minutes,
    pub activity: Activity,
}

/// An approved or pending leave interval for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub kind: LeaveKind,
    pub status: LeaveStatus,
}

impl LeaveSpan {
    fn covers(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Expected-minutes deduction this leave applies to a covered day.
    fn deduction(&self, expected_day: Minutes) -> Minutes {
        match self.kind {
            LeaveKind::FullDay | LeaveKind::MultiDay => expected_day,
            LeaveKind::HalfDay => expected_day.halved(),
            LeaveKind::Short => SHORT_LEAVE_MINUTES,
        }
    }
}

/// Day availability after the leave overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Working,
    OnLeave,
}

/// Rolled-up totals for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayTotals {
    pub date: NaiveDate,
    pub total: Minutes,
    pub billable: Minutes,
    pub non_billable: Minutes,
    pub in_house: Minutes,
    pub availability: Availability,
    /// Expected working minutes after leave deductions.
    pub expected: Minutes,
}

/// Per-day totals over a date range, plus range-wide sums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days: Vec<DayTotals>,
    pub total: Minutes,
    pub billable: Minutes,
    pub non_billable: Minutes,
    pub in_house: Minutes,
}

/// Aggregates entries into per-day buckets over `from..=to`.
///
/// Multiple entries per day sum in minutes. The leave overlay applies per
/// day regardless of whether any entry exists that day: a covered day is
/// marked on-leave and its expected minutes are reduced by the leave kind's
/// deduction (the largest one, when several leaves cover the same day).
#[must_use]
pub fn weekly_totals(
    from: NaiveDate,
    to: NaiveDate,
    entries: &[WorkedEntry],
    leaves: &[LeaveSpan],
    expected_day: Minutes,
) -> WeeklyReport {
    let mut days = Vec::new();

    let mut day = from;
    while day <= to {
        let mut totals = DayTotals {
            date: day,
            total: Minutes::ZERO,
            billable: Minutes::ZERO,
            non_billable: Minutes::ZERO,
            in_house: Minutes::ZERO,
            availability: Availability::Working,
            expected: expected_day,
        };

        for entry in entries.iter().filter(|e| e.date == day) {
            totals.total += entry.duration;
            match entry.activity {
                Activity::Billable => totals.billable += entry.duration,
                Activity::NonBillable => totals.non_billable += entry.duration,
                Activity::InHouse => totals.in_house += entry.duration,
                Activity::NoWork => {}
            }
        }

        let deduction = leaves
            .iter()
            .filter(|l| l.covers(day))
            .map(|l| l.deduction(expected_day))
            .max();
        if let Some(deduction) = deduction {
            totals.availability = Availability::OnLeave;
            totals.expected = totals.expected.saturating_sub(deduction);
        }

        days.push(totals);
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    WeeklyReport {
        from,
        to,
        total: days.iter().map(|d| d.total).sum(),
        billable: days.iter().map(|d| d.billable).sum(),
        non_billable: days.iter().map(|d| d.non_billable).sum(),
        in_house: days.iter().map(|d| d.in_house).sum(),
        days,
    }
}
