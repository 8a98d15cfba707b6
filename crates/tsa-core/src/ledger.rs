//! Per-project consumable-hours accounting.
//!
//! The ledger keeps two counters next to the contracted total:
//!
//! - `used`: every approved working minute, billable or not
//! - `billable_used`: minutes actually drawn from the contracted budget
//!
//! `remaining` is always derived as `total - billable_used`, never stored
//! or counted independently, so it cannot drift and cannot go negative.
//! Non-billable work grows `used` without touching the budget draw.

use crate::clock::Minutes;

/// A fixed-type project's hour budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetLedger {
    total: Minutes,
    used: Minutes,
    billable_used: Minutes,
}

/// Outcome of reserving hours against the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// Portion that fit within the remaining budget.
    pub granted: Minutes,
    /// Portion beyond the remaining budget.
    pub overflow: Minutes,
}

impl BudgetLedger {
    #[must_use]
    pub const fn new(total: Minutes, used: Minutes, billable_used: Minutes) -> Self {
        Self {
            total,
            used,
            billable_used,
        }
    }

    #[must_use]
    pub const fn total(&self) -> Minutes {
        self.total
    }

    /// Cumulative approved working minutes, billable or not.
    #[must_use]
    pub const fn used(&self) -> Minutes {
        self.used
    }

    /// Minutes drawn from the contracted budget.
    #[must_use]
    pub const fn billable_used(&self) -> Minutes {
        self.billable_used
    }

    /// Unconsumed budget. Derived, never negative.
    #[must_use]
    pub fn remaining(&self) -> Minutes {
        self.total.saturating_sub(self.billable_used)
    }

    /// Reserves billable time: grants what fits in the remaining budget and
    /// reports the rest as overflow. The full requested amount counts toward
    /// `used` regardless of how much was granted.
    pub fn reserve(&mut self, duration: Minutes) -> Reservation {
        let granted = duration.min(self.remaining());
        let overflow = duration.saturating_sub(granted);
        self.billable_used += granted;
        self.used += duration;
        Reservation { granted, overflow }
    }

    /// Records non-billable working time: consumes the working-hour total
    /// without reducing the remaining budget.
    pub fn consume(&mut self, duration: Minutes) {
        self.used += duration;
    }

    /// Draws already-worked minutes against the budget without growing
    /// `used`. Used by reconciliation, which re-books time counted at
    /// approval.
    pub fn draw(&mut self, duration: Minutes) {
        self.billable_used += duration;
    }

    /// Reverses a prior approval: `worked` leaves the working-hour total
    /// and `drawn` returns to the remaining budget, both flooring at zero.
    /// The amounts differ for records whose approval drew less budget than
    /// it counted as worked.
    pub fn release(&mut self, worked: Minutes, drawn: Minutes) {
        self.used = self.used.saturating_sub(worked);
        self.billable_used = self.billable_used.saturating_sub(drawn);
    }
}
