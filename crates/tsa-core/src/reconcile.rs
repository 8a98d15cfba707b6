//! Post-completion reconciliation planning.
//!
//! Once every task of a project is completed, previously approved
//! non-billable entries are converted into billable ones against whatever
//! budget is left. The scan is oldest-first by insertion order and stops the
//! moment the remaining budget hits zero; that ordering is a fairness
//! contract, not an implementation convenience.

use serde::Serialize;

use crate::clock::Minutes;

/// Annotation for a fully converted entry.
pub const NOTE_CONVERTED: &str = "converted to billable after project completion";
/// Annotation for the leftover record of a partial conversion.
pub const NOTE_LEFTOVER: &str = "remaining after partial conversion";

/// An approved non-billable entry eligible for conversion.
///
/// Callers must supply these in insertion order (ascending `seq`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilableEntry {
    pub id: String,
    pub seq: i64,
    pub duration: Minutes,
}

/// One conversion performed by the reconciliation scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Conversion {
    /// The whole entry fit the remaining budget.
    Full { id: String, duration: Minutes },
    /// The entry consumed the last of the budget; `leftover` minutes stay
    /// non-billable on a new record.
    Split {
        id: String,
        kept: Minutes,
        leftover: Minutes,
    },
}

/// The planned outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcilePlan {
    pub conversions: Vec<Conversion>,
    /// Minutes drawn from the remaining budget by this pass.
    pub converted: Minutes,
    pub remaining_after: Minutes,
}

/// Plans the conversion scan.
///
/// Entries are processed in the given order. A full conversion decrements
/// the budget by the entry's duration; the first entry that does not fit is
/// split so the budget is consumed exactly, and the scan stops. Re-running
/// with `remaining == 0` plans nothing, which makes the pass idempotent.
#[must_use]
pub fn plan_reconciliation(entries: &[ReconcilableEntry], remaining: Minutes) -> ReconcilePlan {
    let mut remaining = remaining;
    let mut converted = Minutes::ZERO;
    let mut conversions = Vec::new();

    for entry in entries {
        if remaining.is_zero() {
            break;
        }
        if entry.duration <= remaining {
            remaining = remaining.saturating_sub(entry.duration);
            converted += entry.duration;
            conversions.push(Conversion::Full {
                id: entry.id.clone(),
                duration: entry.duration,
            });
        } else {
            let kept = remaining;
            let leftover = entry.duration.saturating_sub(kept);
            converted += kept;
            remaining = Minutes::ZERO;
            conversions.push(Conversion::Split {
                id: entry.id.clone(),
                kept,
                leftover,
            });
            break;
        }
    }

    ReconcilePlan {
        conversions,
        converted,
        remaining_after: remaining,
    }
}
