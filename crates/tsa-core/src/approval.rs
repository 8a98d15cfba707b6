//! Approval state machine and hour splitting.
//!
//! States and transitions:
//!
//! ```text
//! standup/backdated --submit--> pending --review--> approved | rejected
//! approved --reject--> rejected   (with budget reversal)
//! ```
//!
//! Approvals are planned as pure data: the planner mutates a ledger copy and
//! describes the entry rewrite plus any split record; the storage layer
//! applies the plan inside one transaction.

use thiserror::Error;

use crate::clock::Minutes;
use crate::ledger::BudgetLedger;
use crate::types::{Activity, EntryStatus, ReviewDecision};

/// Annotation for the portion of an approval that fit the budget.
pub const NOTE_BILLABLE: &str = "Billable - within remaining hours";
/// Annotation for time approved beyond the remaining budget.
pub const NOTE_EXTRA: &str = "extra time beyond remaining hours";

/// An operation was attempted against an entry in the wrong state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("cannot approve an entry in status {status}, expected pending")]
    NotPending { status: EntryStatus },

    #[error("cannot reject an entry in status {status}")]
    NotRejectable { status: EntryStatus },

    #[error("only standup or backdated entries can be submitted for approval, found {status}")]
    NotSubmittable { status: EntryStatus },

    #[error("only rejected or standup entries can be deleted, found {status}")]
    NotDeletable { status: EntryStatus },
}

/// Checks that a reviewer decision is legal for the entry's current status.
///
/// Approval requires `Pending`. Rejection also accepts `Approved`, which
/// triggers a budget reversal downstream.
pub fn ensure_reviewable(status: EntryStatus, decision: ReviewDecision) -> Result<(), StateError> {
    match decision {
        ReviewDecision::Approve if status == EntryStatus::Pending => Ok(()),
        ReviewDecision::Approve => Err(StateError::NotPending { status }),
        ReviewDecision::Reject
            if matches!(status, EntryStatus::Pending | EntryStatus::Approved) =>
        {
            Ok(())
        }
        ReviewDecision::Reject => Err(StateError::NotRejectable { status }),
    }
}

/// Checks that an entry can move to `Pending`.
pub fn ensure_submittable(status: EntryStatus) -> Result<(), StateError> {
    match status {
        EntryStatus::Standup | EntryStatus::Backdated => Ok(()),
        _ => Err(StateError::NotSubmittable { status }),
    }
}

/// Whether the owner may delete an entry in this status.
#[must_use]
pub const fn can_delete(status: EntryStatus) -> bool {
    matches!(status, EntryStatus::Rejected | EntryStatus::Standup)
}

/// The split portion of an approval that exceeded the remaining budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitEntry {
    pub duration: Minutes,
    pub note: String,
}

/// Planned mutations for approving one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalPlan {
    /// Duration to write back to the entry (may be the billable portion).
    pub duration: Minutes,
    /// Classification to write back (tracking projects force `Billable`).
    pub activity: Activity,
    /// Annotation for the entry, if the billing rules produced one.
    pub note: Option<String>,
    /// Extra record to create when the approval only partly fit the budget.
    pub split: Option<SplitEntry>,
}

/// Plans the approval of one entry, mutating `ledger` with the consumption.
///
/// `budgeted` is true for fixed-type, non-tracking projects: only those draw
/// against remaining hours. Hourly and tracking projects bill everything
/// as-is and force the classification to billable.
#[must_use]
pub fn plan_approval(
    duration: Minutes,
    activity: Activity,
    budgeted: bool,
    ledger: &mut BudgetLedger,
) -> ApprovalPlan {
    if !budgeted {
        ledger.consume(duration);
        return ApprovalPlan {
            duration,
            activity: Activity::Billable,
            note: None,
            split: None,
        };
    }

    match activity {
        // Internal time never touches the budget.
        Activity::InHouse | Activity::NoWork => ApprovalPlan {
            duration,
            activity,
            note: None,
            split: None,
        },
        // Non-billable work consumes the working-hour total but leaves the
        // remaining budget intact. Classification is preserved.
        Activity::NonBillable => {
            ledger.consume(duration);
            ApprovalPlan {
                duration,
                activity,
                note: None,
                split: None,
            }
        }
        Activity::Billable => {
            let reservation = ledger.reserve(duration);
            if reservation.granted.is_zero() {
                // Budget already exhausted: keep the full submitted duration
                // on the existing record, just re-annotate it.
                ApprovalPlan {
                    duration,
                    activity,
                    note: Some(NOTE_EXTRA.to_string()),
                    split: None,
                }
            } else {
                let split = (!reservation.overflow.is_zero()).then(|| SplitEntry {
                    duration: reservation.overflow,
                    note: NOTE_EXTRA.to_string(),
                });
                ApprovalPlan {
                    duration: reservation.granted,
                    activity,
                    note: Some(NOTE_BILLABLE.to_string()),
                    split,
                }
            }
        }
    }
}

/// Planned mutations for rejecting one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectionPlan {
    /// Minutes to remove from the working-hour total.
    pub worked: Minutes,
    /// Minutes to return to the remaining budget.
    pub drawn: Minutes,
}

impl RejectionPlan {
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.worked.is_zero() && self.drawn.is_zero()
    }
}

/// Plans a rejection. The status change is unconditional; the ledger
/// reversal mirrors what the original approval took. Working minutes were
/// counted for everything except internal time, but the budget was only
/// drawn for billable records on budgeted projects, and the "extra time"
/// annotation marks billable records that drew nothing.
#[must_use]
pub fn plan_rejection(
    status: EntryStatus,
    duration: Minutes,
    activity: Activity,
    budgeted: bool,
    note: Option<&str>,
) -> RejectionPlan {
    if status != EntryStatus::Approved {
        return RejectionPlan {
            worked: Minutes::ZERO,
            drawn: Minutes::ZERO,
        };
    }
    let worked = match activity {
        Activity::InHouse | Activity::NoWork if budgeted => Minutes::ZERO,
        _ => duration,
    };
    let drawn = if budgeted && activity == Activity::Billable && note != Some(NOTE_EXTRA) {
        duration
    } else {
        Minutes::ZERO
    };
    RejectionPlan { worked, drawn }
}
