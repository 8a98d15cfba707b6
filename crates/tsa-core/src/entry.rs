//! Time entry records and submission payloads.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::clock::Minutes;
use crate::types::{Activity, EntryStatus, TrackingMode, ValidationError};

/// Tracker coverage attached to an entry.
///
/// `offline` time is derived, never stored: it is whatever part of the
/// duration the tracker did not capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracking {
    pub mode: TrackingMode,
    pub tracked: Minutes,
}

impl Tracking {
    /// Builds a tracking record, enforcing `tracked <= duration`.
    ///
    /// In `all` mode a missing tracked value defaults to the full duration.
    pub fn resolve(input: &TrackingInput, duration: Minutes) -> Result<Self, ValidationError> {
        let tracked = match (input.mode, input.tracked) {
            (TrackingMode::All, tracked) => tracked.unwrap_or(duration),
            (TrackingMode::Partial, Some(tracked)) => tracked,
            (TrackingMode::Partial, None) => return Err(ValidationError::MissingTracked),
        };
        if tracked > duration {
            return Err(ValidationError::TrackedExceedsDuration {
                tracked: tracked.to_string(),
                duration: duration.to_string(),
            });
        }
        Ok(Self {
            mode: input.mode,
            tracked,
        })
    }

    /// Untracked portion of the entry: `duration - tracked`, never negative.
    #[must_use]
    pub fn offline(&self, duration: Minutes) -> Minutes {
        duration.saturating_sub(self.tracked)
    }
}

/// Tracking fields as they appear in a submission payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingInput {
    pub mode: TrackingMode,
    #[serde(default)]
    pub tracked: Option<Minutes>,
}

/// One logged work record for a user on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: String,
    pub user_id: i64,
    pub project_id: i64,
    pub task_id: Option<i64>,
    pub date: NaiveDate,
    pub duration: Minutes,
    pub work_type: String,
    pub narration: String,
    pub activity: Activity,
    pub tracking: Option<Tracking>,
    pub status: EntryStatus,
    /// Annotation written by the approval or reconciliation step.
    pub message: Option<String>,
}

impl TimeEntry {
    /// Offline portion of a tracked entry, `None` when untracked.
    #[must_use]
    pub fn offline(&self) -> Option<Minutes> {
        self.tracking.map(|t| t.offline(self.duration))
    }
}

/// A submission payload for a single entry, as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub project_id: i64,
    #[serde(default)]
    pub task_id: Option<i64>,
    pub date: NaiveDate,
    pub duration: Minutes,
    pub work_type: String,
    pub narration: String,
    pub activity: Activity,
    #[serde(default)]
    pub tracking: Option<TrackingInput>,
}

impl NewEntry {
    /// Validates the payload's internal consistency and resolves tracking.
    pub fn resolve_tracking(&self) -> Result<Option<Tracking>, ValidationError> {
        if self.work_type.is_empty() {
            return Err(ValidationError::Empty { field: "work_type" });
        }
        self.tracking
            .as_ref()
            .map(|input| Tracking::resolve(input, self.duration))
            .transpose()
    }
}
