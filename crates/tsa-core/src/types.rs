//! Core type definitions with validation.
//!
//! Every string classification coming in over the wire is normalized into a
//! closed enum here. Business logic downstream never compares strings.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types and submission payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A `HH:MM` clock value could not be parsed.
    #[error("invalid clock value {input:?}, expected HH:MM")]
    BadClock { input: String },

    /// Unknown activity classification.
    #[error("unknown activity classification: {value}")]
    UnknownActivity { value: String },

    /// Unknown entry status.
    #[error("unknown entry status: {value}")]
    UnknownStatus { value: String },

    /// Unknown tracking mode.
    #[error("unknown tracking mode: {value}")]
    UnknownTrackingMode { value: String },

    /// Unknown leave kind.
    #[error("unknown leave kind: {value}")]
    UnknownLeaveKind { value: String },

    /// Unknown leave status.
    #[error("unknown leave status: {value}")]
    UnknownLeaveStatus { value: String },

    /// Unknown role name.
    #[error("unknown role: {value}")]
    UnknownRole { value: String },

    /// Unknown review decision.
    #[error("unknown review decision: {value}, expected approve or reject")]
    UnknownDecision { value: String },

    /// Unknown billing type.
    #[error("unknown billing type: {value}")]
    UnknownBillingType { value: String },

    /// Partial tracking requires a tracked duration.
    #[error("tracking mode is partial but no tracked duration was given")]
    MissingTracked,

    /// Tracked time may not exceed the submitted duration.
    #[error("tracked duration {tracked} exceeds submitted duration {duration}")]
    TrackedExceedsDuration { tracked: String, duration: String },
}

/// Lowercases a classification and strips separators so that spellings like
/// `"Non Billable"`, `"non-billable"` and `"NonBillable"` all compare equal.
fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .to_lowercase()
}

/// Activity classification of a time entry.
///
/// Controls how an approved entry interacts with the project budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    /// Draws against the project's remaining hours.
    Billable,
    /// Consumes working-hour totals but never remaining hours.
    NonBillable,
    /// Internal work with no budget interaction.
    InHouse,
    /// A placeholder entry for a day without project work.
    NoWork,
}

impl Activity {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Billable => "billable",
            Self::NonBillable => "non_billable",
            Self::InHouse => "in_house",
            Self::NoWork => "no_work",
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Activity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "billable" => Ok(Self::Billable),
            "nonbillable" => Ok(Self::NonBillable),
            "inhouse" => Ok(Self::InHouse),
            "nowork" => Ok(Self::NoWork),
            _ => Err(ValidationError::UnknownActivity {
                value: s.to_string(),
            }),
        }
    }
}

/// Lifecycle status of a time entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Logged for the current day, not yet sent for review.
    Standup,
    /// Logged for a past day through an approved fill request.
    Backdated,
    /// Awaiting a reviewer decision.
    Pending,
    Approved,
    Rejected,
}

impl EntryStatus {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standup => "standup",
            Self::Backdated => "backdated",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntryStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "standup" => Ok(Self::Standup),
            "backdated" => Ok(Self::Backdated),
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ValidationError::UnknownStatus {
                value: s.to_string(),
            }),
        }
    }
}

/// How much of an entry was captured by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// The whole duration was tracked.
    All,
    /// Only part of the duration was tracked; the rest is offline time.
    Partial,
}

impl TrackingMode {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Partial => "partial",
        }
    }
}

impl std::str::FromStr for TrackingMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "all" => Ok(Self::All),
            "partial" => Ok(Self::Partial),
            _ => Err(ValidationError::UnknownTrackingMode {
                value: s.to_string(),
            }),
        }
    }
}

/// Reviewer action on a batch of pending entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl std::str::FromStr for ReviewDecision {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "approve" | "approved" => Ok(Self::Approve),
            "reject" | "rejected" => Ok(Self::Reject),
            _ => Err(ValidationError::UnknownDecision {
                value: s.to_string(),
            }),
        }
    }
}

/// Kind of leave covering a day, used by the weekly overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveKind {
    FullDay,
    MultiDay,
    HalfDay,
    Short,
}

impl LeaveKind {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FullDay => "full_day",
            Self::MultiDay => "multi_day",
            Self::HalfDay => "half_day",
            Self::Short => "short",
        }
    }
}

impl std::str::FromStr for LeaveKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "fullday" | "full" => Ok(Self::FullDay),
            "multiday" | "multipleday" | "multipledays" => Ok(Self::MultiDay),
            "halfday" | "half" => Ok(Self::HalfDay),
            "short" | "shortleave" => Ok(Self::Short),
            _ => Err(ValidationError::UnknownLeaveKind {
                value: s.to_string(),
            }),
        }
    }
}

/// Status of a leave record. Rejected leaves never reach the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
}

impl LeaveStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
        }
    }
}

impl std::str::FromStr for LeaveStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            _ => Err(ValidationError::UnknownLeaveStatus {
                value: s.to_string(),
            }),
        }
    }
}

/// How a project bills its hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingType {
    /// A fixed contracted hour budget; approvals draw against it.
    Fixed,
    /// Billed by the hour; the budget ceiling does not apply.
    Hourly,
}

impl BillingType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Hourly => "hourly",
        }
    }
}

impl std::str::FromStr for BillingType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "fixed" => Ok(Self::Fixed),
            "hourly" => Ok(Self::Hourly),
            _ => Err(ValidationError::UnknownBillingType {
                value: s.to_string(),
            }),
        }
    }
}

/// Role carried by a user in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Lead,
    Manager,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Lead => "lead",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "employee" => Ok(Self::Employee),
            "lead" | "teamlead" => Ok(Self::Lead),
            "manager" | "projectmanager" => Ok(Self::Manager),
            "admin" => Ok(Self::Admin),
            _ => Err(ValidationError::UnknownRole {
                value: s.to_string(),
            }),
        }
    }
}

/// Caller identity threaded explicitly through every operation.
///
/// There is no ambient auth context; whoever invokes an operation says who
/// they are, and the operation checks the roles it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub roles: Vec<Role>,
}

impl Actor {
    /// Creates an actor with a single role.
    #[must_use]
    pub fn new(user_id: i64, role: Role) -> Self {
        Self {
            user_id,
            roles: vec![role],
        }
    }

    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Whether this actor may approve or reject pending entries.
    #[must_use]
    pub fn is_reviewer(&self) -> bool {
        self.roles
            .iter()
            .any(|r| matches!(r, Role::Lead | Role::Manager | Role::Admin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_normalizes_spellings() {
        for spelling in ["Non Billable", "non-billable", "NonBillable", "NON_BILLABLE"] {
            assert_eq!(
                spelling.parse::<Activity>().unwrap(),
                Activity::NonBillable,
                "failed for {spelling:?}"
            );
        }
        assert_eq!("In House".parse::<Activity>().unwrap(), Activity::InHouse);
        assert_eq!("billable".parse::<Activity>().unwrap(), Activity::Billable);
        assert!("consulting".parse::<Activity>().is_err());
    }

    #[test]
    fn activity_serde_uses_snake_case() {
        let json = serde_json::to_string(&Activity::NonBillable).unwrap();
        assert_eq!(json, "\"non_billable\"");
        let parsed: Activity = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Activity::NonBillable);
    }

    #[test]
    fn entry_status_roundtrip() {
        for status in [
            EntryStatus::Standup,
            EntryStatus::Backdated,
            EntryStatus::Pending,
            EntryStatus::Approved,
            EntryStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<EntryStatus>().unwrap(), status);
        }
        assert!("draft".parse::<EntryStatus>().is_err());
    }

    #[test]
    fn review_decision_accepts_past_tense() {
        assert_eq!(
            "Approved".parse::<ReviewDecision>().unwrap(),
            ReviewDecision::Approve
        );
        assert_eq!(
            "reject".parse::<ReviewDecision>().unwrap(),
            ReviewDecision::Reject
        );
        assert!("maybe".parse::<ReviewDecision>().is_err());
    }

    #[test]
    fn leave_kind_tolerates_source_spellings() {
        assert_eq!("Full".parse::<LeaveKind>().unwrap(), LeaveKind::FullDay);
        assert_eq!(
            "Multiple Day".parse::<LeaveKind>().unwrap(),
            LeaveKind::MultiDay
        );
        assert_eq!("Half Day".parse::<LeaveKind>().unwrap(), LeaveKind::HalfDay);
        assert_eq!("Short Leave".parse::<LeaveKind>().unwrap(), LeaveKind::Short);
    }

    #[test]
    fn reviewer_roles() {
        assert!(Actor::new(1, Role::Manager).is_reviewer());
        assert!(Actor::new(2, Role::Lead).is_reviewer());
        assert!(Actor::new(3, Role::Admin).is_reviewer());
        assert!(!Actor::new(4, Role::Employee).is_reviewer());
    }
}
