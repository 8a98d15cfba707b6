//! Notification contract.
//!
//! Delivery (mail, chat, whatever) is a collaborator behind this trait.
//! Sink failures must never abort the operation that produced the summary;
//! callers log and move on.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Minutes;
use crate::types::{EntryStatus, Role};

/// A notification could not be delivered.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct SinkError(pub String);

/// What happened to the batch being summarized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryAction {
    Submitted,
    Reviewed,
}

/// One entry line in a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryLine {
    pub entry_id: String,
    pub user_id: i64,
    pub project_id: i64,
    pub date: NaiveDate,
    pub duration: Minutes,
    pub status: EntryStatus,
}

/// Structured summary of submitted or reviewed sheets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub actor_id: i64,
    pub action: SummaryAction,
    pub lines: Vec<SummaryLine>,
}

/// Someone who should hear about the batch: approvers by role plus the
/// owning team's manager and lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: i64,
    pub name: String,
    pub role: Role,
}

/// Delivery seam for review/submission summaries.
pub trait NotificationSink {
    fn notify(&self, summary: &ReviewSummary, recipients: &[Recipient]) -> Result<(), SinkError>;
}

/// A sink that drops everything. Useful in tests and one-shot tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _summary: &ReviewSummary, _recipients: &[Recipient]) -> Result<(), SinkError> {
        Ok(())
    }
}
