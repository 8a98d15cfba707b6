//! Log-backed notification sink.
//!
//! Actual delivery channels (mail, chat) live outside this binary; the
//! CLI surfaces each summary through `tracing` so operators can see who
//! would have been notified.

use tsa_core::{NotificationSink, Recipient, ReviewSummary, SinkError};

/// Writes review summaries to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, summary: &ReviewSummary, recipients: &[Recipient]) -> Result<(), SinkError> {
        for recipient in recipients {
            tracing::info!(
                to = recipient.user_id,
                name = %recipient.name,
                actor = summary.actor_id,
                action = ?summary.action,
                entries = summary.lines.len(),
                "review summary"
            );
        }
        Ok(())
    }
}
