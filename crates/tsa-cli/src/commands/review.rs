//! Review command: approve or reject pending entries.

use std::io::Write;

use anyhow::{Context, Result};
use tsa_core::{NotificationSink, ReviewDecision};
use tsa_db::Database;

use super::actor;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    user_id: i64,
    decision: &str,
    ids: &[String],
    sink: &dyn NotificationSink,
) -> Result<()> {
    let decision: ReviewDecision = decision.parse().context("invalid decision")?;
    let actor = actor(db, user_id)?;
    let outcomes = db.approve_or_reject(&actor, ids, decision, sink)?;
    serde_json::to_writer_pretty(&mut *writer, &outcomes)?;
    writeln!(writer)?;
    Ok(())
}
