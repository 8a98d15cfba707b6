//! Reconcile command: convert non-billable hours after project completion.

use std::io::Write;

use anyhow::Result;
use tsa_db::Database;

use super::actor;

pub fn run<W: Write>(writer: &mut W, db: &mut Database, user_id: i64, project_id: i64) -> Result<()> {
    let actor = actor(db, user_id)?;
    let report = db.reconcile(&actor, project_id)?;
    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)?;
    Ok(())
}
