//! Send command: move entries from standup/backdated to pending.

use std::io::Write;

use anyhow::Result;
use tsa_db::Database;

use super::actor;

pub fn run<W: Write>(writer: &mut W, db: &mut Database, user_id: i64, ids: &[String]) -> Result<()> {
    let actor = actor(db, user_id)?;
    let outcomes = db.submit_for_approval(&actor, ids)?;
    serde_json::to_writer_pretty(&mut *writer, &outcomes)?;
    writeln!(writer)?;
    Ok(())
}
