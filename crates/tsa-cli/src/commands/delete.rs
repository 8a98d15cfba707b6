//! Delete command: remove a rejected or standup entry.

use std::io::Write;

use anyhow::Result;
use tsa_db::Database;

use super::actor;

pub fn run<W: Write>(writer: &mut W, db: &mut Database, user_id: i64, id: &str) -> Result<()> {
    let actor = actor(db, user_id)?;
    db.delete_entry(&actor, id)?;
    writeln!(writer, "deleted {id}")?;
    Ok(())
}
