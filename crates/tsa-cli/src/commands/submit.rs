//! Submit command: persist a batch of entries read as JSON.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tsa_core::{NewEntry, NotificationSink};
use tsa_db::Database;

use super::actor;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    user_id: i64,
    file: Option<&Path>,
    today: NaiveDate,
    sink: &dyn NotificationSink,
) -> Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read entries from stdin")?;
            buffer
        }
    };
    let batch: Vec<NewEntry> =
        serde_json::from_str(&raw).context("failed to parse submission payload")?;

    let actor = actor(db, user_id)?;
    let created = db
        .submit_entries(&actor, today, &batch, sink)
        .context("submission rejected")?;

    serde_json::to_writer_pretty(&mut *writer, &created)?;
    writeln!(writer)?;
    Ok(())
}
