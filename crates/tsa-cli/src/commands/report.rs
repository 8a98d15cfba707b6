//! Report command: per-day weekly totals for a user.

use std::io::Write;

use anyhow::{Result, ensure};
use chrono::NaiveDate;
use tsa_core::Minutes;
use tsa_db::Database;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    user_id: i64,
    from: NaiveDate,
    to: NaiveDate,
    expected_day: Minutes,
) -> Result<()> {
    ensure!(from <= to, "--from {from} is after --to {to}");
    let report = db.weekly_totals(user_id, from, to, expected_day)?;
    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_must_be_ordered() {
        let temp = tempfile::tempdir().unwrap();
        let db = Database::open(&temp.path().join("tsa.db")).unwrap();
        let from = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut output = Vec::new();
        let err = run(&mut output, &db, 1, from, to, Minutes::new(480)).unwrap_err();
        assert!(err.to_string().contains("after"));
    }

    #[test]
    fn report_serializes_clock_strings() {
        let temp = tempfile::tempdir().unwrap();
        let db = Database::open(&temp.path().join("tsa.db")).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut output = Vec::new();
        run(&mut output, &db, 1, day, day, Minutes::new(480)).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(json["days"][0]["total"], "00:00");
        assert_eq!(json["days"][0]["expected"], "08:00");
        assert_eq!(json["days"][0]["availability"], "working");
    }
}
