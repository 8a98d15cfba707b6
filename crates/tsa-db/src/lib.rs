//! Storage layer for timesheet approvals.
//!
//! Provides persistence for projects, tasks, users, leaves and time entries
//! using `rusqlite`, plus the transactional operations of the approval
//! workflow: submission, review, reconciliation, weekly rollups.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but
//! not `Sync`. For multi-threaded access use a `Mutex<Database>` or separate
//! instances per thread.
//!
//! # Concurrency
//!
//! Every ledger read-modify-write (approval, rejection reversal,
//! reconciliation) happens inside a single SQLite transaction, which
//! serializes writers at the database level. Two concurrent approvals
//! against the same project cannot double-spend remaining hours.
//!
//! # Schema
//!
//! Dates are stored as TEXT in `YYYY-MM-DD` form; durations as INTEGER
//! minutes. Entry IDs are UUID strings; the `seq` column records insertion
//! order and drives the oldest-first reconciliation scan.

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use tsa_core::approval::{
    ensure_reviewable, ensure_submittable, can_delete, plan_approval, plan_rejection,
};
use tsa_core::reconcile::{
    Conversion, NOTE_CONVERTED, NOTE_LEFTOVER, ReconcilableEntry, plan_reconciliation,
};
use tsa_core::week::{LeaveSpan, WeeklyReport, WorkedEntry, weekly_totals};
use tsa_core::{
    Activity, Actor, BillingType, BudgetLedger, EntryStatus, LeaveKind, LeaveStatus, Minutes,
    NewEntry, NotificationSink, Recipient, ReviewDecision, ReviewSummary, Role, SummaryAction,
    SummaryLine, TimeEntry, Tracking, TrackingMode, ValidationError,
};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A submission payload failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A field-level validation failure outside the core types.
    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },

    /// The operation is not legal for the entry's current state or owner.
    #[error("entry {id}: {reason}")]
    StateConflict { id: String, reason: String },

    /// The acting user lacks the reviewer role.
    #[error("user {user_id} lacks reviewer role")]
    NotReviewer { user_id: i64 },

    /// A stored record could not be decoded. Logged before being surfaced.
    #[error("corrupt {entity} record {id}: {message}")]
    Corrupt {
        entity: &'static str,
        id: String,
        message: String,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A team with its reviewer seats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRecord {
    pub id: i64,
    pub name: String,
    pub lead_id: Option<i64>,
    pub manager_id: Option<i64>,
}

/// A directory user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub role: Role,
    pub team_id: Option<i64>,
    pub active: bool,
}

/// A project with its hour budget columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub id: i64,
    pub name: String,
    pub billing: BillingType,
    pub tracking: bool,
    pub team_id: Option<i64>,
    pub total_minutes: i64,
    pub used_minutes: i64,
    pub billable_used_minutes: i64,
}

impl ProjectRecord {
    /// Whether approvals against this project draw from a fixed budget.
    #[must_use]
    pub const fn budgeted(&self) -> bool {
        matches!(self.billing, BillingType::Fixed) && !self.tracking
    }

    /// Decodes the ledger columns, refusing negative values.
    ///
    /// A negative counter means the ledger was corrupted outside this code
    /// path; it is logged and surfaced, never silently clamped.
    fn ledger(&self) -> Result<BudgetLedger, DbError> {
        let decode = |value: i64, column: &'static str| {
            u32::try_from(value).map(Minutes::new).map_err(|_| {
                tracing::warn!(
                    project_id = self.id,
                    column,
                    value,
                    "negative ledger counter detected"
                );
                DbError::Corrupt {
                    entity: "project",
                    id: self.id.to_string(),
                    message: format!("{column} is negative ({value})"),
                }
            })
        };
        Ok(BudgetLedger::new(
            decode(self.total_minutes, "total_minutes")?,
            decode(self.used_minutes, "used_minutes")?,
            decode(self.billable_used_minutes, "billable_used_minutes")?,
        ))
    }
}

/// A project task; its status gates reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub status: String,
}

/// A leave interval for the weekly overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveRecord {
    pub id: i64,
    pub user_id: i64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub kind: LeaveKind,
    pub status: LeaveStatus,
}

/// A leave-to-fill request gating backdated submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillRequestRecord {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub approved: bool,
}

/// Per-id outcome of a review or submit-for-approval batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewOutcome {
    pub id: String,
    /// Resulting entry status, or `"error"` when the id failed.
    pub status: String,
    pub note: Option<String>,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub all_completed: bool,
    pub converted: Vec<Conversion>,
    /// Cumulative approved working minutes on the project after the pass.
    pub updated_total_working_hours: Minutes,
    pub remaining_after_conversion: Minutes,
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(entity: &'static str, id: &str, value: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|err| DbError::Corrupt {
        entity,
        id: id.to_string(),
        message: format!("bad date {value:?}: {err}"),
    })
}

/// Raw entry row, decoded into a [`TimeEntry`] in a second step so batch
/// operations can log and skip corrupt rows instead of failing outright.
#[derive(Debug)]
struct EntryRow {
    seq: i64,
    id: String,
    user_id: i64,
    project_id: i64,
    task_id: Option<i64>,
    entry_date: String,
    minutes: i64,
    work_type: String,
    narration: String,
    activity: String,
    status: String,
    message: Option<String>,
    tracking_mode: Option<String>,
    tracked_minutes: Option<i64>,
}

impl EntryRow {
    const COLUMNS: &'static str = "seq, id, user_id, project_id, task_id, entry_date, minutes, \
         work_type, narration, activity, status, message, tracking_mode, tracked_minutes";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            id: row.get(1)?,
            user_id: row.get(2)?,
            project_id: row.get(3)?,
            task_id: row.get(4)?,
            entry_date: row.get(5)?,
            minutes: row.get(6)?,
            work_type: row.get(7)?,
            narration: row.get(8)?,
            activity: row.get(9)?,
            status: row.get(10)?,
            message: row.get(11)?,
            tracking_mode: row.get(12)?,
            tracked_minutes: row.get(13)?,
        })
    }

    fn decode(self) -> Result<TimeEntry, DbError> {
        let corrupt = |message: String| DbError::Corrupt {
            entity: "entry",
            id: self.id.clone(),
            message,
        };
        let minutes = u32::try_from(self.minutes)
            .map(Minutes::new)
            .map_err(|_| corrupt(format!("negative duration ({})", self.minutes)))?;
        let activity: Activity = self
            .activity
            .parse()
            .map_err(|e: ValidationError| corrupt(e.to_string()))?;
        let status: EntryStatus = self
            .status
            .parse()
            .map_err(|e: ValidationError| corrupt(e.to_string()))?;
        let date = parse_date("entry", &self.id, &self.entry_date)?;
        // A missing tracked value is tolerated: all-mode rows fall back to
        // the full duration, partial rows to zero.
        let tracking = match &self.tracking_mode {
            None => None,
            Some(mode) => {
                let mode: TrackingMode = mode
                    .parse()
                    .map_err(|e: ValidationError| corrupt(e.to_string()))?;
                let tracked = match self.tracked_minutes {
                    Some(value) => u32::try_from(value)
                        .map(Minutes::new)
                        .map_err(|_| corrupt(format!("negative tracked minutes ({value})")))?,
                    None => match mode {
                        TrackingMode::All => minutes,
                        TrackingMode::Partial => Minutes::ZERO,
                    },
                };
                Some(Tracking { mode, tracked })
            }
        };
        Ok(TimeEntry {
            id: self.id,
            user_id: self.user_id,
            project_id: self.project_id,
            task_id: self.task_id,
            date,
            duration: minutes,
            work_type: self.work_type,
            narration: self.narration,
            activity,
            tracking,
            status,
            message: self.message,
        })
    }
}

fn load_entry(conn: &Connection, id: &str) -> Result<TimeEntry, DbError> {
    let sql = format!("SELECT {} FROM entries WHERE id = ?", EntryRow::COLUMNS);
    let row = conn
        .query_row(&sql, params![id], EntryRow::from_row)
        .optional()?
        .ok_or_else(|| DbError::NotFound {
            entity: "entry",
            id: id.to_string(),
        })?;
    row.decode()
}

fn load_project(conn: &Connection, id: i64) -> Result<ProjectRecord, DbError> {
    let record = conn
        .query_row(
            "SELECT id, name, billing_type, tracking, team_id, total_minutes, used_minutes, \
             billable_used_minutes FROM projects WHERE id = ?",
            params![id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                ))
            },
        )
        .optional()?
        .ok_or_else(|| DbError::NotFound {
            entity: "project",
            id: id.to_string(),
        })?;
    let billing: BillingType = record.2.parse().map_err(|e: ValidationError| {
        tracing::warn!(project_id = id, "unparseable billing type");
        DbError::Corrupt {
            entity: "project",
            id: id.to_string(),
            message: e.to_string(),
        }
    })?;
    Ok(ProjectRecord {
        id: record.0,
        name: record.1,
        billing,
        tracking: record.3,
        team_id: record.4,
        total_minutes: record.5,
        used_minutes: record.6,
        billable_used_minutes: record.7,
    })
}

fn save_ledger(conn: &Connection, project_id: i64, ledger: &BudgetLedger) -> Result<(), DbError> {
    conn.execute(
        "UPDATE projects SET used_minutes = ?, billable_used_minutes = ? WHERE id = ?",
        params![
            i64::from(ledger.used().get()),
            i64::from(ledger.billable_used().get()),
            project_id
        ],
    )?;
    Ok(())
}

fn insert_entry_row(conn: &Connection, entry: &TimeEntry) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO entries (id, user_id, project_id, task_id, entry_date, minutes, work_type, \
         narration, activity, status, message, tracking_mode, tracked_minutes) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            entry.id,
            entry.user_id,
            entry.project_id,
            entry.task_id,
            format_date(entry.date),
            i64::from(entry.duration.get()),
            entry.work_type,
            entry.narration,
            entry.activity.as_str(),
            entry.status.as_str(),
            entry.message,
            entry.tracking.map(|t| t.mode.as_str()),
            entry.tracking.map(|t| i64::from(t.tracked.get())),
        ],
    )?;
    Ok(())
}

/// Computes the status of a freshly submitted entry from its date.
///
/// Today's work starts in standup. Past dates are allowed only through an
/// approved fill request and start as backdated. Future dates are rejected.
fn submission_status(
    conn: &Connection,
    user_id: i64,
    date: NaiveDate,
    today: NaiveDate,
) -> Result<EntryStatus, DbError> {
    if date == today {
        return Ok(EntryStatus::Standup);
    }
    if date > today {
        return Err(DbError::Invalid {
            field: "date",
            message: format!("cannot log work for future date {date}"),
        });
    }
    let approved: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM fill_requests WHERE user_id = ? AND request_date = ? AND approved = 1",
            params![user_id, format_date(date)],
            |row| row.get(0),
        )
        .optional()?;
    if approved.is_some() {
        Ok(EntryStatus::Backdated)
    } else {
        Err(DbError::Invalid {
            field: "date",
            message: format!("no approved fill request for {date}"),
        })
    }
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                lead_id INTEGER,
                manager_id INTEGER
            );

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                role TEXT NOT NULL,
                team_id INTEGER REFERENCES teams(id),
                active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                billing_type TEXT NOT NULL,
                tracking INTEGER NOT NULL DEFAULT 0,
                team_id INTEGER REFERENCES teams(id),
                total_minutes INTEGER NOT NULL DEFAULT 0,
                used_minutes INTEGER NOT NULL DEFAULT 0,
                billable_used_minutes INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS project_members (
                project_id INTEGER NOT NULL REFERENCES projects(id),
                user_id INTEGER NOT NULL REFERENCES users(id),
                PRIMARY KEY (project_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY,
                project_id INTEGER NOT NULL REFERENCES projects(id),
                title TEXT NOT NULL,
                status TEXT NOT NULL
            );

            -- Entries table: one row per logged work record.
            -- entry_date: YYYY-MM-DD, minutes: whole-minute duration.
            -- seq preserves insertion order for the reconciliation scan.
            CREATE TABLE IF NOT EXISTS entries (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                user_id INTEGER NOT NULL REFERENCES users(id),
                project_id INTEGER NOT NULL REFERENCES projects(id),
                task_id INTEGER REFERENCES tasks(id),
                entry_date TEXT NOT NULL,
                minutes INTEGER NOT NULL,
                work_type TEXT NOT NULL,
                narration TEXT NOT NULL DEFAULT '',
                activity TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT,
                tracking_mode TEXT,
                tracked_minutes INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_entries_user_date ON entries(user_id, entry_date);
            CREATE INDEX IF NOT EXISTS idx_entries_project_status ON entries(project_id, status);

            CREATE TABLE IF NOT EXISTS leaves (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                kind TEXT NOT NULL,
                status TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_leaves_user ON leaves(user_id, start_date);

            CREATE TABLE IF NOT EXISTS fill_requests (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                request_date TEXT NOT NULL,
                approved INTEGER NOT NULL DEFAULT 0
            );
            ",
        )?;
        Ok(())
    }

    // ========== Directory upserts ==========

    /// Inserts or updates a team.
    pub fn upsert_team(&self, team: &TeamRecord) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO teams (id, name, lead_id, manager_id) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                lead_id = excluded.lead_id,
                manager_id = excluded.manager_id",
            params![team.id, team.name, team.lead_id, team.manager_id],
        )?;
        Ok(())
    }

    /// Inserts or updates a user.
    pub fn upsert_user(&self, user: &UserRecord) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO users (id, name, role, team_id, active) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                role = excluded.role,
                team_id = excluded.team_id,
                active = excluded.active",
            params![
                user.id,
                user.name,
                user.role.as_str(),
                user.team_id,
                user.active
            ],
        )?;
        Ok(())
    }

    /// Inserts or updates a project. The ledger columns are preserved on
    /// update except for the contracted total.
    pub fn upsert_project(&self, project: &ProjectRecord) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO projects (id, name, billing_type, tracking, team_id, total_minutes, \
             used_minutes, billable_used_minutes) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                billing_type = excluded.billing_type,
                tracking = excluded.tracking,
                team_id = excluded.team_id,
                total_minutes = excluded.total_minutes",
            params![
                project.id,
                project.name,
                project.billing.as_str(),
                project.tracking,
                project.team_id,
                project.total_minutes,
                project.used_minutes,
                project.billable_used_minutes
            ],
        )?;
        Ok(())
    }

    /// Inserts or updates a task.
    pub fn upsert_task(&self, task: &TaskRecord) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO tasks (id, project_id, title, status) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                project_id = excluded.project_id,
                title = excluded.title,
                status = excluded.status",
            params![task.id, task.project_id, task.title, task.status],
        )?;
        Ok(())
    }

    /// Assigns a user to a project, ignoring duplicates.
    pub fn add_member(&self, project_id: i64, user_id: i64) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO project_members (project_id, user_id) VALUES (?, ?)",
            params![project_id, user_id],
        )?;
        Ok(())
    }

    /// Inserts or updates a leave interval.
    pub fn upsert_leave(&self, leave: &LeaveRecord) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO leaves (id, user_id, start_date, end_date, kind, status) \
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                kind = excluded.kind,
                status = excluded.status",
            params![
                leave.id,
                leave.user_id,
                format_date(leave.start),
                format_date(leave.end),
                leave.kind.as_str(),
                leave.status.as_str()
            ],
        )?;
        Ok(())
    }

    /// Inserts or updates a leave-to-fill request.
    pub fn upsert_fill_request(&self, request: &FillRequestRecord) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO fill_requests (id, user_id, request_date, approved) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                request_date = excluded.request_date,
                approved = excluded.approved",
            params![
                request.id,
                request.user_id,
                format_date(request.date),
                request.approved
            ],
        )?;
        Ok(())
    }

    // ========== Reads ==========

    /// Fetches a project by id.
    pub fn project(&self, id: i64) -> Result<ProjectRecord, DbError> {
        load_project(&self.conn, id)
    }

    /// Fetches a user by id.
    pub fn user(&self, id: i64) -> Result<UserRecord, DbError> {
        let record = self
            .conn
            .query_row(
                "SELECT id, name, role, team_id, active FROM users WHERE id = ?",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                        row.get::<_, bool>(4)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound {
                entity: "user",
                id: id.to_string(),
            })?;
        let role: Role = record.2.parse().map_err(|e: ValidationError| {
            tracing::warn!(user_id = id, "unparseable role");
            DbError::Corrupt {
                entity: "user",
                id: id.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(UserRecord {
            id: record.0,
            name: record.1,
            role,
            team_id: record.3,
            active: record.4,
        })
    }

    /// Fetches a single entry by id.
    pub fn entry(&self, id: &str) -> Result<TimeEntry, DbError> {
        load_entry(&self.conn, id)
    }

    /// Lists a project's entries in insertion order.
    pub fn entries_for_project(&self, project_id: i64) -> Result<Vec<TimeEntry>, DbError> {
        let sql = format!(
            "SELECT {} FROM entries WHERE project_id = ? ORDER BY seq ASC",
            EntryRow::COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![project_id], EntryRow::from_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.decode()?);
        }
        Ok(entries)
    }

    /// Resolves notification recipients for a set of projects: active admin
    /// users plus each owning team's manager and lead.
    pub fn reviewers_for_projects(&self, project_ids: &[i64]) -> Result<Vec<Recipient>, DbError> {
        let mut recipients = Vec::new();
        let mut seen = HashSet::new();

        let mut push = |id: i64, name: String, role: String| {
            if !seen.insert(id) {
                return;
            }
            match role.parse::<Role>() {
                Ok(role) => recipients.push(Recipient {
                    user_id: id,
                    name,
                    role,
                }),
                Err(err) => {
                    tracing::warn!(user_id = id, %err, "skipping recipient with unknown role");
                }
            }
        };

        let mut stmt = self
            .conn
            .prepare("SELECT id, name, role FROM users WHERE active = 1 AND role = 'admin'")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (id, name, role) = row?;
            push(id, name, role);
        }

        let mut stmt = self.conn.prepare(
            "SELECT u.id, u.name, u.role
             FROM projects p
             JOIN teams t ON t.id = p.team_id
             JOIN users u ON u.id IN (t.lead_id, t.manager_id)
             WHERE p.id = ? AND u.active = 1",
        )?;
        for project_id in project_ids {
            let rows = stmt.query_map(params![project_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            for row in rows {
                let (id, name, role) = row?;
                push(id, name, role);
            }
        }

        Ok(recipients)
    }

    // ========== Submission ==========

    /// Validates and persists a batch of submitted entries.
    ///
    /// The batch is atomic: any invalid entry rejects the whole submission
    /// with a field-level error. Entries dated today become `standup`;
    /// past dates require an approved fill request and become `backdated`.
    /// A submission summary goes to the notification sink afterwards;
    /// delivery failure is logged, never propagated.
    pub fn submit_entries(
        &mut self,
        actor: &Actor,
        today: NaiveDate,
        batch: &[NewEntry],
        sink: &dyn NotificationSink,
    ) -> Result<Vec<TimeEntry>, DbError> {
        let tx = self.conn.transaction()?;
        let mut created = Vec::with_capacity(batch.len());

        for new in batch {
            load_project(&tx, new.project_id)?;
            let member: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM project_members WHERE project_id = ? AND user_id = ?",
                    params![new.project_id, actor.user_id],
                    |row| row.get(0),
                )
                .optional()?;
            if member.is_none() {
                return Err(DbError::Invalid {
                    field: "project_id",
                    message: format!(
                        "user {} is not assigned to project {}",
                        actor.user_id, new.project_id
                    ),
                });
            }

            if let Some(task_id) = new.task_id {
                let task: Option<(i64, String)> = tx
                    .query_row(
                        "SELECT project_id, status FROM tasks WHERE id = ?",
                        params![task_id],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                let (task_project, task_status) = task.ok_or_else(|| DbError::NotFound {
                    entity: "task",
                    id: task_id.to_string(),
                })?;
                if task_project != new.project_id {
                    return Err(DbError::Invalid {
                        field: "task_id",
                        message: format!(
                            "task {task_id} belongs to project {task_project}, not {}",
                            new.project_id
                        ),
                    });
                }
                if task_status.eq_ignore_ascii_case("completed") {
                    return Err(DbError::Invalid {
                        field: "task_id",
                        message: format!("task {task_id} is completed"),
                    });
                }
            }

            let tracking = new.resolve_tracking()?;
            let status = submission_status(&tx, actor.user_id, new.date, today)?;

            let entry = TimeEntry {
                id: Uuid::new_v4().to_string(),
                user_id: actor.user_id,
                project_id: new.project_id,
                task_id: new.task_id,
                date: new.date,
                duration: new.duration,
                work_type: new.work_type.clone(),
                narration: new.narration.clone(),
                activity: new.activity,
                tracking,
                status,
                message: None,
            };
            insert_entry_row(&tx, &entry)?;
            created.push(entry);
        }

        tx.commit()?;
        tracing::info!(
            user_id = actor.user_id,
            count = created.len(),
            "entries submitted"
        );

        self.notify(
            sink,
            actor,
            SummaryAction::Submitted,
            created.iter().map(summary_line).collect(),
        );
        Ok(created)
    }

    // ========== Lifecycle ==========

    /// Moves the owner's standup/backdated entries to `pending`.
    ///
    /// Best-effort per id: a failure is reported in that id's outcome and
    /// the rest of the batch continues.
    pub fn submit_for_approval(
        &mut self,
        actor: &Actor,
        ids: &[String],
    ) -> Result<Vec<ReviewOutcome>, DbError> {
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            match self.submit_one(actor, id) {
                Ok(()) => outcomes.push(ReviewOutcome {
                    id: id.clone(),
                    status: EntryStatus::Pending.as_str().to_string(),
                    note: None,
                }),
                Err(err) => {
                    tracing::warn!(entry_id = %id, %err, "submit for approval failed");
                    outcomes.push(ReviewOutcome {
                        id: id.clone(),
                        status: "error".to_string(),
                        note: Some(err.to_string()),
                    });
                }
            }
        }
        Ok(outcomes)
    }

    fn submit_one(&mut self, actor: &Actor, id: &str) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        let entry = load_entry(&tx, id)?;
        if entry.user_id != actor.user_id {
            return Err(DbError::StateConflict {
                id: id.to_string(),
                reason: format!("entry belongs to user {}", entry.user_id),
            });
        }
        ensure_submittable(entry.status).map_err(|reason| DbError::StateConflict {
            id: id.to_string(),
            reason: reason.to_string(),
        })?;
        tx.execute(
            "UPDATE entries SET status = 'pending' WHERE id = ?",
            params![id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Approves or rejects a batch of entries.
    ///
    /// Requires a reviewer role. Entries are processed sequentially, each in
    /// its own transaction; one failure never aborts the rest of the batch.
    /// Approvals apply the hour-splitting plan and ledger draw; rejecting a
    /// previously approved entry reverses its ledger consumption. A review
    /// summary goes to the sink afterwards.
    pub fn approve_or_reject(
        &mut self,
        actor: &Actor,
        ids: &[String],
        decision: ReviewDecision,
        sink: &dyn NotificationSink,
    ) -> Result<Vec<ReviewOutcome>, DbError> {
        if !actor.is_reviewer() {
            return Err(DbError::NotReviewer {
                user_id: actor.user_id,
            });
        }

        let mut outcomes = Vec::with_capacity(ids.len());
        let mut lines = Vec::new();
        let mut project_ids = Vec::new();

        for id in ids {
            match self.review_one(id, decision) {
                Ok(entry) => {
                    outcomes.push(ReviewOutcome {
                        id: id.clone(),
                        status: entry.status.as_str().to_string(),
                        note: entry.message.clone(),
                    });
                    if !project_ids.contains(&entry.project_id) {
                        project_ids.push(entry.project_id);
                    }
                    lines.push(summary_line(&entry));
                }
                Err(err) => {
                    tracing::warn!(entry_id = %id, %err, "review failed, continuing batch");
                    outcomes.push(ReviewOutcome {
                        id: id.clone(),
                        status: "error".to_string(),
                        note: Some(err.to_string()),
                    });
                }
            }
        }

        tracing::info!(
            reviewer = actor.user_id,
            decision = ?decision,
            reviewed = lines.len(),
            failed = outcomes.len() - lines.len(),
            "review batch processed"
        );
        if !lines.is_empty() {
            self.notify(sink, actor, SummaryAction::Reviewed, lines);
        }
        Ok(outcomes)
    }

    fn review_one(&mut self, id: &str, decision: ReviewDecision) -> Result<TimeEntry, DbError> {
        let tx = self.conn.transaction()?;
        let entry = load_entry(&tx, id)?;
        ensure_reviewable(entry.status, decision).map_err(|reason| DbError::StateConflict {
            id: id.to_string(),
            reason: reason.to_string(),
        })?;
        let project = load_project(&tx, entry.project_id)?;
        let mut ledger = project.ledger()?;

        let updated = match decision {
            ReviewDecision::Approve => {
                let plan =
                    plan_approval(entry.duration, entry.activity, project.budgeted(), &mut ledger);
                // When the split shrinks the stored duration, tracked minutes
                // must shrink with it to keep tracked <= duration.
                tx.execute(
                    "UPDATE entries SET minutes = ?, activity = ?, status = 'approved', \
                     message = ?, tracked_minutes = MIN(tracked_minutes, ?) WHERE id = ?",
                    params![
                        i64::from(plan.duration.get()),
                        plan.activity.as_str(),
                        plan.note,
                        i64::from(plan.duration.get()),
                        id
                    ],
                )?;
                if let Some(split) = &plan.split {
                    let extra = TimeEntry {
                        id: Uuid::new_v4().to_string(),
                        duration: split.duration,
                        message: Some(split.note.clone()),
                        status: EntryStatus::Approved,
                        tracking: None,
                        ..entry.clone()
                    };
                    insert_entry_row(&tx, &extra)?;
                }
                save_ledger(&tx, project.id, &ledger)?;
                let tracking = entry.tracking.map(|t| Tracking {
                    tracked: t.tracked.min(plan.duration),
                    ..t
                });
                TimeEntry {
                    duration: plan.duration,
                    activity: plan.activity,
                    status: EntryStatus::Approved,
                    message: plan.note,
                    tracking,
                    ..entry
                }
            }
            ReviewDecision::Reject => {
                let plan = plan_rejection(
                    entry.status,
                    entry.duration,
                    entry.activity,
                    project.budgeted(),
                    entry.message.as_deref(),
                );
                if !plan.is_noop() {
                    ledger.release(plan.worked, plan.drawn);
                    save_ledger(&tx, project.id, &ledger)?;
                }
                tx.execute(
                    "UPDATE entries SET status = 'rejected' WHERE id = ?",
                    params![id],
                )?;
                TimeEntry {
                    status: EntryStatus::Rejected,
                    ..entry
                }
            }
        };

        tx.commit()?;
        Ok(updated)
    }

    /// Deletes an entry. Only the owner may delete, and only entries that
    /// are rejected or still in standup.
    pub fn delete_entry(&mut self, actor: &Actor, id: &str) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        let entry = load_entry(&tx, id)?;
        if entry.user_id != actor.user_id {
            return Err(DbError::StateConflict {
                id: id.to_string(),
                reason: format!("entry belongs to user {}", entry.user_id),
            });
        }
        if !can_delete(entry.status) {
            return Err(DbError::StateConflict {
                id: id.to_string(),
                reason: format!("cannot delete an entry in status {}", entry.status),
            });
        }
        tx.execute("DELETE FROM entries WHERE id = ?", params![id])?;
        tx.commit()?;
        Ok(())
    }

    // ========== Reconciliation ==========

    /// Converts approved non-billable entries to billable against the
    /// remaining budget, once every task of the project is completed.
    ///
    /// Runs in a single transaction. The scan is oldest-first by insertion
    /// order and stops when the budget is exhausted; re-running with nothing
    /// left to convert is a no-op.
    pub fn reconcile(&mut self, actor: &Actor, project_id: i64) -> Result<ReconcileReport, DbError> {
        if !actor.is_reviewer() {
            return Err(DbError::NotReviewer {
                user_id: actor.user_id,
            });
        }

        let tx = self.conn.transaction()?;
        let project = load_project(&tx, project_id)?;
        if !project.budgeted() {
            return Err(DbError::Invalid {
                field: "project_id",
                message: format!("project {project_id} is not a fixed-budget project"),
            });
        }
        let mut ledger = project.ledger()?;

        let mut stmt = tx.prepare("SELECT status FROM tasks WHERE project_id = ?")?;
        let statuses = stmt
            .query_map(params![project_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        let all_completed = statuses
            .iter()
            .all(|status| status.eq_ignore_ascii_case("completed"));
        if !all_completed {
            tracing::info!(project_id, "reconciliation skipped, tasks still open");
            return Ok(ReconcileReport {
                all_completed: false,
                converted: Vec::new(),
                updated_total_working_hours: ledger.used(),
                remaining_after_conversion: ledger.remaining(),
            });
        }

        let mut stmt = tx.prepare(
            "SELECT id, seq, minutes FROM entries \
             WHERE project_id = ? AND status = 'approved' AND activity = 'non_billable' \
             ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        let mut eligible = Vec::new();
        for row in rows {
            let (id, seq, minutes) = row?;
            match u32::try_from(minutes) {
                Ok(minutes) => eligible.push(ReconcilableEntry {
                    id,
                    seq,
                    duration: Minutes::new(minutes),
                }),
                Err(_) => {
                    // Data error: skip the record rather than fail the pass.
                    tracing::warn!(entry_id = %id, minutes, "skipping entry with negative duration");
                }
            }
        }
        drop(stmt);

        let plan = plan_reconciliation(&eligible, ledger.remaining());
        for conversion in &plan.conversions {
            match conversion {
                Conversion::Full { id, .. } => {
                    tx.execute(
                        "UPDATE entries SET activity = 'billable', message = ? WHERE id = ?",
                        params![NOTE_CONVERTED, id],
                    )?;
                }
                Conversion::Split { id, kept, leftover } => {
                    tx.execute(
                        "UPDATE entries SET minutes = ?, activity = 'billable', message = ?, \
                         tracked_minutes = MIN(tracked_minutes, ?) WHERE id = ?",
                        params![i64::from(kept.get()), NOTE_CONVERTED, i64::from(kept.get()), id],
                    )?;
                    let source = load_entry(&tx, id)?;
                    let remainder = TimeEntry {
                        id: Uuid::new_v4().to_string(),
                        duration: *leftover,
                        activity: Activity::NonBillable,
                        message: Some(NOTE_LEFTOVER.to_string()),
                        tracking: None,
                        ..source
                    };
                    insert_entry_row(&tx, &remainder)?;
                }
            }
        }

        ledger.draw(plan.converted);
        save_ledger(&tx, project_id, &ledger)?;
        tx.commit()?;

        tracing::info!(
            project_id,
            converted = plan.conversions.len(),
            minutes = plan.converted.get(),
            "reconciliation complete"
        );
        Ok(ReconcileReport {
            all_completed: true,
            converted: plan.conversions,
            updated_total_working_hours: ledger.used(),
            remaining_after_conversion: ledger.remaining(),
        })
    }

    // ========== Aggregation ==========

    /// Per-day rollup for a user over an inclusive date range.
    ///
    /// Rejected entries are excluded. Rows that fail to decode are logged
    /// and skipped; a bad record never kills the whole report.
    pub fn weekly_totals(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
        expected_day: Minutes,
    ) -> Result<WeeklyReport, DbError> {
        let sql = format!(
            "SELECT {} FROM entries \
             WHERE user_id = ? AND entry_date >= ? AND entry_date <= ? \
               AND status != 'rejected' \
             ORDER BY seq ASC",
            EntryRow::COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![user_id, format_date(from), format_date(to)],
            EntryRow::from_row,
        )?;
        let mut worked = Vec::new();
        for row in rows {
            let row = row?;
            match row.decode() {
                Ok(entry) => worked.push(WorkedEntry {
                    date: entry.date,
                    duration: entry.duration,
                    activity: entry.activity,
                }),
                Err(err) => {
                    tracing::warn!(%err, "skipping undecodable entry in weekly rollup");
                }
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, start_date, end_date, kind, status FROM leaves \
             WHERE user_id = ? AND status IN ('pending', 'approved') \
               AND start_date <= ? AND end_date >= ?",
        )?;
        let rows = stmt.query_map(
            params![user_id, format_date(to), format_date(from)],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )?;
        let mut leaves = Vec::new();
        for row in rows {
            let (id, start, end, kind, status) = row?;
            let span = (|| -> Result<LeaveSpan, DbError> {
                let id = id.to_string();
                Ok(LeaveSpan {
                    start: parse_date("leave", &id, &start)?,
                    end: parse_date("leave", &id, &end)?,
                    kind: kind
                        .parse()
                        .map_err(|e: ValidationError| DbError::Corrupt {
                            entity: "leave",
                            id: id.clone(),
                            message: e.to_string(),
                        })?,
                    status: status
                        .parse()
                        .map_err(|e: ValidationError| DbError::Corrupt {
                            entity: "leave",
                            id,
                            message: e.to_string(),
                        })?,
                })
            })();
            match span {
                Ok(span) => leaves.push(span),
                Err(err) => tracing::warn!(%err, "skipping undecodable leave in weekly rollup"),
            }
        }

        Ok(weekly_totals(from, to, &worked, &leaves, expected_day))
    }

    // ========== Notification plumbing ==========

    /// Delivers a summary, logging (never propagating) sink failures.
    fn notify(
        &self,
        sink: &dyn NotificationSink,
        actor: &Actor,
        action: SummaryAction,
        lines: Vec<SummaryLine>,
    ) {
        let project_ids: Vec<i64> = lines
            .iter()
            .map(|line| line.project_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let recipients = match self.reviewers_for_projects(&project_ids) {
            Ok(recipients) => recipients,
            Err(err) => {
                tracing::warn!(%err, "could not resolve notification recipients");
                return;
            }
        };
        let summary = ReviewSummary {
            actor_id: actor.user_id,
            action,
            lines,
        };
        if let Err(err) = sink.notify(&summary, &recipients) {
            tracing::warn!(%err, "notification sink failed");
        }
    }
}

fn summary_line(entry: &TimeEntry) -> SummaryLine {
    SummaryLine {
        entry_id: entry.id.clone(),
        user_id: entry.user_id,
        project_id: entry.project_id,
        date: entry.date,
        duration: entry.duration,
        status: entry.status,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use tsa_core::approval::{NOTE_BILLABLE, NOTE_EXTRA};
    use tsa_core::{NullSink, SinkError, TrackingInput};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn clock(s: &str) -> Minutes {
        Minutes::parse_clock(s).unwrap()
    }

    fn employee() -> Actor {
        Actor::new(1, Role::Employee)
    }

    fn manager() -> Actor {
        Actor::new(2, Role::Manager)
    }

    /// One team, an employee, reviewers, and a fixed 10-hour project.
    fn fixture() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.upsert_team(&TeamRecord {
            id: 1,
            name: "Platform".to_string(),
            lead_id: Some(3),
            manager_id: Some(2),
        })
        .unwrap();
        for (id, name, role, team) in [
            (1, "Asha", Role::Employee, Some(1)),
            (2, "Ravi", Role::Manager, Some(1)),
            (3, "Mei", Role::Lead, Some(1)),
            (4, "Omar", Role::Admin, None),
        ] {
            db.upsert_user(&UserRecord {
                id,
                name: name.to_string(),
                role,
                team_id: team,
                active: true,
            })
            .unwrap();
        }
        db.upsert_project(&ProjectRecord {
            id: 10,
            name: "Fixed Build".to_string(),
            billing: BillingType::Fixed,
            tracking: false,
            team_id: Some(1),
            total_minutes: 600,
            used_minutes: 0,
            billable_used_minutes: 0,
        })
        .unwrap();
        db.add_member(10, 1).unwrap();
        db.upsert_task(&TaskRecord {
            id: 100,
            project_id: 10,
            title: "API".to_string(),
            status: "In Progress".to_string(),
        })
        .unwrap();
        db
    }

    fn new_entry(project_id: i64, day: u32, duration: &str, activity: Activity) -> NewEntry {
        NewEntry {
            project_id,
            task_id: None,
            date: date(day),
            duration: clock(duration),
            work_type: "development".to_string(),
            narration: "work".to_string(),
            activity,
            tracking: None,
        }
    }

    /// Submits one entry as user 1 and walks it to pending.
    fn submit_pending(db: &mut Database, duration: &str, activity: Activity) -> String {
        let created = db
            .submit_entries(
                &employee(),
                date(2),
                &[new_entry(10, 2, duration, activity)],
                &NullSink,
            )
            .unwrap();
        let id = created[0].id.clone();
        let outcomes = db.submit_for_approval(&employee(), &[id.clone()]).unwrap();
        assert_eq!(outcomes[0].status, "pending");
        id
    }

    fn approve(db: &mut Database, id: &str) -> ReviewOutcome {
        db.approve_or_reject(&manager(), &[id.to_string()], ReviewDecision::Approve, &NullSink)
            .unwrap()
            .remove(0)
    }

    /// A sink that records summaries, or fails on demand.
    struct RecordingSink {
        summaries: RefCell<Vec<(ReviewSummary, Vec<Recipient>)>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new(fail: bool) -> Self {
            Self {
                summaries: RefCell::new(Vec::new()),
                fail,
            }
        }
    }

    impl NotificationSink for RecordingSink {
        fn notify(
            &self,
            summary: &ReviewSummary,
            recipients: &[Recipient],
        ) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError("smtp down".to_string()));
            }
            self.summaries
                .borrow_mut()
                .push((summary.clone(), recipients.to_vec()));
            Ok(())
        }
    }

    // ========== Submission ==========

    #[test]
    fn submit_today_creates_standup_entries() {
        let mut db = fixture();
        let created = db
            .submit_entries(
                &employee(),
                date(2),
                &[new_entry(10, 2, "04:00", Activity::Billable)],
                &NullSink,
            )
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].status, EntryStatus::Standup);
        assert_eq!(created[0].duration, clock("04:00"));
        assert_eq!(db.entry(&created[0].id).unwrap(), created[0]);
    }

    #[test]
    fn submit_rejects_future_dates() {
        let mut db = fixture();
        let err = db
            .submit_entries(
                &employee(),
                date(2),
                &[new_entry(10, 3, "01:00", Activity::Billable)],
                &NullSink,
            )
            .unwrap_err();
        assert!(matches!(err, DbError::Invalid { field: "date", .. }));
    }

    #[test]
    fn backdated_submission_requires_approved_fill_request() {
        let mut db = fixture();
        let backdated = [new_entry(10, 1, "02:00", Activity::Billable)];

        let err = db
            .submit_entries(&employee(), date(2), &backdated, &NullSink)
            .unwrap_err();
        assert!(matches!(err, DbError::Invalid { field: "date", .. }));

        // A pending request is not enough.
        db.upsert_fill_request(&FillRequestRecord {
            id: 1,
            user_id: 1,
            date: date(1),
            approved: false,
        })
        .unwrap();
        assert!(
            db.submit_entries(&employee(), date(2), &backdated, &NullSink)
                .is_err()
        );

        db.upsert_fill_request(&FillRequestRecord {
            id: 1,
            user_id: 1,
            date: date(1),
            approved: true,
        })
        .unwrap();
        let created = db
            .submit_entries(&employee(), date(2), &backdated, &NullSink)
            .unwrap();
        assert_eq!(created[0].status, EntryStatus::Backdated);
    }

    #[test]
    fn submit_rejects_non_members_and_unknown_projects() {
        let mut db = fixture();
        let err = db
            .submit_entries(
                &Actor::new(3, Role::Lead),
                date(2),
                &[new_entry(10, 2, "01:00", Activity::Billable)],
                &NullSink,
            )
            .unwrap_err();
        assert!(matches!(err, DbError::Invalid { field: "project_id", .. }));

        let err = db
            .submit_entries(
                &employee(),
                date(2),
                &[new_entry(99, 2, "01:00", Activity::Billable)],
                &NullSink,
            )
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { entity: "project", .. }));
    }

    #[test]
    fn submit_validates_task_project_and_status() {
        let mut db = fixture();
        let mut entry = new_entry(10, 2, "01:00", Activity::Billable);
        entry.task_id = Some(999);
        let err = db
            .submit_entries(&employee(), date(2), &[entry], &NullSink)
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { entity: "task", .. }));

        db.upsert_task(&TaskRecord {
            id: 100,
            project_id: 10,
            title: "API".to_string(),
            status: "Completed".to_string(),
        })
        .unwrap();
        let mut entry = new_entry(10, 2, "01:00", Activity::Billable);
        entry.task_id = Some(100);
        let err = db
            .submit_entries(&employee(), date(2), &[entry], &NullSink)
            .unwrap_err();
        assert!(matches!(err, DbError::Invalid { field: "task_id", .. }));
    }

    #[test]
    fn submit_enforces_tracking_consistency() {
        let mut db = fixture();
        let mut entry = new_entry(10, 2, "04:00", Activity::Billable);
        entry.tracking = Some(TrackingInput {
            mode: TrackingMode::Partial,
            tracked: Some(clock("05:00")),
        });
        let err = db
            .submit_entries(&employee(), date(2), &[entry], &NullSink)
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::TrackedExceedsDuration { .. })
        ));

        let mut entry = new_entry(10, 2, "04:00", Activity::Billable);
        entry.tracking = Some(TrackingInput {
            mode: TrackingMode::Partial,
            tracked: Some(clock("02:30")),
        });
        let created = db
            .submit_entries(&employee(), date(2), &[entry], &NullSink)
            .unwrap();
        let stored = db.entry(&created[0].id).unwrap();
        assert_eq!(stored.offline(), Some(clock("01:30")));
    }

    // ========== Lifecycle guards ==========

    #[test]
    fn submit_for_approval_requires_owner_and_valid_state() {
        let mut db = fixture();
        let created = db
            .submit_entries(
                &employee(),
                date(2),
                &[new_entry(10, 2, "01:00", Activity::Billable)],
                &NullSink,
            )
            .unwrap();
        let id = created[0].id.clone();

        let outcomes = db
            .submit_for_approval(&Actor::new(3, Role::Lead), &[id.clone()])
            .unwrap();
        assert_eq!(outcomes[0].status, "error");

        let outcomes = db.submit_for_approval(&employee(), &[id.clone()]).unwrap();
        assert_eq!(outcomes[0].status, "pending");

        // Already pending: resubmission is a state conflict.
        let outcomes = db.submit_for_approval(&employee(), &[id]).unwrap();
        assert_eq!(outcomes[0].status, "error");
    }

    #[test]
    fn review_requires_reviewer_role() {
        let mut db = fixture();
        let id = submit_pending(&mut db, "01:00", Activity::Billable);
        let err = db
            .approve_or_reject(&employee(), &[id], ReviewDecision::Approve, &NullSink)
            .unwrap_err();
        assert!(matches!(err, DbError::NotReviewer { user_id: 1 }));
    }

    #[test]
    fn delete_allows_only_owner_and_terminal_states() {
        let mut db = fixture();
        let created = db
            .submit_entries(
                &employee(),
                date(2),
                &[new_entry(10, 2, "01:00", Activity::Billable)],
                &NullSink,
            )
            .unwrap();
        let id = created[0].id.clone();

        assert!(matches!(
            db.delete_entry(&manager(), &id),
            Err(DbError::StateConflict { .. })
        ));

        let outcomes = db.submit_for_approval(&employee(), &[id.clone()]).unwrap();
        assert_eq!(outcomes[0].status, "pending");
        assert!(matches!(
            db.delete_entry(&employee(), &id),
            Err(DbError::StateConflict { .. })
        ));

        db.approve_or_reject(&manager(), &[id.clone()], ReviewDecision::Reject, &NullSink)
            .unwrap();
        db.delete_entry(&employee(), &id).unwrap();
        assert!(matches!(
            db.entry(&id),
            Err(DbError::NotFound { entity: "entry", .. })
        ));
    }

    // ========== Approval and the budget ==========

    #[test]
    fn approval_scenario_splits_against_ten_hour_budget() {
        let mut db = fixture();

        let first = submit_pending(&mut db, "06:00", Activity::Billable);
        let outcome = approve(&mut db, &first);
        assert_eq!(outcome.status, "approved");
        assert_eq!(outcome.note.as_deref(), Some(NOTE_BILLABLE));
        assert_eq!(db.entry(&first).unwrap().duration.to_string(), "06:00");

        let project = db.project(10).unwrap();
        assert_eq!(project.used_minutes, 360);
        assert_eq!(project.billable_used_minutes, 360);

        let second = submit_pending(&mut db, "05:00", Activity::Billable);
        let outcome = approve(&mut db, &second);
        assert_eq!(outcome.status, "approved");
        // Only 4h remained: entry shrinks, a 1h split entry appears.
        assert_eq!(db.entry(&second).unwrap().duration.to_string(), "04:00");

        let entries = db.entries_for_project(10).unwrap();
        assert_eq!(entries.len(), 3);
        let split = entries.last().unwrap();
        assert_eq!(split.duration.to_string(), "01:00");
        assert_eq!(split.status, EntryStatus::Approved);
        assert_eq!(split.message.as_deref(), Some(NOTE_EXTRA));
        assert_eq!(split.user_id, 1);

        let project = db.project(10).unwrap();
        assert_eq!(project.used_minutes, 660);
        assert_eq!(project.billable_used_minutes, 600);
        assert_eq!(project.ledger().unwrap().remaining(), Minutes::ZERO);
    }

    #[test]
    fn approval_with_exhausted_budget_keeps_full_duration() {
        let mut db = fixture();
        let big = submit_pending(&mut db, "10:00", Activity::Billable);
        approve(&mut db, &big);

        let extra = submit_pending(&mut db, "03:00", Activity::Billable);
        let outcome = approve(&mut db, &extra);
        assert_eq!(outcome.note.as_deref(), Some(NOTE_EXTRA));
        assert_eq!(db.entry(&extra).unwrap().duration.to_string(), "03:00");
        // No split record was created.
        assert_eq!(db.entries_for_project(10).unwrap().len(), 2);
        assert_eq!(db.project(10).unwrap().used_minutes, 780);
    }

    #[test]
    fn non_billable_approval_consumes_total_only() {
        let mut db = fixture();
        let id = submit_pending(&mut db, "02:00", Activity::NonBillable);
        approve(&mut db, &id);

        let stored = db.entry(&id).unwrap();
        // Classification is preserved; no forced flip to billable.
        assert_eq!(stored.activity, Activity::NonBillable);
        let project = db.project(10).unwrap();
        assert_eq!(project.used_minutes, 120);
        assert_eq!(project.billable_used_minutes, 0);
        assert_eq!(project.ledger().unwrap().remaining(), clock("10:00"));
    }

    #[test]
    fn in_house_approval_skips_the_ledger() {
        let mut db = fixture();
        let id = submit_pending(&mut db, "03:00", Activity::InHouse);
        approve(&mut db, &id);
        let project = db.project(10).unwrap();
        assert_eq!(project.used_minutes, 0);
        assert_eq!(project.billable_used_minutes, 0);
        assert_eq!(db.entry(&id).unwrap().status, EntryStatus::Approved);
    }

    #[test]
    fn tracking_project_forces_billable_and_bypasses_budget() {
        let mut db = fixture();
        db.upsert_project(&ProjectRecord {
            id: 11,
            name: "Hourly Ops".to_string(),
            billing: BillingType::Hourly,
            tracking: true,
            team_id: Some(1),
            total_minutes: 0,
            used_minutes: 0,
            billable_used_minutes: 0,
        })
        .unwrap();
        db.add_member(11, 1).unwrap();

        let created = db
            .submit_entries(
                &employee(),
                date(2),
                &[new_entry(11, 2, "09:00", Activity::NonBillable)],
                &NullSink,
            )
            .unwrap();
        let id = created[0].id.clone();
        db.submit_for_approval(&employee(), &[id.clone()]).unwrap();
        approve(&mut db, &id);

        let stored = db.entry(&id).unwrap();
        assert_eq!(stored.activity, Activity::Billable);
        assert_eq!(stored.duration.to_string(), "09:00");
        let project = db.project(11).unwrap();
        assert_eq!(project.used_minutes, 540);
        assert_eq!(project.billable_used_minutes, 0);
    }

    #[test]
    fn reject_after_approve_reverses_the_ledger_exactly() {
        let mut db = fixture();
        let id = submit_pending(&mut db, "02:00", Activity::Billable);
        approve(&mut db, &id);
        assert_eq!(db.project(10).unwrap().used_minutes, 120);

        let outcomes = db
            .approve_or_reject(&manager(), &[id.clone()], ReviewDecision::Reject, &NullSink)
            .unwrap();
        assert_eq!(outcomes[0].status, "rejected");
        assert_eq!(db.entry(&id).unwrap().status, EntryStatus::Rejected);

        let project = db.project(10).unwrap();
        assert_eq!(project.used_minutes, 0);
        assert_eq!(project.billable_used_minutes, 0);
        assert_eq!(project.ledger().unwrap().remaining(), clock("10:00"));
    }

    #[test]
    fn split_approval_clamps_tracked_minutes() {
        let mut db = fixture();
        db.upsert_project(&ProjectRecord {
            id: 10,
            name: "Fixed Build".to_string(),
            billing: BillingType::Fixed,
            tracking: false,
            team_id: Some(1),
            total_minutes: 240,
            used_minutes: 0,
            billable_used_minutes: 0,
        })
        .unwrap();

        let mut entry = new_entry(10, 2, "05:00", Activity::Billable);
        entry.tracking = Some(TrackingInput {
            mode: TrackingMode::Partial,
            tracked: Some(clock("04:30")),
        });
        let created = db
            .submit_entries(&employee(), date(2), &[entry], &NullSink)
            .unwrap();
        let id = created[0].id.clone();
        db.submit_for_approval(&employee(), &[id.clone()]).unwrap();
        approve(&mut db, &id);

        // Only 4h fit the budget: the record shrinks and its tracked
        // minutes shrink with it.
        let stored = db.entry(&id).unwrap();
        assert_eq!(stored.duration, clock("04:00"));
        let tracking = stored.tracking.unwrap();
        assert_eq!(tracking.tracked, clock("04:00"));
        assert_eq!(stored.offline(), Some(Minutes::ZERO));
        assert_eq!(tracking.tracked + stored.offline().unwrap(), stored.duration);

        // The overflow record carries no tracking of its own.
        let entries = db.entries_for_project(10).unwrap();
        let split = entries.last().unwrap();
        assert_eq!(split.duration, clock("01:00"));
        assert!(split.tracking.is_none());
    }

    #[test]
    fn approved_partial_tracking_keeps_the_duration_split() {
        let mut db = fixture();
        let mut entry = new_entry(10, 2, "04:00", Activity::Billable);
        entry.tracking = Some(TrackingInput {
            mode: TrackingMode::Partial,
            tracked: Some(clock("02:30")),
        });
        let created = db
            .submit_entries(&employee(), date(2), &[entry], &NullSink)
            .unwrap();
        let id = created[0].id.clone();
        db.submit_for_approval(&employee(), &[id.clone()]).unwrap();
        approve(&mut db, &id);

        // An approval that fits the budget leaves tracking untouched.
        let stored = db.entry(&id).unwrap();
        let tracking = stored.tracking.unwrap();
        assert_eq!(tracking.tracked, clock("02:30"));
        assert_eq!(stored.offline(), Some(clock("01:30")));
        assert_eq!(tracking.tracked + stored.offline().unwrap(), stored.duration);
    }

    #[test]
    fn rejecting_the_extra_record_releases_no_budget() {
        let mut db = fixture();
        let big = submit_pending(&mut db, "10:00", Activity::Billable);
        approve(&mut db, &big);
        let extra = submit_pending(&mut db, "03:00", Activity::Billable);
        approve(&mut db, &extra);
        assert_eq!(db.project(10).unwrap().used_minutes, 780);

        db.approve_or_reject(&manager(), &[extra.clone()], ReviewDecision::Reject, &NullSink)
            .unwrap();

        // The extra time never drew budget, so rejecting it returns none.
        let project = db.project(10).unwrap();
        assert_eq!(project.used_minutes, 600);
        assert_eq!(project.billable_used_minutes, 600);
        assert_eq!(project.ledger().unwrap().remaining(), Minutes::ZERO);
    }

    #[test]
    fn rejecting_a_split_extra_entry_keeps_the_budget_drawn() {
        let mut db = fixture();
        let first = submit_pending(&mut db, "06:00", Activity::Billable);
        approve(&mut db, &first);
        let second = submit_pending(&mut db, "05:00", Activity::Billable);
        approve(&mut db, &second);

        let entries = db.entries_for_project(10).unwrap();
        let split_id = entries.last().unwrap().id.clone();
        db.approve_or_reject(&manager(), &[split_id], ReviewDecision::Reject, &NullSink)
            .unwrap();

        // Only the 1h overflow record was rejected; the 4h it split from
        // stays billed and the budget stays fully drawn.
        let project = db.project(10).unwrap();
        assert_eq!(project.used_minutes, 600);
        assert_eq!(project.billable_used_minutes, 600);
    }

    #[test]
    fn rejecting_a_pending_entry_leaves_the_ledger_alone() {
        let mut db = fixture();
        let id = submit_pending(&mut db, "02:00", Activity::Billable);
        db.approve_or_reject(&manager(), &[id.clone()], ReviewDecision::Reject, &NullSink)
            .unwrap();
        let project = db.project(10).unwrap();
        assert_eq!(project.used_minutes, 0);
        assert_eq!(db.entry(&id).unwrap().status, EntryStatus::Rejected);
    }

    #[test]
    fn batch_review_continues_past_failures() {
        let mut db = fixture();
        let good = submit_pending(&mut db, "01:00", Activity::Billable);
        let ids = vec!["no-such-entry".to_string(), good.clone()];

        let outcomes = db
            .approve_or_reject(&manager(), &ids, ReviewDecision::Approve, &NullSink)
            .unwrap();
        assert_eq!(outcomes[0].status, "error");
        assert!(outcomes[0].note.as_deref().unwrap().contains("not found"));
        assert_eq!(outcomes[1].status, "approved");
        assert_eq!(db.entry(&good).unwrap().status, EntryStatus::Approved);
    }

    #[test]
    fn batch_review_skips_corrupt_rows_without_aborting() {
        let mut db = fixture();
        let good = submit_pending(&mut db, "01:00", Activity::Billable);
        db.conn
            .execute(
                "INSERT INTO entries (id, user_id, project_id, entry_date, minutes, work_type, \
                 activity, status) VALUES ('broken', 1, 10, '2024-01-02', -30, 'development', \
                 'billable', 'pending')",
                [],
            )
            .unwrap();

        let outcomes = db
            .approve_or_reject(
                &manager(),
                &["broken".to_string(), good.clone()],
                ReviewDecision::Approve,
                &NullSink,
            )
            .unwrap();
        assert_eq!(outcomes[0].status, "error");
        assert_eq!(outcomes[1].status, "approved");
    }

    // ========== Notifications ==========

    #[test]
    fn review_summary_reaches_team_reviewers_and_admins() {
        let mut db = fixture();
        let id = submit_pending(&mut db, "01:00", Activity::Billable);

        let sink = RecordingSink::new(false);
        db.approve_or_reject(&manager(), &[id], ReviewDecision::Approve, &sink)
            .unwrap();

        let summaries = sink.summaries.borrow();
        assert_eq!(summaries.len(), 1);
        let (summary, recipients) = &summaries[0];
        assert_eq!(summary.action, SummaryAction::Reviewed);
        assert_eq!(summary.lines.len(), 1);
        assert_eq!(summary.lines[0].status, EntryStatus::Approved);

        let mut ids: Vec<i64> = recipients.iter().map(|r| r.user_id).collect();
        ids.sort_unstable();
        // Admin, team manager, team lead.
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn sink_failure_does_not_fail_the_operation() {
        let mut db = fixture();
        let id = submit_pending(&mut db, "01:00", Activity::Billable);
        let sink = RecordingSink::new(true);
        let outcomes = db
            .approve_or_reject(&manager(), &[id.clone()], ReviewDecision::Approve, &sink)
            .unwrap();
        assert_eq!(outcomes[0].status, "approved");
        assert_eq!(db.entry(&id).unwrap().status, EntryStatus::Approved);
    }

    // ========== Reconciliation ==========

    fn reconcile_fixture() -> (Database, String, String) {
        let mut db = fixture();
        // 5-hour budget for the conversion scenario.
        let mut project = db.project(10).unwrap();
        project.total_minutes = 300;
        db.upsert_project(&project).unwrap();

        let first = submit_pending(&mut db, "03:00", Activity::NonBillable);
        approve(&mut db, &first);
        let second = submit_pending(&mut db, "04:00", Activity::NonBillable);
        approve(&mut db, &second);
        (db, first, second)
    }

    #[test]
    fn reconcile_aborts_while_tasks_are_open() {
        let (mut db, first, _) = reconcile_fixture();
        let report = db.reconcile(&manager(), 10).unwrap();
        assert!(!report.all_completed);
        assert!(report.converted.is_empty());
        assert_eq!(db.entry(&first).unwrap().activity, Activity::NonBillable);
    }

    #[test]
    fn reconcile_converts_oldest_first_and_splits_the_last_fit() {
        let (mut db, first, second) = reconcile_fixture();
        db.upsert_task(&TaskRecord {
            id: 100,
            project_id: 10,
            title: "API".to_string(),
            status: "completed".to_string(),
        })
        .unwrap();

        let report = db.reconcile(&manager(), 10).unwrap();
        assert!(report.all_completed);
        assert_eq!(report.converted.len(), 2);
        assert_eq!(report.remaining_after_conversion, Minutes::ZERO);
        assert_eq!(report.updated_total_working_hours, clock("07:00"));

        let converted = db.entry(&first).unwrap();
        assert_eq!(converted.activity, Activity::Billable);
        assert_eq!(converted.message.as_deref(), Some(NOTE_CONVERTED));

        let split = db.entry(&second).unwrap();
        assert_eq!(split.activity, Activity::Billable);
        assert_eq!(split.duration.to_string(), "02:00");

        let entries = db.entries_for_project(10).unwrap();
        assert_eq!(entries.len(), 3);
        let leftover = entries.last().unwrap();
        assert_eq!(leftover.activity, Activity::NonBillable);
        assert_eq!(leftover.duration.to_string(), "02:00");
        assert_eq!(leftover.message.as_deref(), Some(NOTE_LEFTOVER));
        assert_eq!(leftover.status, EntryStatus::Approved);

        assert_eq!(db.project(10).unwrap().billable_used_minutes, 300);
    }

    #[test]
    fn reconcile_twice_is_idempotent() {
        let (mut db, _, _) = reconcile_fixture();
        db.upsert_task(&TaskRecord {
            id: 100,
            project_id: 10,
            title: "API".to_string(),
            status: "Completed".to_string(),
        })
        .unwrap();

        db.reconcile(&manager(), 10).unwrap();
        let before = db.entries_for_project(10).unwrap();
        let second = db.reconcile(&manager(), 10).unwrap();
        assert!(second.converted.is_empty());
        assert_eq!(second.remaining_after_conversion, Minutes::ZERO);
        assert_eq!(db.entries_for_project(10).unwrap(), before);
    }

    #[test]
    fn reconcile_rejects_unbudgeted_projects() {
        let mut db = fixture();
        db.upsert_project(&ProjectRecord {
            id: 11,
            name: "Hourly Ops".to_string(),
            billing: BillingType::Hourly,
            tracking: true,
            team_id: Some(1),
            total_minutes: 0,
            used_minutes: 0,
            billable_used_minutes: 0,
        })
        .unwrap();
        assert!(matches!(
            db.reconcile(&manager(), 11),
            Err(DbError::Invalid { field: "project_id", .. })
        ));
    }

    // ========== Weekly rollup ==========

    #[test]
    fn weekly_totals_buckets_by_classification() {
        let mut db = fixture();
        db.submit_entries(
            &employee(),
            date(2),
            &[
                new_entry(10, 2, "02:00", Activity::Billable),
                new_entry(10, 2, "01:30", Activity::NonBillable),
            ],
            &NullSink,
        )
        .unwrap();

        let report = db
            .weekly_totals(1, date(1), date(7), Minutes::new(480))
            .unwrap();
        let day = &report.days[1];
        assert_eq!(day.billable.to_string(), "02:00");
        assert_eq!(day.non_billable.to_string(), "01:30");
        assert_eq!(day.total.to_string(), "03:30");
    }

    #[test]
    fn weekly_totals_skips_corrupt_rows() {
        let mut db = fixture();
        db.submit_entries(
            &employee(),
            date(2),
            &[new_entry(10, 2, "02:00", Activity::Billable)],
            &NullSink,
        )
        .unwrap();
        db.conn
            .execute(
                "INSERT INTO entries (id, user_id, project_id, entry_date, minutes, work_type, \
                 activity, status) VALUES ('bad', 1, 10, '2024-01-02', 60, 'development', \
                 'consulting', 'standup')",
                [],
            )
            .unwrap();

        let report = db
            .weekly_totals(1, date(2), date(2), Minutes::new(480))
            .unwrap();
        assert_eq!(report.days[0].total.to_string(), "02:00");
    }

    #[test]
    fn weekly_totals_excludes_rejected_and_overlays_leave() {
        let mut db = fixture();
        let id = submit_pending(&mut db, "02:00", Activity::Billable);
        db.approve_or_reject(&manager(), &[id], ReviewDecision::Reject, &NullSink)
            .unwrap();
        db.upsert_leave(&LeaveRecord {
            id: 1,
            user_id: 1,
            start: date(3),
            end: date(3),
            kind: LeaveKind::HalfDay,
            status: LeaveStatus::Approved,
        })
        .unwrap();

        let report = db
            .weekly_totals(1, date(2), date(3), Minutes::new(480))
            .unwrap();
        assert_eq!(report.days[0].total, Minutes::ZERO);
        assert_eq!(
            report.days[1].availability,
            tsa_core::week::Availability::OnLeave
        );
        assert_eq!(report.days[1].expected, Minutes::new(240));
    }
}
