//! Init command: create the database and optionally load seed data.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tsa_core::{BillingType, LeaveKind, LeaveStatus, Role};
use tsa_db::{
    Database, FillRequestRecord, LeaveRecord, ProjectRecord, TaskRecord, TeamRecord, UserRecord,
};

/// Seed file contents. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Seed {
    teams: Vec<SeedTeam>,
    users: Vec<SeedUser>,
    projects: Vec<SeedProject>,
    members: Vec<SeedMember>,
    tasks: Vec<SeedTask>,
    leaves: Vec<SeedLeave>,
    fill_requests: Vec<SeedFillRequest>,
}

#[derive(Debug, Deserialize)]
struct SeedTeam {
    id: i64,
    name: String,
    lead_id: Option<i64>,
    manager_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SeedUser {
    id: i64,
    name: String,
    role: Role,
    team_id: Option<i64>,
    #[serde(default = "default_true")]
    active: bool,
}

#[derive(Debug, Deserialize)]
struct SeedProject {
    id: i64,
    name: String,
    billing: BillingType,
    #[serde(default)]
    tracking: bool,
    team_id: Option<i64>,
    #[serde(default)]
    total_minutes: i64,
}

#[derive(Debug, Deserialize)]
struct SeedMember {
    project_id: i64,
    user_id: i64,
}

#[derive(Debug, Deserialize)]
struct SeedTask {
    id: i64,
    project_id: i64,
    title: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct SeedLeave {
    id: i64,
    user_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    kind: LeaveKind,
    status: LeaveStatus,
}

#[derive(Debug, Deserialize)]
struct SeedFillRequest {
    id: i64,
    user_id: i64,
    date: NaiveDate,
    #[serde(default)]
    approved: bool,
}

const fn default_true() -> bool {
    true
}

pub fn run<W: Write>(writer: &mut W, db: &Database, seed_path: Option<&Path>) -> Result<()> {
    let Some(path) = seed_path else {
        writeln!(writer, "database initialized")?;
        return Ok(());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let seed: Seed = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse seed file {}", path.display()))?;

    for team in &seed.teams {
        db.upsert_team(&TeamRecord {
            id: team.id,
            name: team.name.clone(),
            lead_id: team.lead_id,
            manager_id: team.manager_id,
        })?;
    }
    for user in &seed.users {
        db.upsert_user(&UserRecord {
            id: user.id,
            name: user.name.clone(),
            role: user.role,
            team_id: user.team_id,
            active: user.active,
        })?;
    }
    for project in &seed.projects {
        db.upsert_project(&ProjectRecord {
            id: project.id,
            name: project.name.clone(),
            billing: project.billing,
            tracking: project.tracking,
            team_id: project.team_id,
            total_minutes: project.total_minutes,
            used_minutes: 0,
            billable_used_minutes: 0,
        })?;
    }
    for member in &seed.members {
        db.add_member(member.project_id, member.user_id)?;
    }
    for task in &seed.tasks {
        db.upsert_task(&TaskRecord {
            id: task.id,
            project_id: task.project_id,
            title: task.title.clone(),
            status: task.status.clone(),
        })?;
    }
    for leave in &seed.leaves {
        db.upsert_leave(&LeaveRecord {
            id: leave.id,
            user_id: leave.user_id,
            start: leave.start,
            end: leave.end,
            kind: leave.kind,
            status: leave.status,
        })?;
    }
    for request in &seed.fill_requests {
        db.upsert_fill_request(&FillRequestRecord {
            id: request.id,
            user_id: request.user_id,
            date: request.date,
            approved: request.approved,
        })?;
    }

    tracing::info!(
        teams = seed.teams.len(),
        users = seed.users.len(),
        projects = seed.projects.len(),
        "seed data loaded"
    );
    writeln!(writer, "database initialized")?;
    Ok(())
}
