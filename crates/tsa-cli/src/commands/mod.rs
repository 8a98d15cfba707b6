//! CLI subcommand implementations.

pub mod delete;
pub mod init;
pub mod reconcile;
pub mod report;
pub mod review;
pub mod send;
pub mod submit;

use anyhow::{Context, Result, bail};
use tsa_core::Actor;
use tsa_db::Database;

/// Resolves an acting user id to an [`Actor`], refusing inactive users.
pub fn actor(db: &Database, user_id: i64) -> Result<Actor> {
    let user = db
        .user(user_id)
        .with_context(|| format!("failed to load user {user_id}"))?;
    if !user.active {
        bail!("user {user_id} is deactivated");
    }
    Ok(Actor::new(user.id, user.role))
}
