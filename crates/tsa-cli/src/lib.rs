//! Timesheet approvals CLI library.
//!
//! This crate provides the `tsa` command-line interface over the
//! approval workflow in `tsa-db`.

mod cli;
pub mod commands;
mod config;
mod sink;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use sink::LogSink;
