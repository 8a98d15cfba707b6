use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tsa_cli::commands::{delete, init, reconcile, report, review, send, submit};
use tsa_cli::{Cli, Commands, Config, LogSink};
use tsa_core::Minutes;

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(tsa_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = tsa_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Some(Commands::Init { seed }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            init::run(&mut stdout, &db, seed.as_deref())?;
        }
        Some(Commands::Submit { actor, file, date }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            let today = date.unwrap_or_else(|| Local::now().date_naive());
            submit::run(&mut stdout, &mut db, *actor, file.as_deref(), today, &LogSink)?;
        }
        Some(Commands::Send { actor, ids }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            send::run(&mut stdout, &mut db, *actor, ids)?;
        }
        Some(Commands::Review {
            actor,
            decision,
            ids,
        }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            review::run(&mut stdout, &mut db, *actor, decision, ids, &LogSink)?;
        }
        Some(Commands::Delete { actor, id }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            delete::run(&mut stdout, &mut db, *actor, id)?;
        }
        Some(Commands::Reconcile { actor, project }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            reconcile::run(&mut stdout, &mut db, *actor, *project)?;
        }
        Some(Commands::Report { user, from, to }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            report::run(
                &mut stdout,
                &db,
                *user,
                *from,
                *to,
                Minutes::new(config.expected_day_minutes),
            )?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    stdout.flush()?;
    Ok(())
}
