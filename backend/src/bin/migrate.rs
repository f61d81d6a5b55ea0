//! Apply pending database migrations and exit.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::env;

use clap::Parser;
use color_eyre::eyre::{Context, Result, eyre};
use tokio::runtime::Builder;

use cervello::outbound::persistence::run_pending_migrations;

const DATABASE_URL_ENV: &str = "CERVELLO_DATABASE_URL";

/// `cervello-migrate` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cervello-migrate",
    about = "Apply pending schema migrations to the Cervello database",
    version
)]
struct CliArgs {
    /// Database connection URL. Falls back to `CERVELLO_DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = CliArgs::parse();
    let database_url = args
        .database_url
        .or_else(|| env::var(DATABASE_URL_ENV).ok())
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| eyre!("pass --database-url or set {DATABASE_URL_ENV}"))?;

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("create Tokio runtime")?;
    let applied = runtime
        .block_on(run_pending_migrations(&database_url))
        .wrap_err("apply migrations")?;

    if applied.is_empty() {
        println!("schema is up to date");
    }
    for version in applied {
        println!("applied {version}");
    }
    Ok(())
}
