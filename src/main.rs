mod database;
mod error;
mod ingest;
mod pipeline;
mod transform;
mod utils;

use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use crate::database::repo::Loader;
use crate::database::schema;
use crate::pipeline::{process_data, LogFiles, RunContext, SongFiles};
use crate::utils::config::{load_config, save_to_env, EtlConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// KEY=VALUE file with path overrides
    #[arg(long, global = true, default_value = ".env")]
    config: PathBuf,

    #[arg(short, long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drop and recreate the five target tables, leaving them empty.
    CreateTables,
    /// Load the song catalog, then the event logs.
    Etl {
        #[arg(long)]
        song_data: Option<PathBuf>,

        #[arg(long)]
        log_data: Option<PathBuf>,

        /// Write the resolved paths back to the config file.
        #[arg(long)]
        save_config: bool,
    },
}

fn create_tables(config: &EtlConfig) -> Result<()> {
    info!("Provisioning store at {}", config.db_path.display());
    let conn = schema::open_for_provisioning(&config.db_path)?;
    schema::drop_tables(&conn).context("Failed to drop tables")?;
    schema::create_tables(&conn).context("Failed to create tables")?;
    info!("Created {} tables", schema::TABLES.len());
    Ok(())
}

fn run_etl(config: &EtlConfig) -> Result<()> {
    // Connection failures end the run before any file is touched.
    let mut loader = Loader::connect(&config.db_path)
        .with_context(|| format!("Run `create-tables` first for {}", config.db_path.display()))?;
    let mut ctx = RunContext::new(true);

    process_data(&mut ctx, &mut loader, &config.song_data, &SongFiles)
        .context("Song data phase failed")?;
    process_data(&mut ctx, &mut loader, &config.log_data, &LogFiles)
        .context("Log data phase failed")?;

    for report in ctx.reports() {
        info!(
            "{}: {}/{} files committed from {}, {} rows",
            report.pipeline,
            report.files_committed,
            report.files_found,
            report.root.display(),
            report.rows_written
        );
    }
    let failures: Vec<_> = ctx.failures().collect();
    let malformed = failures.iter().filter(|f| f.error.is_parse_error()).count();
    info!(
        "ETL finished: {} files committed, {} rows written, {} files failed ({} unreadable or malformed)",
        ctx.files_committed(),
        ctx.rows_written(),
        failures.len(),
        malformed
    );
    for failure in failures {
        warn!("- {} ({}): {}", failure.path.display(), failure.state, failure.error);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(db_path) = args.db_path {
        config.db_path = db_path;
    }

    match args.command {
        Command::CreateTables => create_tables(&config),
        Command::Etl {
            song_data,
            log_data,
            save_config,
        } => {
            if let Some(dir) = song_data {
                config.song_data = dir;
            }
            if let Some(dir) = log_data {
                config.log_data = dir;
            }
            if save_config {
                save_to_env(&args.config, &config)?;
                info!("Saved paths to {}", args.config.display());
            }

            info!("Sparkify ETL starting...");
            info!("DB: {}", config.db_path.display());
            let result = run_etl(&config);
            if let Err(e) = &result {
                error!("ETL aborted: {:#}", e);
            }
            result
        }
    }
}
