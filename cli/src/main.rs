mod commands;
mod config;
mod supabase;

use anyhow::Result;
use clap::builder::TypedValueParser as _;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{RunArgs, cmd_count, cmd_run, cmd_verify};
use crate::config::Config;
use tw_migrate_core::destination::DEFAULT_BATCH_SIZE;
use tw_migrate_core::migrate::DEFAULT_PAGE_SIZE;

#[derive(Parser)]
#[command(
    name = "tw-migrate",
    version,
    about = "Migrate legacy TrendWeight profiles and measurements into legacy_profiles",
    long_about = "Reads active legacy profiles (recent activity and a Fitbit refresh token) from \
                  LEGACY_DB_PATH, converts weights to kilograms and dates to ISO strings, and \
                  replaces the contents of the Supabase legacy_profiles table.\n\n\
                  Configuration comes from the environment or a .env file: LEGACY_DB_PATH, \
                  Supabase__Url, Supabase__ServiceKey."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clear the destination table and migrate every eligible profile
    Run {
        /// Count and transform without clearing or writing the destination
        #[arg(long)]
        dry_run: bool,
        /// Profiles fetched from the legacy store per page
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..).map(|v| v as usize))]
        page_size: usize,
        /// Maximum documents per insert request
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = clap::value_parser!(u32).range(1..).map(|v| v as usize))]
        batch_size: usize,
        /// Write to a local SQLite file instead of Supabase
        #[arg(long, value_name = "PATH")]
        sqlite_out: Option<PathBuf>,
        /// Write a per-profile CSV verification report
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Count eligible legacy profiles without migrating anything
    Count {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read back one migrated profile from the destination
    Verify {
        /// Check a local SQLite file instead of Supabase
        #[arg(long, value_name = "PATH")]
        sqlite_out: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // The pipeline is synchronous; the Supabase client bridges back into this
    // runtime with block_on, which is only allowed off the worker threads.
    let outcome = tokio::task::spawn_blocking(move || run(cli)).await;

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: migration task failed: {e}");
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;

    match cli.command {
        Commands::Run {
            dry_run,
            page_size,
            batch_size,
            sqlite_out,
            report,
            json,
        } => cmd_run(
            &config,
            &RunArgs {
                dry_run,
                page_size,
                batch_size,
                sqlite_out,
                report,
                json,
            },
        ),
        Commands::Count { json } => cmd_count(&config, json),
        Commands::Verify { sqlite_out, json } => cmd_verify(&config, sqlite_out.as_deref(), json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["tw-migrate", "run"]).unwrap();
        let Commands::Run {
            dry_run,
            page_size,
            batch_size,
            sqlite_out,
            report,
            json,
        } = cli.command
        else {
            panic!("expected run");
        };
        assert!(!dry_run);
        assert_eq!(page_size, 100);
        assert_eq!(batch_size, 100);
        assert!(sqlite_out.is_none());
        assert!(report.is_none());
        assert!(!json);
    }

    #[test]
    fn test_run_rejects_zero_page_size() {
        assert!(Cli::try_parse_from(["tw-migrate", "run", "--page-size", "0"]).is_err());
        assert!(Cli::try_parse_from(["tw-migrate", "run", "--batch-size", "0"]).is_err());
    }

    #[test]
    fn test_run_sizes_parse_as_usize() {
        let cli = Cli::try_parse_from([
            "tw-migrate",
            "run",
            "--page-size",
            "250",
            "--batch-size",
            "40",
        ])
        .unwrap();
        let Commands::Run {
            page_size,
            batch_size,
            ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(page_size, 250);
        assert_eq!(batch_size, 40);
    }

    #[test]
    fn test_verify_with_sqlite_out() {
        let cli =
            Cli::try_parse_from(["tw-migrate", "verify", "--sqlite-out", "out.db", "--json"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Verify {
                sqlite_out: Some(_),
                json: true
            }
        ));
    }
}
