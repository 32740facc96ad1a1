use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

use tw_migrate_core::migrate::{MigrationOptions, Migrator, verify_sample};
use tw_migrate_core::report::ReportWriter;
use tw_migrate_core::source::SqliteLegacySource;

use super::helpers::{open_destination, print_sample, print_summary};
use crate::config::Config;

pub(crate) struct RunArgs {
    pub dry_run: bool,
    pub page_size: usize,
    pub batch_size: usize,
    pub sqlite_out: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub json: bool,
}

pub(crate) fn cmd_run(config: &Config, args: &RunArgs) -> Result<()> {
    let legacy_db = config.require_legacy_db()?;
    let sink = open_destination(config, args.sqlite_out.as_deref(), args.dry_run)?;
    let source = SqliteLegacySource::open(legacy_db)?;

    let mut report = args
        .report
        .as_ref()
        .map(|path| {
            File::create(path)
                .with_context(|| format!("Failed to create report: {}", path.display()))
                .map(ReportWriter::new)
        })
        .transpose()?;

    let options = MigrationOptions {
        page_size: args.page_size,
        batch_size: args.batch_size,
        dry_run: args.dry_run,
    };
    let summary = {
        let mut migrator = Migrator::new(&source, sink.as_ref(), options);
        if let Some(report) = report.as_mut() {
            migrator = migrator.with_observer(report);
        }
        migrator.run()?
    };

    let halved = match report {
        Some(report) => {
            let n = report.halved_count();
            report.finish()?;
            Some(n)
        }
        None => None,
    };

    let sample = if args.dry_run || summary.total_eligible == 0 {
        None
    } else {
        verify_sample(sink.as_ref()).unwrap_or_else(|e| {
            warn!("could not verify sample data: {e:#}");
            None
        })
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "summary": summary,
                "sample": sample,
                "planned_change_halved": halved,
            }))?
        );
        return Ok(());
    }

    if summary.total_eligible == 0 {
        println!("No legacy profiles found.");
        return Ok(());
    }

    if summary.dry_run {
        println!("Dry run — no changes made.\n");
    } else {
        println!("Migration completed successfully!\n");
    }
    print_summary(&summary);

    if let (Some(n), Some(path)) = (halved, args.report.as_ref()) {
        println!(
            "\nNote: goal weights were copied without unit conversion; planned weekly change was halved for {n} metric profile(s)."
        );
        println!("Review {} before switching consumers over.", path.display());
    }

    if !summary.dry_run {
        println!("\nVerifying migration by checking first profile...");
        print_sample(sample.as_ref());
    }

    Ok(())
}
