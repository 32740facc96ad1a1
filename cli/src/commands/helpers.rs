use std::path::Path;

use anyhow::{Context, Result};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use tw_migrate_core::destination::{ProfileSink, SqliteProfileStore};
use tw_migrate_core::models::{MigrationSummary, SampleRecord};

use crate::config::Config;
use crate::supabase::SupabaseClient;

/// Pick the destination for a run: a local SQLite file when given, Supabase otherwise.
///
/// Configuration is checked here, before any store is opened.
pub(crate) fn open_destination(
    config: &Config,
    sqlite_out: Option<&Path>,
    allow_scratch: bool,
) -> Result<Box<dyn ProfileSink>> {
    if let Some(path) = sqlite_out {
        return Ok(Box::new(SqliteProfileStore::open(path)?));
    }
    match config.require_supabase() {
        Ok(supabase) => Ok(Box::new(SupabaseClient::new(supabase)?)),
        // Dry runs never write, so a throwaway store stands in
        Err(_) if allow_scratch => Ok(Box::new(SqliteProfileStore::open_in_memory()?)),
        Err(e) => Err(e).context("No destination configured (set Supabase variables or pass --sqlite-out)"),
    }
}

pub(crate) fn print_summary(summary: &MigrationSummary) {
    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "")]
        label: &'static str,
        #[tabled(rename = "Count")]
        value: String,
    }

    let mut rows = vec![
        Row {
            label: "Eligible profiles",
            value: summary.total_eligible.to_string(),
        },
        Row {
            label: "Pages fetched",
            value: summary.pages_fetched.to_string(),
        },
        Row {
            label: "Profiles migrated",
            value: summary.processed.to_string(),
        },
        Row {
            label: "Profiles skipped (invalid email)",
            value: summary.skipped.to_string(),
        },
        Row {
            label: "Total measurements",
            value: summary.total_measurements.to_string(),
        },
    ];
    if !summary.dry_run {
        rows.push(Row {
            label: "Rows cleared",
            value: summary.rows_cleared.to_string(),
        });
        rows.push(Row {
            label: "Batches written",
            value: summary.batches_written.to_string(),
        });
        rows.push(Row {
            label: "Rows inserted",
            value: summary.rows_inserted.to_string(),
        });
    }

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_sample(sample: Option<&SampleRecord>) {
    let Some(s) = sample else {
        println!("  No data found in legacy_profiles table");
        return;
    };
    println!("  Sample profile: {}", s.email);
    println!("  Use Metric:     {}", s.use_metric);
    println!("  Measurements:   {}", s.measurement_count);
    if let Some(m) = &s.first_measurement {
        let fat = m
            .fat_ratio
            .map(|r| format!(", fat {:.1}%", r * 100.0))
            .unwrap_or_default();
        println!(
            "  First measurement: {} {} {:.2} kg{fat}",
            m.date, m.time, m.weight
        );
    }
}
