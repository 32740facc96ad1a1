//! Per-profile CSV report for checking a migration by hand.
//!
//! Goal weights are copied as-is while the planned weekly change is halved
//! for metric users. The `planned_halved` column marks every row where that
//! asymmetry changed the stored value so it can be reviewed.

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::{CanonicalProfile, LegacyProfile};
use crate::validate::SkipReason;

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    email: &'a str,
    status: &'static str,
    skip_reason: &'static str,
    use_metric: bool,
    source_goal_weight: f64,
    goal_weight: Option<f64>,
    source_planned_per_week: f64,
    planned_per_week: Option<f64>,
    planned_halved: bool,
    measurements: usize,
}

/// Receives one callback per fetched profile during a run.
pub trait RunObserver {
    fn migrated(&mut self, source: &LegacyProfile, document: &CanonicalProfile) -> Result<()>;
    fn skipped(&mut self, source: &LegacyProfile, reason: SkipReason) -> Result<()>;
}

pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
    halved: usize,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
            rows: 0,
            halved: 0,
        }
    }

    /// Rows where the metric halving was applied.
    #[must_use]
    pub fn halved_count(&self) -> usize {
        self.halved
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush().context("Failed to flush report")?;
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to finish report: {}", e.error()))
    }

    fn write_row(&mut self, row: &ReportRow<'_>) -> Result<()> {
        self.writer
            .serialize(row)
            .context("Failed to write report row")?;
        self.rows += 1;
        if row.planned_halved {
            self.halved += 1;
        }
        Ok(())
    }
}

impl<W: Write> RunObserver for ReportWriter<W> {
    fn migrated(&mut self, source: &LegacyProfile, document: &CanonicalProfile) -> Result<()> {
        let planned_halved = document.use_metric && source.planned_pounds_per_week != 0.0;
        self.write_row(&ReportRow {
            email: &document.email,
            status: "migrated",
            skip_reason: "",
            use_metric: document.use_metric,
            source_goal_weight: source.goal_weight,
            goal_weight: document.goal_weight,
            source_planned_per_week: source.planned_pounds_per_week,
            planned_per_week: Some(document.planned_pounds_per_week),
            planned_halved,
            measurements: document.measurements.len(),
        })
    }

    fn skipped(&mut self, source: &LegacyProfile, reason: SkipReason) -> Result<()> {
        self.write_row(&ReportRow {
            email: source.email.as_deref().unwrap_or(""),
            status: "skipped",
            skip_reason: reason.as_str(),
            use_metric: source.use_metric,
            source_goal_weight: source.goal_weight,
            goal_weight: None,
            source_planned_per_week: source.planned_pounds_per_week,
            planned_per_week: None,
            planned_halved: false,
            measurements: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::build_canonical;
    use chrono::{TimeZone, Utc};

    fn legacy(email: Option<&str>, use_metric: bool, planned: f64) -> LegacyProfile {
        LegacyProfile {
            user_id: "u1".to_string(),
            username: String::new(),
            email: email.map(str::to_string),
            first_name: String::new(),
            use_metric,
            start_date: None,
            goal_weight: 75.0,
            planned_pounds_per_week: planned,
            day_start_offset: 0,
            private_url_key: String::new(),
            device_type: None,
            refresh_token: Some("tok".to_string()),
        }
    }

    #[test]
    fn test_report_rows() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut report = ReportWriter::new(Vec::new());

        let metric = legacy(Some("m@example.com"), true, 1.3);
        report
            .migrated(&metric, &build_canonical(&metric, &[], now))
            .unwrap();
        let imperial = legacy(Some("i@example.com"), false, 1.3);
        report
            .migrated(&imperial, &build_canonical(&imperial, &[], now))
            .unwrap();
        let bad = legacy(Some("nope"), false, 1.0);
        report.skipped(&bad, SkipReason::MalformedEmail).unwrap();

        assert_eq!(report.row_count(), 3);
        assert_eq!(report.halved_count(), 1);

        let out = String::from_utf8(report.finish().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[0],
            "email,status,skip_reason,use_metric,source_goal_weight,goal_weight,\
             source_planned_per_week,planned_per_week,planned_halved,measurements"
        );
        assert_eq!(lines[1], "m@example.com,migrated,,true,75.0,75.0,1.3,0.75,true,0");
        assert_eq!(lines[2], "i@example.com,migrated,,false,75.0,75.0,1.3,1.5,false,0");
        assert_eq!(lines[3], "nope,skipped,malformed_email,false,75.0,,1.0,,false,0");
    }

    #[test]
    fn test_zero_planned_change_not_flagged() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut report = ReportWriter::new(Vec::new());
        let metric = legacy(Some("m@example.com"), true, 0.0);
        report
            .migrated(&metric, &build_canonical(&metric, &[], now))
            .unwrap();
        assert_eq!(report.halved_count(), 0);
    }
}
