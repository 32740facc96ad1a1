use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A TrendWeight profile as stored in the legacy database.
///
/// Built from a source row at the read boundary; nothing downstream sees the
/// driver's row type.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyProfile {
    pub user_id: String,
    pub username: String,
    pub email: Option<String>,
    pub first_name: String,
    pub use_metric: bool,
    pub start_date: Option<NaiveDateTime>,
    /// Kilograms regardless of `use_metric`. 0 means "not set".
    pub goal_weight: f64,
    /// Always pounds per week, regardless of `use_metric`.
    pub planned_pounds_per_week: f64,
    pub day_start_offset: i64,
    pub private_url_key: String,
    pub device_type: Option<String>,
    pub refresh_token: Option<String>,
}

/// A single scale reading from the legacy `SourceMeasurements` table.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyMeasurement {
    pub user_id: String,
    /// Local wall-clock time, no timezone.
    pub timestamp: NaiveDateTime,
    /// Pounds or kilograms depending on the owning profile's metric flag.
    pub weight: f64,
    pub fat_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMeasurement {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Time")]
    pub time: String,
    /// Always kilograms.
    #[serde(rename = "Weight")]
    pub weight: f64,
    #[serde(rename = "FatRatio")]
    pub fat_ratio: Option<f64>,
}

/// The document written to the `legacy_profiles` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalProfile {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub use_metric: bool,
    pub start_date: Option<String>,
    pub goal_weight: Option<f64>,
    pub planned_pounds_per_week: f64,
    pub day_start_offset: i64,
    pub private_url_key: String,
    pub device_type: Option<String>,
    pub refresh_token: Option<String>,
    pub measurements: Vec<CanonicalMeasurement>,
    pub created_at: String,
    pub updated_at: String,
}

/// Counters for a migration run, folded from one `PageOutcome` per page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    pub total_eligible: u64,
    pub pages_fetched: usize,
    pub batches_written: usize,
    pub processed: usize,
    pub skipped: usize,
    pub total_measurements: usize,
    pub rows_cleared: usize,
    pub rows_inserted: usize,
    pub dry_run: bool,
}

/// What the post-run spot check read back from the destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRecord {
    pub email: String,
    pub use_metric: bool,
    pub measurement_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_measurement: Option<CanonicalMeasurement>,
}
