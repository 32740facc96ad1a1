use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::Type;
use rusqlite::{Connection, OpenFlags, params};

use crate::models::{LegacyMeasurement, LegacyProfile};

/// Read access to the legacy store.
///
/// `count_eligible` and `fetch_page` must apply the same eligibility filter
/// and `fetch_page` must use a stable total order, otherwise offset paging
/// can skip or repeat profiles.
pub trait LegacySource {
    fn count_eligible(&self) -> Result<u64>;
    fn fetch_page(&self, offset: u64, page_size: usize) -> Result<Vec<LegacyProfile>>;
    fn fetch_measurements(&self, user_id: &str) -> Result<Vec<LegacyMeasurement>>;
}

/// Active users with a live Fitbit refresh token.
///
/// `WithingsLastAccess` is unix seconds; 1577836800 is 2020-01-01T00:00:00Z.
macro_rules! eligible_profiles {
    () => {
        "FROM TrendWeightProfiles p
         JOIN Memberships m ON p.UserId = m.UserId
         JOIN Users u ON m.UserId = u.UserId
         WHERE (p.FitbitLastSync >= '2020-01-01'
                OR p.WithingsLastAccess >= 1577836800
                OR m.LastLoginDate >= '2020-01-01')
           AND p.FitbitRefreshToken IS NOT NULL
           AND p.FitbitRefreshToken != ''"
    };
}

const COUNT_ELIGIBLE_SQL: &str = concat!("SELECT COUNT(*) ", eligible_profiles!());

const PAGE_SQL: &str = concat!(
    "SELECT p.UserId, u.UserName, m.Email, p.FirstName, p.UseMetric, p.StartDate,
            p.GoalWeight, p.PlannedPoundsPerWeek, p.DayStartOffset, p.PrivateUrlKey,
            p.DeviceType, p.FitbitRefreshToken ",
    eligible_profiles!(),
    " ORDER BY m.Email, p.UserId LIMIT ?1 OFFSET ?2"
);

const MEASUREMENTS_SQL: &str = "SELECT UserId, Timestamp, Weight, FatRatio
     FROM SourceMeasurements
     WHERE UserId = ?1
     ORDER BY Timestamp";

const REQUIRED_TABLES: [&str; 4] = [
    "TrendWeightProfiles",
    "Memberships",
    "Users",
    "SourceMeasurements",
];

/// Legacy store backed by a SQLite export of the production tables.
pub struct SqliteLegacySource {
    conn: Connection,
}

impl SqliteLegacySource {
    /// Open an existing export read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open legacy database: {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        for table in REQUIRED_TABLES {
            conn.prepare(&format!("SELECT * FROM {table} LIMIT 0"))
                .with_context(|| format!("Legacy database is missing table {table}"))?;
        }
        Ok(Self { conn })
    }

    // Expects columns:
    // 0: UserId, 1: UserName, 2: Email, 3: FirstName, 4: UseMetric, 5: StartDate,
    // 6: GoalWeight, 7: PlannedPoundsPerWeek, 8: DayStartOffset, 9: PrivateUrlKey,
    // 10: DeviceType, 11: FitbitRefreshToken
    fn profile_from_row(row: &rusqlite::Row) -> rusqlite::Result<LegacyProfile> {
        Ok(LegacyProfile {
            user_id: row.get(0)?,
            username: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            email: row.get(2)?,
            first_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            use_metric: row.get::<_, Option<bool>>(4)?.unwrap_or(false),
            start_date: timestamp_column(row, 5)?,
            goal_weight: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
            planned_pounds_per_week: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
            day_start_offset: row.get::<_, Option<i64>>(8)?.unwrap_or(0),
            private_url_key: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
            device_type: row.get(10)?,
            refresh_token: row.get(11)?,
        })
    }

    fn measurement_from_row(row: &rusqlite::Row) -> rusqlite::Result<LegacyMeasurement> {
        let timestamp = timestamp_column(row, 1)?.ok_or(rusqlite::Error::InvalidColumnType(
            1,
            "Timestamp".to_string(),
            Type::Null,
        ))?;
        Ok(LegacyMeasurement {
            user_id: row.get(0)?,
            timestamp,
            weight: row.get(2)?,
            // A zero ratio was never a real reading
            fat_ratio: row.get::<_, Option<f64>>(3)?.filter(|r| *r != 0.0),
        })
    }
}

impl LegacySource for SqliteLegacySource {
    fn count_eligible(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(COUNT_ELIGIBLE_SQL, [], |row| row.get(0))
            .context("Failed to count eligible legacy profiles")?;
        Ok(u64::try_from(count)?)
    }

    fn fetch_page(&self, offset: u64, page_size: usize) -> Result<Vec<LegacyProfile>> {
        let limit = i64::try_from(page_size)?;
        let offset = i64::try_from(offset)?;
        let mut stmt = self.conn.prepare_cached(PAGE_SQL)?;
        let profiles = stmt
            .query_map(params![limit, offset], Self::profile_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read legacy profiles at offset {offset}"))?;
        Ok(profiles)
    }

    fn fetch_measurements(&self, user_id: &str) -> Result<Vec<LegacyMeasurement>> {
        let mut stmt = self.conn.prepare_cached(MEASUREMENTS_SQL)?;
        let mut measurements = stmt
            .query_map(params![user_id], Self::measurement_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read measurements for user {user_id}"))?;
        // Text ordering breaks when space- and T-separated stamps are mixed
        measurements.sort_by_key(|m| m.timestamp);
        Ok(measurements)
    }
}

/// Parse a legacy `datetime` column as exported to text.
pub fn parse_legacy_timestamp(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN)))
}

fn timestamp_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| {
            parse_legacy_timestamp(&s)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        })
        .transpose()
}
