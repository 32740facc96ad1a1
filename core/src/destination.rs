use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::models::{CanonicalProfile, SampleRecord};

/// Maximum documents per insert call; keeps requests under API size limits.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Write access to the destination `legacy_profiles` table.
pub trait ProfileSink {
    /// Delete every row. An already-empty table is not an error.
    fn clear_all(&self) -> Result<usize>;
    /// Insert one batch and return how many rows were accepted.
    fn insert_batch(&self, profiles: &[CanonicalProfile]) -> Result<usize>;
    /// Read back one arbitrary row, if any.
    fn sample(&self) -> Result<Option<SampleRecord>>;
}

#[must_use]
pub fn sample_from_profile(profile: &CanonicalProfile) -> SampleRecord {
    SampleRecord {
        email: profile.email.clone(),
        use_metric: profile.use_metric,
        measurement_count: profile.measurements.len(),
        first_measurement: profile.measurements.first().cloned(),
    }
}

/// Local SQLite copy of the destination table, used to rehearse a run.
pub struct SqliteProfileStore {
    conn: Connection,
}

impl SqliteProfileStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open destination database: {}", path.display()))?;
        let store = SqliteProfileStore { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteProfileStore { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS legacy_profiles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT NOT NULL,
                    use_metric INTEGER NOT NULL,
                    document TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_legacy_profiles_email ON legacy_profiles(email);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM legacy_profiles", [], |row| row.get(0))?;
        Ok(usize::try_from(n)?)
    }

    /// All stored documents in insertion order.
    pub fn all_profiles(&self) -> Result<Vec<CanonicalProfile>> {
        let mut stmt = self
            .conn
            .prepare("SELECT document FROM legacy_profiles ORDER BY id")?;
        let docs = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        docs.iter()
            .map(|d| serde_json::from_str(d).context("Corrupt document in legacy_profiles"))
            .collect()
    }
}

impl ProfileSink for SqliteProfileStore {
    fn clear_all(&self) -> Result<usize> {
        let deleted = self.conn.execute("DELETE FROM legacy_profiles", [])?;
        Ok(deleted)
    }

    fn insert_batch(&self, profiles: &[CanonicalProfile]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO legacy_profiles (email, use_metric, document, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for profile in profiles {
                let document = serde_json::to_string(profile)?;
                inserted += stmt.execute(params![
                    profile.email,
                    profile.use_metric,
                    document,
                    profile.created_at
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn sample(&self) -> Result<Option<SampleRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT document FROM legacy_profiles LIMIT 1")?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            let document: String = row.get(0)?;
            let profile: CanonicalProfile = serde_json::from_str(&document)
                .context("Corrupt document in legacy_profiles")?;
            Ok(Some(sample_from_profile(&profile)))
        } else {
            Ok(None)
        }
    }
}
