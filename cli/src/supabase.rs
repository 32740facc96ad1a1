use anyhow::{Context, Result, bail};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use tw_migrate_core::destination::ProfileSink;
use tw_migrate_core::models::{CanonicalMeasurement, CanonicalProfile, SampleRecord};

use crate::config::SupabaseConfig;

pub const LEGACY_PROFILES_TABLE: &str = "legacy_profiles";

/// PostgREST requires a filter on DELETE; every row has a `created_at` after this.
const DELETE_ALL_FILTER: (&str, &str) = ("created_at", "gte.1970-01-01");

#[derive(Debug, Deserialize)]
struct SampleRow {
    email: String,
    use_metric: bool,
    #[serde(default)]
    measurements: Vec<CanonicalMeasurement>,
}

/// Destination writer for the Supabase `legacy_profiles` table over its REST API.
pub struct SupabaseClient {
    client: reqwest::Client,
    table_url: String,
    service_key: String,
    rt: tokio::runtime::Handle,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("tw-migrate/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        let rt = tokio::runtime::Handle::try_current()
            .context("Supabase client must be created inside a tokio runtime")?;
        Ok(Self {
            client,
            table_url: format!("{}/rest/v1/{LEGACY_PROFILES_TABLE}", config.url),
            service_key: config.service_key.clone(),
            rt,
        })
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.client
            .request(method, &self.table_url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    pub async fn clear_all_async(&self) -> Result<usize> {
        let resp = self
            .request(Method::DELETE)
            .query(&[DELETE_ALL_FILTER, ("select", "email")])
            .header("Prefer", "return=representation")
            .send()
            .await
            .context("Failed to reach Supabase")?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            warn!("{LEGACY_PROFILES_TABLE} not found while clearing, treating as empty");
            return Ok(0);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Failed to clear {LEGACY_PROFILES_TABLE} ({status}): {body}");
        }

        let deleted: Vec<serde_json::Value> = resp
            .json()
            .await
            .context("Failed to parse Supabase delete response")?;
        Ok(deleted.len())
    }

    pub async fn insert_batch_async(&self, profiles: &[CanonicalProfile]) -> Result<usize> {
        if profiles.is_empty() {
            return Ok(0);
        }
        let resp = self
            .request(Method::POST)
            .query(&[("select", "email")])
            .header("Prefer", "return=representation")
            .json(profiles)
            .send()
            .await
            .context("Failed to reach Supabase")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "Failed to insert {} profiles into {LEGACY_PROFILES_TABLE} ({status}): {body}",
                profiles.len()
            );
        }

        let inserted: Vec<serde_json::Value> = resp
            .json()
            .await
            .context("Failed to parse Supabase insert response")?;
        debug!(sent = profiles.len(), accepted = inserted.len(), "insert response");
        Ok(inserted.len())
    }

    pub async fn sample_async(&self) -> Result<Option<SampleRecord>> {
        let resp = self
            .request(Method::GET)
            .query(&[("select", "email,use_metric,measurements"), ("limit", "1")])
            .send()
            .await
            .context("Failed to reach Supabase")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Failed to read {LEGACY_PROFILES_TABLE} ({status}): {body}");
        }

        let rows: Vec<SampleRow> = resp
            .json()
            .await
            .context("Failed to parse Supabase sample response")?;
        Ok(rows.into_iter().next().map(|row| SampleRecord {
            email: row.email,
            use_metric: row.use_metric,
            measurement_count: row.measurements.len(),
            first_measurement: row.measurements.into_iter().next(),
        }))
    }
}

/// Blocking bridge for the migration pipeline. Must be called off the async
/// runtime's worker threads (e.g. from `spawn_blocking`).
impl ProfileSink for SupabaseClient {
    fn clear_all(&self) -> Result<usize> {
        self.rt.block_on(self.clear_all_async())
    }

    fn insert_batch(&self, profiles: &[CanonicalProfile]) -> Result<usize> {
        self.rt.block_on(self.insert_batch_async(profiles))
    }

    fn sample(&self) -> Result<Option<SampleRecord>> {
        self.rt.block_on(self.sample_async())
    }
}
