use std::path::{Path, PathBuf};

use thiserror::Error;

pub const LEGACY_DB_PATH: &str = "LEGACY_DB_PATH";
pub const SUPABASE_URL: &str = "Supabase__Url";
pub const SUPABASE_SERVICE_KEY: &str = "Supabase__ServiceKey";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),
    #[error("Missing Supabase environment variables. Required: Supabase__Url, Supabase__ServiceKey")]
    MissingSupabase,
    #[error("Supabase__Url must be an http(s) URL, got '{0}'")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub legacy_db_path: Option<PathBuf>,
    pub supabase: Option<SupabaseConfig>,
}

impl Config {
    /// Read configuration from the process environment, after loading `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; real variables still apply.
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let legacy_db_path = get(LEGACY_DB_PATH).map(PathBuf::from);

        let supabase = match (get(SUPABASE_URL), get(SUPABASE_SERVICE_KEY)) {
            (Some(url), Some(service_key)) => {
                if !(url.starts_with("https://") || url.starts_with("http://")) {
                    return Err(ConfigError::InvalidUrl(url));
                }
                Some(SupabaseConfig {
                    url: url.trim_end_matches('/').to_string(),
                    service_key,
                })
            }
            _ => None,
        };

        Ok(Config {
            legacy_db_path,
            supabase,
        })
    }

    /// Legacy export path, required by the commands that read the legacy store.
    pub fn require_legacy_db(&self) -> Result<&Path, ConfigError> {
        self.legacy_db_path
            .as_deref()
            .ok_or(ConfigError::Missing(LEGACY_DB_PATH))
    }

    /// Supabase settings, required whenever the run writes to Supabase.
    pub fn require_supabase(&self) -> Result<&SupabaseConfig, ConfigError> {
        self.supabase.as_ref().ok_or(ConfigError::MissingSupabase)
    }
}
