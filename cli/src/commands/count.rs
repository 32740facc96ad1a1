use anyhow::Result;

use tw_migrate_core::source::{LegacySource, SqliteLegacySource};

use crate::config::Config;

pub(crate) fn cmd_count(config: &Config, json: bool) -> Result<()> {
    let source = SqliteLegacySource::open(config.require_legacy_db()?)?;
    let total = source.count_eligible()?;

    if json {
        println!("{}", serde_json::json!({ "eligible": total }));
    } else {
        println!("Found {total} active legacy profiles with refresh tokens to migrate");
    }

    Ok(())
}
