use std::path::Path;

use anyhow::Result;

use tw_migrate_core::migrate::verify_sample;

use super::helpers::{open_destination, print_sample};
use crate::config::Config;

pub(crate) fn cmd_verify(config: &Config, sqlite_out: Option<&Path>, json: bool) -> Result<()> {
    let sink = open_destination(config, sqlite_out, false)?;
    let sample = verify_sample(sink.as_ref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sample)?);
    } else {
        print_sample(sample.as_ref());
    }

    Ok(())
}
