use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::destination::{DEFAULT_BATCH_SIZE, ProfileSink};
use crate::models::{CanonicalProfile, LegacyProfile, MigrationSummary, SampleRecord};
use crate::report::RunObserver;
use crate::source::LegacySource;
use crate::transform::{Transformed, skip_reason, transform};
use crate::validate::SkipReason;

pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct MigrationOptions {
    pub page_size: usize,
    pub batch_size: usize,
    /// Count and transform everything but leave the destination untouched.
    pub dry_run: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
        }
    }
}

/// Counters produced by one page, folded into the run's `MigrationSummary`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageOutcome {
    pub fetched: usize,
    pub processed: usize,
    pub skipped: usize,
    pub measurements: usize,
    pub batches_written: usize,
    pub rows_inserted: usize,
}

impl MigrationSummary {
    fn fold_page(&mut self, page: &PageOutcome) {
        self.pages_fetched += 1;
        self.processed += page.processed;
        self.skipped += page.skipped;
        self.total_measurements += page.measurements;
        self.batches_written += page.batches_written;
        self.rows_inserted += page.rows_inserted;
    }
}

/// Drives count → clear → page/transform/write until the source is exhausted.
///
/// Runs strictly sequentially. Any store error aborts the run and leaves the
/// destination with whatever the last successful batch wrote; rerunning
/// converges because each run starts by clearing the table.
pub struct Migrator<'a> {
    source: &'a dyn LegacySource,
    sink: &'a dyn ProfileSink,
    options: MigrationOptions,
    observer: Option<&'a mut dyn RunObserver>,
}

impl<'a> Migrator<'a> {
    pub fn new(
        source: &'a dyn LegacySource,
        sink: &'a dyn ProfileSink,
        options: MigrationOptions,
    ) -> Self {
        Self {
            source,
            sink,
            options,
            observer: None,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: &'a mut dyn RunObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn run(&mut self) -> Result<MigrationSummary> {
        anyhow::ensure!(self.options.page_size > 0, "page size must be at least 1");
        anyhow::ensure!(self.options.batch_size > 0, "batch size must be at least 1");

        let mut summary = MigrationSummary {
            dry_run: self.options.dry_run,
            ..MigrationSummary::default()
        };

        info!("counting eligible legacy profiles");
        summary.total_eligible = self.source.count_eligible()?;
        info!(
            total = summary.total_eligible,
            "found active legacy profiles with refresh tokens"
        );

        if summary.total_eligible == 0 {
            info!("no legacy profiles to migrate");
            return Ok(summary);
        }

        if self.options.dry_run {
            info!("dry run: destination will not be cleared or written");
        } else {
            info!("clearing destination table");
            summary.rows_cleared = self.sink.clear_all()?;
            info!(rows = summary.rows_cleared, "cleared destination table");
        }

        let page_size = self.options.page_size as u64;
        let mut offset: u64 = 0;
        while offset < summary.total_eligible {
            let page_number = offset / page_size + 1;
            info!(
                page = page_number,
                first = offset + 1,
                last = (offset + page_size).min(summary.total_eligible),
                "processing page"
            );

            let page = self.process_page(offset)?;
            if page.fetched == 0 {
                warn!(
                    offset,
                    total = summary.total_eligible,
                    "source returned an empty page before the expected count was reached"
                );
                break;
            }
            summary.fold_page(&page);
            offset += page_size;
        }

        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            measurements = summary.total_measurements,
            "migration complete"
        );
        Ok(summary)
    }

    /// Fetch, transform, and write one page.
    pub fn process_page(&mut self, offset: u64) -> Result<PageOutcome> {
        let profiles = self.source.fetch_page(offset, self.options.page_size)?;
        let mut outcome = PageOutcome {
            fetched: profiles.len(),
            ..PageOutcome::default()
        };
        if profiles.is_empty() {
            return Ok(outcome);
        }

        let mut extracted = Vec::with_capacity(profiles.len());
        for profile in &profiles {
            match skip_reason(profile) {
                Some(reason) => self.record_skip(profile, reason, &mut outcome)?,
                None => {
                    let measurements = self.source.fetch_measurements(&profile.user_id)?;
                    extracted.push((profile, measurements));
                }
            }
        }

        // Stamped at write time, after the page's extraction
        let now = Utc::now();
        let mut documents: Vec<CanonicalProfile> = Vec::with_capacity(extracted.len());
        for (profile, measurements) in &extracted {
            let document = match transform(profile, measurements, now) {
                Transformed::Migrated(document) => document,
                Transformed::Skipped(reason) => {
                    self.record_skip(profile, reason, &mut outcome)?;
                    continue;
                }
            };
            debug!(
                email = %document.email,
                measurements = document.measurements.len(),
                "transformed profile"
            );
            if let Some(observer) = self.observer.as_deref_mut() {
                observer.migrated(profile, &document)?;
            }
            outcome.measurements += document.measurements.len();
            outcome.processed += 1;
            documents.push(document);
        }

        if !self.options.dry_run {
            for (i, batch) in documents.chunks(self.options.batch_size).enumerate() {
                let accepted = self
                    .sink
                    .insert_batch(batch)
                    .with_context(|| format!("Failed to insert batch at offset {offset}"))?;
                info!(
                    batch = i + 1,
                    profiles = accepted,
                    measurements = batch.iter().map(|d| d.measurements.len()).sum::<usize>(),
                    "inserted batch"
                );
                outcome.batches_written += 1;
                outcome.rows_inserted += accepted;
            }
        }

        Ok(outcome)
    }

    fn record_skip(
        &mut self,
        profile: &LegacyProfile,
        reason: SkipReason,
        outcome: &mut PageOutcome,
    ) -> Result<()> {
        info!(
            email = profile.email.as_deref().unwrap_or(""),
            %reason,
            "skipping profile"
        );
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.skipped(profile, reason)?;
        }
        outcome.skipped += 1;
        Ok(())
    }
}

/// Read back one destination row and log its shape. Diagnostic only.
pub fn verify_sample(sink: &dyn ProfileSink) -> Result<Option<SampleRecord>> {
    let sample = sink.sample()?;
    match &sample {
        Some(s) => info!(
            email = %s.email,
            use_metric = s.use_metric,
            measurements = s.measurement_count,
            "sample profile"
        ),
        None => info!("no data found in destination table"),
    }
    Ok(sample)
}
