//! Sequential harvest pipeline.
//!
//! This module provides the [`HarvestPipeline`] coordinator that executes
//! the run's stages (Listing → Dedup → Extraction → Append) with:
//! - Strictly sequential execution, one page in flight at a time
//! - Per-URL failure isolation during extraction
//! - Structured logging via `tracing`
//! - Per-stage timing collected into [`HarvestStats`]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::HarvestConfig;
use crate::fetch::{FetchError, PageFetcher};
use crate::harvest::extract::{DetailExtractor, ExtractError};
use crate::harvest::listing::ListingFetcher;
use crate::harvest::table::{RecordTable, TableError};
use crate::model::keys;

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Errors that abort a harvest run.
///
/// A failing detail page does **not** abort the run; it lands in
/// [`HarvestReport::failures`] instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The index page could not be retrieved.
    #[error("Listing fetch failed: {0}")]
    Listing(#[from] FetchError),

    /// The listing pattern failed to compile.
    #[error("Invalid listing pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The extractor's selectors or patterns failed to compile.
    #[error("Extractor setup failed: {0}")]
    Extractor(#[from] ExtractError),

    /// The record table could not be read or written.
    #[error("Record table error: {0}")]
    Table(#[from] TableError),
}

// ============================================================================
// Report Types
// ============================================================================

/// One detail page that could not be processed this run.
///
/// The URL stays absent from the table, so the next run picks it up again.
#[derive(Debug, Clone, Serialize)]
pub struct UrlFailure {
    pub url: String,
    pub reason: String,
}

/// Timing of one run's stages.
#[derive(Debug, Default, Clone, Serialize)]
pub struct HarvestStats {
    /// Time spent fetching and scanning the index page (milliseconds)
    pub listing_duration_ms: u64,

    /// Time spent fetching and extracting detail pages (milliseconds)
    pub extraction_duration_ms: u64,

    /// Time spent appending to the record table (milliseconds)
    pub write_duration_ms: u64,

    /// Total time for the entire run (milliseconds)
    pub total_duration_ms: u64,
}

/// Outcome of one harvest run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct HarvestReport {
    /// URLs discovered on the index page, before any truncation
    pub discovered: usize,

    /// URLs skipped because the table already held them
    pub already_seen: usize,

    /// Records appended to the table this run
    pub records_written: usize,

    /// Detail pages that failed and were skipped
    pub failures: Vec<UrlFailure>,

    /// Per-stage timing
    pub stats: HarvestStats,
}

// ============================================================================
// Pipeline Coordinator
// ============================================================================

/// Coordinates one harvest run.
///
/// The stages run strictly in order; the only shared state is the in-memory
/// URL set and the record batch for the current run. The pipeline borrows
/// the fetcher for both the index page and the detail pages, so one HTTP
/// client serves the whole run.
pub struct HarvestPipeline {
    config: HarvestConfig,
    fetcher: Arc<dyn PageFetcher>,
    listing: ListingFetcher,
    extractor: DetailExtractor,
    table: RecordTable,
}

impl HarvestPipeline {
    /// Wires the stages from a configuration and a fetcher.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the listing pattern or the extractor's
    /// selectors fail to compile.
    pub fn new(
        config: HarvestConfig,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self, PipelineError> {
        let listing = ListingFetcher::new(Arc::clone(&fetcher))?;
        let extractor = DetailExtractor::new()?;
        let table = RecordTable::new(config.table_path.clone());

        Ok(Self {
            config,
            fetcher,
            listing,
            extractor,
            table,
        })
    }

    /// Executes one run: listing fetch → dedup → extraction → append.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the index fetch, the table read or the
    /// table write fails. Individual detail-page failures are collected in
    /// the report instead.
    pub async fn run(&self) -> Result<HarvestReport, PipelineError> {
        let start = Instant::now();
        let mut stats = HarvestStats::default();

        // ====================================================================
        // Stage 1: Listing
        // ====================================================================

        let listing_start = Instant::now();
        let all_links = self
            .listing
            .fetch_listing_urls(&self.config.index_url)
            .await?;
        stats.listing_duration_ms = listing_start.elapsed().as_millis() as u64;

        let discovered = all_links.len();

        // Dev mode throttles before dedup, matching the board's manual
        // testing workflow. The sample is drawn from an unordered set.
        let sampled = if self.config.dev_mode {
            let sampled = sample_for_development(all_links, self.config.sample_limit);
            info!(
                discovered = discovered,
                sampled = sampled.len(),
                "Dev mode: truncated listing set"
            );
            sampled
        } else {
            all_links
        };

        // ====================================================================
        // Stage 2: Dedup
        // ====================================================================

        let existing = self.table.existing_urls()?;
        let work_list: Vec<String> = sampled.difference(&existing).cloned().collect();
        let already_seen = sampled.len() - work_list.len();

        info!(
            discovered = discovered,
            already_seen = already_seen,
            to_process = work_list.len(),
            "Deduplicated listing URLs"
        );

        // ====================================================================
        // Stage 3: Extraction
        // ====================================================================

        let extraction_start = Instant::now();
        let mut records = Vec::with_capacity(work_list.len());
        let mut failures = Vec::new();

        for url in &work_list {
            match self.fetcher.fetch_text(url).await {
                Ok(body) => {
                    let mut record = self.extractor.extract(&body);
                    record.insert(keys::URL, url.clone());
                    records.push(record);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Detail page failed, skipping");
                    failures.push(UrlFailure {
                        url: url.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        stats.extraction_duration_ms = extraction_start.elapsed().as_millis() as u64;

        // ====================================================================
        // Stage 4: Append
        // ====================================================================

        let write_start = Instant::now();
        self.table.append(&records)?;
        stats.write_duration_ms = write_start.elapsed().as_millis() as u64;

        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        info!(
            written = records.len(),
            failed = failures.len(),
            duration_ms = stats.total_duration_ms,
            "Harvest run completed"
        );

        Ok(HarvestReport {
            discovered,
            already_seen,
            records_written: records.len(),
            failures,
            stats,
        })
    }
}

/// Truncates the fetched set to at most `limit` members. Order is whatever
/// the set iterator yields.
fn sample_for_development(links: HashSet<String>, limit: usize) -> HashSet<String> {
    links.into_iter().take(limit).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    // Mock fetcher serving canned pages; unknown URLs answer 404.
    struct MockFetcher {
        pages: HashMap<String, String>,
    }

    impl MockFetcher {
        fn new(pages: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl PageFetcher for MockFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    status: reqwest::StatusCode::NOT_FOUND,
                    url: url.to_string(),
                })
        }
    }

    const INDEX_URL: &str = "https://www.meesterbaan.nl/vacatures/basisonderwijs/onderwijzend/p-99";

    fn temp_table_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "harvest_pipeline_{}_{}_{}.csv",
            label,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos()
        ))
    }

    fn config(table_path: &Path) -> HarvestConfig {
        HarvestConfig::new()
            .with_index_url(INDEX_URL)
            .with_table_path(table_path)
    }

    fn detail_page(title: &str) -> String {
        format!(r#"<html><body><h1 class="mt-3 mt-md-0">{title}</h1></body></html>"#)
    }

    #[tokio::test]
    async fn test_full_run_appends_new_records() {
        let table_path = temp_table_path("full_run");
        let index_body = r#"
            <a href="https://www.meesterbaan.nl/vacature/1">a</a>
            <a href="https://www.meesterbaan.nl/vacature/2">b</a>
        "#;
        let fetcher = MockFetcher::new(&[
            (INDEX_URL, index_body),
            ("https://www.meesterbaan.nl/vacature/1", &detail_page("Leerkracht")),
            ("https://www.meesterbaan.nl/vacature/2", &detail_page("Invaller")),
        ]);

        let pipeline = HarvestPipeline::new(config(&table_path), fetcher).unwrap();
        let report = pipeline.run().await.unwrap();

        assert_eq!(report.discovered, 2);
        assert_eq!(report.already_seen, 0);
        assert_eq!(report.records_written, 2);
        assert!(report.failures.is_empty());

        let content = std::fs::read_to_string(&table_path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.lines().next().unwrap().contains("URL"));
        assert!(content.contains("https://www.meesterbaan.nl/vacature/1"));
        assert!(content.contains("Leerkracht"));

        std::fs::remove_file(&table_path).ok();
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let table_path = temp_table_path("idempotent");
        let index_body = r#"<a href="https://www.meesterbaan.nl/vacature/7">x</a>"#;
        let fetcher = MockFetcher::new(&[
            (INDEX_URL, index_body),
            ("https://www.meesterbaan.nl/vacature/7", &detail_page("Leerkracht")),
        ]);

        let pipeline = HarvestPipeline::new(config(&table_path), fetcher).unwrap();

        let first = pipeline.run().await.unwrap();
        assert_eq!(first.records_written, 1);

        let second = pipeline.run().await.unwrap();
        assert_eq!(second.records_written, 0);
        assert_eq!(second.already_seen, 1);

        // Unchanged index + unchanged table → still one data row.
        let content = std::fs::read_to_string(&table_path).unwrap();
        assert_eq!(content.lines().count(), 2);

        std::fs::remove_file(&table_path).ok();
    }

    #[tokio::test]
    async fn test_detail_failure_skips_one_record() {
        let table_path = temp_table_path("failure");
        let index_body = r#"
            <a href="https://www.meesterbaan.nl/vacature/1">a</a>
            <a href="https://www.meesterbaan.nl/vacature/2">b</a>
        "#;
        // Only detail page 1 resolves; page 2 answers 404.
        let fetcher = MockFetcher::new(&[
            (INDEX_URL, index_body),
            ("https://www.meesterbaan.nl/vacature/1", &detail_page("Leerkracht")),
        ]);

        let pipeline = HarvestPipeline::new(config(&table_path), fetcher).unwrap();
        let report = pipeline.run().await.unwrap();

        assert_eq!(report.records_written, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].url, "https://www.meesterbaan.nl/vacature/2");

        // The failed URL is not in the table, so the next run retries it.
        let urls = RecordTable::new(&table_path).existing_urls().unwrap();
        assert!(urls.contains("https://www.meesterbaan.nl/vacature/1"));
        assert!(!urls.contains("https://www.meesterbaan.nl/vacature/2"));

        std::fs::remove_file(&table_path).ok();
    }

    #[tokio::test]
    async fn test_dev_mode_truncates_before_dedup() {
        let table_path = temp_table_path("dev_mode");
        let mut index_body = String::new();
        let mut pages: Vec<(String, String)> = Vec::new();
        for i in 0..50 {
            let url = format!("https://www.meesterbaan.nl/vacature/{i}");
            index_body.push_str(&format!(r#"<a href="{url}">v</a>"#));
            pages.push((url, detail_page("Leerkracht")));
        }
        let mut canned: Vec<(&str, &str)> = vec![(INDEX_URL, index_body.as_str())];
        canned.extend(pages.iter().map(|(u, b)| (u.as_str(), b.as_str())));
        let fetcher = MockFetcher::new(&canned);

        let pipeline = HarvestPipeline::new(
            config(&table_path).with_dev_mode(true).with_sample_limit(10),
            fetcher,
        )
        .unwrap();
        let report = pipeline.run().await.unwrap();

        assert_eq!(report.discovered, 50);
        assert_eq!(report.records_written, 10);

        std::fs::remove_file(&table_path).ok();
    }

    #[test]
    fn test_sample_for_development_caps_the_set() {
        let links: HashSet<String> = (0..50).map(|i| format!("u{i}")).collect();
        assert_eq!(sample_for_development(links, 10).len(), 10);

        let small: HashSet<String> = (0..3).map(|i| format!("u{i}")).collect();
        assert_eq!(sample_for_development(small, 10).len(), 3);
    }
}
