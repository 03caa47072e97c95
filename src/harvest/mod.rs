//! Harvest module - the extraction-and-dedup pipeline.
//!
//! This module holds the four stages of one run and their coordinator:
//! - **Listing**: [`ListingFetcher`] collects detail-page URLs from the index
//! - **Extraction**: [`DetailExtractor`] turns detail-page HTML into records
//! - **Table**: [`RecordTable`] reads seen URLs and appends new rows
//! - **Pipeline**: [`HarvestPipeline`] wires the stages, strictly in order

pub mod extract;
pub mod listing;
pub mod pipeline;
pub mod table;

// Re-export commonly used types
pub use extract::{DetailExtractor, ExtractError};
pub use listing::ListingFetcher;
pub use pipeline::{HarvestPipeline, HarvestReport, HarvestStats, PipelineError, UrlFailure};
pub use table::{RecordTable, TableError};
