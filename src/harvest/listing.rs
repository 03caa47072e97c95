use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use crate::fetch::{FetchError, PageFetcher};

/// Pattern identifying one vacancy detail-page URL on the index page.
const LISTING_URL_PATTERN: &str = r"https://www\.meesterbaan\.nl/vacature/\d+";

/// Collects the set of detail-page URLs from the single configured index page.
pub struct ListingFetcher {
    fetcher: Arc<dyn PageFetcher>,
    link_pattern: Regex,
}

impl ListingFetcher {
    /// # Errors
    ///
    /// Returns `regex::Error` if the listing pattern fails to compile.
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Result<Self, regex::Error> {
        Ok(Self {
            fetcher,
            link_pattern: Regex::new(LISTING_URL_PATTERN)?,
        })
    }

    /// Downloads the index page and returns every unique detail-page URL
    /// found in the raw body. No pagination is followed.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the index page cannot be retrieved; this is
    /// fatal for the run.
    pub async fn fetch_listing_urls(
        &self,
        index_url: &str,
    ) -> Result<HashSet<String>, FetchError> {
        let body = self.fetcher.fetch_text(index_url).await?;

        let links: HashSet<String> = self
            .link_pattern
            .find_iter(&body)
            .map(|m| m.as_str().to_string())
            .collect();

        info!(index_url = %index_url, discovered = links.len(), "Collected listing URLs");
        Ok(links)
    }
}
