//! Page retrieval seam.
//!
//! The pipeline talks to the network through the [`PageFetcher`] trait so
//! tests can substitute canned pages. [`HttpFetcher`] is the real
//! implementation: a single `reqwest` client with a browser-like identity,
//! a request timeout and a bounded redirect policy.

use async_trait::async_trait;
use reqwest::header;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while retrieving a page.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure (connection refused, timeout, DNS).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Retrieves response bodies as text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Issues a GET request for `url` and returns the body as text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failure or a non-success status.
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// `reqwest`-backed fetcher shared by the listing and detail stages.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds the HTTP client. A browser-like User-Agent avoids bot
    /// detection on the job board.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the client cannot be created.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let user_agent = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("nl-NL,nl;q=0.8,en;q=0.5"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(FetchError::ClientBuild)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        debug!(url = %url, "Fetching page");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}
