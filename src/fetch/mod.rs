//! Pluggable content fetchers, one per [`SourceKind`].
//!
//! Each fetcher implements the [`Fetcher`] trait: URL in, extracted text
//! out. The registry dispatches on the classifier's kind, which keeps the
//! third-party scraping and auth complexity behind one narrow boundary and
//! lets tests swap in stubs. Fetchers do not retry; the first failure
//! surfaces to the ingestion caller.

mod article;
mod pdf;
mod social;
mod video;

pub use article::ArticleFetcher;
pub use pdf::PdfFetcher;
pub use social::{load_credentials, SocialCredentials, SocialPostFetcher};
pub use video::VideoTranscriptFetcher;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{FetchedContent, SourceKind};

/// Capability of retrieving extracted text for one content kind.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedContent>;
}

/// Dispatch table from content kind to fetcher.
pub struct FetcherRegistry {
    fetchers: HashMap<SourceKind, Box<dyn Fetcher>>,
}

impl FetcherRegistry {
    /// Build the four production fetchers from configuration. They share
    /// one HTTP client so the fetch timeout is applied uniformly.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = build_http_client(config.ingest.fetch_timeout_secs)?;

        let credentials = match &config.social.credentials_path {
            Some(path) => load_credentials(path)?,
            None => None,
        };

        let mut registry = Self::empty();
        registry.register(SourceKind::Article, Box::new(ArticleFetcher::new(http.clone())));
        registry.register(SourceKind::Pdf, Box::new(PdfFetcher::new(http.clone())));
        registry.register(SourceKind::Video, Box::new(VideoTranscriptFetcher::new(http.clone())));
        registry.register(
            SourceKind::Social,
            Box::new(SocialPostFetcher::new(http, credentials)),
        );
        Ok(registry)
    }

    /// An empty registry; tests populate it with stubs.
    pub fn empty() -> Self {
        Self {
            fetchers: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: SourceKind, fetcher: Box<dyn Fetcher>) {
        self.fetchers.insert(kind, fetcher);
    }

    pub async fn fetch(&self, kind: SourceKind, url: &str) -> Result<FetchedContent> {
        let fetcher = self
            .fetchers
            .get(&kind)
            .ok_or_else(|| Error::Fetch(format!("no fetcher registered for kind '{kind}'")))?;
        fetcher.fetch(url).await
    }
}

pub(crate) fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("recollect/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Fetch(format!("failed to build HTTP client: {e}")))
}

/// Shared GET helper: sends the request and rejects non-2xx statuses.
pub(crate) async fn get_checked(
    http: &reqwest::Client,
    url: &str,
    context: &str,
) -> Result<reqwest::Response> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| Error::fetch_http(context, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Fetch(format!("{context}: HTTP {status}")));
    }
    Ok(response)
}
