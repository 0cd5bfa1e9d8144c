//! Social post fetcher.
//!
//! Primary path is an authenticated API call using injected credentials
//! (cookies and/or bearer token read from the file named in config — never
//! an ambient hardcoded path). Reply text is collected best-effort when the
//! response carries it. When no credentials are configured or the
//! authenticated call fails, falls back to the unauthenticated FxTwitter
//! JSON API.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

use super::Fetcher;
use crate::error::{Error, Result};
use crate::models::FetchedContent;

const API_BASE: &str = "https://api.x.com";
const FALLBACK_BASE: &str = "https://api.fxtwitter.com";

/// Credentials for the authenticated path, deserialized from a JSON file:
/// `{"cookies": "...", "bearer": "..."}`, both optional.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SocialCredentials {
    #[serde(default)]
    pub cookies: Option<String>,
    #[serde(default)]
    pub bearer: Option<String>,
}

/// Load credentials from the configured path. A missing file is not an
/// error — the fetcher simply runs unauthenticated.
pub fn load_credentials(path: &Path) -> Result<Option<SocialCredentials>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read social credentials: {e}")))?;
    let creds: SocialCredentials = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("invalid social credentials file: {e}")))?;
    Ok(Some(creds))
}

pub struct SocialPostFetcher {
    http: reqwest::Client,
    credentials: Option<SocialCredentials>,
    api_base: String,
    fallback_base: String,
}

impl SocialPostFetcher {
    pub fn new(http: reqwest::Client, credentials: Option<SocialCredentials>) -> Self {
        Self {
            http,
            credentials,
            api_base: API_BASE.to_string(),
            fallback_base: FALLBACK_BASE.to_string(),
        }
    }

    /// Point both endpoints at a different host (tests).
    pub fn with_bases(mut self, api_base: &str, fallback_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.fallback_base = fallback_base.trim_end_matches('/').to_string();
        self
    }

    async fn fetch_authenticated(&self, id: &str) -> Result<String> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| Error::Fetch("no social credentials configured".to_string()))?;

        let url = format!(
            "{}/1.1/statuses/show.json?id={id}&tweet_mode=extended",
            self.api_base
        );
        let mut request = self.http.get(&url);
        if let Some(bearer) = &creds.bearer {
            request = request.header("Authorization", format!("Bearer {bearer}"));
        }
        if let Some(cookies) = &creds.cookies {
            request = request.header("Cookie", cookies.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::fetch_http("social API request", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("social API: HTTP {status}")));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::fetch_http("social API response", e))?;
        post_text(&json).ok_or_else(|| Error::Fetch("social API returned no text".to_string()))
    }

    async fn fetch_fallback(&self, id: &str) -> Result<String> {
        let url = format!("{}/status/{id}", self.fallback_base);
        let response = super::get_checked(&self.http, &url, "social fallback API").await?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::fetch_http("social fallback response", e))?;

        json.pointer("/tweet/text")
            .or_else(|| json.get("text"))
            .and_then(|t| t.as_str())
            .map(|t| t.to_string())
            .ok_or_else(|| Error::Fetch("unable to extract post text".to_string()))
    }
}

#[async_trait]
impl Fetcher for SocialPostFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent> {
        let id = post_id(url)
            .ok_or_else(|| Error::Fetch(format!("unable to parse post id from {url}")))?;

        if self.credentials.is_some() {
            match self.fetch_authenticated(&id).await {
                Ok(text) => return Ok(FetchedContent::text(text)),
                Err(e) => {
                    tracing::debug!(post = %id, error = %e, "authenticated social fetch failed, using fallback")
                }
            }
        }

        let text = self.fetch_fallback(&id).await?;
        Ok(FetchedContent::text(text))
    }
}

/// Digits following `/status/` in the post URL.
pub fn post_id(url: &str) -> Option<String> {
    let idx = url.find("/status/")?;
    let rest = &url[idx + "/status/".len()..];
    let id: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    (!id.is_empty()).then_some(id)
}

/// Main text of an API response, with reply text appended best-effort
/// when the payload carries a `replies` array.
fn post_text(json: &serde_json::Value) -> Option<String> {
    let main = json
        .get("full_text")
        .or_else(|| json.get("text"))
        .and_then(|t| t.as_str())?;

    let mut parts = vec![main.to_string()];
    if let Some(replies) = json.get("replies").and_then(|r| r.as_array()) {
        for reply in replies {
            if let Some(text) = reply
                .get("full_text")
                .or_else(|| reply.get("text"))
                .and_then(|t| t.as_str())
            {
                parts.push(text.to_string());
            }
        }
    }
    Some(parts.join("\n"))
}
