//! Web article fetcher: downloads a page and extracts the readable text,
//! discarding scripts, styles, and markup.

use async_trait::async_trait;
use scraper::{Html, Selector};

use super::{get_checked, Fetcher};
use crate::error::{Error, Result};
use crate::models::FetchedContent;

pub struct ArticleFetcher {
    http: reqwest::Client,
}

impl ArticleFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Fetcher for ArticleFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent> {
        let response = get_checked(&self.http, url, "article download").await?;
        let html = response
            .text()
            .await
            .map_err(|e| Error::fetch_http("article body", e))?;

        let (title, text) = extract_article(&html);
        if text.trim().is_empty() {
            return Err(Error::Fetch("no article text extracted".to_string()));
        }
        Ok(FetchedContent { text, title })
    }
}

/// Parse the document, pull the `<title>`, and render the body to plain
/// text. Kept synchronous: `scraper::Html` is not `Send`, so it must not
/// live across an await point.
fn extract_article(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);

    let title = Selector::parse("title").ok().and_then(|sel| {
        document.select(&sel).next().map(|el| {
            el.text().collect::<String>().trim().to_string()
        })
    });
    let title = title.filter(|t| !t.is_empty());

    // Render the <body> subtree when present so head noise is excluded.
    let body_html = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| el.html())
        .unwrap_or_else(|| html.to_string());

    let text = html2text::from_read(body_html.as_bytes(), 80).unwrap_or_default();
    (title, text)
}
