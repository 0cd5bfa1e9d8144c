//! Video transcript fetcher.
//!
//! Resolves the video id from the URL, then tries the timedtext transcript
//! endpoint first (json3). When that yields nothing, falls back to scraping
//! the watch page for a caption track and extracting the caption XML text.
//! Caption lines are joined in temporal order.

use async_trait::async_trait;
use url::Url;

use super::{get_checked, Fetcher};
use crate::error::{Error, Result};
use crate::models::FetchedContent;

const TIMEDTEXT_BASE: &str = "https://video.google.com";
const WATCH_BASE: &str = "https://www.youtube.com";

pub struct VideoTranscriptFetcher {
    http: reqwest::Client,
    timedtext_base: String,
    watch_base: String,
}

impl VideoTranscriptFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            timedtext_base: TIMEDTEXT_BASE.to_string(),
            watch_base: WATCH_BASE.to_string(),
        }
    }

    /// Point both endpoints at a different host (tests).
    pub fn with_bases(mut self, timedtext_base: &str, watch_base: &str) -> Self {
        self.timedtext_base = timedtext_base.trim_end_matches('/').to_string();
        self.watch_base = watch_base.trim_end_matches('/').to_string();
        self
    }

    async fn fetch_timedtext(&self, id: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/timedtext?lang=en&v={id}&fmt=json3",
            self.timedtext_base
        );
        let response = get_checked(&self.http, &url, "transcript download").await?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::fetch_http("transcript body", e))?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let json: serde_json::Value = match serde_json::from_str(&body) {
            Ok(v) => v,
            Err(_) => return Ok(None),
        };
        let lines = transcript_lines(&json);
        if lines.is_empty() {
            return Ok(None);
        }
        Ok(Some(lines.join("\n")))
    }

    async fn fetch_caption_track(&self, id: &str) -> Result<String> {
        let watch_url = format!("{}/watch?v={id}", self.watch_base);
        let response = get_checked(&self.http, &watch_url, "watch page download").await?;
        let html = response
            .text()
            .await
            .map_err(|e| Error::fetch_http("watch page body", e))?;

        let track_url = caption_track_url(&html)
            .ok_or_else(|| Error::Fetch("no captions available for video".to_string()))?;

        let response = get_checked(&self.http, &track_url, "caption track download").await?;
        let xml = response
            .text()
            .await
            .map_err(|e| Error::fetch_http("caption track body", e))?;

        let text = caption_xml_text(&xml)?;
        if text.trim().is_empty() {
            return Err(Error::Fetch("caption track contained no text".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl Fetcher for VideoTranscriptFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent> {
        let id = video_id(url)
            .ok_or_else(|| Error::Fetch(format!("unable to parse video id from {url}")))?;

        // Primary transcript source; any miss falls through to the
        // watch-page caption scrape.
        match self.fetch_timedtext(&id).await {
            Ok(Some(text)) => return Ok(FetchedContent::text(text)),
            Ok(None) => {}
            Err(e) => tracing::debug!(video = %id, error = %e, "timedtext transcript unavailable"),
        }

        let text = self.fetch_caption_track(&id).await?;
        Ok(FetchedContent::text(text))
    }
}

/// Extract the video id from watch, short-link, shorts, and embed URLs.
pub fn video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();

    if host == "youtu.be" {
        let id = parsed.path_segments()?.next()?;
        return non_empty(id);
    }

    if let Some((_, v)) = parsed.query_pairs().find(|(k, _)| k == "v") {
        return non_empty(&v);
    }

    // /shorts/<id> and /embed/<id> paths.
    let mut segments = parsed.path_segments()?;
    match segments.next() {
        Some("shorts") | Some("embed") => non_empty(segments.next()?),
        _ => None,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Collect caption segments from a timedtext json3 payload, in event order.
fn transcript_lines(json: &serde_json::Value) -> Vec<String> {
    let Some(events) = json.get("events").and_then(|e| e.as_array()) else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    for event in events {
        let Some(segs) = event.get("segs").and_then(|s| s.as_array()) else {
            continue;
        };
        let line: String = segs
            .iter()
            .filter_map(|seg| seg.get("utf8").and_then(|u| u.as_str()))
            .collect();
        let line = line.trim().to_string();
        if !line.is_empty() && line != "\n" {
            lines.push(line);
        }
    }
    lines
}

/// Find the first caption track base URL in a watch page's player config.
fn caption_track_url(html: &str) -> Option<String> {
    let start = html.find("\"captionTracks\":")?;
    let rest = &html[start..];
    let marker = "\"baseUrl\":\"";
    let url_start = rest.find(marker)? + marker.len();
    let url_end = rest[url_start..].find('"')?;
    let raw = &rest[url_start..url_start + url_end];
    Some(raw.replace("\\u0026", "&").replace("\\/", "/"))
}

/// Pull the text content out of a caption XML document
/// (`<text start=...>line</text>` elements), one line per cue.
fn caption_xml_text(xml: &str) -> Result<String> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut lines = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event() {
            Ok(quick_xml::events::Event::Start(e)) if e.local_name().as_ref() == b"text" => {
                in_text = true;
            }
            Ok(quick_xml::events::Event::End(e)) if e.local_name().as_ref() == b"text" => {
                in_text = false;
            }
            Ok(quick_xml::events::Event::Text(t)) if in_text => {
                let line = t
                    .unescape()
                    .map_err(|e| Error::Fetch(format!("caption XML decode failed: {e}")))?;
                let line = line.trim();
                if !line.is_empty() {
                    lines.push(line.to_string());
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(Error::Fetch(format!("caption XML parse failed: {e}"))),
            _ => {}
        }
    }
    Ok(lines.join("\n"))
}
