//! Core data types that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Content kind of an ingested URL, decided by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Article,
    Pdf,
    Video,
    Social,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Article => "article",
            SourceKind::Pdf => "pdf",
            SourceKind::Video => "video",
            SourceKind::Social => "social",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "article" => Some(SourceKind::Article),
            "pdf" => Some(SourceKind::Pdf),
            "video" => Some(SourceKind::Video),
            "social" => Some(SourceKind::Social),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ingested URL with its full normalized text.
#[derive(Debug, Clone)]
pub struct Source {
    pub id: i64,
    pub url: String,
    pub kind: SourceKind,
    pub title: Option<String>,
    /// Unix seconds of the most recent (re-)ingestion.
    pub added_at: i64,
    pub raw_text: String,
    pub metadata_json: String,
}

/// Raw output of a fetcher before normalization.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    pub text: String,
    /// Only the article fetcher produces a title today.
    pub title: Option<String>,
}

impl FetchedContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: None,
        }
    }
}

/// A chunk row joined with its owning source, as returned by the full scan.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub chunk_id: i64,
    pub source_id: i64,
    pub content: String,
    pub embedding: Vec<f32>,
    pub url: String,
    pub title: Option<String>,
}

/// A ranked retrieval result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub source_id: i64,
    pub url: String,
    pub title: Option<String>,
    pub score: f32,
    pub snippet: String,
}
