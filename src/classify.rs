//! URL → content-kind classification.
//!
//! Pure pattern rules, checked in order with first match winning:
//! video host, social host, `.pdf` path suffix, then article as the
//! fallback. Every URL classifies to some kind; there is no error case.

use url::Url;

use crate::models::SourceKind;

const VIDEO_HOSTS: &[&str] = &["youtube.com", "youtu.be"];
const SOCIAL_HOSTS: &[&str] = &["x.com", "twitter.com"];

/// Classify a URL into a [`SourceKind`].
pub fn classify(url: &str) -> SourceKind {
    if let Ok(parsed) = Url::parse(url.trim()) {
        if let Some(host) = parsed.host_str() {
            let host = host.to_ascii_lowercase();
            if VIDEO_HOSTS.iter().any(|h| host_matches(&host, h)) {
                return SourceKind::Video;
            }
            if SOCIAL_HOSTS.iter().any(|h| host_matches(&host, h)) {
                return SourceKind::Social;
            }
        }
        if parsed.path().to_ascii_lowercase().ends_with(".pdf") {
            return SourceKind::Pdf;
        }
        return SourceKind::Article;
    }

    // Unparseable input still classifies: fall back to substring checks so
    // the function stays total.
    let lower = url.to_ascii_lowercase();
    if VIDEO_HOSTS.iter().any(|h| lower.contains(h)) {
        return SourceKind::Video;
    }
    if SOCIAL_HOSTS.iter().any(|h| lower.contains(h)) {
        return SourceKind::Social;
    }
    if lower.ends_with(".pdf") {
        return SourceKind::Pdf;
    }
    SourceKind::Article
}

/// Exact host or a subdomain of it (`www.youtube.com` matches `youtube.com`,
/// `notyoutube.com` does not).
fn host_matches(host: &str, pattern: &str) -> bool {
    host == pattern || host.ends_with(&format!(".{pattern}"))
}
