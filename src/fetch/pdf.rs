//! PDF fetcher: downloads the binary document and extracts per-page text
//! in page order.

use async_trait::async_trait;

use super::{get_checked, Fetcher};
use crate::error::{Error, Result};
use crate::models::FetchedContent;

pub struct PdfFetcher {
    http: reqwest::Client,
}

impl PdfFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Fetcher for PdfFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent> {
        let response = get_checked(&self.http, url, "PDF download").await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::fetch_http("PDF body", e))?;

        // Parsing is CPU-bound; keep it off the async worker.
        let text = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|e| Error::Fetch(format!("PDF extraction failed: {e}")))
        })
        .await
        .map_err(|e| Error::Fetch(format!("PDF extraction task failed: {e}")))??;

        if text.trim().is_empty() {
            return Err(Error::Fetch("no text extracted from PDF".to_string()));
        }
        Ok(FetchedContent::text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    /// Minimal valid single-page PDF containing the given phrase, with a
    /// correct xref table so pdf-extract can parse it.
    fn minimal_pdf(phrase: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let o1 = out.len();
        out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        let o2 = out.len();
        out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
        let o3 = out.len();
        out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
        let o4 = out.len();
        let stream = format!("BT /F1 12 Tf 100 700 Td ({phrase}) Tj ET\n");
        out.extend_from_slice(
            format!("4 0 obj << /Length {} >> stream\n{stream}endstream endobj\n", stream.len())
                .as_bytes(),
        );
        let o5 = out.len();
        out.extend_from_slice(
            b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
        );
        let xref_start = out.len();
        out.extend_from_slice(b"xref\n0 6\n");
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for offset in [o1, o2, o3, o4, o5] {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{xref_start}\n").as_bytes());
        out.extend_from_slice(b"%%EOF\n");
        out
    }

    #[tokio::test]
    async fn extracts_pdf_text() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/doc.pdf");
            then.status(200)
                .header("content-type", "application/pdf")
                .body(minimal_pdf("quarterly report summary"));
        });

        let fetcher = PdfFetcher::new(reqwest::Client::new());
        let got = fetcher.fetch(&server.url("/doc.pdf")).await.unwrap();
        assert!(got.text.contains("quarterly report summary"));
        assert!(got.title.is_none());
    }

    #[tokio::test]
    async fn invalid_pdf_is_a_fetch_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/doc.pdf");
            then.status(200).body("this is not a pdf");
        });

        let fetcher = PdfFetcher::new(reqwest::Client::new());
        let err = fetcher.fetch(&server.url("/doc.pdf")).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }
}
