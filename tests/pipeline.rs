//! End-to-end pipeline tests over a temporary SQLite database, with stub
//! fetchers injected through the registry and the deterministic stub
//! embedding provider.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use recollect::config::Config;
use recollect::db;
use recollect::embedding::EmbeddingClient;
use recollect::error::Error;
use recollect::fetch::{Fetcher, FetcherRegistry};
use recollect::ingest::Pipeline;
use recollect::migrate;
use recollect::models::{FetchedContent, SourceKind};
use recollect::store::Store;

/// Fetcher stub returning a fixed text for any URL.
struct FixedFetcher {
    text: String,
    title: Option<String>,
}

#[async_trait]
impl Fetcher for FixedFetcher {
    async fn fetch(&self, _url: &str) -> recollect::error::Result<FetchedContent> {
        Ok(FetchedContent {
            text: self.text.clone(),
            title: self.title.clone(),
        })
    }
}

/// Fetcher stub returning each text once, in sequence.
struct SequenceFetcher {
    texts: Vec<String>,
    next: AtomicUsize,
}

#[async_trait]
impl Fetcher for SequenceFetcher {
    async fn fetch(&self, _url: &str) -> recollect::error::Result<FetchedContent> {
        let i = self.next.fetch_add(1, Ordering::SeqCst);
        Ok(FetchedContent::text(self.texts[i % self.texts.len()].clone()))
    }
}

async fn pipeline_with(
    tmp: &tempfile::TempDir,
    kind: SourceKind,
    fetcher: Box<dyn Fetcher>,
) -> Pipeline {
    let config = Config::minimal(tmp.path().join("test.sqlite"));
    let pool = db::connect(&config.db.path).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    let store = Store::new(pool, config.embedding.dims);
    let embeddings = EmbeddingClient::new(&config.embedding).unwrap();
    let mut fetchers = FetcherRegistry::empty();
    fetchers.register(kind, fetcher);
    Pipeline::assemble(config, store, embeddings, fetchers)
}

fn article_stub(text: &str) -> Box<dyn Fetcher> {
    Box::new(FixedFetcher {
        text: text.to_string(),
        title: None,
    })
}

/// 2100 non-whitespace chars so normalization preserves offsets.
fn text_2100() -> String {
    let alphabet = "abcdefghijklmnopqrstuvwxyz0123456789";
    (0..2100)
        .map(|i| alphabet.chars().nth(i % alphabet.len()).unwrap())
        .collect()
}

fn slice_chars(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end - start).collect()
}

#[tokio::test]
async fn ingest_2100_chars_produces_three_overlapping_chunks() {
    let tmp = tempfile::TempDir::new().unwrap();
    let text = text_2100();
    let pipeline = pipeline_with(&tmp, SourceKind::Article, article_stub(&text)).await;

    let source_id = pipeline.ingest("https://example.com/long-article").await.unwrap();

    let hits = pipeline.store().all_chunks_with_source().await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].content, slice_chars(&text, 0, 1000));
    assert_eq!(hits[1].content, slice_chars(&text, 800, 1800));
    assert_eq!(hits[2].content, slice_chars(&text, 1600, 2100));
    assert!(hits.iter().all(|h| h.source_id == source_id));

    // Querying with chunk 2's exact content must rank it (and its source)
    // first with a near-perfect score.
    let results = pipeline.query(&hits[2].content, 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source_id, source_id);
    assert!((results[0].score - 1.0).abs() < 1e-4, "score {}", results[0].score);

    let all = pipeline.query(&hits[2].content, 10).await.unwrap();
    assert!(all.iter().all(|r| r.score <= results[0].score + 1e-6));
}

#[tokio::test]
async fn stored_embeddings_are_unit_norm() {
    let tmp = tempfile::TempDir::new().unwrap();
    let pipeline =
        pipeline_with(&tmp, SourceKind::Article, article_stub(&text_2100())).await;
    pipeline.ingest("https://example.com/a").await.unwrap();

    for hit in pipeline.store().all_chunks_with_source().await.unwrap() {
        let norm: f32 = hit.embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm {norm}");
    }
}

#[tokio::test]
async fn too_short_content_fails_and_writes_nothing() {
    let tmp = tempfile::TempDir::new().unwrap();
    let pipeline = pipeline_with(&tmp, SourceKind::Article, article_stub("tiny text")).await;

    let err = pipeline.ingest("https://example.com/short").await.unwrap_err();
    assert!(matches!(err, Error::ContentTooShort { .. }));

    assert_eq!(pipeline.store().source_count().await.unwrap(), 0);
    assert_eq!(pipeline.store().chunk_count().await.unwrap(), 0);
}

#[tokio::test]
async fn minimum_length_counts_extracted_text_before_normalization() {
    let tmp = tempfile::TempDir::new().unwrap();
    // 54 chars as fetched, 46 after whitespace collapses: the gate sees
    // the former and lets this through.
    let padded = format!("   {} \n\t {}  ", "a".repeat(25), "b".repeat(20));
    assert!(padded.chars().count() >= 50);
    assert!(recollect::chunker::normalize(&padded).chars().count() < 50);

    let pipeline = pipeline_with(&tmp, SourceKind::Article, article_stub(&padded)).await;
    pipeline.ingest("https://example.com/padded").await.unwrap();

    let hits = pipeline.store().all_chunks_with_source().await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].content, recollect::chunker::normalize(&padded));
}

#[tokio::test]
async fn fetch_failure_leaves_prior_generation_untouched() {
    struct FailingFetcher;
    #[async_trait]
    impl Fetcher for FailingFetcher {
        async fn fetch(&self, _url: &str) -> recollect::error::Result<FetchedContent> {
            Err(Error::Fetch("network unreachable".to_string()))
        }
    }

    let tmp = tempfile::TempDir::new().unwrap();
    let first = "stable content ".repeat(10);
    let pipeline = pipeline_with(&tmp, SourceKind::Article, article_stub(&first)).await;
    pipeline.ingest("https://example.com/a").await.unwrap();
    let before = pipeline.store().all_chunks_with_source().await.unwrap();

    // Swap in a failing fetcher by rebuilding the pipeline over the same
    // database.
    let config = Config::minimal(tmp.path().join("test.sqlite"));
    let pool = db::connect(&config.db.path).await.unwrap();
    let store = Store::new(pool, config.embedding.dims);
    let embeddings = EmbeddingClient::new(&config.embedding).unwrap();
    let mut fetchers = FetcherRegistry::empty();
    fetchers.register(SourceKind::Article, Box::new(FailingFetcher));
    let pipeline2 = Pipeline::assemble(config, store, embeddings, fetchers);

    let err = pipeline2.ingest("https://example.com/a").await.unwrap_err();
    assert!(matches!(err, Error::Fetch(_)));

    let after = pipeline2.store().all_chunks_with_source().await.unwrap();
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(after.iter()) {
        assert_eq!(b.content, a.content);
    }
}

#[tokio::test]
async fn reingesting_a_url_replaces_all_chunks() {
    let tmp = tempfile::TempDir::new().unwrap();
    let first = "first version of the document ".repeat(40); // ~1200 chars → 2 chunks
    let second = "entirely different second version ".repeat(3); // ~100 chars → 1 chunk
    let pipeline = pipeline_with(
        &tmp,
        SourceKind::Article,
        Box::new(SequenceFetcher {
            texts: vec![first, second.clone()],
            next: AtomicUsize::new(0),
        }),
    )
    .await;

    let id1 = pipeline.ingest("https://example.com/doc").await.unwrap();
    assert_eq!(pipeline.store().chunk_count().await.unwrap(), 2);

    let id2 = pipeline.ingest("https://example.com/doc").await.unwrap();
    assert_eq!(id1, id2);
    assert_eq!(pipeline.store().source_count().await.unwrap(), 1);

    let hits = pipeline.store().all_chunks_with_source().await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].content, recollect::chunker::normalize(&second));
}

#[tokio::test]
async fn top_k_bounds() {
    let tmp = tempfile::TempDir::new().unwrap();
    let pipeline =
        pipeline_with(&tmp, SourceKind::Article, article_stub(&text_2100())).await;
    pipeline.ingest("https://example.com/a").await.unwrap();
    // 3 chunks stored.

    assert!(pipeline.query("anything", 0).await.unwrap().is_empty());
    assert!(pipeline.query("anything", -4).await.unwrap().is_empty());
    assert_eq!(pipeline.query("anything", 2).await.unwrap().len(), 2);
    assert_eq!(pipeline.query("anything", 50).await.unwrap().len(), 3);

    let results = pipeline.query("anything", 3).await.unwrap();
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn query_on_empty_store_returns_empty() {
    let tmp = tempfile::TempDir::new().unwrap();
    let pipeline = pipeline_with(&tmp, SourceKind::Article, article_stub("unused")).await;
    assert!(pipeline.query("anything", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_ingestions_of_one_url_serialize() {
    let tmp = tempfile::TempDir::new().unwrap();
    let text_a = "generation alpha content ".repeat(10);
    let text_b = "generation beta payload ".repeat(10);
    let pipeline = Arc::new(
        pipeline_with(
            &tmp,
            SourceKind::Article,
            Box::new(SequenceFetcher {
                texts: vec![text_a.clone(), text_b.clone()],
                next: AtomicUsize::new(0),
            }),
        )
        .await,
    );

    let url = "https://example.com/contended";
    let t1 = tokio::spawn({
        let p = pipeline.clone();
        async move { p.ingest(url).await }
    });
    let t2 = tokio::spawn({
        let p = pipeline.clone();
        async move { p.ingest(url).await }
    });
    t1.await.unwrap().unwrap();
    t2.await.unwrap().unwrap();

    assert_eq!(pipeline.store().source_count().await.unwrap(), 1);
    let hits = pipeline.store().all_chunks_with_source().await.unwrap();
    assert_eq!(hits.len(), 1);

    // The surviving chunk set is one generation in full, never a mix.
    let norm_a = recollect::chunker::normalize(&text_a);
    let norm_b = recollect::chunker::normalize(&text_b);
    assert!(hits[0].content == norm_a || hits[0].content == norm_b);
}

#[tokio::test]
async fn ingested_source_records_kind_and_title() {
    let tmp = tempfile::TempDir::new().unwrap();
    let pipeline = pipeline_with(
        &tmp,
        SourceKind::Article,
        Box::new(FixedFetcher {
            text: "titled document body with enough characters to pass the minimum".to_string(),
            title: Some("A Document".to_string()),
        }),
    )
    .await;

    pipeline.ingest("https://example.com/titled").await.unwrap();
    let source = pipeline
        .store()
        .source_by_url("https://example.com/titled")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source.kind, SourceKind::Article);
    assert_eq!(source.title.as_deref(), Some("A Document"));
    assert!(source.metadata_json.contains("article"));
    assert!(source.added_at > 0);
}
