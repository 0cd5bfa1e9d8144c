//! Pipeline orchestration: the two core operations, ingest and query.
//!
//! Ingestion runs classify → fetch → normalize → chunk → embed → store.
//! The store write is one transaction, and a per-URL async lock serializes
//! concurrent ingestions of the same URL, so re-ingestion is atomic from
//! any reader's point of view. Different URLs ingest concurrently without
//! coordination.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::chunker::{chunk_text, normalize};
use crate::classify::classify;
use crate::config::Config;
use crate::db;
use crate::embedding::EmbeddingClient;
use crate::error::{Error, Result};
use crate::fetch::FetcherRegistry;
use crate::migrate;
use crate::models::SearchResult;
use crate::search;
use crate::store::{SourceMeta, Store};

pub struct Pipeline {
    config: Config,
    store: Store,
    embeddings: EmbeddingClient,
    fetchers: FetcherRegistry,
    // One lock per URL; entries are removed once no ingestion holds them.
    url_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Pipeline {
    /// Connect to the database, run migrations, and build the production
    /// fetchers and embedding client from config.
    pub async fn new(config: Config) -> Result<Self> {
        let pool = db::connect(&config.db.path).await?;
        migrate::run_migrations(&pool).await?;
        let store = Store::new(pool, config.embedding.dims);
        let embeddings = EmbeddingClient::new(&config.embedding)?;
        let fetchers = FetcherRegistry::from_config(&config)?;
        Ok(Self::assemble(config, store, embeddings, fetchers))
    }

    /// Assemble a pipeline from pre-built parts. Tests use this to inject
    /// stub fetchers.
    pub fn assemble(
        config: Config,
        store: Store,
        embeddings: EmbeddingClient,
        fetchers: FetcherRegistry,
    ) -> Self {
        Self {
            config,
            store,
            embeddings,
            fetchers,
            url_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ingest a URL: fetch its content, chunk and embed it, and replace
    /// any prior generation of the same URL. Returns the source id.
    pub async fn ingest(&self, url: &str) -> Result<i64> {
        let url = url.trim().to_string();
        let lock = self.lock_for(&url).await;
        let result = {
            let _guard = lock.lock().await;
            self.ingest_locked(&url).await
        };
        drop(lock);
        self.prune_lock(&url).await;
        result
    }

    async fn ingest_locked(&self, url: &str) -> Result<i64> {
        let kind = classify(url);
        tracing::info!(%url, %kind, "ingesting");

        let fetched = self.fetchers.fetch(kind, url).await?;

        // The minimum applies to the text as extracted, before whitespace
        // normalization.
        let min = self.config.ingest.min_content_chars;
        let got = fetched.text.chars().count();
        if got < min {
            return Err(Error::ContentTooShort { got, min });
        }

        let text = normalize(&fetched.text);
        let chunks = chunk_text(&text, self.config.chunking.size, self.config.chunking.overlap)?;
        let vectors = self.embeddings.embed(&chunks).await?;

        let meta = SourceMeta {
            url: url.to_string(),
            kind,
            title: fetched.title,
            raw_text: text,
            metadata_json: serde_json::json!({ "kind": kind }).to_string(),
        };
        let pairs: Vec<(String, Vec<f32>)> = chunks.into_iter().zip(vectors).collect();
        let source_id = self.store.save_ingest(&meta, &pairs).await?;

        tracing::info!(%url, source_id, chunks = pairs.len(), "ingested");
        Ok(source_id)
    }

    /// Rank stored chunks against a query. `top_k <= 0` returns an empty
    /// list; an empty store always succeeds with no results.
    pub async fn query(&self, query: &str, top_k: i64) -> Result<Vec<SearchResult>> {
        search::search(
            &self.store,
            &self.embeddings,
            query,
            top_k,
            self.config.retrieval.snippet_chars,
        )
        .await
    }

    async fn lock_for(&self, url: &str) -> Arc<Mutex<()>> {
        let mut locks = self.url_locks.lock().await;
        locks
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop a URL's lock entry once the map holds the only reference.
    /// A waiting ingestion still holds a clone, so its entry survives.
    async fn prune_lock(&self, url: &str) {
        let mut locks = self.url_locks.lock().await;
        if let Some(entry) = locks.get(url) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(url);
            }
        }
    }
}
