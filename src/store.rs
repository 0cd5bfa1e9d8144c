//! Durable persistence of sources and their chunks.
//!
//! Two tables (see [`crate::migrate`]): `sources`, keyed by unique URL with
//! integer identity, and `chunks`, exclusively owned by their source. A
//! re-ingestion fully regenerates the chunk set inside one transaction, so
//! a concurrent reader sees either the pre- or post-replace generation,
//! never a mix.

use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::Result;
use crate::models::{ChunkHit, Source, SourceKind};

/// Fields of a source written by an ingestion.
#[derive(Debug, Clone)]
pub struct SourceMeta {
    pub url: String,
    pub kind: SourceKind,
    pub title: Option<String>,
    pub raw_text: String,
    pub metadata_json: String,
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    dims: usize,
}

impl Store {
    pub fn new(pool: SqlitePool, dims: usize) -> Self {
        Self { pool, dims }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace a source by URL, deleting any chunks of the prior
    /// generation. The identity is stable across re-ingestions.
    pub async fn upsert_source(&self, meta: &SourceMeta) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let id = upsert_source_tx(&mut tx, meta).await?;
        delete_chunks_tx(&mut tx, id).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Replace all chunks of a source with the given ordered
    /// (content, embedding) pairs, indexed from 0.
    pub async fn replace_chunks(&self, source_id: i64, chunks: &[(String, Vec<f32>)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        delete_chunks_tx(&mut tx, source_id).await?;
        insert_chunks_tx(&mut tx, source_id, chunks).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Upsert a source and write its new chunk set as one transaction.
    /// This is the ingestion write path: all-or-nothing, so a failure
    /// leaves the prior generation untouched.
    pub async fn save_ingest(&self, meta: &SourceMeta, chunks: &[(String, Vec<f32>)]) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let id = upsert_source_tx(&mut tx, meta).await?;
        delete_chunks_tx(&mut tx, id).await?;
        insert_chunks_tx(&mut tx, id, chunks).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Full scan of all chunks joined with their source, in rowid order.
    /// Used by retrieval; the corpus is single-user sized, so no
    /// pagination.
    pub async fn all_chunks_with_source(&self) -> Result<Vec<ChunkHit>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.source_id, c.content, c.embedding, s.url, s.title
            FROM chunks c
            JOIN sources s ON c.source_id = s.id
            ORDER BY c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.get("embedding");
            hits.push(ChunkHit {
                chunk_id: row.get("id"),
                source_id: row.get("source_id"),
                content: row.get("content"),
                embedding: blob_to_vec(&blob, self.dims)?,
                url: row.get("url"),
                title: row.get("title"),
            });
        }
        Ok(hits)
    }

    pub async fn source_by_url(&self, url: &str) -> Result<Option<Source>> {
        let row = sqlx::query(
            "SELECT id, url, kind, title, added_at, raw_text, metadata_json FROM sources WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let kind: String = row.get("kind");
            Source {
                id: row.get("id"),
                url: row.get("url"),
                kind: SourceKind::parse(&kind).unwrap_or(SourceKind::Article),
                title: row.get("title"),
                added_at: row.get("added_at"),
                raw_text: row.get("raw_text"),
                metadata_json: row.get("metadata_json"),
            }
        }))
    }

    pub async fn source_count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM sources")
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn chunk_count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?)
    }
}

async fn upsert_source_tx(tx: &mut Transaction<'_, Sqlite>, meta: &SourceMeta) -> Result<i64> {
    let now = chrono::Utc::now().timestamp();
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO sources (url, kind, title, added_at, raw_text, metadata_json)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(url) DO UPDATE SET
            kind = excluded.kind,
            title = excluded.title,
            added_at = excluded.added_at,
            raw_text = excluded.raw_text,
            metadata_json = excluded.metadata_json
        RETURNING id
        "#,
    )
    .bind(&meta.url)
    .bind(meta.kind.as_str())
    .bind(&meta.title)
    .bind(now)
    .bind(&meta.raw_text)
    .bind(&meta.metadata_json)
    .fetch_one(&mut **tx)
    .await?;
    Ok(id)
}

async fn delete_chunks_tx(tx: &mut Transaction<'_, Sqlite>, source_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM chunks WHERE source_id = ?")
        .bind(source_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn insert_chunks_tx(
    tx: &mut Transaction<'_, Sqlite>,
    source_id: i64,
    chunks: &[(String, Vec<f32>)],
) -> Result<()> {
    for (index, (content, embedding)) in chunks.iter().enumerate() {
        sqlx::query(
            "INSERT INTO chunks (source_id, chunk_index, content, embedding) VALUES (?, ?, ?, ?)",
        )
        .bind(source_id)
        .bind(index as i64)
        .bind(content)
        .bind(vec_to_blob(embedding))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
