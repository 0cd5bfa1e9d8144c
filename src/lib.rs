//! # Recollect
//!
//! A single-user ingestion and semantic retrieval service for a personal
//! knowledge assistant. Point it at a URL — web article, PDF, video, or
//! social post — and it extracts the text, chunks it into overlapping
//! windows, embeds the chunks, and stores everything in SQLite. Queries
//! embed the search text and rank all stored chunks by cosine similarity.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────────┐   ┌─────────────┐   ┌──────────┐
//! │ Classifier │──▶│ Fetchers       │──▶│ Chunk+Embed │──▶│  SQLite   │
//! │ url → kind │   │ article/pdf/   │   │             │   │ sources/ │
//! └────────────┘   │ video/social   │   └─────────────┘   │ chunks   │
//!                  └───────────────┘                      └────┬─────┘
//!                                                              │
//!                                          ┌───────────────────┤
//!                                          ▼                   ▼
//!                                     ┌──────────┐       ┌──────────┐
//!                                     │   CLI    │       │   HTTP   │
//!                                     │  (rcl)   │       │  (axum)  │
//!                                     └──────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`classify`] | URL → content-kind rules |
//! | [`fetch`] | Pluggable per-kind content fetchers |
//! | [`chunker`] | Whitespace normalization and sliding-window chunking |
//! | [`embedding`] | Embedding providers and vector blob codec |
//! | [`store`] | Source/chunk persistence with upsert-by-URL |
//! | [`search`] | Flat cosine-similarity retrieval |
//! | [`ingest`] | Pipeline orchestration (ingest and query) |
//! | [`server`] | JSON HTTP transport |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema setup |

pub mod chunker;
pub mod classify;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod search;
pub mod server;
pub mod store;
