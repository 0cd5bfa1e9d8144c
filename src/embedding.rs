//! Embedding client and vector blob codec.
//!
//! The client batches texts to the configured provider and L2-normalizes
//! every returned vector, so stored similarity reduces to a dot product.
//! Providers:
//! - **`stub`** — deterministic hash-derived vectors, no network. Used by
//!   tests and useful for offline smoke runs; embedding the same text twice
//!   always yields the same vector.
//! - **`openai`** — `POST /v1/embeddings` with `OPENAI_API_KEY`.
//! - **`ollama`** — `POST /api/embed` on a local Ollama instance.
//! - **`local`** — in-process fastembed model (feature `local-embeddings`).
//!
//! Vectors persist as little-endian IEEE-754 f32 blobs; [`blob_to_vec`]
//! rejects blobs whose length is not a multiple of 4 or whose element
//! count mismatches the configured dimensionality.

use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

pub struct EmbeddingClient {
    config: EmbeddingConfig,
    http: reqwest::Client,
    #[cfg(feature = "local-embeddings")]
    local: Option<std::sync::Arc<std::sync::Mutex<fastembed::TextEmbedding>>>,
}

impl EmbeddingClient {
    /// Build a client for the configured provider. Expensive resources
    /// (the local model, the HTTP connection pool) are initialized here,
    /// not lazily behind a global.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Embedding(format!("failed to build HTTP client: {e}")))?;

        #[cfg(feature = "local-embeddings")]
        let local = if config.provider == "local" {
            Some(std::sync::Arc::new(std::sync::Mutex::new(
                init_local_model(config)?,
            )))
        } else {
            None
        };

        #[cfg(not(feature = "local-embeddings"))]
        if config.provider == "local" {
            return Err(Error::Config(
                "embedding provider 'local' requires the local-embeddings feature".to_string(),
            ));
        }

        Ok(Self {
            config: config.clone(),
            http,
            #[cfg(feature = "local-embeddings")]
            local,
        })
    }

    /// Configured vector dimensionality; every stored embedding has this
    /// many elements.
    pub fn dims(&self) -> usize {
        self.config.dims
    }

    /// Embed a batch of texts, position-aligned with the input, each
    /// vector unit-L2-normalized (an all-zero vector stays zero).
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = match self.config.provider.as_str() {
            "stub" => texts.iter().map(|t| stub_vector(t, self.dims())).collect(),
            "openai" => self.embed_openai(texts).await?,
            "ollama" => self.embed_ollama(texts).await?,
            #[cfg(feature = "local-embeddings")]
            "local" => self.embed_local(texts).await?,
            other => {
                return Err(Error::Config(format!(
                    "unknown embedding provider: {other}"
                )))
            }
        };

        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        for v in &mut vectors {
            if v.len() != self.dims() {
                return Err(Error::Embedding(format!(
                    "provider returned {}-dim vector, expected {}",
                    v.len(),
                    self.dims()
                )));
            }
            l2_normalize(v);
        }
        Ok(vectors)
    }

    /// Embed a single query text.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let mut vectors = self.embed(&texts).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))
    }

    async fn embed_openai(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Embedding("OPENAI_API_KEY not set".to_string()))?;
        let model = self.require_model()?;
        let base = self
            .config
            .url
            .as_deref()
            .unwrap_or("https://api.openai.com");

        let body = serde_json::json!({ "model": model, "input": texts });
        let response = self
            .http
            .post(format!("{base}/v1/embeddings"))
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::embed_http("OpenAI request", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("OpenAI API error {status}: {text}")));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::embed_http("OpenAI response", e))?;
        parse_openai_response(&json)
    }

    async fn embed_ollama(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.require_model()?;
        let base = self
            .config
            .url
            .as_deref()
            .unwrap_or("http://localhost:11434");

        let body = serde_json::json!({ "model": model, "input": texts });
        let response = self
            .http
            .post(format!("{base}/api/embed"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::embed_http("Ollama request", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("Ollama API error {status}: {text}")));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::embed_http("Ollama response", e))?;
        parse_ollama_response(&json)
    }

    #[cfg(feature = "local-embeddings")]
    async fn embed_local(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self
            .local
            .clone()
            .ok_or_else(|| Error::Embedding("local model not initialized".to_string()))?;
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| Error::Embedding("local model lock poisoned".to_string()))?;
            model
                .embed(texts, None)
                .map_err(|e| Error::Embedding(format!("local embedding failed: {e}")))
        })
        .await
        .map_err(|e| Error::Embedding(format!("local embedding task failed: {e}")))?
    }

    fn require_model(&self) -> Result<&str> {
        self.config
            .model
            .as_deref()
            .ok_or_else(|| Error::Config("embedding.model is required".to_string()))
    }
}

#[cfg(feature = "local-embeddings")]
fn init_local_model(config: &EmbeddingConfig) -> Result<fastembed::TextEmbedding> {
    let name = config.model.as_deref().unwrap_or("all-minilm-l6-v2");
    let model = match name {
        "all-minilm-l6-v2" => fastembed::EmbeddingModel::AllMiniLML6V2,
        "bge-small-en-v1.5" => fastembed::EmbeddingModel::BGESmallENV15,
        "bge-base-en-v1.5" => fastembed::EmbeddingModel::BGEBaseENV15,
        "nomic-embed-text-v1.5" => fastembed::EmbeddingModel::NomicEmbedTextV15,
        other => {
            return Err(Error::Config(format!(
                "unknown local embedding model: '{other}'"
            )))
        }
    };
    fastembed::TextEmbedding::try_new(fastembed::InitOptions::new(model))
        .map_err(|e| Error::Embedding(format!("failed to initialize local model: {e}")))
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::Embedding("invalid OpenAI response: missing data array".to_string()))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                Error::Embedding("invalid OpenAI response: missing embedding".to_string())
            })?;
        embeddings.push(
            embedding
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }
    Ok(embeddings)
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            Error::Embedding("invalid Ollama response: missing embeddings array".to_string())
        })?;

    let mut result = Vec::with_capacity(embeddings.len());
    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| {
                Error::Embedding("invalid Ollama response: embedding is not an array".to_string())
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }
    Ok(result)
}

/// Deterministic pseudo-embedding derived from a SHA-256 of the text.
/// Whitespace-only text maps to the zero vector, which normalization
/// leaves untouched.
fn stub_vector(text: &str, dims: usize) -> Vec<f32> {
    if text.trim().is_empty() {
        return vec![0.0; dims];
    }

    let mut out = Vec::with_capacity(dims);
    let mut counter: u32 = 0;
    while out.len() < dims {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(counter.to_le_bytes());
        let digest = hasher.finalize();
        for bytes in digest.chunks_exact(4) {
            if out.len() == dims {
                break;
            }
            let word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            // Map to [-1, 1).
            out.push((word as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32);
        }
        counter += 1;
    }
    out
}

/// Scale a vector to unit L2 norm in place. Zero vectors stay zero.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Encode a vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a stored BLOB, validating shape against the expected
/// dimensionality. A ragged or mis-sized blob is corruption, surfaced
/// as a store error rather than silently reinterpreted.
pub fn blob_to_vec(blob: &[u8], dims: usize) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::Store(format!(
            "corrupt embedding blob: {} bytes is not a multiple of 4",
            blob.len()
        )));
    }
    let count = blob.len() / 4;
    if count != dims {
        return Err(Error::Store(format!(
            "corrupt embedding blob: {count} elements, expected {dims}"
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;

    fn stub_client(dims: usize) -> EmbeddingClient {
        EmbeddingClient::new(&EmbeddingConfig {
            dims,
            ..EmbeddingConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn stub_embeddings_are_deterministic() {
        let client = stub_client(64);
        let a = client.embed_one("the quick brown fox").await.unwrap();
        let b = client.embed_one("the quick brown fox").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn stub_embeddings_are_unit_norm() {
        let client = stub_client(64);
        let v = client.embed_one("some text").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
    }

    #[tokio::test]
    async fn whitespace_only_text_maps_to_zero_vector() {
        let client = stub_client(32);
        let v = client.embed_one("   ").await.unwrap();
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn batch_is_position_aligned() {
        let client = stub_client(64);
        let batch = client
            .embed(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();
        let alpha = client.embed_one("alpha").await.unwrap();
        let beta = client.embed_one("beta").await.unwrap();
        assert_eq!(batch[0], alpha);
        assert_eq!(batch[1], beta);
    }

    #[tokio::test]
    async fn distinct_texts_are_not_identical() {
        let client = stub_client(64);
        let a = client.embed_one("alpha").await.unwrap();
        let b = client.embed_one("beta").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn empty_batch_is_empty() {
        let client = stub_client(64);
        assert!(client.embed(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn normalize_zero_vector_stays_zero() {
        let mut v = vec![0.0f32; 8];
        l2_normalize(&mut v);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn blob_roundtrip() {
        let v = vec![1.0f32, -2.5, 3.125, 0.0];
        let blob = vec_to_blob(&v);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_vec(&blob, 4).unwrap(), v);
    }

    #[test]
    fn ragged_blob_is_corruption() {
        let err = blob_to_vec(&[0u8; 7], 2).unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn dims_mismatch_is_corruption() {
        let blob = vec_to_blob(&[1.0f32, 2.0]);
        let err = blob_to_vec(&blob, 3).unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn openai_response_parses_in_order() {
        let json = serde_json::json!({
            "data": [
                { "embedding": [1.0, 0.0] },
                { "embedding": [0.0, 1.0] }
            ]
        });
        let vecs = parse_openai_response(&json).unwrap();
        assert_eq!(vecs, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn malformed_openai_response_is_embedding_error() {
        let err = parse_openai_response(&serde_json::json!({})).unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }
}
