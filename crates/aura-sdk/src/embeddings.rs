//! Embeddings and similarity scoring.
//!
//! Retrieval only depends on the [`Embedder`] trait and [`cosine_similarity`];
//! the concrete embedding function is swappable.
//!
//! - [`HashEmbedder`]: deterministic 1536-dimension placeholder, no model needed
//! - [`CachedEmbedder`]: moka TTL cache in front of any embedder
//! - `FastEmbedder`: local all-MiniLM-L6-v2 inference (`embeddings` feature)
//!
//! # Usage
//!
//! ```rust
//! use aura_sdk::embeddings::{cosine_similarity, Embedder, HashEmbedder};
//!
//! # async fn demo() -> aura_core::Result<()> {
//! let embedder = HashEmbedder::default();
//! let a = embedder.embed("kinetic typography").await?;
//! let b = embedder.embed("kinetic typography").await?;
//! assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use aura_core::{Error, Result};
use moka::sync::Cache;

use crate::utils::content_hash;

/// Dimensions of the placeholder hash embedding
pub const HASH_EMBEDDING_DIMENSIONS: usize = 1536;

/// Text to fixed-length vector.
///
/// Identical input must yield an identical vector for the lifetime of the
/// embedder.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Cosine of the angle between two vectors, in `[-1, 1]`.
///
/// Returns 0 when either vector is empty, the lengths differ, or either has
/// zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Indices and scores of the `top_k` documents most similar to `query`,
/// best first. Equal scores keep document order.
pub fn find_similar(query: &[f32], documents: &[Vec<f32>], top_k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| (i, cosine_similarity(query, doc)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);
    scored
}

// ─────────────────────────────────────────────────────────────────────────────
// Hash embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Deterministic placeholder embedding: `v[i] = sin(h + i) * cos(h * i)`
/// where `h` is a 32-bit rolling hash of the text's UTF-16 code units.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(HASH_EMBEDDING_DIMENSIONS)
    }
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Compute the vector synchronously
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let hash = f64::from(string_hash(text));
        (0..self.dimensions)
            .map(|i| {
                let i = i as f64;
                ((hash + i).sin() * (hash * i).cos()) as f32
            })
            .collect()
    }
}

fn string_hash(text: &str) -> i32 {
    text.encode_utf16().fold(0i32, |hash, c| {
        hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(i32::from(c))
    })
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "hash-placeholder"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────────────────────────

/// Embedding cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: u64,
    pub capacity: u64,
    pub hits: u64,
    pub misses: u64,
}

/// TTL + capacity bounded cache in front of another embedder.
///
/// Keys are SHA-256 content hashes. Eviction and expiry are handled by moka.
pub struct CachedEmbedder<E> {
    inner: E,
    capacity: u64,
    cache: Cache<String, Vec<f32>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<E: Embedder> CachedEmbedder<E> {
    /// Default TTL (1 hour) and capacity (1000)
    pub fn new(inner: E) -> Self {
        Self::with_limits(inner, Duration::from_secs(3600), 1000)
    }

    pub fn with_limits(inner: E, ttl: Duration, capacity: u64) -> Self {
        let capacity = capacity.max(1);
        let cache = Cache::builder().max_capacity(capacity).time_to_live(ttl).build();

        Self {
            inner,
            capacity,
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Flush pending evictions and drop expired entries
    pub fn clear_expired(&self) {
        self.cache.run_pending_tasks();
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks();
        CacheStats {
            entries: self.cache.entry_count(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn lookup(&self, key: &str) -> Option<Vec<f32>> {
        let hit = self.cache.get(key);
        let counter = if hit.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = content_hash(text);
        if let Some(vector) = self.lookup(&key) {
            tracing::debug!("embedding cache hit");
            return Ok(vector);
        }

        let vector = self.inner.embed(text).await?;
        self.cache.insert(key, vector.clone());
        Ok(vector)
    }

    /// Only uncached texts reach the inner embedder, in one batch
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let keys: Vec<String> = texts.iter().map(|t| content_hash(t)).collect();
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut missing = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            let hit = self.lookup(key);
            if hit.is_none() {
                missing.push(i);
            }
            results.push(hit);
        }

        tracing::debug!(hits = texts.len() - missing.len(), total = texts.len(), "embedding cache batch");

        if !missing.is_empty() {
            let uncached: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed_batch(&uncached).await?;
            if fresh.len() != missing.len() {
                return Err(Error::Other(format!(
                    "embedder returned {} vectors for {} texts",
                    fresh.len(),
                    missing.len()
                )));
            }
            for (i, vector) in missing.into_iter().zip(fresh) {
                self.cache.insert(keys[i].clone(), vector.clone());
                results[i] = Some(vector);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Local model (fastembed)
// ─────────────────────────────────────────────────────────────────────────────

/// Embedding dimensions for all-MiniLM-L6-v2
#[cfg(feature = "embeddings")]
pub const MINILM_DIMENSIONS: usize = 384;

/// Local all-MiniLM-L6-v2 embedder, loaded on first use
#[cfg(feature = "embeddings")]
pub struct FastEmbedder {
    model: tokio::sync::RwLock<Option<fastembed::TextEmbedding>>,
}

#[cfg(feature = "embeddings")]
impl Default for FastEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "embeddings")]
impl FastEmbedder {
    pub fn new() -> Self {
        Self {
            model: tokio::sync::RwLock::new(None),
        }
    }

    async fn ensure_model(&self) -> Result<()> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        if self.model.read().await.is_some() {
            return Ok(());
        }

        let mut guard = self.model.write().await;
        if guard.is_some() {
            return Ok(());
        }

        tracing::info!("Loading embedding model: all-MiniLM-L6-v2");
        let start = std::time::Instant::now();

        let mut init_options = InitOptions::default();
        init_options.model_name = EmbeddingModel::AllMiniLML6V2;
        init_options.show_download_progress = false;

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| Error::Other(format!("Failed to load embedding model: {}", e)))?;

        tracing::info!("Embedding model loaded in {:?}", start.elapsed());
        *guard = Some(model);
        Ok(())
    }

    /// Check if the model is loaded
    pub async fn is_loaded(&self) -> bool {
        self.model.read().await.is_some()
    }
}

#[cfg(feature = "embeddings")]
#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| Error::Other("No embedding generated".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_model().await?;

        let guard = self.model.read().await;
        let model = guard
            .as_ref()
            .ok_or_else(|| Error::Other("Embedding model not initialized".into()))?;

        model
            .embed(texts.to_vec(), None)
            .map_err(|e| Error::Other(format!("Failed to generate embeddings: {}", e)))
    }

    fn dimensions(&self) -> usize {
        MINILM_DIMENSIONS
    }

    fn model_name(&self) -> &str {
        "all-MiniLM-L6-v2"
    }
}
