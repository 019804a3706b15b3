//! Catalog registry service
//!
//! Holds the immutable server catalog and answers semantic search queries
//! against embeddings computed once at initialization.

use crate::embedding::EmbeddingProvider;
use crate::error::{Result, RouterError};
use crate::registry::types::{DiscoveryMatch, ServerEntry};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Search tunables for the registry
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Absolute cosine-similarity floor
    pub similarity_threshold: f64,
    /// Fraction of the top score below which survivors are discarded
    pub relative_score_cutoff: f64,
    /// Max results returned (None = all surviving)
    pub top_k: Option<usize>,
}

/// Immutable server catalog with in-memory embeddings and semantic search
pub struct CatalogRegistry {
    entries: Vec<ServerEntry>,
    by_handle: HashMap<String, usize>,
    provider: Arc<dyn EmbeddingProvider>,
    params: SearchParams,
    /// One vector per entry, parallel to `entries`; empty until `initialize`
    vectors: RwLock<Vec<Vec<f32>>>,
}

impl CatalogRegistry {
    /// Create a registry over the given catalog. Handles must be unique.
    pub fn new(
        entries: Vec<ServerEntry>,
        provider: Arc<dyn EmbeddingProvider>,
        params: SearchParams,
    ) -> Result<Self> {
        let mut by_handle = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            if by_handle.insert(entry.handle.clone(), idx).is_some() {
                return Err(RouterError::registry(format!(
                    "duplicate catalog handle '{}'",
                    entry.handle
                )));
            }
        }

        Ok(Self {
            entries,
            by_handle,
            provider,
            params,
            vectors: RwLock::new(Vec::new()),
        })
    }

    /// Compute embeddings for every catalog entry.
    ///
    /// Called once at startup; an embedding provider failure here is fatal
    /// to the caller since discovery would be meaningless without vectors.
    pub async fn initialize(&self) -> Result<usize> {
        if self.entries.is_empty() {
            info!("Catalog is empty, nothing to embed");
            return Ok(0);
        }

        let texts: Vec<String> = self.entries.iter().map(|e| e.embed_text()).collect();
        let vectors = self.provider.embed(&texts).await?;

        if vectors.len() != self.entries.len() {
            return Err(RouterError::embedding(format!(
                "provider returned {} vectors for {} entries",
                vectors.len(),
                self.entries.len()
            )));
        }

        let count = vectors.len();
        *self.vectors.write().await = vectors;
        info!("Cached embeddings for {} catalog entr(ies)", count);
        Ok(count)
    }

    /// Look up a catalog entry by handle
    pub fn entry(&self, handle: &str) -> Option<&ServerEntry> {
        self.by_handle.get(handle).map(|&idx| &self.entries[idx])
    }

    /// All catalog handles in insertion order
    pub fn handles(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.handle.clone()).collect()
    }

    /// Number of catalog entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Semantic search across the catalog.
    ///
    /// Entries in `excluded` or rejected by `healthy` never appear in the
    /// result. Each surviving entry is scored with the maximum cosine
    /// similarity across all query embeddings, filtered by the absolute
    /// threshold, then by the relative cutoff against the top score, and
    /// returned in descending score order (ties keep catalog insertion
    /// order). Unknown excluded handles are ignored.
    pub async fn search(
        &self,
        queries: &[String],
        excluded: &HashSet<String>,
        healthy: &(dyn Fn(&str) -> bool + Send + Sync),
    ) -> Result<Vec<DiscoveryMatch>> {
        if queries.is_empty() || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_vectors = self.provider.embed(queries).await?;
        let vectors = self.vectors.read().await;
        if vectors.is_empty() {
            return Err(RouterError::registry(
                "registry not initialized: no embeddings cached",
            ));
        }

        let mut scored: Vec<(usize, f64)> = Vec::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            if excluded.contains(&entry.handle) || !healthy(&entry.handle) {
                continue;
            }

            let score = query_vectors
                .iter()
                .map(|q| cosine_similarity(q, &vectors[idx]))
                .fold(f64::MIN, f64::max);

            if score >= self.params.similarity_threshold {
                debug!(
                    "Catalog entry '{}' matched with score {:.3}",
                    entry.handle, score
                );
                scored.push((idx, score));
            }
        }

        if scored.is_empty() {
            return Ok(Vec::new());
        }

        let top_score = scored.iter().map(|&(_, s)| s).fold(f64::MIN, f64::max);
        let cutoff = top_score * self.params.relative_score_cutoff;
        scored.retain(|&(_, score)| score >= cutoff);

        // Stable sort keeps catalog insertion order on equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        if let Some(k) = self.params.top_k {
            scored.truncate(k);
        }

        Ok(scored
            .into_iter()
            .map(|(idx, score)| DiscoveryMatch {
                handle: self.entries[idx].handle.clone(),
                description: self.entries[idx].description.clone(),
                score,
            })
            .collect())
    }
}

/// Cosine similarity between two embeddings
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TransportSpec;
    use async_trait::async_trait;

    /// Maps texts to hand-picked vectors so scores are exact in tests
    struct FixedEmbeddings;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbeddings {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains("stock") || t.contains("Finance") {
                        vec![1.0, 0.0, 0.0]
                    } else if t.contains("news") || t.contains("News") {
                        vec![0.0, 1.0, 0.0]
                    } else {
                        vec![0.0, 0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    fn entry(handle: &str, name: &str, desc: &str) -> ServerEntry {
        ServerEntry {
            handle: handle.to_string(),
            display_name: name.to_string(),
            category: "test".to_string(),
            description: desc.to_string(),
            keywords: vec![],
            transport: TransportSpec::Http {
                url: "https://example.com/mcp".to_string(),
            },
        }
    }

    fn registry() -> CatalogRegistry {
        CatalogRegistry::new(
            vec![
                entry("fin-quotes", "Finance Quotes", "stock data"),
                entry("news-wire", "News Wire", "news headlines"),
            ],
            Arc::new(FixedEmbeddings),
            SearchParams {
                similarity_threshold: 0.35,
                relative_score_cutoff: 0.7,
                top_k: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_handles_rejected() {
        let result = CatalogRegistry::new(
            vec![entry("a", "A", "x"), entry("a", "A2", "y")],
            Arc::new(FixedEmbeddings),
            SearchParams {
                similarity_threshold: 0.35,
                relative_score_cutoff: 0.7,
                top_k: None,
            },
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_search_matches_by_similarity() {
        let registry = registry();
        registry.initialize().await.unwrap();

        let results = registry
            .search(
                &["stock price".to_string()],
                &HashSet::new(),
                &|_: &str| true,
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].handle, "fin-quotes");
        assert!(results[0].score > 0.99);
    }

    #[tokio::test]
    async fn test_search_empty_queries() {
        let registry = registry();
        registry.initialize().await.unwrap();

        let results = registry
            .search(&[], &HashSet::new(), &|_: &str| true)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_excludes_cached_handles() {
        let registry = registry();
        registry.initialize().await.unwrap();

        let mut excluded = HashSet::new();
        excluded.insert("fin-quotes".to_string());
        excluded.insert("not-in-catalog".to_string());

        let results = registry
            .search(&["stock price".to_string()], &excluded, &|_: &str| true)
            .await
            .unwrap();
        assert!(results.iter().all(|m| m.handle != "fin-quotes"));
    }

    #[tokio::test]
    async fn test_search_respects_health_predicate() {
        let registry = registry();
        registry.initialize().await.unwrap();

        let results = registry
            .search(&["stock price".to_string()], &HashSet::new(), &|h: &str| {
                h != "fin-quotes"
            })
            .await
            .unwrap();
        assert!(results.iter().all(|m| m.handle != "fin-quotes"));
    }

    #[tokio::test]
    async fn test_multiple_queries_take_max_score() {
        let registry = registry();
        registry.initialize().await.unwrap();

        let results = registry
            .search(
                &["stock price".to_string(), "news headlines".to_string()],
                &HashSet::new(),
                &|_: &str| true,
            )
            .await
            .unwrap();
        // Both entries are top matches for one of the queries; the relative
        // cutoff keeps both since their max scores are equal.
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_search_before_initialize_fails() {
        let registry = registry();
        let result = registry
            .search(
                &["stock price".to_string()],
                &HashSet::new(),
                &|_: &str| true,
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_top_k_truncation() {
        let registry = CatalogRegistry::new(
            vec![
                entry("fin-quotes", "Finance Quotes", "stock data"),
                entry("news-wire", "News Wire", "news headlines"),
            ],
            Arc::new(FixedEmbeddings),
            SearchParams {
                similarity_threshold: 0.35,
                relative_score_cutoff: 0.7,
                top_k: Some(1),
            },
        )
        .unwrap();
        registry.initialize().await.unwrap();

        let results = registry
            .search(
                &["stock price".to_string(), "news headlines".to_string()],
                &HashSet::new(),
                &|_: &str| true,
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
