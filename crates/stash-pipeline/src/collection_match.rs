//! Embedding-based collection resolution.
//!
//! Resolving an ADD_TO_COLLECTION action embeds the proposed category and
//! the user's existing collection names, then reuses the best cosine match
//! above a threshold instead of sprouting near-duplicate collections
//! ("ml-papers" vs "ML Papers"). Without an embedding backend, or when the
//! backend fails, resolution degrades to a case-insensitive name match.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use uuid::Uuid;

use stash_core::{
    defaults, find_most_similar, Collection, CollectionRepository, EmbeddingBackend, Error,
    Result,
};

/// Resolves category names to concrete collections.
pub struct CollectionMatcher {
    collections: Arc<dyn CollectionRepository>,
    embedder: Option<Arc<dyn EmbeddingBackend>>,
    /// In-process embedding cache keyed by content hash.
    cache: Mutex<HashMap<String, Vec<f32>>>,
    threshold: f32,
}

impl CollectionMatcher {
    pub fn new(
        collections: Arc<dyn CollectionRepository>,
        embedder: Option<Arc<dyn EmbeddingBackend>>,
    ) -> Self {
        Self {
            collections,
            embedder,
            cache: Mutex::new(HashMap::new()),
            threshold: defaults::COLLECTION_MATCH_THRESHOLD,
        }
    }

    /// Override the reuse threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Resolve `category` to an existing or new collection for the user.
    pub async fn resolve(&self, user_id: Uuid, category: &str) -> Result<Collection> {
        let category = category.trim();
        if category.is_empty() {
            return Err(Error::InvalidInput(
                "Category name cannot be empty".to_string(),
            ));
        }

        let existing = self.collections.list_for_user(user_id).await?;
        if existing.is_empty() {
            return self.collections.get_or_create(user_id, category).await;
        }

        // Exact (case-insensitive) name match needs no embedding call
        if let Some(hit) = existing
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(category))
        {
            return Ok(hit.clone());
        }

        if let Some(embedder) = &self.embedder {
            match self.best_semantic_match(embedder, category, &existing).await {
                Ok(Some((collection, score))) if score >= self.threshold => {
                    debug!(
                        subsystem = "pipeline",
                        component = "collection_match",
                        category,
                        matched = %collection.name,
                        score,
                        "Reusing existing collection"
                    );
                    return Ok(collection);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        subsystem = "pipeline",
                        component = "collection_match",
                        error = %e,
                        degraded = true,
                        "Embedding match failed, falling back to name match"
                    );
                }
            }
        }

        self.collections.get_or_create(user_id, category).await
    }

    /// Best existing collection by embedding similarity, with its score.
    async fn best_semantic_match(
        &self,
        embedder: &Arc<dyn EmbeddingBackend>,
        category: &str,
        existing: &[Collection],
    ) -> Result<Option<(Collection, f32)>> {
        let query = self.embed_cached(embedder, category).await?;

        let mut candidates = Vec::with_capacity(existing.len());
        for collection in existing {
            let embedding = self.embed_cached(embedder, &collection.name).await?;
            candidates.push((collection.name.clone(), embedding));
        }

        // Collection names are unique per user, so the label maps back
        let Some((label, score)) = find_most_similar(&query, &candidates) else {
            return Ok(None);
        };
        Ok(existing
            .iter()
            .find(|c| c.name == label)
            .map(|c| (c.clone(), score)))
    }

    /// Embed text, consulting the in-process cache first.
    async fn embed_cached(
        &self,
        embedder: &Arc<dyn EmbeddingBackend>,
        text: &str,
    ) -> Result<Vec<f32>> {
        let key = format!("{:x}", md5::compute(text.to_lowercase().as_bytes()));
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            return Ok(cached.clone());
        }

        let mut vectors = embedder.embed_texts(&[text.to_string()]).await?;
        let vector = if vectors.is_empty() {
            return Err(Error::Embedding("Backend returned no vectors".to_string()));
        } else {
            vectors.swap_remove(0)
        };

        self.cache.lock().unwrap().insert(key, vector.clone());
        Ok(vector)
    }
}
