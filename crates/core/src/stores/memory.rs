use crate::embeddings::{cosine_similarity, CharacterNgramEmbedder, Embedder};
use crate::error::StoreError;
use crate::models::Chunk;
use crate::traits::VectorStore;
use async_trait::async_trait;
use std::cmp::Ordering;
use tokio::sync::RwLock;
use tracing::debug;

struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
}

pub struct InMemoryVectorStore<E = CharacterNgramEmbedder> {
    embedder: E,
    entries: RwLock<Vec<Entry>>,
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new(CharacterNgramEmbedder::default())
    }
}

impl<E: Embedder> InMemoryVectorStore<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        let vector = self.embedder.embed(text);
        if vector.len() != self.embedder.dimensions() {
            return Err(StoreError::DimensionMismatch {
                expected: self.embedder.dimensions(),
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}

#[async_trait]
impl<E: Embedder + Send + Sync> VectorStore for InMemoryVectorStore<E> {
    async fn add(&self, chunks: &[Chunk]) -> Result<(), StoreError> {
        let mut prepared = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            prepared.push(Entry {
                vector: self.embed(&chunk.text)?,
                chunk: chunk.clone(),
            });
        }

        let mut entries = self.entries.write().await;
        for entry in prepared {
            match entries.iter_mut().find(|stored| stored.chunk.id == entry.chunk.id) {
                Some(stored) => *stored = entry,
                None => entries.push(entry),
            }
        }
        debug!(added = chunks.len(), total = entries.len(), "chunks stored");
        Ok(())
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Chunk>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query = self.embed(query)?;
        let entries = self.entries.read().await;

        let mut scored: Vec<(f32, &Entry)> = entries
            .iter()
            .map(|entry| (cosine_similarity(&query, &entry.vector), entry))
            .collect();
        scored.sort_by(|left, right| right.0.partial_cmp(&left.0).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, entry)| entry.chunk.clone())
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.retain(|entry| !ids.contains(&entry.chunk.id));
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.entries.read().await.len())
    }
}
