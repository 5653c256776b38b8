use crate::error::StoreError;
use crate::models::Chunk;
use async_trait::async_trait;

#[async_trait]
pub trait VectorStore {
    async fn add(&self, chunks: &[Chunk]) -> Result<(), StoreError>;

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Chunk>, StoreError>;

    async fn delete(&self, ids: &[String]) -> Result<(), StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}
