use crate::{
    CollectionManifest, DistanceMetric, DocumentRecord, QueryHit, SearchError,
};
use async_trait::async_trait;

/// Maps a batch of strings to a batch of fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingFunction {
    fn model_name(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;
}

/// Named collections of document records and their embeddings.
#[async_trait]
pub trait CollectionStore {
    async fn list_collections(&self) -> Result<Vec<String>, SearchError>;

    /// Returns whether a collection was actually removed.
    async fn delete_collection(&self, name: &str) -> Result<bool, SearchError>;

    async fn create_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
    ) -> Result<CollectionManifest, SearchError>;

    async fn manifest(&self, name: &str) -> Result<Option<CollectionManifest>, SearchError>;

    async fn add(
        &self,
        name: &str,
        records: &[DocumentRecord],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError>;

    async fn count(&self, name: &str) -> Result<usize, SearchError>;

    async fn peek(&self, name: &str, limit: usize) -> Result<Vec<DocumentRecord>, SearchError>;

    async fn query(
        &self,
        name: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryHit>, SearchError>;
}
