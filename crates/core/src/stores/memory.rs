use crate::store::{check_batch, rank_by_distance, validate_collection_name};
use crate::traits::CollectionStore;
use crate::{CollectionManifest, DistanceMetric, DocumentRecord, QueryHit, SearchError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

struct MemoryCollection {
    manifest: CollectionManifest,
    records: Vec<DocumentRecord>,
    embeddings: Vec<Vec<f32>>,
}

/// Process-local store with the same semantics as [`LocalStore`](crate::LocalStore).
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, MemoryCollection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, MemoryCollection>>, SearchError> {
        self.collections
            .lock()
            .map_err(|_| SearchError::Request("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn list_collections(&self) -> Result<Vec<String>, SearchError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, SearchError> {
        validate_collection_name(name)?;
        Ok(self.lock()?.remove(name).is_some())
    }

    async fn create_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
    ) -> Result<CollectionManifest, SearchError> {
        validate_collection_name(name)?;
        let mut collections = self.lock()?;
        if collections.contains_key(name) {
            return Err(SearchError::CollectionExists(name.to_string()));
        }

        let manifest = CollectionManifest::new(name, metric);
        collections.insert(
            name.to_string(),
            MemoryCollection {
                manifest: manifest.clone(),
                records: Vec::new(),
                embeddings: Vec::new(),
            },
        );
        Ok(manifest)
    }

    async fn manifest(&self, name: &str) -> Result<Option<CollectionManifest>, SearchError> {
        Ok(self
            .lock()?
            .get(name)
            .map(|collection| collection.manifest.clone()))
    }

    async fn add(
        &self,
        name: &str,
        records: &[DocumentRecord],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError> {
        let mut collections = self.lock()?;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| SearchError::CollectionNotFound(name.to_string()))?;

        let dimension = check_batch(records, embeddings, collection.manifest.dimension)?;

        let mut seen = collection
            .records
            .iter()
            .map(|record| record.id.as_str())
            .collect::<HashSet<_>>();
        for record in records {
            if !seen.insert(record.id.as_str()) {
                return Err(SearchError::DuplicateId {
                    collection: name.to_string(),
                    id: record.id.clone(),
                });
            }
        }

        if !records.is_empty() {
            collection.manifest.dimension = Some(dimension);
        }
        collection.records.extend_from_slice(records);
        collection.embeddings.extend_from_slice(embeddings);
        Ok(())
    }

    async fn count(&self, name: &str) -> Result<usize, SearchError> {
        self.lock()?
            .get(name)
            .map(|collection| collection.records.len())
            .ok_or_else(|| SearchError::CollectionNotFound(name.to_string()))
    }

    async fn peek(&self, name: &str, limit: usize) -> Result<Vec<DocumentRecord>, SearchError> {
        self.lock()?
            .get(name)
            .map(|collection| collection.records.iter().take(limit).cloned().collect())
            .ok_or_else(|| SearchError::CollectionNotFound(name.to_string()))
    }

    async fn query(
        &self,
        name: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryHit>, SearchError> {
        let collections = self.lock()?;
        let collection = collections
            .get(name)
            .ok_or_else(|| SearchError::CollectionNotFound(name.to_string()))?;

        if let Some(expected) = collection.manifest.dimension {
            if query_vector.len() != expected {
                return Err(SearchError::DimensionMismatch {
                    expected,
                    actual: query_vector.len(),
                });
            }
        }

        Ok(rank_by_distance(
            collection
                .records
                .iter()
                .zip(collection.embeddings.iter().map(Vec::as_slice)),
            query_vector,
            top_k,
        ))
    }
}
