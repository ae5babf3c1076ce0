use crate::traits::{CollectionStore, EmbeddingFunction};
use crate::{QueryOutcome, SearchError, SearchQuery};
use tracing::{debug, info};

/// Embeds query text and runs it against one collection of the store.
///
/// The embedder must be the one the collection was built with; distances
/// between vectors of different models are meaningless.
pub struct SearchCoordinator<E, S>
where
    E: EmbeddingFunction,
    S: CollectionStore,
{
    embedder: E,
    store: S,
}

impl<E, S> SearchCoordinator<E, S>
where
    E: EmbeddingFunction + Send + Sync,
    S: CollectionStore + Send + Sync,
{
    pub fn new(embedder: E, store: S) -> Self {
        Self { embedder, store }
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<QueryOutcome, SearchError> {
        if query.text.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }
        if query.top_k == 0 {
            return Err(SearchError::Request(
                "number of results must be at least 1".to_string(),
            ));
        }

        let available = self.store.list_collections().await?;
        if !available.iter().any(|name| name == &query.collection) {
            return Ok(QueryOutcome::CollectionNotFound {
                requested: query.collection.clone(),
                available,
            });
        }

        let mut vectors = self.embedder.embed(&[query.text.clone()]).await?;
        let query_vector = vectors.pop().ok_or_else(|| SearchError::BackendResponse {
            backend: self.embedder.model_name().to_string(),
            details: "no embedding returned for query".to_string(),
        })?;
        debug!(dimension = query_vector.len(), "query embedded");

        let hits = match self
            .store
            .query(&query.collection, &query_vector, query.top_k)
            .await
        {
            Ok(hits) => hits,
            // dropped between listing and querying by a concurrent ingest
            Err(SearchError::CollectionNotFound(_)) => {
                return Ok(QueryOutcome::CollectionNotFound {
                    requested: query.collection.clone(),
                    available: self.store.list_collections().await?,
                });
            }
            Err(error) => return Err(error),
        };

        info!(
            collection = %query.collection,
            requested = query.top_k,
            returned = hits.len(),
            "query complete"
        );
        Ok(QueryOutcome::Hits(hits))
    }
}
