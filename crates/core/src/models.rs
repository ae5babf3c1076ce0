use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageMetadata {
    pub source: String,
    pub page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRecord {
    pub id: String,
    pub text: String,
    pub metadata: PageMetadata,
}

impl DocumentRecord {
    pub fn page_id(source: &str, page: u32) -> String {
        format!("{source}_page_{page}")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionManifest {
    pub name: String,
    pub metric: DistanceMetric,
    pub dimension: Option<usize>,
    pub created_at: DateTime<Utc>,
}

impl CollectionManifest {
    pub fn new(name: impl Into<String>, metric: DistanceMetric) -> Self {
        Self {
            name: name.into(),
            metric,
            dimension: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryHit {
    pub id: String,
    pub text: String,
    pub metadata: PageMetadata,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Hits(Vec<QueryHit>),
    CollectionNotFound {
        requested: String,
        available: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SearchQuery {
    pub text: String,
    pub collection: String,
    pub top_k: usize,
}

/// Knobs for a single ingestion run.
///
/// `batch_size` bounds how many pages go to the embeddings API per request;
/// the two delays keep the run under the provider's rate limits.
#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub retry_delay: Duration,
    pub max_page_chars: usize,
    pub progress_every: u32,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_pause: Duration::from_millis(500),
            retry_delay: Duration::from_secs(2),
            // ~8k tokens for text-embedding-3-small
            max_page_chars: 32_000,
            progress_every: 100,
        }
    }
}
