use crate::traits::CollectionStore;
use crate::{ExpectedCounts, PageMetadata, SearchError};
use chrono::{DateTime, Utc};
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionStatus {
    pub name: String,
    pub count: usize,
    pub expected: Option<usize>,
    pub sample: Option<PageMetadata>,
    pub created_at: Option<DateTime<Utc>>,
}

impl CollectionStatus {
    pub fn progress_percent(&self) -> Option<f64> {
        match self.expected {
            Some(expected) if expected > 0 => Some(self.count as f64 / expected as f64 * 100.0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreStatus {
    Missing,
    Empty,
    Ready {
        collections: Vec<CollectionStatus>,
        total_bytes: u64,
    },
}

/// Read-only snapshot of the store rooted at `store_dir`.
pub async fn collect_status<S>(
    store: &S,
    store_dir: &Path,
    expected: &ExpectedCounts,
) -> Result<StoreStatus, SearchError>
where
    S: CollectionStore + Sync + ?Sized,
{
    if !store_dir.is_dir() {
        return Ok(StoreStatus::Missing);
    }

    let names = store.list_collections().await?;
    if names.is_empty() {
        return Ok(StoreStatus::Empty);
    }

    let mut collections = Vec::with_capacity(names.len());
    for name in names {
        let count = store.count(&name).await?;
        let sample = store
            .peek(&name, 1)
            .await?
            .into_iter()
            .next()
            .map(|record| record.metadata);
        let created_at = store.manifest(&name).await?.map(|manifest| manifest.created_at);

        collections.push(CollectionStatus {
            expected: expected.get(&name),
            name,
            count,
            sample,
            created_at,
        });
    }

    Ok(StoreStatus::Ready {
        collections,
        total_bytes: directory_size(store_dir),
    })
}

/// Sum of regular-file sizes below `root`; unreadable entries count as zero.
pub fn directory_size(root: &Path) -> u64 {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}
