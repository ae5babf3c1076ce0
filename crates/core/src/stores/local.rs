use crate::store::{check_batch, rank_by_distance, validate_collection_name};
use crate::traits::CollectionStore;
use crate::{CollectionManifest, DistanceMetric, DocumentRecord, QueryHit, SearchError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

const MANIFEST_FILE: &str = "manifest.json";
const RECORDS_FILE: &str = "records.jsonl";
const IDS_FILE: &str = "ids.txt";

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    #[serde(flatten)]
    record: DocumentRecord,
    embedding: Vec<f32>,
}

/// Directory-backed collection store.
///
/// Each collection lives in `<root>/<name>/` as a `manifest.json` plus a
/// `records.jsonl` with one record and its embedding per line. Batches are
/// appended with a single write; their ids also go to `ids.txt` so duplicate
/// checks and counts never parse the embeddings.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collection_dir(&self, name: &str) -> Result<PathBuf, SearchError> {
        validate_collection_name(name)?;
        Ok(self.root.join(name))
    }

    async fn read_manifest(&self, name: &str) -> Result<Option<CollectionManifest>, SearchError> {
        let path = self.collection_dir(name)?.join(MANIFEST_FILE);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn require_manifest(&self, name: &str) -> Result<CollectionManifest, SearchError> {
        self.read_manifest(name)
            .await?
            .ok_or_else(|| SearchError::CollectionNotFound(name.to_string()))
    }

    async fn write_manifest(&self, manifest: &CollectionManifest) -> Result<(), SearchError> {
        let path = self.collection_dir(&manifest.name)?.join(MANIFEST_FILE);
        fs::write(path, serde_json::to_vec_pretty(manifest)?).await?;
        Ok(())
    }

    async fn read_lines(&self, name: &str) -> Result<String, SearchError> {
        let path = self.collection_dir(name)?.join(RECORDS_FILE);
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(contents),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(error) => Err(error.into()),
        }
    }

    async fn read_records(&self, name: &str) -> Result<Vec<StoredRecord>, SearchError> {
        let contents = self.read_lines(name).await?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(SearchError::from))
            .collect()
    }

    async fn read_ids(&self, name: &str) -> Result<Vec<String>, SearchError> {
        let path = self.collection_dir(name)?.join(IDS_FILE);
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(contents
                .lines()
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(error) => Err(error.into()),
        }
    }

    /// Parses at most `limit` leading records without loading the file.
    async fn read_leading_records(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, SearchError> {
        let path = self.collection_dir(name)?.join(RECORDS_FILE);
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        let mut lines = BufReader::new(file).lines();
        let mut records = Vec::new();
        while records.len() < limit {
            let Some(line) = lines.next_line().await? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

async fn append(path: &Path, bytes: &[u8]) -> Result<(), SearchError> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}

#[async_trait]
impl CollectionStore for LocalStore {
    async fn list_collections(&self) -> Result<Vec<String>, SearchError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if validate_collection_name(&name).is_err() {
                continue;
            }
            if fs::try_exists(entry.path().join(MANIFEST_FILE)).await? {
                names.push(name);
            }
        }

        names.sort_unstable();
        Ok(names)
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, SearchError> {
        let dir = self.collection_dir(name)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(collection = name, path = %dir.display(), "collection directory removed");
                Ok(true)
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    async fn create_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
    ) -> Result<CollectionManifest, SearchError> {
        let dir = self.collection_dir(name)?;
        if fs::try_exists(dir.join(MANIFEST_FILE)).await? {
            return Err(SearchError::CollectionExists(name.to_string()));
        }

        fs::create_dir_all(&dir).await?;
        let manifest = CollectionManifest::new(name, metric);
        self.write_manifest(&manifest).await?;
        fs::write(dir.join(RECORDS_FILE), b"").await?;
        fs::write(dir.join(IDS_FILE), b"").await?;
        Ok(manifest)
    }

    async fn manifest(&self, name: &str) -> Result<Option<CollectionManifest>, SearchError> {
        self.read_manifest(name).await
    }

    async fn add(
        &self,
        name: &str,
        records: &[DocumentRecord],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError> {
        let mut manifest = self.require_manifest(name).await?;
        let dimension = check_batch(records, embeddings, manifest.dimension)?;
        if records.is_empty() {
            return Ok(());
        }

        let mut seen = self.read_ids(name).await?.into_iter().collect::<HashSet<_>>();
        for record in records {
            if !seen.insert(record.id.clone()) {
                return Err(SearchError::DuplicateId {
                    collection: name.to_string(),
                    id: record.id.clone(),
                });
            }
        }

        let mut buffer = Vec::new();
        let mut ids = String::new();
        for (record, embedding) in records.iter().zip(embeddings) {
            let stored = StoredRecord {
                record: record.clone(),
                embedding: embedding.clone(),
            };
            serde_json::to_writer(&mut buffer, &stored)?;
            buffer.push(b'\n');
            ids.push_str(&record.id);
            ids.push('\n');
        }

        let dir = self.collection_dir(name)?;
        append(&dir.join(RECORDS_FILE), &buffer).await?;
        append(&dir.join(IDS_FILE), ids.as_bytes()).await?;

        if manifest.dimension.is_none() {
            manifest.dimension = Some(dimension);
            self.write_manifest(&manifest).await?;
        }

        Ok(())
    }

    async fn count(&self, name: &str) -> Result<usize, SearchError> {
        self.require_manifest(name).await?;
        Ok(self.read_ids(name).await?.len())
    }

    async fn peek(&self, name: &str, limit: usize) -> Result<Vec<DocumentRecord>, SearchError> {
        self.require_manifest(name).await?;
        Ok(self
            .read_leading_records(name, limit)
            .await?
            .into_iter()
            .map(|stored| stored.record)
            .collect())
    }

    async fn query(
        &self,
        name: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryHit>, SearchError> {
        let manifest = self.require_manifest(name).await?;
        if let Some(expected) = manifest.dimension {
            if query_vector.len() != expected {
                return Err(SearchError::DimensionMismatch {
                    expected,
                    actual: query_vector.len(),
                });
            }
        }

        let stored = self.read_records(name).await?;
        Ok(rank_by_distance(
            stored
                .iter()
                .map(|item| (&item.record, item.embedding.as_slice())),
            query_vector,
            top_k,
        ))
    }
}
