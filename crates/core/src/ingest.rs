use crate::chunking::plan_batches;
use crate::extractor::{ExtractedPdf, ExtractionLimits, PdfExtractor};
use crate::traits::{CollectionStore, EmbeddingFunction};
use crate::{
    DistanceMetric, DocumentRecord, IngestError, IngestionOptions, ManualSource, PageMetadata,
    SearchError,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

pub fn build_records(extracted: &ExtractedPdf) -> Vec<DocumentRecord> {
    extracted
        .pages
        .iter()
        .map(|page| DocumentRecord {
            id: DocumentRecord::page_id(&extracted.source, page.number),
            text: page.text.clone(),
            metadata: PageMetadata {
                source: extracted.source.clone(),
                page: page.number,
                total_pages: extracted.total_pages,
            },
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualReport {
    pub collection: String,
    pub total_pages: u32,
    pub records: usize,
    pub batches: usize,
    pub retried_batches: usize,
}

#[derive(Debug, Clone)]
pub struct SkippedManual {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub ingested: Vec<ManualReport>,
    pub skipped: Vec<SkippedManual>,
    pub failed: Vec<SkippedManual>,
}

/// Replaces `source.collection` with the pages of `source.pdf_path`.
pub async fn ingest_manual<X, E, S>(
    extractor: &X,
    embedder: &E,
    store: &S,
    source: &ManualSource,
    options: &IngestionOptions,
) -> Result<ManualReport, IngestError>
where
    X: PdfExtractor + ?Sized,
    E: EmbeddingFunction + Sync + ?Sized,
    S: CollectionStore + Sync + ?Sized,
{
    let limits = ExtractionLimits {
        max_page_chars: options.max_page_chars,
        progress_every: options.progress_every,
    };
    let extracted = extractor.extract(&source.pdf_path, limits)?;
    let records = build_records(&extracted);
    let batches = plan_batches(records.len(), options.batch_size)?;

    if records.is_empty() {
        warn!(path = %source.pdf_path.display(), "pdf has no readable page text");
    }

    let collection = source.collection.as_str();
    if store.delete_collection(collection).await? {
        info!(collection, "removed previous collection");
    }
    store
        .create_collection(collection, DistanceMetric::Cosine)
        .await?;
    info!(
        collection,
        model = embedder.model_name(),
        documents = records.len(),
        batches = batches.len(),
        "collection created"
    );

    let total = records.len();
    let mut retried_batches = 0;
    for (position, range) in batches.iter().enumerate() {
        let batch = &records[range.clone()];

        if let Err(first) = submit_batch(embedder, store, collection, batch).await {
            warn!(
                collection,
                start = range.start,
                end = range.end,
                error = %first,
                delay_ms = options.retry_delay.as_millis() as u64,
                "batch failed, retrying once"
            );
            pause(options.retry_delay).await;
            retried_batches += 1;

            submit_batch(embedder, store, collection, batch)
                .await
                .map_err(|retry_error| IngestError::BatchFailed {
                    start: range.start,
                    end: range.end,
                    source: retry_error,
                })?;
        }

        info!(collection, done = range.end, total, "batch stored");

        if position + 1 < batches.len() {
            pause(options.batch_pause).await;
        }
    }

    info!(collection, documents = total, "collection ready");

    Ok(ManualReport {
        collection: collection.to_string(),
        total_pages: extracted.total_pages,
        records: total,
        batches: batches.len(),
        retried_batches,
    })
}

/// Ingests each manual in turn; one manual failing does not stop the rest.
pub async fn ingest_manuals<X, E, S>(
    extractor: &X,
    embedder: &E,
    store: &S,
    sources: &[ManualSource],
    options: &IngestionOptions,
) -> RunReport
where
    X: PdfExtractor + ?Sized,
    E: EmbeddingFunction + Sync + ?Sized,
    S: CollectionStore + Sync + ?Sized,
{
    let mut report = RunReport::default();

    for source in sources {
        if !source.pdf_path.is_file() {
            warn!(path = %source.pdf_path.display(), "pdf not found, skipping");
            report.skipped.push(SkippedManual {
                path: source.pdf_path.clone(),
                reason: "file not found".to_string(),
            });
            continue;
        }

        info!(
            path = %source.pdf_path.display(),
            collection = %source.collection,
            "processing manual"
        );

        match ingest_manual(extractor, embedder, store, source, options).await {
            Ok(manual) => report.ingested.push(manual),
            Err(failure) => {
                let reason = error_chain(&failure);
                error!(
                    path = %source.pdf_path.display(),
                    error = %reason,
                    "ingestion failed"
                );
                report.failed.push(SkippedManual {
                    path: source.pdf_path.clone(),
                    reason,
                });
            }
        }
    }

    report
}

async fn submit_batch<E, S>(
    embedder: &E,
    store: &S,
    collection: &str,
    batch: &[DocumentRecord],
) -> Result<(), SearchError>
where
    E: EmbeddingFunction + Sync + ?Sized,
    S: CollectionStore + Sync + ?Sized,
{
    let texts = batch
        .iter()
        .map(|record| record.text.clone())
        .collect::<Vec<_>>();
    let embeddings = embedder.embed(&texts).await?;
    store.add(collection, batch, &embeddings).await
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut current = error.source();
    while let Some(cause) = current {
        let text = cause.to_string();
        // `#[from]` variants already print their source
        if !rendered.ends_with(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        current = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::PageText;
    use crate::{HashingEmbedder, MemoryStore};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;
    use tokio::time::Instant;

    struct FakeExtractor {
        total_pages: u32,
        pages: Vec<PageText>,
    }

    impl FakeExtractor {
        fn with_blank_pages(total_pages: u32, blank: &[u32]) -> Self {
            let pages = (1..=total_pages)
                .filter(|number| !blank.contains(number))
                .map(|number| PageText {
                    number,
                    text: format!("page {number} about user settings"),
                })
                .collect();
            Self { total_pages, pages }
        }
    }

    impl PdfExtractor for FakeExtractor {
        fn extract(
            &self,
            path: &Path,
            _limits: ExtractionLimits,
        ) -> Result<ExtractedPdf, IngestError> {
            Ok(ExtractedPdf {
                source: crate::extractor::source_stem(path)?,
                total_pages: self.total_pages,
                pages: self.pages.clone(),
            })
        }
    }

    /// Fails the calls whose zero-based index is listed in `fail_on`.
    struct FlakyEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
        fail_on: Vec<usize>,
        batch_sizes: Mutex<Vec<usize>>,
    }

    impl FlakyEmbedder {
        fn failing_on(fail_on: Vec<usize>) -> Self {
            Self {
                inner: HashingEmbedder::default(),
                calls: AtomicUsize::new(0),
                fail_on,
                batch_sizes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EmbeddingFunction for FlakyEmbedder {
        fn model_name(&self) -> &str {
            "flaky"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.batch_sizes.lock().unwrap().push(texts.len());
            if self.fail_on.contains(&call) {
                return Err(SearchError::BackendResponse {
                    backend: "openai".to_string(),
                    details: "429 Too Many Requests".to_string(),
                });
            }
            self.inner.embed(texts).await
        }
    }

    fn options(batch_size: usize) -> IngestionOptions {
        IngestionOptions {
            batch_size,
            batch_pause: Duration::ZERO,
            retry_delay: Duration::ZERO,
            ..IngestionOptions::default()
        }
    }

    fn paced(batch_size: usize) -> IngestionOptions {
        IngestionOptions {
            batch_size,
            ..IngestionOptions::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn batches_are_paced_by_the_batch_pause() -> Result<(), IngestError> {
        let store = MemoryStore::new();
        let source = ManualSource::new("manuals/Admin.pdf", "admin_manual");
        let started = Instant::now();

        let report = ingest_manual(
            &FakeExtractor::with_blank_pages(7, &[]),
            &HashingEmbedder::default(),
            &store,
            &source,
            &paced(3),
        )
        .await?;

        assert_eq!(report.batches, 3);
        // pauses sit between batches only, never after the last one
        assert_eq!(started.elapsed(), Duration::from_millis(1_000));
        assert_eq!(store.count("admin_manual").await?, 7);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn retried_batch_waits_the_retry_delay() -> Result<(), IngestError> {
        let embedder = FlakyEmbedder::failing_on(vec![1]);
        let store = MemoryStore::new();
        let source = ManualSource::new("manuals/Admin.pdf", "admin_manual");
        let started = Instant::now();

        let report = ingest_manual(
            &FakeExtractor::with_blank_pages(4, &[]),
            &embedder,
            &store,
            &source,
            &paced(2),
        )
        .await?;

        assert_eq!(report.retried_batches, 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        // one 500ms pause between the two batches plus the 2s retry delay
        assert_eq!(started.elapsed(), Duration::from_millis(2_500));
        assert_eq!(store.count("admin_manual").await?, 4);
        Ok(())
    }

    #[tokio::test]
    async fn blank_page_is_skipped_and_ids_follow_page_numbers() -> Result<(), IngestError> {
        let extractor = FakeExtractor::with_blank_pages(3, &[2]);
        let store = MemoryStore::new();
        let source = ManualSource::new("manuals/Guide.pdf", "guide");

        let report = ingest_manual(
            &extractor,
            &HashingEmbedder::default(),
            &store,
            &source,
            &options(50),
        )
        .await?;

        assert_eq!(report.records, 2);
        assert_eq!(report.total_pages, 3);
        let stored = store.peek("guide", 10).await?;
        let ids = stored.iter().map(|record| record.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["Guide_page_1", "Guide_page_3"]);
        assert!(stored.iter().all(|record| record.metadata.total_pages == 3));
        Ok(())
    }

    #[tokio::test]
    async fn documents_are_submitted_in_fixed_batches() -> Result<(), IngestError> {
        let extractor = FakeExtractor::with_blank_pages(7, &[]);
        let embedder = FlakyEmbedder::failing_on(Vec::new());
        let store = MemoryStore::new();

        let report = ingest_manual(
            &extractor,
            &embedder,
            &store,
            &ManualSource::new("Admin.pdf", "admin_manual"),
            &options(3),
        )
        .await?;

        assert_eq!(report.batches, 3);
        assert_eq!(*embedder.batch_sizes.lock().unwrap(), vec![3, 3, 1]);
        assert_eq!(store.count("admin_manual").await?, 7);
        Ok(())
    }

    #[tokio::test]
    async fn failed_batch_is_retried_once() -> Result<(), IngestError> {
        let extractor = FakeExtractor::with_blank_pages(4, &[]);
        let embedder = FlakyEmbedder::failing_on(vec![1]);
        let store = MemoryStore::new();

        let report = ingest_manual(
            &extractor,
            &embedder,
            &store,
            &ManualSource::new("Admin.pdf", "admin_manual"),
            &options(2),
        )
        .await?;

        assert_eq!(report.retried_batches, 1);
        assert_eq!(*embedder.batch_sizes.lock().unwrap(), vec![2, 2, 2]);
        assert_eq!(store.count("admin_manual").await?, 4);
        Ok(())
    }

    #[tokio::test]
    async fn second_failure_aborts_the_manual() {
        let extractor = FakeExtractor::with_blank_pages(4, &[]);
        let embedder = FlakyEmbedder::failing_on(vec![1, 2]);
        let store = MemoryStore::new();

        let result = ingest_manual(
            &extractor,
            &embedder,
            &store,
            &ManualSource::new("Admin.pdf", "admin_manual"),
            &options(2),
        )
        .await;

        assert!(matches!(
            result,
            Err(IngestError::BatchFailed { start: 2, end: 4, .. })
        ));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn reingestion_replaces_previous_content() -> Result<(), IngestError> {
        let store = MemoryStore::new();
        let embedder = HashingEmbedder::default();
        let source = ManualSource::new("Admin.pdf", "admin_manual");

        ingest_manual(
            &FakeExtractor::with_blank_pages(10, &[]),
            &embedder,
            &store,
            &source,
            &options(4),
        )
        .await?;
        assert_eq!(store.count("admin_manual").await?, 10);

        ingest_manual(
            &FakeExtractor::with_blank_pages(4, &[3]),
            &embedder,
            &store,
            &source,
            &options(4),
        )
        .await?;
        assert_eq!(store.count("admin_manual").await?, 3);
        Ok(())
    }

    #[tokio::test]
    async fn missing_files_are_skipped_and_others_processed(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let present = dir.path().join("User_Guide.pdf");
        std::fs::write(&present, b"placeholder")?;
        let sources = vec![
            ManualSource::new(dir.path().join("Admin.pdf"), "admin_manual"),
            ManualSource::new(&present, "user_manual"),
        ];
        let store = MemoryStore::new();

        let report = ingest_manuals(
            &FakeExtractor::with_blank_pages(2, &[]),
            &HashingEmbedder::default(),
            &store,
            &sources,
            &options(50),
        )
        .await;

        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].path.ends_with("Admin.pdf"));
        assert_eq!(report.ingested.len(), 1);
        assert_eq!(report.ingested[0].collection, "user_manual");
        assert_eq!(store.list_collections().await?, vec!["user_manual".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn failing_manual_does_not_stop_the_run() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let broken = dir.path().join("Admin.pdf");
        let fine = dir.path().join("User_Guide.pdf");
        std::fs::write(&broken, b"%PDF-1.4\n%broken")?;
        std::fs::write(&fine, b"placeholder")?;

        struct PickyExtractor(FakeExtractor);
        impl PdfExtractor for PickyExtractor {
            fn extract(
                &self,
                path: &Path,
                limits: ExtractionLimits,
            ) -> Result<ExtractedPdf, IngestError> {
                if path.ends_with("Admin.pdf") {
                    return Err(IngestError::PdfParse("bad xref".to_string()));
                }
                self.0.extract(path, limits)
            }
        }

        let store = MemoryStore::new();
        let report = ingest_manuals(
            &PickyExtractor(FakeExtractor::with_blank_pages(1, &[])),
            &HashingEmbedder::default(),
            &store,
            &[
                ManualSource::new(&broken, "admin_manual"),
                ManualSource::new(&fine, "user_manual"),
            ],
            &options(50),
        )
        .await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.ingested.len(), 1);
        assert_eq!(store.count("user_manual").await?, 1);
        Ok(())
    }

    #[test]
    fn error_chain_includes_sources() {
        let failure = IngestError::BatchFailed {
            start: 0,
            end: 50,
            source: SearchError::Request("timeout".to_string()),
        };
        let rendered = error_chain(&failure);
        assert_eq!(
            rendered,
            "batch 0-50 failed after retry: search request failed: timeout"
        );
    }
}
