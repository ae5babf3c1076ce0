pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod present;
pub mod status;
pub mod store;
pub mod stores;
pub mod traits;

pub use chunking::{plan_batches, truncate_chars};
pub use config::{
    ExpectedCount, ExpectedCounts, ManualSource, DEFAULT_COLLECTION, DEFAULT_STORE_DIR,
};
pub use embeddings::{
    HashingEmbedder, OpenAiConfig, OpenAiEmbedder, API_KEY_VARIABLE, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_OPENAI_BASE_URL,
};
pub use error::{IngestError, SearchError};
pub use extractor::{ExtractedPdf, ExtractionLimits, LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{
    build_records, ingest_manual, ingest_manuals, ManualReport, RunReport, SkippedManual,
};
pub use models::{
    CollectionManifest, DistanceMetric, DocumentRecord, IngestionOptions, PageMetadata, QueryHit,
    QueryOutcome, SearchQuery,
};
pub use orchestrator::SearchCoordinator;
pub use present::{preview, relevance_percent, PREVIEW_CHARS};
pub use status::{collect_status, directory_size, CollectionStatus, StoreStatus};
pub use stores::{LocalStore, MemoryStore};
pub use traits::{CollectionStore, EmbeddingFunction};
