//! Shared wiring for the end-to-end tests
#![allow(dead_code)]

use ingest_core::application::{
    ChunkConfig, IngestionPipeline, IngestionService, RecoveryService, RetryPolicy, Worker,
    WorkerConfig,
};
use ingest_core::domain::{
    Document, DocumentStatus, DocumentVersion, ParseStatus, ParserType,
};
use ingest_core::port::id_provider::mocks::SequentialIdProvider;
use ingest_core::port::object_store::mocks::InMemoryObjectStore;
use ingest_core::port::time_provider::mocks::ManualTimeProvider;
use ingest_core::port::{
    DocumentRepository, IdProvider, JobRepository, ObjectStore, TimeProvider,
    TransactionalJobRepository,
};
use ingest_infra_sqlite::{
    create_pool, run_migrations, SqliteDocumentRepository, SqliteJobRepository,
};
use std::sync::Arc;

pub const T0: i64 = 1_700_000_000_000;
pub const LEASE_TIMEOUT_MS: i64 = 300_000;
pub const TENANT: &str = "t1";
pub const WORKSPACE: &str = "w1";
pub const KB: &str = "kb1";

pub struct Harness {
    pub clock: Arc<ManualTimeProvider>,
    pub jobs: Arc<SqliteJobRepository>,
    pub docs: Arc<SqliteDocumentRepository>,
    pub store: Arc<InMemoryObjectStore>,
    pub ids: Arc<SequentialIdProvider>,
}

impl Harness {
    pub async fn in_memory() -> Self {
        Self::with_url("sqlite::memory:").await
    }

    pub async fn with_url(url: &str) -> Self {
        let pool = create_pool(url).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let clock = Arc::new(ManualTimeProvider::new(T0));
        let time: Arc<dyn TimeProvider> = clock.clone();
        Self {
            jobs: Arc::new(SqliteJobRepository::new(pool.clone(), time)),
            docs: Arc::new(SqliteDocumentRepository::new(pool)),
            store: Arc::new(InMemoryObjectStore::new()),
            ids: Arc::new(SequentialIdProvider::new("id")),
            clock,
        }
    }

    pub fn service(&self, max_attempts: i32) -> IngestionService {
        self.service_with_store(self.store.clone(), max_attempts)
    }

    pub fn service_with_store(
        &self,
        store: Arc<dyn ObjectStore>,
        max_attempts: i32,
    ) -> IngestionService {
        IngestionService::new(
            self.jobs.clone(),
            self.docs.clone(),
            store,
            self.ids.clone(),
            self.clock.clone(),
            max_attempts,
        )
    }

    pub fn worker(&self, worker_id: &str) -> Worker {
        self.worker_with_store(worker_id, self.store.clone())
    }

    pub fn worker_with_store(&self, worker_id: &str, store: Arc<dyn ObjectStore>) -> Worker {
        let job_repo: Arc<dyn JobRepository> = self.jobs.clone();
        let tx_repo: Arc<dyn TransactionalJobRepository> = self.jobs.clone();
        Worker::new(
            WorkerConfig {
                worker_id: worker_id.to_string(),
                lease_timeout_ms: LEASE_TIMEOUT_MS,
                ..WorkerConfig::default()
            },
            job_repo,
            tx_repo,
            self.pipeline_with_store(store),
            RetryPolicy::default(),
            self.clock.clone(),
        )
    }

    /// Pipeline over the harness store, for driving one attempt by hand
    pub fn pipeline(&self) -> IngestionPipeline {
        self.pipeline_with_store(self.store.clone())
    }

    pub fn pipeline_with_store(&self, store: Arc<dyn ObjectStore>) -> IngestionPipeline {
        let job_repo: Arc<dyn JobRepository> = self.jobs.clone();
        let tx_repo: Arc<dyn TransactionalJobRepository> = self.jobs.clone();
        let doc_repo: Arc<dyn DocumentRepository> = self.docs.clone();
        let ids: Arc<dyn IdProvider> = self.ids.clone();
        IngestionPipeline::new(
            job_repo,
            tx_repo,
            doc_repo,
            store,
            ids,
            ChunkConfig::default(),
        )
    }

    pub fn recovery(&self) -> RecoveryService {
        RecoveryService::new(self.jobs.clone(), self.jobs.clone(), LEASE_TIMEOUT_MS)
    }

    /// Document `doc` with version 1 `ver`, stored at `object_key`
    pub async fn seed_document(&self, doc: &str, ver: &str, object_key: &str, parser: ParserType) {
        let document = Document {
            id: doc.into(),
            tenant_id: TENANT.into(),
            workspace_id: WORKSPACE.into(),
            kb_id: KB.into(),
            title: format!("{}.md", doc),
            source_uri: Some(format!("{}.md", doc)),
            current_version: 1,
            status: DocumentStatus::Pending,
            created_at: T0,
            updated_at: T0,
        };
        let version = DocumentVersion {
            id: ver.into(),
            tenant_id: TENANT.into(),
            document_id: doc.into(),
            version: 1,
            object_key: object_key.into(),
            parser_type: parser,
            parse_status: ParseStatus::Pending,
            checksum: None,
            created_at: T0,
        };
        self.docs.save_upload(&document, &version, None).await.unwrap();
    }

    pub async fn document_status(&self, doc: &str) -> DocumentStatus {
        self.docs
            .find_document(TENANT, doc)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    pub async fn parse_status(&self, doc: &str, version: i32) -> ParseStatus {
        self.docs
            .find_version(doc, version)
            .await
            .unwrap()
            .unwrap()
            .parse_status
    }
}

pub fn enqueue_request(doc: &str, ver: &str) -> ingest_core::application::ingestion::EnqueueRequest {
    ingest_core::application::ingestion::EnqueueRequest {
        tenant_id: TENANT.into(),
        workspace_id: WORKSPACE.into(),
        kb_id: KB.into(),
        document_id: doc.into(),
        document_version_id: ver.into(),
        action: "upload".into(),
        idempotency_key: None,
    }
}
