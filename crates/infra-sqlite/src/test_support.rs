// Shared fixtures for the adapter tests

use crate::{create_pool, run_migrations, SqliteDocumentRepository, SqliteJobRepository};
use ingest_core::domain::{
    Document, DocumentStatus, DocumentVersion, IngestAction, IngestionJob, JobTarget,
    ParseStatus, ParserType,
};
use ingest_core::port::time_provider::mocks::ManualTimeProvider;
use ingest_core::port::{DocumentRepository, TimeProvider};
use std::sync::Arc;

pub const T0: i64 = 1_700_000_000_000;

pub struct Fixture {
    pub clock: Arc<ManualTimeProvider>,
    pub jobs: SqliteJobRepository,
    pub docs: SqliteDocumentRepository,
}

pub async fn fixture() -> Fixture {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let clock = Arc::new(ManualTimeProvider::new(T0));
    let time: Arc<dyn TimeProvider> = clock.clone();
    Fixture {
        jobs: SqliteJobRepository::new(pool.clone(), time),
        docs: SqliteDocumentRepository::new(pool),
        clock,
    }
}

/// Insert document `doc` with version `ver` (object key `obj/{ver}`)
pub async fn seed_version(docs: &SqliteDocumentRepository, doc: &str, ver: &str) {
    let document = Document {
        id: doc.into(),
        tenant_id: "t1".into(),
        workspace_id: "w1".into(),
        kb_id: "kb1".into(),
        title: format!("{}.md", doc),
        source_uri: Some(format!("{}.md", doc)),
        current_version: 1,
        status: DocumentStatus::Pending,
        created_at: T0,
        updated_at: T0,
    };
    let version = DocumentVersion {
        id: ver.into(),
        tenant_id: "t1".into(),
        document_id: doc.into(),
        version: 1,
        object_key: format!("obj/{}", ver),
        parser_type: ParserType::Markdown,
        parse_status: ParseStatus::Pending,
        checksum: None,
        created_at: T0,
    };
    docs.save_upload(&document, &version, None).await.unwrap();
}

pub fn queued_job(id: &str, doc: &str, ver: &str, created_at: i64, max_attempts: i32) -> IngestionJob {
    IngestionJob::new_queued(
        id,
        created_at,
        JobTarget {
            tenant_id: "t1".into(),
            workspace_id: "w1".into(),
            kb_id: "kb1".into(),
            document_id: doc.into(),
            document_version_id: ver.into(),
        },
        IngestAction::Upload,
        format!("key-{}", id),
        max_attempts,
    )
}
