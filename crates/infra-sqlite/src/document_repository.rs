// SQLite DocumentRepository Implementation

use crate::error::map_sqlx_error;
use crate::job_repository::insert_job;
use async_trait::async_trait;
use ingest_core::domain::{
    Document, DocumentChunk, DocumentSource, DocumentVersion, IngestionJob, ParserType,
};
use ingest_core::error::{AppError, Result};
use ingest_core::port::DocumentRepository;
use sqlx::SqlitePool;

pub struct SqliteDocumentRepository {
    pool: SqlitePool,
}

impl SqliteDocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentRepository for SqliteDocumentRepository {
    async fn resolve_source(&self, document_version_id: &str) -> Result<Option<DocumentSource>> {
        let row = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT d.tenant_id, d.workspace_id, d.kb_id,
                   d.id AS document_id, v.id AS document_version_id,
                   v.object_key, v.parser_type
            FROM document_versions v
            JOIN documents d ON d.id = v.document_id
            WHERE v.id = ?
            "#,
        )
        .bind(document_version_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|r| DocumentSource {
            tenant_id: r.tenant_id,
            workspace_id: r.workspace_id,
            kb_id: r.kb_id,
            document_id: r.document_id,
            document_version_id: r.document_version_id,
            object_key: r.object_key,
            parser_type: r.parser_type,
        }))
    }

    async fn find_document(&self, tenant_id: &str, document_id: &str) -> Result<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM documents WHERE tenant_id = ? AND id = ?",
        )
        .bind(tenant_id)
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(DocumentRow::into_document).transpose()
    }

    async fn find_version(
        &self,
        document_id: &str,
        version: i32,
    ) -> Result<Option<DocumentVersion>> {
        let row = sqlx::query_as::<_, VersionRow>(
            "SELECT * FROM document_versions WHERE document_id = ? AND version = ?",
        )
        .bind(document_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(VersionRow::into_version).transpose()
    }

    async fn find_by_source_uri(
        &self,
        tenant_id: &str,
        workspace_id: &str,
        kb_id: &str,
        source_uri: &str,
    ) -> Result<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT * FROM documents
            WHERE tenant_id = ? AND workspace_id = ? AND kb_id = ?
              AND source_uri = ? AND status <> 'deleted'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(workspace_id)
        .bind(kb_id)
        .bind(source_uri)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(DocumentRow::into_document).transpose()
    }

    async fn save_upload(
        &self,
        document: &Document,
        version: &DocumentVersion,
        job: Option<&IngestionJob>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO documents (
                id, tenant_id, workspace_id, kb_id, title, source_uri,
                current_version, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                title = excluded.title,
                current_version = excluded.current_version,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&document.id)
        .bind(&document.tenant_id)
        .bind(&document.workspace_id)
        .bind(&document.kb_id)
        .bind(&document.title)
        .bind(&document.source_uri)
        .bind(document.current_version)
        .bind(document.status.as_str())
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO document_versions (
                id, tenant_id, document_id, version, object_key,
                parser_type, parse_status, checksum, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&version.id)
        .bind(&version.tenant_id)
        .bind(&version.document_id)
        .bind(version.version)
        .bind(&version.object_key)
        .bind(version.parser_type.as_str())
        .bind(version.parse_status.as_str())
        .bind(&version.checksum)
        .bind(version.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(job) = job {
            if !insert_job(&mut *tx, job).await? {
                tx.rollback().await.map_err(map_sqlx_error)?;
                return Err(AppError::Conflict(format!(
                    "job with key {} already exists",
                    job.idempotency_key
                )));
            }
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn list_chunks(&self, document_version_id: &str) -> Result<Vec<DocumentChunk>> {
        let rows: Vec<ChunkRow> = sqlx::query_as(
            "SELECT * FROM document_chunks WHERE document_version_id = ? ORDER BY chunk_no ASC",
        )
        .bind(document_version_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ChunkRow::into_chunk).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SourceRow {
    tenant_id: String,
    workspace_id: String,
    kb_id: String,
    document_id: String,
    document_version_id: String,
    object_key: Option<String>,
    parser_type: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: String,
    tenant_id: String,
    workspace_id: String,
    kb_id: String,
    title: String,
    source_uri: Option<String>,
    current_version: i32,
    status: String,
    created_at: i64,
    updated_at: i64,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document> {
        Ok(Document {
            id: self.id,
            tenant_id: self.tenant_id,
            workspace_id: self.workspace_id,
            kb_id: self.kb_id,
            title: self.title,
            source_uri: self.source_uri,
            current_version: self.current_version,
            status: self.status.parse()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VersionRow {
    id: String,
    tenant_id: String,
    document_id: String,
    version: i32,
    object_key: Option<String>,
    parser_type: Option<String>,
    parse_status: String,
    checksum: Option<String>,
    created_at: i64,
}

impl VersionRow {
    fn into_version(self) -> Result<DocumentVersion> {
        Ok(DocumentVersion {
            id: self.id,
            tenant_id: self.tenant_id,
            document_id: self.document_id,
            version: self.version,
            object_key: self.object_key.unwrap_or_default(),
            parser_type: ParserType::from_stored(self.parser_type.as_deref()),
            parse_status: self.parse_status.parse()?,
            checksum: self.checksum,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChunkRow {
    id: String,
    tenant_id: String,
    workspace_id: String,
    kb_id: String,
    document_id: String,
    document_version_id: String,
    chunk_no: i32,
    content: String,
    token_count: i32,
    metadata: String,
    created_at: i64,
}

impl ChunkRow {
    fn into_chunk(self) -> DocumentChunk {
        DocumentChunk {
            id: self.id,
            tenant_id: self.tenant_id,
            workspace_id: self.workspace_id,
            kb_id: self.kb_id,
            document_id: self.document_id,
            document_version_id: self.document_version_id,
            chunk_no: self.chunk_no,
            content: self.content,
            token_count: self.token_count,
            metadata: serde_json::from_str(&self.metadata).unwrap_or(serde_json::json!({})),
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, queued_job, seed_version, T0};
    use ingest_core::domain::{DocumentStatus, JobStatus};
    use ingest_core::port::{
        JobRepository, JobRepositoryTransaction, Transaction, TransactionalJobRepository,
    };

    #[tokio::test]
    async fn test_resolve_source_joins_document() {
        let fx = fixture().await;
        seed_version(&fx.docs, "d1", "v1").await;

        let source = fx.docs.resolve_source("v1").await.unwrap().unwrap();
        assert_eq!(source.document_id, "d1");
        assert_eq!(source.object_key.as_deref(), Some("obj/v1"));
        assert_eq!(source.parser(), ParserType::Markdown);

        assert!(fx.docs.resolve_source("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_document_is_tenant_scoped() {
        let fx = fixture().await;
        seed_version(&fx.docs, "d1", "v1").await;

        assert!(fx.docs.find_document("t1", "d1").await.unwrap().is_some());
        assert!(fx.docs.find_document("t2", "d1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleted_document_is_not_found_by_source_and_keeps_status() {
        let fx = fixture().await;
        seed_version(&fx.docs, "d1", "v1").await;
        sqlx::query("UPDATE documents SET status = 'deleted' WHERE id = 'd1'")
            .execute(&fx.docs.pool)
            .await
            .unwrap();

        let found = fx
            .docs
            .find_by_source_uri("t1", "w1", "kb1", "d1.md")
            .await
            .unwrap();
        assert!(found.is_none());

        let mut tx = fx.jobs.begin_transaction().await.unwrap();
        tx.set_document_status("d1", DocumentStatus::Ready)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        let doc = fx.docs.find_document("t1", "d1").await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Deleted);
    }

    #[tokio::test]
    async fn test_save_upload_bumps_existing_document() {
        let fx = fixture().await;
        seed_version(&fx.docs, "d1", "v1").await;

        let mut doc = fx.docs.find_document("t1", "d1").await.unwrap().unwrap();
        doc.current_version = 2;
        let version = DocumentVersion {
            id: "v2".into(),
            tenant_id: "t1".into(),
            document_id: "d1".into(),
            version: 2,
            object_key: "obj/v2".into(),
            parser_type: ParserType::Generic,
            parse_status: ingest_core::domain::ParseStatus::Pending,
            checksum: Some("abc".into()),
            created_at: 0,
        };
        fx.docs.save_upload(&doc, &version, None).await.unwrap();

        let stored = fx.docs.find_document("t1", "d1").await.unwrap().unwrap();
        assert_eq!(stored.current_version, 2);
        let v2 = fx.docs.find_version("d1", 2).await.unwrap().unwrap();
        assert_eq!(v2.id, "v2");
        assert_eq!(v2.checksum.as_deref(), Some("abc"));
    }

    fn version(id: &str, number: i32) -> DocumentVersion {
        DocumentVersion {
            id: id.into(),
            tenant_id: "t1".into(),
            document_id: "d1".into(),
            version: number,
            object_key: format!("obj/{}", id),
            parser_type: ParserType::Markdown,
            parse_status: ingest_core::domain::ParseStatus::Pending,
            checksum: None,
            created_at: T0,
        }
    }

    #[tokio::test]
    async fn test_save_upload_inserts_job_with_version() {
        let fx = fixture().await;
        seed_version(&fx.docs, "d1", "v1").await;

        let mut doc = fx.docs.find_document("t1", "d1").await.unwrap().unwrap();
        doc.current_version = 2;
        let job = queued_job("job-2", "d1", "v2", T0, 5);
        fx.docs
            .save_upload(&doc, &version("v2", 2), Some(&job))
            .await
            .unwrap();

        let stored = fx.jobs.find_by_id(&"job-2".to_string()).await.unwrap().unwrap();
        assert_eq!(stored.document_version_id, "v2");
        assert_eq!(stored.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_save_upload_rolls_back_on_duplicate_job() {
        let fx = fixture().await;
        seed_version(&fx.docs, "d1", "v1").await;
        fx.jobs
            .insert_if_absent(&queued_job("job-1", "d1", "v1", T0, 5))
            .await
            .unwrap();

        let mut doc = fx.docs.find_document("t1", "d1").await.unwrap().unwrap();
        doc.current_version = 2;
        let mut duplicate = queued_job("job-2", "d1", "v2", T0, 5);
        duplicate.idempotency_key = "key-job-1".into();
        let err = fx
            .docs
            .save_upload(&doc, &version("v2", 2), Some(&duplicate))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let stored = fx.docs.find_document("t1", "d1").await.unwrap().unwrap();
        assert_eq!(stored.current_version, 1);
        assert!(fx.docs.find_version("d1", 2).await.unwrap().is_none());
        assert_eq!(fx.jobs.count_by_status(JobStatus::Queued).await.unwrap(), 1);
    }
}
