// Document Metadata Port

use crate::domain::{Document, DocumentChunk, DocumentSource, DocumentVersion, IngestionJob};
use crate::error::Result;
use async_trait::async_trait;

/// Access to the document/version/chunk tables owned by the surrounding system
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Join a version with its document. `None` if the version row is gone.
    async fn resolve_source(&self, document_version_id: &str) -> Result<Option<DocumentSource>>;

    /// Document scoped to a tenant; deleted documents are returned too
    async fn find_document(&self, tenant_id: &str, document_id: &str) -> Result<Option<Document>>;

    async fn find_version(
        &self,
        document_id: &str,
        version: i32,
    ) -> Result<Option<DocumentVersion>>;

    /// Live (not deleted) document previously uploaded from `source_uri`
    async fn find_by_source_uri(
        &self,
        tenant_id: &str,
        workspace_id: &str,
        kb_id: &str,
        source_uri: &str,
    ) -> Result<Option<Document>>;

    /// Insert or update `document`, insert `version` and, when given, its
    /// ingestion `job`, all in one transaction. A job whose key already exists
    /// is a `Conflict` and nothing is written.
    async fn save_upload(
        &self,
        document: &Document,
        version: &DocumentVersion,
        job: Option<&IngestionJob>,
    ) -> Result<()>;

    /// Chunks of a version ordered by `chunk_no`
    async fn list_chunks(&self, document_version_id: &str) -> Result<Vec<DocumentChunk>>;
}
