// Upload Use Case: store bytes, record a new document version, enqueue

use super::enqueue::{require_non_empty, validate_client_key};
use crate::domain::{
    build_idempotency_key, Document, DocumentStatus, DocumentVersion, IngestAction,
    IngestionJob, JobTarget, ParseStatus, ParserType,
};
use crate::error::{AppError, Result};
use crate::port::{DocumentRepository, IdProvider, ObjectStore, TimeProvider};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

const FALLBACK_SOURCE_URI: &str = "upload.bin";
const FALLBACK_OBJECT_NAME: &str = "document.bin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub tenant_id: String,
    pub workspace_id: String,
    pub kb_id: String,
    pub filename: String,
    pub content: Vec<u8>,

    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub document_id: String,
    pub document_version_id: String,
    pub version: i32,
    pub object_key: String,
    pub job: IngestionJob,
}

/// Last path component of an uploaded name, so keys never escape their prefix
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        FALLBACK_OBJECT_NAME.to_string()
    } else {
        name.to_string()
    }
}

pub fn object_key(tenant_id: &str, kb_id: &str, document_id: &str, version: i32, name: &str) -> String {
    format!(
        "tenant/{}/kb/{}/doc/{}/v{}/{}",
        tenant_id, kb_id, document_id, version, name
    )
}

pub struct UploadDeps<'a> {
    pub doc_repo: &'a dyn DocumentRepository,
    pub object_store: &'a dyn ObjectStore,
    pub id_provider: &'a dyn IdProvider,
    pub time_provider: &'a dyn TimeProvider,
}

pub async fn execute(deps: UploadDeps<'_>, max_attempts: i32, req: UploadRequest) -> Result<UploadReceipt> {
    require_non_empty("tenant_id", &req.tenant_id)?;
    require_non_empty("workspace_id", &req.workspace_id)?;
    require_non_empty("kb_id", &req.kb_id)?;
    validate_client_key(req.idempotency_key.as_deref())?;
    if req.content.is_empty() {
        return Err(AppError::Validation("file is empty".to_string()));
    }

    let now = deps.time_provider.now_millis();
    let source_uri = match req.filename.trim() {
        "" => FALLBACK_SOURCE_URI.to_string(),
        name => name.to_string(),
    };

    // Same tenant/workspace/kb/source means a new version of the same document
    let document = match deps
        .doc_repo
        .find_by_source_uri(&req.tenant_id, &req.workspace_id, &req.kb_id, &source_uri)
        .await?
    {
        Some(mut existing) => {
            existing.current_version += 1;
            existing.title = source_uri.clone();
            existing.status = DocumentStatus::Pending;
            existing.updated_at = now;
            existing
        }
        None => Document {
            id: deps.id_provider.generate_id(),
            tenant_id: req.tenant_id.clone(),
            workspace_id: req.workspace_id.clone(),
            kb_id: req.kb_id.clone(),
            title: source_uri.clone(),
            source_uri: Some(source_uri.clone()),
            current_version: 1,
            status: DocumentStatus::Pending,
            created_at: now,
            updated_at: now,
        },
    };

    let safe_name = sanitize_filename(&source_uri);
    let key = object_key(
        &req.tenant_id,
        &req.kb_id,
        &document.id,
        document.current_version,
        &safe_name,
    );

    // Bytes first, so a recorded version always points at a real object
    deps.object_store.put(&key, &req.content).await?;

    let version = DocumentVersion {
        id: deps.id_provider.generate_id(),
        tenant_id: req.tenant_id.clone(),
        document_id: document.id.clone(),
        version: document.current_version,
        object_key: key.clone(),
        parser_type: ParserType::infer(&safe_name),
        parse_status: ParseStatus::Pending,
        checksum: Some(hex::encode(Sha256::digest(&req.content))),
        created_at: now,
    };
    let job = IngestionJob::new_queued(
        deps.id_provider.generate_id(),
        now,
        JobTarget {
            tenant_id: req.tenant_id.clone(),
            workspace_id: req.workspace_id.clone(),
            kb_id: req.kb_id.clone(),
            document_id: document.id.clone(),
            document_version_id: version.id.clone(),
        },
        IngestAction::Upload,
        build_idempotency_key(
            &req.tenant_id,
            &req.workspace_id,
            &req.kb_id,
            &document.id,
            &version.id,
            IngestAction::Upload,
            req.idempotency_key.as_deref(),
        ),
        max_attempts,
    );
    // Document, version and job become visible together or not at all
    deps.doc_repo
        .save_upload(&document, &version, Some(&job))
        .await?;

    info!(
        document_id = %document.id,
        version = version.version,
        parser = %version.parser_type,
        bytes = req.content.len(),
        job_id = %job.id,
        "Document version stored and enqueued"
    );

    Ok(UploadReceipt {
        document_id: document.id,
        document_version_id: version.id,
        version: version.version,
        object_key: key,
        job,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_last_component() {
        assert_eq!(sanitize_filename("notes.md"), "notes.md");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\docs\\report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("dir/"), "document.bin");
        assert_eq!(sanitize_filename(".."), "document.bin");
    }

    #[test]
    fn test_object_key_layout() {
        assert_eq!(
            object_key("t1", "kb1", "d1", 3, "a.md"),
            "tenant/t1/kb/kb1/doc/d1/v3/a.md"
        );
    }
}
