// Enqueue Use Case

use crate::domain::{build_idempotency_key, IngestAction, IngestionJob, JobTarget};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobRepository, TimeProvider};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Longest caller-supplied idempotency token accepted
pub const MAX_CLIENT_KEY_LEN: usize = 128;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub tenant_id: String,
    pub workspace_id: String,
    pub kb_id: String,
    pub document_id: String,
    pub document_version_id: String,
    /// `upload` or `reindex`
    pub action: String,

    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueOutcome {
    pub job: IngestionJob,
    /// False when an earlier request with the same key already created the job
    pub created: bool,
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

pub(crate) fn validate_client_key(key: Option<&str>) -> Result<()> {
    match key {
        Some(key) if key.chars().count() > MAX_CLIENT_KEY_LEN => Err(AppError::Validation(
            format!("idempotency_key longer than {} chars", MAX_CLIENT_KEY_LEN),
        )),
        _ => Ok(()),
    }
}

fn validate(req: &EnqueueRequest) -> Result<IngestAction> {
    require_non_empty("tenant_id", &req.tenant_id)?;
    require_non_empty("workspace_id", &req.workspace_id)?;
    require_non_empty("kb_id", &req.kb_id)?;
    require_non_empty("document_id", &req.document_id)?;
    require_non_empty("document_version_id", &req.document_version_id)?;

    validate_client_key(req.idempotency_key.as_deref())?;

    req.action
        .parse::<IngestAction>()
        .map_err(|e| AppError::Validation(e.to_string()))
}

/// Execute enqueue use case
///
/// Returns the existing job unchanged when the derived key was seen before;
/// otherwise inserts a queued job that is claimable immediately.
pub async fn execute(
    job_repo: &dyn JobRepository,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    max_attempts: i32,
    req: EnqueueRequest,
) -> Result<EnqueueOutcome> {
    let action = validate(&req)?;

    let key = build_idempotency_key(
        &req.tenant_id,
        &req.workspace_id,
        &req.kb_id,
        &req.document_id,
        &req.document_version_id,
        action,
        req.idempotency_key.as_deref(),
    );

    if let Some(job) = job_repo
        .find_by_idempotency_key(&req.tenant_id, &key)
        .await?
    {
        info!(job_id = %job.id, status = %job.status, "Enqueue deduplicated");
        return Ok(EnqueueOutcome {
            job,
            created: false,
        });
    }

    let job = IngestionJob::new_queued(
        id_provider.generate_id(),
        time_provider.now_millis(),
        JobTarget {
            tenant_id: req.tenant_id,
            workspace_id: req.workspace_id,
            kb_id: req.kb_id,
            document_id: req.document_id,
            document_version_id: req.document_version_id,
        },
        action,
        key,
        max_attempts,
    );

    // A concurrent duplicate may still win the insert; the repository then returns its row
    let (job, created) = job_repo.insert_if_absent(&job).await?;
    if created {
        info!(
            job_id = %job.id,
            document_version_id = %job.document_version_id,
            action = %job.action,
            "Ingestion job enqueued"
        );
    }
    Ok(EnqueueOutcome { job, created })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> EnqueueRequest {
        EnqueueRequest {
            tenant_id: "t1".into(),
            workspace_id: "w1".into(),
            kb_id: "kb1".into(),
            document_id: "d1".into(),
            document_version_id: "v1".into(),
            action: "upload".into(),
            idempotency_key: None,
        }
    }

    #[test]
    fn test_validate_accepts_known_actions() {
        assert_eq!(validate(&request()).unwrap(), IngestAction::Upload);

        let mut req = request();
        req.action = "reindex".into();
        assert_eq!(validate(&req).unwrap(), IngestAction::Reindex);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let mut req = request();
        req.action = "delete".into();
        assert!(matches!(validate(&req), Err(AppError::Validation(_))));

        let mut req = request();
        req.document_version_id = "  ".into();
        assert!(matches!(validate(&req), Err(AppError::Validation(_))));

        let mut req = request();
        req.idempotency_key = Some("k".repeat(MAX_CLIENT_KEY_LEN + 1));
        assert!(matches!(validate(&req), Err(AppError::Validation(_))));

        let mut req = request();
        req.idempotency_key = Some("k".repeat(MAX_CLIENT_KEY_LEN));
        assert!(validate(&req).is_ok());
    }
}
