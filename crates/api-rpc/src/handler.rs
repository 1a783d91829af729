//! RPC Method Handlers
//!
//! Thin translation between wire types and the ingestion service.

use crate::error::{invalid_params, to_rpc_error};
use crate::types::{
    DeadLetterEntry, DeadLettersRequest, DeadLettersResponse, EnqueueRequest, EnqueueResponse,
    JobRequest, ReindexRequest, StatsRequest, StatsResponse, UploadRequest, UploadResponse,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ingest_core::application::ingestion::{self, IngestionService};
use ingest_core::domain::JobStatusView;
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use tracing::info;

/// Upper bound for admin.dead_letters.v1
const MAX_DEAD_LETTER_LIMIT: i64 = 500;

pub struct RpcHandler {
    service: Arc<IngestionService>,
    start_time: std::time::Instant,
}

impl RpcHandler {
    pub fn new(service: Arc<IngestionService>) -> Self {
        Self {
            service,
            start_time: std::time::Instant::now(),
        }
    }

    /// ingest.enqueue.v1
    pub async fn enqueue(
        &self,
        params: EnqueueRequest,
    ) -> Result<EnqueueResponse, ErrorObjectOwned> {
        let outcome = self
            .service
            .enqueue(ingestion::EnqueueRequest {
                tenant_id: params.tenant_id,
                workspace_id: params.workspace_id,
                kb_id: params.kb_id,
                document_id: params.document_id,
                document_version_id: params.document_version_id,
                action: params.action,
                idempotency_key: params.idempotency_key,
            })
            .await
            .map_err(to_rpc_error)?;

        Ok(EnqueueResponse::from_job(&outcome.job, outcome.created))
    }

    /// ingest.upload.v1
    pub async fn upload(&self, params: UploadRequest) -> Result<UploadResponse, ErrorObjectOwned> {
        let content = STANDARD
            .decode(params.content_base64.as_bytes())
            .map_err(|e| invalid_params(format!("content_base64 is not valid base64: {}", e)))?;

        let receipt = self
            .service
            .upload(ingestion::UploadRequest {
                tenant_id: params.tenant_id,
                workspace_id: params.workspace_id,
                kb_id: params.kb_id,
                filename: params.filename,
                content,
                idempotency_key: params.idempotency_key,
            })
            .await
            .map_err(to_rpc_error)?;

        info!(
            document_id = %receipt.document_id,
            version = receipt.version,
            job_id = %receipt.job.id,
            "Upload accepted"
        );

        Ok(UploadResponse {
            document_id: receipt.document_id,
            document_version_id: receipt.document_version_id,
            version: receipt.version,
            object_key: receipt.object_key,
            job_status: receipt.job.status.to_string(),
            job_id: receipt.job.id,
        })
    }

    /// ingest.reindex.v1
    pub async fn reindex(
        &self,
        params: ReindexRequest,
    ) -> Result<EnqueueResponse, ErrorObjectOwned> {
        let outcome = self
            .service
            .reindex(&params.tenant_id, &params.document_id, params.idempotency_key)
            .await
            .map_err(to_rpc_error)?;

        Ok(EnqueueResponse::from_job(&outcome.job, outcome.created))
    }

    /// ingest.job.v1
    pub async fn job(&self, params: JobRequest) -> Result<JobStatusView, ErrorObjectOwned> {
        self.service
            .get_job(&params.job_id, params.tenant_id.as_deref())
            .await
            .map_err(to_rpc_error)
    }

    /// admin.stats.v1
    pub async fn stats(&self, _params: StatsRequest) -> Result<StatsResponse, ErrorObjectOwned> {
        let stats = self.service.stats().await.map_err(to_rpc_error)?;

        Ok(StatsResponse {
            total_jobs: stats.total(),
            queued_jobs: stats.queued,
            processing_jobs: stats.processing,
            retrying_jobs: stats.retrying,
            completed_jobs: stats.completed,
            dead_letter_jobs: stats.dead_letter,
            uptime_seconds: self.start_time.elapsed().as_secs() as i64,
        })
    }

    /// admin.dead_letters.v1
    pub async fn dead_letters(
        &self,
        params: DeadLettersRequest,
    ) -> Result<DeadLettersResponse, ErrorObjectOwned> {
        let limit = params.limit.clamp(1, MAX_DEAD_LETTER_LIMIT);
        let jobs = self
            .service
            .dead_letters(limit)
            .await
            .map_err(to_rpc_error)?;

        Ok(DeadLettersResponse {
            jobs: jobs.into_iter().map(DeadLetterEntry::from).collect(),
        })
    }
}
