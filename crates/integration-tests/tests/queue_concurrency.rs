//! Concurrent claimers and producers against a file-backed SQLite database

mod common;

use common::*;
use futures::future::join_all;
use ingest_core::domain::{JobStatus, ParserType};
use ingest_core::port::JobRepository;
use std::collections::HashSet;

async fn file_harness(dir: &tempfile::TempDir) -> Harness {
    let url = format!("sqlite://{}", dir.path().join("queue.db").display());
    Harness::with_url(&url).await
}

#[tokio::test]
async fn test_single_job_is_claimed_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let h = file_harness(&dir).await;
    h.seed_document("d1", "v1", "obj/v1", ParserType::Markdown).await;
    h.service(5).enqueue(enqueue_request("d1", "v1")).await.unwrap();

    let claims = join_all((0..8).map(|i| {
        let jobs = h.jobs.clone();
        async move {
            jobs.claim_next(&format!("worker-{}", i), LEASE_TIMEOUT_MS)
                .await
                .unwrap()
        }
    }))
    .await;

    let winners: Vec<_> = claims.into_iter().flatten().collect();
    assert_eq!(winners.len(), 1, "exactly one claimer wins");
    assert_eq!(winners[0].attempt_count, 1);
    assert_eq!(h.jobs.count_by_status(JobStatus::Processing).await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_claims_never_share_a_job() {
    let dir = tempfile::tempdir().unwrap();
    let h = file_harness(&dir).await;
    let service = h.service(5);
    for i in 0..10 {
        let (doc, ver) = (format!("d{}", i), format!("v{}", i));
        h.seed_document(&doc, &ver, &format!("obj/{}", ver), ParserType::Markdown)
            .await;
        service.enqueue(enqueue_request(&doc, &ver)).await.unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|w| {
            let jobs = h.jobs.clone();
            tokio::spawn(async move {
                let worker_id = format!("worker-{}", w);
                let mut claimed = Vec::new();
                while let Some(job) = jobs.claim_next(&worker_id, LEASE_TIMEOUT_MS).await.unwrap() {
                    claimed.push(job.id);
                }
                claimed
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id.clone()), "job {} claimed twice", id);
        }
    }
    assert_eq!(seen.len(), 10);
    assert_eq!(h.jobs.count_by_status(JobStatus::Queued).await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_identical_enqueues_create_one_job() {
    let dir = tempfile::tempdir().unwrap();
    let h = file_harness(&dir).await;
    h.seed_document("d1", "v1", "obj/v1", ParserType::Markdown).await;
    let service = h.service(5);

    let results = join_all((0..6).map(|_| service.enqueue(enqueue_request("d1", "v1")))).await;

    let ids: HashSet<String> = results
        .into_iter()
        .map(|r| r.unwrap().job.id)
        .collect();
    assert_eq!(ids.len(), 1);
    assert_eq!(h.jobs.count_by_status(JobStatus::Queued).await.unwrap(), 1);
}
