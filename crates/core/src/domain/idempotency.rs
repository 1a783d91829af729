// Idempotency key derivation

use crate::domain::job::IngestAction;
use sha2::{Digest, Sha256};

/// Stored key length (hex chars)
pub const IDEMPOTENCY_KEY_LEN: usize = 64;

/// Derive the per-tenant idempotency key of an ingestion request.
///
/// The basis is `tenant:workspace:kb:document:version:action`, with
/// `:client_key` appended when the caller supplied a non-empty token.
/// A client token is never stored verbatim, so the same token reused for a
/// different version or action yields a different key.
pub fn build_idempotency_key(
    tenant_id: &str,
    workspace_id: &str,
    kb_id: &str,
    document_id: &str,
    document_version_id: &str,
    action: IngestAction,
    client_key: Option<&str>,
) -> String {
    let mut basis = format!(
        "{}:{}:{}:{}:{}:{}",
        tenant_id,
        workspace_id,
        kb_id,
        document_id,
        document_version_id,
        action.as_str()
    );
    if let Some(key) = client_key.filter(|k| !k.is_empty()) {
        basis.push(':');
        basis.push_str(key);
    }

    let mut digest = hex::encode(Sha256::digest(basis.as_bytes()));
    digest.truncate(IDEMPOTENCY_KEY_LEN);
    digest
}
