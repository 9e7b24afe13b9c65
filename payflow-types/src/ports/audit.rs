//! Audit sink port.

use crate::domain::AuditLogEntry;
use crate::error::RepoError;

/// Append-only destination for audit entries.
///
/// Injected into the engine at construction. Implementations only insert;
/// entries are never updated or deleted.
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync + 'static {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), RepoError>;
}
