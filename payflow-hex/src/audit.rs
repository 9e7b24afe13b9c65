//! Audit trail writer.

use std::sync::Arc;

use payflow_types::{AuditAction, AuditLogEntry, AuditSink, TransactionId};

/// Appends audit entries through an injected sink.
///
/// A failed append is logged and swallowed so it never masks the outcome of
/// the operation being audited.
#[derive(Clone)]
pub struct AuditTrail {
    sink: Arc<dyn AuditSink>,
}

impl AuditTrail {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub async fn record(
        &self,
        transaction_id: TransactionId,
        action: AuditAction,
        details: impl Into<String>,
    ) {
        let entry = AuditLogEntry::new(transaction_id, action, details);
        if let Err(e) = self.sink.append(&entry).await {
            tracing::error!(
                transaction_id = %transaction_id,
                action = %action,
                error = %e,
                "audit write failed"
            );
        }
    }
}
