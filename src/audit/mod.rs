// Crisis audit trail
//
// Every crisis detection leaves a privacy-preserving record: hashed user id,
// redacted trigger text, actions, resources, escalation level, and a
// retention date five years out.

mod logger;
mod store;
mod types;

use anyhow::Result;
use std::sync::Arc;

pub use logger::{escalation_level, redact, resources_for, standard_actions, CrisisAuditLogger};
pub use store::{AuditStore, InMemoryAuditStore, JsonlAuditStore};
pub use types::{
    severity_for_subcategory, CrisisEvent, CrisisEventDetails, CrisisExport, CrisisStats,
    CrisisType, DetectionMethod, EscalationLevel, EventFilter, Outcome, RetentionCompliance,
    RETENTION_YEARS,
};

use crate::config::{AuditConfig, AuditStoreKind};

/// Build the audit logger described by config
pub fn create_audit_logger(config: &AuditConfig) -> Result<CrisisAuditLogger> {
    let store: Arc<dyn AuditStore> = match (config.store, &config.path) {
        (AuditStoreKind::Jsonl, Some(path)) => Arc::new(JsonlAuditStore::new(path.clone())?),
        (AuditStoreKind::Jsonl, None) => anyhow::bail!("audit.store = \"jsonl\" requires audit.path"),
        (AuditStoreKind::Memory, _) => Arc::new(InMemoryAuditStore::new()),
    };

    Ok(CrisisAuditLogger::new(
        store,
        config.hash_salt.clone(),
        config.emergency_log_path.clone(),
    ))
}
