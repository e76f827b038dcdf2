//! Activity-log port.
//!
//! Writing an entry is best effort: `ReviewService` logs a failure and keeps
//! going, so audit-log trouble never blocks a review decision.

use std::sync::{Arc, RwLock};

use thiserror::Error;

use kitchenops_core::OrganizationId;
use kitchenops_events::OrganizationScoped;
use kitchenops_invoicing::ActivityEntry;

#[derive(Debug, Error)]
pub enum ActivityLogError {
    #[error("activity log unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode activity entry: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait ActivityLog: Send + Sync {
    fn record(&self, entry: &ActivityEntry) -> Result<(), ActivityLogError>;
}

impl<L> ActivityLog for Arc<L>
where
    L: ActivityLog + ?Sized,
{
    fn record(&self, entry: &ActivityEntry) -> Result<(), ActivityLogError> {
        (**self).record(entry)
    }
}

/// In-memory activity log for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryActivityLog {
    entries: RwLock<Vec<ActivityEntry>>,
}

impl InMemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries for one organization, oldest first.
    pub fn entries(&self, organization_id: OrganizationId) -> Vec<ActivityEntry> {
        let entries = match self.entries.read() {
            Ok(e) => e,
            Err(_) => return vec![],
        };
        entries
            .iter()
            .filter(|e| e.organization_id() == organization_id)
            .cloned()
            .collect()
    }
}

impl ActivityLog for InMemoryActivityLog {
    fn record(&self, entry: &ActivityEntry) -> Result<(), ActivityLogError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ActivityLogError::Unavailable("lock poisoned".to_string()))?;
        entries.push(entry.clone());
        Ok(())
    }
}

/// Emits each entry as a structured `tracing` event with the JSON payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingActivityLog;

impl ActivityLog for TracingActivityLog {
    fn record(&self, entry: &ActivityEntry) -> Result<(), ActivityLogError> {
        let payload = serde_json::to_string(entry)?;
        tracing::info!(
            target: "kitchenops::activity",
            organization_id = %entry.organization_id,
            event_type = %entry.event_type,
            invoice = %entry.invoice,
            payload = %payload,
            "activity recorded"
        );
        Ok(())
    }
}
