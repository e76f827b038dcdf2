use std::collections::HashMap;
use std::sync::RwLock;

use kitchenops_core::{Entity, ExpectedVersion, OrganizationId};
use kitchenops_events::OrganizationScoped;
use kitchenops_invoicing::{ChangeRecord, InvoiceRef};

use super::r#trait::{ChangeStore, SessionRecords, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SessionKey {
    organization_id: OrganizationId,
    invoice: InvoiceRef,
}

/// In-memory, organization-isolated change store.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryChangeStore {
    sessions: RwLock<HashMap<SessionKey, SessionRecords>>,
}

impl InMemoryChangeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn upsert<T: Entity + Clone>(
    records: &mut Vec<T>,
    record: &T,
    expected_version: ExpectedVersion,
) -> Result<(), StoreError> {
    let position = records.iter().position(|r| r.id() == record.id());
    let current = position.map(|idx| records[idx].version()).unwrap_or(0);

    if !expected_version.matches(current) {
        return Err(StoreError::Concurrency(format!(
            "expected {expected_version:?}, found {current}"
        )));
    }

    match position {
        Some(idx) => records[idx] = record.clone(),
        None => records.push(record.clone()),
    }
    Ok(())
}

impl ChangeStore for InMemoryChangeStore {
    fn load_session(
        &self,
        organization_id: OrganizationId,
        invoice: &InvoiceRef,
    ) -> Result<SessionRecords, StoreError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let key = SessionKey {
            organization_id,
            invoice: invoice.clone(),
        };
        Ok(sessions.get(&key).cloned().unwrap_or_default())
    }

    fn save(
        &self,
        organization_id: OrganizationId,
        invoice: &InvoiceRef,
        record: &ChangeRecord,
        expected_version: ExpectedVersion,
    ) -> Result<(), StoreError> {
        if record.organization_id() != organization_id {
            return Err(StoreError::OrganizationIsolation(format!(
                "record belongs to {}, write scoped to {organization_id}",
                record.organization_id()
            )));
        }

        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let session = sessions
            .entry(SessionKey {
                organization_id,
                invoice: invoice.clone(),
            })
            .or_default();

        match record {
            ChangeRecord::Price(change) => upsert(&mut session.price_changes, change, expected_version),
            ChangeRecord::Code(change) => upsert(&mut session.code_changes, change, expected_version),
        }
    }
}
