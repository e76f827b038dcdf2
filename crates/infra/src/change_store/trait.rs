use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kitchenops_core::{ExpectedVersion, OrganizationId};
use kitchenops_invoicing::{ChangeRecord, CodeChange, InvoiceRef, PriceChange};

/// Records of one review session, in the order they were first saved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecords {
    pub price_changes: Vec<PriceChange>,
    pub code_changes: Vec<CodeChange>,
}

impl SessionRecords {
    pub fn is_empty(&self) -> bool {
        self.price_changes.is_empty() && self.code_changes.is_empty()
    }
}

/// Change store operation error.
///
/// Infrastructure failures only; domain failures are `DomainError`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("organization isolation violation: {0}")]
    OrganizationIsolation(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Organization-partitioned store of review records.
///
/// Implementations must:
/// - refuse records whose organization differs from the requested one
/// - compare `expected_version` against the stored record version (0 when absent)
/// - keep records in first-save order
pub trait ChangeStore: Send + Sync {
    fn load_session(
        &self,
        organization_id: OrganizationId,
        invoice: &InvoiceRef,
    ) -> Result<SessionRecords, StoreError>;

    fn save(
        &self,
        organization_id: OrganizationId,
        invoice: &InvoiceRef,
        record: &ChangeRecord,
        expected_version: ExpectedVersion,
    ) -> Result<(), StoreError>;
}

impl<S> ChangeStore for Arc<S>
where
    S: ChangeStore + ?Sized,
{
    fn load_session(
        &self,
        organization_id: OrganizationId,
        invoice: &InvoiceRef,
    ) -> Result<SessionRecords, StoreError> {
        (**self).load_session(organization_id, invoice)
    }

    fn save(
        &self,
        organization_id: OrganizationId,
        invoice: &InvoiceRef,
        record: &ChangeRecord,
        expected_version: ExpectedVersion,
    ) -> Result<(), StoreError> {
        (**self).save(organization_id, invoice, record, expected_version)
    }
}
