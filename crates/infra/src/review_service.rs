//! Review decision pipeline.
//!
//! ```text
//! Command
//!   ↓
//! 1. Decide via the tracker (pure, no mutation)
//!   ↓
//! 2. Build the resulting record
//!   ↓
//! 3. Save it (one full record, optimistic version check)
//!   ↓
//! 4. Apply the event to the in-memory tracker
//!   ↓
//! 5. Write an activity entry (best effort)
//! ```
//!
//! If step 3 fails the tracker never moved, so the in-memory view stays equal
//! to what persistence holds.

use chrono::Utc;
use thiserror::Error;

use kitchenops_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, OrganizationId, UserId};
use kitchenops_events::Event;
use kitchenops_invoicing::{
    ActivityEntry, ApprovePriceChange, ChangeRecord, CodeChange, CodeChangeAction, CodeChangeId,
    HandleCodeChange, InvoiceChangeTracker, InvoiceRef, NewCodeChange, NewPriceChange, PriceChange,
    PriceChangeId, RecordCodeChange, RecordPriceChange, RejectPriceChange, ReviewCommand,
    ReviewEvent, VendorInvoiceStats,
};

use crate::activity_log::ActivityLog;
use crate::change_store::{ChangeStore, StoreError};
use crate::config::ReviewConfig;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One reviewer's handle on one invoice review session.
///
/// Owns its tracker; callers construct it explicitly and pass it where needed.
#[derive(Debug)]
pub struct ReviewService<S, L> {
    store: S,
    activity: L,
    tracker: InvoiceChangeTracker,
}

impl<S, L> ReviewService<S, L>
where
    S: ChangeStore,
    L: ActivityLog,
{
    /// Load the session's records from `store` and build the tracker.
    pub fn open(
        store: S,
        activity: L,
        organization_id: OrganizationId,
        invoice: InvoiceRef,
        config: &ReviewConfig,
    ) -> Result<Self, ReviewError> {
        let records = store.load_session(organization_id, &invoice)?;
        tracing::debug!(
            %organization_id,
            %invoice,
            price_changes = records.price_changes.len(),
            code_changes = records.code_changes.len(),
            "review session loaded"
        );

        let tracker = InvoiceChangeTracker::from_records(
            organization_id,
            invoice,
            records.price_changes,
            records.code_changes,
        )?
        .with_alert_threshold(config.price_alert_threshold_pct);

        Ok(Self {
            store,
            activity,
            tracker,
        })
    }

    pub fn tracker(&self) -> &InvoiceChangeTracker {
        &self.tracker
    }

    pub fn stats(&self) -> VendorInvoiceStats {
        self.tracker.compute_stats()
    }

    pub fn into_parts(self) -> (S, L, InvoiceChangeTracker) {
        (self.store, self.activity, self.tracker)
    }

    pub fn record_price_change(&mut self, change: NewPriceChange) -> Result<PriceChangeId, ReviewError> {
        let change_id = PriceChangeId::new(AggregateId::new());
        self.dispatch(ReviewCommand::RecordPriceChange(RecordPriceChange {
            organization_id: self.tracker.organization_id(),
            change_id,
            change,
            occurred_at: Utc::now(),
        }))?;
        Ok(change_id)
    }

    pub fn approve_price_change(
        &mut self,
        id: PriceChangeId,
        approver: UserId,
    ) -> Result<PriceChange, ReviewError> {
        self.dispatch(ReviewCommand::ApprovePriceChange(ApprovePriceChange {
            organization_id: self.tracker.organization_id(),
            change_id: id,
            approved_by: approver,
            occurred_at: Utc::now(),
        }))?;
        self.price_change(id)
    }

    pub fn reject_price_change(
        &mut self,
        id: PriceChangeId,
        rejecter: UserId,
        notes: Option<String>,
    ) -> Result<PriceChange, ReviewError> {
        self.dispatch(ReviewCommand::RejectPriceChange(RejectPriceChange {
            organization_id: self.tracker.organization_id(),
            change_id: id,
            rejected_by: rejecter,
            notes,
            occurred_at: Utc::now(),
        }))?;
        self.price_change(id)
    }

    pub fn record_code_change(&mut self, change: NewCodeChange) -> Result<CodeChangeId, ReviewError> {
        let change_id = CodeChangeId::new(AggregateId::new());
        self.dispatch(ReviewCommand::RecordCodeChange(RecordCodeChange {
            organization_id: self.tracker.organization_id(),
            change_id,
            change,
            occurred_at: Utc::now(),
        }))?;
        Ok(change_id)
    }

    pub fn handle_code_change(
        &mut self,
        id: CodeChangeId,
        handler: UserId,
        action: CodeChangeAction,
        notes: Option<String>,
    ) -> Result<CodeChange, ReviewError> {
        self.dispatch(ReviewCommand::HandleCodeChange(HandleCodeChange {
            organization_id: self.tracker.organization_id(),
            change_id: id,
            handled_by: handler,
            action,
            notes,
            occurred_at: Utc::now(),
        }))?;
        self.tracker
            .code_change(id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("code change {id}")).into())
    }

    /// Run a command through decide → save → apply → activity log.
    pub fn dispatch(&mut self, command: ReviewCommand) -> Result<Vec<ReviewEvent>, ReviewError> {
        let events = self.tracker.handle(&command)?;

        for event in &events {
            let record = self.tracker.preview(event).ok_or_else(|| {
                DomainError::not_found(format!("record targeted by {}", event.event_type()))
            })?;
            let expected = ExpectedVersion::Exact(record.version().saturating_sub(1));

            if let Err(err) = self.store.save(
                self.tracker.organization_id(),
                self.tracker.invoice(),
                &record,
                expected,
            ) {
                tracing::warn!(
                    error = %err,
                    event_type = event.event_type(),
                    "review decision not persisted; session left unchanged"
                );
                return Err(err.into());
            }

            self.tracker.apply(event);
            tracing::info!(
                organization_id = %self.tracker.organization_id(),
                invoice = %self.tracker.invoice(),
                event_type = event.event_type(),
                actor = ?event.actor(),
                "review decision committed"
            );

            self.write_activity(event, &record);
        }

        Ok(events)
    }

    fn price_change(&self, id: PriceChangeId) -> Result<PriceChange, ReviewError> {
        self.tracker
            .price_change(id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("price change {id}")).into())
    }

    fn write_activity(&self, event: &ReviewEvent, record: &ChangeRecord) {
        let Some(entry) = ActivityEntry::from_commit(self.tracker.invoice(), event, record) else {
            return;
        };
        if let Err(err) = self.activity.record(&entry) {
            tracing::warn!(
                error = %err,
                event_type = event.event_type(),
                "activity log write failed; continuing"
            );
        }
    }
}
