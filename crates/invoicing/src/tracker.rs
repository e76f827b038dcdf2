use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use kitchenops_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, Entity, IngredientId,
    OrganizationId, UserId,
};
use kitchenops_events::{Event, OrganizationScoped, ensure_same_organization};

use crate::code_change::{self, CodeChange, CodeChangeAction, CodeChangeId, NewCodeChange};
use crate::price::{InvoiceRef, Price, VendorId};
use crate::price_change::{self, NewPriceChange, PriceChange, PriceChangeId};
use crate::stats::{DEFAULT_ALERT_THRESHOLD_PCT, VendorInvoiceStats};

/// Tolerance when comparing a detector-reported percentage with the derived one.
const REPORTED_PCT_TOLERANCE: f64 = 0.01;

/// Command: RecordPriceChange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPriceChange {
    pub organization_id: OrganizationId,
    pub change_id: PriceChangeId,
    pub change: NewPriceChange,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApprovePriceChange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovePriceChange {
    pub organization_id: OrganizationId,
    pub change_id: PriceChangeId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectPriceChange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectPriceChange {
    pub organization_id: OrganizationId,
    pub change_id: PriceChangeId,
    pub rejected_by: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordCodeChange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCodeChange {
    pub organization_id: OrganizationId,
    pub change_id: CodeChangeId,
    pub change: NewCodeChange,
    pub occurred_at: DateTime<Utc>,
}

/// Command: HandleCodeChange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleCodeChange {
    pub organization_id: OrganizationId,
    pub change_id: CodeChangeId,
    pub handled_by: UserId,
    pub action: CodeChangeAction,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReviewCommand {
    RecordPriceChange(RecordPriceChange),
    ApprovePriceChange(ApprovePriceChange),
    RejectPriceChange(RejectPriceChange),
    RecordCodeChange(RecordCodeChange),
    HandleCodeChange(HandleCodeChange),
}

/// Event: PriceChangeRecorded. `percent_change` is always derived from the prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChangeRecorded {
    pub organization_id: OrganizationId,
    pub change_id: PriceChangeId,
    pub ingredient_id: IngredientId,
    pub product_name: String,
    pub vendor_id: VendorId,
    pub invoice_date: NaiveDate,
    pub old_price: Price,
    pub new_price: Price,
    pub percent_change: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PriceChangeApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChangeApproved {
    pub organization_id: OrganizationId,
    pub change_id: PriceChangeId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PriceChangeRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChangeRejected {
    pub organization_id: OrganizationId,
    pub change_id: PriceChangeId,
    pub rejected_by: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CodeChangeRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChangeRecorded {
    pub organization_id: OrganizationId,
    pub change_id: CodeChangeId,
    pub ingredient_id: IngredientId,
    pub product_name: String,
    pub vendor_id: VendorId,
    pub invoice_date: NaiveDate,
    pub old_code: String,
    pub new_code: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CodeChangeHandled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChangeHandled {
    pub organization_id: OrganizationId,
    pub change_id: CodeChangeId,
    pub handled_by: UserId,
    pub action: CodeChangeAction,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReviewEvent {
    PriceChangeRecorded(PriceChangeRecorded),
    PriceChangeApproved(PriceChangeApproved),
    PriceChangeRejected(PriceChangeRejected),
    CodeChangeRecorded(CodeChangeRecorded),
    CodeChangeHandled(CodeChangeHandled),
}

impl ReviewEvent {
    /// Who made the decision; `None` for detections.
    pub fn actor(&self) -> Option<UserId> {
        match self {
            ReviewEvent::PriceChangeApproved(e) => Some(e.approved_by),
            ReviewEvent::PriceChangeRejected(e) => Some(e.rejected_by),
            ReviewEvent::CodeChangeHandled(e) => Some(e.handled_by),
            ReviewEvent::PriceChangeRecorded(_) | ReviewEvent::CodeChangeRecorded(_) => None,
        }
    }
}

impl Event for ReviewEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReviewEvent::PriceChangeRecorded(_) => "invoicing.price_change.recorded",
            ReviewEvent::PriceChangeApproved(_) => "invoicing.price_change.approved",
            ReviewEvent::PriceChangeRejected(_) => "invoicing.price_change.rejected",
            ReviewEvent::CodeChangeRecorded(_) => "invoicing.code_change.recorded",
            ReviewEvent::CodeChangeHandled(_) => "invoicing.code_change.handled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReviewEvent::PriceChangeRecorded(e) => e.occurred_at,
            ReviewEvent::PriceChangeApproved(e) => e.occurred_at,
            ReviewEvent::PriceChangeRejected(e) => e.occurred_at,
            ReviewEvent::CodeChangeRecorded(e) => e.occurred_at,
            ReviewEvent::CodeChangeHandled(e) => e.occurred_at,
        }
    }
}

/// A single change record, as written to persistence after a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeRecord {
    Price(PriceChange),
    Code(CodeChange),
}

impl ChangeRecord {
    pub fn version(&self) -> u64 {
        match self {
            ChangeRecord::Price(c) => c.version(),
            ChangeRecord::Code(c) => c.version(),
        }
    }
}

impl OrganizationScoped for ChangeRecord {
    fn organization_id(&self) -> OrganizationId {
        match self {
            ChangeRecord::Price(c) => c.organization_id(),
            ChangeRecord::Code(c) => c.organization_id(),
        }
    }
}

/// Aggregate root: the set of detected changes for one invoice review session.
///
/// Records keep the order they were recorded (or loaded) in. Every transition
/// is one-shot: a decided price change or handled code change refuses any
/// further decision with `InvalidState` and stays as it was.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceChangeTracker {
    organization_id: OrganizationId,
    invoice: InvoiceRef,
    price_changes: Vec<PriceChange>,
    code_changes: Vec<CodeChange>,
    alert_threshold_pct: f64,
    version: u64,
}

impl InvoiceChangeTracker {
    /// Start an empty review session for `invoice`.
    pub fn new(organization_id: OrganizationId, invoice: InvoiceRef) -> Self {
        Self {
            organization_id,
            invoice,
            price_changes: Vec::new(),
            code_changes: Vec::new(),
            alert_threshold_pct: DEFAULT_ALERT_THRESHOLD_PCT,
            version: 0,
        }
    }

    /// Rebuild a session from records supplied by persistence, keeping their order.
    pub fn from_records(
        organization_id: OrganizationId,
        invoice: InvoiceRef,
        price_changes: Vec<PriceChange>,
        code_changes: Vec<CodeChange>,
    ) -> DomainResult<Self> {
        let mut price_ids = HashSet::new();
        for change in &price_changes {
            ensure_same_organization(organization_id, change)?;
            if change.vendor_id() != &invoice.vendor_id {
                return Err(DomainError::invariant(format!(
                    "price change {} belongs to vendor {}",
                    change.id_typed(),
                    change.vendor_id()
                )));
            }
            if change.invoice_date() != invoice.invoice_date {
                return Err(DomainError::invariant(format!(
                    "price change {} belongs to invoice date {}",
                    change.id_typed(),
                    change.invoice_date()
                )));
            }
            if !price_ids.insert(change.id_typed()) {
                return Err(DomainError::conflict(format!(
                    "duplicate price change {}",
                    change.id_typed()
                )));
            }
        }

        let mut code_ids = HashSet::new();
        for change in &code_changes {
            ensure_same_organization(organization_id, change)?;
            if change.vendor_id() != &invoice.vendor_id {
                return Err(DomainError::invariant(format!(
                    "code change {} belongs to vendor {}",
                    change.id_typed(),
                    change.vendor_id()
                )));
            }
            if change.invoice_date() != invoice.invoice_date {
                return Err(DomainError::invariant(format!(
                    "code change {} belongs to invoice date {}",
                    change.id_typed(),
                    change.invoice_date()
                )));
            }
            if !code_ids.insert(change.id_typed()) {
                return Err(DomainError::conflict(format!(
                    "duplicate code change {}",
                    change.id_typed()
                )));
            }
        }

        Ok(Self {
            price_changes,
            code_changes,
            ..Self::new(organization_id, invoice)
        })
    }

    /// Override the percentage at which pending price changes count as issues.
    pub fn with_alert_threshold(mut self, pct: f64) -> Self {
        self.alert_threshold_pct = pct;
        self
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    pub fn invoice(&self) -> &InvoiceRef {
        &self.invoice
    }

    pub fn alert_threshold_pct(&self) -> f64 {
        self.alert_threshold_pct
    }

    pub fn price_changes(&self) -> &[PriceChange] {
        &self.price_changes
    }

    pub fn code_changes(&self) -> &[CodeChange] {
        &self.code_changes
    }

    pub fn price_change(&self, id: PriceChangeId) -> Option<&PriceChange> {
        self.price_changes.iter().find(|c| c.id_typed() == id)
    }

    pub fn code_change(&self, id: CodeChangeId) -> Option<&CodeChange> {
        self.code_changes.iter().find(|c| c.id_typed() == id)
    }

    /// Summary of the current records. Pure; takes `&self`.
    pub fn compute_stats(&self) -> VendorInvoiceStats {
        VendorInvoiceStats::compute(
            &self.price_changes,
            &self.code_changes,
            self.alert_threshold_pct,
        )
    }

    /// Record a detected price change. Returns the new record's id.
    pub fn record_price_change(&mut self, change: NewPriceChange) -> DomainResult<PriceChangeId> {
        let change_id = PriceChangeId::new(AggregateId::new());
        self.execute(ReviewCommand::RecordPriceChange(RecordPriceChange {
            organization_id: self.organization_id,
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
    ) -> DomainResult<&PriceChange> {
        self.execute(ReviewCommand::ApprovePriceChange(ApprovePriceChange {
            organization_id: self.organization_id,
            change_id: id,
            approved_by: approver,
            occurred_at: Utc::now(),
        }))?;
        self.price_change(id)
            .ok_or_else(|| DomainError::not_found(format!("price change {id}")))
    }

    pub fn reject_price_change(
        &mut self,
        id: PriceChangeId,
        rejecter: UserId,
        notes: Option<String>,
    ) -> DomainResult<&PriceChange> {
        self.execute(ReviewCommand::RejectPriceChange(RejectPriceChange {
            organization_id: self.organization_id,
            change_id: id,
            rejected_by: rejecter,
            notes,
            occurred_at: Utc::now(),
        }))?;
        self.price_change(id)
            .ok_or_else(|| DomainError::not_found(format!("price change {id}")))
    }

    /// Record a detected item-code change. Returns the new record's id.
    pub fn record_code_change(&mut self, change: NewCodeChange) -> DomainResult<CodeChangeId> {
        let change_id = CodeChangeId::new(AggregateId::new());
        self.execute(ReviewCommand::RecordCodeChange(RecordCodeChange {
            organization_id: self.organization_id,
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
    ) -> DomainResult<&CodeChange> {
        self.execute(ReviewCommand::HandleCodeChange(HandleCodeChange {
            organization_id: self.organization_id,
            change_id: id,
            handled_by: handler,
            action,
            notes,
            occurred_at: Utc::now(),
        }))?;
        self.code_change(id)
            .ok_or_else(|| DomainError::not_found(format!("code change {id}")))
    }

    /// Decide and apply in one step.
    pub fn execute(&mut self, command: ReviewCommand) -> DomainResult<Vec<ReviewEvent>> {
        let events = self.handle(&command)?;
        for event in &events {
            self.apply(event);
        }
        Ok(events)
    }

    /// The record `event` would produce, without touching the session.
    pub fn preview(&self, event: &ReviewEvent) -> Option<ChangeRecord> {
        match event {
            ReviewEvent::PriceChangeRecorded(e) => {
                Some(ChangeRecord::Price(PriceChange::from_recorded(e)))
            }
            ReviewEvent::PriceChangeApproved(e) => {
                let mut next = self.price_change(e.change_id)?.clone();
                next.apply_approved(e);
                Some(ChangeRecord::Price(next))
            }
            ReviewEvent::PriceChangeRejected(e) => {
                let mut next = self.price_change(e.change_id)?.clone();
                next.apply_rejected(e);
                Some(ChangeRecord::Price(next))
            }
            ReviewEvent::CodeChangeRecorded(e) => {
                Some(ChangeRecord::Code(CodeChange::from_recorded(e)))
            }
            ReviewEvent::CodeChangeHandled(e) => {
                let mut next = self.code_change(e.change_id)?.clone();
                next.apply_handled(e);
                Some(ChangeRecord::Code(next))
            }
        }
    }

    fn ensure_organization(&self, organization_id: OrganizationId) -> DomainResult<()> {
        if self.organization_id != organization_id {
            return Err(DomainError::invariant("organization mismatch"));
        }
        Ok(())
    }

    fn ensure_invoice(&self, vendor_id: &VendorId, invoice_date: NaiveDate) -> DomainResult<()> {
        if vendor_id != &self.invoice.vendor_id {
            return Err(DomainError::validation(format!(
                "vendor {vendor_id} does not match invoice vendor {}",
                self.invoice.vendor_id
            )));
        }
        if invoice_date != self.invoice.invoice_date {
            return Err(DomainError::validation(format!(
                "invoice date {invoice_date} does not match invoice date {}",
                self.invoice.invoice_date
            )));
        }
        Ok(())
    }

    fn existing_price_change(&self, id: PriceChangeId) -> DomainResult<&PriceChange> {
        self.price_change(id)
            .ok_or_else(|| DomainError::not_found(format!("price change {id}")))
    }

    fn existing_code_change(&self, id: CodeChangeId) -> DomainResult<&CodeChange> {
        self.code_change(id)
            .ok_or_else(|| DomainError::not_found(format!("code change {id}")))
    }

    fn handle_record_price(&self, cmd: &RecordPriceChange) -> DomainResult<Vec<ReviewEvent>> {
        self.ensure_organization(cmd.organization_id)?;
        if self.price_change(cmd.change_id).is_some() {
            return Err(DomainError::conflict(format!(
                "price change {} already recorded",
                cmd.change_id
            )));
        }

        let change = &cmd.change;
        self.ensure_invoice(&change.vendor_id, change.invoice_date)?;
        let percent_change = price_change::validate(change)?;

        if let Some(reported) = change.reported_percent_change {
            if (reported - percent_change).abs() > REPORTED_PCT_TOLERANCE {
                tracing::debug!(
                    change_id = %cmd.change_id,
                    reported,
                    derived = percent_change,
                    "ignoring reported percent change"
                );
            }
        }

        Ok(vec![ReviewEvent::PriceChangeRecorded(PriceChangeRecorded {
            organization_id: cmd.organization_id,
            change_id: cmd.change_id,
            ingredient_id: change.ingredient_id,
            product_name: change.product_name.trim().to_string(),
            vendor_id: change.vendor_id.clone(),
            invoice_date: change.invoice_date,
            old_price: change.old_price,
            new_price: change.new_price,
            percent_change,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApprovePriceChange) -> DomainResult<Vec<ReviewEvent>> {
        self.ensure_organization(cmd.organization_id)?;
        self.existing_price_change(cmd.change_id)?.ensure_pending()?;

        Ok(vec![ReviewEvent::PriceChangeApproved(PriceChangeApproved {
            organization_id: cmd.organization_id,
            change_id: cmd.change_id,
            approved_by: cmd.approved_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectPriceChange) -> DomainResult<Vec<ReviewEvent>> {
        self.ensure_organization(cmd.organization_id)?;
        self.existing_price_change(cmd.change_id)?.ensure_pending()?;

        Ok(vec![ReviewEvent::PriceChangeRejected(PriceChangeRejected {
            organization_id: cmd.organization_id,
            change_id: cmd.change_id,
            rejected_by: cmd.rejected_by,
            notes: normalize_notes(cmd.notes.as_deref()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_code(&self, cmd: &RecordCodeChange) -> DomainResult<Vec<ReviewEvent>> {
        self.ensure_organization(cmd.organization_id)?;
        if self.code_change(cmd.change_id).is_some() {
            return Err(DomainError::conflict(format!(
                "code change {} already recorded",
                cmd.change_id
            )));
        }

        let change = &cmd.change;
        self.ensure_invoice(&change.vendor_id, change.invoice_date)?;
        code_change::validate(change)?;

        Ok(vec![ReviewEvent::CodeChangeRecorded(CodeChangeRecorded {
            organization_id: cmd.organization_id,
            change_id: cmd.change_id,
            ingredient_id: change.ingredient_id,
            product_name: change.product_name.trim().to_string(),
            vendor_id: change.vendor_id.clone(),
            invoice_date: change.invoice_date,
            old_code: change.old_code.trim().to_string(),
            new_code: change.new_code.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_code(&self, cmd: &HandleCodeChange) -> DomainResult<Vec<ReviewEvent>> {
        self.ensure_organization(cmd.organization_id)?;
        self.existing_code_change(cmd.change_id)?.ensure_unhandled()?;

        Ok(vec![ReviewEvent::CodeChangeHandled(CodeChangeHandled {
            organization_id: cmd.organization_id,
            change_id: cmd.change_id,
            handled_by: cmd.handled_by,
            action: cmd.action,
            notes: normalize_notes(cmd.notes.as_deref()),
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn normalize_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

impl AggregateRoot for InvoiceChangeTracker {
    type Id = InvoiceRef;

    fn id(&self) -> &Self::Id {
        &self.invoice
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl OrganizationScoped for InvoiceChangeTracker {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}

impl Aggregate for InvoiceChangeTracker {
    type Command = ReviewCommand;
    type Event = ReviewEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReviewEvent::PriceChangeRecorded(e) => {
                self.price_changes.push(PriceChange::from_recorded(e));
            }
            ReviewEvent::PriceChangeApproved(e) => {
                if let Some(c) = self.price_changes.iter_mut().find(|c| c.id_typed() == e.change_id) {
                    c.apply_approved(e);
                }
            }
            ReviewEvent::PriceChangeRejected(e) => {
                if let Some(c) = self.price_changes.iter_mut().find(|c| c.id_typed() == e.change_id) {
                    c.apply_rejected(e);
                }
            }
            ReviewEvent::CodeChangeRecorded(e) => {
                self.code_changes.push(CodeChange::from_recorded(e));
            }
            ReviewEvent::CodeChangeHandled(e) => {
                if let Some(c) = self.code_changes.iter_mut().find(|c| c.id_typed() == e.change_id) {
                    c.apply_handled(e);
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReviewCommand::RecordPriceChange(cmd) => self.handle_record_price(cmd),
            ReviewCommand::ApprovePriceChange(cmd) => self.handle_approve(cmd),
            ReviewCommand::RejectPriceChange(cmd) => self.handle_reject(cmd),
            ReviewCommand::RecordCodeChange(cmd) => self.handle_record_code(cmd),
            ReviewCommand::HandleCodeChange(cmd) => self.handle_code(cmd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_change::{PriceReview, percent_change};
    use proptest::prelude::*;

    fn test_vendor() -> VendorId {
        VendorId::parse("SYSCO").unwrap()
    }

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
    }

    fn test_tracker() -> InvoiceChangeTracker {
        let invoice = InvoiceRef::new(test_vendor(), "INV-1001", test_date()).unwrap();
        InvoiceChangeTracker::new(OrganizationId::new(), invoice)
    }

    fn new_price(old: i64, new: i64) -> NewPriceChange {
        NewPriceChange {
            ingredient_id: IngredientId::new(),
            product_name: "Heavy cream 1qt".to_string(),
            vendor_id: test_vendor(),
            invoice_date: test_date(),
            old_price: Price::from_cents(old),
            new_price: Price::from_cents(new),
            reported_percent_change: None,
        }
    }

    fn new_code(old: &str, new: &str) -> NewCodeChange {
        NewCodeChange {
            ingredient_id: IngredientId::new(),
            product_name: "Lemons 115ct".to_string(),
            vendor_id: test_vendor(),
            invoice_date: test_date(),
            old_code: old.to_string(),
            new_code: new.to_string(),
        }
    }

    #[test]
    fn approve_is_one_shot_and_keeps_first_approver() {
        let mut tracker = test_tracker();
        let id = tracker.record_price_change(new_price(1000, 1200)).unwrap();
        assert_eq!(tracker.price_change(id).unwrap().percent_change(), 20.0);

        let user_1 = UserId::new();
        let user_2 = UserId::new();

        let approved = tracker.approve_price_change(id, user_1).unwrap();
        assert!(approved.is_approved());
        let before = approved.clone();

        let err = tracker.approve_price_change(id, user_2).unwrap_err();
        match err {
            DomainError::InvalidState { state, .. } => assert_eq!(state, "approved"),
            other => panic!("expected InvalidState, got {other:?}"),
        }

        let after = tracker.price_change(id).unwrap();
        assert_eq!(after, &before);
        match after.review() {
            PriceReview::Approved { approved_by, .. } => assert_eq!(*approved_by, user_1),
            other => panic!("expected approved, got {other:?}"),
        }
    }

    #[test]
    fn reject_after_approve_fails_and_vice_versa() {
        let mut tracker = test_tracker();
        let a = tracker.record_price_change(new_price(1000, 1100)).unwrap();
        let b = tracker.record_price_change(new_price(2000, 1800)).unwrap();

        tracker.approve_price_change(a, UserId::new()).unwrap();
        assert!(matches!(
            tracker.reject_price_change(a, UserId::new(), None),
            Err(DomainError::InvalidState { .. })
        ));

        tracker
            .reject_price_change(b, UserId::new(), Some("  wrong pack size ".to_string()))
            .unwrap();
        assert_eq!(tracker.price_change(b).unwrap().notes(), Some("wrong pack size"));
        assert!(matches!(
            tracker.approve_price_change(b, UserId::new()),
            Err(DomainError::InvalidState { .. })
        ));
        assert!(tracker.price_change(b).unwrap().is_rejected());

        let rejected = tracker.price_change(b).unwrap().clone();
        assert!(matches!(
            tracker.reject_price_change(b, UserId::new(), Some("second opinion".to_string())),
            Err(DomainError::InvalidState { .. })
        ));
        assert_eq!(tracker.price_change(b).unwrap(), &rejected);
        assert_eq!(tracker.price_change(b).unwrap().notes(), Some("wrong pack size"));
    }

    #[test]
    fn zero_old_price_is_a_validation_error() {
        let mut tracker = test_tracker();
        let err = tracker.record_price_change(new_price(0, 500)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(tracker.price_changes().is_empty());
        assert_eq!(tracker.version(), 0);
    }

    #[test]
    fn negative_new_price_and_blank_name_are_rejected() {
        let mut tracker = test_tracker();
        assert!(matches!(
            tracker.record_price_change(new_price(100, -5)),
            Err(DomainError::Validation(_))
        ));

        let mut blank = new_price(100, 120);
        blank.product_name = "   ".to_string();
        assert!(matches!(
            tracker.record_price_change(blank),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn reported_percent_change_is_not_trusted() {
        let mut tracker = test_tracker();
        let mut input = new_price(400, 500);
        input.reported_percent_change = Some(99.0);
        let id = tracker.record_price_change(input).unwrap();
        assert_eq!(tracker.price_change(id).unwrap().percent_change(), 25.0);
    }

    #[test]
    fn changes_for_another_vendor_or_date_are_rejected() {
        let mut tracker = test_tracker();

        let mut other_vendor = new_price(100, 120);
        other_vendor.vendor_id = VendorId::parse("US FOODS").unwrap();
        assert!(matches!(
            tracker.record_price_change(other_vendor),
            Err(DomainError::Validation(_))
        ));

        let mut other_date = new_code("A1", "A2");
        other_date.invoice_date = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        assert!(matches!(
            tracker.record_code_change(other_date),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut tracker = test_tracker();
        let missing = PriceChangeId::new(AggregateId::new());
        assert!(matches!(
            tracker.approve_price_change(missing, UserId::new()),
            Err(DomainError::NotFound(_))
        ));
        let missing = CodeChangeId::new(AggregateId::new());
        assert!(matches!(
            tracker.handle_code_change(missing, UserId::new(), CodeChangeAction::Update, None),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn code_change_is_handled_once() {
        let mut tracker = test_tracker();
        let id = tracker.record_code_change(new_code("ABC123", "ABC124")).unwrap();
        assert!(!tracker.code_change(id).unwrap().handled());

        let user_1 = UserId::new();
        let handled = tracker
            .handle_code_change(id, user_1, CodeChangeAction::Update, None)
            .unwrap();
        assert!(handled.handled());
        assert_eq!(handled.action(), Some(CodeChangeAction::Update));
        assert_eq!(handled.handled_by(), Some(user_1));

        let err = tracker
            .handle_code_change(id, UserId::new(), CodeChangeAction::NewItem, None)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
        assert_eq!(tracker.code_change(id).unwrap().action(), Some(CodeChangeAction::Update));
    }

    #[test]
    fn recording_the_same_id_twice_conflicts() {
        let mut tracker = test_tracker();
        let cmd = RecordPriceChange {
            organization_id: tracker.organization_id(),
            change_id: PriceChangeId::new(AggregateId::new()),
            change: new_price(100, 110),
            occurred_at: Utc::now(),
        };
        tracker
            .execute(ReviewCommand::RecordPriceChange(cmd.clone()))
            .unwrap();
        let err = tracker
            .execute(ReviewCommand::RecordPriceChange(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn commands_for_another_organization_are_refused() {
        let tracker = test_tracker();
        let cmd = ReviewCommand::RecordCodeChange(RecordCodeChange {
            organization_id: OrganizationId::new(),
            change_id: CodeChangeId::new(AggregateId::new()),
            change: new_code("A1", "A2"),
            occurred_at: Utc::now(),
        });
        assert!(matches!(
            tracker.handle(&cmd),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn handle_does_not_mutate_and_preview_matches_apply() {
        let mut tracker = test_tracker();
        let id = tracker.record_price_change(new_price(1000, 900)).unwrap();
        let snapshot = tracker.clone();

        let events = tracker
            .handle(&ReviewCommand::ApprovePriceChange(ApprovePriceChange {
                organization_id: tracker.organization_id(),
                change_id: id,
                approved_by: UserId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert_eq!(tracker, snapshot);

        let previewed = tracker.preview(&events[0]).unwrap();
        tracker.apply(&events[0]);
        assert_eq!(previewed, ChangeRecord::Price(tracker.price_change(id).unwrap().clone()));
        assert_eq!(previewed.version(), 2);
        assert_eq!(events[0].event_type(), "invoicing.price_change.approved");
    }

    #[test]
    fn from_records_rejects_foreign_and_duplicate_records() {
        let mut source = test_tracker();
        source.record_price_change(new_price(100, 120)).unwrap();
        let record = source.price_changes()[0].clone();
        let invoice = source.invoice().clone();

        let foreign = InvoiceChangeTracker::from_records(
            OrganizationId::new(),
            invoice.clone(),
            vec![record.clone()],
            vec![],
        );
        assert!(matches!(foreign, Err(DomainError::InvariantViolation(_))));

        let duplicate = InvoiceChangeTracker::from_records(
            source.organization_id(),
            invoice.clone(),
            vec![record.clone(), record.clone()],
            vec![],
        );
        assert!(matches!(duplicate, Err(DomainError::Conflict(_))));

        let loaded =
            InvoiceChangeTracker::from_records(source.organization_id(), invoice, vec![record], vec![])
                .unwrap();
        assert_eq!(loaded.price_changes(), source.price_changes());
    }

    #[test]
    fn from_records_rejects_records_from_another_invoice_date() {
        let other_date = NaiveDate::from_ymd_opt(2024, 5, 9).unwrap();
        let other_invoice = InvoiceRef::new(test_vendor(), "INV-1001", other_date).unwrap();
        let mut source = InvoiceChangeTracker::new(OrganizationId::new(), other_invoice);
        source.record_price_change(NewPriceChange {
            invoice_date: other_date,
            ..new_price(100, 120)
        })
        .unwrap();
        source.record_code_change(NewCodeChange {
            invoice_date: other_date,
            ..new_code("K1", "K2")
        })
        .unwrap();

        let invoice = InvoiceRef::new(test_vendor(), "INV-1001", test_date()).unwrap();
        let prices = InvoiceChangeTracker::from_records(
            source.organization_id(),
            invoice.clone(),
            source.price_changes().to_vec(),
            vec![],
        );
        assert!(matches!(prices, Err(DomainError::InvariantViolation(_))));

        let codes = InvoiceChangeTracker::from_records(
            source.organization_id(),
            invoice,
            vec![],
            source.code_changes().to_vec(),
        );
        assert!(matches!(codes, Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn potential_savings_saturates_on_extreme_prices() {
        let mut tracker = test_tracker();
        tracker.record_price_change(new_price(1, i64::MAX)).unwrap();
        tracker.record_price_change(new_price(1, i64::MAX)).unwrap();

        let stats = tracker.compute_stats();
        assert_eq!(stats.price_increases, 2);
        assert_eq!(stats.potential_savings, i64::MAX);
        assert_eq!(tracker.compute_stats(), stats);
    }

    #[test]
    fn stats_reflect_decisions() {
        let mut tracker = test_tracker().with_alert_threshold(10.0);
        let up_big = tracker.record_price_change(new_price(1000, 1200)).unwrap();
        let up_small = tracker.record_price_change(new_price(1000, 1050)).unwrap();
        tracker.record_price_change(new_price(1000, 800)).unwrap();
        let code = tracker.record_code_change(new_code("X1", "X2")).unwrap();
        tracker.record_code_change(new_code("Y1", "Y2")).unwrap();

        let stats = tracker.compute_stats();
        assert_eq!(stats.total_price_changes, 3);
        assert_eq!(stats.price_increases, 2);
        assert_eq!(stats.price_decreases, 1);
        assert_eq!(stats.pending_price_changes, 3);
        assert_eq!(stats.potential_savings, 250);
        // 20% and -20% are at/over the threshold, plus two unhandled code changes.
        assert_eq!(stats.issue_count, 4);
        assert!((stats.average_percent_change - (20.0 + 5.0 - 20.0) / 3.0).abs() < 1e-9);

        tracker.approve_price_change(up_big, UserId::new()).unwrap();
        tracker.reject_price_change(up_small, UserId::new(), None).unwrap();
        tracker
            .handle_code_change(code, UserId::new(), CodeChangeAction::NewItem, None)
            .unwrap();

        let stats = tracker.compute_stats();
        assert_eq!(stats.approved_price_changes, 1);
        assert_eq!(stats.rejected_price_changes, 1);
        assert_eq!(stats.pending_price_changes, 1);
        assert_eq!(stats.potential_savings, 50);
        assert_eq!(stats.unhandled_code_changes, 1);
        assert_eq!(stats.issue_count, 2);
        assert!(!stats.is_fully_reviewed());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the stored percentage is derived from the prices, whatever
        /// the detector reported.
        #[test]
        fn percent_change_is_derived_from_prices(
            old in 1i64..10_000_000i64,
            new in 0i64..10_000_000i64,
            reported in proptest::option::of(-1000.0f64..1000.0f64),
        ) {
            prop_assume!(old != new);
            let mut tracker = test_tracker();
            let mut input = new_price(old, new);
            input.reported_percent_change = reported;

            let id = tracker.record_price_change(input).unwrap();
            let stored = tracker.price_change(id).unwrap().percent_change();
            let expected = (new - old) as f64 / old as f64 * 100.0;

            prop_assert!((stored - expected).abs() <= 1e-9 * expected.abs().max(1.0));
            prop_assert_eq!(stored, percent_change(Price::from_cents(old), Price::from_cents(new)).unwrap());
        }

        /// Property: stats are a pure function of the records.
        #[test]
        fn compute_stats_is_repeatable(
            prices in prop::collection::vec((1i64..100_000i64, 0i64..100_000i64, 0u8..3u8), 0..20),
        ) {
            let mut tracker = test_tracker();
            for (old, new, decision) in prices {
                if old == new {
                    continue;
                }
                let id = tracker.record_price_change(new_price(old, new)).unwrap();
                match decision {
                    1 => { tracker.approve_price_change(id, UserId::new()).unwrap(); }
                    2 => { tracker.reject_price_change(id, UserId::new(), None).unwrap(); }
                    _ => {}
                }
            }

            let first = tracker.compute_stats();
            let second = tracker.compute_stats();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(
                first.pending_price_changes + first.approved_price_changes + first.rejected_price_changes,
                first.total_price_changes
            );
        }
    }
}
