//! Audit payloads for review decisions.
//!
//! Each entry carries one of a closed set of detail shapes; serialized flat
//! with a `"type"` tag next to the common fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kitchenops_core::{AggregateId, IngredientId, OrganizationId, UserId};
use kitchenops_events::{Event, OrganizationScoped};

use crate::code_change::{CodeChangeAction, CodeChangeId};
use crate::price::{InvoiceRef, Price};
use crate::price_change::PriceChangeId;
use crate::tracker::{ChangeRecord, ReviewEvent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityDetails {
    PriceChangeRecorded {
        change_id: PriceChangeId,
        ingredient_id: IngredientId,
        product_name: String,
        old_price: Price,
        new_price: Price,
        percent_change: f64,
    },
    PriceChangeApproved {
        change_id: PriceChangeId,
        ingredient_id: IngredientId,
        product_name: String,
        old_price: Price,
        new_price: Price,
        percent_change: f64,
    },
    PriceChangeRejected {
        change_id: PriceChangeId,
        ingredient_id: IngredientId,
        product_name: String,
        old_price: Price,
        new_price: Price,
        percent_change: f64,
        notes: Option<String>,
    },
    CodeChangeRecorded {
        change_id: CodeChangeId,
        ingredient_id: IngredientId,
        product_name: String,
        old_code: String,
        new_code: String,
    },
    CodeChangeHandled {
        change_id: CodeChangeId,
        ingredient_id: IngredientId,
        product_name: String,
        old_code: String,
        new_code: String,
        action: CodeChangeAction,
        notes: Option<String>,
    },
}

/// One activity-log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: AggregateId,
    pub organization_id: OrganizationId,
    /// `None` for system detections.
    pub actor: Option<UserId>,
    pub invoice: InvoiceRef,
    pub event_type: String,
    #[serde(flatten)]
    pub details: ActivityDetails,
    pub occurred_at: DateTime<Utc>,
}

impl ActivityEntry {
    /// Build the entry for a committed event and the record it produced.
    ///
    /// Returns `None` when the record kind does not match the event.
    pub fn from_commit(invoice: &InvoiceRef, event: &ReviewEvent, record: &ChangeRecord) -> Option<Self> {
        let details = match (event, record) {
            (ReviewEvent::PriceChangeRecorded(_), ChangeRecord::Price(c)) => {
                ActivityDetails::PriceChangeRecorded {
                    change_id: c.id_typed(),
                    ingredient_id: c.ingredient_id(),
                    product_name: c.product_name().to_string(),
                    old_price: c.old_price(),
                    new_price: c.new_price(),
                    percent_change: c.percent_change(),
                }
            }
            (ReviewEvent::PriceChangeApproved(_), ChangeRecord::Price(c)) => {
                ActivityDetails::PriceChangeApproved {
                    change_id: c.id_typed(),
                    ingredient_id: c.ingredient_id(),
                    product_name: c.product_name().to_string(),
                    old_price: c.old_price(),
                    new_price: c.new_price(),
                    percent_change: c.percent_change(),
                }
            }
            (ReviewEvent::PriceChangeRejected(_), ChangeRecord::Price(c)) => {
                ActivityDetails::PriceChangeRejected {
                    change_id: c.id_typed(),
                    ingredient_id: c.ingredient_id(),
                    product_name: c.product_name().to_string(),
                    old_price: c.old_price(),
                    new_price: c.new_price(),
                    percent_change: c.percent_change(),
                    notes: c.notes().map(str::to_string),
                }
            }
            (ReviewEvent::CodeChangeRecorded(_), ChangeRecord::Code(c)) => {
                ActivityDetails::CodeChangeRecorded {
                    change_id: c.id_typed(),
                    ingredient_id: c.ingredient_id(),
                    product_name: c.product_name().to_string(),
                    old_code: c.old_code().to_string(),
                    new_code: c.new_code().to_string(),
                }
            }
            (ReviewEvent::CodeChangeHandled(e), ChangeRecord::Code(c)) => {
                ActivityDetails::CodeChangeHandled {
                    change_id: c.id_typed(),
                    ingredient_id: c.ingredient_id(),
                    product_name: c.product_name().to_string(),
                    old_code: c.old_code().to_string(),
                    new_code: c.new_code().to_string(),
                    action: e.action,
                    notes: c.notes().map(str::to_string),
                }
            }
            _ => return None,
        };

        Some(Self {
            id: AggregateId::new(),
            organization_id: record.organization_id(),
            actor: event.actor(),
            invoice: invoice.clone(),
            event_type: event.event_type().to_string(),
            details,
            occurred_at: event.occurred_at(),
        })
    }
}

impl OrganizationScoped for ActivityEntry {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code_change::NewCodeChange;
    use crate::price::VendorId;
    use crate::tracker::{HandleCodeChange, InvoiceChangeTracker, ReviewCommand};
    use chrono::NaiveDate;
    use kitchenops_core::Aggregate;

    #[test]
    fn handled_code_change_serializes_as_flat_tagged_object() {
        let vendor = VendorId::parse("SYSCO").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let invoice = InvoiceRef::new(vendor.clone(), "INV-7", date).unwrap();
        let mut tracker = InvoiceChangeTracker::new(OrganizationId::new(), invoice.clone());
        let id = tracker
            .record_code_change(NewCodeChange {
                ingredient_id: IngredientId::new(),
                product_name: "Parmesan wedge".to_string(),
                vendor_id: vendor,
                invoice_date: date,
                old_code: "PAR-1".to_string(),
                new_code: "PAR-2".to_string(),
            })
            .unwrap();

        let handler = UserId::new();
        let events = tracker
            .handle(&ReviewCommand::HandleCodeChange(HandleCodeChange {
                organization_id: tracker.organization_id(),
                change_id: id,
                handled_by: handler,
                action: CodeChangeAction::Update,
                notes: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        let record = tracker.preview(&events[0]).unwrap();

        let entry = ActivityEntry::from_commit(&invoice, &events[0], &record).unwrap();
        assert_eq!(entry.actor, Some(handler));

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "code_change_handled");
        assert_eq!(json["action"], "update");
        assert_eq!(json["event_type"], "invoicing.code_change.handled");
        assert_eq!(json["new_code"], "PAR-2");
    }

    #[test]
    fn mismatched_record_kind_yields_no_entry() {
        let vendor = VendorId::parse("SYSCO").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let invoice = InvoiceRef::new(vendor.clone(), "INV-7", date).unwrap();
        let mut tracker = InvoiceChangeTracker::new(OrganizationId::new(), invoice.clone());
        let events = tracker
            .execute(ReviewCommand::RecordCodeChange(crate::tracker::RecordCodeChange {
                organization_id: tracker.organization_id(),
                change_id: CodeChangeId::new(AggregateId::new()),
                change: NewCodeChange {
                    ingredient_id: IngredientId::new(),
                    product_name: "Parmesan wedge".to_string(),
                    vendor_id: vendor,
                    invoice_date: date,
                    old_code: "PAR-1".to_string(),
                    new_code: "PAR-2".to_string(),
                },
                occurred_at: Utc::now(),
            }))
            .unwrap();
        let code = ChangeRecord::Code(tracker.code_changes()[0].clone());
        assert!(ActivityEntry::from_commit(&invoice, &events[0], &code).is_some());

        let price_event = ReviewEvent::PriceChangeApproved(crate::tracker::PriceChangeApproved {
            organization_id: tracker.organization_id(),
            change_id: PriceChangeId::new(AggregateId::new()),
            approved_by: UserId::new(),
            occurred_at: Utc::now(),
        });
        assert!(ActivityEntry::from_commit(&invoice, &price_event, &code).is_none());
    }
}
