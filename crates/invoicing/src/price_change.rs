//! Detected price changes and their approve/reject lifecycle.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use kitchenops_core::{AggregateId, DomainError, DomainResult, Entity, IngredientId, OrganizationId, UserId};
use kitchenops_events::OrganizationScoped;

use crate::price::{Price, VendorId};
use crate::tracker::{PriceChangeApproved, PriceChangeRecorded, PriceChangeRejected};

/// Price change identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceChangeId(pub AggregateId);

impl PriceChangeId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PriceChangeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Review status of a price change.
///
/// Approved and rejected carry their actor and timestamp, so a record can
/// never be both, and a decided record always says who decided and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PriceReview {
    Pending,
    Approved {
        approved_by: UserId,
        approved_at: DateTime<Utc>,
    },
    Rejected {
        rejected_by: UserId,
        rejected_at: DateTime<Utc>,
    },
}

impl PriceReview {
    pub fn label(&self) -> &'static str {
        match self {
            PriceReview::Pending => "pending",
            PriceReview::Approved { .. } => "approved",
            PriceReview::Rejected { .. } => "rejected",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, PriceReview::Pending)
    }
}

/// Input for recording a detected price change.
///
/// `reported_percent_change` is whatever the detector computed; it is never
/// stored. The tracker derives the percentage from the two prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPriceChange {
    pub ingredient_id: IngredientId,
    pub product_name: String,
    pub vendor_id: VendorId,
    pub invoice_date: NaiveDate,
    pub old_price: Price,
    pub new_price: Price,
    #[serde(default)]
    pub reported_percent_change: Option<f64>,
}

/// `(new - old) / old * 100`.
///
/// Fails when `old <= 0` (no meaningful base) or `new < 0`.
pub fn percent_change(old: Price, new: Price) -> DomainResult<f64> {
    if !old.is_positive() {
        return Err(DomainError::validation("old_price must be greater than zero"));
    }
    if new.is_negative() {
        return Err(DomainError::validation("new_price must not be negative"));
    }
    let delta = (new.cents() - old.cents()) as f64;
    Ok(delta * 100.0 / old.cents() as f64)
}

/// Validates a new price change and returns the derived percentage.
pub(crate) fn validate(change: &NewPriceChange) -> DomainResult<f64> {
    if change.product_name.trim().is_empty() {
        return Err(DomainError::validation("product_name must not be blank"));
    }
    let pct = percent_change(change.old_price, change.new_price)?;
    if change.old_price == change.new_price {
        return Err(DomainError::validation("new_price equals old_price"));
    }
    Ok(pct)
}

/// A detected price delta for one ingredient on one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    id: PriceChangeId,
    organization_id: OrganizationId,
    ingredient_id: IngredientId,
    product_name: String,
    vendor_id: VendorId,
    invoice_date: NaiveDate,
    old_price: Price,
    new_price: Price,
    percent_change: f64,
    #[serde(flatten)]
    review: PriceReview,
    notes: Option<String>,
    detected_at: DateTime<Utc>,
    version: u64,
}

impl PriceChange {
    pub(crate) fn from_recorded(e: &PriceChangeRecorded) -> Self {
        Self {
            id: e.change_id,
            organization_id: e.organization_id,
            ingredient_id: e.ingredient_id,
            product_name: e.product_name.clone(),
            vendor_id: e.vendor_id.clone(),
            invoice_date: e.invoice_date,
            old_price: e.old_price,
            new_price: e.new_price,
            percent_change: e.percent_change,
            review: PriceReview::Pending,
            notes: None,
            detected_at: e.occurred_at,
            version: 1,
        }
    }

    pub fn id_typed(&self) -> PriceChangeId {
        self.id
    }

    pub fn ingredient_id(&self) -> IngredientId {
        self.ingredient_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn vendor_id(&self) -> &VendorId {
        &self.vendor_id
    }

    pub fn invoice_date(&self) -> NaiveDate {
        self.invoice_date
    }

    pub fn old_price(&self) -> Price {
        self.old_price
    }

    pub fn new_price(&self) -> Price {
        self.new_price
    }

    pub fn percent_change(&self) -> f64 {
        self.percent_change
    }

    /// Signed per-unit difference in cents.
    pub fn delta_cents(&self) -> i64 {
        self.new_price.cents().saturating_sub(self.old_price.cents())
    }

    pub fn is_increase(&self) -> bool {
        self.delta_cents() > 0
    }

    pub fn review(&self) -> &PriceReview {
        &self.review
    }

    pub fn is_pending(&self) -> bool {
        self.review.is_pending()
    }

    pub fn is_approved(&self) -> bool {
        matches!(self.review, PriceReview::Approved { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.review, PriceReview::Rejected { .. })
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }

    pub(crate) fn ensure_pending(&self) -> DomainResult<()> {
        if self.review.is_pending() {
            Ok(())
        } else {
            Err(DomainError::invalid_state(
                format!("price change {}", self.id),
                self.review.label(),
            ))
        }
    }

    pub(crate) fn apply_approved(&mut self, e: &PriceChangeApproved) {
        self.review = PriceReview::Approved {
            approved_by: e.approved_by,
            approved_at: e.occurred_at,
        };
        self.version += 1;
    }

    pub(crate) fn apply_rejected(&mut self, e: &PriceChangeRejected) {
        self.review = PriceReview::Rejected {
            rejected_by: e.rejected_by,
            rejected_at: e.occurred_at,
        };
        if e.notes.is_some() {
            self.notes = e.notes.clone();
        }
        self.version += 1;
    }
}

impl Entity for PriceChange {
    type Id = PriceChangeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl OrganizationScoped for PriceChange {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}
