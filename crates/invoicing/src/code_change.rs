//! Detected vendor item-code changes and their handling decision.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use kitchenops_core::{AggregateId, DomainError, DomainResult, Entity, IngredientId, OrganizationId, UserId};
use kitchenops_events::OrganizationScoped;

use crate::price::VendorId;
use crate::tracker::{CodeChangeHandled, CodeChangeRecorded};

/// Code change identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeChangeId(pub AggregateId);

impl CodeChangeId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CodeChangeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// What the reviewer decided to do with a new vendor code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeChangeAction {
    /// Point the existing master ingredient at the new code.
    Update,
    /// Treat the new code as a different product.
    NewItem,
}

impl CodeChangeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            CodeChangeAction::Update => "update",
            CodeChangeAction::NewItem => "new_item",
        }
    }
}

impl core::str::FromStr for CodeChangeAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "update" => Ok(CodeChangeAction::Update),
            "new_item" => Ok(CodeChangeAction::NewItem),
            other => Err(DomainError::validation(format!(
                "unknown code change action '{other}' (expected update or new_item)"
            ))),
        }
    }
}

/// Handling state of a code change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CodeResolution {
    Unhandled,
    Handled {
        handled_by: UserId,
        handled_at: DateTime<Utc>,
        action: CodeChangeAction,
    },
}

impl CodeResolution {
    pub fn label(&self) -> &'static str {
        match self {
            CodeResolution::Unhandled => "unhandled",
            CodeResolution::Handled { .. } => "handled",
        }
    }
}

/// Input for recording a detected code change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCodeChange {
    pub ingredient_id: IngredientId,
    pub product_name: String,
    pub vendor_id: VendorId,
    pub invoice_date: NaiveDate,
    pub old_code: String,
    pub new_code: String,
}

pub(crate) fn validate(change: &NewCodeChange) -> DomainResult<()> {
    if change.product_name.trim().is_empty() {
        return Err(DomainError::validation("product_name must not be blank"));
    }
    if change.old_code.trim().is_empty() || change.new_code.trim().is_empty() {
        return Err(DomainError::validation("item codes must not be blank"));
    }
    if change.old_code.trim() == change.new_code.trim() {
        return Err(DomainError::validation("new_code equals old_code"));
    }
    Ok(())
}

/// A detected vendor item-code change for one ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChange {
    id: CodeChangeId,
    organization_id: OrganizationId,
    ingredient_id: IngredientId,
    product_name: String,
    vendor_id: VendorId,
    invoice_date: NaiveDate,
    old_code: String,
    new_code: String,
    #[serde(flatten)]
    resolution: CodeResolution,
    notes: Option<String>,
    detected_at: DateTime<Utc>,
    version: u64,
}

impl CodeChange {
    pub(crate) fn from_recorded(e: &CodeChangeRecorded) -> Self {
        Self {
            id: e.change_id,
            organization_id: e.organization_id,
            ingredient_id: e.ingredient_id,
            product_name: e.product_name.clone(),
            vendor_id: e.vendor_id.clone(),
            invoice_date: e.invoice_date,
            old_code: e.old_code.clone(),
            new_code: e.new_code.clone(),
            resolution: CodeResolution::Unhandled,
            notes: None,
            detected_at: e.occurred_at,
            version: 1,
        }
    }

    pub fn id_typed(&self) -> CodeChangeId {
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

    pub fn old_code(&self) -> &str {
        &self.old_code
    }

    pub fn new_code(&self) -> &str {
        &self.new_code
    }

    pub fn resolution(&self) -> &CodeResolution {
        &self.resolution
    }

    pub fn handled(&self) -> bool {
        matches!(self.resolution, CodeResolution::Handled { .. })
    }

    pub fn handled_by(&self) -> Option<UserId> {
        match self.resolution {
            CodeResolution::Handled { handled_by, .. } => Some(handled_by),
            CodeResolution::Unhandled => None,
        }
    }

    pub fn handled_at(&self) -> Option<DateTime<Utc>> {
        match self.resolution {
            CodeResolution::Handled { handled_at, .. } => Some(handled_at),
            CodeResolution::Unhandled => None,
        }
    }

    pub fn action(&self) -> Option<CodeChangeAction> {
        match self.resolution {
            CodeResolution::Handled { action, .. } => Some(action),
            CodeResolution::Unhandled => None,
        }
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }

    pub(crate) fn ensure_unhandled(&self) -> DomainResult<()> {
        match self.resolution {
            CodeResolution::Unhandled => Ok(()),
            CodeResolution::Handled { action, .. } => Err(DomainError::invalid_state(
                format!("code change {}", self.id),
                format!("handled ({})", action.as_str()),
            )),
        }
    }

    pub(crate) fn apply_handled(&mut self, e: &CodeChangeHandled) {
        self.resolution = CodeResolution::Handled {
            handled_by: e.handled_by,
            handled_at: e.occurred_at,
            action: e.action,
        };
        if e.notes.is_some() {
            self.notes = e.notes.clone();
        }
        self.version += 1;
    }
}

impl Entity for CodeChange {
    type Id = CodeChangeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl OrganizationScoped for CodeChange {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}
