//! Vendor invoice change review (price and item-code changes).
//!
//! Deterministic domain logic only: recording detected changes, the one-shot
//! review transitions, derived stats and audit payloads. Persistence and
//! activity-log delivery live in `kitchenops-infra`.

pub mod activity;
pub mod code_change;
pub mod price;
pub mod price_change;
pub mod stats;
pub mod tracker;

pub use activity::{ActivityDetails, ActivityEntry};
pub use code_change::{CodeChange, CodeChangeAction, CodeChangeId, CodeResolution, NewCodeChange};
pub use price::{InvoiceRef, Price, VendorId};
pub use price_change::{NewPriceChange, PriceChange, PriceChangeId, PriceReview, percent_change};
pub use stats::{DEFAULT_ALERT_THRESHOLD_PCT, VendorInvoiceStats};
pub use tracker::{
    ApprovePriceChange, ChangeRecord, CodeChangeHandled, CodeChangeRecorded, HandleCodeChange,
    InvoiceChangeTracker, PriceChangeApproved, PriceChangeRecorded, PriceChangeRejected,
    RecordCodeChange, RecordPriceChange, RejectPriceChange, ReviewCommand, ReviewEvent,
};
