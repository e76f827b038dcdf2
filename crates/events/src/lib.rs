//! Review event contracts.
//!
//! Events describe decisions that already happened in a review session; they
//! are what the tracker applies and what the activity log records.

pub mod event;
pub mod tenant;

pub use event::Event;
pub use tenant::{OrganizationScoped, ensure_same_organization};
