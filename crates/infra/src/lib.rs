//! Infrastructure layer: persistence and activity-log ports, the review
//! service that commits decisions through them, and configuration.

pub mod activity_log;
pub mod change_store;
pub mod config;
pub mod review_service;


pub use activity_log::{ActivityLog, ActivityLogError, InMemoryActivityLog, TracingActivityLog};
pub use change_store::{ChangeStore, InMemoryChangeStore, SessionRecords, StoreError};
pub use config::ReviewConfig;
pub use review_service::{ReviewError, ReviewService};
