//! Tracing/logging setup shared by every binary and test harness.

pub mod tracing;

pub use crate::tracing::{LogFormat, ParseLogFormatError, init, init_with};
