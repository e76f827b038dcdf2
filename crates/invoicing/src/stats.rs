//! Derived review-session summary.

use serde::{Deserialize, Serialize};

use crate::code_change::CodeChange;
use crate::price_change::PriceChange;

/// Default `|percent_change|` at which a pending price change counts as an issue.
pub const DEFAULT_ALERT_THRESHOLD_PCT: f64 = 5.0;

/// Read-only summary of a review session. Recomputed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorInvoiceStats {
    pub total_price_changes: usize,
    pub price_increases: usize,
    pub price_decreases: usize,
    pub pending_price_changes: usize,
    pub approved_price_changes: usize,
    pub rejected_price_changes: usize,
    pub total_code_changes: usize,
    pub unhandled_code_changes: usize,
    /// Mean percent change across all price changes (0.0 when there are none).
    pub average_percent_change: f64,
    /// Cents of per-unit increase on price changes that were not approved.
    /// Saturates at `i64::MAX`.
    pub potential_savings: i64,
    /// Pending price changes at or above the alert threshold, plus unhandled code changes.
    pub issue_count: usize,
}

impl VendorInvoiceStats {
    pub fn compute(
        price_changes: &[PriceChange],
        code_changes: &[CodeChange],
        alert_threshold_pct: f64,
    ) -> Self {
        let mut stats = VendorInvoiceStats {
            total_price_changes: price_changes.len(),
            price_increases: 0,
            price_decreases: 0,
            pending_price_changes: 0,
            approved_price_changes: 0,
            rejected_price_changes: 0,
            total_code_changes: code_changes.len(),
            unhandled_code_changes: 0,
            average_percent_change: 0.0,
            potential_savings: 0,
            issue_count: 0,
        };

        let mut pct_sum = 0.0;
        for change in price_changes {
            pct_sum += change.percent_change();

            if change.is_increase() {
                stats.price_increases += 1;
                if !change.is_approved() {
                    stats.potential_savings =
                        stats.potential_savings.saturating_add(change.delta_cents());
                }
            } else if change.delta_cents() < 0 {
                stats.price_decreases += 1;
            }

            if change.is_pending() {
                stats.pending_price_changes += 1;
                if change.percent_change().abs() >= alert_threshold_pct {
                    stats.issue_count += 1;
                }
            } else if change.is_approved() {
                stats.approved_price_changes += 1;
            } else {
                stats.rejected_price_changes += 1;
            }
        }

        if !price_changes.is_empty() {
            stats.average_percent_change = pct_sum / price_changes.len() as f64;
        }

        stats.unhandled_code_changes = code_changes.iter().filter(|c| !c.handled()).count();
        stats.issue_count += stats.unhandled_code_changes;

        stats
    }

    /// True when nothing in the session is waiting for a decision.
    pub fn is_fully_reviewed(&self) -> bool {
        self.pending_price_changes == 0 && self.unhandled_code_changes == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_session_has_zeroed_stats() {
        let stats = VendorInvoiceStats::compute(&[], &[], DEFAULT_ALERT_THRESHOLD_PCT);
        assert_eq!(stats.total_price_changes, 0);
        assert_eq!(stats.average_percent_change, 0.0);
        assert_eq!(stats.issue_count, 0);
        assert!(stats.is_fully_reviewed());
    }
}
