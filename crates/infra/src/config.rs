//! Configuration loading and representation.
//!
//! Values come from environment variables. Missing or malformed values fall
//! back to defaults with a warning.

use kitchenops_invoicing::DEFAULT_ALERT_THRESHOLD_PCT;
use kitchenops_observability::LogFormat;

pub const ENV_PRICE_ALERT_THRESHOLD_PCT: &str = "KITCHENOPS_PRICE_ALERT_THRESHOLD_PCT";
pub const ENV_LOG_FORMAT: &str = "KITCHENOPS_LOG_FORMAT";

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewConfig {
    /// `|percent_change|` at which a pending price change counts as an issue.
    pub price_alert_threshold_pct: f64,
    pub log_format: LogFormat,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            price_alert_threshold_pct: DEFAULT_ALERT_THRESHOLD_PCT,
            log_format: LogFormat::Json,
        }
    }
}

impl ReviewConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let price_alert_threshold_pct = match lookup(ENV_PRICE_ALERT_THRESHOLD_PCT) {
            None => defaults.price_alert_threshold_pct,
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(pct) if pct.is_finite() && pct >= 0.0 => pct,
                _ => {
                    tracing::warn!(
                        value = %raw,
                        "{ENV_PRICE_ALERT_THRESHOLD_PCT} must be a non-negative number; using default"
                    );
                    defaults.price_alert_threshold_pct
                }
            },
        };

        let log_format = match lookup(ENV_LOG_FORMAT) {
            None => defaults.log_format,
            Some(raw) => raw.parse::<LogFormat>().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "{ENV_LOG_FORMAT} must be json or pretty; using default");
                defaults.log_format
            }),
        };

        Self {
            price_alert_threshold_pct,
            log_format,
        }
    }

    /// Install the process-wide subscriber in the configured format.
    pub fn init_tracing(&self) {
        kitchenops_observability::init_with(self.log_format);
    }
}
