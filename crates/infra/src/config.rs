//! Engine configuration: defaults, overridable from the environment.

use std::str::FromStr;
use std::time::Duration;

use stockledger_inventory::AlertRule;

pub const ENV_LOCK_TIMEOUT_MS: &str = "STOCKLEDGER_LOCK_TIMEOUT_MS";
pub const ENV_CREDIT_RETRY_ATTEMPTS: &str = "STOCKLEDGER_CREDIT_RETRY_ATTEMPTS";
pub const ENV_CREDIT_RETRY_BACKOFF_MS: &str = "STOCKLEDGER_CREDIT_RETRY_BACKOFF_MS";
pub const ENV_SWEEP_INTERVAL_SECS: &str = "STOCKLEDGER_SWEEP_INTERVAL_SECS";
pub const ENV_LOW_STOCK_THRESHOLD: &str = "STOCKLEDGER_LOW_STOCK_THRESHOLD";
pub const ENV_CRITICAL_STOCK_THRESHOLD: &str = "STOCKLEDGER_CRITICAL_STOCK_THRESHOLD";
pub const ENV_OVERSTOCK_THRESHOLD: &str = "STOCKLEDGER_OVERSTOCK_THRESHOLD";
pub const ENV_EXPIRY_WARNING_DAYS: &str = "STOCKLEDGER_EXPIRY_WARNING_DAYS";

/// Runtime knobs for the stock engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on waiting for a balance or transfer lock.
    pub lock_timeout: Duration,
    /// Attempts for the transfer credit leg when it fails with a retryable error.
    pub credit_retry_attempts: u32,
    /// Base backoff between credit attempts (doubled each retry).
    pub credit_retry_backoff: Duration,
    /// Interval of the periodic threshold sweep.
    pub sweep_interval: Duration,
    /// Rule used for companies that never configured one.
    pub default_alert_rule: AlertRule,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2000),
            credit_retry_attempts: 3,
            credit_retry_backoff: Duration::from_millis(50),
            sweep_interval: Duration::from_secs(300),
            default_alert_rule: AlertRule::default(),
        }
    }
}

impl EngineConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let rule = defaults.default_alert_rule.clone();

        Self {
            lock_timeout: Duration::from_millis(parse_or(
                &lookup,
                ENV_LOCK_TIMEOUT_MS,
                defaults.lock_timeout.as_millis() as u64,
            )),
            credit_retry_attempts: parse_or(
                &lookup,
                ENV_CREDIT_RETRY_ATTEMPTS,
                defaults.credit_retry_attempts,
            )
            .max(1),
            credit_retry_backoff: Duration::from_millis(parse_or(
                &lookup,
                ENV_CREDIT_RETRY_BACKOFF_MS,
                defaults.credit_retry_backoff.as_millis() as u64,
            )),
            sweep_interval: Duration::from_secs(parse_or(
                &lookup,
                ENV_SWEEP_INTERVAL_SECS,
                defaults.sweep_interval.as_secs(),
            )),
            default_alert_rule: AlertRule {
                low_stock_threshold: parse_or(&lookup, ENV_LOW_STOCK_THRESHOLD, rule.low_stock_threshold),
                critical_stock_threshold: parse_or(
                    &lookup,
                    ENV_CRITICAL_STOCK_THRESHOLD,
                    rule.critical_stock_threshold,
                ),
                overstock_threshold: parse_opt(&lookup, ENV_OVERSTOCK_THRESHOLD)
                    .or(rule.overstock_threshold),
                expiry_warning_days: parse_or(&lookup, ENV_EXPIRY_WARNING_DAYS, rule.expiry_warning_days),
            },
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_default_alert_rule(mut self, rule: AlertRule) -> Self {
        self.default_alert_rule = rule;
        self
    }
}

fn parse_opt<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "unparseable config value; using default");
            None
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    parse_opt(lookup, key).unwrap_or(default)
}
