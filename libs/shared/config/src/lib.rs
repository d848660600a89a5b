use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub notification_webhook_url: String,
    pub buffer_minutes: u32,
    pub slot_granularity_minutes: u32,
    pub min_cancellation_notice_hours: u32,
    pub lock_timeout_ms: u64,
    pub tax_rate_bps: u32,
    pub max_horizon_days: u32,
    pub seed_demo_data: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            notification_webhook_url: String::new(),
            buffer_minutes: 0,
            slot_granularity_minutes: 30,
            min_cancellation_notice_hours: 24,
            lock_timeout_ms: 2_000,
            tax_rate_bps: 1_000,
            max_horizon_days: 31,
            seed_demo_data: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| {
                warn!("SERVER_HOST not set, using default");
                defaults.server_host.clone()
            }),
            server_port: parse_var("SERVER_PORT", defaults.server_port),
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL").unwrap_or_else(|_| {
                warn!("NOTIFICATION_WEBHOOK_URL not set, effects will only be logged");
                String::new()
            }),
            buffer_minutes: parse_var("SCHEDULING_BUFFER_MINUTES", defaults.buffer_minutes),
            slot_granularity_minutes: parse_var(
                "SCHEDULING_SLOT_GRANULARITY_MINUTES",
                defaults.slot_granularity_minutes,
            ),
            min_cancellation_notice_hours: parse_var(
                "SCHEDULING_MIN_CANCEL_NOTICE_HOURS",
                defaults.min_cancellation_notice_hours,
            ),
            lock_timeout_ms: parse_var("SCHEDULING_LOCK_TIMEOUT_MS", defaults.lock_timeout_ms),
            tax_rate_bps: parse_var("SCHEDULING_TAX_RATE_BPS", defaults.tax_rate_bps),
            max_horizon_days: parse_var("SCHEDULING_MAX_HORIZON_DAYS", defaults.max_horizon_days),
            seed_demo_data: parse_var("SEED_DEMO_DATA", defaults.seed_demo_data),
        };

        if config.slot_granularity_minutes == 0 {
            warn!("SCHEDULING_SLOT_GRANULARITY_MINUTES must be positive, using default");
            return Self {
                slot_granularity_minutes: defaults.slot_granularity_minutes,
                ..config
            };
        }

        config
    }

    pub fn is_webhook_configured(&self) -> bool {
        !self.notification_webhook_url.is_empty()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default);
            default
        }),
        Err(_) => {
            warn!("{} not set, using default {}", name, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_without_environment() {
        let config = AppConfig::default();
        assert_eq!(config.min_cancellation_notice_hours, 24);
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert!(!config.is_webhook_configured());
    }

    #[test]
    fn invalid_numbers_fall_back_to_default() {
        env::set_var("SCHEDULING_TEST_ONLY_NUMBER", "not-a-number");
        assert_eq!(parse_var("SCHEDULING_TEST_ONLY_NUMBER", 42u32), 42);
        env::set_var("SCHEDULING_TEST_ONLY_NUMBER", " 15 ");
        assert_eq!(parse_var("SCHEDULING_TEST_ONLY_NUMBER", 42u32), 15);
    }
}
