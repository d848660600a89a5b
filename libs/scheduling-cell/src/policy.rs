// libs/scheduling-cell/src/policy.rs
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::Role;

use crate::error::SchedulingError;
use crate::models::BookingOverrides;

/// Per-salon scheduling rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingPolicy {
    pub buffer_minutes: u32,
    pub slot_granularity_minutes: u32,
    pub min_cancellation_notice_hours: u32,
    pub lock_timeout_ms: u64,
    /// Tax rate in basis points (1000 = 10%).
    pub tax_rate_bps: u32,
    pub hours_override_roles: Vec<Role>,
    pub conflict_override_roles: Vec<Role>,
    pub alternative_slot_count: usize,
    pub max_horizon_days: u32,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            buffer_minutes: 0,
            slot_granularity_minutes: 30,
            min_cancellation_notice_hours: 24,
            lock_timeout_ms: 2_000,
            tax_rate_bps: 1_000,
            hours_override_roles: vec![Role::SuperAdmin, Role::SalonOwner, Role::SalonManager],
            conflict_override_roles: vec![Role::SuperAdmin, Role::SalonOwner],
            alternative_slot_count: 3,
            max_horizon_days: 31,
        }
    }
}

impl SchedulingPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            buffer_minutes: config.buffer_minutes,
            slot_granularity_minutes: config.slot_granularity_minutes.max(1),
            min_cancellation_notice_hours: config.min_cancellation_notice_hours,
            lock_timeout_ms: config.lock_timeout_ms,
            tax_rate_bps: config.tax_rate_bps,
            max_horizon_days: config.max_horizon_days,
            ..Self::default()
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Reject override flags the caller's role is not allowed to use.
    pub fn authorize_overrides(
        &self,
        role: Role,
        overrides: &BookingOverrides,
    ) -> Result<(), SchedulingError> {
        if overrides.outside_hours && !self.hours_override_roles.contains(&role) {
            warn!("Role {} attempted an outside-hours override", role);
            return Err(SchedulingError::Forbidden(format!(
                "role {} may not book outside working hours",
                role
            )));
        }
        if overrides.ignore_conflicts && !self.conflict_override_roles.contains(&role) {
            warn!("Role {} attempted a conflict override", role);
            return Err(SchedulingError::Forbidden(format!(
                "role {} may not book over existing appointments",
                role
            )));
        }
        Ok(())
    }
}

/// Looks up the policy that applies to a salon.
#[async_trait]
pub trait PolicyProvider: Send + Sync {
    async fn policy(&self, salon_id: Uuid) -> SchedulingPolicy;
}

/// A single policy shared by every salon.
#[async_trait]
impl PolicyProvider for SchedulingPolicy {
    async fn policy(&self, _salon_id: Uuid) -> SchedulingPolicy {
        self.clone()
    }
}
