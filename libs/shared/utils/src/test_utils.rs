use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{RequestContext, Role};

pub struct TestConfig {
    pub buffer_minutes: u32,
    pub slot_granularity_minutes: u32,
    pub lock_timeout_ms: u64,
    pub webhook_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            buffer_minutes: 0,
            slot_granularity_minutes: 30,
            lock_timeout_ms: 500,
            webhook_url: String::new(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            notification_webhook_url: self.webhook_url.clone(),
            buffer_minutes: self.buffer_minutes,
            slot_granularity_minutes: self.slot_granularity_minutes,
            lock_timeout_ms: self.lock_timeout_ms,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub role: Role,
    pub salon_id: Uuid,
}

impl TestUser {
    pub fn new(role: Role, salon_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            salon_id,
        }
    }

    pub fn owner(salon_id: Uuid) -> Self {
        Self::new(Role::SalonOwner, salon_id)
    }

    pub fn manager(salon_id: Uuid) -> Self {
        Self::new(Role::SalonManager, salon_id)
    }

    pub fn staff(salon_id: Uuid) -> Self {
        Self::new(Role::Staff, salon_id)
    }

    pub fn customer(salon_id: Uuid) -> Self {
        Self::new(Role::Customer, salon_id)
    }

    pub fn super_admin() -> Self {
        Self::new(Role::SuperAdmin, Uuid::new_v4())
    }

    pub fn to_context(&self) -> RequestContext {
        RequestContext::new(self.id, self.role, self.salon_id)
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid test time")
}

pub fn at(day: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    day.and_time(time(hour, minute))
}
