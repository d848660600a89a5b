// libs/scheduling-cell/src/store.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    Appointment, BlockedTime, BookedInterval, ScheduleException, ServiceInfo, StaffBreak,
    StaffMember,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("appointment {0} already exists")]
    DuplicateAppointment(Uuid),

    #[error("appointment {0} does not exist")]
    MissingAppointment(Uuid),

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Persistence collaborator. Implementations must make each write atomic;
/// `replace_appointment` in particular must apply both rows or neither.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn staff(&self, staff_id: Uuid) -> Result<Option<StaffMember>, StoreError>;

    async fn service(&self, service_id: Uuid) -> Result<Option<ServiceInfo>, StoreError>;

    async fn customer_exists(&self, salon_id: Uuid, customer_id: Uuid) -> Result<bool, StoreError>;

    /// Exceptions of any status whose date range covers `date`.
    async fn exceptions(
        &self,
        staff_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleException>, StoreError>;

    /// Blocks touching `date` for the staff member, including salon-wide blocks.
    async fn blocked_times(
        &self,
        salon_id: Uuid,
        staff_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<BlockedTime>, StoreError>;

    async fn breaks(&self, staff_id: Uuid) -> Result<Vec<StaffBreak>, StoreError>;

    /// Intervals of appointments that still occupy the calendar on `date`.
    async fn active_bookings(
        &self,
        staff_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<BookedInterval>, StoreError>;

    async fn appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<(), StoreError>;

    async fn update_appointment(&self, appointment: &Appointment) -> Result<(), StoreError>;

    /// Persist the superseded original and its successor in one step.
    async fn replace_appointment(
        &self,
        superseded: &Appointment,
        successor: &Appointment,
    ) -> Result<(), StoreError>;
}

#[derive(Default)]
struct Tables {
    staff: HashMap<Uuid, StaffMember>,
    services: HashMap<Uuid, ServiceInfo>,
    customers: HashMap<Uuid, Uuid>,
    exceptions: Vec<ScheduleException>,
    blocked_times: Vec<BlockedTime>,
    breaks: Vec<StaffBreak>,
    appointments: HashMap<Uuid, Appointment>,
}

/// Process-local store used by the HTTP host and the test suites.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_staff(&self, staff: StaffMember) {
        self.tables.write().await.staff.insert(staff.id, staff);
    }

    pub async fn add_service(&self, service: ServiceInfo) {
        self.tables.write().await.services.insert(service.id, service);
    }

    pub async fn add_customer(&self, salon_id: Uuid, customer_id: Uuid) {
        self.tables.write().await.customers.insert(customer_id, salon_id);
    }

    pub async fn add_exception(&self, exception: ScheduleException) {
        self.tables.write().await.exceptions.push(exception);
    }

    pub async fn add_blocked_time(&self, blocked: BlockedTime) {
        self.tables.write().await.blocked_times.push(blocked);
    }

    pub async fn add_break(&self, staff_break: StaffBreak) {
        self.tables.write().await.breaks.push(staff_break);
    }

    /// Every stored appointment for one staff member and day, any status.
    pub async fn appointments_on(&self, staff_id: Uuid, date: NaiveDate) -> Vec<Appointment> {
        let tables = self.tables.read().await;
        let mut found: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| a.staff_id == staff_id && a.date == date)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.start_time);
        found
    }
}

#[async_trait]
impl SchedulingStore for InMemoryStore {
    async fn staff(&self, staff_id: Uuid) -> Result<Option<StaffMember>, StoreError> {
        Ok(self.tables.read().await.staff.get(&staff_id).cloned())
    }

    async fn service(&self, service_id: Uuid) -> Result<Option<ServiceInfo>, StoreError> {
        Ok(self.tables.read().await.services.get(&service_id).cloned())
    }

    async fn customer_exists(&self, salon_id: Uuid, customer_id: Uuid) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.customers.get(&customer_id) == Some(&salon_id))
    }

    async fn exceptions(
        &self,
        staff_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleException>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .exceptions
            .iter()
            .filter(|e| e.staff_id == staff_id && e.covers(date))
            .cloned()
            .collect())
    }

    async fn blocked_times(
        &self,
        salon_id: Uuid,
        staff_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<BlockedTime>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .blocked_times
            .iter()
            .filter(|b| b.salon_id == salon_id)
            .filter(|b| b.staff_id.map_or(true, |id| id == staff_id))
            .filter(|b| b.minutes_on(date).is_some())
            .cloned()
            .collect())
    }

    async fn breaks(&self, staff_id: Uuid) -> Result<Vec<StaffBreak>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .breaks
            .iter()
            .filter(|b| b.staff_id == staff_id)
            .cloned()
            .collect())
    }

    async fn active_bookings(
        &self,
        staff_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<BookedInterval>, StoreError> {
        let tables = self.tables.read().await;
        let mut bookings: Vec<BookedInterval> = tables
            .appointments
            .values()
            .filter(|a| a.staff_id == staff_id && a.date == date && a.occupies_calendar())
            .map(Appointment::booked_interval)
            .collect();
        bookings.sort_by_key(|b| b.start_time);
        Ok(bookings)
    }

    async fn appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.tables.read().await.appointments.get(&appointment_id).cloned())
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.appointments.contains_key(&appointment.id) {
            return Err(StoreError::DuplicateAppointment(appointment.id));
        }
        debug!("Storing appointment {}", appointment.id);
        tables.appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn update_appointment(&self, appointment: &Appointment) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables.appointments.get_mut(&appointment.id) {
            Some(existing) => {
                *existing = appointment.clone();
                Ok(())
            }
            None => Err(StoreError::MissingAppointment(appointment.id)),
        }
    }

    async fn replace_appointment(
        &self,
        superseded: &Appointment,
        successor: &Appointment,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.appointments.contains_key(&superseded.id) {
            return Err(StoreError::MissingAppointment(superseded.id));
        }
        if tables.appointments.contains_key(&successor.id) {
            return Err(StoreError::DuplicateAppointment(successor.id));
        }
        tables.appointments.insert(superseded.id, superseded.clone());
        tables.appointments.insert(successor.id, successor.clone());
        Ok(())
    }
}
