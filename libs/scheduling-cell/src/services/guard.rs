// libs/scheduling-cell/src/services/guard.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::models::{Appointment, BookingOverrides, ProposedSlot, StaffMember};
use crate::services::availability::AvailabilityResolver;
use crate::services::calendar::DayCalendar;
use crate::services::lifecycle::Transition;
use crate::store::SchedulingStore;

/// One staff member's calendar for one day.
pub type CalendarKey = (Uuid, NaiveDate);

type SectionTable = HashMap<CalendarKey, Arc<AsyncMutex<()>>>;

/// Keyed exclusive sections. Equal keys are serialized, different keys run
/// in parallel, and entries nobody holds or waits on are dropped on release.
#[derive(Clone, Debug, Default)]
pub struct CalendarLocks {
    table: Arc<Mutex<SectionTable>>,
}

impl CalendarLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every key in canonical order, or none of them.
    ///
    /// On expiry the key that could not be taken is returned.
    pub async fn acquire(
        &self,
        keys: &[CalendarKey],
        timeout: Duration,
    ) -> Result<CalendarLease, CalendarKey> {
        let mut ordered = keys.to_vec();
        ordered.sort();
        ordered.dedup();

        let deadline = Instant::now() + timeout;
        let mut lease = CalendarLease {
            locks: self.clone(),
            held: Vec::with_capacity(ordered.len()),
        };

        for key in ordered {
            let section = self.section(key);
            match timeout_at(deadline, section.lock_owned()).await {
                Ok(guard) => lease.held.push((key, guard)),
                Err(_) => {
                    drop(lease);
                    self.prune(&[key]);
                    return Err(key);
                }
            }
        }

        Ok(lease)
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.lock_table().len()
    }

    fn section(&self, key: CalendarKey) -> Arc<AsyncMutex<()>> {
        self.lock_table()
            .entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn prune(&self, keys: &[CalendarKey]) {
        let mut table = self.lock_table();
        for key in keys {
            if table.get(key).is_some_and(|s| Arc::strong_count(s) == 1) {
                table.remove(key);
            }
        }
    }

    fn lock_table(&self) -> std::sync::MutexGuard<'_, SectionTable> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Held sections; released on drop.
#[derive(Debug)]
pub struct CalendarLease {
    locks: CalendarLocks,
    held: Vec<(CalendarKey, OwnedMutexGuard<()>)>,
}

impl CalendarLease {
    pub fn keys(&self) -> Vec<CalendarKey> {
        self.held.iter().map(|(key, _)| *key).collect()
    }
}

impl Drop for CalendarLease {
    fn drop(&mut self) {
        let keys = self.keys();
        self.held.clear();
        self.locks.prune(&keys);
    }
}

/// Result of a committed (or already committed) reschedule.
#[derive(Debug, Clone)]
pub struct RescheduleCommit {
    pub superseded: Appointment,
    pub successor: Appointment,
    pub changed: bool,
}

/// The only writer of appointments. Every write re-checks the latest calendar
/// while holding the `(staff, date)` sections it touches.
pub struct BookingConflictGuard {
    store: Arc<dyn SchedulingStore>,
    locks: CalendarLocks,
    resolver: AvailabilityResolver,
}

impl BookingConflictGuard {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self {
            store,
            locks: CalendarLocks::new(),
            resolver: AvailabilityResolver::new(),
        }
    }

    pub fn locks(&self) -> &CalendarLocks {
        &self.locks
    }

    /// Assemble the current calendar for `staff` on `date` from the store.
    pub async fn load_calendar(
        &self,
        staff: &StaffMember,
        date: NaiveDate,
    ) -> Result<DayCalendar, SchedulingError> {
        let exceptions = self.store.exceptions(staff.id, date).await?;
        let blocked = self.store.blocked_times(staff.salon_id, staff.id, date).await?;
        let breaks = self.store.breaks(staff.id).await?;
        let bookings = self.store.active_bookings(staff.id, date).await?;

        Ok(DayCalendar::new(staff.id, date, staff.working_hours.clone())
            .with_exceptions(exceptions)
            .with_blocked_times(blocked)
            .with_breaks(breaks)
            .with_bookings(bookings))
    }

    /// Re-validate `slot` under its section and persist the appointment built
    /// by `build` if it is still free.
    #[instrument(skip(self, overrides, build), fields(staff_id = %slot.staff_id, date = %slot.date))]
    pub async fn commit_booking<F>(
        &self,
        slot: &ProposedSlot,
        overrides: &BookingOverrides,
        lock_timeout: Duration,
        build: F,
    ) -> Result<Appointment, SchedulingError>
    where
        F: FnOnce() -> Result<Appointment, SchedulingError> + Send,
    {
        let _lease = self.enter(&[(slot.staff_id, slot.date)], lock_timeout).await?;

        let staff = self.load_staff(slot.staff_id).await?;
        let calendar = self.load_calendar(&staff, slot.date).await?;
        let availability = self.resolver.is_available(&calendar, slot, overrides);
        if let Some(reason) = availability.reason {
            warn!("Re-check failed for {} at {}: {}", slot.staff_id, slot.start_time, reason);
            return Err(SchedulingError::Conflict {
                staff_id: slot.staff_id,
                date: slot.date,
                reason,
            });
        }

        let appointment = build()?;
        self.store.insert_appointment(&appointment).await?;
        info!("Committed appointment {} at {} {}", appointment.id, slot.date, slot.start_time);

        Ok(appointment)
    }

    /// Move an appointment to `new_slot`, holding both the old and the new
    /// sections. `build` receives the latest stored original and returns the
    /// superseded original and its successor. Nothing is written unless the
    /// new slot passes the re-check.
    #[instrument(skip(self, overrides, build), fields(staff_id = %new_slot.staff_id, date = %new_slot.date))]
    pub async fn commit_reschedule<F>(
        &self,
        appointment_id: Uuid,
        new_slot: &ProposedSlot,
        overrides: &BookingOverrides,
        lock_timeout: Duration,
        build: F,
    ) -> Result<RescheduleCommit, SchedulingError>
    where
        F: FnOnce(&Appointment) -> Result<(Appointment, Appointment), SchedulingError> + Send,
    {
        let current = self.load_appointment(appointment_id).await?;
        let keys = [
            (current.staff_id, current.date),
            (new_slot.staff_id, new_slot.date),
        ];
        let _lease = self.enter(&keys, lock_timeout).await?;

        let latest = self.load_appointment(appointment_id).await?;
        if let Some(successor) = self.existing_successor(&latest, new_slot).await? {
            debug!("Appointment {} already moved to {}", latest.id, successor.id);
            return Ok(RescheduleCommit {
                superseded: latest,
                successor,
                changed: false,
            });
        }

        let staff = self.load_staff(new_slot.staff_id).await?;
        let calendar = self
            .load_calendar(&staff, new_slot.date)
            .await?
            .excluding(appointment_id);
        let availability = self.resolver.is_available(&calendar, new_slot, overrides);
        if let Some(reason) = availability.reason {
            warn!("Reschedule re-check failed for appointment {}: {}", appointment_id, reason);
            return Err(SchedulingError::Conflict {
                staff_id: new_slot.staff_id,
                date: new_slot.date,
                reason,
            });
        }

        let (superseded, successor) = build(&latest)?;
        self.store.replace_appointment(&superseded, &successor).await?;
        info!("Rescheduled appointment {} to {}", superseded.id, successor.id);

        Ok(RescheduleCommit {
            superseded,
            successor,
            changed: true,
        })
    }

    /// Run a status change inside the appointment's section and persist it.
    #[instrument(skip(self, transition))]
    pub async fn commit_transition<F>(
        &self,
        appointment_id: Uuid,
        lock_timeout: Duration,
        transition: F,
    ) -> Result<Transition, SchedulingError>
    where
        F: FnOnce(&Appointment) -> Result<Transition, SchedulingError> + Send,
    {
        let current = self.load_appointment(appointment_id).await?;
        let _lease = self
            .enter(&[(current.staff_id, current.date)], lock_timeout)
            .await?;

        let latest = self.load_appointment(appointment_id).await?;
        let result = transition(&latest)?;
        if result.changed {
            self.store.update_appointment(&result.appointment).await?;
        }

        Ok(result)
    }

    async fn enter(
        &self,
        keys: &[CalendarKey],
        lock_timeout: Duration,
    ) -> Result<CalendarLease, SchedulingError> {
        self.locks
            .acquire(keys, lock_timeout)
            .await
            .map_err(|(staff_id, date)| {
                warn!("Timed out waiting for calendar {} on {}", staff_id, date);
                SchedulingError::Timeout { staff_id, date }
            })
    }

    async fn load_staff(&self, staff_id: Uuid) -> Result<StaffMember, SchedulingError> {
        self.store
            .staff(staff_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("staff", staff_id))
    }

    async fn load_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        self.store
            .appointment(appointment_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("appointment", appointment_id))
    }

    /// The successor of an already rescheduled appointment, if it sits at `slot`.
    async fn existing_successor(
        &self,
        appointment: &Appointment,
        slot: &ProposedSlot,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let Some(successor_id) = appointment.rescheduled_to else {
            return Ok(None);
        };
        let successor = self.store.appointment(successor_id).await?;
        Ok(successor.filter(|s| s.is_at(slot.staff_id, slot.date, slot.start_time)))
    }
}
