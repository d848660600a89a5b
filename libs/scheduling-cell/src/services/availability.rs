// libs/scheduling-cell/src/services/availability.rs
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConflictReason;
use crate::models::{
    clamped_time, minutes_i32, time_from_minute, BookingOverrides, ProposedSlot,
};
use crate::services::calendar::DayCalendar;

/// Result of checking one slot. A negative answer is a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    pub reason: Option<ConflictReason>,
}

impl Availability {
    pub fn free() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    pub fn taken(reason: ConflictReason) -> Self {
        Self {
            available: false,
            reason: Some(reason),
        }
    }
}

/// Pure availability checks over a [`DayCalendar`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AvailabilityResolver;

impl AvailabilityResolver {
    pub fn new() -> Self {
        Self
    }

    /// Decide whether `slot` can be booked on `calendar`.
    ///
    /// Checks run in a fixed order: schedule, working hours, blocked time,
    /// existing bookings. `outside_hours` skips the first two and
    /// `ignore_conflicts` skips the last two.
    pub fn is_available(
        &self,
        calendar: &DayCalendar,
        slot: &ProposedSlot,
        overrides: &BookingOverrides,
    ) -> Availability {
        let (start, end) = slot.expanded_minutes();

        if !overrides.outside_hours {
            let Some(hours) = calendar.effective_hours() else {
                return Availability::taken(ConflictReason::NoSchedule);
            };
            if start < hours.start_minute() || end > hours.end_minute() {
                return Availability::taken(ConflictReason::OutsideHours {
                    open: hours.start,
                    close: hours.end,
                });
            }
        }

        if overrides.ignore_conflicts {
            return Availability::free();
        }

        if let Some(block) = calendar
            .blocked
            .iter()
            .find(|b| self.intervals_overlap(start, end, b.start_minute, b.end_minute))
        {
            debug!("Slot {} overlaps {} block", slot.start_time, block.label);
            return Availability::taken(ConflictReason::Blocked {
                start: clamped_time(block.start_minute),
                end: clamped_time(block.end_minute),
            });
        }

        for booking in calendar.active_bookings() {
            let (booked_start, booked_end) = booking.expanded_minutes();
            if self.intervals_overlap(start, end, booked_start, booked_end) {
                return Availability::taken(ConflictReason::SlotTaken {
                    appointment_id: booking.appointment_id,
                });
            }
        }

        Availability::free()
    }

    /// Lazily enumerate bookable slots of `duration_minutes` across the day's
    /// working interval, stepping by `granularity_minutes` from opening time.
    pub fn list_free_slots<'a>(
        &self,
        calendar: &'a DayCalendar,
        duration_minutes: u32,
        buffer_minutes: u32,
        granularity_minutes: u32,
    ) -> FreeSlots<'a> {
        let (open, close) = match calendar.effective_hours() {
            Some(hours) if duration_minutes > 0 => (hours.start_minute(), hours.end_minute()),
            _ => (0, 0),
        };
        FreeSlots {
            resolver: *self,
            calendar,
            next_minute: open,
            close_minute: close,
            duration_minutes,
            buffer_minutes,
            step: minutes_i32(granularity_minutes.max(1)),
        }
    }

    /// Half-open overlap: `[s1, e1)` and `[s2, e2)` share at least one minute.
    pub fn intervals_overlap(&self, start1: i32, end1: i32, start2: i32, end2: i32) -> bool {
        start1 < end2 && start2 < end1
    }
}

/// Iterator returned by [`AvailabilityResolver::list_free_slots`]. Cloning
/// restarts from the clone's current position.
#[derive(Debug, Clone)]
pub struct FreeSlots<'a> {
    resolver: AvailabilityResolver,
    calendar: &'a DayCalendar,
    next_minute: i32,
    close_minute: i32,
    duration_minutes: u32,
    buffer_minutes: u32,
    step: i32,
}

impl Iterator for FreeSlots<'_> {
    type Item = ProposedSlot;

    fn next(&mut self) -> Option<ProposedSlot> {
        let no_overrides = BookingOverrides::default();
        let duration = minutes_i32(self.duration_minutes);
        while self.next_minute.saturating_add(duration) <= self.close_minute {
            let minute = self.next_minute;
            self.next_minute = self.next_minute.saturating_add(self.step);

            let start_time = time_from_minute(minute)?;
            let candidate = ProposedSlot {
                staff_id: self.calendar.staff_id,
                date: self.calendar.date,
                start_time,
                duration_minutes: self.duration_minutes,
                buffer_minutes: self.buffer_minutes,
            };
            if self
                .resolver
                .is_available(self.calendar, &candidate, &no_overrides)
                .available
            {
                return Some(candidate);
            }
        }
        None
    }
}
