// libs/scheduling-cell/src/services/calendar.rs
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    BlockedTime, BookedInterval, ExceptionKind, ScheduleException, StaffBreak, TimeRange,
    WorkingHoursTemplate,
};

/// Unavailable span inside a day, in minutes since midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedRange {
    pub start_minute: i32,
    pub end_minute: i32,
    pub label: String,
}

/// Everything the resolver needs to know about one staff member on one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCalendar {
    pub staff_id: Uuid,
    pub date: NaiveDate,
    pub template: WorkingHoursTemplate,
    pub exceptions: Vec<ScheduleException>,
    pub blocked: Vec<BlockedRange>,
    pub bookings: Vec<BookedInterval>,
}

impl DayCalendar {
    pub fn new(staff_id: Uuid, date: NaiveDate, template: WorkingHoursTemplate) -> Self {
        Self {
            staff_id,
            date,
            template,
            exceptions: Vec::new(),
            blocked: Vec::new(),
            bookings: Vec::new(),
        }
    }

    pub fn with_exceptions(mut self, exceptions: impl IntoIterator<Item = ScheduleException>) -> Self {
        self.exceptions.extend(
            exceptions
                .into_iter()
                .filter(|e| e.staff_id == self.staff_id && e.covers(self.date)),
        );
        self
    }

    pub fn with_blocked_times(mut self, blocked: impl IntoIterator<Item = BlockedTime>) -> Self {
        for block in blocked {
            if block.staff_id.is_some_and(|id| id != self.staff_id) {
                continue;
            }
            if let Some((start_minute, end_minute)) = block.minutes_on(self.date) {
                self.blocked.push(BlockedRange {
                    start_minute,
                    end_minute,
                    label: block.reason.unwrap_or_else(|| "blocked".to_string()),
                });
            }
        }
        self
    }

    pub fn with_breaks(mut self, breaks: impl IntoIterator<Item = StaffBreak>) -> Self {
        for staff_break in breaks {
            if staff_break.staff_id != self.staff_id || !staff_break.applies_on(self.date) {
                continue;
            }
            self.blocked.push(BlockedRange {
                start_minute: staff_break.hours.start_minute(),
                end_minute: staff_break.hours.end_minute(),
                label: staff_break.break_type.to_string(),
            });
        }
        self
    }

    pub fn with_bookings(mut self, bookings: impl IntoIterator<Item = BookedInterval>) -> Self {
        self.bookings.extend(bookings.into_iter().filter(|b| {
            b.is_active() && b.staff_id == self.staff_id && b.date == self.date
        }));
        self.bookings.sort_by_key(|b| b.start_time);
        self
    }

    /// Working interval after applying approved exceptions. A closure wins
    /// over modified hours; among modified hours the newest exception wins.
    pub fn effective_hours(&self) -> Option<TimeRange> {
        let approved: Vec<&ScheduleException> = self
            .exceptions
            .iter()
            .filter(|e| e.is_effective_on(self.date))
            .collect();

        if approved.iter().any(|e| e.kind == ExceptionKind::Closure) {
            return None;
        }

        let modified = approved
            .iter()
            .filter_map(|e| match e.kind {
                ExceptionKind::ModifiedHours { hours } => Some((e.created_at, hours)),
                ExceptionKind::Closure => None,
            })
            .max_by_key(|(created_at, _)| *created_at);

        match modified {
            Some((_, hours)) => Some(hours),
            None => self.template.hours_for(self.date.weekday()),
        }
    }

    pub fn active_bookings(&self) -> impl Iterator<Item = &BookedInterval> {
        self.bookings.iter().filter(|b| b.is_active())
    }

    /// Copy of this calendar without one appointment, used when moving it.
    pub fn excluding(&self, appointment_id: Uuid) -> Self {
        let mut calendar = self.clone();
        calendar.bookings.retain(|b| b.appointment_id != appointment_id);
        calendar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveTime, TimeZone, Utc, Weekday};

    use crate::models::ExceptionStatus;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn exception(staff_id: Uuid, kind: ExceptionKind, status: ExceptionStatus, age_hours: i64) -> ScheduleException {
        ScheduleException {
            id: Uuid::new_v4(),
            staff_id,
            start_date: monday(),
            end_date: monday(),
            kind,
            status,
            reason: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() - Duration::hours(age_hours),
        }
    }

    #[test]
    fn closure_beats_modified_hours() {
        let staff_id = Uuid::new_v4();
        let template = WorkingHoursTemplate::new()
            .with_day(Weekday::Mon, TimeRange::new(t(9, 0), t(17, 0)).unwrap());
        let modified = ExceptionKind::ModifiedHours {
            hours: TimeRange::new(t(12, 0), t(14, 0)).unwrap(),
        };
        let calendar = DayCalendar::new(staff_id, monday(), template).with_exceptions(vec![
            exception(staff_id, modified, ExceptionStatus::Approved, 0),
            exception(staff_id, ExceptionKind::Closure, ExceptionStatus::Approved, 5),
        ]);
        assert_eq!(calendar.effective_hours(), None);
    }

    #[test]
    fn pending_exception_is_ignored_and_newest_modification_wins() {
        let staff_id = Uuid::new_v4();
        let template = WorkingHoursTemplate::new()
            .with_day(Weekday::Mon, TimeRange::new(t(9, 0), t(17, 0)).unwrap());
        let older = ExceptionKind::ModifiedHours {
            hours: TimeRange::new(t(10, 0), t(12, 0)).unwrap(),
        };
        let newer = ExceptionKind::ModifiedHours {
            hours: TimeRange::new(t(13, 0), t(15, 0)).unwrap(),
        };
        let calendar = DayCalendar::new(staff_id, monday(), template).with_exceptions(vec![
            exception(staff_id, older, ExceptionStatus::Approved, 10),
            exception(staff_id, newer, ExceptionStatus::Approved, 1),
            exception(staff_id, ExceptionKind::Closure, ExceptionStatus::Pending, 0),
        ]);
        assert_eq!(
            calendar.effective_hours(),
            Some(TimeRange::new(t(13, 0), t(15, 0)).unwrap())
        );
    }
}
