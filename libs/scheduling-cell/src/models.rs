// libs/scheduling-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SchedulingError;

pub const MINUTES_PER_DAY: i32 = 24 * 60;

/// Minutes since midnight for a wall-clock time.
pub fn minute_of_day(time: NaiveTime) -> i32 {
    (time.hour() * 60 + time.minute()) as i32
}

/// Inverse of [`minute_of_day`]; `None` outside `0..1440`.
pub fn time_from_minute(minute: i32) -> Option<NaiveTime> {
    if !(0..MINUTES_PER_DAY).contains(&minute) {
        return None;
    }
    NaiveTime::from_hms_opt((minute / 60) as u32, (minute % 60) as u32, 0)
}

/// Widen a minute count for interval math. Counts beyond `i32::MAX` saturate
/// and so can never fit inside a day.
pub fn minutes_i32(minutes: u32) -> i32 {
    i32::try_from(minutes).unwrap_or(i32::MAX)
}

/// Reject a duration that is empty or that, padded by a buffer on both
/// sides, would not fit inside one day.
pub fn require_fits_in_day(
    duration_minutes: u32,
    buffer_minutes: u32,
) -> Result<(), SchedulingError> {
    if duration_minutes == 0 {
        return Err(SchedulingError::Validation(
            "duration_minutes must be positive".to_string(),
        ));
    }
    let padded = buffer_minutes
        .checked_mul(2)
        .and_then(|buffers| buffers.checked_add(duration_minutes))
        .and_then(|total| i32::try_from(total).ok());
    match padded {
        Some(total) if total < MINUTES_PER_DAY => Ok(()),
        _ => Err(SchedulingError::Validation(format!(
            "duration of {} minutes with {} minute buffers does not fit in a day",
            duration_minutes, buffer_minutes
        ))),
    }
}

/// Like [`time_from_minute`] but clamped to the day, for reporting ranges
/// that were expanded past midnight.
pub fn clamped_time(minute: i32) -> NaiveTime {
    if minute >= MINUTES_PER_DAY {
        return NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
    }
    time_from_minute(minute.max(0)).unwrap_or_default()
}

// ==============================================================================
// CALENDAR MODELS
// ==============================================================================

/// A half-open `[start, end)` wall-clock interval within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, SchedulingError> {
        if start >= end {
            return Err(SchedulingError::Validation(format!(
                "time range start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start_minute(&self) -> i32 {
        minute_of_day(self.start)
    }

    pub fn end_minute(&self) -> i32 {
        minute_of_day(self.end)
    }

    pub fn duration_minutes(&self) -> i32 {
        self.end_minute() - self.start_minute()
    }
}

/// Weekly working hours for one staff member, indexed Monday-first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHoursTemplate {
    days: [Option<TimeRange>; 7],
}

impl WorkingHoursTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_day(mut self, weekday: Weekday, hours: TimeRange) -> Self {
        self.set_day(weekday, Some(hours));
        self
    }

    pub fn set_day(&mut self, weekday: Weekday, hours: Option<TimeRange>) {
        self.days[weekday.num_days_from_monday() as usize] = hours;
    }

    pub fn hours_for(&self, weekday: Weekday) -> Option<TimeRange> {
        self.days[weekday.num_days_from_monday() as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionStatus {
    Pending,
    Approved,
    Denied,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExceptionKind {
    /// Time off, holiday, sick day: no working interval at all.
    Closure,
    /// Special hours replacing the template for the covered dates.
    ModifiedHours { hours: TimeRange },
}

/// Override of the weekly template for a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleException {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub kind: ExceptionKind,
    pub status: ExceptionStatus,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScheduleException {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.status == ExceptionStatus::Approved && self.covers(date)
    }
}

/// Ad-hoc blocked period. `staff_id: None` blocks every staff member of the salon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedTime {
    pub id: Uuid,
    pub salon_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub reason: Option<String>,
}

impl BlockedTime {
    /// The part of this block falling on `date`, in minutes since midnight.
    pub fn minutes_on(&self, date: NaiveDate) -> Option<(i32, i32)> {
        let day_start = date.and_hms_opt(0, 0, 0)?;
        let day_end = date.succ_opt()?.and_hms_opt(0, 0, 0)?;
        let start = self.start.max(day_start);
        let end = self.end.min(day_end);
        if start >= end {
            return None;
        }
        let start_minute = (start - day_start).num_minutes() as i32;
        let end_minute = (end - day_start).num_minutes() as i32;
        Some((start_minute, end_minute))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakType {
    Lunch,
    Break,
    Other,
}

impl fmt::Display for BreakType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakType::Lunch => write!(f, "lunch"),
            BreakType::Break => write!(f, "break"),
            BreakType::Other => write!(f, "other"),
        }
    }
}

/// A daily break; `day_of_week: None` applies to every working day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffBreak {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub break_type: BreakType,
    pub day_of_week: Option<Weekday>,
    pub hours: TimeRange,
}

impl StaffBreak {
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        self.day_of_week.map_or(true, |day| day == date.weekday())
    }
}

/// Time committed by an appointment that still occupies the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedInterval {
    pub appointment_id: Uuid,
    pub staff_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub buffer_minutes: u32,
    pub status: AppointmentStatus,
}

impl BookedInterval {
    /// `[start - buffer, end + buffer)` in minutes since midnight.
    pub fn expanded_minutes(&self) -> (i32, i32) {
        let buffer = minutes_i32(self.buffer_minutes);
        (
            minute_of_day(self.start_time).saturating_sub(buffer),
            minute_of_day(self.end_time).saturating_add(buffer),
        )
    }

    pub fn is_active(&self) -> bool {
        self.status.occupies_calendar()
    }
}

/// Candidate booking under evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedSlot {
    pub staff_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    pub buffer_minutes: u32,
}

impl ProposedSlot {
    pub fn start_minute(&self) -> i32 {
        minute_of_day(self.start_time)
    }

    pub fn end_minute(&self) -> i32 {
        self.start_minute()
            .saturating_add(minutes_i32(self.duration_minutes))
    }

    pub fn expanded_minutes(&self) -> (i32, i32) {
        let buffer = minutes_i32(self.buffer_minutes);
        (
            self.start_minute().saturating_sub(buffer),
            self.end_minute().saturating_add(buffer),
        )
    }

    /// End time on the same day, or `None` if the slot runs past midnight.
    pub fn end_time(&self) -> Option<NaiveTime> {
        match self.end_minute() {
            m if m == MINUTES_PER_DAY => None,
            m => time_from_minute(m),
        }
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn validate(&self) -> Result<(), SchedulingError> {
        require_fits_in_day(self.duration_minutes, self.buffer_minutes)?;
        if self.end_time().is_none() || self.end_minute() >= MINUTES_PER_DAY {
            return Err(SchedulingError::Validation(format!(
                "slot starting {} for {} minutes runs past the end of the day",
                self.start_time, self.duration_minutes
            )));
        }
        Ok(())
    }
}

// ==============================================================================
// CATALOG MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: Uuid,
    pub salon_id: Uuid,
    pub display_name: String,
    pub working_hours: WorkingHoursTemplate,
    /// Services this person performs. Empty means no restriction.
    pub service_ids: Vec<Uuid>,
    pub is_active: bool,
}

impl StaffMember {
    pub fn performs(&self, service_id: Uuid) -> bool {
        self.service_ids.is_empty() || self.service_ids.contains(&service_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub id: Uuid,
    pub salon_id: Uuid,
    pub name: String,
    pub duration_minutes: u32,
    /// Minor currency units.
    pub price: i64,
    pub is_active: bool,
}

// ==============================================================================
// APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Draft,
    Pending,
    Confirmed,
    CheckedIn,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 9] = [
        AppointmentStatus::Draft,
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::CheckedIn,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
        AppointmentStatus::Rescheduled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }

    /// Whether an appointment in this status blocks its interval for new bookings.
    pub fn occupies_calendar(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Draft
                | AppointmentStatus::Pending
                | AppointmentStatus::Confirmed
                | AppointmentStatus::CheckedIn
                | AppointmentStatus::InProgress
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Draft => write!(f, "draft"),
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::CheckedIn => write!(f, "checked_in"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentTrigger {
    Create,
    Submit,
    Confirm,
    CheckIn,
    StartService,
    Complete,
    Cancel,
    MarkNoShow,
    Reschedule,
}

impl fmt::Display for AppointmentTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentTrigger::Create => write!(f, "create"),
            AppointmentTrigger::Submit => write!(f, "submit"),
            AppointmentTrigger::Confirm => write!(f, "confirm"),
            AppointmentTrigger::CheckIn => write!(f, "check_in"),
            AppointmentTrigger::StartService => write!(f, "start_service"),
            AppointmentTrigger::Complete => write!(f, "complete"),
            AppointmentTrigger::Cancel => write!(f, "cancel"),
            AppointmentTrigger::MarkNoShow => write!(f, "mark_no_show"),
            AppointmentTrigger::Reschedule => write!(f, "reschedule"),
        }
    }
}

/// One booked service inside an appointment, performed back to back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentService {
    pub service_id: Uuid,
    pub name: String,
    pub duration_minutes: u32,
    pub unit_price: i64,
    pub quantity: u32,
    pub order: u32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl AppointmentService {
    /// Minutes this line occupies, or `None` if the product overflows.
    pub fn total_minutes(&self) -> Option<u32> {
        self.duration_minutes.checked_mul(self.quantity)
    }
}

/// Monetary totals in minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentTotals {
    pub subtotal: i64,
    pub discount: i64,
    pub tax: i64,
    pub tip: i64,
    pub total: i64,
    pub finalized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    pub at: NaiveDateTime,
    pub by: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: Option<AppointmentStatus>,
    pub to: AppointmentStatus,
    pub trigger: AppointmentTrigger,
    pub at: NaiveDateTime,
    pub by: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub salon_id: Uuid,
    pub staff_id: Uuid,
    pub customer_id: Uuid,
    pub confirmation_code: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_minutes: u32,
    pub buffer_minutes: u32,
    pub services: Vec<AppointmentService>,
    pub totals: AppointmentTotals,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub rescheduled_from: Option<Uuid>,
    pub rescheduled_to: Option<Uuid>,
    pub checked_in: Option<AuditStamp>,
    pub started: Option<AuditStamp>,
    pub completed: Option<AuditStamp>,
    pub cancelled: Option<AuditStamp>,
    pub no_show: Option<AuditStamp>,
    pub status_history: Vec<StatusChange>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Appointment {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }

    pub fn slot(&self) -> ProposedSlot {
        ProposedSlot {
            staff_id: self.staff_id,
            date: self.date,
            start_time: self.start_time,
            duration_minutes: self.duration_minutes,
            buffer_minutes: self.buffer_minutes,
        }
    }

    pub fn booked_interval(&self) -> BookedInterval {
        BookedInterval {
            appointment_id: self.id,
            staff_id: self.staff_id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            buffer_minutes: self.buffer_minutes,
            status: self.status,
        }
    }

    pub fn occupies_calendar(&self) -> bool {
        self.status.occupies_calendar()
    }

    /// Same staff member, day and start time as `slot`.
    pub fn is_at(&self, staff_id: Uuid, date: NaiveDate, start_time: NaiveTime) -> bool {
        self.staff_id == staff_id && self.date == date && self.start_time == start_time
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingOverrides {
    /// Book even when the slot is outside the effective working interval.
    #[serde(default)]
    pub outside_hours: bool,
    /// Book over existing bookings and blocked time.
    #[serde(default)]
    pub ignore_conflicts: bool,
}

impl BookingOverrides {
    pub fn any(&self) -> bool {
        self.outside_hours || self.ignore_conflicts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialStatus {
    Draft,
    #[default]
    Pending,
    Confirmed,
}

impl From<InitialStatus> for AppointmentStatus {
    fn from(status: InitialStatus) -> Self {
        match status {
            InitialStatus::Draft => AppointmentStatus::Draft,
            InitialStatus::Pending => AppointmentStatus::Pending,
            InitialStatus::Confirmed => AppointmentStatus::Confirmed,
        }
    }
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSelection {
    pub service_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub staff_id: Uuid,
    pub customer_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub services: Vec<ServiceSelection>,
    #[serde(default)]
    pub initial_status: InitialStatus,
    #[serde(default)]
    pub discount: i64,
    pub notes: Option<String>,
    #[serde(default)]
    pub overrides: BookingOverrides,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    /// Move to a different staff member; defaults to the current one.
    pub staff_id: Option<Uuid>,
    pub reason: Option<String>,
    #[serde(default)]
    pub overrides: BookingOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPayload {
    pub reason: Option<String>,
    pub tip: Option<i64>,
    pub notes: Option<String>,
}

impl TransitionPayload {
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn with_tip(tip: i64) -> Self {
        Self {
            tip: Some(tip),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub working_hours: Option<TimeRange>,
    pub booked: Vec<BookedInterval>,
    pub free_slots: Vec<ProposedSlot>,
}
