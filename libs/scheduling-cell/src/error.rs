// libs/scheduling-cell/src/error.rs
use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{AppointmentStatus, AppointmentTrigger, ProposedSlot};
use crate::store::StoreError;

/// Why a proposed slot cannot be booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictReason {
    NoSchedule,
    OutsideHours { open: NaiveTime, close: NaiveTime },
    Blocked { start: NaiveTime, end: NaiveTime },
    SlotTaken { appointment_id: Uuid },
}

impl ConflictReason {
    pub fn code(&self) -> ErrorCode {
        match self {
            ConflictReason::NoSchedule => ErrorCode::NoSchedule,
            ConflictReason::OutsideHours { .. } => ErrorCode::OutsideHours,
            ConflictReason::Blocked { .. } => ErrorCode::Blocked,
            ConflictReason::SlotTaken { .. } => ErrorCode::SlotTaken,
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::NoSchedule => write!(f, "staff member is not working that day"),
            ConflictReason::OutsideHours { open, close } => {
                write!(f, "slot falls outside working hours {}-{}", open, close)
            }
            ConflictReason::Blocked { start, end } => {
                write!(f, "slot overlaps blocked time {}-{}", start, end)
            }
            ConflictReason::SlotTaken { appointment_id } => {
                write!(f, "slot overlaps appointment {}", appointment_id)
            }
        }
    }
}

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Validation,
    NotFound,
    NoSchedule,
    OutsideHours,
    Blocked,
    SlotTaken,
    Conflict,
    InvalidTransition,
    Timeout,
    Forbidden,
    Storage,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::NoSchedule => "NO_SCHEDULE",
            ErrorCode::OutsideHours => "OUTSIDE_HOURS",
            ErrorCode::Blocked => "BLOCKED",
            ErrorCode::SlotTaken => "SLOT_TAKEN",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::InvalidTransition => "INVALID_TRANSITION",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::Storage => "STORAGE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Requested slot is unavailable: {reason}")]
    Unavailable {
        reason: ConflictReason,
        alternatives: Vec<ProposedSlot>,
    },

    #[error("Booking conflict for staff {staff_id} on {date}: {reason}")]
    Conflict {
        staff_id: Uuid,
        date: NaiveDate,
        reason: ConflictReason,
    },

    #[error("Cannot {attempted} appointment in status {current}: {reason}")]
    InvalidTransition {
        current: AppointmentStatus,
        attempted: AppointmentTrigger,
        reason: String,
    },

    #[error("Timed out waiting for calendar of staff {staff_id} on {date}")]
    Timeout { staff_id: Uuid, date: NaiveDate },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl SchedulingError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        SchedulingError::NotFound { entity, id }
    }

    pub fn invalid_transition(
        current: AppointmentStatus,
        attempted: AppointmentTrigger,
        reason: impl Into<String>,
    ) -> Self {
        SchedulingError::InvalidTransition {
            current,
            attempted,
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SchedulingError::Validation(_) => ErrorCode::Validation,
            SchedulingError::NotFound { .. } => ErrorCode::NotFound,
            SchedulingError::Unavailable { reason, .. } => reason.code(),
            SchedulingError::Conflict { .. } => ErrorCode::Conflict,
            SchedulingError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            SchedulingError::Timeout { .. } => ErrorCode::Timeout,
            SchedulingError::Forbidden(_) => ErrorCode::Forbidden,
            SchedulingError::Storage(_) => ErrorCode::Storage,
        }
    }

    /// Whether the same request may succeed if simply retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SchedulingError::Conflict { .. } | SchedulingError::Timeout { .. }
        )
    }
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        let message = err.to_string();
        match err {
            SchedulingError::Validation(_) => AppError::ValidationError(message),
            SchedulingError::NotFound { .. } => AppError::NotFound(message),
            SchedulingError::Unavailable {
                reason,
                alternatives,
            } => AppError::Unavailable {
                code: reason.code().as_str().to_string(),
                message,
                alternatives: serde_json::to_value(alternatives).unwrap_or_default(),
            },
            SchedulingError::Conflict { .. } => AppError::Conflict(message),
            SchedulingError::InvalidTransition { .. } => AppError::InvalidTransition(message),
            SchedulingError::Timeout { .. } => AppError::Timeout(message),
            SchedulingError::Forbidden(_) => AppError::Forbidden(message),
            SchedulingError::Storage(_) => AppError::Internal(message),
        }
    }
}
