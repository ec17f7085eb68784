use ulid::Ulid;

use crate::model::{format_time, AppointmentStatus, Span};

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// The booking-time race outcome. Carries the blocking appointment's
    /// `[start, end)` so callers can propose `end` as the next free time.
    Conflict {
        appointment_id: Ulid,
        span: Span,
    },
    /// Requested start is before `now + lead time` on the current date,
    /// or the date itself is in the past.
    PastTime,
    StoreClosed,
    HoursNotConfigured,
    /// The day is open but the requested interval falls outside the
    /// open window (carried for the error message).
    OutsideHours(Span),
    TechnicianInactive(Ulid),
    /// Reschedule target is not pending/confirmed.
    NotActive(Ulid),
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict { appointment_id, span } => write!(
                f,
                "conflict with appointment {appointment_id}: technician booked [{}, {})",
                format_time(span.start),
                format_time(span.end)
            ),
            EngineError::PastTime => write!(f, "requested start is in the past"),
            EngineError::StoreClosed => write!(f, "store is closed on that date"),
            EngineError::HoursNotConfigured => {
                write!(f, "store hours are not configured for that date")
            }
            EngineError::OutsideHours(window) => write!(
                f,
                "requested time falls outside open hours [{}, {})",
                format_time(window.start),
                format_time(window.end)
            ),
            EngineError::TechnicianInactive(id) => write!(f, "technician {id} is not active"),
            EngineError::NotActive(id) => write!(f, "appointment {id} is not active"),
            EngineError::InvalidTransition { from, to } => {
                write!(f, "invalid status transition: {from} -> {to}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
