use chrono::{NaiveDate, NaiveDateTime};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::hours::resolve_hours;
use super::EngineError;

/// The server's store-local wall clock (single store-local clock model).
pub fn now_local() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Validate a requested `(start, duration)` and build its interval.
pub(crate) fn validate_interval(start: Minutes, duration: Minutes) -> Result<Span, EngineError> {
    if duration <= 0 || duration > MAX_DURATION_MINUTES {
        return Err(EngineError::LimitExceeded("duration out of range"));
    }
    if start < 0 || start + duration > MINUTES_PER_DAY {
        return Err(EngineError::LimitExceeded("interval outside the day"));
    }
    Ok(Span::new(start, start + duration))
}

/// On the current date a start must be at or after `now + lead`;
/// earlier dates are rejected outright. Future dates carry no lead-time
/// requirement.
pub(crate) fn check_lead_time(
    date: NaiveDate,
    start: Minutes,
    now: &NaiveDateTime,
    lead: Minutes,
) -> Result<(), EngineError> {
    let today = now.date();
    if date < today || (date == today && start < clock_minutes(now) + lead) {
        return Err(EngineError::PastTime);
    }
    Ok(())
}

/// The requested interval must lie inside the day's open window.
pub(crate) fn check_within_hours(
    state: &StoreState,
    date: NaiveDate,
    span: &Span,
) -> Result<(), EngineError> {
    match resolve_hours(state, date) {
        ResolvedDay::Open(window) if window.contains_span(span) => Ok(()),
        ResolvedDay::Open(window) => Err(EngineError::OutsideHours(window)),
        ResolvedDay::Closed => Err(EngineError::StoreClosed),
        ResolvedDay::NotConfigured => Err(EngineError::HoursNotConfigured),
    }
}

/// The write-time conflict check. Scans a freshly read view of the
/// technician's active appointments on `date` — the caller holds the
/// store's write lock, so nothing can slip in between this check and the
/// insert. `exclude` skips the appointment's own row on reschedule.
pub(crate) fn check_no_conflict(
    state: &StoreState,
    technician_id: Ulid,
    date: NaiveDate,
    span: &Span,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    for a in state.on_date(date) {
        if !a.is_active() || a.technician_id != Some(technician_id) {
            continue;
        }
        if exclude == Some(a.id) {
            continue;
        }
        if a.span.overlaps(span) {
            return Err(EngineError::Conflict {
                appointment_id: a.id,
                span: a.span,
            });
        }
    }
    Ok(())
}
