use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Minutes since midnight, store-local wall clock — the only time-of-day type.
pub type Minutes = i32;

/// Half-open interval `[start, end)` in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Minutes,
    pub end: Minutes,
}

impl Span {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_minutes(&self) -> Minutes {
        self.end - self.start
    }

    /// Touching endpoints do not conflict.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Parse `HH:MM` or `HH:MM:SS` to minutes since midnight. Seconds are
/// truncated — slot arithmetic is minute-grained.
pub fn parse_time(s: &str) -> Option<Minutes> {
    let t = NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()?;
    Some((t.hour() * 60 + t.minute()) as Minutes)
}

/// Render minutes since midnight as `HH:MM`.
pub fn format_time(minutes: Minutes) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Weekday index for the weekly hours table: Monday=0 … Sunday=6.
pub fn weekday_index(date: NaiveDate) -> usize {
    date.weekday().num_days_from_monday() as usize
}

/// Minutes-since-midnight component of a wall-clock instant.
pub fn clock_minutes(now: &NaiveDateTime) -> Minutes {
    (now.hour() * 60 + now.minute()) as Minutes
}

/// One configured day of store hours. A weekday with no entry at all is
/// "unconfigured", which is distinct from an explicit `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayHours {
    Closed,
    Open(Span),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Only pending/confirmed appointments occupy a technician's time.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AppointmentStatus::Pending),
            "confirmed" => Some(AppointmentStatus::Confirmed),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub store_id: Ulid,
    pub service_id: Ulid,
    /// None = booked without a technician (deferred staff assignment).
    pub technician_id: Option<Ulid>,
    pub date: NaiveDate,
    pub span: Span,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

impl Appointment {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technician {
    pub id: Ulid,
    pub store_id: Ulid,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct StoreState {
    pub id: Ulid,
    /// Weekly hours by weekday index (Monday=0). None = unconfigured.
    pub weekly: [Option<DayHours>; 7],
    /// Exact-date overrides; take precedence over the weekly row.
    pub holidays: HashMap<NaiveDate, DayHours>,
    pub technicians: HashMap<Ulid, Technician>,
    /// All appointments, sorted by `(date, span.start)`.
    pub appointments: Vec<Appointment>,
}

impl StoreState {
    pub fn new(id: Ulid) -> Self {
        Self {
            id,
            weekly: [None; 7],
            holidays: HashMap::new(),
            technicians: HashMap::new(),
            appointments: Vec::new(),
        }
    }

    /// Insert maintaining sort order by `(date, span.start)`.
    pub fn insert_appointment(&mut self, appointment: Appointment) {
        let key = (appointment.date, appointment.span.start);
        let pos = self
            .appointments
            .partition_point(|a| (a.date, a.span.start) <= key);
        self.appointments.insert(pos, appointment);
    }

    pub fn remove_appointment(&mut self, id: Ulid) -> Option<Appointment> {
        let pos = self.appointments.iter().position(|a| a.id == id)?;
        Some(self.appointments.remove(pos))
    }

    pub fn appointment(&self, id: Ulid) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == id)
    }

    pub fn appointment_mut(&mut self, id: Ulid) -> Option<&mut Appointment> {
        self.appointments.iter_mut().find(|a| a.id == id)
    }

    /// Contiguous slice of appointments on `date`. Binary search skips
    /// other days entirely.
    pub fn on_date(&self, date: NaiveDate) -> &[Appointment] {
        let lo = self.appointments.partition_point(|a| a.date < date);
        let hi = self.appointments.partition_point(|a| a.date <= date);
        &self.appointments[lo..hi]
    }

    /// Booked intervals for one technician on one date — active
    /// appointments only, ascending by start. Single-resource by design;
    /// "any professional" queries fan out over `active_technicians`.
    pub fn booked_intervals(&self, technician_id: Ulid, date: NaiveDate) -> Vec<Span> {
        self.on_date(date)
            .iter()
            .filter(|a| a.is_active() && a.technician_id == Some(technician_id))
            .map(|a| a.span)
            .collect()
    }

    /// Active technician ids, sorted for deterministic iteration.
    pub fn active_technicians(&self) -> Vec<Ulid> {
        let mut ids: Vec<Ulid> = self
            .technicians
            .values()
            .filter(|t| t.active)
            .map(|t| t.id)
            .collect();
        ids.sort();
        ids
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    StoreCreated {
        id: Ulid,
    },
    StoreDeleted {
        id: Ulid,
    },
    HoursSet {
        store_id: Ulid,
        weekday: u8,
        hours: DayHours,
    },
    HolidaySet {
        store_id: Ulid,
        date: NaiveDate,
        hours: DayHours,
    },
    HolidayCleared {
        store_id: Ulid,
        date: NaiveDate,
    },
    TechnicianUpserted {
        id: Ulid,
        store_id: Ulid,
        active: bool,
    },
    TechnicianRemoved {
        id: Ulid,
        store_id: Ulid,
    },
    AppointmentBooked {
        id: Ulid,
        store_id: Ulid,
        service_id: Ulid,
        technician_id: Option<Ulid>,
        date: NaiveDate,
        span: Span,
        status: AppointmentStatus,
        notes: Option<String>,
    },
    AppointmentRescheduled {
        id: Ulid,
        store_id: Ulid,
        date: NaiveDate,
        span: Span,
    },
    AppointmentStatusChanged {
        id: Ulid,
        store_id: Ulid,
        status: AppointmentStatus,
    },
}

// ── Query result types ───────────────────────────────────────────

/// A store's resolved hours for one concrete date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedDay {
    Open(Span),
    Closed,
    NotConfigured,
}

impl ResolvedDay {
    pub fn status_str(&self) -> &'static str {
        match self {
            ResolvedDay::Open(_) => "open",
            ResolvedDay::Closed => "closed",
            ResolvedDay::NotConfigured => "unconfigured",
        }
    }
}

/// Why a slot query came back empty. A valid "no availability" result,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoSlots {
    Closed,
    HoursNotConfigured,
}

/// Result of a slot query: bookable start times, ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotQuery {
    pub starts: Vec<Minutes>,
    pub reason: Option<NoSlots>,
}

impl SlotQuery {
    pub fn empty(reason: NoSlots) -> Self {
        Self { starts: Vec::new(), reason: Some(reason) }
    }
}

/// A validated-at-the-edge booking request, as it arrives from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub id: Ulid,
    pub store_id: Ulid,
    pub service_id: Ulid,
    pub technician_id: Option<Ulid>,
    pub date: NaiveDate,
    pub start: Minutes,
    pub duration: Minutes,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentInfo {
    pub id: Ulid,
    pub store_id: Ulid,
    pub service_id: Ulid,
    pub technician_id: Option<Ulid>,
    pub date: NaiveDate,
    pub start: Minutes,
    pub end: Minutes,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

impl From<&Appointment> for AppointmentInfo {
    fn from(a: &Appointment) -> Self {
        Self {
            id: a.id,
            store_id: a.store_id,
            service_id: a.service_id,
            technician_id: a.technician_id,
            date: a.date,
            start: a.span.start,
            end: a.span.end,
            status: a.status,
            notes: a.notes.clone(),
        }
    }
}
