use chrono::{NaiveDate, NaiveDateTime};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::{apply_lead_time, drop_conflicting, slot_grid, union_starts};
use super::hours::resolve_hours;
use super::{Engine, EngineError};

impl Engine {
    /// Bookable start times for a (store, date, duration) tuple,
    /// optionally scoped to one technician or merged across all active
    /// technicians ("any professional").
    ///
    /// A closed or unconfigured day is a valid empty result carrying the
    /// reason, not an error. `now` is the caller's store-local clock:
    /// on the current date, starts earlier than `now + lead` are
    /// dropped; a date already in the past yields nothing.
    pub async fn available_slots(
        &self,
        store_id: Ulid,
        date: NaiveDate,
        duration: Minutes,
        technician_id: Option<Ulid>,
        granularity: Option<Minutes>,
        now: NaiveDateTime,
    ) -> Result<SlotQuery, EngineError> {
        if duration <= 0 || duration > MAX_DURATION_MINUTES {
            return Err(EngineError::LimitExceeded("duration out of range"));
        }
        let granularity = granularity.unwrap_or(DEFAULT_GRANULARITY_MINUTES);
        if !(MIN_GRANULARITY_MINUTES..=MAX_GRANULARITY_MINUTES).contains(&granularity) {
            return Err(EngineError::LimitExceeded("granularity out of range"));
        }

        let rs = self
            .get_store(&store_id)
            .ok_or(EngineError::NotFound(store_id))?;
        let guard = rs.read().await;

        let window = match resolve_hours(&guard, date) {
            ResolvedDay::Closed => return Ok(SlotQuery::empty(NoSlots::Closed)),
            ResolvedDay::NotConfigured => {
                return Ok(SlotQuery::empty(NoSlots::HoursNotConfigured));
            }
            ResolvedDay::Open(window) => window,
        };

        let grid = slot_grid(window, duration, granularity);

        let mut starts = match technician_id {
            Some(tech) => {
                let t = guard
                    .technicians
                    .get(&tech)
                    .ok_or(EngineError::NotFound(tech))?;
                if !t.active {
                    return Err(EngineError::TechnicianInactive(tech));
                }
                drop_conflicting(&grid, duration, &guard.booked_intervals(tech, date))
            }
            None => {
                let techs = guard.active_technicians();
                if techs.is_empty() {
                    // No staff yet: serve the bare store-hours grid
                    // (deferred staff assignment).
                    grid
                } else {
                    let per_tech: Vec<Vec<Minutes>> = techs
                        .iter()
                        .map(|&t| {
                            drop_conflicting(&grid, duration, &guard.booked_intervals(t, date))
                        })
                        .collect();
                    union_starts(&per_tech)
                }
            }
        };

        let today = now.date();
        if date < today {
            starts.clear();
        } else if date == today {
            starts = apply_lead_time(starts, clock_minutes(&now) + DEFAULT_LEAD_MINUTES);
        }

        Ok(SlotQuery { starts, reason: None })
    }

    /// Already-booked intervals for one technician on one date.
    pub async fn booked_intervals(
        &self,
        store_id: Ulid,
        technician_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<Span>, EngineError> {
        let rs = self
            .get_store(&store_id)
            .ok_or(EngineError::NotFound(store_id))?;
        let guard = rs.read().await;
        if !guard.technicians.contains_key(&technician_id) {
            return Err(EngineError::NotFound(technician_id));
        }
        Ok(guard.booked_intervals(technician_id, date))
    }

    /// Resolve a store's hours for one date (open window, closed, or
    /// never configured).
    pub async fn resolve_day(
        &self,
        store_id: Ulid,
        date: NaiveDate,
    ) -> Result<ResolvedDay, EngineError> {
        let rs = self
            .get_store(&store_id)
            .ok_or(EngineError::NotFound(store_id))?;
        let guard = rs.read().await;
        Ok(resolve_hours(&guard, date))
    }

    pub async fn get_appointment(&self, id: Ulid) -> Result<AppointmentInfo, EngineError> {
        let store_id = self
            .store_for_entity(&id)
            .ok_or(EngineError::NotFound(id))?;
        let rs = self
            .get_store(&store_id)
            .ok_or(EngineError::NotFound(store_id))?;
        let guard = rs.read().await;
        guard
            .appointment(id)
            .map(AppointmentInfo::from)
            .ok_or(EngineError::NotFound(id))
    }

    pub async fn list_appointments(
        &self,
        store_id: Ulid,
        date: NaiveDate,
        technician_id: Option<Ulid>,
    ) -> Result<Vec<AppointmentInfo>, EngineError> {
        let rs = self
            .get_store(&store_id)
            .ok_or(EngineError::NotFound(store_id))?;
        let guard = rs.read().await;
        Ok(guard
            .on_date(date)
            .iter()
            .filter(|a| technician_id.is_none() || a.technician_id == technician_id)
            .map(AppointmentInfo::from)
            .collect())
    }

    pub async fn list_technicians(&self, store_id: Ulid) -> Result<Vec<Technician>, EngineError> {
        let rs = self
            .get_store(&store_id)
            .ok_or(EngineError::NotFound(store_id))?;
        let guard = rs.read().await;
        let mut techs: Vec<Technician> = guard.technicians.values().copied().collect();
        techs.sort_by_key(|t| t.id);
        Ok(techs)
    }

    pub fn list_stores(&self) -> Vec<Ulid> {
        let mut ids: Vec<Ulid> = self.state.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }
}
