use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tokio::sync::{oneshot, RwLock};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{
    check_lead_time, check_no_conflict, check_within_hours, validate_interval,
};
use super::{Engine, EngineError, WalCommand};

impl Engine {
    pub async fn create_store(&self, id: Ulid) -> Result<(), EngineError> {
        if self.state.len() >= MAX_STORES_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many stores"));
        }
        if self.state.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::StoreCreated { id };
        self.wal_append(&event).await?;
        self.state.insert(id, Arc::new(RwLock::new(StoreState::new(id))));
        Ok(())
    }

    pub async fn delete_store(&self, id: Ulid) -> Result<(), EngineError> {
        if !self.state.contains_key(&id) {
            return Err(EngineError::NotFound(id));
        }

        let event = Event::StoreDeleted { id };
        self.wal_append(&event).await?;
        self.state.remove(&id);
        self.entity_to_store.retain(|_, sid| sid != &id);
        Ok(())
    }

    /// Upsert the weekly hours row for one weekday (Monday=0). `None`
    /// marks the day explicitly closed; `Some((open, close))` requires
    /// `open < close` within the day.
    pub async fn set_hours(
        &self,
        store_id: Ulid,
        weekday: u8,
        open_close: Option<(Minutes, Minutes)>,
    ) -> Result<(), EngineError> {
        if weekday > 6 {
            return Err(EngineError::LimitExceeded("weekday out of range"));
        }
        let hours = validate_day_hours(open_close)?;

        let rs = self
            .get_store(&store_id)
            .ok_or(EngineError::NotFound(store_id))?;
        let mut guard = rs.write().await;

        let event = Event::HoursSet { store_id, weekday, hours };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Exact-date override for a single calendar date (holiday closure
    /// or shortened hours). Wins over the weekly row.
    pub async fn set_holiday(
        &self,
        store_id: Ulid,
        date: NaiveDate,
        open_close: Option<(Minutes, Minutes)>,
    ) -> Result<(), EngineError> {
        let hours = validate_day_hours(open_close)?;

        let rs = self
            .get_store(&store_id)
            .ok_or(EngineError::NotFound(store_id))?;
        let mut guard = rs.write().await;

        let event = Event::HolidaySet { store_id, date, hours };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Remove an exact-date override. Clearing a date that has none is a
    /// no-op success (nothing to undo, no event appended).
    pub async fn clear_holiday(&self, store_id: Ulid, date: NaiveDate) -> Result<(), EngineError> {
        let rs = self
            .get_store(&store_id)
            .ok_or(EngineError::NotFound(store_id))?;
        let mut guard = rs.write().await;

        if !guard.holidays.contains_key(&date) {
            return Ok(());
        }
        let event = Event::HolidayCleared { store_id, date };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Insert or update a technician record. The technician directory
    /// owns these rows; the scheduling core only reads them.
    pub async fn upsert_technician(
        &self,
        id: Ulid,
        store_id: Ulid,
        active: bool,
    ) -> Result<(), EngineError> {
        if let Some(existing_store) = self.store_for_entity(&id)
            && existing_store != store_id
        {
            return Err(EngineError::AlreadyExists(id));
        }
        let rs = self
            .get_store(&store_id)
            .ok_or(EngineError::NotFound(store_id))?;
        let mut guard = rs.write().await;
        if !guard.technicians.contains_key(&id)
            && guard.technicians.len() >= MAX_TECHNICIANS_PER_STORE
        {
            return Err(EngineError::LimitExceeded("too many technicians"));
        }

        let event = Event::TechnicianUpserted { id, store_id, active };
        self.persist_and_apply(&mut guard, &event).await
    }

    pub async fn remove_technician(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let (store_id, mut guard) = self.resolve_entity_write(&id).await?;
        if !guard.technicians.contains_key(&id) {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::TechnicianRemoved { id, store_id };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(store_id)
    }

    /// CreateAppointment. Validates and conflict-checks against a
    /// freshly read view of the technician's bookings under the store's
    /// write lock, then persists — the lock spans read-check-then-write,
    /// so of two concurrent requests for the same slot exactly one wins.
    pub async fn book_appointment(
        &self,
        req: BookingRequest,
        now: NaiveDateTime,
    ) -> Result<AppointmentInfo, EngineError> {
        if !req.status.is_active() {
            return Err(EngineError::LimitExceeded(
                "initial status must be pending or confirmed",
            ));
        }
        if let Some(ref n) = req.notes
            && n.len() > MAX_NOTES_LEN
        {
            return Err(EngineError::LimitExceeded("notes too long"));
        }
        let span = validate_interval(req.start, req.duration)?;
        if self.entity_to_store.contains_key(&req.id) {
            return Err(EngineError::AlreadyExists(req.id));
        }

        let rs = self
            .get_store(&req.store_id)
            .ok_or(EngineError::NotFound(req.store_id))?;
        let mut guard = rs.write().await;
        if guard.appointments.len() >= MAX_APPOINTMENTS_PER_STORE {
            return Err(EngineError::LimitExceeded("too many appointments"));
        }

        if let Some(tech) = req.technician_id {
            let t = guard
                .technicians
                .get(&tech)
                .ok_or(EngineError::NotFound(tech))?;
            if !t.active {
                return Err(EngineError::TechnicianInactive(tech));
            }
        }

        check_within_hours(&guard, req.date, &span)?;
        check_lead_time(req.date, req.start, &now, DEFAULT_LEAD_MINUTES)?;
        if let Some(tech) = req.technician_id {
            check_no_conflict(&guard, tech, req.date, &span, None)?;
        }

        let info = AppointmentInfo {
            id: req.id,
            store_id: req.store_id,
            service_id: req.service_id,
            technician_id: req.technician_id,
            date: req.date,
            start: span.start,
            end: span.end,
            status: req.status,
            notes: req.notes.clone(),
        };
        let event = Event::AppointmentBooked {
            id: req.id,
            store_id: req.store_id,
            service_id: req.service_id,
            technician_id: req.technician_id,
            date: req.date,
            span,
            status: req.status,
            notes: req.notes,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(info)
    }

    /// RescheduleAppointment: validate the new `(date, start)` as if
    /// booking fresh — excluding the appointment's own current row —
    /// then update date/time in place (same id, same status, same
    /// technician; never delete+recreate).
    pub async fn reschedule_appointment(
        &self,
        id: Ulid,
        new_date: NaiveDate,
        new_start: Minutes,
        now: NaiveDateTime,
    ) -> Result<AppointmentInfo, EngineError> {
        let (store_id, mut guard) = self.resolve_entity_write(&id).await?;
        let (duration, technician_id, status) = {
            let a = guard.appointment(id).ok_or(EngineError::NotFound(id))?;
            (a.span.duration_minutes(), a.technician_id, a.status)
        };
        if !status.is_active() {
            return Err(EngineError::NotActive(id));
        }

        let span = validate_interval(new_start, duration)?;
        check_within_hours(&guard, new_date, &span)?;
        check_lead_time(new_date, new_start, &now, DEFAULT_LEAD_MINUTES)?;
        if let Some(tech) = technician_id {
            check_no_conflict(&guard, tech, new_date, &span, Some(id))?;
        }

        let event = Event::AppointmentRescheduled { id, store_id, date: new_date, span };
        self.persist_and_apply(&mut guard, &event).await?;
        guard
            .appointment(id)
            .map(AppointmentInfo::from)
            .ok_or(EngineError::NotFound(id))
    }

    /// Drive the appointment state machine:
    /// pending → {confirmed, cancelled}, confirmed → {completed, cancelled}.
    /// Cancelling an already-cancelled appointment is a no-op success
    /// with no event appended.
    pub async fn set_status(
        &self,
        id: Ulid,
        to: AppointmentStatus,
    ) -> Result<AppointmentInfo, EngineError> {
        let (store_id, mut guard) = self.resolve_entity_write(&id).await?;
        let from = guard
            .appointment(id)
            .ok_or(EngineError::NotFound(id))?
            .status;

        use AppointmentStatus::*;
        if from == Cancelled && to == Cancelled {
            return guard
                .appointment(id)
                .map(AppointmentInfo::from)
                .ok_or(EngineError::NotFound(id));
        }
        let allowed = matches!(
            (from, to),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
        );
        if !allowed {
            return Err(EngineError::InvalidTransition { from, to });
        }

        let event = Event::AppointmentStatusChanged { id, store_id, status: to };
        self.persist_and_apply(&mut guard, &event).await?;
        guard
            .appointment(id)
            .map(AppointmentInfo::from)
            .ok_or(EngineError::NotFound(id))
    }

    /// CancelAppointment — idempotent.
    pub async fn cancel_appointment(&self, id: Ulid) -> Result<AppointmentInfo, EngineError> {
        self.set_status(id, AppointmentStatus::Cancelled).await
    }

    pub async fn confirm_appointment(&self, id: Ulid) -> Result<AppointmentInfo, EngineError> {
        self.set_status(id, AppointmentStatus::Confirmed).await
    }

    pub async fn complete_appointment(&self, id: Ulid) -> Result<AppointmentInfo, EngineError> {
        self.set_status(id, AppointmentStatus::Completed).await
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        for store_id in self.list_stores() {
            let entry = match self.state.get(&store_id) {
                Some(e) => e,
                None => continue,
            };
            let rs = entry.value().clone();
            let guard = rs.try_read().expect("compact: uncontended read");

            events.push(Event::StoreCreated { id: guard.id });

            for (weekday, hours) in guard.weekly.iter().enumerate() {
                if let Some(hours) = hours {
                    events.push(Event::HoursSet {
                        store_id: guard.id,
                        weekday: weekday as u8,
                        hours: *hours,
                    });
                }
            }

            let mut holidays: Vec<_> = guard.holidays.iter().collect();
            holidays.sort_by_key(|(date, _)| **date);
            for (date, hours) in holidays {
                events.push(Event::HolidaySet {
                    store_id: guard.id,
                    date: *date,
                    hours: *hours,
                });
            }

            let mut techs: Vec<_> = guard.technicians.values().collect();
            techs.sort_by_key(|t| t.id);
            for t in techs {
                events.push(Event::TechnicianUpserted {
                    id: t.id,
                    store_id: t.store_id,
                    active: t.active,
                });
            }

            for a in &guard.appointments {
                events.push(Event::AppointmentBooked {
                    id: a.id,
                    store_id: a.store_id,
                    service_id: a.service_id,
                    technician_id: a.technician_id,
                    date: a.date,
                    span: a.span,
                    status: a.status,
                    notes: a.notes.clone(),
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

fn validate_day_hours(open_close: Option<(Minutes, Minutes)>) -> Result<DayHours, EngineError> {
    match open_close {
        None => Ok(DayHours::Closed),
        Some((open, close)) => {
            if open < 0 || close > MINUTES_PER_DAY || open >= close {
                return Err(EngineError::LimitExceeded("open hours outside the day"));
            }
            Ok(DayHours::Open(Span::new(open, close)))
        }
    }
}
