mod availability;
mod conflict;
mod error;
mod hours;
mod mutations;
mod queries;

pub use availability::{apply_lead_time, drop_conflicting, slot_grid, union_starts};
pub use conflict::now_local;
pub use error::EngineError;
pub use hours::resolve_hours;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

pub type SharedStoreState = Arc<RwLock<StoreState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    respond_batch(batch, &result);
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// One tenant's booking engine: all stores, their hours, technicians and
/// appointments, durably backed by a WAL.
pub struct Engine {
    pub state: DashMap<Ulid, SharedStoreState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Reverse lookup: appointment/technician id → store id.
    pub(super) entity_to_store: DashMap<Ulid, Ulid>,
}

/// Apply an event directly to a StoreState (no locking — caller holds the lock).
fn apply_to_store(rs: &mut StoreState, event: &Event, entity_map: &DashMap<Ulid, Ulid>) {
    match event {
        Event::HoursSet { weekday, hours, .. } => {
            rs.weekly[*weekday as usize] = Some(*hours);
        }
        Event::HolidaySet { date, hours, .. } => {
            rs.holidays.insert(*date, *hours);
        }
        Event::HolidayCleared { date, .. } => {
            rs.holidays.remove(date);
        }
        Event::TechnicianUpserted { id, store_id, active } => {
            rs.technicians.insert(
                *id,
                Technician { id: *id, store_id: *store_id, active: *active },
            );
            entity_map.insert(*id, *store_id);
        }
        Event::TechnicianRemoved { id, .. } => {
            rs.technicians.remove(id);
            entity_map.remove(id);
        }
        Event::AppointmentBooked {
            id,
            store_id,
            service_id,
            technician_id,
            date,
            span,
            status,
            notes,
        } => {
            rs.insert_appointment(Appointment {
                id: *id,
                store_id: *store_id,
                service_id: *service_id,
                technician_id: *technician_id,
                date: *date,
                span: *span,
                status: *status,
                notes: notes.clone(),
            });
            entity_map.insert(*id, *store_id);
        }
        Event::AppointmentRescheduled { id, date, span, .. } => {
            // Re-insert to keep the (date, start) sort order intact
            if let Some(mut a) = rs.remove_appointment(*id) {
                a.date = *date;
                a.span = *span;
                rs.insert_appointment(a);
            }
        }
        Event::AppointmentStatusChanged { id, status, .. } => {
            if let Some(a) = rs.appointment_mut(*id) {
                a.status = *status;
            }
        }
        // StoreCreated/Deleted are handled at the DashMap level, not here
        Event::StoreCreated { .. } | Event::StoreDeleted { .. } => {}
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            state: DashMap::new(),
            wal_tx,
            entity_to_store: DashMap::new(),
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context (e.g. lazy tenant
        // creation).
        for event in &events {
            match event {
                Event::StoreCreated { id } => {
                    engine
                        .state
                        .insert(*id, Arc::new(RwLock::new(StoreState::new(*id))));
                }
                Event::StoreDeleted { id } => {
                    engine.state.remove(id);
                    engine.entity_to_store.retain(|_, sid| sid != id);
                }
                other => {
                    if let Some(store_id) = event_store_id(other)
                        && let Some(entry) = engine.state.get(&store_id)
                    {
                        let rs_arc = entry.clone();
                        let mut guard = rs_arc.try_write().expect("replay: uncontended write");
                        apply_to_store(&mut guard, other, &engine.entity_to_store);
                    }
                }
            }
        }

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_store(&self, id: &Ulid) -> Option<SharedStoreState> {
        self.state.get(id).map(|e| e.value().clone())
    }

    pub fn store_for_entity(&self, entity_id: &Ulid) -> Option<Ulid> {
        self.entity_to_store.get(entity_id).map(|e| *e.value())
    }

    /// WAL-append + apply in one call. The WAL commits before the
    /// in-memory state changes — a failed append leaves state untouched.
    pub(super) async fn persist_and_apply(
        &self,
        rs: &mut StoreState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_store(rs, event, &self.entity_to_store);
        Ok(())
    }

    /// Lookup entity → store, get store, acquire write lock.
    pub(super) async fn resolve_entity_write(
        &self,
        entity_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<StoreState>), EngineError> {
        let store_id = self
            .store_for_entity(entity_id)
            .ok_or(EngineError::NotFound(*entity_id))?;
        let rs = self
            .get_store(&store_id)
            .ok_or(EngineError::NotFound(store_id))?;
        let guard = rs.write_owned().await;
        Ok((store_id, guard))
    }
}

/// Extract the store_id from an event (for non-Create/Delete events).
fn event_store_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::HoursSet { store_id, .. }
        | Event::HolidaySet { store_id, .. }
        | Event::HolidayCleared { store_id, .. }
        | Event::TechnicianUpserted { store_id, .. }
        | Event::TechnicianRemoved { store_id, .. }
        | Event::AppointmentBooked { store_id, .. }
        | Event::AppointmentRescheduled { store_id, .. }
        | Event::AppointmentStatusChanged { store_id, .. } => Some(*store_id),
        Event::StoreCreated { .. } | Event::StoreDeleted { .. } => None,
    }
}
