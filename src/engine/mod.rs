mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod search;

pub use availability::{filter_available, is_available, merge_adjacent, unavailable_ranges};
pub use conflict::{check_no_conflict, quote_total};
pub use error::EngineError;
pub use mutations::{NewListing, ReservationRequest};
pub use search::{compose_filter, Constraint, ListingFilter, SearchCriteria};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

pub type SharedListingState = Arc<RwLock<ListingState>>;
pub type SharedFavourites = Arc<Mutex<Vec<Favourite>>>;

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
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            commit_batch(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                if !batch.is_empty() {
                    commit_batch(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!("WAL flush failed for batch of {}: {e}", batch.len());
    }
    respond_batch(batch, &result);
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even on append error, so partially buffered bytes
    // don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
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

pub struct Engine {
    pub(super) listings: DashMap<Ulid, SharedListingState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Mutations hold this shared for their whole persist + apply sequence;
    /// compaction holds it exclusively so its snapshot misses no committed event.
    pub(super) commit_gate: RwLock<()>,
    /// Reverse lookup: reservation id → listing id.
    pub(super) reservation_to_listing: DashMap<Ulid, Ulid>,
    /// Host → owned listing ids.
    pub(super) owned: DashMap<Ulid, Vec<Ulid>>,
    /// Guest → reservation ids.
    pub(super) trips: DashMap<Ulid, Vec<Ulid>>,
    /// User → favourites, at most one per listing.
    pub(super) favourites: DashMap<Ulid, SharedFavourites>,
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let (wal, events) = Wal::recover(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            listings: DashMap::new(),
            wal_tx,
            commit_gate: RwLock::new(()),
            reservation_to_listing: DashMap::new(),
            owned: DashMap::new(),
            trips: DashMap::new(),
            favourites: DashMap::new(),
        };

        // We're the sole owner of every Arc during replay, so try_write always
        // succeeds. Never use blocking_write here: this runs inside the runtime.
        for event in &events {
            engine.replay_event(event);
        }
        metrics::gauge!(crate::observability::LISTINGS_ACTIVE).set(engine.listings.len() as f64);

        Ok(engine)
    }

    fn replay_event(&self, event: &Event) {
        match event {
            Event::ListingCreated { listing } => self.insert_listing(listing.clone()),
            Event::ListingDeleted { id } => {
                if let Some((_, rs)) = self.listings.remove(id)
                    && let Ok(mut guard) = rs.try_write()
                {
                    guard.deleted = true;
                    self.forget_listing(&guard);
                }
                for entry in self.favourites.iter() {
                    if let Ok(mut favs) = entry.value().try_lock() {
                        favs.retain(|f| f.listing_id != *id);
                    }
                }
            }
            Event::ReservationCreated { reservation } => {
                if let Some(rs) = self.get_listing_state(&reservation.listing_id)
                    && let Ok(mut guard) = rs.try_write()
                {
                    self.apply_to_listing(&mut guard, event);
                }
            }
            Event::ReservationCancelled { listing_id, .. } => {
                if let Some(rs) = self.get_listing_state(listing_id)
                    && let Ok(mut guard) = rs.try_write()
                {
                    self.apply_to_listing(&mut guard, event);
                }
            }
            Event::FavouriteAdded { favourite } => {
                // A toggle can race a listing delete and land after it in the log.
                if !self.listings.contains_key(&favourite.listing_id) {
                    return;
                }
                let favs = self.favourites_for(favourite.user_id);
                if let Ok(mut guard) = favs.try_lock() {
                    apply_favourite(&mut guard, event);
                }
            }
            Event::FavouriteRemoved { user_id, .. } => {
                let favs = self.favourites_for(*user_id);
                if let Ok(mut guard) = favs.try_lock() {
                    apply_favourite(&mut guard, event);
                }
            }
        }
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

    /// WAL-append + apply for an event scoped to one listing. Caller holds
    /// the listing's write lock and the commit gate.
    pub(super) async fn persist_and_apply(
        &self,
        ls: &mut ListingState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.apply_to_listing(ls, event);
        Ok(())
    }

    pub fn get_listing_state(&self, id: &Ulid) -> Option<SharedListingState> {
        self.listings.get(id).map(|e| e.value().clone())
    }

    pub fn get_listing_for_reservation(&self, reservation_id: &Ulid) -> Option<Ulid> {
        self.reservation_to_listing
            .get(reservation_id)
            .map(|e| *e.value())
    }

    pub fn listing_count(&self) -> usize {
        self.listings.len()
    }

    /// Per-user favourites cell, created on first use.
    pub(super) fn favourites_for(&self, user_id: Ulid) -> SharedFavourites {
        self.favourites
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .value()
            .clone()
    }

    pub(super) fn insert_listing(&self, listing: Listing) {
        let (id, owner) = (listing.id, listing.user_id);
        self.listings
            .insert(id, Arc::new(RwLock::new(ListingState::new(listing))));
        self.owned.entry(owner).or_default().push(id);
    }

    /// Drop every index entry pointing at a deleted listing and its reservations.
    pub(super) fn forget_listing(&self, ls: &ListingState) {
        let id = ls.listing.id;
        if let Some(mut ids) = self.owned.get_mut(&ls.listing.user_id) {
            ids.retain(|l| *l != id);
        }
        for r in &ls.reservations {
            self.reservation_to_listing.remove(&r.id);
            if let Some(mut ids) = self.trips.get_mut(&r.user_id) {
                ids.retain(|t| *t != r.id);
            }
        }
    }

    /// Apply a reservation event to a listing (no locking; caller holds the lock).
    pub(super) fn apply_to_listing(&self, ls: &mut ListingState, event: &Event) {
        match event {
            Event::ReservationCreated { reservation } => {
                self.reservation_to_listing
                    .insert(reservation.id, reservation.listing_id);
                self.trips
                    .entry(reservation.user_id)
                    .or_default()
                    .push(reservation.id);
                ls.insert_reservation(reservation.clone());
            }
            Event::ReservationCancelled { id, .. } => {
                if let Some(r) = ls.remove_reservation(*id) {
                    self.reservation_to_listing.remove(id);
                    if let Some(mut ids) = self.trips.get_mut(&r.user_id) {
                        ids.retain(|t| t != id);
                    }
                }
            }
            // Listing lifecycle and favourites live at the map level.
            Event::ListingCreated { .. }
            | Event::ListingDeleted { .. }
            | Event::FavouriteAdded { .. }
            | Event::FavouriteRemoved { .. } => {}
        }
    }
}

/// Apply a favourite event to one user's favourites (caller holds the lock).
/// Adding is idempotent per listing; removing an absent favourite is a no-op.
pub(super) fn apply_favourite(favs: &mut Vec<Favourite>, event: &Event) {
    match event {
        Event::FavouriteAdded { favourite } => {
            if !favs.iter().any(|f| f.listing_id == favourite.listing_id) {
                favs.push(favourite.clone());
            }
        }
        Event::FavouriteRemoved { listing_id, .. } => {
            favs.retain(|f| f.listing_id != *listing_id);
        }
        _ => {}
    }
}
