use tokio::sync::oneshot;
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, now_ms, quote_total, validate_stay};
use super::{apply_favourite, Engine, EngineError, SharedFavourites, SharedListingState, WalCommand};

/// Validated input for a new listing; produced by the request schema gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location_value: String,
    pub room_count: u32,
    pub bathroom_count: u32,
    pub guest_count: u32,
    pub price: u32,
    pub img_src: String,
    pub images: Vec<String>,
}

/// Validated booking request; `range` is already ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRequest {
    pub listing_id: Ulid,
    pub range: DateRange,
    pub total_price: u64,
}

impl Engine {
    pub async fn create_listing(&self, owner: Ulid, new: NewListing) -> Result<Listing, EngineError> {
        if self.listings.len() >= MAX_LISTINGS {
            return Err(EngineError::LimitExceeded("too many listings"));
        }
        if new.images.len() > MAX_IMAGES_PER_LISTING {
            return Err(EngineError::LimitExceeded("too many images"));
        }

        let _commit = self.commit_gate.read().await;
        let listing = Listing {
            id: Ulid::new(),
            user_id: owner,
            title: new.title,
            description: new.description,
            category: new.category,
            location_value: new.location_value,
            room_count: new.room_count,
            bathroom_count: new.bathroom_count,
            guest_count: new.guest_count,
            price: new.price,
            img_src: new.img_src,
            images: new.images,
            created_at: now_ms(),
        };
        let event = Event::ListingCreated { listing: listing.clone() };
        self.wal_append(&event).await?;
        self.insert_listing(listing.clone());

        metrics::gauge!(crate::observability::LISTINGS_ACTIVE).set(self.listings.len() as f64);
        info!("listing {} created by {owner}", listing.id);
        Ok(listing)
    }

    /// Owner-only. Cascades to the listing's reservations and to every
    /// favourite pointing at it.
    pub async fn delete_listing(&self, user: Ulid, id: Ulid) -> Result<(), EngineError> {
        let _commit = self.commit_gate.read().await;
        let rs = self
            .get_listing_state(&id)
            .ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;
        if guard.deleted {
            return Err(EngineError::NotFound(id));
        }
        if guard.listing.user_id != user {
            return Err(EngineError::Forbidden(id));
        }

        let event = Event::ListingDeleted { id };
        self.wal_append(&event).await?;
        guard.deleted = true;
        self.forget_listing(&guard);
        self.listings.remove(&id);
        let cancelled = guard.reservations.len();
        drop(guard);

        let cells: Vec<SharedFavourites> = self
            .favourites
            .iter()
            .map(|e| e.value().clone())
            .collect();
        for cell in cells {
            cell.lock().await.retain(|f| f.listing_id != id);
        }

        metrics::gauge!(crate::observability::LISTINGS_ACTIVE).set(self.listings.len() as f64);
        info!("listing {id} deleted by {user} ({cancelled} reservations dropped)");
        Ok(())
    }

    /// Book a stay. The conflict check, WAL append and insert all happen under
    /// the listing's write lock, so of two overlapping concurrent requests
    /// exactly one wins.
    pub async fn create_reservation(
        &self,
        guest: Ulid,
        request: ReservationRequest,
    ) -> Result<Reservation, EngineError> {
        validate_stay(&request.range)?;
        let listing_id = request.listing_id;

        let _commit = self.commit_gate.read().await;
        let rs = self
            .get_listing_state(&listing_id)
            .ok_or(EngineError::NotFound(listing_id))?;
        let mut guard = rs.write().await;
        if guard.deleted {
            return Err(EngineError::NotFound(listing_id));
        }
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_LISTING {
            return Err(EngineError::LimitExceeded("too many reservations on listing"));
        }

        let expected = quote_total(guard.listing.price, &request.range);
        if request.total_price != expected {
            return Err(EngineError::PriceMismatch {
                expected,
                submitted: request.total_price,
            });
        }

        if let Err(e) = check_no_conflict(&guard, &request.range) {
            metrics::counter!(crate::observability::RESERVATION_CONFLICTS_TOTAL).increment(1);
            warn!(
                "booking {listing_id} [{}, {}] by {guest} rejected: {e}",
                request.range.start, request.range.end
            );
            return Err(e);
        }

        let reservation = Reservation {
            id: Ulid::new(),
            listing_id,
            user_id: guest,
            start_date: request.range.start,
            end_date: request.range.end,
            total_price: expected,
            created_at: now_ms(),
        };
        let event = Event::ReservationCreated {
            reservation: reservation.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;

        metrics::counter!(crate::observability::RESERVATIONS_CREATED_TOTAL).increment(1);
        info!(
            "reservation {} on {listing_id} [{}, {}] for {guest}",
            reservation.id, reservation.start_date, reservation.end_date
        );
        Ok(reservation)
    }

    /// Allowed for the guest who holds the reservation or the listing's host.
    pub async fn cancel_reservation(&self, user: Ulid, id: Ulid) -> Result<Reservation, EngineError> {
        let _commit = self.commit_gate.read().await;
        let listing_id = self
            .get_listing_for_reservation(&id)
            .ok_or(EngineError::NotFound(id))?;
        let rs = self
            .get_listing_state(&listing_id)
            .ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;
        if guard.deleted {
            return Err(EngineError::NotFound(id));
        }
        let reservation = guard
            .reservations
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(EngineError::NotFound(id))?;

        let is_guest = reservation.user_id == user;
        let is_host = guard.listing.user_id == user;
        if !is_guest && !is_host {
            return Err(EngineError::Forbidden(id));
        }

        let event = Event::ReservationCancelled { id, listing_id };
        self.persist_and_apply(&mut guard, &event).await?;
        info!("reservation {id} on {listing_id} cancelled by {user}");
        Ok(reservation)
    }

    /// Idempotent set/unset. Returns the resulting state.
    pub async fn set_favourite(
        &self,
        user: Ulid,
        listing_id: Ulid,
        favourited: bool,
    ) -> Result<bool, EngineError> {
        self.update_favourite(user, listing_id, |_| favourited).await
    }

    /// Flip the favourite flag. Returns the resulting state.
    pub async fn toggle_favourite(&self, user: Ulid, listing_id: Ulid) -> Result<bool, EngineError> {
        self.update_favourite(user, listing_id, |current| !current).await
    }

    async fn update_favourite(
        &self,
        user: Ulid,
        listing_id: Ulid,
        next: impl FnOnce(bool) -> bool,
    ) -> Result<bool, EngineError> {
        let _commit = self.commit_gate.read().await;
        let cell = self.favourites_for(user);
        let mut favs = cell.lock().await;
        if !self.listings.contains_key(&listing_id) {
            return Err(EngineError::NotFound(listing_id));
        }

        let current = favs.iter().any(|f| f.listing_id == listing_id);
        let wanted = next(current);
        if wanted == current {
            return Ok(current);
        }

        let event = if wanted {
            Event::FavouriteAdded {
                favourite: Favourite {
                    id: Ulid::new(),
                    user_id: user,
                    listing_id,
                    created_at: now_ms(),
                },
            }
        } else {
            Event::FavouriteRemoved { user_id: user, listing_id }
        };
        self.wal_append(&event).await?;
        apply_favourite(&mut favs, &event);
        Ok(wanted)
    }

    /// Compact the WAL by rewriting it with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _exclusive = self.commit_gate.write().await;

        let states: Vec<SharedListingState> = self.listings.iter().map(|e| e.value().clone()).collect();
        let mut snapshot = Vec::with_capacity(states.len());
        for rs in states {
            let guard = rs.read().await;
            if !guard.deleted {
                snapshot.push((guard.listing.clone(), guard.reservations.clone()));
            }
        }
        snapshot.sort_by_key(|(l, _)| (l.created_at, l.id));

        let mut events = Vec::new();
        for (listing, reservations) in snapshot {
            events.push(Event::ListingCreated { listing });
            events.extend(
                reservations
                    .into_iter()
                    .map(|reservation| Event::ReservationCreated { reservation }),
            );
        }

        let cells: Vec<SharedFavourites> = self.favourites.iter().map(|e| e.value().clone()).collect();
        let mut favourites = Vec::new();
        for cell in cells {
            favourites.extend(
                cell.lock()
                    .await
                    .iter()
                    .filter(|f| self.listings.contains_key(&f.listing_id))
                    .cloned(),
            );
        }
        favourites.sort_by_key(|f| (f.created_at, f.id));
        events.extend(favourites.into_iter().map(|favourite| Event::FavouriteAdded { favourite }));

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
