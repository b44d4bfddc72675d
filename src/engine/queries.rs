use std::collections::HashSet;

use ulid::Ulid;

use crate::model::*;

use super::availability::unavailable_ranges;
use super::conflict::{check_no_conflict, quote_total, validate_stay};
use super::search::ListingFilter;
use super::{Engine, EngineError, SharedListingState};

fn newest_first(listings: &mut [Listing]) {
    listings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

impl Engine {
    async fn favourite_ids(&self, user: Ulid) -> HashSet<Ulid> {
        let Some(cell) = self.favourites.get(&user).map(|e| e.value().clone()) else {
            return HashSet::new();
        };
        let favs = cell.lock().await;
        favs.iter().map(|f| f.listing_id).collect()
    }

    /// Evaluate a composed filter against live state. Every listing is read
    /// under its own lock, so the availability check sees committed
    /// reservations only. Guards are taken one by one in id order; writers
    /// only ever hold a single listing lock, so this cannot deadlock.
    pub async fn search_listings(&self, filter: &ListingFilter) -> Vec<Listing> {
        let mut states: Vec<(Ulid, SharedListingState)> = self
            .listings
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        states.sort_unstable_by_key(|(id, _)| *id);
        let mut guards = Vec::with_capacity(states.len());
        for (_, rs) in &states {
            guards.push(rs.read().await);
        }
        let live = guards.iter().map(|g| &**g).filter(|ls| !ls.deleted);
        let mut out: Vec<Listing> = filter
            .apply(live)
            .into_iter()
            .map(|ls| ls.listing.clone())
            .collect();
        newest_first(&mut out);
        out
    }

    pub async fn get_listing(&self, id: Ulid) -> Option<ListingDetail> {
        let rs = self.get_listing_state(&id)?;
        let guard = rs.read().await;
        if guard.deleted {
            return None;
        }
        Some(ListingDetail {
            listing: guard.listing.clone(),
            reservations: guard.reservations.clone(),
            unavailable: unavailable_ranges(&guard.reservations),
        })
    }

    /// Read-only booking check. Returns the quoted total when the dates are free.
    pub async fn check_availability(&self, listing_id: Ulid, range: DateRange) -> Result<u64, EngineError> {
        validate_stay(&range)?;
        let rs = self
            .get_listing_state(&listing_id)
            .ok_or(EngineError::NotFound(listing_id))?;
        let guard = rs.read().await;
        if guard.deleted {
            return Err(EngineError::NotFound(listing_id));
        }
        check_no_conflict(&guard, &range)?;
        Ok(quote_total(guard.listing.price, &range))
    }

    /// Listings owned by `owner`, flagged with the owner's own favourites.
    pub async fn list_properties(&self, owner: Ulid) -> Vec<FavouritedListing> {
        let ids = self.owned.get(&owner).map(|e| e.value().clone()).unwrap_or_default();
        let favourites = self.favourite_ids(owner).await;

        let mut listings = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(rs) = self.get_listing_state(&id) else { continue };
            let guard = rs.read().await;
            if !guard.deleted {
                listings.push(guard.listing.clone());
            }
        }
        newest_first(&mut listings);
        listings
            .into_iter()
            .map(|listing| FavouritedListing {
                is_favorited: favourites.contains(&listing.id),
                listing,
            })
            .collect()
    }

    /// Reservations held by `guest`, most recently booked first.
    pub async fn list_trips(&self, guest: Ulid) -> Vec<TripView> {
        let ids = self.trips.get(&guest).map(|e| e.value().clone()).unwrap_or_default();
        let favourites = self.favourite_ids(guest).await;

        let mut trips = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(listing_id) = self.get_listing_for_reservation(&id) else { continue };
            let Some(rs) = self.get_listing_state(&listing_id) else { continue };
            let guard = rs.read().await;
            if guard.deleted {
                continue;
            }
            if let Some(reservation) = guard.reservations.iter().find(|r| r.id == id) {
                trips.push(TripView {
                    reservation: reservation.clone(),
                    listing: FavouritedListing {
                        listing: guard.listing.clone(),
                        is_favorited: favourites.contains(&listing_id),
                    },
                });
            }
        }
        trips.sort_by(|a, b| {
            b.reservation
                .created_at
                .cmp(&a.reservation.created_at)
                .then(b.reservation.id.cmp(&a.reservation.id))
        });
        trips
    }

    /// Reservations received on `host`'s listings, latest check-in first.
    pub async fn list_host_reservations(&self, host: Ulid) -> Vec<TripView> {
        let ids = self.owned.get(&host).map(|e| e.value().clone()).unwrap_or_default();
        let favourites = self.favourite_ids(host).await;

        let mut out = Vec::new();
        for id in ids {
            let Some(rs) = self.get_listing_state(&id) else { continue };
            let guard = rs.read().await;
            if guard.deleted {
                continue;
            }
            let listing = FavouritedListing {
                listing: guard.listing.clone(),
                is_favorited: favourites.contains(&id),
            };
            out.extend(guard.reservations.iter().map(|r| TripView {
                reservation: r.clone(),
                listing: listing.clone(),
            }));
        }
        out.sort_by(|a, b| {
            b.reservation
                .start_date
                .cmp(&a.reservation.start_date)
                .then(b.reservation.id.cmp(&a.reservation.id))
        });
        out
    }

    /// Favourites of `user`, newest first. Favourites whose listing is gone are skipped.
    pub async fn list_favourites(&self, user: Ulid) -> Vec<FavouriteView> {
        let Some(cell) = self.favourites.get(&user).map(|e| e.value().clone()) else {
            return Vec::new();
        };
        let mut favs = cell.lock().await.clone();
        favs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let mut out = Vec::with_capacity(favs.len());
        for favourite in favs {
            let Some(rs) = self.get_listing_state(&favourite.listing_id) else { continue };
            let guard = rs.read().await;
            if guard.deleted {
                continue;
            }
            out.push(FavouriteView {
                listing: guard.listing.clone(),
                favourite,
                is_favorited: true,
            });
        }
        out
    }

    pub async fn is_favourited(&self, user: Ulid, listing_id: Ulid) -> bool {
        self.favourite_ids(user).await.contains(&listing_id)
    }
}
