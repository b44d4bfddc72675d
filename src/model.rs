use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, used for creation timestamps.
pub type Ms = i64;

/// Two closed day intervals overlap iff each starts no later than the other ends.
///
/// Boundaries are inclusive: a stay checking out on the day another checks in
/// counts as overlapping, so same-day turnover is never bookable.
pub fn overlaps(a_start: NaiveDate, a_end: NaiveDate, b_start: NaiveDate, b_end: NaiveDate) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// Closed interval of calendar days `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "DateRange start must not be after end");
        Self { start, end }
    }

    /// Returns `None` when `start > end`.
    pub fn try_new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Nights between check-in and check-out (0 for a same-day stay).
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        self.nights() + 1
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

/// A rentable property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: Ulid,
    /// Host (owner) user id.
    pub user_id: Ulid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location_value: String,
    pub room_count: u32,
    pub bathroom_count: u32,
    pub guest_count: u32,
    /// Nightly price in whole currency units.
    pub price: u32,
    pub img_src: String,
    pub images: Vec<String>,
    pub created_at: Ms,
}

/// A booked, inclusive date interval on a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Ulid,
    pub listing_id: Ulid,
    /// Guest user id.
    pub user_id: Ulid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_price: u64,
    pub created_at: Ms,
}

impl Reservation {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favourite {
    pub id: Ulid,
    pub user_id: Ulid,
    pub listing_id: Ulid,
    pub created_at: Ms,
}

/// Authenticated user as supplied by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListingState {
    pub listing: Listing,
    /// Reservations on this listing, sorted by `start_date`.
    pub reservations: Vec<Reservation>,
    /// Set under the write lock when the listing is deleted, so a writer that
    /// grabbed the Arc before removal sees it is gone.
    pub deleted: bool,
}

impl ListingState {
    pub fn new(listing: Listing) -> Self {
        Self {
            listing,
            reservations: Vec::new(),
            deleted: false,
        }
    }

    /// Insert reservation maintaining sort order by start date.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.start_date, |r| r.start_date)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    pub fn remove_reservation(&mut self, id: Ulid) -> Option<Reservation> {
        let pos = self.reservations.iter().position(|r| r.id == id)?;
        Some(self.reservations.remove(pos))
    }

    /// Reservations whose interval overlaps `query`.
    /// Uses binary search to skip reservations starting after `query.end`.
    pub fn overlapping(&self, query: &DateRange) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.start_date <= query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.end_date >= query.start)
    }
}

/// The event types, flat with no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ListingCreated {
        listing: Listing,
    },
    ListingDeleted {
        id: Ulid,
    },
    ReservationCreated {
        reservation: Reservation,
    },
    ReservationCancelled {
        id: Ulid,
        listing_id: Ulid,
    },
    FavouriteAdded {
        favourite: Favourite,
    },
    FavouriteRemoved {
        user_id: Ulid,
        listing_id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDetail {
    #[serde(flatten)]
    pub listing: Listing,
    pub reservations: Vec<Reservation>,
    /// Booked days merged into disjoint ranges, for calendar display.
    pub unavailable: Vec<DateRange>,
}

/// A listing annotated with whether the viewing user favourited it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavouritedListing {
    #[serde(flatten)]
    pub listing: Listing,
    pub is_favorited: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripView {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub listing: FavouritedListing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavouriteView {
    #[serde(flatten)]
    pub favourite: Favourite,
    pub listing: Listing,
    pub is_favorited: bool,
}
