//! Response bodies. Request bodies are the raw types in `crate::schema`.

use serde::Serialize;

use crate::model::{FavouriteView, FavouritedListing, Listing, ListingDetail, Reservation, TripView};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub listings: usize,
}

#[derive(Debug, Serialize)]
pub struct ListingsResponse {
    pub listings: Vec<Listing>,
}

#[derive(Debug, Serialize)]
pub struct ListingCreatedResponse {
    pub success: bool,
    pub listing: Listing,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDetailResponse {
    #[serde(flatten)]
    pub detail: ListingDetail,
    /// Always false for anonymous callers.
    pub is_favorited: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub available: bool,
    /// Quote for the stay; absent when the dates are taken.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_price: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ReservationCreatedResponse {
    pub success: bool,
    pub reservation: Reservation,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReservationsResponse {
    pub reservations: Vec<TripView>,
}

#[derive(Debug, Serialize)]
pub struct TripsResponse {
    pub trips: Vec<TripView>,
}

#[derive(Debug, Serialize)]
pub struct PropertiesResponse {
    pub properties: Vec<FavouritedListing>,
}

#[derive(Debug, Serialize)]
pub struct FavouritesResponse {
    pub favourites: Vec<FavouriteView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavouriteStatusResponse {
    pub is_favorited: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}
