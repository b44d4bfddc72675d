//! HTTP handlers for the REST API.
//!
//! Handlers authenticate, run the schema gate, call one engine operation,
//! and wrap the result. No business rule lives here.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use tracing::info;

use super::dto::*;
use super::error::AppError;
use super::state::AppState;
use crate::auth::{CurrentUser, MaybeUser};
use crate::engine::{compose_filter, EngineError};
use crate::schema::{self, FavouriteBody, RawListing, RawReservation, SearchParams, StayParams};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

// =============================================================================
// Health
// =============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        listings: state.engine.listing_count(),
    })
}

/// Fallback for unknown routes.
pub async fn not_found() -> AppError {
    AppError::not_found("No such route")
}

// =============================================================================
// Listings
// =============================================================================

/// GET /api/listings
pub async fn search_listings(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> HandlerResult<ListingsResponse> {
    let Query(params) = params?;
    let criteria = schema::parse_search(&params)?;
    let listings = state.engine.search_listings(&compose_filter(&criteria)).await;
    Ok(Json(ListingsResponse { listings }))
}

/// POST /api/listings
pub async fn create_listing(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<RawListing>, JsonRejection>,
) -> HandlerResult<ListingCreatedResponse> {
    let Json(raw) = body?;
    let new = schema::parse_new_listing(&raw)?;
    let listing = state.engine.create_listing(user.id, new).await?;
    Ok(Json(ListingCreatedResponse {
        success: true,
        listing,
        message: "Listing created successfully",
    }))
}

/// GET /api/listings/{id}
pub async fn get_listing(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> HandlerResult<ListingDetailResponse> {
    let id = schema::parse_id("listingId", &id)?;
    let detail = state
        .engine
        .get_listing(id)
        .await
        .ok_or_else(|| AppError::not_found("Listing not found"))?;
    let is_favorited = match user {
        Some(user) => state.engine.is_favourited(user.id, id).await,
        None => false,
    };
    Ok(Json(ListingDetailResponse { detail, is_favorited }))
}

/// GET /api/listings/{id}/availability?startDate&endDate
pub async fn check_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<StayParams>, QueryRejection>,
) -> HandlerResult<AvailabilityResponse> {
    let id = schema::parse_id("listingId", &id)?;
    let Query(params) = params?;
    let range = schema::parse_stay(&params)?;
    match state.engine.check_availability(id, range).await {
        Ok(total) => Ok(Json(AvailabilityResponse {
            available: true,
            total_price: Some(total),
        })),
        Err(EngineError::Conflict { .. }) => Ok(Json(AvailabilityResponse {
            available: false,
            total_price: None,
        })),
        Err(e) => Err(e.into()),
    }
}

/// DELETE /api/listings/{id}
pub async fn delete_listing(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> HandlerResult<MessageResponse> {
    let id = schema::parse_id("listingId", &id)?;
    state.engine.delete_listing(user.id, id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Listing deleted successfully",
    }))
}

// =============================================================================
// Reservations
// =============================================================================

/// POST /api/reservations
pub async fn create_reservation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<RawReservation>, JsonRejection>,
) -> HandlerResult<ReservationCreatedResponse> {
    let Json(raw) = body?;
    let request = schema::parse_reservation(&raw)?;
    let reservation = state.engine.create_reservation(user.id, request).await?;
    Ok(Json(ReservationCreatedResponse {
        success: true,
        reservation,
        message: "Reservation created successfully",
    }))
}

/// GET /api/reservations: reservations received on the caller's listings.
pub async fn list_host_reservations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> HandlerResult<ReservationsResponse> {
    let reservations = state.engine.list_host_reservations(user.id).await;
    Ok(Json(ReservationsResponse { reservations }))
}

/// DELETE /api/reservations/{id}
pub async fn cancel_reservation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> HandlerResult<MessageResponse> {
    let id = schema::parse_id("reservationId", &id)?;
    state.engine.cancel_reservation(user.id, id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Reservation cancelled successfully",
    }))
}

/// GET /api/trips
pub async fn list_trips(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> HandlerResult<TripsResponse> {
    let trips = state.engine.list_trips(user.id).await;
    Ok(Json(TripsResponse { trips }))
}

/// GET /api/properties
pub async fn list_properties(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> HandlerResult<PropertiesResponse> {
    let properties = state.engine.list_properties(user.id).await;
    Ok(Json(PropertiesResponse { properties }))
}

// =============================================================================
// Favourites
// =============================================================================

/// GET /api/favorites
pub async fn list_favourites(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> HandlerResult<FavouritesResponse> {
    let favourites = state.engine.list_favourites(user.id).await;
    Ok(Json(FavouritesResponse { favourites }))
}

/// POST /api/favorites/{listingId}: flips the flag.
pub async fn toggle_favourite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(listing_id): Path<String>,
) -> HandlerResult<FavouriteStatusResponse> {
    let listing_id = schema::parse_id("listingId", &listing_id)?;
    let is_favorited = state.engine.toggle_favourite(user.id, listing_id).await?;
    info!("user {} favourite on {listing_id}: {is_favorited}", user.id);
    Ok(Json(FavouriteStatusResponse { is_favorited }))
}

/// PUT /api/favorites/{listingId}: sets the flag; repeating it is a no-op.
pub async fn set_favourite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(listing_id): Path<String>,
    body: Result<Json<FavouriteBody>, JsonRejection>,
) -> HandlerResult<FavouriteStatusResponse> {
    let listing_id = schema::parse_id("listingId", &listing_id)?;
    let Json(FavouriteBody { is_favorited }) = body?;
    let is_favorited = state
        .engine
        .set_favourite(user.id, listing_id, is_favorited)
        .await?;
    Ok(Json(FavouriteStatusResponse { is_favorited }))
}

/// GET /api/favorites/{listingId}
pub async fn favourite_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(listing_id): Path<String>,
) -> HandlerResult<FavouriteStatusResponse> {
    let listing_id = schema::parse_id("listingId", &listing_id)?;
    let is_favorited = state.engine.is_favourited(user.id, listing_id).await;
    Ok(Json(FavouriteStatusResponse { is_favorited }))
}
