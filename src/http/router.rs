//! Router configuration for the HTTP API.

use std::time::Duration;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::error::panic_response;
use super::handlers;
use super::state::AppState;
use crate::observability;

/// Server-wide request limits.
#[derive(Debug, Clone, Copy)]
pub struct RouterLimits {
    pub max_in_flight: usize,
    pub request_timeout: Duration,
}

impl Default for RouterLimits {
    fn default() -> Self {
        Self {
            max_in_flight: 256,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState, limits: RouterLimits) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route(
            "/listings",
            get(handlers::search_listings).post(handlers::create_listing),
        )
        .route(
            "/listings/{id}",
            get(handlers::get_listing).delete(handlers::delete_listing),
        )
        .route("/listings/{id}/availability", get(handlers::check_availability))
        .route(
            "/reservations",
            get(handlers::list_host_reservations).post(handlers::create_reservation),
        )
        .route(
            "/reservations/{id}",
            axum::routing::delete(handlers::cancel_reservation),
        )
        .route("/trips", get(handlers::list_trips))
        .route("/properties", get(handlers::list_properties))
        .route("/favorites", get(handlers::list_favourites))
        .route(
            "/favorites/{listing_id}",
            get(handlers::favourite_status)
                .post(handlers::toggle_favourite)
                .put(handlers::set_favourite),
        );

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .fallback(handlers::not_found)
        .route_layer(middleware::from_fn(observability::track_requests))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TimeoutLayer::new(limits.request_timeout))
        .layer(GlobalConcurrencyLimitLayer::new(limits.max_in_flight))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
