use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use ulid::Ulid;

use nestbook::auth::TokenDirectory;
use nestbook::engine::Engine;
use nestbook::http::{create_router, AppState, RouterLimits};
use nestbook::model::User;

const HOST: &str = "host-token";
const GUEST: &str = "guest-token";
const OTHER: &str = "other-token";

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("nestbook_test_http");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn user(name: &str) -> User {
    User {
        id: Ulid::new(),
        name: name.into(),
        email: format!("{}@example.com", name.to_lowercase()),
        image: None,
    }
}

fn app(name: &str) -> Router {
    let engine = Arc::new(Engine::new(test_wal_path(name)).unwrap());
    let directory = TokenDirectory::new();
    directory.insert(HOST, user("Hana"));
    directory.insert(GUEST, user("Gus"));
    directory.insert(OTHER, user("Oli"));
    create_router(AppState::new(engine, Arc::new(directory)), RouterLimits::default())
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn listing_body(category: &str, guests: u32, price: u32) -> Value {
    json!({
        "title": "Cliff house",
        "description": "Ocean views",
        "category": category,
        "locationValue": "PT",
        "roomCount": 3,
        "bathroomCount": 2,
        "guestCount": guests,
        "price": price,
        "imgSrc": "https://img.example/cliff.jpg",
        "images": [{"url": "https://img.example/cliff-2.jpg"}]
    })
}

async fn create_listing(app: &Router, category: &str, guests: u32, price: u32) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/listings",
        Some(HOST),
        Some(listing_body(category, guests, price)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["listing"]["id"].as_str().unwrap().to_string()
}

async fn book(app: &Router, listing_id: &str, start: &str, end: &str, total: u64) -> (StatusCode, Value) {
    call(
        app,
        Method::POST,
        "/api/reservations",
        Some(GUEST),
        Some(json!({
            "listingId": listing_id,
            "startDate": start,
            "endDate": end,
            "totalPrice": total
        })),
    )
    .await
}

fn assert_error(body: &Value, kind: &str) {
    assert_eq!(body["error"]["type"], kind, "{body}");
    assert!(body["error"]["message"].is_string(), "{body}");
}

#[tokio::test]
async fn health() {
    let app = app("health.wal");
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["listings"], 0);
}

#[tokio::test]
async fn protected_routes_need_a_known_token() {
    let app = app("unauthorized.wal");
    for (method, uri) in [
        (Method::GET, "/api/trips"),
        (Method::GET, "/api/properties"),
        (Method::GET, "/api/favorites"),
        (Method::GET, "/api/reservations"),
    ] {
        let (status, body) = call(&app, method.clone(), uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_error(&body, "UNAUTHORIZED");

        let (status, _) = call(&app, method, uri, Some("forged"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/listings",
        None,
        Some(listing_body("Beach", 2, 10)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_error(&body, "UNAUTHORIZED");
}

#[tokio::test]
async fn create_listing_validation() {
    let app = app("listing_validation.wal");
    let mut bad = listing_body("Beach", 0, 10);
    bad["title"] = json!("");
    let (status, body) = call(&app, Method::POST, "/api/listings", Some(HOST), Some(bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "VALIDATION_ERROR");
    assert!(body["error"]["details"]["guestCount"].is_array());
    assert!(body["error"]["details"]["title"].is_array());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/listings")
                .header("authorization", format!("Bearer {HOST}"))
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn listing_lifecycle() {
    let app = app("listing_lifecycle.wal");
    let id = create_listing(&app, "Beach", 4, 100).await;

    let (status, body) = call(&app, Method::GET, &format!("/api/listings/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["locationValue"], "PT");
    assert_eq!(body["isFavorited"], false);
    assert_eq!(body["reservations"], json!([]));

    let (status, body) = call(&app, Method::GET, "/api/listings/not-an-id", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "VALIDATION_ERROR");

    let missing = Ulid::new();
    let (status, body) = call(&app, Method::GET, &format!("/api/listings/{missing}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error(&body, "NOT_FOUND");

    let (status, body) = call(&app, Method::DELETE, &format!("/api/listings/{id}"), Some(GUEST), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error(&body, "FORBIDDEN");

    let (status, body) = call(&app, Method::DELETE, &format!("/api/listings/{id}"), Some(HOST), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = call(&app, Method::GET, &format!("/api/listings/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn booking_conflicts() {
    let app = app("booking_conflicts.wal");
    let id = create_listing(&app, "Beach", 4, 100).await;

    let (status, body) = book(&app, &id, "2025-01-10", "2025-01-15", 500).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["reservation"]["totalPrice"], 500);

    let (status, body) = book(&app, &id, "2025-01-12", "2025-01-20", 800).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "CONFLICT");

    let (status, body) = book(&app, &id, "2025-01-15", "2025-01-20", 500).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "CONFLICT");

    let (status, _) = book(&app, &id, "2025-01-16", "2025-01-20", 400).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = book(&app, &id, "2025-03-01", "2025-03-03", 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "VALIDATION_ERROR");
    assert!(body["error"]["details"]["totalPrice"].is_array());

    let (status, body) = book(&app, &id, "2025-03-05", "2025-03-01", 100).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "VALIDATION_ERROR");

    let (status, body) = book(&app, &Ulid::new().to_string(), "2025-03-01", "2025-03-02", 100).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error(&body, "NOT_FOUND");
}

#[tokio::test]
async fn concurrent_requests_book_once() {
    let app = app("concurrent_http.wal");
    let id = create_listing(&app, "Beach", 4, 100).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            book(&app, &id, "2025-06-01", "2025-06-04", 300).await.0
        }));
    }
    let mut ok = 0;
    for h in handles {
        if h.await.unwrap() == StatusCode::OK {
            ok += 1;
        }
    }
    assert_eq!(ok, 1);
}

#[tokio::test]
async fn availability_endpoint() {
    let app = app("availability.wal");
    let id = create_listing(&app, "Beach", 4, 100).await;
    book(&app, &id, "2025-01-10", "2025-01-15", 500).await;

    let uri = format!("/api/listings/{id}/availability?startDate=2025-01-16&endDate=2025-01-18");
    let (status, body) = call(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"available": true, "totalPrice": 200}));

    let uri = format!("/api/listings/{id}/availability?startDate=2025-01-15&endDate=2025-01-18");
    let (_, body) = call(&app, Method::GET, &uri, None, None).await;
    assert_eq!(body, json!({"available": false}));

    let uri = format!("/api/listings/{id}/availability?startDate=2025-01-15");
    let (status, body) = call(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "VALIDATION_ERROR");
}

#[tokio::test]
async fn search_filters() {
    let app = app("search.wal");
    let booked = create_listing(&app, "Beach", 4, 100).await;
    let free = create_listing(&app, "Beach", 6, 100).await;
    let _lake = create_listing(&app, "Lake", 8, 100).await;
    book(&app, &booked, "2025-01-10", "2025-01-15", 500).await;

    let (status, body) = call(&app, Method::GET, "/api/listings", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["listings"].as_array().unwrap().len(), 3);

    let (_, body) = call(
        &app,
        Method::GET,
        "/api/listings?category=Beach&guestCount=4&startDate=2025-01-15&endDate=2025-01-20",
        None,
        None,
    )
    .await;
    let ids: Vec<_> = body["listings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec![free.clone()]);

    // Empty parameters mean "no constraint".
    let (status, body) = call(
        &app,
        Method::GET,
        "/api/listings?category=&guestCount=&startDate=2025-01-12",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["listings"].as_array().unwrap().len(), 3);

    let (status, body) = call(&app, Method::GET, "/api/listings?guestCount=0", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "VALIDATION_ERROR");
}

#[tokio::test]
async fn reservation_cancellation_rights() {
    let app = app("cancellation.wal");
    let id = create_listing(&app, "Beach", 4, 100).await;
    let (_, body) = book(&app, &id, "2025-01-10", "2025-01-12", 200).await;
    let reservation = body["reservation"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/reservations/{reservation}");

    let (status, body) = call(&app, Method::DELETE, &uri, Some(OTHER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error(&body, "FORBIDDEN");

    // The host sees it among received reservations, the guest among trips.
    let (_, body) = call(&app, Method::GET, "/api/reservations", Some(HOST), None).await;
    assert_eq!(body["reservations"].as_array().unwrap().len(), 1);
    assert_eq!(body["reservations"][0]["listing"]["id"], id.as_str());
    let (_, body) = call(&app, Method::GET, "/api/trips", Some(GUEST), None).await;
    assert_eq!(body["trips"].as_array().unwrap().len(), 1);

    let (status, _) = call(&app, Method::DELETE, &uri, Some(HOST), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&app, Method::DELETE, &uri, Some(GUEST), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error(&body, "NOT_FOUND");
}

#[tokio::test]
async fn favourites_flow() {
    let app = app("favourites.wal");
    let id = create_listing(&app, "Beach", 4, 100).await;
    let uri = format!("/api/favorites/{id}");

    let (status, body) = call(&app, Method::POST, &uri, Some(GUEST), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"isFavorited": true}));

    let (_, body) = call(&app, Method::GET, &uri, Some(GUEST), None).await;
    assert_eq!(body, json!({"isFavorited": true}));

    let (_, body) = call(&app, Method::GET, &format!("/api/listings/{id}"), Some(GUEST), None).await;
    assert_eq!(body["isFavorited"], true);

    let (_, body) = call(&app, Method::GET, "/api/favorites", Some(GUEST), None).await;
    assert_eq!(body["favourites"].as_array().unwrap().len(), 1);
    assert_eq!(body["favourites"][0]["listing"]["id"], id.as_str());

    let (_, body) = call(&app, Method::POST, &uri, Some(GUEST), None).await;
    assert_eq!(body, json!({"isFavorited": false}));

    for _ in 0..2 {
        let (status, body) = call(&app, Method::PUT, &uri, Some(GUEST), Some(json!({"isFavorited": true}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"isFavorited": true}));
    }

    let missing = format!("/api/favorites/{}", Ulid::new());
    let (status, body) = call(&app, Method::POST, &missing, Some(GUEST), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error(&body, "NOT_FOUND");
}

#[tokio::test]
async fn properties_list_owner_listings() {
    let app = app("properties.wal");
    let id = create_listing(&app, "Beach", 4, 100).await;

    let (status, body) = call(&app, Method::GET, "/api/properties", Some(HOST), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["properties"].as_array().unwrap().len(), 1);
    assert_eq!(body["properties"][0]["id"], id.as_str());
    assert_eq!(body["properties"][0]["isFavorited"], false);

    let (_, body) = call(&app, Method::GET, "/api/properties", Some(GUEST), None).await;
    assert_eq!(body["properties"], json!([]));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = app("fallback.wal");
    let (status, body) = call(&app, Method::GET, "/api/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error(&body, "NOT_FOUND");
}
