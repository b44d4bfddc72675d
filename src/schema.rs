//! Request validation gate.
//!
//! Raw request bodies and query strings come in loosely typed; each `parse_*`
//! function either returns a value the engine can trust or a
//! [`ValidationErrors`] listing every offending field.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

use crate::engine::{NewListing, ReservationRequest, SearchCriteria};
use crate::limits::*;
use crate::model::DateRange;

/// Field name → human-readable messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errs = Self::new();
        errs.add(field, message);
        errs
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.fields
    }

    /// `Ok(value)` when no error was recorded.
    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, Self> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed")?;
        let mut sep = ": ";
        for (field, messages) in &self.fields {
            for m in messages {
                write!(f, "{sep}{field}: {m}")?;
                sep = "; ";
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// ── Raw inputs ───────────────────────────────────────────────────

/// Body of `POST /api/listings`. Fields stay untyped so a wrong type is
/// reported per field instead of failing the whole body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListing {
    pub title: Option<Value>,
    pub description: Option<Value>,
    pub category: Option<Value>,
    pub location_value: Option<Value>,
    pub room_count: Option<Value>,
    pub bathroom_count: Option<Value>,
    pub guest_count: Option<Value>,
    pub price: Option<Value>,
    pub img_src: Option<Value>,
    pub images: Option<Value>,
}

/// Body of `POST /api/reservations`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReservation {
    pub listing_id: Option<Value>,
    pub start_date: Option<Value>,
    pub end_date: Option<Value>,
    pub total_price: Option<Value>,
}

/// Query string of `GET /api/listings`. An empty parameter counts as absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub location_value: Option<String>,
    pub category: Option<String>,
    pub guest_count: Option<String>,
    pub room_count: Option<String>,
    pub bathroom_count: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Query string of `GET /api/listings/{id}/availability`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StayParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Body of `PUT /api/favorites/{listingId}`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavouriteBody {
    pub is_favorited: bool,
}

// ── Field parsers ────────────────────────────────────────────────

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (taken as its UTC day).
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    })
}

pub fn parse_id(field: &str, s: &str) -> Result<Ulid, ValidationErrors> {
    Ulid::from_string(s.trim()).map_err(|_| ValidationErrors::single(field, format!("Invalid {field} format")))
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn text(errs: &mut ValidationErrors, field: &str, v: Option<&Value>, label: &str, max: usize) -> String {
    match v {
        None | Some(Value::Null) => errs.add(field, format!("{label} is required")),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                errs.add(field, format!("{label} is required"));
            } else if s.chars().count() > max {
                errs.add(field, format!("{label} must be at most {max} characters"));
            } else {
                return s.to_owned();
            }
        }
        Some(_) => errs.add(field, format!("{label} must be a string")),
    }
    String::new()
}

/// Whole number in `1..=max`. Strict JSON numbers only.
fn count(errs: &mut ValidationErrors, field: &str, v: Option<&Value>, label: &str, max: u32) -> u32 {
    let n = match v {
        None | Some(Value::Null) => {
            errs.add(field, format!("{label} is required"));
            return 0;
        }
        Some(Value::Number(n)) => n,
        Some(_) => {
            errs.add(field, format!("{label} must be a number"));
            return 0;
        }
    };
    match n.as_u64() {
        Some(0) => errs.add(field, format!("{label} must be at least 1")),
        Some(n) if n > u64::from(max) => errs.add(field, format!("{label} must be at most {max}")),
        Some(n) => return n as u32,
        None if n.as_f64().is_some_and(|f| f < 1.0) => {
            errs.add(field, format!("{label} must be at least 1"))
        }
        None => errs.add(field, format!("{label} must be a whole number")),
    }
    0
}

fn is_http_url(s: &str) -> bool {
    let rest = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"));
    rest.is_some_and(|r| !r.is_empty() && !r.starts_with('/'))
        && s.len() <= MAX_URL_LEN
        && !s.chars().any(char::is_whitespace)
}

fn url(errs: &mut ValidationErrors, field: &str, v: Option<&Value>, message: &str) -> String {
    match v.and_then(Value::as_str).map(str::trim) {
        Some(s) if is_http_url(s) => s.to_owned(),
        _ => {
            errs.add(field, message);
            String::new()
        }
    }
}

/// Optional gallery: an array of `{url}` objects or plain strings.
fn images(errs: &mut ValidationErrors, v: Option<&Value>) -> Vec<String> {
    let items = match v {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            errs.add("images", "Images must be a list");
            return Vec::new();
        }
    };
    if items.len() > MAX_IMAGES_PER_LISTING {
        errs.add("images", format!("At most {MAX_IMAGES_PER_LISTING} images are allowed"));
        return Vec::new();
    }
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let candidate = match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => obj.get("url").and_then(Value::as_str),
            _ => None,
        };
        match candidate.map(str::trim) {
            Some(s) if is_http_url(s) => out.push(s.to_owned()),
            _ => {
                errs.add("images", "Invalid URL");
                return Vec::new();
            }
        }
    }
    out
}

fn date_field(errs: &mut ValidationErrors, field: &str, v: Option<&Value>, label: &str) -> Option<NaiveDate> {
    match v {
        None | Some(Value::Null) => errs.add(field, format!("{label} is required")),
        Some(Value::String(s)) => match parse_date(s) {
            Some(d) => return Some(d),
            None => errs.add(field, format!("Invalid {}", label.to_lowercase())),
        },
        Some(_) => errs.add(field, format!("Invalid {}", label.to_lowercase())),
    }
    None
}

fn ordered(errs: &mut ValidationErrors, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<DateRange> {
    let (start, end) = (start?, end?);
    let range = DateRange::try_new(start, end);
    if range.is_none() {
        errs.add("endDate", "End date must not be before start date");
    }
    range
}

/// Positive integer from a query string or a JSON number/string.
fn coerce_positive(s: &str) -> Option<u64> {
    s.trim().parse::<u64>().ok().filter(|n| *n > 0)
}

// ── Gates ────────────────────────────────────────────────────────

pub fn parse_new_listing(raw: &RawListing) -> Result<NewListing, ValidationErrors> {
    let mut errs = ValidationErrors::new();
    let title = text(&mut errs, "title", raw.title.as_ref(), "Title", MAX_TITLE_LEN);
    let description = text(
        &mut errs,
        "description",
        raw.description.as_ref(),
        "Description",
        MAX_DESCRIPTION_LEN,
    );
    let category = text(&mut errs, "category", raw.category.as_ref(), "Category", MAX_CATEGORY_LEN);
    let location_value = text(
        &mut errs,
        "locationValue",
        raw.location_value.as_ref(),
        "Location",
        MAX_CATEGORY_LEN,
    );
    let guest_count = count(&mut errs, "guestCount", raw.guest_count.as_ref(), "Guest count", MAX_COUNT);
    let room_count = count(&mut errs, "roomCount", raw.room_count.as_ref(), "Room count", MAX_COUNT);
    let bathroom_count = count(
        &mut errs,
        "bathroomCount",
        raw.bathroom_count.as_ref(),
        "Bathroom count",
        MAX_COUNT,
    );
    let price = count(&mut errs, "price", raw.price.as_ref(), "Price", MAX_NIGHTLY_PRICE);
    let img_src = url(&mut errs, "imgSrc", raw.img_src.as_ref(), "At least one image is required");
    let images = images(&mut errs, raw.images.as_ref());

    errs.finish(|| NewListing {
        title,
        description,
        category,
        location_value,
        room_count,
        bathroom_count,
        guest_count,
        price,
        img_src,
        images,
    })
}

pub fn parse_reservation(raw: &RawReservation) -> Result<ReservationRequest, ValidationErrors> {
    let mut errs = ValidationErrors::new();

    let listing_id = match non_blank(raw.listing_id.as_ref().and_then(Value::as_str)) {
        None => {
            errs.add("listingId", "Listing ID is required");
            None
        }
        Some(s) => match Ulid::from_string(s) {
            Ok(id) => Some(id),
            Err(_) => {
                errs.add("listingId", "Invalid listing ID format");
                None
            }
        },
    };

    let start = date_field(&mut errs, "startDate", raw.start_date.as_ref(), "Start date");
    let end = date_field(&mut errs, "endDate", raw.end_date.as_ref(), "End date");
    let range = ordered(&mut errs, start, end);

    let total_price = match &raw.total_price {
        Some(Value::Number(n)) => n.as_u64().filter(|n| *n > 0),
        Some(Value::String(s)) => coerce_positive(s),
        _ => None,
    };
    if total_price.is_none() {
        errs.add("totalPrice", "Total price must be a positive number");
    }

    match (listing_id, range, total_price) {
        (Some(listing_id), Some(range), Some(total_price)) if errs.is_empty() => Ok(ReservationRequest {
            listing_id,
            range,
            total_price,
        }),
        _ => Err(errs),
    }
}

pub fn parse_search(params: &SearchParams) -> Result<SearchCriteria, ValidationErrors> {
    let mut errs = ValidationErrors::new();

    let mut positive = |field: &str, v: &Option<String>| -> Option<u32> {
        let s = non_blank(v.as_deref())?;
        match coerce_positive(s).and_then(|n| u32::try_from(n).ok()) {
            Some(n) => Some(n),
            None => {
                errs.add(field, "Must be a positive whole number");
                None
            }
        }
    };
    let guest_count = positive("guestCount", &params.guest_count);
    let room_count = positive("roomCount", &params.room_count);
    let bathroom_count = positive("bathroomCount", &params.bathroom_count);

    let mut date = |field: &str, v: &Option<String>| -> Option<NaiveDate> {
        let s = non_blank(v.as_deref())?;
        let parsed = parse_date(s);
        if parsed.is_none() {
            errs.add(field, "Invalid date");
        }
        parsed
    };
    let start_date = date("startDate", &params.start_date);
    let end_date = date("endDate", &params.end_date);

    if let Some(range) = ordered(&mut errs, start_date, end_date)
        && range.nights() > MAX_SEARCH_WINDOW_DAYS
    {
        errs.add("endDate", format!("Search window must be at most {MAX_SEARCH_WINDOW_DAYS} days"));
    }

    errs.finish(|| SearchCriteria {
        location_value: non_blank(params.location_value.as_deref()).map(str::to_owned),
        category: non_blank(params.category.as_deref()).map(str::to_owned),
        guest_count,
        room_count,
        bathroom_count,
        start_date,
        end_date,
    })
}

/// Both dates are required here, unlike search.
pub fn parse_stay(params: &StayParams) -> Result<DateRange, ValidationErrors> {
    let mut errs = ValidationErrors::new();
    let mut date = |field: &str, label: &str, v: &Option<String>| -> Option<NaiveDate> {
        match non_blank(v.as_deref()) {
            None => {
                errs.add(field, format!("{label} is required"));
                None
            }
            Some(s) => {
                let parsed = parse_date(s);
                if parsed.is_none() {
                    errs.add(field, format!("Invalid {}", label.to_lowercase()));
                }
                parsed
            }
        }
    };
    let start = date("startDate", "Start date", &params.start_date);
    let end = date("endDate", "End date", &params.end_date);
    match ordered(&mut errs, start, end) {
        Some(range) if errs.is_empty() => Ok(range),
        _ => Err(errs),
    }
}
