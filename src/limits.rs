/// Upper bound on listings held by one engine.
pub const MAX_LISTINGS: usize = 100_000;

/// Upper bound on reservations stored against a single listing.
pub const MAX_RESERVATIONS_PER_LISTING: usize = 10_000;

/// Longest bookable stay, in nights.
pub const MAX_STAY_NIGHTS: i64 = 365;

/// Widest date window accepted by a search, in days.
pub const MAX_SEARCH_WINDOW_DAYS: i64 = 3 * 365;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 10_000;
pub const MAX_CATEGORY_LEN: usize = 64;
pub const MAX_URL_LEN: usize = 2048;
pub const MAX_IMAGES_PER_LISTING: usize = 32;

/// Room, bathroom and guest counts above this are rejected.
pub const MAX_COUNT: u32 = 1_000;

/// Nightly price cap, in whole currency units.
pub const MAX_NIGHTLY_PRICE: u32 = 1_000_000;

/// Dates before this year or after `MAX_YEAR` are rejected.
pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2200;
