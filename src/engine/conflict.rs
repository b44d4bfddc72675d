use chrono::Datelike;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or_default()
}

pub(crate) fn validate_stay(range: &DateRange) -> Result<(), EngineError> {
    if range.start.year() < MIN_YEAR || range.end.year() > MAX_YEAR {
        return Err(EngineError::LimitExceeded("date out of range"));
    }
    if range.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

/// Price of a stay: one nightly rate per night, and a single night's rate for
/// a same-day stay.
pub fn quote_total(nightly_price: u32, range: &DateRange) -> u64 {
    let nights = range.nights().max(1) as u64;
    nights * u64::from(nightly_price)
}

/// Booking conflict check. Caller must hold the listing's write lock for the
/// result to stay valid until the reservation is applied.
pub fn check_no_conflict(ls: &ListingState, range: &DateRange) -> Result<(), EngineError> {
    match ls.overlapping(range).next() {
        Some(existing) => Err(EngineError::Conflict { existing: existing.id }),
        None => Ok(()),
    }
}
