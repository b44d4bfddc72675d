use chrono::Days;

use crate::model::*;

// ── Availability ──────────────────────────────────────────────────

/// True when no reservation on the listing overlaps `range`.
pub fn is_available(ls: &ListingState, range: &DateRange) -> bool {
    ls.overlapping(range).next().is_none()
}

/// Keep only listings with no reservation overlapping `requested`.
/// With no requested range the input comes back unchanged.
pub fn filter_available<'a, I>(listings: I, requested: Option<&DateRange>) -> Vec<&'a ListingState>
where
    I: IntoIterator<Item = &'a ListingState>,
{
    match requested {
        None => listings.into_iter().collect(),
        Some(range) => listings
            .into_iter()
            .filter(|ls| is_available(ls, range))
            .collect(),
    }
}

/// Merge booked ranges into disjoint day ranges. Ranges that overlap or touch
/// (one ends the day before the next starts) collapse into one.
pub fn unavailable_ranges(reservations: &[Reservation]) -> Vec<DateRange> {
    let mut sorted: Vec<DateRange> = reservations.iter().map(Reservation::range).collect();
    sorted.sort_by_key(|r| r.start);
    merge_adjacent(&sorted)
}

/// Merge sorted day ranges that overlap or are adjacent.
pub fn merge_adjacent(sorted: &[DateRange]) -> Vec<DateRange> {
    let mut merged: Vec<DateRange> = Vec::new();
    for &range in sorted {
        if let Some(last) = merged.last_mut() {
            let touches = last
                .end
                .checked_add_days(Days::new(1))
                .is_none_or(|next_day| range.start <= next_day);
            if touches {
                last.end = last.end.max(range.end);
                continue;
            }
        }
        merged.push(range);
    }
    merged
}
