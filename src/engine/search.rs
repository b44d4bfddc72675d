use chrono::NaiveDate;

use crate::model::*;

use super::availability::filter_available;

/// Validated search input. Every field is optional; `None` means
/// "no constraint", never "match a default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    pub location_value: Option<String>,
    pub category: Option<String>,
    pub guest_count: Option<u32>,
    pub room_count: Option<u32>,
    pub bathroom_count: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// One term of a composed listing predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Category(String),
    Location(String),
    MinGuests(u32),
    MinRooms(u32),
    MinBathrooms(u32),
    /// No reservation may overlap this range.
    Available(DateRange),
}

impl Constraint {
    pub fn matches(&self, ls: &ListingState) -> bool {
        let l = &ls.listing;
        match self {
            Constraint::Category(c) => &l.category == c,
            Constraint::Location(loc) => &l.location_value == loc,
            Constraint::MinGuests(n) => l.guest_count >= *n,
            Constraint::MinRooms(n) => l.room_count >= *n,
            Constraint::MinBathrooms(n) => l.bathroom_count >= *n,
            Constraint::Available(range) => super::availability::is_available(ls, range),
        }
    }
}

/// Conjunction of constraints. An empty filter matches every listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFilter {
    constraints: Vec<Constraint>,
}

impl ListingFilter {
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn date_range(&self) -> Option<&DateRange> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::Available(range) => Some(range),
            _ => None,
        })
    }

    pub fn matches(&self, ls: &ListingState) -> bool {
        self.constraints.iter().all(|c| c.matches(ls))
    }

    /// Apply attribute constraints, then the availability filter, in one pass
    /// over the caller's (locked) listing states.
    pub fn apply<'a, I>(&self, listings: I) -> Vec<&'a ListingState>
    where
        I: IntoIterator<Item = &'a ListingState>,
    {
        let candidates = listings.into_iter().filter(|ls| {
            self.constraints
                .iter()
                .filter(|c| !matches!(c, Constraint::Available(_)))
                .all(|c| c.matches(ls))
        });
        filter_available(candidates, self.date_range())
    }
}

/// Translate search criteria into a single AND-ed predicate.
///
/// Counts are minimums, category and location are exact, and the date
/// constraint needs both ends: a lone start or end date is ignored.
pub fn compose_filter(criteria: &SearchCriteria) -> ListingFilter {
    let mut constraints = Vec::new();
    if let Some(category) = &criteria.category {
        constraints.push(Constraint::Category(category.clone()));
    }
    if let Some(location) = &criteria.location_value {
        constraints.push(Constraint::Location(location.clone()));
    }
    if let Some(n) = criteria.guest_count {
        constraints.push(Constraint::MinGuests(n));
    }
    if let Some(n) = criteria.room_count {
        constraints.push(Constraint::MinRooms(n));
    }
    if let Some(n) = criteria.bathroom_count {
        constraints.push(Constraint::MinBathrooms(n));
    }
    if let (Some(start), Some(end)) = (criteria.start_date, criteria.end_date)
        && let Some(range) = DateRange::try_new(start, end)
    {
        constraints.push(Constraint::Available(range));
    }
    ListingFilter { constraints }
}
