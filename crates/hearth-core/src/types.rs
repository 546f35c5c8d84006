use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Listings
// =============================================================================

/// A booked date range attached to a listing.
///
/// `end_date` is the check-out day: the range is half-open, `[start, end)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Reservation {
    pub fn new(id: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            start_date,
            end_date,
        }
    }

    /// Human-readable range, e.g. `2025-07-05 to 2025-07-07`.
    pub fn range_label(&self) -> String {
        format!(
            "{} to {}",
            self.start_date.format("%Y-%m-%d"),
            self.end_date.format("%Y-%m-%d")
        )
    }

    /// Whether the stay `[check_in, check_out)` collides with this reservation.
    pub fn overlaps(&self, check_in: NaiveDate, check_out: NaiveDate) -> bool {
        let starts_inside = check_in >= self.start_date && check_in < self.end_date;
        let ends_inside = check_out > self.start_date && check_out <= self.end_date;
        let covers = check_in <= self.start_date && check_out >= self.end_date;
        starts_inside || ends_inside || covers
    }

    /// Whether any part of the reservation is today or later.
    pub fn is_current_or_upcoming(&self, today: NaiveDate) -> bool {
        self.start_date >= today || self.end_date >= today
    }
}

/// A rentable property record.
///
/// Reservations may overlap each other; nothing downstream assumes otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    /// Nightly base rate in whole currency units. Always positive.
    pub price: u32,
    pub guest_count: u32,
    pub room_count: u32,
    pub bathroom_count: u32,
    pub location_value: String,
    pub amenities: BTreeSet<String>,
    pub reservations: Vec<Reservation>,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    /// Create a listing with no amenities or reservations.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        category: impl Into<String>,
        price: u32,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            category: category.into(),
            price: price.max(1),
            guest_count: 2,
            room_count: 1,
            bathroom_count: 1,
            location_value: String::new(),
            amenities: BTreeSet::new(),
            reservations: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location_value = location.into();
        self
    }

    pub fn with_capacity(mut self, guests: u32, rooms: u32, bathrooms: u32) -> Self {
        self.guest_count = guests;
        self.room_count = rooms;
        self.bathroom_count = bathrooms;
        self
    }

    pub fn with_amenities<I, S>(mut self, amenities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.amenities = amenities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reservation(mut self, reservation: Reservation) -> Self {
        self.reservations.push(reservation);
        self
    }

    /// Case-insensitive match of `wanted` as whole words inside the title.
    /// "Luxury Villa 1" matches "Luxury Villa 1" but not "Luxury Villa 16".
    pub fn title_matches(&self, wanted: &str) -> bool {
        let title = self.title.to_lowercase();
        let wanted = wanted.trim().to_lowercase();
        if wanted.is_empty() {
            return false;
        }
        title.match_indices(wanted.as_str()).any(|(start, m)| {
            let before = title[..start].chars().next_back();
            let after = title[start + m.len()..].chars().next();
            let boundary = |c: Option<char>| !c.is_some_and(char::is_alphanumeric);
            boundary(before) && boundary(after)
        })
    }
}

// =============================================================================
// Filters
// =============================================================================

/// Structured constraints on a listing search. All fields are optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingFilter {
    pub category: Option<String>,
    pub location: Option<String>,
    pub min_price: Option<u32>,
    pub max_price: Option<u32>,
    pub min_guests: Option<u32>,
    pub min_rooms: Option<u32>,
}

impl ListingFilter {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.location.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.min_guests.is_none()
            && self.min_rooms.is_none()
    }

    /// Overlay the fields set in `other`; unset fields keep their value.
    pub fn merge(&mut self, other: &ListingFilter) {
        if other.category.is_some() {
            self.category.clone_from(&other.category);
        }
        if other.location.is_some() {
            self.location.clone_from(&other.location);
        }
        if other.min_price.is_some() {
            self.min_price = other.min_price;
        }
        if other.max_price.is_some() {
            self.max_price = other.max_price;
        }
        if other.min_guests.is_some() {
            self.min_guests = other.min_guests;
        }
        if other.min_rooms.is_some() {
            self.min_rooms = other.min_rooms;
        }
    }

    /// Whether the listing satisfies every set constraint.
    ///
    /// Category and location compare case-insensitively.
    pub fn matches(&self, listing: &Listing) -> bool {
        if let Some(category) = &self.category {
            if !listing.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(location) = &self.location {
            if !listing.location_value.eq_ignore_ascii_case(location) {
                return false;
            }
        }
        if self.min_price.is_some_and(|min| listing.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| listing.price > max) {
            return false;
        }
        if self.min_guests.is_some_and(|g| listing.guest_count < g) {
            return false;
        }
        if self.min_rooms.is_some_and(|r| listing.room_count < r) {
            return false;
        }
        true
    }

    /// Price and capacity constraints only, used to narrow an existing set.
    pub fn numeric_only(&self) -> ListingFilter {
        ListingFilter {
            min_price: self.min_price,
            max_price: self.max_price,
            min_guests: self.min_guests,
            min_rooms: self.min_rooms,
            ..Default::default()
        }
    }
}

// =============================================================================
// Dates
// =============================================================================

/// An optional check-in / check-out pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StayDates {
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
}

impl StayDates {
    pub fn new(check_in: Option<NaiveDate>, check_out: Option<NaiveDate>) -> Self {
        Self {
            check_in,
            check_out,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.check_in.is_none() && self.check_out.is_none()
    }

    /// Both dates, if both are known.
    pub fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.check_in?, self.check_out?))
    }

    /// A check-in without a check-out becomes a one-night stay.
    pub fn with_default_check_out(self) -> Self {
        match (self.check_in, self.check_out) {
            (Some(check_in), None) => Self {
                check_in: Some(check_in),
                check_out: Some(check_in + Duration::days(1)),
            },
            _ => self,
        }
    }

    /// Number of nights, at least one, when both dates are known.
    pub fn nights(&self) -> Option<u32> {
        let (check_in, check_out) = self.range()?;
        let days = (check_out - check_in).num_days();
        Some(days.max(1) as u32)
    }

    /// Fill unset dates from `fallback`.
    pub fn or(self, fallback: StayDates) -> Self {
        Self {
            check_in: self.check_in.or(fallback.check_in),
            check_out: self.check_out.or(fallback.check_out),
        }
    }
}

/// Source of "today" for availability and pricing decisions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Clock {
    /// The local calendar date of the host.
    #[default]
    System,
    /// A pinned date, for deterministic evaluation.
    Fixed(NaiveDate),
}

impl Clock {
    pub fn today(&self) -> NaiveDate {
        match self {
            Clock::System => chrono::Local::now().date_naive(),
            Clock::Fixed(date) => *date,
        }
    }
}

// =============================================================================
// Preferences
// =============================================================================

/// Inferred spending tier of a user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    Budget,
    #[default]
    Mid,
    Luxury,
}

impl std::fmt::Display for PriceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceTier::Budget => write!(f, "budget"),
            PriceTier::Mid => write!(f, "mid"),
            PriceTier::Luxury => write!(f, "luxury"),
        }
    }
}
