//! Deterministic demo listings.
//!
//! Seeds a fresh database with a fixed catalogue so the assistant has
//! something to search without an external data source.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use tracing::info;

use hearth_core::error::HearthError;
use hearth_core::types::{Listing, Reservation};

use crate::repository::SqliteListingRepository;

/// Number of listings produced by [`demo_listings`].
pub const DEMO_LISTING_COUNT: usize = 50;

/// Title stem, category and a flavour sentence for each template.
const TEMPLATES: &[(&str, &str, &str)] = &[
    ("Luxury Villa", "Lux", "Private infinity pool and a chef's kitchen."),
    ("Cozy Apartment", "Modern", "Quiet street close to cafes and transit."),
    ("Modern Loft", "Modern", "Open-plan loft with floor-to-ceiling windows."),
    ("Beach House", "Beach", "Steps from the beach with an ocean-view deck."),
    ("Mountain Cabin", "Skiing", "Wood-burning fireplace near the ski lifts."),
    ("City Studio", "Modern", "Compact studio in the heart of downtown."),
    ("Countryside Cottage", "Countryside", "Stone cottage surrounded by farmland."),
    ("Penthouse Suite", "Lux", "Top-floor suite with a rooftop terrace."),
    ("Garden House", "Countryside", "Flower garden and a sunny patio."),
    ("Lake View Home", "Lake", "Lakefront dock with kayaks included."),
    ("Seaside Retreat", "Beach", "Sea breeze, sandy beach and sunset views."),
    ("Urban Oasis", "Pools", "Courtyard pool hidden in the city."),
    ("Historic Mansion", "Castles", "Restored manor with antique furnishings."),
    ("Desert Lodge", "Desert", "Stargazing deck on the edge of the dunes."),
    ("Forest Cabin", "Camping", "Secluded cabin among tall pines."),
];

const COUNTRY_CODES: &[&str] = &[
    "US", "GB", "FR", "DE", "ES", "IT", "JP", "CN", "AU", "BR", "CA", "CH", "DK", "GR", "IE",
    "IN", "MX", "NL", "NO", "NZ", "PT", "SE", "SG", "TH", "TR", "ZA", "ID", "IS", "FI",
];

const AMENITIES: &[&str] = &[
    "wifi", "kitchen", "parking", "pool", "hot tub", "fireplace", "air conditioning", "washer",
    "gym", "balcony",
];

/// Build the demo catalogue. Reservations are placed relative to `today`
/// so some listings always have upcoming bookings.
pub fn demo_listings(today: NaiveDate) -> Vec<Listing> {
    (1..=DEMO_LISTING_COUNT)
        .map(|i| {
            let (stem, category, flavour) = TEMPLATES[(i - 1) % TEMPLATES.len()];
            let n = i as u32;
            let price = 50 + (n * 37) % 400;
            let rooms = 1 + (n * 5) % 4;
            let guests = rooms + 1 + (n * 3) % 4;
            let bathrooms = 1 + n % 3;

            let amenities: Vec<&str> = AMENITIES
                .iter()
                .enumerate()
                .filter(|(k, _)| (i + k * 3) % 4 == 0 || *k == 0)
                .map(|(_, a)| *a)
                .collect();

            let mut listing = Listing::new(
                format!("listing-{:03}", i),
                format!("{} {}", stem, i),
                category,
                price,
            )
            .with_description(format!(
                "Beautiful {} property with amazing views and modern amenities. {} Perfect for your next vacation!",
                category.to_lowercase(),
                flavour
            ))
            .with_location(COUNTRY_CODES[(i * 7) % COUNTRY_CODES.len()])
            .with_capacity(guests, rooms, bathrooms)
            .with_amenities(amenities);

            listing.created_at = Utc
                .timestamp_opt(1_700_000_000 + (i as i64) * 3_600, 0)
                .single()
                .unwrap_or_default();

            if i % 6 == 0 {
                let start = today + Duration::days(10 + (i as i64 % 5));
                listing = listing.with_reservation(Reservation::new(
                    format!("reservation-{:03}", i),
                    start,
                    start + Duration::days(3),
                ));
            }
            listing
        })
        .collect()
}

/// Insert the demo catalogue. Returns the number of listings written.
pub fn seed_demo_listings(
    repo: &SqliteListingRepository,
    today: NaiveDate,
) -> Result<usize, HearthError> {
    let listings = demo_listings(today);
    for listing in &listings {
        repo.save(listing)?;
    }
    info!(count = listings.len(), "Seeded demo listings");
    Ok(listings.len())
}
