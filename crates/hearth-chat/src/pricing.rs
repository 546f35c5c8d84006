//! Availability and seasonal pricing.
//!
//! Multipliers are kept in per-mille and combined exactly in integers, then
//! rounded once to the nearest whole unit (halves away from zero).

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use hearth_core::types::{Clock, Listing, StayDates};

use crate::types::{AnnotatedListing, AvailabilityAnnotation, PriceInfo, PriceTrend};

const PEAK_SEASON: u128 = 1300;
const HOLIDAY_SEASON: u128 = 1200;
const WEEKEND: u128 = 1150;
const LAST_MINUTE: u128 = 900;
const EARLY_BIRD: u128 = 950;
const PER_MILLE: u128 = 1000;

const LAST_MINUTE_DAYS: i64 = 7;
const EARLY_BIRD_DAYS: i64 = 60;

/// Evaluates date conflicts and predicted nightly rates against a clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct AvailabilityEngine {
    clock: Clock,
}

impl AvailabilityEngine {
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Availability, and optionally pricing, for `listing` over `dates`.
    ///
    /// A check-out without a check-in is ignored. A check-in alone, or a
    /// check-out on or before the check-in, is a one-night stay.
    pub fn evaluate(
        &self,
        listing: &Listing,
        dates: StayDates,
        enable_pricing: bool,
    ) -> AvailabilityAnnotation {
        let stay = normalize_stay(dates);
        let today = self.today();

        let conflicting_ranges: Vec<String> = match stay.range() {
            Some((check_in, check_out)) => listing
                .reservations
                .iter()
                .filter(|r| r.overlaps(check_in, check_out))
                .map(|r| r.range_label())
                .collect(),
            None => listing
                .reservations
                .iter()
                .filter(|r| r.is_current_or_upcoming(today))
                .map(|r| r.range_label())
                .collect(),
        };

        let price_info = enable_pricing.then(|| self.predict_price(listing, stay.check_in));
        let nights = stay.nights();
        let nightly = price_info
            .as_ref()
            .map_or(listing.price, |p| p.predicted_price);
        let total_price = match nights {
            Some(n) => u64::from(nightly) * u64::from(n),
            None => u64::from(listing.price),
        };

        AvailabilityAnnotation {
            is_available: conflicting_ranges.is_empty(),
            conflicting_ranges,
            price_info,
            total_price,
            nights,
        }
    }

    /// A copy of `listing` carrying its availability annotation.
    pub fn annotate(
        &self,
        listing: AnnotatedListing,
        dates: StayDates,
        enable_pricing: bool,
    ) -> AnnotatedListing {
        let availability = self.evaluate(&listing.listing, dates, enable_pricing);
        AnnotatedListing {
            availability: Some(availability),
            ..listing
        }
    }

    /// Predicted nightly rate for a stay starting on `check_in`.
    ///
    /// Without a check-in the base price is returned unchanged.
    pub fn predict_price(&self, listing: &Listing, check_in: Option<NaiveDate>) -> PriceInfo {
        let base = listing.price;
        let Some(check_in) = check_in else {
            return PriceInfo {
                base_price: base,
                predicted_price: base,
                trend_label: "Stable pricing".to_string(),
                trend: PriceTrend::Stable,
                price_change: "0%".to_string(),
            };
        };

        let mut numerator = u128::from(base);
        let mut denominator: u128 = 1;
        let mut labels: Vec<&str> = Vec::new();
        let mut trend = PriceTrend::Stable;

        let month = check_in.month();
        if (6..=9).contains(&month) {
            numerator *= PEAK_SEASON;
            denominator *= PER_MILLE;
            labels.push("Peak season (+30%)");
            trend = PriceTrend::Peak;
        }
        if month == 12 || month == 1 {
            numerator *= HOLIDAY_SEASON;
            denominator *= PER_MILLE;
            labels.push("Holiday season (+20%)");
            trend = PriceTrend::Holiday;
        }
        if matches!(check_in.weekday(), Weekday::Fri | Weekday::Sat) {
            numerator *= WEEKEND;
            denominator *= PER_MILLE;
            labels.push("Weekend surcharge (+15%)");
            if trend == PriceTrend::Stable {
                trend = PriceTrend::Weekend;
            }
        }

        let days_until = (check_in - self.today()).num_days();
        if (0..=LAST_MINUTE_DAYS).contains(&days_until) {
            numerator *= LAST_MINUTE;
            denominator *= PER_MILLE;
            labels = vec!["Last-minute deal (-10%)"];
            trend = PriceTrend::LastMinute;
        } else if days_until > EARLY_BIRD_DAYS {
            numerator *= EARLY_BIRD;
            denominator *= PER_MILLE;
            labels = vec!["Early-bird discount (-5%)"];
            trend = PriceTrend::EarlyBird;
        }

        let predicted = round_div(numerator, denominator);
        let predicted_price = u32::try_from(predicted).unwrap_or(u32::MAX);

        PriceInfo {
            base_price: base,
            predicted_price,
            trend_label: if labels.is_empty() {
                "Stable pricing".to_string()
            } else {
                labels.join(" + ")
            },
            trend,
            price_change: percent_change(base, predicted_price),
        }
    }
}

fn normalize_stay(dates: StayDates) -> StayDates {
    match (dates.check_in, dates.check_out) {
        (None, _) => StayDates::default(),
        (Some(check_in), Some(check_out)) if check_out <= check_in => {
            StayDates::new(Some(check_in), Some(check_in + Duration::days(1)))
        }
        _ => dates.with_default_check_out(),
    }
}

fn round_div(numerator: u128, denominator: u128) -> u128 {
    (2 * numerator + denominator) / (2 * denominator)
}

fn percent_change(base: u32, predicted: u32) -> String {
    if base == 0 {
        return "0%".to_string();
    }
    let pct = ((f64::from(predicted) - f64::from(base)) / f64::from(base) * 100.0).round() as i64;
    match pct {
        p if p > 0 => format!("+{}%", p),
        p => format!("{}%", p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::types::Reservation;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn engine_at(today: NaiveDate) -> AvailabilityEngine {
        AvailabilityEngine::new(Clock::Fixed(today))
    }

    fn stay(check_in: NaiveDate, nights: i64) -> StayDates {
        StayDates::new(Some(check_in), Some(check_in + Duration::days(nights)))
    }

    // ---- Availability ----

    #[test]
    fn test_no_reservations_always_available() {
        let engine = engine_at(date(2026, 3, 2));
        let listing = Listing::new("l1", "Cabin", "Lake", 100);
        assert!(engine.evaluate(&listing, StayDates::default(), false).is_available);
        assert!(engine.evaluate(&listing, stay(date(2026, 3, 10), 3), true).is_available);
    }

    #[test]
    fn test_overlap_reports_conflicting_range() {
        let engine = engine_at(date(2026, 3, 2));
        let listing = Listing::new("l1", "Cabin", "Lake", 100).with_reservation(Reservation::new(
            "r1",
            date(2026, 3, 10),
            date(2026, 3, 13),
        ));

        let overlapping = engine.evaluate(&listing, stay(date(2026, 3, 12), 2), false);
        assert!(!overlapping.is_available);
        assert_eq!(overlapping.conflicting_ranges, vec!["2026-03-10 to 2026-03-13"]);

        let covering = engine.evaluate(&listing, stay(date(2026, 3, 8), 7), false);
        assert!(!covering.is_available);
    }

    #[test]
    fn test_back_to_back_stays_do_not_conflict() {
        let engine = engine_at(date(2026, 3, 2));
        let listing = Listing::new("l1", "Cabin", "Lake", 100).with_reservation(Reservation::new(
            "r1",
            date(2026, 3, 10),
            date(2026, 3, 13),
        ));
        assert!(engine.evaluate(&listing, stay(date(2026, 3, 13), 2), false).is_available);
        assert!(engine.evaluate(&listing, stay(date(2026, 3, 8), 2), false).is_available);
    }

    #[test]
    fn test_overlapping_reservations_tolerated() {
        let engine = engine_at(date(2026, 3, 2));
        let listing = Listing::new("l1", "Cabin", "Lake", 100)
            .with_reservation(Reservation::new("r1", date(2026, 3, 10), date(2026, 3, 14)))
            .with_reservation(Reservation::new("r2", date(2026, 3, 12), date(2026, 3, 16)));
        let result = engine.evaluate(&listing, stay(date(2026, 3, 13), 1), false);
        assert_eq!(result.conflicting_ranges.len(), 2);
    }

    #[test]
    fn test_no_dates_upcoming_reservation_is_unavailable() {
        let engine = engine_at(date(2026, 3, 2));
        let past = Listing::new("l1", "Cabin", "Lake", 100).with_reservation(Reservation::new(
            "r1",
            date(2026, 1, 1),
            date(2026, 1, 5),
        ));
        assert!(engine.evaluate(&past, StayDates::default(), false).is_available);

        let upcoming = past.with_reservation(Reservation::new(
            "r2",
            date(2026, 4, 1),
            date(2026, 4, 3),
        ));
        let result = engine.evaluate(&upcoming, StayDates::default(), false);
        assert!(!result.is_available);
        assert_eq!(result.conflicting_ranges, vec!["2026-04-01 to 2026-04-03"]);
    }

    #[test]
    fn test_check_out_only_is_ignored() {
        let engine = engine_at(date(2026, 3, 2));
        let listing = Listing::new("l1", "Cabin", "Lake", 100);
        let result = engine.evaluate(
            &listing,
            StayDates::new(None, Some(date(2026, 3, 20))),
            false,
        );
        assert_eq!(result.nights, None);
        assert_eq!(result.total_price, 100);
    }

    #[test]
    fn test_inverted_dates_become_one_night() {
        let engine = engine_at(date(2026, 3, 2));
        let listing = Listing::new("l1", "Cabin", "Lake", 100);
        let result = engine.evaluate(
            &listing,
            StayDates::new(Some(date(2026, 3, 20)), Some(date(2026, 3, 18))),
            false,
        );
        assert_eq!(result.nights, Some(1));
        assert_eq!(result.total_price, 100);
    }

    // ---- Pricing ----

    #[test]
    fn test_july_saturday_scenario() {
        let check_in = date(2026, 7, 11);
        assert_eq!(check_in.weekday(), Weekday::Sat);
        let engine = engine_at(date(2026, 6, 1));
        let listing = Listing::new("l1", "Villa", "Lux", 100);

        let result = engine.evaluate(&listing, stay(check_in, 2), true);
        let info = result.price_info.as_ref().unwrap();
        assert!(result.is_available);
        assert_eq!(info.predicted_price, 150);
        assert_eq!(info.trend, PriceTrend::Peak);
        assert_eq!(info.trend_label, "Peak season (+30%) + Weekend surcharge (+15%)");
        assert_eq!(info.price_change, "+50%");
        assert_eq!(result.nights, Some(2));
        assert_eq!(result.total_price, 300);
    }

    #[test]
    fn test_last_minute_overrides_label_but_compounds() {
        // Saturday 2026-07-04, three days out.
        let engine = engine_at(date(2026, 7, 1));
        let listing = Listing::new("l1", "Villa", "Lux", 100);
        let info = engine.predict_price(&listing, Some(date(2026, 7, 4)));
        // 100 * 1.3 * 1.15 * 0.9 = 134.55
        assert_eq!(info.predicted_price, 135);
        assert_eq!(info.trend, PriceTrend::LastMinute);
        assert_eq!(info.trend_label, "Last-minute deal (-10%)");
    }

    #[test]
    fn test_early_bird_discount() {
        // Tuesday in March, far ahead.
        let engine = engine_at(date(2026, 1, 5));
        let listing = Listing::new("l1", "Loft", "Modern", 200);
        let check_in = date(2026, 3, 17);
        assert_eq!(check_in.weekday(), Weekday::Tue);
        let info = engine.predict_price(&listing, Some(check_in));
        assert_eq!(info.predicted_price, 190);
        assert_eq!(info.trend, PriceTrend::EarlyBird);
        assert_eq!(info.price_change, "-5%");
    }

    #[test]
    fn test_holiday_season() {
        // Wednesday 2026-12-16, 30 days out.
        let engine = engine_at(date(2026, 11, 16));
        let listing = Listing::new("l1", "Chalet", "Skiing", 100);
        let check_in = date(2026, 12, 16);
        assert_eq!(check_in.weekday(), Weekday::Wed);
        let info = engine.predict_price(&listing, Some(check_in));
        assert_eq!(info.predicted_price, 120);
        assert_eq!(info.trend, PriceTrend::Holiday);
    }

    #[test]
    fn test_stable_without_adjustments() {
        // Wednesday 2026-04-15, 14 days out.
        let engine = engine_at(date(2026, 4, 1));
        let listing = Listing::new("l1", "Barn", "Barns", 80);
        let info = engine.predict_price(&listing, Some(date(2026, 4, 15)));
        assert_eq!(info.predicted_price, 80);
        assert_eq!(info.trend_label, "Stable pricing");
        assert_eq!(info.price_change, "0%");
    }

    #[test]
    fn test_pricing_without_check_in_keeps_base() {
        let engine = engine_at(date(2026, 4, 1));
        let listing = Listing::new("l1", "Barn", "Barns", 80);
        let result = engine.evaluate(&listing, StayDates::default(), true);
        let info = result.price_info.unwrap();
        assert_eq!(info.predicted_price, 80);
        assert_eq!(result.total_price, 80);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_div(1495, 10), 150);
        assert_eq!(round_div(1494, 10), 149);
        assert_eq!(round_div(0, 10), 0);
    }

    #[test]
    fn test_annotate_keeps_listing() {
        let engine = engine_at(date(2026, 4, 1));
        let annotated = engine.annotate(
            AnnotatedListing::plain(Listing::new("l1", "Barn", "Barns", 80)),
            StayDates::default(),
            false,
        );
        assert_eq!(annotated.listing.id, "l1");
        assert!(annotated.availability.unwrap().price_info.is_none());
    }
}
