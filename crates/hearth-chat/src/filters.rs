//! Structured filter extraction from free text.
//!
//! Pulls price bounds, party size, bedroom count, category and country out
//! of an utterance. Anything not recognised is left unset so the result can
//! be merged over the conversation's current filters.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use hearth_core::types::ListingFilter;

// =============================================================================
// Patterns
// =============================================================================

struct FilterPatterns {
    price_range: Regex,
    price_between: Regex,
    price_max: Regex,
    price_min: Regex,
    guests: Regex,
    guests_for: Regex,
    family_of: Regex,
    rooms: Regex,
}

static FILTER_PATTERNS: LazyLock<FilterPatterns> = LazyLock::new(|| {
    let mk = |p: &str| Regex::new(p).expect("Invalid filter regex");
    FilterPatterns {
        price_range: mk(r"\$(\d+)\s*(?:-|to)\s*\$?(\d+)"),
        price_between: mk(r"(?i)\bbetween\s+\$?(\d+)\s+and\s+\$?(\d+)"),
        price_max: mk(
            r"(?i)\b(?:under|below|less\s+than|max(?:imum)?|up\s+to|no\s+more\s+than|cheaper\s+than)\s+(\$?)(\d+)(?:\s+([a-z]+))?",
        ),
        price_min: mk(
            r"(?i)\b(?:over|above|more\s+than|at\s+least|min(?:imum)?)\s+(\$?)(\d+)(?:\s+([a-z]+))?",
        ),
        guests: mk(r"(?i)\b(\d+)\s*(?:guests?|people|persons?|adults?|travell?ers)\b"),
        guests_for: mk(r"(?i)\bfor\s+(\d+)\b(?:\s*([a-z/]+))?"),
        family_of: mk(r"(?i)\b(?:family|group|party)\s+of\s+(\d+)\b"),
        rooms: mk(r"(?i)\b(\d+)\s*(?:bed(?:room)?s?|br|rooms?)\b"),
    }
});

/// Words that turn a number into something other than a price or party size.
const NON_PRICE_UNITS: &[&str] = &[
    "guest", "guests", "people", "person", "persons", "adult", "adults", "bedroom", "bedrooms",
    "room", "rooms", "bed", "beds", "night", "nights", "day", "days", "week", "weeks",
];

const NON_PARTY_UNITS: &[&str] = &[
    "night", "nights", "day", "days", "week", "weeks", "bedroom", "bedrooms", "room", "rooms",
    "bed", "beds", "dollars", "usd", "/",
];

/// Category vocabulary: listing category and the words that select it.
const CATEGORY_WORDS: &[(&str, &[&str])] = &[
    ("Beach", &["beach", "beaches", "seaside", "ocean", "oceanfront", "coast", "coastal"]),
    ("Skiing", &["ski", "skiing", "slopes"]),
    ("Lake", &["lake", "lakeside", "lakefront"]),
    ("Castles", &["castle", "castles", "mansion", "manor"]),
    ("Caves", &["cave", "caves"]),
    ("Camping", &["camping", "campsite", "forest"]),
    ("Desert", &["desert", "dunes"]),
    ("Barns", &["barn", "barns"]),
    ("Islands", &["island", "islands"]),
    ("Pools", &["pool", "pools"]),
    ("Windmills", &["windmill", "windmills"]),
    ("Arctic", &["arctic", "snow", "igloo"]),
    ("Countryside", &["countryside", "rural", "farm", "farmhouse", "village"]),
    ("Modern", &["modern", "contemporary", "loft"]),
];

/// Country names (single or multi-word) and their ISO codes.
const COUNTRIES: &[(&str, &str)] = &[
    ("united states", "US"),
    ("usa", "US"),
    ("america", "US"),
    ("united kingdom", "GB"),
    ("uk", "GB"),
    ("england", "GB"),
    ("britain", "GB"),
    ("france", "FR"),
    ("germany", "DE"),
    ("spain", "ES"),
    ("italy", "IT"),
    ("japan", "JP"),
    ("china", "CN"),
    ("australia", "AU"),
    ("brazil", "BR"),
    ("canada", "CA"),
    ("switzerland", "CH"),
    ("denmark", "DK"),
    ("greece", "GR"),
    ("ireland", "IE"),
    ("india", "IN"),
    ("mexico", "MX"),
    ("netherlands", "NL"),
    ("norway", "NO"),
    ("new zealand", "NZ"),
    ("portugal", "PT"),
    ("sweden", "SE"),
    ("singapore", "SG"),
    ("thailand", "TH"),
    ("turkey", "TR"),
    ("south africa", "ZA"),
    ("indonesia", "ID"),
    ("bali", "ID"),
    ("iceland", "IS"),
    ("finland", "FI"),
];

// =============================================================================
// Extraction
// =============================================================================

/// Extract whatever structured constraints the text states.
pub fn extract_filters(text: &str) -> ListingFilter {
    let p = &*FILTER_PATTERNS;
    let mut filter = ListingFilter::default();

    if let Some(c) = p.price_range.captures(text).or_else(|| p.price_between.captures(text)) {
        let (a, b) = (number(&c, 1), number(&c, 2));
        if let (Some(a), Some(b)) = (a, b) {
            filter.min_price = Some(a.min(b));
            filter.max_price = Some(a.max(b));
        }
    }
    if filter.max_price.is_none() {
        filter.max_price = p.price_max.captures(text).and_then(|c| price_bound(&c));
    }
    if filter.min_price.is_none() {
        filter.min_price = p.price_min.captures(text).and_then(|c| price_bound(&c));
    }

    filter.min_guests = p
        .guests
        .captures(text)
        .or_else(|| p.family_of.captures(text))
        .and_then(|c| number(&c, 1))
        .or_else(|| {
            p.guests_for.captures_iter(text).find_map(|c| {
                let unit = c.get(2).map(|m| m.as_str().to_ascii_lowercase());
                match unit {
                    Some(u) if NON_PARTY_UNITS.contains(&u.as_str()) || u.starts_with('/') => None,
                    _ => number(&c, 1).filter(|n| (1..=30).contains(n)),
                }
            })
        });

    filter.min_rooms = p.rooms.captures(text).and_then(|c| number(&c, 1));
    filter.category = detect_category(text).map(str::to_string);
    filter.location = detect_country(text).map(str::to_string);
    filter
}

/// The listing category named by the text, if any.
pub fn detect_category(text: &str) -> Option<&'static str> {
    let words = words(text);
    CATEGORY_WORDS
        .iter()
        .find(|(_, vocab)| vocab.iter().any(|v| words.iter().any(|w| w == v)))
        .map(|(category, _)| *category)
}

/// The country code named by the text, if any.
pub fn detect_country(text: &str) -> Option<&'static str> {
    let padded = format!(" {} ", words(text).join(" "));
    COUNTRIES
        .iter()
        .find(|(name, _)| padded.contains(&format!(" {} ", name)))
        .map(|(_, code)| *code)
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn number(c: &Captures<'_>, group: usize) -> Option<u32> {
    c.get(group).and_then(|m| m.as_str().parse().ok())
}

/// A price bound from `(\$?)(\d+)(\s+word)?`, rejected when the number is
/// clearly a count of something else.
fn price_bound(c: &Captures<'_>) -> Option<u32> {
    let has_dollar = c.get(1).is_some_and(|m| !m.as_str().is_empty());
    let unit = c.get(3).map(|m| m.as_str().to_ascii_lowercase());
    if !has_dollar && unit.as_deref().is_some_and(|u| NON_PRICE_UNITS.contains(&u)) {
        return None;
    }
    number(c, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Price ----

    #[test]
    fn test_price_under() {
        let f = extract_filters("beach houses under $200 please");
        assert_eq!(f.max_price, Some(200));
        assert_eq!(f.min_price, None);
    }

    #[test]
    fn test_price_range_dollar() {
        let f = extract_filters("something $150-300 a night");
        assert_eq!(f.min_price, Some(150));
        assert_eq!(f.max_price, Some(300));
    }

    #[test]
    fn test_price_between() {
        let f = extract_filters("between 300 and 100 dollars");
        assert_eq!(f.min_price, Some(100));
        assert_eq!(f.max_price, Some(300));
    }

    #[test]
    fn test_price_min() {
        let f = extract_filters("villas over $400");
        assert_eq!(f.min_price, Some(400));
    }

    #[test]
    fn test_count_is_not_a_price() {
        let f = extract_filters("at least 3 bedrooms");
        assert_eq!(f.min_price, None);
        assert_eq!(f.min_rooms, Some(3));
    }

    #[test]
    fn test_dates_are_not_a_price_range() {
        let f = extract_filters("available Jan 1-7?");
        assert_eq!(f.min_price, None);
        assert_eq!(f.max_price, None);
    }

    // ---- Party size ----

    #[test]
    fn test_guest_count_forms() {
        assert_eq!(extract_filters("a place for 4 guests").min_guests, Some(4));
        assert_eq!(extract_filters("cabin for 6 people").min_guests, Some(6));
        assert_eq!(extract_filters("family of 5").min_guests, Some(5));
        assert_eq!(extract_filters("somewhere for 3").min_guests, Some(3));
    }

    #[test]
    fn test_for_nights_is_not_guests() {
        assert_eq!(extract_filters("book it for 3 nights").min_guests, None);
    }

    // ---- Category and location ----

    #[test]
    fn test_category_words() {
        assert_eq!(extract_filters("seaside cottage").category.as_deref(), Some("Beach"));
        assert_eq!(extract_filters("somewhere to ski").category.as_deref(), Some("Skiing"));
        assert_eq!(extract_filters("a luxury stay").category, None);
    }

    #[test]
    fn test_country_detection() {
        assert_eq!(detect_country("a villa in New Zealand"), Some("NZ"));
        assert_eq!(detect_country("Japan in spring"), Some("JP"));
        assert_eq!(detect_country("show us something nice"), None);
        assert_eq!(detect_country("Indiana"), None);
    }

    #[test]
    fn test_plain_text_yields_empty_filter() {
        assert!(extract_filters("hello there").is_empty());
    }
}
