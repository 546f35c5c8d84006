//! Intent parsing.
//!
//! Two interchangeable [`IntentParser`] implementations:
//! - `GenerativeIntentParser` asks a [`TextGenerator`] to classify the
//!   utterance and reads back a `Reasoning:` block plus a JSON object.
//! - `RuleBasedIntentParser` classifies with keyword patterns and extracts
//!   titles and dates with regexes. Deterministic and offline.
//!
//! Neither ever fails a turn: anything unreadable becomes a plain search
//! over the raw utterance.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::{debug, warn};

use hearth_core::types::{Clock, ListingFilter, StayDates};

use crate::filters::extract_filters;
use crate::llm::{extract_json_object, extract_reasoning, strip_code_fences, TextGenerator};
use crate::types::{Intent, IntentKind};

/// Classifies an utterance, with recent dialogue as context.
#[async_trait]
pub trait IntentParser: Send + Sync {
    /// `history` may be empty. Never fails; degrades to a search intent.
    async fn parse(&self, utterance: &str, history: &str) -> Intent;

    /// Short name for diagnostics.
    fn strategy(&self) -> &'static str;
}

/// Give a check-in without check-out one night, and repair an inverted range.
pub fn normalize_dates(dates: StayDates) -> StayDates {
    match dates.range() {
        Some((check_in, check_out)) if check_out <= check_in => {
            StayDates::new(Some(check_in), Some(check_in + Duration::days(1)))
        }
        _ => dates.with_default_check_out(),
    }
}

// =============================================================================
// GenerativeIntentParser
// =============================================================================

pub struct GenerativeIntentParser {
    generator: Arc<dyn TextGenerator>,
    clock: Clock,
}

impl GenerativeIntentParser {
    pub fn new(generator: Arc<dyn TextGenerator>, clock: Clock) -> Self {
        Self { generator, clock }
    }

    fn build_prompt(&self, utterance: &str, history: &str) -> String {
        let history_block = if history.trim().is_empty() {
            String::new()
        } else {
            format!("\n\nRecent conversation for reference:\n{}\n", history.trim())
        };

        format!(
            r#"You are the intent analyzer for a vacation rental assistant. Think step by step about what the user really wants, then extract the key details.

User message: "{utterance}"{history_block}

Answer in exactly this format:

Reasoning:
<your step-by-step thinking, e.g. the user said "seaside" so they want Beach listings; they said "next week" so a date must be computed>

JSON:
{{
  "type": "search | date_check | price_predict | booking | general",
  "searchQuery": "the search keywords, e.g. beach house",
  "checkInDate": "check-in date as YYYY-MM-DD, or null",
  "checkOutDate": "check-out date as YYYY-MM-DD, or null",
  "listingId": "listing id if one is mentioned, or null",
  "listingTitle": "full listing title if one is mentioned, e.g. Seaside Retreat 31, or null",
  "enablePricePrediction": true or false
}}

Intent types:
- search: looking for listings ("find a house by the sea")
- date_check: checking availability for dates ("is anything free Jan 1 to 7")
- price_predict: price questions ("will prices go up then", "when is it cheapest to book")
- booking: booking a listing ("book this one for me", "I want Luxury Villa 1")
- general: anything else ("hello")

Rules:
1. A listing name mentioned together with a price question is price_predict, and listingTitle must be set.
2. A listing name mentioned together with a booking request is booking.
3. listingTitle must be the complete title including its number ("Seaside Retreat 31", not "Seaside Retreat").
4. If the user asks to book without naming a listing, take the most recently mentioned listing from the conversation.

Date rules:
- A date without a year means its next future occurrence.
- Relative dates ("next Friday", "in 3 days") are computed from today's date.
- If only a check-in date is mentioned, check-out is one night later.

Today's date: {today}"#,
            utterance = utterance.trim(),
            history_block = history_block,
            today = self.clock.today().format("%Y-%m-%d"),
        )
    }
}

#[async_trait]
impl IntentParser for GenerativeIntentParser {
    async fn parse(&self, utterance: &str, history: &str) -> Intent {
        let prompt = self.build_prompt(utterance, history);
        match self.generator.generate(&prompt).await {
            Ok(text) => parse_generated_intent(&text, utterance),
            Err(e) => {
                warn!(error = %e, "Intent generation failed, falling back to search");
                Intent::fallback_search(utterance, "Intent parsing failed; treating the message as a search.")
            }
        }
    }

    fn strategy(&self) -> &'static str {
        "generative"
    }
}

/// Read an intent out of generated text. Lenient about missing and null
/// fields; anything structurally unreadable becomes a search intent.
pub fn parse_generated_intent(text: &str, utterance: &str) -> Intent {
    let text = strip_code_fences(text);
    let reasoning = extract_reasoning(&text).unwrap_or_else(|| "Parsing intent...".to_string());

    let Some(json) = extract_json_object(&text) else {
        debug!("No JSON object in intent response");
        return Intent::fallback_search(
            utterance,
            "Could not determine a specific intent; defaulting to search.",
        );
    };
    let value: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "Malformed intent JSON");
            return Intent::fallback_search(
                utterance,
                "Could not determine a specific intent; defaulting to search.",
            );
        }
    };

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .and_then(IntentKind::from_label)
        .unwrap_or_default();

    let mut intent = Intent {
        kind,
        search_query: text_field(&value, "searchQuery"),
        check_in_date: date_field(&value, "checkInDate"),
        check_out_date: date_field(&value, "checkOutDate"),
        listing_id: text_field(&value, "listingId"),
        listing_title: text_field(&value, "listingTitle"),
        enable_price_prediction: bool_field(&value, "enablePricePrediction")
            || kind == IntentKind::PricePredict,
        reasoning,
    };
    if intent.search_query.is_none() && matches!(kind, IntentKind::Search | IntentKind::General) {
        intent.search_query = Some(utterance.trim().to_string());
    }
    intent.set_dates(normalize_dates(intent.dates()));
    intent
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null") && !s.eq_ignore_ascii_case("none"))
        .map(str::to_string)
}

fn date_field(value: &Value, key: &str) -> Option<NaiveDate> {
    let raw = text_field(value, key)?;
    let day = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn bool_field(value: &Value, key: &str) -> bool {
    match value.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

// =============================================================================
// RuleBasedIntentParser
// =============================================================================

struct KeywordPatterns {
    booking: Regex,
    when_to_book: Regex,
    price: Regex,
    availability: Regex,
    greeting: Regex,
}

static KEYWORD_PATTERNS: LazyLock<KeywordPatterns> = LazyLock::new(|| {
    let mk = |p: &str| Regex::new(p).expect("Invalid intent regex");
    KeywordPatterns {
        booking: mk(r"(?i)\b(?:book|reserve|reservation|booking)\b"),
        when_to_book: mk(r"(?i)\b(?:best\s+time|cheapest\s+time|when)\b.{0,24}\bbook(?:ing)?\b"),
        price: mk(
            r"(?i)\b(?:prices?|priced|pricing|costs?|how\s+much|rates?|go(?:es)?\s+(?:up|down)|trend)\b",
        ),
        availability: mk(r"(?i)\b(?:available|availability|free|vacant|vacancy|open)\b"),
        greeting: mk(
            r"(?i)^(?:hi|hello|hey|thanks|thank\s+you|good\s+(?:morning|afternoon|evening)|who\s+are\s+you|what\s+can\s+you\s+do|help)\b",
        ),
    }
});

const MONTH: &str = r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";
const WEEKDAY: &str = r"monday|tuesday|wednesday|thursday|friday|saturday|sunday";

struct DatePatterns {
    iso: Regex,
    month_range: Regex,
    month_day_range: Regex,
    month_day: Regex,
    slash_range: Regex,
    slash_day: Regex,
    tomorrow: Regex,
    today: Regex,
    in_days: Regex,
    next_weekday: Regex,
    this_weekday: Regex,
    this_weekend: Regex,
    next_week: Regex,
    for_nights: Regex,
}

static DATE_PATTERNS: LazyLock<DatePatterns> = LazyLock::new(|| {
    let mk = |p: String| Regex::new(&p).expect("Invalid date regex");
    let sep = r"\s*(?:-|–|to|until|till|through|thru)\s*";
    let ord = r"(?:st|nd|rd|th)?";
    DatePatterns {
        iso: mk(r"\b(\d{4})-(\d{2})-(\d{2})\b".to_string()),
        month_range: mk(format!(
            r"(?i)\b({MONTH})\.?\s+(\d{{1,2}}){ord}{sep}({MONTH})\.?\s+(\d{{1,2}}){ord}\b"
        )),
        month_day_range: mk(format!(
            r"(?i)\b({MONTH})\.?\s+(\d{{1,2}}){ord}{sep}(\d{{1,2}}){ord}\b"
        )),
        month_day: mk(format!(r"(?i)\b({MONTH})\.?\s+(\d{{1,2}}){ord}\b")),
        slash_range: mk(format!(r"\b(\d{{1,2}})/(\d{{1,2}}){sep}(\d{{1,2}})/(\d{{1,2}})\b")),
        slash_day: mk(r"\b(\d{1,2})/(\d{1,2})\b".to_string()),
        tomorrow: mk(r"(?i)\btomorrow\b".to_string()),
        today: mk(r"(?i)\b(?:today|tonight)\b".to_string()),
        in_days: mk(r"(?i)\b(?:in\s+(\d{1,3})\s+days?|(\d{1,3})\s+days?\s+from\s+now)\b".to_string()),
        next_weekday: mk(format!(r"(?i)\bnext\s+({WEEKDAY})\b")),
        this_weekday: mk(format!(r"(?i)\b(?:this|on|coming)\s+({WEEKDAY})\b")),
        this_weekend: mk(r"(?i)\b(?:this|next|the)\s+weekend\b".to_string()),
        next_week: mk(r"(?i)\bnext\s+week\b".to_string()),
        for_nights: mk(r"(?i)\bfor\s+(\d{1,2})\s+nights?\b".to_string()),
    }
});

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][A-Za-z'&-]*(?:\s+[A-Z][A-Za-z'&-]*)*\s+\d{1,4})\b")
        .expect("Invalid title regex")
});

static BOOK_CLAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:book|reserve)\s+(?:the\s+)?([a-z][a-z0-9' -]*?)\s*(?:,|\bfor\b|\bfrom\b|\bon\b|\bin\b|\bat\b|\bstarting\b|[.!?]|$)",
    )
    .expect("Invalid booking clause regex")
});

static LISTING_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(listing-\d+)\b").expect("Invalid listing id regex"));

/// Leading capitalised words that start a sentence rather than a title.
const LEADING_WORDS: &[&str] = &[
    "book", "reserve", "price", "prices", "check", "is", "are", "how", "what", "show", "find",
    "for", "the", "i", "want", "please", "can", "could", "about", "when", "will", "does", "tell",
    "me", "get", "try", "and", "or", "at", "in", "on", "of",
];

const PRONOUNS: &[&str] = &["it", "this", "that", "this one", "that one", "them", "one", "these", "those"];

/// Deterministic keyword and regex classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedIntentParser {
    clock: Clock,
}

impl RuleBasedIntentParser {
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }

    /// Synchronous classification; the trait method delegates here.
    pub fn classify(&self, utterance: &str) -> Intent {
        let text = utterance.trim();
        let today = self.clock.today();
        let dates = normalize_dates(extract_dates(text, today));
        let filter = extract_filters(text);
        let kind = classify_kind(text, &dates, &filter);

        let listing_title = match kind {
            IntentKind::Booking | IntentKind::PricePredict | IntentKind::DateCheck => {
                extract_title(text, kind == IntentKind::Booking)
            }
            _ => None,
        };
        let listing_id = LISTING_ID_RE
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_ascii_lowercase());

        let reasoning = format!(
            "Matched {} keywords{}{}.",
            kind,
            listing_title
                .as_deref()
                .map(|t| format!(", listing \"{}\"", t))
                .unwrap_or_default(),
            dates
                .range()
                .map(|(a, b)| format!(", dates {} to {}", a, b))
                .unwrap_or_default(),
        );

        Intent {
            kind,
            search_query: Some(text.to_string()),
            check_in_date: dates.check_in,
            check_out_date: dates.check_out,
            listing_id,
            listing_title,
            enable_price_prediction: kind == IntentKind::PricePredict
                || KEYWORD_PATTERNS.price.is_match(text),
            reasoning,
        }
    }
}

#[async_trait]
impl IntentParser for RuleBasedIntentParser {
    async fn parse(&self, utterance: &str, _history: &str) -> Intent {
        self.classify(utterance)
    }

    fn strategy(&self) -> &'static str {
        "rule_based"
    }
}

fn classify_kind(text: &str, dates: &StayDates, filter: &ListingFilter) -> IntentKind {
    let k = &*KEYWORD_PATTERNS;
    let asks_when_to_book = k.when_to_book.is_match(text);
    let price_question =
        k.price.is_match(text) && filter.min_price.is_none() && filter.max_price.is_none();

    if k.booking.is_match(text) && !asks_when_to_book {
        IntentKind::Booking
    } else if asks_when_to_book || price_question {
        IntentKind::PricePredict
    } else if k.availability.is_match(text) && dates.check_in.is_some() {
        IntentKind::DateCheck
    } else if k.greeting.is_match(text) && text.split_whitespace().count() <= 6 {
        IntentKind::General
    } else {
        IntentKind::Search
    }
}

// ---- Titles ----

fn extract_title(text: &str, allow_clause: bool) -> Option<String> {
    for caps in TITLE_RE.captures_iter(text) {
        let Some(m) = caps.get(1) else { continue };
        let words: Vec<&str> = m.as_str().split_whitespace().collect();
        let start = words
            .iter()
            .position(|w| !LEADING_WORDS.contains(&w.to_ascii_lowercase().as_str()))
            .unwrap_or(words.len());
        let rest = &words[start..];
        // Need at least one name word ahead of the trailing number.
        if rest.len() < 2 || is_calendar_word(rest[0]) {
            continue;
        }
        return Some(rest.join(" "));
    }

    if !allow_clause {
        return None;
    }
    let clause = BOOK_CLAUSE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())?;
    let lowered = clause.to_ascii_lowercase();
    let first = lowered.split_whitespace().next().unwrap_or_default();
    if PRONOUNS.contains(&lowered.as_str())
        || !clause.chars().any(|c| c.is_ascii_digit())
        || is_calendar_word(first)
    {
        return None;
    }
    Some(clause)
}

fn is_calendar_word(word: &str) -> bool {
    month_number(word).is_some() || word.parse::<Weekday>().is_ok()
}

// ---- Dates ----

fn month_number(word: &str) -> Option<u32> {
    let lowered = word.trim_end_matches('.').to_ascii_lowercase();
    let prefix = lowered.get(..3)?;
    let month = match prefix {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    // Only accept real month spellings, not words that share a prefix.
    const NAMES: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ];
    let full = NAMES[month as usize - 1];
    full.starts_with(lowered.as_str()).then_some(month)
}

/// The next occurrence of month/day on or after `today`.
fn upcoming(today: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    match NaiveDate::from_ymd_opt(today.year(), month, day) {
        Some(d) if d >= today => Some(d),
        _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
    }
}

/// Month/day in the year of `start`, moved a year on if it falls before it.
fn following(start: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    let candidate = NaiveDate::from_ymd_opt(start.year(), month, day)?;
    if candidate < start {
        NaiveDate::from_ymd_opt(start.year() + 1, month, day)
    } else {
        Some(candidate)
    }
}

fn num(c: &Captures<'_>, group: usize) -> Option<u32> {
    c.get(group).and_then(|m| m.as_str().parse().ok())
}

fn month_at(c: &Captures<'_>, group: usize) -> Option<u32> {
    c.get(group).and_then(|m| month_number(m.as_str()))
}

fn range(check_in: Option<NaiveDate>, check_out: Option<NaiveDate>) -> Option<StayDates> {
    check_in.map(|ci| StayDates::new(Some(ci), check_out))
}

fn explicit_dates(text: &str, today: NaiveDate) -> Option<StayDates> {
    let p = &*DATE_PATTERNS;

    let iso: Vec<NaiveDate> = p
        .iso
        .captures_iter(text)
        .filter_map(|c| {
            NaiveDate::from_ymd_opt(c[1].parse().ok()?, num(&c, 2)?, num(&c, 3)?)
        })
        .collect();
    if let Some(first) = iso.first() {
        return Some(StayDates::new(Some(*first), iso.get(1).copied()));
    }

    if let Some(c) = p.month_range.captures(text) {
        let check_in = upcoming(today, month_at(&c, 1)?, num(&c, 2)?);
        let check_out = check_in.and_then(|ci| following(ci, month_at(&c, 3)?, num(&c, 4)?));
        if let Some(dates) = range(check_in, check_out) {
            return Some(dates);
        }
    }
    if let Some(c) = p.month_day_range.captures(text) {
        let month = month_at(&c, 1)?;
        let check_in = upcoming(today, month, num(&c, 2)?);
        let check_out = check_in.and_then(|ci| following(ci, month, num(&c, 3)?));
        if let Some(dates) = range(check_in, check_out) {
            return Some(dates);
        }
    }
    if let Some(c) = p.slash_range.captures(text) {
        let check_in = upcoming(today, num(&c, 1)?, num(&c, 2)?);
        let check_out = check_in.and_then(|ci| following(ci, num(&c, 3)?, num(&c, 4)?));
        if let Some(dates) = range(check_in, check_out) {
            return Some(dates);
        }
    }
    if let Some(c) = p.month_day.captures(text) {
        if let Some(d) = upcoming(today, month_at(&c, 1)?, num(&c, 2)?) {
            return Some(StayDates::new(Some(d), None));
        }
    }
    if let Some(c) = p.slash_day.captures(text) {
        if let Some(d) = upcoming(today, num(&c, 1)?, num(&c, 2)?) {
            return Some(StayDates::new(Some(d), None));
        }
    }
    None
}

fn days_until(today: NaiveDate, target: Weekday, allow_today: bool) -> i64 {
    let diff = (i64::from(target.num_days_from_monday()) - i64::from(today.weekday().num_days_from_monday()))
        .rem_euclid(7);
    if diff == 0 && !allow_today {
        7
    } else {
        diff
    }
}

fn relative_dates(text: &str, today: NaiveDate) -> Option<StayDates> {
    let p = &*DATE_PATTERNS;
    let on = |d: NaiveDate| Some(StayDates::new(Some(d), None));

    if p.tomorrow.is_match(text) {
        return on(today + Duration::days(1));
    }
    if p.today.is_match(text) {
        return on(today);
    }
    if let Some(c) = p.in_days.captures(text) {
        let n = num(&c, 1).or_else(|| num(&c, 2))?;
        return on(today + Duration::days(i64::from(n)));
    }
    if let Some(c) = p.next_weekday.captures(text) {
        let weekday: Weekday = c[1].parse().ok()?;
        return on(today + Duration::days(days_until(today, weekday, false)));
    }
    if let Some(c) = p.this_weekday.captures(text) {
        let weekday: Weekday = c[1].parse().ok()?;
        return on(today + Duration::days(days_until(today, weekday, true)));
    }
    if p.this_weekend.is_match(text) {
        let friday = today + Duration::days(days_until(today, Weekday::Fri, true));
        return Some(StayDates::new(Some(friday), Some(friday + Duration::days(2))));
    }
    if p.next_week.is_match(text) {
        return on(today + Duration::days(7));
    }
    None
}

/// Check-in and check-out stated in the text, resolved against `today`.
pub fn extract_dates(text: &str, today: NaiveDate) -> StayDates {
    let mut dates = explicit_dates(text, today)
        .or_else(|| relative_dates(text, today))
        .unwrap_or_default();

    if let (Some(check_in), None) = (dates.check_in, dates.check_out) {
        if let Some(nights) = DATE_PATTERNS.for_nights.captures(text).and_then(|c| num(&c, 1)) {
            dates.check_out = Some(check_in + Duration::days(i64::from(nights.max(1))));
        }
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use std::sync::Mutex;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Monday 2026-10-19.
    fn today() -> NaiveDate {
        date(2026, 10, 19)
    }

    fn rules() -> RuleBasedIntentParser {
        RuleBasedIntentParser::new(Clock::Fixed(today()))
    }

    struct ScriptedGenerator {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err("503".to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, ChatError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(ChatError::Generation)
        }
    }

    // ---- Generative ----

    #[tokio::test]
    async fn test_generative_parses_reasoning_and_json() {
        let generator = Arc::new(ScriptedGenerator::replying(
            "Reasoning:\nThe user names a listing and wants to book it.\n\nJSON:\n{\"type\": \"booking\", \"listingTitle\": \"Luxury Villa 1\", \"checkInDate\": \"2027-01-01\", \"checkOutDate\": \"2027-01-07\", \"enablePricePrediction\": false}",
        ));
        let parser = GenerativeIntentParser::new(generator.clone(), Clock::Fixed(today()));

        let intent = parser.parse("Book Luxury Villa 1, Jan 1 to Jan 7", "user: hi").await;
        assert_eq!(intent.kind, IntentKind::Booking);
        assert_eq!(intent.listing_title.as_deref(), Some("Luxury Villa 1"));
        assert_eq!(intent.check_in_date, Some(date(2027, 1, 1)));
        assert_eq!(intent.check_out_date, Some(date(2027, 1, 7)));
        assert_eq!(intent.reasoning, "The user names a listing and wants to book it.");

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("Today's date: 2026-10-19"));
        assert!(prompts[0].contains("user: hi"));
    }

    #[tokio::test]
    async fn test_generative_failure_degrades_to_search() {
        let parser =
            GenerativeIntentParser::new(Arc::new(ScriptedGenerator::failing()), Clock::Fixed(today()));
        let intent = parser.parse("beach house", "").await;
        assert_eq!(intent.kind, IntentKind::Search);
        assert_eq!(intent.search_query.as_deref(), Some("beach house"));
    }

    #[test]
    fn test_generated_text_without_json_is_search() {
        let intent = parse_generated_intent("I think they want a beach house.", "beach please");
        assert_eq!(intent.kind, IntentKind::Search);
        assert_eq!(intent.search_query.as_deref(), Some("beach please"));
    }

    #[test]
    fn test_generated_malformed_json_is_search() {
        let intent = parse_generated_intent("JSON: {\"type\": booking,}", "book it");
        assert_eq!(intent.kind, IntentKind::Search);
        assert_eq!(intent.search_query.as_deref(), Some("book it"));
    }

    #[test]
    fn test_generated_fenced_json_and_nulls() {
        let text = "```json\n{\"type\": \"date_check\", \"searchQuery\": null, \"listingTitle\": \"null\", \"checkInDate\": \"2026-12-20T00:00:00Z\"}\n```";
        let intent = parse_generated_intent(text, "free dec 20?");
        assert_eq!(intent.kind, IntentKind::DateCheck);
        assert!(intent.listing_title.is_none());
        assert_eq!(intent.check_in_date, Some(date(2026, 12, 20)));
        assert_eq!(intent.check_out_date, Some(date(2026, 12, 21)));
        assert_eq!(intent.reasoning, "Parsing intent...");
    }

    #[test]
    fn test_generated_unknown_type_is_search() {
        let intent = parse_generated_intent("{\"type\": \"weather\"}", "is it sunny");
        assert_eq!(intent.kind, IntentKind::Search);
        assert_eq!(intent.search_query.as_deref(), Some("is it sunny"));
    }

    #[test]
    fn test_generated_price_predict_enables_pricing() {
        let intent = parse_generated_intent(
            "{\"type\": \"price_predict\", \"enablePricePrediction\": \"false\"}",
            "price?",
        );
        assert!(intent.enable_price_prediction);
    }

    // ---- Rule-based: classification ----

    #[test]
    fn test_rules_booking_with_title_and_dates() {
        let intent = rules().classify("Book Luxury Villa 1, Jan 1 to Jan 7");
        assert_eq!(intent.kind, IntentKind::Booking);
        assert_eq!(intent.listing_title.as_deref(), Some("Luxury Villa 1"));
        assert_eq!(intent.check_in_date, Some(date(2027, 1, 1)));
        assert_eq!(intent.check_out_date, Some(date(2027, 1, 7)));
    }

    #[test]
    fn test_rules_price_question_with_title() {
        let intent = rules().classify("How much will Beach House 4 cost in July?");
        assert_eq!(intent.kind, IntentKind::PricePredict);
        assert_eq!(intent.listing_title.as_deref(), Some("Beach House 4"));
        assert!(intent.enable_price_prediction);
    }

    #[test]
    fn test_rules_when_to_book_is_price() {
        let intent = rules().classify("When is the best time to book?");
        assert_eq!(intent.kind, IntentKind::PricePredict);
        assert!(intent.listing_title.is_none());
    }

    #[test]
    fn test_rules_availability_with_dates() {
        let intent = rules().classify("Is Seaside Retreat 11 available Dec 20-23?");
        assert_eq!(intent.kind, IntentKind::DateCheck);
        assert_eq!(intent.check_in_date, Some(date(2026, 12, 20)));
        assert_eq!(intent.check_out_date, Some(date(2026, 12, 23)));
    }

    #[test]
    fn test_rules_price_filter_is_search() {
        let intent = rules().classify("beach houses with a price under $200");
        assert_eq!(intent.kind, IntentKind::Search);
    }

    #[test]
    fn test_rules_greeting_and_search() {
        assert_eq!(rules().classify("hello!").kind, IntentKind::General);
        let search = rules().classify("cheap beach houses");
        assert_eq!(search.kind, IntentKind::Search);
        assert_eq!(search.search_query.as_deref(), Some("cheap beach houses"));
        assert_eq!(rules().classify("Which is cheapest?").kind, IntentKind::Search);
    }

    #[test]
    fn test_rules_booking_pronoun_has_no_title() {
        let intent = rules().classify("book it for 3 nights");
        assert_eq!(intent.kind, IntentKind::Booking);
        assert!(intent.listing_title.is_none());
    }

    #[test]
    fn test_rules_lowercase_booking_clause() {
        let intent = rules().classify("please book seaside retreat 11 for next friday");
        assert_eq!(intent.listing_title.as_deref(), Some("seaside retreat 11"));
        assert_eq!(intent.check_in_date, Some(date(2026, 10, 23)));
    }

    #[test]
    fn test_rules_listing_id() {
        let intent = rules().classify("reserve Listing-007 please");
        assert_eq!(intent.listing_id.as_deref(), Some("listing-007"));
    }

    // ---- Rule-based: dates ----

    #[test]
    fn test_dates_iso() {
        let d = extract_dates("from 2026-11-02 to 2026-11-05", today());
        assert_eq!(d.range(), Some((date(2026, 11, 2), date(2026, 11, 5))));
    }

    #[test]
    fn test_dates_slash_range_rolls_to_next_year() {
        let d = extract_dates("3/1 to 3/5", today());
        assert_eq!(d.range(), Some((date(2027, 3, 1), date(2027, 3, 5))));
    }

    #[test]
    fn test_dates_range_across_new_year() {
        let d = extract_dates("Dec 30 to Jan 2", today());
        assert_eq!(d.range(), Some((date(2026, 12, 30), date(2027, 1, 2))));
    }

    #[test]
    fn test_dates_relative() {
        assert_eq!(extract_dates("tomorrow", today()).check_in, Some(date(2026, 10, 20)));
        assert_eq!(extract_dates("next friday", today()).check_in, Some(date(2026, 10, 23)));
        assert_eq!(extract_dates("next monday", today()).check_in, Some(date(2026, 10, 26)));
        assert_eq!(extract_dates("on monday", today()).check_in, Some(date(2026, 10, 19)));

        let d = extract_dates("in 3 days for 2 nights", today());
        assert_eq!(d.range(), Some((date(2026, 10, 22), date(2026, 10, 24))));

        let weekend = extract_dates("this weekend", today());
        assert_eq!(weekend.range(), Some((date(2026, 10, 23), date(2026, 10, 25))));
    }

    #[test]
    fn test_dates_single_day_defaults_one_night() {
        let intent = rules().classify("anything free Nov 3?");
        assert_eq!(intent.kind, IntentKind::DateCheck);
        assert_eq!(intent.check_in_date, Some(date(2026, 11, 3)));
        assert_eq!(intent.check_out_date, Some(date(2026, 11, 4)));
    }

    #[test]
    fn test_month_number_rejects_lookalikes() {
        assert_eq!(month_number("Sept"), Some(9));
        assert_eq!(month_number("march"), Some(3));
        assert_eq!(month_number("Marvel"), None);
        assert_eq!(month_number("Ju"), None);
    }

    #[test]
    fn test_normalize_dates() {
        let d = normalize_dates(StayDates::new(Some(date(2026, 5, 5)), Some(date(2026, 5, 1))));
        assert_eq!(d.check_out, Some(date(2026, 5, 6)));
        let only_out = normalize_dates(StayDates::new(None, Some(date(2026, 5, 1))));
        assert_eq!(only_out.check_in, None);
    }
}
