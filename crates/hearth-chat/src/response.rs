//! Assistant message composition.
//!
//! Plain-text templates for every turn outcome. Nothing here touches the
//! repository or a model; callers pass in the annotated listings.

use chrono::NaiveDate;

use crate::types::{AnnotatedListing, PriceTrend};

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("{} {}", count, one)
    } else {
        format!("{} {}", count, many)
    }
}

/// `Jan 1, 2027`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

// =============================================================================
// Search
// =============================================================================

pub fn found_listings(count: usize, follow_up: bool) -> String {
    let lead = if follow_up {
        format!(
            "Based on your previous search, here {} {}:",
            if count == 1 { "is" } else { "are" },
            plural(count, "matching property", "matching properties")
        )
    } else {
        format!("I found {} for you!", plural(count, "property", "properties"))
    };
    format!(
        "{}\n\nOpen a property card for details and booking.\nYou can also ask: \"Which is cheapest?\" or \"When is the best time to book?\"",
        lead
    )
}

pub fn no_results() -> String {
    "Sorry, I couldn't find properties matching your criteria. Try:\n\n\
     - \"Beach houses\"\n\
     - \"Budget-friendly properties\"\n\
     - \"Large family houses\"\n\
     - \"Luxury villas with pool\"\n\n\
     You can also:\n\
     - Give dates: \"What's available Jan 1-7?\"\n\
     - Ask about pricing: \"When is the cheapest time to book?\"\n\
     - Book directly: \"Book [property name]\""
        .to_string()
}

/// Candidates were found but every one conflicts with the requested dates.
pub fn none_available(candidates: usize) -> String {
    format!(
        "I found {} but none are available for your dates.\n\nTry different dates or a broader search.",
        plural(candidates, "matching property", "matching properties")
    )
}

pub fn general_error() -> String {
    "Sorry, I ran into a problem. Please try again or rephrase.\n\n\
     Common queries:\n\
     - \"Find beach houses\"\n\
     - \"Available Jan 1-7?\"\n\
     - \"When is the cheapest time to book?\""
        .to_string()
}

// =============================================================================
// Date check
// =============================================================================

pub fn missing_dates() -> String {
    "Which dates would you like to check? For example: \"What's available Jan 1-7?\"".to_string()
}

pub fn date_check_result(check_in: NaiveDate, check_out: NaiveDate, count: usize) -> String {
    if count == 0 {
        return format!(
            "Availability for {} to {}:\n\nNothing is free for those dates. Try shifting your stay or shortening it.",
            format_date(check_in),
            format_date(check_out)
        );
    }
    format!(
        "Availability for {} to {}:\n\nFound {} available.\n\nOpen a card to view details.",
        format_date(check_in),
        format_date(check_out),
        plural(count, "property", "properties")
    )
}

// =============================================================================
// Price prediction
// =============================================================================

/// Narrative for one listing, chosen by its dominant price trend.
pub fn single_price_analysis(listing: &AnnotatedListing) -> String {
    let title = &listing.listing.title;
    let mut msg = format!("Price analysis: {}\n\n", title);

    let Some(info) = listing
        .availability
        .as_ref()
        .and_then(|a| a.price_info.as_ref())
    else {
        msg.push_str(&format!(
            "Base price: ${}/night\n\nNo price changes expected.",
            listing.listing.price
        ));
        return msg;
    };

    msg.push_str(&format!("Base price: ${}/night\n\n", info.base_price));
    msg.push_str("Best time to book:\n\n");

    match info.trend {
        PriceTrend::EarlyBird => {
            msg.push_str(&format!(
                "Book now for the early-bird discount: ${}/night ({})\n\n",
                info.predicted_price, info.price_change
            ));
            msg.push_str("For reference:\n");
            msg.push_str("- Summer (Jun-Sep): +30%\n");
            msg.push_str("- Weekends: +15%\n");
            msg.push_str("- Last minute (within 7 days): -10%\n\n");
            msg.push_str("Booking early locks in the discount.");
        }
        PriceTrend::Peak | PriceTrend::Holiday => {
            msg.push_str(&format!(
                "{}: ${}/night ({})\n\n",
                info.trend_label, info.predicted_price, info.price_change
            ));
            msg.push_str("Travelling off-season avoids the surcharge.");
        }
        PriceTrend::Weekend => {
            msg.push_str(&format!(
                "Weekend premium (+15%): ${}/night on Fri/Sat\n\n",
                info.predicted_price
            ));
            msg.push_str("Arriving Sunday to Thursday saves 15%.");
        }
        PriceTrend::LastMinute => {
            msg.push_str(&format!(
                "Last-minute deal (-10%): ${}/night\n\n",
                info.predicted_price
            ));
            msg.push_str("If your dates are flexible, short-notice stays are cheaper.");
        }
        PriceTrend::Stable => {
            msg.push_str(&format!("Stable pricing: ${}/night\n\n", info.predicted_price));
            msg.push_str("Book any time; the price is not expected to change.");
        }
    }

    msg.push_str(&format!("\n\nReady? Say: \"Book {}, [dates]\"", title));
    msg
}

/// Trend table for several listings.
pub fn multi_price_analysis(listings: &[AnnotatedListing], from_context: bool) -> String {
    let mut msg = String::from("Price trend analysis:\n\n");
    if from_context {
        msg.push_str(&format!(
            "Based on your previous search ({}):\n\n",
            plural(listings.len(), "property", "properties")
        ));
    } else {
        msg.push_str(&format!(
            "Analyzed {}:\n\n",
            plural(listings.len(), "property", "properties")
        ));
    }

    let priced = listings.iter().filter_map(|l| {
        l.availability
            .as_ref()
            .and_then(|a| a.price_info.as_ref())
            .map(|info| (l, info))
    });
    for (idx, (listing, info)) in priced.enumerate() {
        let direction = if info.price_change.starts_with('+') {
            "up"
        } else if info.price_change.starts_with('-') {
            "down"
        } else {
            "flat"
        };
        msg.push_str(&format!(
            "{}. {}\n   {} ({}, {})\n   Was ${} -> Now ${}/night\n\n",
            idx + 1,
            listing.listing.title,
            info.trend_label,
            direction,
            info.price_change,
            info.base_price,
            info.predicted_price
        ));
    }

    msg.push_str("Open a card for details.");
    msg
}

// =============================================================================
// Booking
// =============================================================================

pub fn booking_prompt() -> String {
    "Booking assistant:\n\nSearch for properties first, then say:\n\n\
     \"Book [property name]\"\n\n\
     Example: \"Book Luxury Villa 1\""
        .to_string()
}

pub fn listing_not_found(title: &str, suggestions: &[String]) -> String {
    let mut msg = format!("Sorry, I couldn't find \"{}\".\n\n", title);
    if suggestions.is_empty() {
        msg.push_str("Search first, then book.");
        return msg;
    }
    msg.push_str("From your last search:\n\n");
    for (idx, s) in suggestions.iter().enumerate() {
        msg.push_str(&format!("{}. {}\n", idx + 1, s));
    }
    msg.push_str("\nTell me: \"Book [property name]\"");
    msg
}

/// A booking request that named nothing while several results are on screen.
pub fn choose_listing(suggestions: &[String]) -> String {
    let mut msg = String::from("Which property would you like to book?\n\n");
    for (idx, s) in suggestions.iter().enumerate() {
        msg.push_str(&format!("{}. {}\n", idx + 1, s));
    }
    msg.push_str("\nTell me: \"Book [property name]\"");
    msg
}

/// Booking summary. The reservation itself is completed elsewhere.
pub fn booking_confirmation(
    listing: &AnnotatedListing,
    check_in: Option<NaiveDate>,
    check_out: Option<NaiveDate>,
) -> String {
    let title = &listing.listing.title;
    let mut msg = format!("Great choice! Booking {}:\n\n", title);
    if !listing.listing.location_value.is_empty() {
        msg.push_str(&format!("Location: {}\n\n", listing.listing.location_value));
    }

    match (check_in, check_out) {
        (Some(check_in), Some(check_out)) => {
            let nights = (check_out - check_in).num_days().max(1) as usize;
            msg.push_str(&format!("Check-in: {}\n", format_date(check_in)));
            msg.push_str(&format!("Check-out: {}\n", format_date(check_out)));
            msg.push_str(&format!("{}\n\n", plural(nights, "night", "nights")));

            if let Some(availability) = &listing.availability {
                if let Some(info) = &availability.price_info {
                    msg.push_str(&format!("Rate: ${}/night\n", info.predicted_price));
                    msg.push_str(&format!("Pricing: {}\n", info.trend_label));
                }
                msg.push_str(&format!("Total: ${}\n\n", availability.total_price));
            }
        }
        _ => {
            msg.push_str("No dates selected yet.\n\n");
            msg.push_str(&format!(
                "Please tell me your dates, e.g. \"Book {}, Jan 1-7\"\n\n",
                title
            ));
        }
    }

    msg.push_str("Open the property card to complete the booking.");
    msg
}

pub fn booking_unavailable(title: &str, conflicts: &[String]) -> String {
    let detail = if conflicts.is_empty() {
        "Those dates are taken.".to_string()
    } else {
        format!("Already booked: {}", conflicts.join(", "))
    };
    format!(
        "Sorry, {} is unavailable for the selected dates.\n\n{}\n\nWould you like to try different dates or other properties?",
        title, detail
    )
}
