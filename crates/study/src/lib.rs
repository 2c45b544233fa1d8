#![deny(warnings)]

//! Spaced-repetition scheduling for flashcard decks.
//!
//! A simplified SM-2 variant: each card carries an interval in days and an
//! ease factor; a single review rating adjusts both and stamps the next
//! review time. No historical performance statistics are retained.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use cerebro_core::{Flashcard, ReviewRating, EASE_FLOOR, EASE_START};

// Interval tuning. An interval of 0 days marks a new or just-failed card.
const FIRST_INTERVAL_GOOD_DAYS: f64 = 1.0;
const FIRST_INTERVAL_EASY_DAYS: f64 = 4.0;
const EASY_GROWTH_BONUS: f64 = 1.3;
const EASE_HARD_PENALTY: f64 = 0.2;
const EASE_EASY_BONUS: f64 = 0.15;
const MS_PER_DAY: f64 = 86_400_000.0;

/// A fresh card, due immediately.
pub fn new_card(
    deck_id: impl Into<String>,
    front: impl Into<String>,
    back: impl Into<String>,
    now: DateTime<Utc>,
) -> Flashcard {
    Flashcard {
        id: Uuid::new_v4().to_string(),
        deck_id: deck_id.into(),
        front: front.into(),
        back: back.into(),
        next_review: now,
        interval_days: 0.0,
        ease_factor: EASE_START,
    }
}

/// Materialize drafted front/back pairs into scheduled cards of one deck.
pub fn cards_from_pairs(
    deck_id: &str,
    pairs: impl IntoIterator<Item = (String, String)>,
    now: DateTime<Utc>,
) -> Vec<Flashcard> {
    pairs
        .into_iter()
        .map(|(front, back)| new_card(deck_id, front, back, now))
        .collect()
}

/// Apply a review rating: adjust interval and ease, stamp the next review.
///
/// The ease factor never drops below [`EASE_FLOOR`]; an `Easy` rating always
/// raises it.
pub fn review(card: &mut Flashcard, rating: ReviewRating, now: DateTime<Utc>) {
    let (old_interval, old_ease) = (card.interval_days, card.ease_factor);
    match rating {
        ReviewRating::Hard => {
            card.interval_days = 0.0;
            card.ease_factor = (card.ease_factor - EASE_HARD_PENALTY).max(EASE_FLOOR);
        }
        ReviewRating::Good => {
            card.interval_days = if card.interval_days == 0.0 {
                FIRST_INTERVAL_GOOD_DAYS
            } else {
                card.interval_days * card.ease_factor
            };
        }
        ReviewRating::Easy => {
            card.interval_days = if card.interval_days == 0.0 {
                FIRST_INTERVAL_EASY_DAYS
            } else {
                card.interval_days * card.ease_factor * EASY_GROWTH_BONUS
            };
            card.ease_factor += EASE_EASY_BONUS;
        }
    }
    card.next_review = now + Duration::milliseconds((card.interval_days * MS_PER_DAY) as i64);
    debug!(
        card = %card.id,
        "review: ease {:.2} -> {:.2}, interval {:.1}d -> {:.1}d",
        old_ease,
        card.ease_factor,
        old_interval,
        card.interval_days
    );
}

/// A card is due once its scheduled review time has passed.
pub fn is_due(card: &Flashcard, now: DateTime<Utc>) -> bool {
    card.next_review <= now
}

/// Ids of the due cards of one deck, in stored order. Cards that are not due
/// are invisible to a review session.
pub fn due_ids(cards: &[Flashcard], deck_id: &str, now: DateTime<Utc>) -> Vec<String> {
    cards
        .iter()
        .filter(|c| c.deck_id == deck_id && is_due(c, now))
        .map(|c| c.id.clone())
        .collect()
}

/// Per-deck card counts for the deck listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeckSummary {
    pub deck_id: String,
    pub total: usize,
    pub due: usize,
}

/// Summarize all decks present in the card set, ordered by deck id.
pub fn deck_summaries(cards: &[Flashcard], now: DateTime<Utc>) -> Vec<DeckSummary> {
    let mut decks: std::collections::BTreeMap<&str, (usize, usize)> =
        std::collections::BTreeMap::new();
    for card in cards {
        let entry = decks.entry(card.deck_id.as_str()).or_insert((0, 0));
        entry.0 += 1;
        if is_due(card, now) {
            entry.1 += 1;
        }
    }
    decks
        .into_iter()
        .map(|(deck_id, (total, due))| DeckSummary {
            deck_id: deck_id.to_string(),
            total,
            due,
        })
        .collect()
}
