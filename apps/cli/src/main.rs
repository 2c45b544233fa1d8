#![deny(warnings)]

//! Headless CLI for the Cerebro Digital economy engine.
//!
//! Loads the snapshot (cloud first when an identity is configured), runs the
//! opportunistic timers, applies an optional purchase, wish-pricing, or
//! deck-drafting action, prints an economy summary, and persists everything
//! back.

use anyhow::Result;
use cerebro_advisor::Advisor;
use cerebro_core::RewardId;
use persistence::{Clock, CloudSync, HttpRemoteStore, JsonDirStore, SystemClock};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

// AI usage is paid for in credits, like any other reward sink.
const WISH_PRICING_FEE: u64 = 2;
const DECK_GENERATION_FEE: u64 = 10;
const DECK_SIZE: usize = 10;

struct Args {
    data_dir: String,
    user: Option<String>,
    buy: Option<String>,
    wish: Option<String>,
    deck: Option<String>,
}

fn parse_args() -> Args {
    let mut args = Args {
        data_dir: "./data".to_string(),
        user: None,
        buy: None,
        wish: None,
        deck: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--data-dir" => {
                if let Some(dir) = it.next() {
                    args.data_dir = dir;
                }
            }
            "--user" => args.user = it.next(),
            "--buy" => args.buy = it.next(),
            "--wish" => args.wish = it.next(),
            "--deck" => args.deck = it.next(),
            _ => {}
        }
    }
    args
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    info!(git = env!("GIT_SHA"), data_dir = %args.data_dir, "starting cerebro CLI");

    let clock = SystemClock;
    let now = clock.now();
    let today = now.date_naive();

    let store = JsonDirStore::open(&args.data_dir)?;
    let mut sync =
        HttpRemoteStore::from_env().map(|remote| CloudSync::new(remote, args.user.clone()));

    let mut snapshot = sync
        .as_ref()
        .and_then(|sync| sync.load_remote())
        .unwrap_or_else(|| persistence::load_snapshot(&store));

    let advisor = Advisor::from_env();

    // Opportunistic timers: streak settlement and economy decay run at load.
    cerebro_econ::daily_rollover(&mut snapshot.profile, &mut snapshot.habits, today);
    cerebro_econ::periodic_check(&mut snapshot.profile, &snapshot.rewards, &advisor, now);

    if let Some(wish) = &args.wish {
        match cerebro_econ::debit(&mut snapshot.profile, WISH_PRICING_FEE) {
            Ok(()) => {
                let quote = advisor.price_wish(wish, &snapshot.profile.goals);
                let reward = cerebro_advisor::reward_from_wish(wish, &quote);
                println!(
                    "Wish priced | {} -> {} credits ({})",
                    wish, reward.cost, quote.rationale
                );
                snapshot.rewards.push(reward);
            }
            Err(err) => println!("Wish pricing rejected: {err}"),
        }
    }

    if let Some(topic) = &args.deck {
        match cerebro_econ::debit(&mut snapshot.profile, DECK_GENERATION_FEE) {
            Ok(()) => {
                let pairs = advisor
                    .draft_flashcards(topic, DECK_SIZE)
                    .into_iter()
                    .map(|draft| (draft.front, draft.back));
                let cards = cerebro_study::cards_from_pairs(topic, pairs, now);
                println!("Deck {} | {} cards drafted", topic, cards.len());
                snapshot.flashcards.extend(cards);
            }
            Err(err) => println!("Deck generation rejected: {err}"),
        }
    }

    if let Some(id) = &args.buy {
        let id = RewardId(id.clone());
        match cerebro_econ::purchase(&mut snapshot.profile, &mut snapshot.rewards, &id, now) {
            Ok(receipt) => println!("Bought {} for {} credits", id.0, receipt.paid),
            Err(err) => println!("Purchase rejected: {err}"),
        }
    }

    let profile = &snapshot.profile;
    let cards_due: usize = cerebro_study::deck_summaries(&snapshot.flashcards, now)
        .iter()
        .map(|deck| deck.due)
        .sum();
    println!(
        "Profile OK | level: {} | credits: {} | xp: {} | freezes: {}",
        profile.level(),
        profile.credits,
        profile.total_xp,
        profile.streak_freezes
    );
    println!(
        "Economy | inflation: x{} | offers: {} | purchase streak: {} | cards due: {}",
        profile.economy.inflation_multiplier,
        profile.economy.active_discounts.len(),
        profile.economy.purchase_streak,
        cards_due
    );

    persistence::save_snapshot(&store, &snapshot);
    if let Some(sync) = sync.as_mut() {
        sync.mark_dirty(clock.now());
        // A run is also the reconnect point: push without waiting.
        sync.handle_reconnect(clock.now());
        sync.tick(&snapshot, clock.now());
    }

    Ok(())
}
