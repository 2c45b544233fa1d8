#![deny(warnings)]

//! Core domain models and invariants for Cerebro Digital.
//!
//! This crate defines the serializable types shared across the engine with
//! validation helpers to guarantee basic invariants, plus the load-time
//! normalization that repairs partial or stale snapshots instead of failing.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use uuid::Uuid;

/// XP required per user level; level = total_xp / 1000 + 1, uncapped.
pub const XP_PER_LEVEL: u64 = 1_000;

/// Credits a freshly created profile starts with.
pub const STARTING_CREDITS: u64 = 1_000;

/// Catalog id of the streak-freeze item, routed to `streak_freezes` instead
/// of the generic inventory map.
pub const STREAK_FREEZE_ID: &str = "sys_freeze";

/// Starting ease factor for a new flashcard.
pub const EASE_START: f64 = 2.5;

/// Hard floor for a flashcard's ease factor.
pub const EASE_FLOOR: f64 = 1.3;

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

fn default_ease() -> f64 {
    EASE_START
}

/// Unique identifier for a catalog reward, e.g. "potion_health".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RewardId(pub String);

/// Effort class of a task or habit, driving its base payout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Base credit/XP payout for completing work of this difficulty.
    pub fn base_reward(self) -> u64 {
        match self {
            Difficulty::Easy => 5,
            Difficulty::Medium => 10,
            Difficulty::Hard => 20,
        }
    }
}

/// Focus-garden tree attached to a tree-type reward.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeSpec {
    pub name: String,
    pub emoji: String,
    /// Minimum focus-session length this tree requires, in minutes.
    pub min_minutes: u32,
    /// One-time permanent unlock; set by purchase, never cleared.
    pub unlocked: bool,
}

/// Kind of catalog reward. Tree rewards carry their tree data so a tree
/// without it is unrepresentable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RewardKind {
    #[default]
    General,
    Consumable,
    Tree {
        tree: TreeSpec,
    },
}

/// A purchasable catalog item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    pub name: String,
    /// Base price in credits, before inflation and discounts (>= 1).
    pub cost: u64,
    #[serde(default)]
    pub icon: String,
    /// Flavor/effect text shown when the item is used.
    #[serde(default)]
    pub effect: Option<String>,
    /// Minimum user level required to buy, if gated.
    #[serde(default)]
    pub unlock_level: Option<u64>,
    #[serde(default)]
    pub kind: RewardKind,
}

impl Reward {
    /// A user-priced custom wish added to the catalog as a general item.
    pub fn custom(name: impl Into<String>, cost: u64, icon: impl Into<String>) -> Self {
        Self {
            id: RewardId(Uuid::new_v4().to_string()),
            name: name.into(),
            cost,
            icon: icon.into(),
            effect: None,
            unlock_level: None,
            kind: RewardKind::General,
        }
    }

    pub fn is_streak_freeze(&self) -> bool {
        self.id.0 == STREAK_FREEZE_ID
    }

    pub fn tree(&self) -> Option<&TreeSpec> {
        match &self.kind {
            RewardKind::Tree { tree } => Some(tree),
            _ => None,
        }
    }
}

/// Dynamic-pricing state attached to a profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyStats {
    /// Economy-wide price multiplier, kept within [1.0, 2.0].
    pub inflation_multiplier: Decimal,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_purchase: DateTime<Utc>,
    pub purchase_streak: u64,
    /// Reward ids currently on special offer.
    pub active_discounts: BTreeSet<RewardId>,
}

impl Default for EconomyStats {
    fn default() -> Self {
        Self {
            inflation_multiplier: Decimal::ONE,
            last_purchase: epoch(),
            purchase_streak: 0,
            active_discounts: BTreeSet::new(),
        }
    }
}

/// Singleton per-user state: balance, progression, and owned items.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub name: String,
    /// Free-text goals, forwarded to the AI advisor as context.
    pub goals: String,
    pub credits: u64,
    /// Cumulative, monotonically non-decreasing experience points.
    pub total_xp: u64,
    pub streak_freezes: u64,
    /// Item name -> owned count; zero-count keys are removed, never stored.
    pub inventory: BTreeMap<String, u64>,
    pub economy: EconomyStats,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: "user".to_string(),
            goals: String::new(),
            credits: STARTING_CREDITS,
            total_xp: 0,
            streak_freezes: 0,
            inventory: BTreeMap::new(),
            economy: EconomyStats::default(),
        }
    }
}

impl UserProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Current level, derived from XP on every call and never stored.
    pub fn level(&self) -> u64 {
        self.total_xp / XP_PER_LEVEL + 1
    }

    /// Load-time repair: clamp economy state into range and drop empty
    /// inventory entries left behind by older snapshots.
    pub fn normalize(&mut self) {
        self.economy.inflation_multiplier = self
            .economy
            .inflation_multiplier
            .clamp(Decimal::ONE, Decimal::TWO);
        self.inventory.retain(|_, count| *count > 0);
    }
}

/// A flashcard scheduled by the spaced-repetition engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub deck_id: String,
    pub front: String,
    pub back: String,
    #[serde(default = "epoch", with = "chrono::serde::ts_milliseconds")]
    pub next_review: DateTime<Utc>,
    /// Days until the next review; 0 marks a new or failed card.
    #[serde(default)]
    pub interval_days: f64,
    #[serde(default = "default_ease")]
    pub ease_factor: f64,
}

impl Flashcard {
    /// Load-time repair for scheduling fields of older or malformed cards.
    pub fn normalize(&mut self) {
        if !self.interval_days.is_finite() || self.interval_days < 0.0 {
            self.interval_days = 0.0;
        }
        if !self.ease_factor.is_finite() {
            self.ease_factor = EASE_START;
        } else if self.ease_factor < EASE_FLOOR {
            self.ease_factor = EASE_FLOOR;
        }
    }
}

/// How the user graded themselves on a card review.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewRating {
    Hard,
    Good,
    Easy,
}

/// A one-off to-do that pays credits and XP on first completion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    pub difficulty: Difficulty,
    pub reward_value: u64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default = "epoch", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(text: impl Into<String>, difficulty: Difficulty, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            difficulty,
            reward_value: difficulty.base_reward(),
            completed: false,
            created_at: now,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitKind {
    #[default]
    Good,
    Bad,
}

/// A recurring habit with a day-over-day streak.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub kind: HabitKind,
    pub difficulty: Difficulty,
    pub reward_value: u64,
    #[serde(default)]
    pub streak: u64,
    #[serde(default)]
    pub last_completed: Option<NaiveDate>,
    /// Completed today; reset by the daily rollover.
    #[serde(default)]
    pub completed: bool,
    #[serde(default = "epoch", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Habit {
    pub fn new(
        label: impl Into<String>,
        icon: impl Into<String>,
        kind: HabitKind,
        difficulty: Difficulty,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label: label.into(),
            icon: icon.into(),
            kind,
            difficulty,
            reward_value: difficulty.base_reward(),
            streak: 0,
            last_completed: None,
            completed: false,
            created_at: now,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeKind {
    Health,
    Learning,
    #[default]
    General,
}

/// A time-boxed challenge paying a fixed credit reward.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: ChallengeKind,
    pub duration_days: u32,
    pub reward_credits: u64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default = "epoch", with = "chrono::serde::ts_milliseconds")]
    pub deadline: DateTime<Utc>,
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Names must be non-empty after trimming.
    #[error("name must not be empty")]
    EmptyName,
    /// Base prices must be at least 1 credit.
    #[error("reward {0} has zero cost")]
    ZeroCost(String),
    /// Catalog ids must be unique.
    #[error("duplicate reward id: {0}")]
    DuplicateReward(String),
    /// Inflation multiplier must stay within [1.0, 2.0].
    #[error("inflation multiplier {0} out of [1.0, 2.0]")]
    InflationOutOfRange(Decimal),
    /// Inventory never retains zero-count entries.
    #[error("inventory entry {0} has zero count")]
    ZeroInventoryCount(String),
    /// Numeric field must be finite.
    #[error("non-finite numeric value encountered")]
    NonFinite,
    /// Ease factor floor is 1.3.
    #[error("ease factor {0} below floor")]
    EaseBelowFloor(f64),
    /// Review intervals are non-negative day counts.
    #[error("negative review interval {0}")]
    NegativeInterval(f64),
}

/// Validate a single catalog reward.
pub fn validate_reward(reward: &Reward) -> Result<(), ValidationError> {
    if reward.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if reward.cost == 0 {
        return Err(ValidationError::ZeroCost(reward.id.0.clone()));
    }
    Ok(())
}

/// Validate the catalog, including id uniqueness.
pub fn validate_catalog(catalog: &[Reward]) -> Result<(), ValidationError> {
    let mut ids: BTreeSet<&RewardId> = BTreeSet::new();
    for reward in catalog {
        validate_reward(reward)?;
        if !ids.insert(&reward.id) {
            return Err(ValidationError::DuplicateReward(reward.id.0.clone()));
        }
    }
    Ok(())
}

/// Validate profile invariants.
pub fn validate_profile(profile: &UserProfile) -> Result<(), ValidationError> {
    let mult = profile.economy.inflation_multiplier;
    if mult < Decimal::ONE || mult > Decimal::TWO {
        return Err(ValidationError::InflationOutOfRange(mult));
    }
    for (name, count) in &profile.inventory {
        if *count == 0 {
            return Err(ValidationError::ZeroInventoryCount(name.clone()));
        }
    }
    Ok(())
}

/// Validate a flashcard's scheduling fields.
pub fn validate_flashcard(card: &Flashcard) -> Result<(), ValidationError> {
    if !card.interval_days.is_finite() || !card.ease_factor.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    if card.interval_days < 0.0 {
        return Err(ValidationError::NegativeInterval(card.interval_days));
    }
    if card.ease_factor < EASE_FLOOR {
        return Err(ValidationError::EaseBelowFloor(card.ease_factor));
    }
    Ok(())
}

/// Starter shop contents for a fresh install.
pub fn seed_catalog() -> Vec<Reward> {
    vec![
        Reward {
            id: RewardId("potion_health".to_string()),
            name: "health potion".to_string(),
            cost: 100,
            icon: "🧪".to_string(),
            effect: Some("Restores vitality".to_string()),
            unlock_level: None,
            kind: RewardKind::Consumable,
        },
        Reward {
            id: RewardId("shield_gold".to_string()),
            name: "golden shield".to_string(),
            cost: 250,
            icon: "🛡️".to_string(),
            effect: Some("Divine protection".to_string()),
            unlock_level: None,
            kind: RewardKind::General,
        },
        Reward {
            id: RewardId(STREAK_FREEZE_ID.to_string()),
            name: "streak freeze".to_string(),
            cost: 150,
            icon: "❄️".to_string(),
            effect: Some("Saves a habit streak when a day is missed".to_string()),
            unlock_level: None,
            kind: RewardKind::Consumable,
        },
        Reward {
            id: RewardId("tree_oak".to_string()),
            name: "mystic oak".to_string(),
            cost: 500,
            icon: "🌳".to_string(),
            effect: None,
            unlock_level: None,
            kind: RewardKind::Tree {
                tree: TreeSpec {
                    name: "Mystic Oak".to_string(),
                    emoji: "🌳".to_string(),
                    min_minutes: 25,
                    unlocked: false,
                },
            },
        },
        Reward {
            id: RewardId("tree_pine".to_string()),
            name: "starter pine".to_string(),
            cost: 50,
            icon: "🌲".to_string(),
            effect: None,
            unlock_level: None,
            kind: RewardKind::Tree {
                tree: TreeSpec {
                    name: "Pine".to_string(),
                    emoji: "🌲".to_string(),
                    min_minutes: 10,
                    unlocked: true,
                },
            },
        },
        Reward {
            id: RewardId("sword_fire".to_string()),
            name: "fire sword".to_string(),
            cost: 300,
            icon: "🔥".to_string(),
            effect: Some("+10 attack".to_string()),
            unlock_level: None,
            kind: RewardKind::General,
        },
        Reward {
            id: RewardId("amulet_luck".to_string()),
            name: "lucky amulet".to_string(),
            cost: 120,
            icon: "🍀".to_string(),
            effect: Some("+5 luck".to_string()),
            unlock_level: None,
            kind: RewardKind::General,
        },
    ]
}
