#![deny(warnings)]

//! Economy and progression rules for Cerebro Digital.
//!
//! This crate implements the credit ledger, the XP/level tracker, the
//! dynamic pricing engine (inflation, decay, special offers), inventory
//! consumption, and the atomic purchase transaction, plus the earning rules
//! that feed credits and XP into a profile.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use tracing::{debug, info};

use cerebro_core::{
    Challenge, EconomyStats, Habit, HabitKind, Reward, RewardId, RewardKind, Task, UserProfile,
};

/// At most this many catalog items can be on special offer at once.
pub const MAX_ACTIVE_DISCOUNTS: usize = 2;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Errors produced by economy operations. All of them are user-correctable
/// rejections; none mutate state.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// The balance cannot cover the requested amount.
    #[error("insufficient credits: need {needed}, have {available}")]
    InsufficientCredits { needed: u64, available: u64 },
    /// The reward id is not in the catalog.
    #[error("unknown reward: {0}")]
    UnknownReward(String),
    /// The item is not present in the inventory.
    #[error("not in inventory: {0}")]
    ItemNotOwned(String),
    /// The reward is gated behind a higher user level.
    #[error("requires level {required}, currently level {current}")]
    LevelLocked { required: u64, current: u64 },
    /// One-time tree unlocks cannot be bought twice.
    #[error("tree already unlocked: {0}")]
    AlreadyUnlocked(String),
}

/// Raised when an XP grant pushes the profile across a level boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelUp {
    pub new_level: u64,
}

// --- Currency ledger ---

/// Add credits to the balance. No upper bound.
pub fn credit(profile: &mut UserProfile, amount: u64) {
    profile.credits = profile.credits.saturating_add(amount);
    debug!(amount, balance = profile.credits, "credit");
}

/// Remove credits, rejecting the whole operation when the balance is short.
pub fn debit(profile: &mut UserProfile, amount: u64) -> Result<(), EconError> {
    if profile.credits < amount {
        return Err(EconError::InsufficientCredits {
            needed: amount,
            available: profile.credits,
        });
    }
    profile.credits -= amount;
    debug!(amount, balance = profile.credits, "debit");
    Ok(())
}

/// Penalty path: remove up to `amount`, clamping at zero. Returns the amount
/// actually taken.
pub fn force_debit(profile: &mut UserProfile, amount: u64) -> u64 {
    let taken = amount.min(profile.credits);
    profile.credits -= taken;
    debug!(taken, balance = profile.credits, "forced debit");
    taken
}

// --- XP / level tracker ---

/// Accumulate XP. Emits a [`LevelUp`] iff the grant crosses a level boundary.
pub fn add_xp(profile: &mut UserProfile, amount: u64) -> Option<LevelUp> {
    let old_level = profile.level();
    profile.total_xp = profile.total_xp.saturating_add(amount);
    let new_level = profile.level();
    if new_level > old_level {
        info!(new_level, total_xp = profile.total_xp, "level up");
        return Some(LevelUp { new_level });
    }
    None
}

/// Pay out an effort reward: the same amount in credits and in XP.
pub fn earn(profile: &mut UserProfile, amount: u64) -> Option<LevelUp> {
    credit(profile, amount);
    add_xp(profile, amount)
}

// --- Dynamic pricing engine ---

/// Current price of a reward under inflation and any active discount.
///
/// Rounds half-away-from-zero at each step. For any cost >= 2 the discounted
/// price is strictly below the undiscounted one.
pub fn effective_price(reward: &Reward, stats: &EconomyStats) -> u64 {
    let mut price = (Decimal::from(reward.cost) * stats.inflation_multiplier)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    if stats.active_discounts.contains(&reward.id) {
        price = (price * Decimal::new(7, 1))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    }
    price.to_u64().unwrap_or(u64::MAX)
}

/// Inflation bump applied by every purchase.
pub fn record_purchase(stats: &mut EconomyStats, now: DateTime<Utc>) {
    stats.inflation_multiplier =
        (stats.inflation_multiplier + Decimal::new(5, 2)).min(Decimal::TWO);
    stats.last_purchase = now;
    stats.purchase_streak += 1;
}

/// Selects catalog items to put on special offer for a lapsed user.
///
/// Implementations must fail closed: an empty pick is always acceptable and
/// the economy never blocks on this collaborator.
pub trait DiscountPicker {
    fn pick_discounts(&self, profile: &UserProfile, catalog: &[Reward]) -> Vec<RewardId>;
}

/// Null picker for offline operation and tests.
pub struct NoDiscounts;

impl DiscountPicker for NoDiscounts {
    fn pick_discounts(&self, _profile: &UserProfile, _catalog: &[Reward]) -> Vec<RewardId> {
        Vec::new()
    }
}

/// Opportunistic timer, run at load/sync time: decays inflation after three
/// idle days and asks the picker for special offers, or clears offers once
/// the user has been active again.
///
/// Stale discount ids no longer present in the catalog are pruned here;
/// [`effective_price`] trusts the set as-is.
pub fn periodic_check(
    profile: &mut UserProfile,
    catalog: &[Reward],
    picker: &dyn DiscountPicker,
    now: DateTime<Utc>,
) {
    let idle_days =
        (now - profile.economy.last_purchase).num_milliseconds() as f64 / MS_PER_DAY;
    if idle_days > 3.0 && profile.economy.inflation_multiplier > Decimal::ONE {
        profile.economy.inflation_multiplier =
            (profile.economy.inflation_multiplier - Decimal::new(2, 1)).max(Decimal::ONE);
        profile
            .economy
            .active_discounts
            .retain(|id| catalog.iter().any(|r| &r.id == id));
        if profile.economy.active_discounts.is_empty() {
            let picked = picker.pick_discounts(profile, catalog);
            profile.economy.active_discounts = picked
                .into_iter()
                .filter(|id| catalog.iter().any(|r| &r.id == id))
                .take(MAX_ACTIVE_DISCOUNTS)
                .collect();
            info!(
                offers = profile.economy.active_discounts.len(),
                multiplier = %profile.economy.inflation_multiplier,
                "inflation decayed for idle user"
            );
        }
    } else if idle_days > 1.0 {
        profile.economy.active_discounts.clear();
    }
}

// --- Inventory store ---

/// Use one unit of an owned item. Returns the remaining count; the key is
/// removed entirely when the last unit is consumed. Applying the item's
/// effect is the caller's concern.
pub fn consume_item(profile: &mut UserProfile, name: &str) -> Result<u64, EconError> {
    let Some(count) = profile.inventory.get_mut(name) else {
        return Err(EconError::ItemNotOwned(name.to_string()));
    };
    *count -= 1;
    let remaining = *count;
    if remaining == 0 {
        profile.inventory.remove(name);
    }
    debug!(item = name, remaining, "item consumed");
    Ok(remaining)
}

// --- Purchase transaction ---

/// What a successful purchase granted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PurchaseOutcome {
    AddedToInventory { item: String, count: u64 },
    StreakFreezeBanked { total: u64 },
    TreeUnlocked { id: RewardId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub paid: u64,
    pub outcome: PurchaseOutcome,
}

/// Buy a catalog item. Every check runs before any mutation, so a rejected
/// purchase leaves the profile and catalog untouched; a successful one
/// debits, bumps inflation, and grants the item as one unit.
pub fn purchase(
    profile: &mut UserProfile,
    catalog: &mut [Reward],
    id: &RewardId,
    now: DateTime<Utc>,
) -> Result<Receipt, EconError> {
    let idx = catalog
        .iter()
        .position(|r| &r.id == id)
        .ok_or_else(|| EconError::UnknownReward(id.0.clone()))?;
    if let Some(required) = catalog[idx].unlock_level {
        let current = profile.level();
        if current < required {
            return Err(EconError::LevelLocked { required, current });
        }
    }
    if catalog[idx].tree().is_some_and(|t| t.unlocked) {
        return Err(EconError::AlreadyUnlocked(id.0.clone()));
    }
    let price = effective_price(&catalog[idx], &profile.economy);
    if profile.credits < price {
        return Err(EconError::InsufficientCredits {
            needed: price,
            available: profile.credits,
        });
    }

    profile.credits -= price;
    record_purchase(&mut profile.economy, now);
    let outcome = if catalog[idx].is_streak_freeze() {
        profile.streak_freezes += 1;
        PurchaseOutcome::StreakFreezeBanked {
            total: profile.streak_freezes,
        }
    } else if let RewardKind::Tree { tree } = &mut catalog[idx].kind {
        tree.unlocked = true;
        PurchaseOutcome::TreeUnlocked { id: id.clone() }
    } else {
        let key = capitalize(&catalog[idx].name);
        let count = profile.inventory.entry(key.clone()).or_insert(0);
        *count += 1;
        PurchaseOutcome::AddedToInventory {
            item: key,
            count: *count,
        }
    };
    info!(reward = %id.0, paid = price, "purchase complete");
    Ok(Receipt { paid: price, outcome })
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// --- Earning rules ---

/// Habit payout scaled by the running streak, saturating at x1.5.
pub fn habit_reward(base: u64, streak: u64) -> u64 {
    let multiplier = (1.0 + 0.05 * streak as f64).min(1.5);
    (base as f64 * multiplier).round() as u64
}

/// Credits/XP for a finished focus session.
pub fn focus_reward(minutes: u64) -> u64 {
    minutes.saturating_mul(2)
}

/// Credits/XP for a finished training session.
pub fn training_reward(minutes: u64) -> u64 {
    minutes.saturating_mul(3)
}

/// Abandoning a focus session costs its planned length in credits, clamped
/// at zero. Returns the penalty actually taken.
pub fn abandon_focus(profile: &mut UserProfile, minutes: u64) -> u64 {
    force_debit(profile, minutes)
}

/// First completion of a task pays its reward value; repeats pay nothing.
pub fn complete_task(profile: &mut UserProfile, task: &mut Task) -> Option<LevelUp> {
    if task.completed {
        return None;
    }
    task.completed = true;
    earn(profile, task.reward_value)
}

/// Complete a habit for the day: bumps the streak, stamps the date, and pays
/// the streak-scaled reward.
pub fn complete_habit(
    profile: &mut UserProfile,
    habit: &mut Habit,
    today: NaiveDate,
) -> Option<LevelUp> {
    if habit.completed {
        return None;
    }
    habit.completed = true;
    habit.streak += 1;
    habit.last_completed = Some(today);
    earn(profile, habit_reward(habit.reward_value, habit.streak))
}

/// Complete a challenge once for its fixed credit reward.
pub fn complete_challenge(
    profile: &mut UserProfile,
    challenge: &mut Challenge,
) -> Option<LevelUp> {
    if challenge.completed {
        return None;
    }
    challenge.completed = true;
    earn(profile, challenge.reward_credits)
}

/// Opportunistic daily timer, run at load: clears yesterday's completion
/// flags and settles streaks. A good-habit streak broken by a missed day is
/// saved by consuming one streak freeze, otherwise it resets to zero.
pub fn daily_rollover(profile: &mut UserProfile, habits: &mut [Habit], today: NaiveDate) {
    for habit in habits.iter_mut() {
        if habit.last_completed != Some(today) {
            habit.completed = false;
        }
        if habit.kind == HabitKind::Bad || habit.streak == 0 {
            continue;
        }
        let Some(last) = habit.last_completed else {
            continue;
        };
        if (today - last).num_days() <= 1 {
            continue;
        }
        if profile.streak_freezes > 0 {
            profile.streak_freezes -= 1;
            habit.last_completed = Some(today - Duration::days(1));
            info!(habit = %habit.label, "streak saved by freeze");
        } else {
            debug!(habit = %habit.label, lost = habit.streak, "streak reset");
            habit.streak = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cerebro_core::{Difficulty, XP_PER_LEVEL};
    use proptest::prelude::*;

    fn item(id: &str, cost: u64) -> Reward {
        Reward {
            id: RewardId(id.to_string()),
            name: id.to_string(),
            cost,
            icon: String::new(),
            effect: None,
            unlock_level: None,
            kind: RewardKind::General,
        }
    }

    fn profile_with(credits: u64) -> UserProfile {
        let mut p = UserProfile::new("tester");
        p.credits = credits;
        p
    }

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    struct StubPicker(Vec<RewardId>);

    impl DiscountPicker for StubPicker {
        fn pick_discounts(&self, _profile: &UserProfile, _catalog: &[Reward]) -> Vec<RewardId> {
            self.0.clone()
        }
    }

    #[test]
    fn debit_rejects_and_leaves_balance() {
        let mut p = profile_with(100);
        let err = debit(&mut p, 150).unwrap_err();
        assert_eq!(
            err,
            EconError::InsufficientCredits {
                needed: 150,
                available: 100
            }
        );
        assert_eq!(p.credits, 100);
        debit(&mut p, 100).unwrap();
        assert_eq!(p.credits, 0);
    }

    #[test]
    fn force_debit_clamps_at_zero() {
        let mut p = profile_with(30);
        assert_eq!(force_debit(&mut p, 100), 30);
        assert_eq!(p.credits, 0);
        assert_eq!(force_debit(&mut p, 5), 0);
    }

    #[test]
    fn xp_level_up_fires_only_on_boundary() {
        let mut p = profile_with(0);
        p.total_xp = 950;
        let up = add_xp(&mut p, 100).unwrap();
        assert_eq!(p.total_xp, 1_050);
        assert_eq!(up.new_level, 2);
        assert_eq!(p.level(), 2);
        assert!(add_xp(&mut p, 100).is_none());
        let up = add_xp(&mut p, 2_000).unwrap();
        assert_eq!(up.new_level, 4);
    }

    #[test]
    fn earn_pays_credits_and_xp_together() {
        let mut p = profile_with(10);
        assert!(earn(&mut p, 20).is_none());
        assert_eq!(p.credits, 30);
        assert_eq!(p.total_xp, 20);
    }

    #[test]
    fn inflation_saturates_at_ceiling() {
        let mut stats = EconomyStats::default();
        for i in 0..30 {
            record_purchase(&mut stats, at(i));
        }
        assert_eq!(stats.inflation_multiplier, Decimal::TWO);
        assert_eq!(stats.purchase_streak, 30);
        assert_eq!(stats.last_purchase, at(29));
    }

    #[test]
    fn effective_price_rounds_half_away_from_zero() {
        let mut stats = EconomyStats::default();
        stats.inflation_multiplier = Decimal::new(105, 2);
        assert_eq!(effective_price(&item("a", 10), &stats), 11);
        assert_eq!(effective_price(&item("b", 100), &stats), 105);
    }

    #[test]
    fn discount_is_strictly_cheaper() {
        let mut stats = EconomyStats::default();
        stats.inflation_multiplier = Decimal::new(14, 1);
        let reward = item("sale", 200);
        let full = effective_price(&reward, &stats);
        stats.active_discounts.insert(reward.id.clone());
        let cut = effective_price(&reward, &stats);
        assert_eq!(full, 280);
        assert_eq!(cut, 196);
        assert!(cut < full);
    }

    #[test]
    fn purchase_scenario_full_flow() {
        let mut p = profile_with(1_000);
        let mut catalog = vec![item("treat", 500)];
        let receipt = purchase(&mut p, &mut catalog, &RewardId("treat".into()), at(0)).unwrap();
        assert_eq!(receipt.paid, 500);
        assert_eq!(p.credits, 500);
        assert_eq!(p.economy.inflation_multiplier, Decimal::new(105, 2));
        assert_eq!(p.economy.purchase_streak, 1);
        assert_eq!(
            receipt.outcome,
            PurchaseOutcome::AddedToInventory {
                item: "Treat".to_string(),
                count: 1
            }
        );
        assert_eq!(p.inventory.get("Treat"), Some(&1));
    }

    #[test]
    fn rejected_purchase_changes_nothing() {
        let mut p = profile_with(100);
        p.total_xp = 400;
        let mut catalog = vec![item("pricey", 500)];
        let before = p.clone();
        let catalog_before = catalog.clone();
        let err = purchase(&mut p, &mut catalog, &RewardId("pricey".into()), at(0)).unwrap_err();
        assert!(matches!(err, EconError::InsufficientCredits { .. }));
        assert_eq!(p, before);
        assert_eq!(catalog, catalog_before);
        let err = purchase(&mut p, &mut catalog, &RewardId("ghost".into()), at(0)).unwrap_err();
        assert_eq!(err, EconError::UnknownReward("ghost".to_string()));
        assert_eq!(p, before);
    }

    #[test]
    fn level_locked_reward_rejects_below_threshold() {
        let mut p = profile_with(10_000);
        let mut locked = item("elite", 100);
        locked.unlock_level = Some(3);
        let mut catalog = vec![locked];
        let err = purchase(&mut p, &mut catalog, &RewardId("elite".into()), at(0)).unwrap_err();
        assert_eq!(
            err,
            EconError::LevelLocked {
                required: 3,
                current: 1
            }
        );
        p.total_xp = 2_500;
        purchase(&mut p, &mut catalog, &RewardId("elite".into()), at(0)).unwrap();
    }

    #[test]
    fn tree_purchase_unlocks_catalog_entry_only() {
        let mut p = profile_with(1_000);
        let mut catalog = cerebro_core::seed_catalog();
        let receipt = purchase(&mut p, &mut catalog, &RewardId("tree_oak".into()), at(0)).unwrap();
        assert_eq!(
            receipt.outcome,
            PurchaseOutcome::TreeUnlocked {
                id: RewardId("tree_oak".into())
            }
        );
        assert!(p.inventory.is_empty());
        let oak = catalog.iter().find(|r| r.id.0 == "tree_oak").unwrap();
        assert!(oak.tree().unwrap().unlocked);
        let err =
            purchase(&mut p, &mut catalog, &RewardId("tree_oak".into()), at(1)).unwrap_err();
        assert_eq!(err, EconError::AlreadyUnlocked("tree_oak".to_string()));
    }

    #[test]
    fn streak_freeze_goes_to_counter_not_inventory() {
        let mut p = profile_with(1_000);
        let mut catalog = cerebro_core::seed_catalog();
        let id = RewardId(cerebro_core::STREAK_FREEZE_ID.to_string());
        let receipt = purchase(&mut p, &mut catalog, &id, at(0)).unwrap();
        assert_eq!(receipt.outcome, PurchaseOutcome::StreakFreezeBanked { total: 1 });
        assert_eq!(p.streak_freezes, 1);
        assert!(p.inventory.is_empty());
    }

    #[test]
    fn consume_item_decrements_and_removes_last_unit() {
        let mut p = profile_with(0);
        assert_eq!(
            consume_item(&mut p, "Potion").unwrap_err(),
            EconError::ItemNotOwned("Potion".to_string())
        );
        p.inventory.insert("Potion".to_string(), 2);
        assert_eq!(consume_item(&mut p, "Potion").unwrap(), 1);
        assert_eq!(p.inventory.get("Potion"), Some(&1));
        assert_eq!(consume_item(&mut p, "Potion").unwrap(), 0);
        assert!(!p.inventory.contains_key("Potion"));
    }

    #[test]
    fn idle_decay_generates_offers() {
        // Four idle days at x1.4: decay to x1.2 and adopt picked offers.
        let now = at(4 * 86_400_000 + 1);
        let catalog = vec![item("a", 100), item("b", 200), item("c", 300)];
        let mut p = profile_with(0);
        p.economy.inflation_multiplier = Decimal::new(14, 1);
        p.economy.last_purchase = at(0);
        let picker = StubPicker(vec![
            RewardId("a".into()),
            RewardId("b".into()),
            RewardId("c".into()),
        ]);
        periodic_check(&mut p, &catalog, &picker, now);
        assert_eq!(p.economy.inflation_multiplier, Decimal::new(12, 1));
        assert_eq!(p.economy.active_discounts.len(), MAX_ACTIVE_DISCOUNTS);
        assert!(p.economy.active_discounts.contains(&RewardId("a".into())));
        assert!(p.economy.active_discounts.contains(&RewardId("b".into())));
    }

    #[test]
    fn recent_activity_clears_offers() {
        let now = at(2 * 86_400_000);
        let mut p = profile_with(0);
        p.economy.inflation_multiplier = Decimal::new(13, 1);
        p.economy.last_purchase = at(0);
        p.economy.active_discounts.insert(RewardId("a".into()));
        periodic_check(&mut p, &[item("a", 100)], &NoDiscounts, now);
        assert!(p.economy.active_discounts.is_empty());
        assert_eq!(p.economy.inflation_multiplier, Decimal::new(13, 1));
    }

    #[test]
    fn same_day_activity_changes_nothing() {
        let now = at(3_600_000);
        let mut p = profile_with(0);
        p.economy.inflation_multiplier = Decimal::new(13, 1);
        p.economy.last_purchase = at(0);
        p.economy.active_discounts.insert(RewardId("a".into()));
        periodic_check(&mut p, &[item("a", 100)], &NoDiscounts, now);
        assert_eq!(p.economy.active_discounts.len(), 1);
        assert_eq!(p.economy.inflation_multiplier, Decimal::new(13, 1));
    }

    #[test]
    fn stale_discounts_are_pruned_against_live_catalog() {
        let now = at(5 * 86_400_000);
        let mut p = profile_with(0);
        p.economy.inflation_multiplier = Decimal::new(12, 1);
        p.economy.last_purchase = at(0);
        p.economy.active_discounts.insert(RewardId("deleted".into()));
        let catalog = vec![item("kept", 100)];
        let picker = StubPicker(vec![RewardId("kept".into()), RewardId("deleted".into())]);
        periodic_check(&mut p, &catalog, &picker, now);
        assert!(!p.economy.active_discounts.contains(&RewardId("deleted".into())));
        assert!(p.economy.active_discounts.contains(&RewardId("kept".into())));
    }

    #[test]
    fn habit_reward_saturates_at_half_extra() {
        assert_eq!(habit_reward(10, 0), 10);
        assert_eq!(habit_reward(10, 1), 11);
        assert_eq!(habit_reward(10, 10), 15);
        assert_eq!(habit_reward(10, 40), 15);
    }

    #[test]
    fn session_rewards_and_abandon_penalty() {
        assert_eq!(focus_reward(25), 50);
        assert_eq!(training_reward(40), 120);
        let mut p = profile_with(20);
        // Penalty may exceed the balance; it clamps instead of failing.
        assert_eq!(abandon_focus(&mut p, 25), 20);
        assert_eq!(p.credits, 0);
    }

    #[test]
    fn task_and_challenge_pay_once() {
        let mut p = profile_with(0);
        let mut task = Task::new("write tests", Difficulty::Medium, at(0));
        assert!(complete_task(&mut p, &mut task).is_none());
        assert_eq!(p.credits, 10);
        assert!(complete_task(&mut p, &mut task).is_none());
        assert_eq!(p.credits, 10);

        let mut challenge = Challenge {
            id: "c1".to_string(),
            title: "cold showers".to_string(),
            description: String::new(),
            kind: cerebro_core::ChallengeKind::Health,
            duration_days: 3,
            reward_credits: 990,
            completed: false,
            deadline: at(86_400_000),
        };
        let up = complete_challenge(&mut p, &mut challenge).unwrap();
        assert_eq!(up.new_level, 1 + (10 + 990) / XP_PER_LEVEL);
        assert!(complete_challenge(&mut p, &mut challenge).is_none());
        assert_eq!(p.credits, 1_000);
    }

    #[test]
    fn rollover_spends_freeze_before_breaking_streak() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let mut p = profile_with(0);
        p.streak_freezes = 1;
        let mut habits = vec![
            Habit::new("read", "📚", HabitKind::Good, Difficulty::Medium, at(0)),
            Habit::new("run", "🏃", HabitKind::Good, Difficulty::Hard, at(0)),
        ];
        habits[0].streak = 5;
        habits[0].last_completed = NaiveDate::from_ymd_opt(2024, 3, 7);
        habits[0].completed = true;
        habits[1].streak = 3;
        habits[1].last_completed = NaiveDate::from_ymd_opt(2024, 3, 7);

        daily_rollover(&mut p, &mut habits, today);

        // First habit consumed the only freeze; second lost its streak.
        assert_eq!(p.streak_freezes, 0);
        assert_eq!(habits[0].streak, 5);
        assert_eq!(habits[0].last_completed, NaiveDate::from_ymd_opt(2024, 3, 9));
        assert!(!habits[0].completed);
        assert_eq!(habits[1].streak, 0);
    }

    #[test]
    fn rollover_keeps_yesterdays_streak_intact() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let mut p = profile_with(0);
        let mut habits = vec![Habit::new(
            "read",
            "📚",
            HabitKind::Good,
            Difficulty::Easy,
            at(0),
        )];
        habits[0].streak = 4;
        habits[0].last_completed = NaiveDate::from_ymd_opt(2024, 3, 9);
        habits[0].completed = true;
        daily_rollover(&mut p, &mut habits, today);
        assert_eq!(habits[0].streak, 4);
        assert!(!habits[0].completed);
    }

    #[test]
    fn completing_a_habit_scales_with_streak() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let mut p = profile_with(0);
        let mut habit = Habit::new("read", "📚", HabitKind::Good, Difficulty::Medium, at(0));
        habit.streak = 9;
        assert!(complete_habit(&mut p, &mut habit, today).is_none());
        assert_eq!(habit.streak, 10);
        assert_eq!(p.credits, 15);
        assert_eq!(habit.last_completed, Some(today));
        assert!(complete_habit(&mut p, &mut habit, today).is_none());
        assert_eq!(p.credits, 15);
    }

    proptest! {
        #[test]
        fn balance_never_goes_negative(ops in proptest::collection::vec((any::<bool>(), 0u64..10_000), 0..64)) {
            let mut p = profile_with(500);
            for (is_credit, amount) in ops {
                let before = p.credits;
                if is_credit {
                    credit(&mut p, amount);
                    prop_assert!(p.credits >= before);
                } else if debit(&mut p, amount).is_err() {
                    prop_assert_eq!(p.credits, before);
                    prop_assert!(amount > before);
                } else {
                    prop_assert_eq!(p.credits, before - amount);
                }
            }
        }

        #[test]
        fn xp_and_level_are_monotonic(grants in proptest::collection::vec(1u64..5_000, 1..32)) {
            let mut p = profile_with(0);
            for amount in grants {
                let (old_xp, old_level) = (p.total_xp, p.level());
                let up = add_xp(&mut p, amount);
                prop_assert!(p.total_xp > old_xp);
                prop_assert!(p.level() >= old_level);
                prop_assert_eq!(up.is_some(), p.level() > old_level);
            }
        }

        #[test]
        fn inflation_stays_in_bounds(ops in proptest::collection::vec((any::<bool>(), 0i64..8), 0..64)) {
            let mut p = profile_with(0);
            let mut now = at(0);
            for (is_purchase, day_gap) in ops {
                now += Duration::days(day_gap);
                if is_purchase {
                    record_purchase(&mut p.economy, now);
                } else {
                    periodic_check(&mut p, &[], &NoDiscounts, now);
                }
                prop_assert!(p.economy.inflation_multiplier >= Decimal::ONE);
                prop_assert!(p.economy.inflation_multiplier <= Decimal::TWO);
            }
        }

        #[test]
        fn discounted_price_is_strictly_lower(cost in 2u64..100_000, cents in 100i64..=200) {
            let reward = item("prop", cost);
            let mut stats = EconomyStats::default();
            stats.inflation_multiplier = Decimal::new(cents, 2);
            let full = effective_price(&reward, &stats);
            stats.active_discounts.insert(reward.id.clone());
            let cut = effective_price(&reward, &stats);
            prop_assert!(cut < full);
        }
    }
}
