//! Status derivation and battle clock helpers.
//!
//! Status is never trusted from storage; it is recomputed from the
//! opponent and the two timestamps every time it is needed:
//!
//! ```text
//! no opponent                     -> waiting
//! opponent, no start              -> waiting
//! opponent, start, now >= end     -> completed
//! opponent, start <= now < end    -> active
//! anything else                   -> waiting
//! ```

use chrono::{DateTime, Duration, Utc};

use crate::battle::{Battle, BattleStatus};

pub fn derive_status(battle: &Battle, now: DateTime<Utc>) -> BattleStatus {
    if battle.opponent.is_none() {
        return BattleStatus::Waiting;
    }
    let Some(start) = battle.start_date else {
        return BattleStatus::Waiting;
    };
    if battle.end_date.is_some_and(|end| now >= end) {
        return BattleStatus::Completed;
    }
    if now >= start {
        return BattleStatus::Active;
    }
    BattleStatus::Waiting
}

/// Joined, past its end date and not yet settled.
pub fn needs_settlement(battle: &Battle, now: DateTime<Utc>) -> bool {
    battle.opponent.is_some()
        && battle.result.is_none()
        && derive_status(battle, now) == BattleStatus::Completed
}

/// Time left until `end_date`, never negative. Zero without an end date.
pub fn remaining_time(battle: &Battle, now: DateTime<Utc>) -> Duration {
    match battle.end_date {
        Some(end) if end > now => end - now,
        _ => Duration::zero(),
    }
}

/// 1-based day of the battle, capped at the battle's length in days.
/// Zero before the battle starts.
pub fn current_day(battle: &Battle, now: DateTime<Utc>) -> i64 {
    let Some(start) = battle.start_date else {
        return 0;
    };
    let elapsed = now - start;
    if elapsed < Duration::zero() {
        return 0;
    }
    let total_days = battle
        .end_date
        .map(|end| ((end - start).num_seconds() + 86_399) / 86_400)
        .unwrap_or(1)
        .max(1);
    (elapsed.num_days() + 1).min(total_days)
}

/// Human-readable countdown, e.g. `"2 days, 3 hours remaining"`,
/// `"1 hour, 5 min remaining"`, `"15 min remaining"`, `"Battle Complete"`.
pub fn format_time_remaining(battle: &Battle, now: DateTime<Utc>) -> String {
    let remaining = remaining_time(battle, now);
    if remaining <= Duration::zero() {
        return "Battle Complete".to_string();
    }

    let days = remaining.num_days();
    let hours = remaining.num_hours() % 24;
    let minutes = remaining.num_minutes() % 60;

    if days == 0 {
        if hours > 0 {
            return format!("{} hour{}, {} min remaining", hours, plural(hours), minutes);
        }
        return format!("{} min remaining", minutes);
    }

    format!(
        "{} day{}, {} hour{} remaining",
        days,
        plural(days),
        hours,
        plural(hours)
    )
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
