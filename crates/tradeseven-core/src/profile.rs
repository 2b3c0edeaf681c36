//! Player profiles, ranks and stat application.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::battle::{Battle, BattleId};

/// Rank tier, a pure step function of cumulative XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    Beginner,
    Veteran,
    Expert,
    Master,
}

impl Rank {
    pub fn from_xp(xp: u64) -> Self {
        match xp {
            x if x >= 5000 => Self::Master,
            x if x >= 2000 => Self::Expert,
            x if x >= 500 => Self::Veteran,
            _ => Self::Beginner,
        }
    }

    /// XP needed to reach this tier.
    pub fn min_xp(&self) -> u64 {
        match self {
            Self::Beginner => 0,
            Self::Veteran => 500,
            Self::Expert => 2000,
            Self::Master => 5000,
        }
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Beginner => Some(Self::Veteran),
            Self::Veteran => Some(Self::Expert),
            Self::Expert => Some(Self::Master),
            Self::Master => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Beginner => "Beginner",
            Self::Veteran => "Veteran",
            Self::Expert => "Expert",
            Self::Master => "Master",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// How a battle went for one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleOutcome {
    Won,
    Lost,
    Draw,
}

/// What applying a settled battle changed on a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsUpdate {
    pub battle_id: BattleId,
    pub outcome: BattleOutcome,
    pub xp_gained: u32,
    pub previous_rank: Rank,
    pub rank: Rank,
}

impl StatsUpdate {
    pub fn ranked_up(&self) -> bool {
        self.rank > self.previous_rank
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    pub wins: u32,
    pub losses: u32,
    #[serde(default)]
    pub draws: u32,
    pub xp: u64,
    pub created_at: DateTime<Utc>,
    /// Battles already counted into these stats.
    #[serde(default)]
    pub settled_battles: BTreeSet<BattleId>,
}

impl UserProfile {
    pub fn new(username: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            username: username.into(),
            wins: 0,
            losses: 0,
            draws: 0,
            xp: 0,
            created_at: now,
            settled_battles: BTreeSet::new(),
        }
    }

    /// Always derived from XP.
    pub fn rank(&self) -> Rank {
        Rank::from_xp(self.xp)
    }

    pub fn battles_played(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    pub fn has_counted(&self, id: &BattleId) -> bool {
        self.settled_battles.contains(id)
    }

    /// Fold a settled battle into the stats, once per battle.
    ///
    /// Returns `None` when the battle has no result, the user did not take
    /// part, or the battle was already counted.
    pub fn apply_battle(&mut self, battle: &Battle) -> Option<StatsUpdate> {
        let result = battle.result.as_ref()?;
        if !battle.is_participant(&self.username) || self.has_counted(&battle.id) {
            return None;
        }

        let previous_rank = self.rank();
        let xp_gained = result.xp_for(&self.username);
        let outcome = if result.is_draw {
            BattleOutcome::Draw
        } else if result.winner.as_deref() == Some(self.username.as_str()) {
            BattleOutcome::Won
        } else {
            BattleOutcome::Lost
        };

        match outcome {
            BattleOutcome::Won => self.wins += 1,
            BattleOutcome::Lost => self.losses += 1,
            BattleOutcome::Draw => self.draws += 1,
        }
        self.xp += u64::from(xp_gained);
        self.settled_battles.insert(battle.id);

        let update = StatsUpdate {
            battle_id: battle.id,
            outcome,
            xp_gained,
            previous_rank,
            rank: self.rank(),
        };
        if update.ranked_up() {
            tracing::info!(user = %self.username, rank = %update.rank, "rank up");
        }
        Some(update)
    }
}
