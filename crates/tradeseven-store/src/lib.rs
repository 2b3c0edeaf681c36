//! TradeSeven Store - persistence for battles, profiles and history
//!
//! Three narrow collaborators, each an `async_trait`:
//!
//! - [`BattleStore`]: the shared list of live battles, read and written as
//!   one document
//! - [`ProfileStore`]: one profile per username
//! - [`HistoryStore`]: battles a participant archived, newest first
//!
//! Two backends implement all three: [`InMemoryStore`] for tests and
//! single-process runs, and [`JsonFileStore`] which keeps one JSON file per
//! collection and replaces it atomically on every write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use tradeseven_core::{Battle, BattleId, UserProfile};

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::InMemoryStore;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// The shared battle document.
#[async_trait]
pub trait BattleStore: Send + Sync {
    /// Read every live battle.
    async fn load_all(&self) -> StoreResult<Vec<Battle>>;

    /// Replace the whole list.
    async fn save_all(&self, battles: &[Battle]) -> StoreResult<()>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load(&self, username: &str) -> StoreResult<Option<UserProfile>>;

    async fn save(&self, profile: &UserProfile) -> StoreResult<()>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Archived battles `username` took part in, newest first.
    async fn load_history(&self, username: &str) -> StoreResult<Vec<Battle>>;

    /// Add a battle to history. Returns `false` if a battle with the same
    /// id is already there.
    async fn append_history(&self, battle: &Battle) -> StoreResult<bool>;

    /// Drop a battle from history. Returns `false` if it was not there.
    async fn remove_history(&self, id: BattleId) -> StoreResult<bool>;
}

/// Equality check used to skip redundant battle writes.
pub fn same_battles(a: &[Battle], b: &[Battle]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

fn history_time(battle: &Battle) -> Option<DateTime<Utc>> {
    battle.completed_at.or(battle.archived_at)
}

/// Filter `all` down to `username`'s battles, newest first.
pub(crate) fn history_for(all: &[Battle], username: &str) -> Vec<Battle> {
    let mut mine: Vec<Battle> = all
        .iter()
        .filter(|b| b.is_participant(username))
        .cloned()
        .collect();
    mine.sort_by(|a, b| history_time(b).cmp(&history_time(a)));
    mine
}
