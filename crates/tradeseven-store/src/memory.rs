//! In-memory backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use tradeseven_core::{Battle, BattleId, UserProfile};

use crate::{history_for, BattleStore, HistoryStore, ProfileStore, StoreError, StoreResult};

/// In-memory storage for all three collections.
///
/// Writes can be switched off with [`InMemoryStore::fail_writes`], or per
/// collection, to exercise persistence failures.
#[derive(Default)]
pub struct InMemoryStore {
    battles: RwLock<Vec<Battle>>,
    profiles: RwLock<HashMap<String, UserProfile>>,
    history: RwLock<Vec<Battle>>,
    fail_battle_writes: AtomicBool,
    fail_profile_writes: AtomicBool,
    fail_history_writes: AtomicBool,
    battle_writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_battle_writes(fail);
        self.fail_profile_writes(fail);
        self.fail_history_writes(fail);
    }

    pub fn fail_battle_writes(&self, fail: bool) {
        self.fail_battle_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_profile_writes(&self, fail: bool) {
        self.fail_profile_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_history_writes(&self, fail: bool) {
        self.fail_history_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `save_all` calls so far.
    pub fn battle_writes(&self) -> usize {
        self.battle_writes.load(Ordering::SeqCst)
    }
}

fn check_writable(flag: &AtomicBool, collection: &str) -> StoreResult<()> {
    if flag.load(Ordering::SeqCst) {
        return Err(StoreError::Unavailable(format!("{collection} writes disabled")));
    }
    Ok(())
}

#[async_trait]
impl BattleStore for InMemoryStore {
    async fn load_all(&self) -> StoreResult<Vec<Battle>> {
        Ok(self.battles.read().await.clone())
    }

    async fn save_all(&self, battles: &[Battle]) -> StoreResult<()> {
        check_writable(&self.fail_battle_writes, "battle")?;
        *self.battles.write().await = battles.to_vec();
        self.battle_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn load(&self, username: &str) -> StoreResult<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(username).cloned())
    }

    async fn save(&self, profile: &UserProfile) -> StoreResult<()> {
        check_writable(&self.fail_profile_writes, "profile")?;
        self.profiles
            .write()
            .await
            .insert(profile.username.clone(), profile.clone());
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn load_history(&self, username: &str) -> StoreResult<Vec<Battle>> {
        Ok(history_for(&self.history.read().await, username))
    }

    async fn append_history(&self, battle: &Battle) -> StoreResult<bool> {
        check_writable(&self.fail_history_writes, "history")?;
        let mut history = self.history.write().await;
        if history.iter().any(|b| b.id == battle.id) {
            return Ok(false);
        }
        history.push(battle.clone());
        Ok(true)
    }

    async fn remove_history(&self, id: BattleId) -> StoreResult<bool> {
        check_writable(&self.fail_history_writes, "history")?;
        let mut history = self.history.write().await;
        let before = history.len();
        history.retain(|b| b.id != id);
        Ok(history.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_battles_roundtrip() {
        let store = InMemoryStore::new();
        assert!(store.load_all().await.unwrap().is_empty());

        let battle = Battle::new("alice", Vec::new(), "P", "ABCDEF", Utc::now());
        store.save_all(std::slice::from_ref(&battle)).await.unwrap();
        assert_eq!(store.load_all().await.unwrap(), vec![battle]);
        assert_eq!(store.battle_writes(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state() {
        let store = InMemoryStore::new();
        let battle = Battle::new("alice", Vec::new(), "P", "ABCDEF", Utc::now());
        store.fail_writes(true);
        assert!(matches!(
            store.save_all(&[battle]).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_injection_is_per_collection() {
        let store = InMemoryStore::new();
        let battle = Battle::new("alice", Vec::new(), "P", "ABCDEF", Utc::now());
        store.fail_battle_writes(true);
        assert!(store.save_all(std::slice::from_ref(&battle)).await.is_err());
        assert!(store.append_history(&battle).await.unwrap());
        store.save(&UserProfile::new("alice", Utc::now())).await.unwrap();

        store.fail_battle_writes(false);
        store.fail_history_writes(true);
        store.save_all(std::slice::from_ref(&battle)).await.unwrap();
        assert!(store.remove_history(battle.id).await.is_err());
        assert_eq!(store.load_history("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_profiles() {
        let store = InMemoryStore::new();
        assert!(store.load("alice").await.unwrap().is_none());
        let mut profile = UserProfile::new("alice", Utc::now());
        profile.xp = 42;
        store.save(&profile).await.unwrap();
        assert_eq!(store.load("alice").await.unwrap().unwrap().xp, 42);
    }

    #[tokio::test]
    async fn test_history_is_idempotent_by_id() {
        let store = InMemoryStore::new();
        let battle = Battle::new("alice", Vec::new(), "P", "ABCDEF", Utc::now());
        assert!(store.append_history(&battle).await.unwrap());
        assert!(!store.append_history(&battle).await.unwrap());
        assert_eq!(store.load_history("alice").await.unwrap().len(), 1);
        assert!(store.load_history("bob").await.unwrap().is_empty());
    }
}
