//! JSON file backend.
//!
//! Layout under the data directory:
//!
//! ```text
//! battles.json    [Battle]
//! profiles.json   { username: UserProfile }
//! history.json    [Battle]
//! ```
//!
//! A missing file reads as empty. Every write goes to a temporary file in
//! the same directory which is then renamed over the target, so readers
//! never see a half-written document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use tradeseven_core::{Battle, BattleId, UserProfile};

use crate::{history_for, BattleStore, HistoryStore, ProfileStore, StoreResult};

const BATTLES_FILE: &str = "battles.json";
const PROFILES_FILE: &str = "profiles.json";
const HISTORY_FILE: &str = "history.json";

pub struct JsonFileStore {
    dir: PathBuf,
    // serializes read-modify-write of profiles and history
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!(dir = %dir.display(), "opened json store");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read<T>(&self, name: &str) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        match tokio::fs::read(self.dir.join(name)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write<T>(&self, name: &str, value: &T) -> StoreResult<()>
    where
        T: Serialize + ?Sized,
    {
        let bytes = serde_json::to_vec_pretty(value)?;
        let target = self.dir.join(name);
        let tmp = self.dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4()));

        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl BattleStore for JsonFileStore {
    async fn load_all(&self) -> StoreResult<Vec<Battle>> {
        Ok(self.read(BATTLES_FILE).await?.unwrap_or_default())
    }

    async fn save_all(&self, battles: &[Battle]) -> StoreResult<()> {
        self.write(BATTLES_FILE, battles).await
    }
}

#[async_trait]
impl ProfileStore for JsonFileStore {
    async fn load(&self, username: &str) -> StoreResult<Option<UserProfile>> {
        let mut profiles: BTreeMap<String, UserProfile> =
            self.read(PROFILES_FILE).await?.unwrap_or_default();
        Ok(profiles.remove(username))
    }

    async fn save(&self, profile: &UserProfile) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut profiles: BTreeMap<String, UserProfile> =
            self.read(PROFILES_FILE).await?.unwrap_or_default();
        profiles.insert(profile.username.clone(), profile.clone());
        self.write(PROFILES_FILE, &profiles).await
    }
}

#[async_trait]
impl HistoryStore for JsonFileStore {
    async fn load_history(&self, username: &str) -> StoreResult<Vec<Battle>> {
        let all: Vec<Battle> = self.read(HISTORY_FILE).await?.unwrap_or_default();
        Ok(history_for(&all, username))
    }

    async fn append_history(&self, battle: &Battle) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut all: Vec<Battle> = self.read(HISTORY_FILE).await?.unwrap_or_default();
        if all.iter().any(|b| b.id == battle.id) {
            return Ok(false);
        }
        all.push(battle.clone());
        self.write(HISTORY_FILE, &all).await?;
        Ok(true)
    }

    async fn remove_history(&self, id: BattleId) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut all: Vec<Battle> = self.read(HISTORY_FILE).await?.unwrap_or_default();
        let before = all.len();
        all.retain(|b| b.id != id);
        if all.len() == before {
            return Ok(false);
        }
        self.write(HISTORY_FILE, &all).await?;
        Ok(true)
    }
}
