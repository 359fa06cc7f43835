use crate::errors::LedgerError;
use crate::models::{AppData, CategoryTotal, Entry, LeaderboardRow, User, UserId};
use crate::stats;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Persistence collaborator for the ledger.
///
/// User writes are compare-and-swap on [`User::version`]: the caller passes
/// the user as it read it (with the version it saw) and the store rejects the
/// write with [`LedgerError::Conflict`] if someone else wrote in between. A
/// successful write returns the stored user with the bumped version.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, user: User) -> Result<User, LedgerError>;
    async fn find_user_by_name(&self, username: &str) -> Result<Option<User>, LedgerError>;
    async fn find_user_by_id(&self, id: &UserId) -> Result<Option<User>, LedgerError>;
    async fn save_user(&self, user: &User) -> Result<User, LedgerError>;
    async fn create_entry(&self, entry: &Entry) -> Result<(), LedgerError>;
    /// Appends `entry` and saves `user` as one atomic write.
    async fn record_entry(&self, entry: &Entry, user: &User) -> Result<User, LedgerError>;
    /// Newest first.
    async fn list_entries_by_user(&self, id: &UserId) -> Result<Vec<Entry>, LedgerError>;
    async fn aggregate_community_average(&self) -> Result<f64, LedgerError>;
    async fn aggregate_leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardRow>, LedgerError>;
    async fn aggregate_user_category_totals(
        &self,
        id: &UserId,
    ) -> Result<Vec<CategoryTotal>, LedgerError>;
}

/// Single JSON document on disk, rewritten after every mutation. Without a
/// path it only lives in memory.
pub struct JsonStore {
    path: Option<PathBuf>,
    data: Mutex<AppData>,
}

impl JsonStore {
    pub async fn open(path: PathBuf) -> Self {
        let data = load_data(&path).await;
        Self::with_data(Some(path), data)
    }

    pub fn in_memory() -> Self {
        Self::with_data(None, AppData::default())
    }

    pub fn with_data(path: Option<PathBuf>, data: AppData) -> Self {
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    /// Applies `apply` to a copy of the data and swaps it in only once the
    /// copy is on disk.
    async fn commit<T, F>(&self, apply: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut AppData) -> Result<T, LedgerError> + Send,
        T: Send,
    {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let out = apply(&mut next)?;
        if let Some(path) = &self.path {
            persist_data(path, &next).await?;
        }
        *data = next;
        Ok(out)
    }
}

fn replace_user(data: &mut AppData, user: &User) -> Result<User, LedgerError> {
    let stored = data
        .users
        .get_mut(&user.id)
        .ok_or_else(|| LedgerError::NotFound(format!("user {}", user.id)))?;
    if stored.version != user.version {
        debug!(
            user_id = %user.id,
            expected = user.version,
            actual = stored.version,
            "user version mismatch"
        );
        return Err(LedgerError::Conflict(format!(
            "user {} was modified concurrently",
            user.id
        )));
    }
    let mut next = user.clone();
    next.version = stored.version + 1;
    *stored = next.clone();
    Ok(next)
}

#[async_trait]
impl Store for JsonStore {
    async fn create_user(&self, user: User) -> Result<User, LedgerError> {
        self.commit(move |data| {
            if data.users.values().any(|u| u.username == user.username) {
                return Err(LedgerError::AlreadyExists(format!(
                    "username '{}'",
                    user.username
                )));
            }
            data.users.insert(user.id.clone(), user.clone());
            Ok(user)
        })
        .await
    }

    async fn find_user_by_name(&self, username: &str) -> Result<Option<User>, LedgerError> {
        let data = self.data.lock().await;
        Ok(data.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_id(&self, id: &UserId) -> Result<Option<User>, LedgerError> {
        let data = self.data.lock().await;
        Ok(data.users.get(id).cloned())
    }

    async fn save_user(&self, user: &User) -> Result<User, LedgerError> {
        self.commit(|data| replace_user(data, user)).await
    }

    async fn create_entry(&self, entry: &Entry) -> Result<(), LedgerError> {
        self.commit(|data| {
            if !data.users.contains_key(&entry.user_id) {
                return Err(LedgerError::NotFound(format!("user {}", entry.user_id)));
            }
            data.entries.push(entry.clone());
            Ok(())
        })
        .await
    }

    async fn record_entry(&self, entry: &Entry, user: &User) -> Result<User, LedgerError> {
        self.commit(|data| {
            let saved = replace_user(data, user)?;
            data.entries.push(entry.clone());
            Ok(saved)
        })
        .await
    }

    async fn list_entries_by_user(&self, id: &UserId) -> Result<Vec<Entry>, LedgerError> {
        let data = self.data.lock().await;
        let mut entries: Vec<Entry> = data
            .entries
            .iter()
            .rev()
            .filter(|entry| &entry.user_id == id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    async fn aggregate_community_average(&self) -> Result<f64, LedgerError> {
        let data = self.data.lock().await;
        Ok(stats::community_average(&data.entries))
    }

    async fn aggregate_leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardRow>, LedgerError> {
        let data = self.data.lock().await;
        Ok(stats::leaderboard(&data.entries, &data.users, limit))
    }

    async fn aggregate_user_category_totals(
        &self,
        id: &UserId,
    ) -> Result<Vec<CategoryTotal>, LedgerError> {
        let data = self.data.lock().await;
        Ok(stats::category_totals(
            data.entries.iter().filter(|entry| &entry.user_id == id),
        ))
    }
}

pub async fn load_data(path: &Path) -> AppData {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to parse data file {}: {err}", path.display());
                AppData::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => AppData::default(),
        Err(err) => {
            error!("failed to read data file {}: {err}", path.display());
            AppData::default()
        }
    }
}

/// Writes next to `path` and renames over it, so readers only ever see a
/// complete document.
pub async fn persist_data(path: &Path, data: &AppData) -> Result<(), LedgerError> {
    let payload = serde_json::to_vec_pretty(data).map_err(LedgerError::store)?;
    let staging = staging_path(path);
    fs::write(&staging, payload).await.map_err(LedgerError::store)?;
    fs::rename(&staging, path).await.map_err(LedgerError::store)?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}
