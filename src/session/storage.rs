//! Tab set stores
//!
//! `FileTabStore` keeps one YAML file per user under
//! `~/.local/share/worktab/tabs/<user>.yaml` (platform data dir).
//! `MemoryTabStore` keeps everything in process and can inject failures.

use super::{TabSet, UserId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors returned by a [`TabStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stored tab set for user '{user}' is malformed: {source}")]
    Malformed {
        user: UserId,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("failed to encode tab set for user '{user}': {source}")]
    Encode {
        user: UserId,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("invalid user id '{0}'")]
    InvalidUser(String),

    #[error("tab store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value persistence of one tab set per user.
///
/// `save` is an upsert. Futures must be `Send` so saves can run as
/// background tasks while the UI keeps mutating.
pub trait TabStore: Send + Sync + 'static {
    fn load(
        &self,
        user: &UserId,
    ) -> impl Future<Output = Result<Option<TabSet>, StoreError>> + Send;

    fn save(
        &self,
        user: &UserId,
        set: &TabSet,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// One YAML file per user in a directory
#[derive(Debug, Clone)]
pub struct FileTabStore {
    dir: PathBuf,
}

impl FileTabStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `user`'s tab set.
    ///
    /// User ids become file names, so anything that could escape the
    /// directory is rejected.
    pub fn path_for(&self, user: &UserId) -> Result<PathBuf, StoreError> {
        let id = user.as_str();
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
        if !valid {
            return Err(StoreError::InvalidUser(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.yaml")))
    }
}

impl TabStore for FileTabStore {
    async fn load(&self, user: &UserId) -> Result<Option<TabSet>, StoreError> {
        let path = self.path_for(user)?;

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        if contents.trim().is_empty() {
            return Ok(None);
        }

        let set: TabSet =
            serde_yaml_ng::from_str(&contents).map_err(|source| StoreError::Malformed {
                user: user.clone(),
                source,
            })?;

        log::info!(
            "Loaded tab set ({} tabs) for user {} from {:?}",
            set.tabs.len(),
            user,
            path
        );
        Ok(Some(set))
    }

    async fn save(&self, user: &UserId, set: &TabSet) -> Result<(), StoreError> {
        let path = self.path_for(user)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let contents = serde_yaml_ng::to_string(set).map_err(|source| StoreError::Encode {
            user: user.clone(),
            source,
        })?;

        // Write to a sibling temp file and rename so readers never see a torn file
        let tmp = path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        log::info!(
            "Saved tab set ({} tabs) for user {} to {:?}",
            set.tabs.len(),
            user,
            path
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    sets: HashMap<UserId, TabSet>,
    /// Every successful save, in order
    saves: Vec<(UserId, TabSet)>,
    save_attempts: usize,
    failing_saves: usize,
    fail_loads: bool,
}

/// In-process store, mainly for tests and `--ephemeral` runs
#[derive(Debug, Default)]
pub struct MemoryTabStore {
    state: Mutex<MemoryState>,
}

impl MemoryTabStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a tab set for `user`
    pub fn with_set(user: UserId, set: TabSet) -> Self {
        let store = Self::new();
        store.state.lock().sets.insert(user, set);
        store
    }

    pub fn stored(&self, user: &UserId) -> Option<TabSet> {
        self.state.lock().sets.get(user).cloned()
    }

    /// Successful saves, oldest first
    pub fn saves(&self) -> Vec<(UserId, TabSet)> {
        self.state.lock().saves.clone()
    }

    pub fn save_count(&self) -> usize {
        self.state.lock().saves.len()
    }

    /// Saves attempted, including injected failures
    pub fn save_attempts(&self) -> usize {
        self.state.lock().save_attempts
    }

    /// Make the next `n` saves fail
    pub fn fail_next_saves(&self, n: usize) {
        self.state.lock().failing_saves = n;
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.state.lock().fail_loads = fail;
    }
}

impl TabStore for MemoryTabStore {
    async fn load(&self, user: &UserId) -> Result<Option<TabSet>, StoreError> {
        let state = self.state.lock();
        if state.fail_loads {
            return Err(StoreError::Unavailable("injected load failure".to_string()));
        }
        Ok(state.sets.get(user).cloned())
    }

    async fn save(&self, user: &UserId, set: &TabSet) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.save_attempts += 1;
        if state.failing_saves > 0 {
            state.failing_saves -= 1;
            return Err(StoreError::Unavailable("injected save failure".to_string()));
        }
        state.sets.insert(user.clone(), set.clone());
        state.saves.push((user.clone(), set.clone()));
        Ok(())
    }
}
