#![deny(warnings)]

//! Persistence layer: local key-value snapshots and debounced cloud sync.
//!
//! Local writes are synchronous and fire-and-forget; the cloud document
//! store receives whole-snapshot writes, debounced so rapid successive
//! changes collapse into one remote write. There is exactly one writer and
//! the remote is last-write-wins; failures are logged and dropped, the next
//! change simply tries again.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use cerebro_core::{Challenge, Flashcard, Habit, Reward, Task, UserProfile};

pub const PROFILE_KEY: &str = "profile";
pub const REWARDS_KEY: &str = "rewards";
pub const FLASHCARDS_KEY: &str = "flashcards";
pub const TASKS_KEY: &str = "tasks";
pub const HABITS_KEY: &str = "habits";
pub const CHALLENGES_KEY: &str = "challenges";

/// Quiet window before a dirty snapshot is pushed to the cloud.
pub const SYNC_DEBOUNCE_MS: i64 = 2_000;

/// Errors from the remote document store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport-level failure.
    #[error("http error: {0}")]
    Http(String),
    /// The store answered with a non-success status.
    #[error("remote returned HTTP {0}")]
    Status(u16),
}

/// Whole-application state, written as one document. Every field tolerates
/// being absent so snapshots survive schema evolution.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub profile: UserProfile,
    pub rewards: Vec<Reward>,
    pub flashcards: Vec<Flashcard>,
    pub tasks: Vec<Task>,
    pub habits: Vec<Habit>,
    pub challenges: Vec<Challenge>,
}

impl Snapshot {
    /// Repair defaults after deserializing a partial or stale snapshot.
    pub fn normalize(&mut self) {
        self.profile.normalize();
        for card in &mut self.flashcards {
            card.normalize();
        }
    }
}

/// Injectable time source so sync timing is testable without real timers.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Local key-value store: one JSON file per key under a data directory.
///
/// Loads swallow IO and parse errors into the type's default; saves log and
/// drop failures. Local persistence never blocks the engine.
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn open(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.key_path(key).exists()
    }

    pub fn load<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let path = self.key_path(key);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return T::default(),
            Err(err) => {
                warn!(key, %err, "local load failed; using defaults");
                return T::default();
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, %err, "corrupt local entry; using defaults");
                T::default()
            }
        }
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_vec_pretty(value) {
            Ok(bytes) => {
                if let Err(err) = fs::write(self.key_path(key), bytes) {
                    warn!(key, %err, "local save failed");
                }
            }
            Err(err) => warn!(key, %err, "serialize failed"),
        }
    }
}

/// Load the whole snapshot from local storage, seeding the starter catalog
/// on first run and backfilling defaults for anything missing or corrupt.
pub fn load_snapshot(store: &JsonDirStore) -> Snapshot {
    let mut snapshot = Snapshot {
        profile: store.load(PROFILE_KEY),
        rewards: store.load(REWARDS_KEY),
        flashcards: store.load(FLASHCARDS_KEY),
        tasks: store.load(TASKS_KEY),
        habits: store.load(HABITS_KEY),
        challenges: store.load(CHALLENGES_KEY),
    };
    if !store.contains(REWARDS_KEY) {
        snapshot.rewards = cerebro_core::seed_catalog();
    }
    snapshot.normalize();
    snapshot
}

/// Write every section of the snapshot to local storage.
pub fn save_snapshot(store: &JsonDirStore, snapshot: &Snapshot) {
    store.save(PROFILE_KEY, &snapshot.profile);
    store.save(REWARDS_KEY, &snapshot.rewards);
    store.save(FLASHCARDS_KEY, &snapshot.flashcards);
    store.save(TASKS_KEY, &snapshot.tasks);
    store.save(HABITS_KEY, &snapshot.habits);
    store.save(CHALLENGES_KEY, &snapshot.challenges);
}

/// Cloud document store keyed by an opaque user id.
pub trait RemoteStore {
    fn load(&self, user_id: &str) -> Option<Snapshot>;
    fn save(&self, user_id: &str, snapshot: &Snapshot) -> Result<(), RemoteError>;
}

/// REST document store client: GET/PUT `{base}/users/{id}` as JSON.
pub struct HttpRemoteStore {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RemoteError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|err| RemoteError::Http(err.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Resolve from `CEREBRO_SYNC_URL`; absence means local-only operation.
    pub fn from_env() -> Option<Self> {
        let base = std::env::var("CEREBRO_SYNC_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())?;
        match Self::new(base) {
            Ok(store) => Some(store),
            Err(err) => {
                warn!(%err, "remote store unavailable; running local-only");
                None
            }
        }
    }

    fn doc_url(&self, user_id: &str) -> String {
        format!("{}/users/{}", self.base_url, user_id)
    }
}

impl RemoteStore for HttpRemoteStore {
    fn load(&self, user_id: &str) -> Option<Snapshot> {
        let response = match self.http.get(self.doc_url(user_id)).send() {
            Ok(response) => response,
            Err(err) => {
                warn!(%err, "remote load failed");
                return None;
            }
        };
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return None;
        }
        if !response.status().is_success() {
            warn!(status = %response.status(), "remote load failed");
            return None;
        }
        match response.json::<Snapshot>() {
            Ok(mut snapshot) => {
                snapshot.normalize();
                Some(snapshot)
            }
            Err(err) => {
                warn!(%err, "remote snapshot unreadable");
                None
            }
        }
    }

    fn save(&self, user_id: &str, snapshot: &Snapshot) -> Result<(), RemoteError> {
        let response = self
            .http
            .put(self.doc_url(user_id))
            .json(snapshot)
            .send()
            .map_err(|err| RemoteError::Http(err.to_string()))?;
        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Cancel-and-reschedule debounce window, expressed as a pure function of
/// time since the last mutation. A new mark restarts the window, so the
/// eventual write always reflects the newest state and intermediate states
/// are never transmitted.
#[derive(Clone, Debug)]
pub struct SyncDebouncer {
    delay: Duration,
    deadline: Option<DateTime<Utc>>,
}

impl SyncDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn with_default_delay() -> Self {
        Self::new(Duration::milliseconds(SYNC_DEBOUNCE_MS))
    }

    /// A mutation happened: restart the quiet window.
    pub fn mark_dirty(&mut self, now: DateTime<Utc>) {
        self.deadline = Some(now + self.delay);
    }

    /// Make the pending (or next) flush due immediately.
    pub fn force(&mut self, now: DateTime<Utc>) {
        self.deadline = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True at most once per quiet window, once the window has elapsed.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Debounced remote sync for one user. Without an identity every call is a
/// no-op (local-only mode).
pub struct CloudSync<R: RemoteStore> {
    remote: R,
    user_id: Option<String>,
    debouncer: SyncDebouncer,
}

impl<R: RemoteStore> CloudSync<R> {
    pub fn new(remote: R, user_id: Option<String>) -> Self {
        Self {
            remote,
            user_id,
            debouncer: SyncDebouncer::with_default_delay(),
        }
    }

    pub fn mark_dirty(&mut self, now: DateTime<Utc>) {
        if self.user_id.is_some() {
            self.debouncer.mark_dirty(now);
        }
    }

    /// Network came back: push the current state without waiting out the
    /// debounce window.
    pub fn handle_reconnect(&mut self, now: DateTime<Utc>) {
        if self.user_id.is_some() {
            self.debouncer.force(now);
        }
    }

    pub fn load_remote(&self) -> Option<Snapshot> {
        self.user_id.as_deref().and_then(|id| self.remote.load(id))
    }

    /// Push the snapshot if the quiet window has elapsed. Returns whether a
    /// write happened; failures are logged and dropped.
    pub fn tick(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) -> bool {
        let Some(user_id) = self.user_id.as_deref() else {
            return false;
        };
        if !self.debouncer.take_due(now) {
            return false;
        }
        match self.remote.save(user_id, snapshot) {
            Ok(()) => {
                debug!(user = user_id, "cloud snapshot written");
                true
            }
            Err(err) => {
                warn!(user = user_id, %err, "cloud save failed; next change retries");
                false
            }
        }
    }
}
