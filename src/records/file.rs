//! Durable record store: tables rebuilt from an append-only mutation log.

use super::log::MutationLog;
use super::memory::written;
use super::query::{Filter, OrderBy, Patch};
use super::table::{Mutation, Tables};
use super::RecordStore;
use crate::error::{Result, StoreError};
use crate::subscriptions::{SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager};
use crate::types::{Collection, Fields, Record, RecordId, Timestamp, UserId};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Directory holding the store.
    pub path: PathBuf,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Sync the log every N mutations (1 = every mutation).
    pub sync_every: u64,

    /// How long to wait for another process to release the store lock.
    pub lock_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./habits"),
            create_if_missing: true,
            sync_every: 1,
            lock_timeout: Duration::from_secs(2),
        }
    }
}

/// Magic bytes for store manifest.
const STORE_MAGIC: &[u8; 4] = b"HAB\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

/// Interval between lock attempts while waiting.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Record store persisted to a directory.
///
/// Layout: `MANIFEST`, `LOCK` and `records.log`. The log is replayed into
/// memory on open; every later write is logged before it becomes visible.
pub struct FileStore {
    config: StoreConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    log: MutationLog,

    tables: RwLock<Tables>,

    /// Serializes prepare/log/apply so log order matches apply order.
    write_lock: Mutex<()>,

    session: RwLock<Option<UserId>>,

    subscriptions: SubscriptionManager,
}

impl FileStore {
    /// Open an existing store or create a new one.
    pub fn open_or_create(config: StoreConfig) -> Result<Self> {
        if config.path.join("MANIFEST").exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Create a new store.
    pub fn create(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)?;
        Self::write_manifest(&config.path)?;
        Self::load(config)
    }

    /// Open an existing store.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::verify_manifest(&config.path)?;
        Self::load(config)
    }

    fn load(config: StoreConfig) -> Result<Self> {
        let lock_file = Self::acquire_lock(&config.path, config.lock_timeout)?;

        let (log, mutations) = MutationLog::open(config.path.join("records.log"), config.sync_every)?;
        let mut tables = Tables::new();
        for mutation in &mutations {
            tables.apply(mutation);
        }

        tracing::info!(
            path = %config.path.display(),
            replayed = mutations.len(),
            habits = tables.len(Collection::Habits),
            completions = tables.len(Collection::HabitCompletions),
            "opened habit store"
        );

        Ok(Self {
            config,
            _lock_file: lock_file,
            log,
            tables: RwLock::new(tables),
            write_lock: Mutex::new(()),
            session: RwLock::new(None),
            subscriptions: SubscriptionManager::new(),
        })
    }

    /// Start a session as `user`.
    pub fn sign_in(&self, user: UserId) {
        *self.session.write() = Some(user);
    }

    /// End the current session.
    pub fn sign_out(&self) {
        *self.session.write() = None;
    }

    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.subscriptions.subscribe(config)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id)
    }

    /// Number of rows in a collection across all owners.
    pub fn len(&self, collection: Collection) -> usize {
        self.tables.read().len(collection)
    }

    pub fn is_empty(&self) -> bool {
        Collection::ALL.iter().all(|c| self.len(*c) == 0)
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Force all logged mutations to disk.
    pub fn sync(&self) -> Result<()> {
        self.log.sync()
    }

    fn require_user(&self) -> Result<UserId> {
        self.session.read().clone().ok_or(StoreError::Unauthenticated)
    }

    fn commit(&self, prepare: impl FnOnce(&Tables, &UserId) -> Result<Mutation>) -> Result<Mutation> {
        let user = self.require_user()?;
        let _lock = self.write_lock.lock();

        let mutation = prepare(&*self.tables.read(), &user)?;
        self.log.append(&mutation)?;
        let events = self.tables.write().apply(&mutation);
        drop(_lock);

        for event in &events {
            self.subscriptions.broadcast(event);
        }
        Ok(mutation)
    }

    fn write_manifest(path: &Path) -> Result<()> {
        use std::io::Write;

        let manifest_path = path.join("MANIFEST");
        let mut file = File::create(manifest_path)?;

        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()?;

        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        use std::io::Read;

        let manifest_path = path.join("MANIFEST");
        if !manifest_path.exists() {
            return Err(StoreError::NotInitialized);
        }
        let mut file = File::open(manifest_path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid store magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STORE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported store version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    /// Take the exclusive directory lock, polling until `timeout` elapses.
    /// A zero timeout fails immediately with `Locked`.
    fn acquire_lock(path: &Path, timeout: Duration) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;
        let deadline = Instant::now() + timeout;

        loop {
            match lock_file.try_lock_exclusive() {
                Ok(()) => return Ok(lock_file),
                Err(_) if timeout.is_zero() => return Err(StoreError::Locked),
                Err(_) if Instant::now() >= deadline => {
                    tracing::warn!(path = %path.display(), ?timeout, "gave up waiting for store lock");
                    return Err(StoreError::Timeout(timeout));
                }
                Err(_) => thread::sleep(LOCK_POLL_INTERVAL),
            }
        }
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.sync();
    }
}

impl RecordStore for FileStore {
    fn query(
        &self,
        collection: Collection,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Record>> {
        let user = self.require_user()?;
        Ok(self.tables.read().query(&user, collection, filter, order))
    }

    fn insert(&self, collection: Collection, fields: Fields) -> Result<Record> {
        written(self.commit(|tables, user| {
            tables.prepare_insert(user, collection, fields, Timestamp::now())
        })?)
    }

    fn update(&self, collection: Collection, id: RecordId, patch: &Patch) -> Result<Record> {
        written(self.commit(|tables, user| {
            tables.prepare_update(user, collection, id, patch, Timestamp::now())
        })?)
    }

    fn delete(&self, collection: Collection, id: RecordId) -> Result<()> {
        self.commit(|tables, user| tables.prepare_delete(user, collection, id))?;
        Ok(())
    }

    fn current_user(&self) -> Option<UserId> {
        self.session.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> StoreConfig {
        StoreConfig {
            path: dir.path().join("store"),
            lock_timeout: Duration::from_millis(100),
            ..Default::default()
        }
    }

    #[test]
    fn test_open_missing_without_create() {
        let dir = TempDir::new().unwrap();
        let result = FileStore::open_or_create(StoreConfig {
            create_if_missing: false,
            ..config(&dir)
        });
        assert!(matches!(result, Err(StoreError::NotInitialized)));
    }

    #[test]
    fn test_second_open_times_out() {
        let dir = TempDir::new().unwrap();
        let _store = FileStore::create(config(&dir)).unwrap();

        let result = FileStore::open(config(&dir));
        assert!(matches!(result, Err(StoreError::Timeout(_))));

        let result = FileStore::open(StoreConfig {
            lock_timeout: Duration::ZERO,
            ..config(&dir)
        });
        assert!(matches!(result, Err(StoreError::Locked)));
    }

    #[test]
    fn test_rejected_write_is_not_logged() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::create(config(&dir)).unwrap();
        store.sign_in(UserId::new("u1"));

        let result = store.insert(
            Collection::Habits,
            json!({"owner": "u2"}).as_object().cloned().unwrap(),
        );
        assert!(result.is_err());
        assert_eq!(store.log.size(), 0);
    }

    #[test]
    fn test_invalid_manifest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("MANIFEST"), b"XXXX\x01").unwrap();

        let result = FileStore::open(config(&dir));
        assert!(matches!(result, Err(StoreError::InvalidFormat(_))));
    }
}
