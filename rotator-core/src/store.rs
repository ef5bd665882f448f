//! Durable replication of the daemon [`Snapshot`].
//!
//! The daemon keeps one authoritative in-memory copy and writes it through after
//! every mutation; the store is never used as a cache to read back from.
//!
//! Write flow: serialize → `.tmp` sibling → `chmod 0600` → `rename`. The `.tmp`
//! file is in the same directory as the target, so the rename stays on one
//! filesystem.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{io_err, CoreError};
use crate::lists::ListFiles;
use crate::paths::{config_file, config_root};
use crate::types::Snapshot;

/// Load/save seam for the persisted snapshot.
pub trait ConfigStore: Send + Sync {
    /// Load the snapshot. A missing snapshot is created with defaults; an
    /// unreadable or invalid one is reported as an error so the caller can log
    /// it and fall back to [`Snapshot::default`].
    fn load(&self) -> Result<Snapshot, CoreError>;

    fn save(&self, snapshot: &Snapshot) -> Result<(), CoreError>;
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// `config.json` under the rotator state directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store rooted at `<home>/.config/pvpn-rotator/config.json`.
    pub fn at(home: &Path) -> Self {
        Self::new(config_file(home))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot without creating anything. `Ok(None)` when absent.
    pub fn read(&self) -> Result<Option<Snapshot>, CoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_err(&self.path, err)),
        };
        let snapshot: Snapshot =
            serde_json::from_str(&contents).map_err(|source| CoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        if let Some(reason) = snapshot.violation() {
            return Err(CoreError::InvalidSnapshot {
                path: self.path.clone(),
                reason,
            });
        }
        Ok(Some(snapshot))
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> Result<Snapshot, CoreError> {
        match self.read()? {
            Some(snapshot) => Ok(snapshot),
            None => {
                let snapshot = Snapshot::default();
                self.save(&snapshot)?;
                Ok(snapshot)
            }
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), CoreError> {
        let json = serde_json::to_string_pretty(snapshot)?;
        write_atomic(&self.path, json.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local store. Clones share the same slot, so a test can hand one
/// clone to the daemon and inspect writes through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemorySlot>>,
}

#[derive(Debug, Default)]
struct MemorySlot {
    snapshot: Option<Snapshot>,
    saves: usize,
}

impl MemoryStore {
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemorySlot {
                snapshot: Some(snapshot),
                saves: 0,
            })),
        }
    }

    /// Last snapshot written (or seeded).
    pub fn current(&self) -> Option<Snapshot> {
        self.lock().snapshot.clone()
    }

    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemorySlot> {
        // A poisoned slot still holds a usable snapshot.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<Snapshot, CoreError> {
        let mut slot = self.lock();
        Ok(slot.snapshot.get_or_insert_with(Snapshot::default).clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), CoreError> {
        let mut slot = self.lock();
        slot.snapshot = Some(snapshot.clone());
        slot.saves += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// First-run scaffold
// ---------------------------------------------------------------------------

/// Create the state directory, a default `config.json` and the example lists
/// if they do not exist yet. Existing files are left untouched.
pub fn init_at(home: &Path) -> Result<(), CoreError> {
    let root = config_root(home);
    if !root.exists() {
        std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
        set_dir_permissions(&root)?;
    }

    let store = JsonFileStore::at(home);
    if !store.path().exists() {
        store.save(&Snapshot::default())?;
        ListFiles::at(home).seed_examples()?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Atomically replace `path` with `contents` (mode 0600 on Unix).
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    std::fs::write(&tmp_path, contents).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ListId;
    use tempfile::TempDir;

    #[test]
    fn load_creates_defaults_on_first_run() {
        let home = TempDir::new().expect("tempdir");
        let store = JsonFileStore::at(home.path());
        let snapshot = store.load().expect("load");
        assert_eq!(snapshot, Snapshot::default());
        assert!(store.path().exists(), "first load must persist defaults");
    }

    #[test]
    fn save_and_load_roundtrip() {
        let home = TempDir::new().expect("tempdir");
        let store = JsonFileStore::at(home.path());
        let snapshot = Snapshot {
            active_list: ListId::B,
            switch_interval_minutes: 30,
            current_index: 2,
            running: true,
            paused: true,
        };
        store.save(&snapshot).expect("save");
        assert_eq!(store.load().expect("load"), snapshot);
    }

    #[test]
    fn atomic_write_cleans_up_tmp() {
        let home = TempDir::new().expect("tempdir");
        let store = JsonFileStore::at(home.path());
        store.save(&Snapshot::default()).expect("save");
        let tmp = store.path().with_file_name("config.json.tmp");
        assert!(!tmp.exists(), ".tmp must be gone after successful save");
    }

    #[cfg(unix)]
    #[test]
    fn saved_snapshot_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let home = TempDir::new().expect("tempdir");
        let store = JsonFileStore::at(home.path());
        store.save(&Snapshot::default()).expect("save");
        let mode = std::fs::metadata(store.path())
            .expect("metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn corrupt_json_is_reported() {
        let home = TempDir::new().expect("tempdir");
        let store = JsonFileStore::at(home.path());
        std::fs::create_dir_all(config_root(home.path())).expect("mkdir");
        std::fs::write(store.path(), "{ not json").expect("write");
        assert!(matches!(store.load(), Err(CoreError::Corrupt { .. })));
    }

    #[test]
    fn out_of_range_interval_is_reported() {
        let home = TempDir::new().expect("tempdir");
        let store = JsonFileStore::at(home.path());
        std::fs::create_dir_all(config_root(home.path())).expect("mkdir");
        std::fs::write(store.path(), r#"{"switch_interval_minutes": 0}"#).expect("write");
        let err = store.load().unwrap_err();
        assert!(matches!(err, CoreError::InvalidSnapshot { .. }), "got: {err}");
    }

    #[test]
    fn memory_store_counts_saves() {
        let store = MemoryStore::default();
        let handle = store.clone();
        store.save(&Snapshot::default()).expect("save");
        store.save(&Snapshot::default()).expect("save");
        assert_eq!(handle.save_count(), 2);
        assert_eq!(handle.current(), Some(Snapshot::default()));
    }

    #[test]
    fn init_seeds_example_lists_once() {
        let home = TempDir::new().expect("tempdir");
        init_at(home.path()).expect("init");
        let lists = ListFiles::at(home.path());
        assert_eq!(
            lists.read(ListId::A).expect("read A"),
            vec!["US-FREE#1", "CA#5", "NL-FREE#1"]
        );

        lists
            .overwrite(ListId::A, &["JP#1".to_string()])
            .expect("overwrite");
        init_at(home.path()).expect("second init");
        assert_eq!(lists.read(ListId::A).expect("read A"), vec!["JP#1"]);
    }
}
