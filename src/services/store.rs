//! Persistence adapter for per-timer pause bookkeeping
//!
//! One small JSON blob per timer-id so a reload keeps in-flight pause state.
//! Callers treat every failure here as best-effort.

use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};
use tracing::debug;

use crate::{error::StoreError, state::PersistedTimer};

/// Durable small-blob key/value store keyed by timer-id
pub trait TimerStore: Send + Sync + std::fmt::Debug {
    fn save(&self, timer_id: &str, blob: &PersistedTimer) -> Result<(), StoreError>;
    fn load(&self, timer_id: &str) -> Result<Option<PersistedTimer>, StoreError>;
    fn remove(&self, timer_id: &str) -> Result<(), StoreError>;
}

/// In-process store, lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, PersistedTimer>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TimerStore for MemoryStore {
    fn save(&self, timer_id: &str, blob: &PersistedTimer) -> Result<(), StoreError> {
        let mut blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        blobs.insert(timer_id.to_string(), *blob);
        Ok(())
    }

    fn load(&self, timer_id: &str) -> Result<Option<PersistedTimer>, StoreError> {
        let blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(blobs.get(timer_id).copied())
    }

    fn remove(&self, timer_id: &str) -> Result<(), StoreError> {
        let mut blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        blobs.remove(timer_id);
        Ok(())
    }
}

/// Suffix source for temp files, so concurrent saves never share one
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// One JSON file per timer under a state directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Use `dir` as the state directory, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            key: String::new(),
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a timer-id: the id's UTF-8 bytes in lowercase hex, so
    /// distinct ids never share a file even on case-insensitive filesystems.
    pub fn path_for(&self, timer_id: &str) -> PathBuf {
        self.dir
            .join(format!("timer_state_{}.json", hex::encode(timer_id.as_bytes())))
    }
}

impl TimerStore for JsonFileStore {
    fn save(&self, timer_id: &str, blob: &PersistedTimer) -> Result<(), StoreError> {
        let path = self.path_for(timer_id);
        let json = serde_json::to_vec(blob).map_err(|source| StoreError::Serialize {
            key: timer_id.to_string(),
            source,
        })?;

        // Write then rename so a crash never leaves half a blob behind
        let tmp = path.with_extension(format!(
            "json.{}-{}.tmp",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, json)
            .and_then(|()| fs::rename(&tmp, &path))
            .map_err(|source| StoreError::Io {
                key: timer_id.to_string(),
                path: path.clone(),
                source,
            })?;

        debug!("Saved timer state for {} to {}", timer_id, path.display());
        Ok(())
    }

    fn load(&self, timer_id: &str) -> Result<Option<PersistedTimer>, StoreError> {
        let path = self.path_for(timer_id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    key: timer_id.to_string(),
                    path,
                    source,
                })
            }
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: timer_id.to_string(),
                details: e.to_string(),
            })
    }

    fn remove(&self, timer_id: &str) -> Result<(), StoreError> {
        let path = self.path_for(timer_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                key: timer_id.to_string(),
                path,
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn paused_blob() -> PersistedTimer {
        PersistedTimer {
            is_paused: true,
            accumulated_paused_duration: 12_000,
            current_pause_started_at: Some(1_700_000_000_000),
        }
    }

    #[test]
    fn memory_store_round_trip_and_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.load("a").unwrap(), None);
        store.save("a", &paused_blob()).unwrap();
        assert_eq!(store.load("a").unwrap(), Some(paused_blob()));
        store.remove("a").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn memory_store_len_survives_a_poisoned_lock() {
        let store = std::sync::Arc::new(MemoryStore::new());
        store.save("a", &paused_blob()).unwrap();
        let poisoner = std::sync::Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.blobs.lock().unwrap();
            panic!("poisoning the blob map");
        })
        .join();

        assert!(store.blobs.is_poisoned());
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn file_store_round_trips_exactly() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store.save("task-42", &paused_blob()).unwrap();
        assert_eq!(store.load("task-42").unwrap(), Some(paused_blob()));

        let raw = fs::read_to_string(store.path_for("task-42")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["isPaused"], true);
        assert_eq!(value["accumulatedPausedDuration"], 12_000);
        assert_eq!(value["currentPauseStartedAt"], 1_700_000_000_000_i64);
    }

    #[test]
    fn file_store_missing_entries_are_absent_not_errors() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert_eq!(store.load("nope").unwrap(), None);
        store.remove("nope").unwrap();
    }

    #[test]
    fn file_store_reports_corrupt_blobs() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        fs::write(store.path_for("bad"), b"{not json").unwrap();
        assert!(matches!(store.load("bad"), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn file_names_stay_inside_the_state_dir() {
        let store = JsonFileStore { dir: PathBuf::from("/state") };
        assert_eq!(
            store.path_for("../etc/passwd"),
            PathBuf::from("/state/timer_state_2e2e2f6574632f706173737764.json")
        );
    }

    #[test]
    fn look_alike_ids_keep_separate_blobs() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        let ids = ["task_1", "task/1", "a/b", "a_b", "A_B", "a.b", "ünï/çødé", ""];

        for (n, id) in ids.iter().enumerate() {
            let blob = PersistedTimer {
                is_paused: false,
                accumulated_paused_duration: n as i64 * 1_000,
                current_pause_started_at: None,
            };
            store.save(id, &blob).unwrap();
        }
        for (n, id) in ids.iter().enumerate() {
            let blob = store.load(id).unwrap().unwrap();
            assert_eq!(blob.accumulated_paused_duration, n as i64 * 1_000, "id {:?}", id);
        }

        store.remove("task/1").unwrap();
        assert_eq!(store.load("task/1").unwrap(), None);
        assert_eq!(store.load("task_1").unwrap().unwrap().accumulated_paused_duration, 0);
        assert_eq!(store.load("a_b").unwrap().unwrap().accumulated_paused_duration, 3_000);
    }

    #[test]
    fn saves_leave_no_temp_files_behind() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store.save("t", &paused_blob()).unwrap();
        store.save("t", &paused_blob()).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn concurrent_saves_of_one_id_all_land() {
        let dir = tempdir().unwrap();
        let store = std::sync::Arc::new(JsonFileStore::open(dir.path()).unwrap());
        let writers: Vec<_> = (0..8)
            .map(|n| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    let blob = PersistedTimer {
                        is_paused: false,
                        accumulated_paused_duration: n,
                        current_pause_started_at: None,
                    };
                    for _ in 0..20 {
                        store.save("shared", &blob).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let blob = store.load("shared").unwrap().unwrap();
        assert!((0..8).contains(&blob.accumulated_paused_duration));
    }
}
