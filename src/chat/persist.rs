use crate::chat::ThreadSnapshot;
use crate::error::StoreError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::{collections::HashMap, sync::Mutex};
use tracing::{debug, warn};

pub const THREADS_KEY: &str = "lumina_chats";

/// String key-value storage backing the thread collection.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One `<key>.json` file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn io_error(path: &Path, source: io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Self::io_error(&path, err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(|err| Self::io_error(&self.root, err))?;

        let final_path = self.path_for(key);
        let tmp_path = self.root.join(format!("{key}.json.tmp"));
        fs::write(&tmp_path, value).map_err(|err| Self::io_error(&tmp_path, err))?;

        match fs::rename(&tmp_path, &final_path) {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                // Windows refuses to rename over an existing file.
                if final_path.exists() {
                    fs::remove_file(&final_path).map_err(|err| Self::io_error(&final_path, err))?;
                    fs::rename(&tmp_path, &final_path)
                        .map_err(|err| Self::io_error(&final_path, err))
                } else {
                    Err(Self::io_error(&final_path, rename_err))
                }
            }
        }
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

#[cfg(test)]
impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Loads and saves whole [`ThreadSnapshot`]s under a single key.
pub struct ThreadRepository {
    store: Box<dyn KeyValueStore + Send>,
    key: String,
}

impl ThreadRepository {
    pub fn new(store: Box<dyn KeyValueStore + Send>) -> Self {
        Self::with_key(store, THREADS_KEY)
    }

    pub fn with_key(store: Box<dyn KeyValueStore + Send>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// `Ok(None)` when nothing has been stored yet; a parse failure is an error
    /// so the caller can decide to start over.
    pub fn load(&self) -> Result<Option<ThreadSnapshot>, StoreError> {
        let Some(raw) = self.store.get(&self.key)? else {
            debug!(key = %self.key, "no persisted threads");
            return Ok(None);
        };
        let snapshot: ThreadSnapshot = serde_json::from_str(&raw)?;
        Ok(Some(snapshot))
    }

    /// Full overwrite of the stored collection. Empty collections are skipped.
    pub fn save(&self, snapshot: &ThreadSnapshot) -> Result<(), StoreError> {
        if snapshot.threads.is_empty() {
            return Ok(());
        }
        let raw = serde_json::to_string(snapshot)?;
        self.store.set(&self.key, &raw)
    }

    /// Loads, logging and discarding anything unreadable.
    pub fn load_or_discard(&self) -> Option<ThreadSnapshot> {
        match self.load() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("persisted threads unreadable, starting fresh: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::store::ChatStore;
    use crate::chat::{ChatThread, Message};
    use tempfile::tempdir;

    fn memory_repository() -> ThreadRepository {
        ThreadRepository::new(Box::new(MemoryKeyValueStore::default()))
    }

    #[test]
    fn load_from_empty_store_is_none() {
        let repository = memory_repository();
        assert!(repository.load().expect("load should succeed").is_none());
    }

    #[test]
    fn save_then_load_reproduces_threads_in_order() {
        let repository = memory_repository();
        let mut first = ChatThread::seeded("10", "First", "hello", 10);
        first.messages.push(Message::user("question"));
        first.messages.push(Message::model("answer"));
        let snapshot = ThreadSnapshot {
            threads: vec![first, ChatThread::seeded("1", "Second", "hi", 1)],
        };

        repository.save(&snapshot).expect("save should succeed");
        let restored = repository
            .load()
            .expect("load should succeed")
            .expect("snapshot should exist");
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn corrupt_payload_is_reported_then_discarded() {
        let store = MemoryKeyValueStore::default();
        store.set(THREADS_KEY, "{not json").expect("seed corrupt data");
        let repository = ThreadRepository::new(Box::new(store));

        assert!(matches!(repository.load(), Err(StoreError::Json(_))));
        assert!(repository.load_or_discard().is_none());

        let chat_store = ChatStore::initialize(repository.load_or_discard(), 7);
        assert_eq!(chat_store.threads().len(), 1);
    }

    #[test]
    fn empty_snapshot_is_not_written() {
        let repository = memory_repository();
        repository
            .save(&ThreadSnapshot::default())
            .expect("save should succeed");
        assert!(repository.load().expect("load should succeed").is_none());
    }

    #[test]
    fn file_store_round_trips_and_overwrites() {
        let temp = tempdir().unwrap();
        let store = FileKeyValueStore::new(temp.path().join("data"));

        assert!(store.get("k").unwrap().is_none());
        store.set("k", "one").unwrap();
        store.set("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));
        assert!(!temp.path().join("data").join("k.json.tmp").exists());
    }

    #[test]
    fn file_backed_repository_restores_store_state() {
        let temp = tempdir().unwrap();
        let repository = ThreadRepository::new(Box::new(FileKeyValueStore::new(temp.path())));

        let mut store = ChatStore::initialize(None, 1);
        let id = store.create_thread(2);
        store.append_message(&id, Message::user("hello"));
        repository.save(&store.snapshot()).unwrap();

        let restored = ChatStore::initialize(repository.load().unwrap(), 99);
        assert_eq!(restored.threads(), store.threads());
        assert_eq!(restored.active_id(), Some(id.as_str()));
    }
}
