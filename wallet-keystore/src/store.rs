use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_with::serde_as;
use std::{
    collections::BTreeMap,
    fmt::Debug,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

/// Generic Key-Value Store trait for backing storage of keys and their associated data.
pub trait KVStore<K: Clone + Debug, V: Clone> {
    type Error: std::error::Error + Send + Sync;

    /// Retrieves a value associated with the given key.
    fn get(&self, key: &K) -> Result<Option<V>, Self::Error>;

    /// Stores a key-value pair.
    fn set(&self, key: K, value: V) -> Result<(), Self::Error>;

    /// Stores all key-value pairs in one write.
    fn set_all(&self, entries: Vec<(K, V)>) -> Result<(), Self::Error>;

    /// Removes a key-value pair, returning whether it existed.
    fn delete(&self, key: &K) -> Result<bool, Self::Error>;

    /// Lists all keys in the store.
    fn keys(&self) -> Result<Vec<K>, Self::Error>;

    /// Checks if a key exists in the store.
    fn contains_key(&self, key: &K) -> Result<bool, Self::Error>;
}

/// JSON file storage for the keystore.
///
/// The whole database is kept in memory and rewritten to disk after every mutation. A mutation
/// is written to a temporary file which then replaces the store file; memory is only updated
/// once that succeeded, so a failed write leaves both unchanged.
/// Values are stored as provided; encrypting them is the caller's job.
///
/// ## Cloning
///
/// The `FileStore` is cloneable, all clones share the same underlying data.
#[derive(Clone)]
pub struct FileStore<K: Ord, V> {
    path: PathBuf,
    db: Arc<RwLock<Database<K, V>>>,
}

impl<K: Ord, V> Debug for FileStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .finish()
    }
}

// Records are written as a list of pairs, so keys don't need to serialize as JSON strings.
#[serde_as]
#[derive(Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize + Ord, V: Serialize",
    deserialize = "K: DeserializeOwned + Ord, V: DeserializeOwned"
))]
struct Database<K: Ord, V> {
    #[serde_as(as = "Vec<(_, _)>")]
    records: BTreeMap<K, V>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("JSON serialization/deserialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Store lock poisoned")]
    Poisoned,
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::IoError(err.to_string())
    }
}

impl<K, V> KVStore<K, V> for FileStore<K, V>
where
    K: Clone + Debug + Serialize + DeserializeOwned + Ord,
    V: Clone + Serialize + DeserializeOwned,
{
    type Error = StoreError;

    fn get(&self, key: &K) -> Result<Option<V>, Self::Error> {
        let db = self.db.read().map_err(|_| StoreError::Poisoned)?;
        Ok(db.records.get(key).cloned())
    }

    fn set(&self, key: K, value: V) -> Result<(), Self::Error> {
        self.set_all(vec![(key, value)])
    }

    fn set_all(&self, entries: Vec<(K, V)>) -> Result<(), Self::Error> {
        let mut db = self.db.write().map_err(|_| StoreError::Poisoned)?;
        let mut next = db.clone();
        next.records.extend(entries);
        self.save(&next)?;
        *db = next;
        Ok(())
    }

    fn delete(&self, key: &K) -> Result<bool, Self::Error> {
        let mut db = self.db.write().map_err(|_| StoreError::Poisoned)?;
        if !db.records.contains_key(key) {
            return Ok(false);
        }
        let mut next = db.clone();
        next.records.remove(key);
        self.save(&next)?;
        *db = next;
        Ok(true)
    }

    fn keys(&self) -> Result<Vec<K>, Self::Error> {
        let db = self.db.read().map_err(|_| StoreError::Poisoned)?;
        Ok(db.records.keys().cloned().collect())
    }

    fn contains_key(&self, key: &K) -> Result<bool, Self::Error> {
        let db = self.db.read().map_err(|_| StoreError::Poisoned)?;
        Ok(db.records.contains_key(key))
    }
}

impl<K, V> FileStore<K, V>
where
    K: Clone + Debug + Serialize + DeserializeOwned + Ord,
    V: Clone + Serialize + DeserializeOwned,
{
    /// Opens the store at `path`, creating the file if it does not exist.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let me = Self {
            path: path.to_path_buf(),
            db: Arc::new(RwLock::new(Database {
                records: BTreeMap::new(),
            })),
        };
        if path.exists() {
            me.load()?;
        } else {
            // Create the file right away, to fail early if it cannot be created.
            let db = me.db.read().map_err(|_| StoreError::Poisoned)?;
            me.save(&db)?;
        }

        Ok(me)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<(), StoreError> {
        let file = std::fs::OpenOptions::new().read(true).open(&self.path)?;

        let database: Database<K, V> = serde_json::from_reader(&file)?;

        self.db.write().map_err(|_| StoreError::Poisoned)?.records = database.records;

        Ok(())
    }

    fn save(&self, db: &Database<K, V>) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(db)?;
        let temp_path = self.temp_path()?;

        let written = Self::write_file(&temp_path, &json)
            .and_then(|()| std::fs::rename(&temp_path, &self.path));
        if let Err(err) = written {
            let _ = std::fs::remove_file(&temp_path);
            return Err(err.into());
        }
        Ok(())
    }

    fn write_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.write_all(contents)?;
        file.sync_all()
    }

    /// Sibling of the store file, so the final rename stays on one filesystem.
    fn temp_path(&self) -> Result<PathBuf, StoreError> {
        let file_name = self.path.file_name().ok_or_else(|| {
            StoreError::IoError(format!("invalid store path: {}", self.path.display()))
        })?;
        let mut temp_name = file_name.to_os_string();
        temp_name.push(".tmp");
        Ok(self.path.with_file_name(temp_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
    enum TestKey {
        Header,
        Item(String),
    }

    #[test]
    fn test_file_store_persists_records() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let path = temp_dir.path().join("store.json");

        {
            let store: FileStore<TestKey, u32> = FileStore::new(&path).expect("open");
            store.set(TestKey::Header, 1).unwrap();
            store.set(TestKey::Item("a".into()), 2).unwrap();
        }

        let store: FileStore<TestKey, u32> = FileStore::new(&path).expect("reopen");
        assert_eq!(store.get(&TestKey::Header).unwrap(), Some(1));
        assert_eq!(store.get(&TestKey::Item("a".into())).unwrap(), Some(2));
        assert_eq!(store.keys().unwrap().len(), 2);
    }

    #[test]
    fn test_file_store_delete() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store: FileStore<TestKey, u32> =
            FileStore::new(&temp_dir.path().join("store.json")).unwrap();

        store.set(TestKey::Item("a".into()), 2).unwrap();
        assert!(store.delete(&TestKey::Item("a".into())).unwrap());
        assert!(!store.delete(&TestKey::Item("a".into())).unwrap());
        assert!(!store.contains_key(&TestKey::Item("a".into())).unwrap());
    }

    #[test]
    fn test_failed_write_leaves_store_unchanged() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let path = temp_dir.path().join("store.json");
        let store: FileStore<TestKey, u32> = FileStore::new(&path).unwrap();
        store.set(TestKey::Item("a".into()), 1).unwrap();

        // a directory in place of the file makes the final rename fail
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let result = store.set_all(vec![
            (TestKey::Header, 9),
            (TestKey::Item("a".into()), 2),
        ]);
        assert!(matches!(result, Err(StoreError::IoError(_))));
        assert!(store.delete(&TestKey::Item("a".into())).is_err());

        assert_eq!(store.get(&TestKey::Item("a".into())).unwrap(), Some(1));
        assert_eq!(store.get(&TestKey::Header).unwrap(), None);
        assert!(!temp_dir.path().join("store.json.tmp").exists());
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let path = temp_dir.path().join("store.json");
        std::fs::write(&path, b"not json").unwrap();

        let result: Result<FileStore<TestKey, u32>, _> = FileStore::new(&path);
        assert!(matches!(result, Err(StoreError::JsonError(_))));
    }
}
