//! Durable client state on redb.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, info, instrument};

use blockshare_core::{ClientStore, StoreError};

// Key: flat client key (`contractAddress`, `userToken`, ...), Value: string
const CLIENT_STATE: TableDefinition<&str, &str> = TableDefinition::new("client_state");

fn io(e: impl std::fmt::Display) -> StoreError {
    StoreError::Io(e.to_string())
}

/// [`ClientStore`] persisted in a single redb table.
pub struct RedbClientStore {
    db: Arc<Database>,
    path: PathBuf,
}

impl RedbClientStore {
    /// Open or create the database at `path`.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }

        let db = Database::create(&path).map_err(io)?;
        let write_txn = db.begin_write().map_err(io)?;
        write_txn.open_table(CLIENT_STATE).map_err(io)?;
        write_txn.commit().map_err(io)?;

        info!("Opened client store");
        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(CLIENT_STATE).map_err(io)?;
        let mut keys = Vec::new();
        for entry in table.iter().map_err(io)? {
            let (key, _) = entry.map_err(io)?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }
}

impl ClientStore for RedbClientStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(CLIENT_STATE).map_err(io)?;
        let value = table.get(key).map_err(io)?.map(|v| v.value().to_string());
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = write_txn.open_table(CLIENT_STATE).map_err(io)?;
            table.insert(key, value).map_err(io)?;
        }
        write_txn.commit().map_err(io)?;
        debug!(key, "Client state updated");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = write_txn.open_table(CLIENT_STATE).map_err(io)?;
            table.remove(key).map_err(io)?;
        }
        write_txn.commit().map_err(io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockshare_core::{CONTRACT_ADDRESS_KEY, USER_TOKEN_KEY};
    use tempfile::TempDir;

    #[test]
    fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("client.redb");

        {
            let store = RedbClientStore::open(&path).unwrap();
            store.set(CONTRACT_ADDRESS_KEY, "0xabc").unwrap();
            store.set(USER_TOKEN_KEY, "token").unwrap();
        }

        let store = RedbClientStore::open(&path).unwrap();
        assert_eq!(
            store.get(CONTRACT_ADDRESS_KEY).unwrap().as_deref(),
            Some("0xabc")
        );
        assert_eq!(store.keys().unwrap(), vec!["contractAddress", "userToken"]);
    }

    #[test]
    fn test_remove_and_missing() {
        let dir = TempDir::new().unwrap();
        let store = RedbClientStore::open(dir.path().join("c.redb")).unwrap();
        assert_eq!(store.get(USER_TOKEN_KEY).unwrap(), None);

        store.set(USER_TOKEN_KEY, "t").unwrap();
        store.remove(USER_TOKEN_KEY).unwrap();
        store.remove(USER_TOKEN_KEY).unwrap();
        assert_eq!(store.get(USER_TOKEN_KEY).unwrap(), None);
    }
}
