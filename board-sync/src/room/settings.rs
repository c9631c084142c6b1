//! Local key-value settings (per device)

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, TableDefinition};

use crate::store::StoreResult;

/// Settings table: key = setting name, value = raw string
const SETTINGS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("settings");

/// Device-local settings storage
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// redb-backed settings file
#[derive(Clone)]
pub struct LocalSettings {
    db: Arc<Database>,
}

impl LocalSettings {
    /// Open or create the settings file
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::init(Database::create(path)?)
    }

    pub fn in_memory() -> StoreResult<Self> {
        Self::init(Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?)
    }

    fn init(db: Database) -> StoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SETTINGS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl SettingsStore for LocalSettings {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SETTINGS_TABLE)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SETTINGS_TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
