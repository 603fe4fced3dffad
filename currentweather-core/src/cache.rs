//! Last successful weather response, persisted in a key-value store.

use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    error::StoreError,
    model::{Units, WeatherRecord},
};

/// Slot holding the serialized [`WeatherRecord`].
pub const WEATHER_RESPONSE_DATA: &str = "weather_response_data";

/// Slot holding the [`Units`] the cached record was fetched in.
pub const WEATHER_RESPONSE_UNITS: &str = "weather_response_units";

/// String key-value storage with read-after-write consistency per key.
pub trait KeyValueStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn put(&self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.slots.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.slots.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.slots.lock().remove(key);
        Ok(())
    }
}

/// A JSON object file holding every slot.
///
/// Writes go to a sibling temp file that is then renamed over the target,
/// so readers see either the old map or the new one.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io { path: self.path.display().to_string(), source }
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    /// Unreadable contents count as an empty map; the next write replaces them.
    fn read_map_or_empty(&self) -> BTreeMap<String, String> {
        self.read_map().unwrap_or_else(|e| {
            warn!(error = %e, path = %self.path.display(), "discarding unreadable store");
            BTreeMap::new()
        })
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let text = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock();
        Ok(self.read_map()?.remove(key))
    }

    fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut map = self.read_map_or_empty();
        map.insert(key.to_string(), value);
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        match self.read_map() {
            Ok(mut map) => {
                if map.remove(key).is_some() {
                    self.write_map(&map)?;
                }
                Ok(())
            }
            Err(StoreError::Serialize(e)) => {
                warn!(error = %e, path = %self.path.display(), "discarding unreadable store");
                self.write_map(&BTreeMap::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// Single-slot cache of the most recent [`WeatherRecord`].
#[derive(Debug)]
pub struct WeatherCache<S> {
    store: S,
}

impl<S: KeyValueStore> WeatherCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replace the cached record with `record`, fetched in `units`.
    ///
    /// If the units cannot be written after the record, the units slot is
    /// dropped so the new record is never paired with older units.
    pub fn save(&self, record: &WeatherRecord, units: Units) -> Result<(), StoreError> {
        let text = serde_json::to_string(record)?;
        self.store.put(WEATHER_RESPONSE_DATA, text)?;

        if let Err(e) = self.store.put(WEATHER_RESPONSE_UNITS, units.as_str().to_string()) {
            if let Err(remove_err) = self.store.remove(WEATHER_RESPONSE_UNITS) {
                warn!(error = %remove_err, "failed to drop cached units");
            }
            return Err(e);
        }

        info!(name = %record.name, %units, "cached weather record");
        Ok(())
    }

    /// Units of the cached record, or `None` when unknown.
    pub fn load_units(&self) -> Option<Units> {
        match self.store.get(WEATHER_RESPONSE_UNITS) {
            Ok(Some(text)) => Units::try_from(text.as_str())
                .inspect_err(|e| debug!(error = %e, "cached units did not parse"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "failed to read cached units");
                None
            }
        }
    }

    /// The cached record, or `None` when nothing usable is stored.
    ///
    /// Unparseable contents and storage failures are treated as absent.
    pub fn load(&self) -> Option<WeatherRecord> {
        let text = match self.store.get(WEATHER_RESPONSE_DATA) {
            Ok(Some(text)) if !text.is_empty() => text,
            Ok(_) => {
                debug!("no cached weather record");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "failed to read weather cache");
                return None;
            }
        };

        match serde_json::from_str(&text) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(error = %e, "cached weather record did not parse");
                None
            }
        }
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(WEATHER_RESPONSE_DATA)?;
        self.store.remove(WEATHER_RESPONSE_UNITS)
    }
}
