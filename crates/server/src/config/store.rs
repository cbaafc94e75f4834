//! Preference store implementations.

use bridgeftpd_platform::{BridgeError, BridgeResult, PreferenceStore, PreferenceValue};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory preference store.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, PreferenceValue>>,
}

impl MemoryPreferences {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<PreferenceValue> {
        lock(&self.values).get(key).cloned()
    }

    fn put(&self, key: &str, value: PreferenceValue) -> BridgeResult<()> {
        lock(&self.values).insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> BridgeResult<()> {
        lock(&self.values).remove(key);
        Ok(())
    }
}

/// Preference store persisted as a flat JSON object.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a crash never leaves a truncated file behind.
#[derive(Debug)]
pub struct JsonFilePreferences {
    path: PathBuf,
    values: Mutex<BTreeMap<String, PreferenceValue>>,
}

impl JsonFilePreferences {
    /// Opens the store at `path`; a missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn open(path: impl Into<PathBuf>) -> BridgeResult<Self> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                BridgeError::Config(format!("invalid preferences {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(BridgeError::Io(e)),
        };
        debug!(path = %path.display(), "preferences opened");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `values` to disk; memory is only updated once this succeeds.
    fn commit(&self, values: &BTreeMap<String, PreferenceValue>) -> BridgeResult<()> {
        let text =
            serde_json::to_string_pretty(values).map_err(|e| BridgeError::Other(Box::new(e)))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PreferenceStore for JsonFilePreferences {
    fn get(&self, key: &str) -> Option<PreferenceValue> {
        lock(&self.values).get(key).cloned()
    }

    fn put(&self, key: &str, value: PreferenceValue) -> BridgeResult<()> {
        let mut values = lock(&self.values);
        let mut next = values.clone();
        next.insert(key.to_string(), value);
        self.commit(&next)?;
        *values = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> BridgeResult<()> {
        let mut values = lock(&self.values);
        if !values.contains_key(key) {
            return Ok(());
        }
        let mut next = values.clone();
        next.remove(key);
        self.commit(&next)?;
        *values = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config, PREF_KEY_PORT, PREF_KEY_WAKELOCK};

    #[test]
    fn test_json_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let prefs = JsonFilePreferences::open(&path).unwrap();
        prefs.put_string(PREF_KEY_PORT, "3000").unwrap();
        prefs.put_bool(PREF_KEY_WAKELOCK, false).unwrap();
        drop(prefs);

        let reopened = JsonFilePreferences::open(&path).unwrap();
        assert_eq!(reopened.get_string(PREF_KEY_PORT).as_deref(), Some("3000"));
        assert_eq!(reopened.get_bool(PREF_KEY_WAKELOCK), Some(false));
    }

    #[test]
    fn test_json_store_persists_port_correction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, r#"{ "portPref": "99" }"#).unwrap();

        let prefs = JsonFilePreferences::open(&path).unwrap();
        let loaded = load_config(&prefs);
        assert_eq!(loaded.config.port, 12345);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"12345\""));
    }

    #[test]
    fn test_json_store_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let prefs = JsonFilePreferences::open(&path).unwrap();
        prefs.put_string(PREF_KEY_PORT, "3000").unwrap();

        // the directory is gone, so every later write fails
        std::fs::remove_dir_all(dir.path()).unwrap();

        assert!(prefs.put_string(PREF_KEY_PORT, "4000").is_err());
        assert_eq!(prefs.get_string(PREF_KEY_PORT).as_deref(), Some("3000"));

        assert!(prefs.put_bool(PREF_KEY_WAKELOCK, true).is_err());
        assert_eq!(prefs.get_bool(PREF_KEY_WAKELOCK), None);

        assert!(prefs.remove(PREF_KEY_PORT).is_err());
        assert_eq!(prefs.get_string(PREF_KEY_PORT).as_deref(), Some("3000"));

        // removing an absent key never touches disk
        assert!(prefs.remove(PREF_KEY_WAKELOCK).is_ok());
    }

    #[test]
    fn test_json_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            JsonFilePreferences::open(&path),
            Err(BridgeError::Config(_))
        ));
    }
}
