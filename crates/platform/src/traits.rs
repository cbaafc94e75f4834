//! Core traits at the boundary between bridgeftpd and its host

use crate::BridgeResult;

/// A server module managed by the lifecycle orchestrator.
///
/// Both protocol servers implement this trait so the orchestrator and the
/// logs can refer to them uniformly.
pub trait ServerModule: Send + Sync {
    /// Unique module identifier ("ftp", "sftp")
    fn id(&self) -> &'static str;

    /// Human readable description
    fn description(&self) -> &'static str;

    /// Module version
    fn version(&self) -> &'static str {
        crate::VERSION
    }
}

/// A single persisted preference value.
///
/// Ports are stored as [`PreferenceValue::Text`] holding their decimal
/// representation, the same way the settings screen writes them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum PreferenceValue {
    /// Boolean switch
    Flag(bool),
    /// Free text
    Text(String),
}

/// Key/value preference store shared with the settings UI.
///
/// Writes go through `&self`; implementations synchronise internally so a
/// store can be shared between the settings screen and the orchestrator.
pub trait PreferenceStore: Send + Sync {
    /// Read a raw value
    fn get(&self, key: &str) -> Option<PreferenceValue>;

    /// Write a raw value and persist it
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written
    fn put(&self, key: &str, value: PreferenceValue) -> BridgeResult<()>;

    /// Remove a key
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written
    fn remove(&self, key: &str) -> BridgeResult<()>;

    /// Read a text value; flags are not coerced
    fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(PreferenceValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Read a flag value; text is not coerced
    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(PreferenceValue::Flag(b)) => Some(b),
            _ => None,
        }
    }

    /// Write a text value
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written
    fn put_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.put(key, PreferenceValue::Text(value.to_string()))
    }

    /// Write a flag value
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written
    fn put_bool(&self, key: &str, value: bool) -> BridgeResult<()> {
        self.put(key, PreferenceValue::Flag(value))
    }
}
