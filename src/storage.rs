use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{LedgerError, Result};

/// Whole-blob key-value persistence. Each key holds one JSON document.
pub trait KeyValueStore {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&mut self, key: &str, value: &str) -> Result<()>;

    /// Write several keys as one unit. Backends that can fail partway
    /// through must override this so either every key lands or none does.
    fn write_many(&mut self, entries: &[(&str, String)]) -> Result<()> {
        for (key, value) in entries {
            self.write(key, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Read and decode a blob. A missing key yields `T::default()`; a blob that
/// no longer decodes is an error so it is never silently overwritten.
pub fn load_json<T: DeserializeOwned + Default>(kv: &dyn KeyValueStore, key: &str) -> Result<T> {
    match kv.read(key)? {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
            .map_err(|e| LedgerError::persistence(format!("stored '{key}' is unreadable: {e}"), false)),
        _ => Ok(T::default()),
    }
}

pub fn save_json<T: Serialize + ?Sized>(kv: &mut dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    kv.write(key, &json)
}
