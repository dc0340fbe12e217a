use anyhow::Result;
use tauri::{AppHandle, Manager, Runtime};
use tauri_plugin_store::{Store, StoreExt};
use crate::state::Settings;

pub const STORE_FILE: &str = "voiceassist.json";
const SETTINGS_KEY: &str = "settings";

pub const VERIFIED_NUMBER_KEY: &str = "whatsapp_verified_number";
pub const VERIFICATION_STATUS_KEY: &str = "whatsapp_verification_status";

/// String key-value storage, the shape `localStorage` had.
pub trait KeyValueStore {
    fn get_string(&self, key: &str) -> Option<String>;
    fn set_string(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    fn flush(&self) -> Result<()>;
}

impl<R: Runtime> KeyValueStore for Store<R> {
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    fn set_string(&self, key: &str, value: &str) {
        self.set(key, value);
    }

    fn remove(&self, key: &str) {
        self.delete(key);
    }

    fn flush(&self) -> Result<()> {
        self.save()?;
        Ok(())
    }
}

/// Proof that a number passed the whitelist, kept across restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRecord {
    number: String,
}

impl VerificationRecord {
    pub fn new(number: String) -> Self {
        Self { number }
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn load(store: &dyn KeyValueStore) -> Option<Self> {
        let number = store.get_string(VERIFIED_NUMBER_KEY)?;
        let status = store.get_string(VERIFICATION_STATUS_KEY)?;
        if status != "true" || number.is_empty() {
            return None;
        }
        Some(Self { number })
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.set_string(VERIFIED_NUMBER_KEY, &self.number);
        store.set_string(VERIFICATION_STATUS_KEY, "true");
        store.flush()
    }

    pub fn clear(store: &dyn KeyValueStore) -> Result<()> {
        store.remove(VERIFIED_NUMBER_KEY);
        store.remove(VERIFICATION_STATUS_KEY);
        store.flush()
    }
}

pub fn open_store<R: Runtime>(app_handle: &AppHandle<R>) -> Result<std::sync::Arc<Store<R>>> {
    Ok(app_handle.store(STORE_FILE)?)
}

pub fn load_settings(app_handle: &AppHandle) -> Settings {
    let store = match open_store(app_handle) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Failed to open settings store: {}. Using defaults.", e);
            return Settings::default();
        }
    };

    match store.get(SETTINGS_KEY) {
        Some(value) => match serde_json::from_value::<Settings>(value) {
            Ok(settings) => settings.sanitized(),
            Err(e) => {
                tracing::warn!("Failed to deserialize stored settings: {}. Using defaults.", e);
                Settings::default()
            }
        },
        None => {
            tracing::info!("No stored settings found. Using defaults.");
            Settings::default()
        }
    }
}

pub fn save_settings(app_handle: &AppHandle) {
    let state = app_handle.state::<crate::state::AppState>();
    let settings = state.settings.lock().unwrap().clone();

    let store = match open_store(app_handle) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to open settings store for saving: {}", e);
            return;
        }
    };

    match serde_json::to_value(&settings) {
        Ok(value) => {
            store.set(SETTINGS_KEY, value);
            if let Err(e) = store.save() {
                tracing::error!("Failed to save settings store to disk: {}", e);
            }
        }
        Err(e) => {
            tracing::error!("Failed to serialize settings: {}", e);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct MemoryStore {
        values: Mutex<HashMap<String, String>>,
    }

    impl KeyValueStore for MemoryStore {
        fn get_string(&self, key: &str) -> Option<String> {
            self.values.lock().unwrap().get(key).cloned()
        }

        fn set_string(&self, key: &str, value: &str) {
            self.values.lock().unwrap().insert(key.to_string(), value.to_string());
        }

        fn remove(&self, key: &str) {
            self.values.lock().unwrap().remove(key);
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn record_round_trips_through_two_keys() {
        let store = MemoryStore::default();
        assert_eq!(VerificationRecord::load(&store), None);

        VerificationRecord::new("+12025550123".to_string()).save(&store).unwrap();
        assert_eq!(store.get_string(VERIFICATION_STATUS_KEY).as_deref(), Some("true"));
        assert_eq!(
            VerificationRecord::load(&store).map(|r| r.number().to_string()),
            Some("+12025550123".to_string())
        );

        VerificationRecord::clear(&store).unwrap();
        assert_eq!(VerificationRecord::load(&store), None);
        assert_eq!(store.get_string(VERIFIED_NUMBER_KEY), None);
    }

    #[test]
    fn record_requires_true_status() {
        let store = MemoryStore::default();
        store.set_string(VERIFIED_NUMBER_KEY, "+12025550123");
        store.set_string(VERIFICATION_STATUS_KEY, "false");
        assert_eq!(VerificationRecord::load(&store), None);
    }
}
