//! Alert preference storage.
//!
//! Two boolean flags persisted as strings under fixed keys, read once at
//! session start and written back in full on every change.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Storage key for the sound flag.
pub const SOUND_KEY: &str = "notify_sound_enabled";
/// Storage key for the toast flag.
pub const TOAST_KEY: &str = "notify_toast_enabled";

/// Alert behaviour on an incoming notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPrefs {
    pub sound_enabled: bool,
    pub toast_enabled: bool,
}

impl Default for AlertPrefs {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            toast_enabled: true,
        }
    }
}

/// Partial update merged over the current prefs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefsUpdate {
    pub sound: Option<bool>,
    pub toast: Option<bool>,
}

/// Plain string key/value persistence seam.
pub trait PrefsStorage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// File-backed [`PrefsStorage`]: a JSON map persisted on every write.
pub struct FilePrefsStorage {
    file_path: PathBuf,
    dump: Mutex<HashMap<String, String>>,
}

impl FilePrefsStorage {
    fn load_dump_from_file(file_path: &PathBuf) -> Result<HashMap<String, String>> {
        let mut file = File::open(file_path)?;

        let mut content = String::new();
        file.read_to_string(&mut content)?;

        Ok(serde_json::from_str(&content)?)
    }

    /// Open the storage at `file_path`; a missing or unreadable file starts
    /// empty.
    pub fn initialize(file_path: PathBuf) -> FilePrefsStorage {
        FilePrefsStorage {
            file_path: file_path.clone(),
            dump: Mutex::new(Self::load_dump_from_file(&file_path).unwrap_or_default()),
        }
    }

    fn save_dump(&self) -> Result<()> {
        let json_string = serde_json::to_string_pretty(&*self.dump.lock().unwrap())?;
        let mut file = File::create(&self.file_path)?;
        file.write_all(json_string.as_bytes())?;
        Ok(())
    }
}

impl PrefsStorage for FilePrefsStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.dump.lock().unwrap().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.dump
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self.save_dump()
    }
}

/// In-memory [`PrefsStorage`] for tests.
#[derive(Default)]
pub struct MemoryPrefsStorage {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryPrefsStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrefsStorage for MemoryPrefsStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.lock().unwrap().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.map
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// In-memory prefs plus their persistence.
pub struct PreferenceStore {
    storage: Arc<dyn PrefsStorage>,
    current: Mutex<AlertPrefs>,
}

fn read_flag(storage: &dyn PrefsStorage, key: &str) -> bool {
    match storage.read(key) {
        // Absent or unparseable values fall back to enabled.
        Ok(Some(value)) => value.parse::<bool>().unwrap_or(true),
        Ok(None) => true,
        Err(err) => {
            warn!("Failed to read preference {}: {:#}", key, err);
            true
        }
    }
}

impl PreferenceStore {
    /// Read both flags from storage once, at session start.
    pub fn load(storage: Arc<dyn PrefsStorage>) -> Self {
        let current = AlertPrefs {
            sound_enabled: read_flag(storage.as_ref(), SOUND_KEY),
            toast_enabled: read_flag(storage.as_ref(), TOAST_KEY),
        };
        Self {
            storage,
            current: Mutex::new(current),
        }
    }

    pub fn current(&self) -> AlertPrefs {
        *self.current.lock().unwrap()
    }

    /// Merge `update` over the current prefs, then persist the full blob
    /// (both keys) so storage never holds a half-updated record.
    pub fn update(&self, update: PrefsUpdate) -> Result<AlertPrefs> {
        let mut current = self.current.lock().unwrap();
        if let Some(sound) = update.sound {
            current.sound_enabled = sound;
        }
        if let Some(toast) = update.toast {
            current.toast_enabled = toast;
        }

        self.storage
            .write(SOUND_KEY, &current.sound_enabled.to_string())?;
        self.storage
            .write(TOAST_KEY, &current.toast_enabled.to_string())?;
        Ok(*current)
    }
}
