//! Persisted display preferences.
//!
//! A single JSON record under the `preferences` key. Reads never fail (missing
//! or corrupt data yields the defaults) and writes are best-effort.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::units::TemperatureUnit;

pub const PREFERENCES_KEY: &str = "preferences";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{other}', expected light or dark")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preference {
    #[serde(default)]
    pub unit: TemperatureUnit,
    #[serde(default)]
    pub theme: Theme,
}

/// Fields to merge into the stored preference; `None` leaves a field as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreferenceUpdate {
    pub unit: Option<TemperatureUnit>,
    pub theme: Option<Theme>,
}

impl Preference {
    fn merged(self, update: PreferenceUpdate) -> Self {
        Self {
            unit: update.unit.unwrap_or(self.unit),
            theme: update.theme.unwrap_or(self.theme),
        }
    }
}

/// String key-value persistence behind the preference store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keys stored as a flat JSON object in one file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> BTreeMap<String, String> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read_all().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_all();
        entries.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&entries)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory store for tests; can be switched to reject writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    fail_writes: Mutex<bool>,
    reads: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        lock(&store.entries).insert(key.to_string(), value.to_string());
        store
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *lock(&self.fail_writes) = fail;
    }

    /// Number of `get` calls served so far.
    pub fn reads(&self) -> usize {
        *lock(&self.reads)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        *lock(&self.reads) += 1;
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if *lock(&self.fail_writes) {
            anyhow::bail!("storage quota exceeded");
        }
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Display preferences over a [`KeyValueStore`].
#[derive(Debug)]
pub struct PreferenceStore<S> {
    store: S,
    // Serializes read-merge-write so concurrent toggles never lose an update
    write_lock: Mutex<()>,
}

impl PreferenceStore<FileStore> {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(FileStore::new(path))
    }
}

impl<S: KeyValueStore> PreferenceStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stored preference, or the defaults when absent or unparseable.
    pub fn get(&self) -> Preference {
        let Some(raw) = self.store.get(PREFERENCES_KEY) else {
            return Preference::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::debug!("Ignoring unreadable preferences ({}), using defaults", e);
            Preference::default()
        })
    }

    /// Merge `update` into the stored preference and persist it.
    ///
    /// Returns the merged value. Persistence failures are logged, not raised.
    pub fn set(&self, update: PreferenceUpdate) -> Preference {
        let _guard = lock(&self.write_lock);
        let merged = self.get().merged(update);
        self.persist(&merged);
        merged
    }

    pub fn toggle_unit(&self) -> TemperatureUnit {
        let _guard = lock(&self.write_lock);
        let current = self.get();
        let next = current.unit.toggled();
        self.persist(&current.merged(PreferenceUpdate {
            unit: Some(next),
            theme: None,
        }));
        next
    }

    pub fn toggle_theme(&self) -> Theme {
        let _guard = lock(&self.write_lock);
        let current = self.get();
        let next = current.theme.toggled();
        self.persist(&current.merged(PreferenceUpdate {
            unit: None,
            theme: Some(next),
        }));
        next
    }

    fn persist(&self, preference: &Preference) {
        let result = serde_json::to_string(preference)
            .map_err(anyhow::Error::from)
            .and_then(|raw| self.store.set(PREFERENCES_KEY, &raw));
        if let Err(e) = result {
            tracing::warn!("Failed to save preferences: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_defaults_when_absent() {
        let prefs = PreferenceStore::new(MemoryStore::new());
        assert_eq!(
            prefs.get(),
            Preference {
                unit: TemperatureUnit::Celsius,
                theme: Theme::Light
            }
        );
    }

    #[test]
    fn test_defaults_for_malformed_payloads() {
        let payloads = [
            "",
            "not json",
            "{",
            "null",
            "42",
            "[]",
            r#"{"unit": "K"}"#,
            r#"{"unit": 1}"#,
            r#"{"theme": "purple"}"#,
        ];
        for payload in payloads {
            let prefs = PreferenceStore::new(MemoryStore::with_entry(PREFERENCES_KEY, payload));
            assert_eq!(prefs.get(), Preference::default(), "payload: {payload:?}");
        }
    }

    #[test]
    fn test_missing_theme_takes_default() {
        let prefs =
            PreferenceStore::new(MemoryStore::with_entry(PREFERENCES_KEY, r#"{"unit": "F"}"#));
        assert_eq!(
            prefs.get(),
            Preference {
                unit: TemperatureUnit::Fahrenheit,
                theme: Theme::Light
            }
        );
    }

    #[test]
    fn test_set_merges_partial_update() {
        let prefs = PreferenceStore::new(MemoryStore::new());
        prefs.set(PreferenceUpdate {
            theme: Some(Theme::Dark),
            ..Default::default()
        });
        let merged = prefs.set(PreferenceUpdate {
            unit: Some(TemperatureUnit::Fahrenheit),
            ..Default::default()
        });

        assert_eq!(merged.theme, Theme::Dark);
        assert_eq!(prefs.get(), merged);
        assert_eq!(
            prefs.store().get(PREFERENCES_KEY).as_deref(),
            Some(r#"{"unit":"F","theme":"dark"}"#)
        );
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let prefs = PreferenceStore::new(MemoryStore::new());
        prefs.store().set_fail_writes(true);

        let merged = prefs.set(PreferenceUpdate {
            unit: Some(TemperatureUnit::Fahrenheit),
            ..Default::default()
        });

        assert_eq!(merged.unit, TemperatureUnit::Fahrenheit);
        assert_eq!(prefs.get(), Preference::default());
    }

    #[test]
    fn test_toggles() {
        let prefs = PreferenceStore::new(MemoryStore::new());
        assert_eq!(prefs.toggle_unit(), TemperatureUnit::Fahrenheit);
        assert_eq!(prefs.toggle_theme(), Theme::Dark);
        assert_eq!(prefs.toggle_unit(), TemperatureUnit::Celsius);
        assert_eq!(
            prefs.get(),
            Preference {
                unit: TemperatureUnit::Celsius,
                theme: Theme::Dark
            }
        );
    }

    #[test]
    fn test_toggle_reads_store_once() {
        let prefs = PreferenceStore::new(MemoryStore::with_entry(
            PREFERENCES_KEY,
            r#"{"unit":"F","theme":"dark"}"#,
        ));

        assert_eq!(prefs.toggle_theme(), Theme::Light);
        assert_eq!(prefs.store().reads(), 1);

        prefs.set(PreferenceUpdate::default());
        assert_eq!(prefs.store().reads(), 2);
        assert_eq!(
            prefs.get(),
            Preference {
                unit: TemperatureUnit::Fahrenheit,
                theme: Theme::Light
            }
        );
    }

    #[test]
    fn test_concurrent_toggles_do_not_lose_updates() {
        let prefs = Arc::new(PreferenceStore::new(MemoryStore::new()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let prefs = Arc::clone(&prefs);
                std::thread::spawn(move || {
                    prefs.toggle_unit();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // An even number of toggles lands back on the default
        assert_eq!(prefs.get().unit, TemperatureUnit::Celsius);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.json");

        let prefs = PreferenceStore::open(&path);
        prefs.set(PreferenceUpdate {
            unit: Some(TemperatureUnit::Fahrenheit),
            theme: Some(Theme::Dark),
        });
        drop(prefs);

        let reopened = PreferenceStore::open(&path);
        assert_eq!(
            reopened.get(),
            Preference {
                unit: TemperatureUnit::Fahrenheit,
                theme: Theme::Dark
            }
        );
    }

    #[test]
    fn test_file_store_corrupt_file_reads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(&path, "{{{{").unwrap();

        let prefs = PreferenceStore::open(&path);
        assert_eq!(prefs.get(), Preference::default());

        // A write replaces the corrupt file
        prefs.toggle_theme();
        assert_eq!(PreferenceStore::open(&path).get().theme, Theme::Dark);
    }

    #[test]
    fn test_theme_parsing() {
        assert_eq!("Dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert!("blue".parse::<Theme>().is_err());
    }
}
