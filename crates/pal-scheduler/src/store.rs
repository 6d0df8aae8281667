//! File-based state store: one pretty-printed JSON document per workflow.
//!
//! Writes go to a sibling temp file that is renamed over the target, so a
//! crash leaves either the old or the new document, never a torn one.

use std::path::{Path, PathBuf};

use pal_core::{PalError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Load `key`, falling back to `T::default()` on any problem.
    pub fn load<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.try_load(key) {
            Ok(Some(value)) => {
                tracing::debug!("📂 Loaded {key} from {}", self.dir.display());
                value
            }
            Ok(None) => {
                tracing::info!("📂 No {key}.json yet, starting fresh");
                T::default()
            }
            Err(e) => {
                tracing::warn!("⚠️ Failed to load {key}.json, starting fresh: {e}");
                T::default()
            }
        }
    }

    /// Load `key`. `Ok(None)` when the file does not exist.
    pub fn try_load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)
            .map_err(|e| PalError::Persistence(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| PalError::Persistence(format!("parse {}: {e}", path.display())))
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| PalError::Persistence(format!("create {}: {e}", self.dir.display())))?;

        let json = serde_json::to_string_pretty(value)
            .map_err(|e| PalError::Persistence(format!("serialize {key}: {e}")))?;
        let target = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        std::fs::write(&tmp, json)
            .map_err(|e| PalError::Persistence(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &target)
            .map_err(|e| PalError::Persistence(format!("rename to {}: {e}", target.display())))?;

        tracing::debug!("💾 Saved {key} to {}", target.display());
        Ok(())
    }

    /// Number of `*.json` documents, `None` if the directory is missing.
    pub fn count_state_files(&self) -> Option<usize> {
        let entries = std::fs::read_dir(&self.dir).ok()?;
        let count = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .count();
        Some(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: u64,
        label: Option<String>,
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("data"));
        let value = Counter {
            count: 4,
            label: Some("x".into()),
        };
        store.save("reminder_state", &value).unwrap();

        assert!(store.path_for("reminder_state").exists());
        assert!(!dir.path().join("data/.reminder_state.json.tmp").exists());
        assert_eq!(store.load::<Counter>("reminder_state"), value);
        assert_eq!(store.count_state_files(), Some(1));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        assert_eq!(store.load::<Counter>("manager_state"), Counter::default());
        assert!(store.try_load::<Counter>("manager_state").unwrap().is_none());
        assert_eq!(store.count_state_files(), Some(0));
        assert_eq!(StateStore::new(dir.path().join("nope")).count_state_files(), None);
    }

    #[test]
    fn test_corrupt_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        std::fs::write(store.path_for("job_applications"), "{ not json").unwrap();

        assert_eq!(store.load::<Counter>("job_applications"), Counter::default());
        assert!(matches!(
            store.try_load::<Counter>("job_applications"),
            Err(PalError::Persistence(_))
        ));
    }
}
