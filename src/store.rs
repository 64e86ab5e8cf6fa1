//! Atomic persistence of the pool snapshot

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::warn;

use crate::config::TierConfig;
use crate::errors::{PoolError, PoolResult};
use crate::record::PoolState;

/// Durable store for the pool document.
///
/// Saves go through a uniquely named temporary file in the same directory,
/// followed by an atomic rename over the canonical path, so a concurrent
/// reader only ever observes a complete, previously saved snapshot.
#[derive(Debug, Clone)]
pub struct PersistentStore {
    path: PathBuf,
    tiers: Arc<Vec<u32>>,
}

impl PersistentStore {
    pub fn new(path: impl Into<PathBuf>, tiers: &[TierConfig]) -> Self {
        Self {
            path: path.into(),
            tiers: Arc::new(tiers.iter().map(|tier| tier.amount).collect()),
        }
    }

    /// Load the current snapshot.
    ///
    /// A missing or unparseable file yields the default state with one empty
    /// queue per configured tier; this is not an error. Loaded snapshots are
    /// normalized so every configured tier has an entry.
    pub fn load(&self) -> PoolState {
        let mut state = match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!(path = %self.path.display(), %err, "pool document unparseable; starting from empty state");
                PoolState::default()
            }),
            Err(_) => PoolState::default(),
        };

        for amount in self.tiers.iter() {
            state.ensure_tier(*amount);
        }
        state
    }

    /// Write the complete snapshot, atomically replacing the canonical file.
    ///
    /// If the final rename fails, the temporary file is removed and the
    /// canonical file is left exactly as it was.
    pub fn save(&self, state: &PoolState) -> PoolResult<()> {
        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)
            .map_err(|err| PoolError::Persistence(err.to_string()))?;

        let json = serde_json::to_vec_pretty(state)
            .map_err(|err| PoolError::Persistence(err.to_string()))?;

        let mut temp = NamedTempFile::new_in(parent)
            .map_err(|err| PoolError::Persistence(err.to_string()))?;
        std::io::Write::write_all(&mut temp, &json)
            .map_err(|err| PoolError::Persistence(err.to_string()))?;

        // persist() renames atomically; on failure the returned handle is
        // dropped, which deletes the temporary file.
        temp.persist(&self.path)
            .map_err(|err| PoolError::Persistence(err.error.to_string()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ExchangeRecord;
    use chrono::Utc;

    fn tiers() -> Vec<TierConfig> {
        vec![TierConfig::new(19, 3, 1), TierConfig::new(29, 5, 2)]
    }

    fn record(id: &str, amount: u32) -> ExchangeRecord {
        ExchangeRecord {
            id: id.to_string(),
            url: format!("https://exchange.test/exchange?id={id}"),
            amount,
            created_at: Utc::now(),
            manually_added: false,
        }
    }

    #[test]
    fn missing_file_yields_default_with_all_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::new(dir.path().join("pool.json"), &tiers());

        let state = store.load();
        assert_eq!(state.queue_len(19), 0);
        assert_eq!(state.queue_len(29), 0);
        assert_eq!(state.total_records(), 0);
    }

    #[test]
    fn unparseable_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = PersistentStore::new(&path, &tiers());
        assert_eq!(store.load().total_records(), 0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::new(dir.path().join("pool.json"), &tiers());

        let mut state = store.load();
        state.append(record("a", 19));
        state.append(record("b", 29));
        store.save(&state).unwrap();

        let reloaded = store.load();
        assert_eq!(reloaded, state);

        // save(load(state)) leaves the document byte-identical
        let before = std::fs::read(store.path()).unwrap();
        store.save(&reloaded).unwrap();
        let after = std::fs::read(store.path()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn failed_replace_leaves_canonical_intact_and_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the canonical path makes the final rename fail.
        let path = dir.path().join("pool.json");
        std::fs::create_dir(&path).unwrap();

        let store = PersistentStore::new(&path, &tiers());
        let err = store.save(&PoolState::default()).unwrap_err();
        assert!(matches!(err, PoolError::Persistence(_)));

        assert!(path.is_dir());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name != "pool.json")
            .collect();
        assert!(leftovers.is_empty(), "temp debris left: {leftovers:?}");
    }
}
