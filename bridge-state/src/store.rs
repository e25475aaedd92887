//! Snapshot persistence with load-or-default recovery.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, StateError};
use crate::snapshot::{BridgeState, STATE_VERSION};

/// File name of the full snapshot.
pub const STATE_FILE: &str = "state.json";
/// File name of the key-list summary.
pub const SUMMARY_FILE: &str = "state.summary.json";

/// Reads and writes the state snapshot and its summary.
///
/// Both documents are written to a temporary sibling first and renamed into
/// place, so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    state_path: PathBuf,
    summary_path: PathBuf,
}

impl SnapshotStore {
    /// Store both documents inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            state_path: dir.join(STATE_FILE),
            summary_path: dir.join(SUMMARY_FILE),
        }
    }

    /// Path of the full snapshot
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Path of the summary document
    pub fn summary_path(&self) -> &Path {
        &self.summary_path
    }

    /// Load the last snapshot, `Ok(None)` when none was ever written.
    pub fn load(&self) -> Result<Option<BridgeState>> {
        let content = match fs::read_to_string(&self.state_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StateError::io(&self.state_path, e)),
        };

        let mut state: BridgeState = serde_json::from_str(&content)
            .map_err(|e| StateError::serde(&self.state_path, e))?;
        state.normalize();
        Ok(Some(state))
    }

    /// Load the last snapshot, falling back to an empty state.
    ///
    /// Absent or unreadable snapshots are never fatal.
    pub fn load_or_default(&self) -> BridgeState {
        match self.load() {
            Ok(Some(state)) => {
                tracing::info!(
                    path = %self.state_path.display(),
                    version = %state.version,
                    topics = state.subscriptions.len(),
                    "Loaded previous state"
                );
                state
            }
            Ok(None) => {
                tracing::info!("No previous state found, continuing");
                BridgeState::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Previous state unreadable, starting from empty state");
                BridgeState::default()
            }
        }
    }

    /// Write the snapshot and its summary, stamping the current version.
    pub fn save(&self, state: &mut BridgeState) -> Result<()> {
        state.version = STATE_VERSION.to_string();
        write_json(&self.state_path, state)?;
        write_json(&self.summary_path, &state.summary())?;
        tracing::debug!(path = %self.state_path.display(), "Saved current state");
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StateError::io(parent, e))?;
    }

    let content = serde_json::to_string_pretty(value).map_err(|e| StateError::serde(path, e))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).map_err(|e| StateError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StateError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::UNSAVED_VERSION;
    use rstest::rstest;

    #[test]
    fn test_paths() {
        let store = SnapshotStore::in_dir("/var/lib/bridge/data");
        assert!(store.state_path().ends_with("state.json"));
        assert!(store.summary_path().ends_with("state.summary.json"));
    }

    #[test]
    fn test_missing_snapshot_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::in_dir(dir.path());
        assert!(store.load().unwrap().is_none());
        assert_eq!(store.load_or_default().version, UNSAVED_VERSION);
    }

    #[test]
    fn test_corrupt_snapshot_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::in_dir(dir.path());
        fs::write(store.state_path(), "{ not json").unwrap();

        assert!(matches!(store.load(), Err(StateError::Serde { .. })));
        assert_eq!(store.load_or_default(), BridgeState::default());
    }

    #[rstest]
    #[case::empty_document("{}", Some(""))]
    #[case::partial_document(r#"{"callback": "10.0.0.5:39500"}"#, Some("10.0.0.5:39500"))]
    #[case::truncated(r#"{"callback": "#, None)]
    #[case::wrong_shape("[1, 2, 3]", None)]
    fn test_load_outcomes(#[case] content: &str, #[case] callback: Option<&str>) {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::in_dir(dir.path());
        fs::write(store.state_path(), content).unwrap();

        match callback {
            Some(expected) => {
                let state = store.load().unwrap().unwrap();
                assert_eq!(state.callback, expected);
            }
            None => {
                assert!(store.load().is_err());
                assert_eq!(store.load_or_default(), BridgeState::default());
            }
        }
    }

    #[test]
    fn test_save_creates_directory_and_stamps_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::in_dir(dir.path().join("data"));

        let mut state = BridgeState::new();
        state.callback = "10.0.0.5:39500".to_string();
        store.save(&mut state).unwrap();

        assert_eq!(state.version, STATE_VERSION);
        assert!(store.state_path().exists());
        assert!(store.summary_path().exists());
        assert!(!store.state_path().with_extension("json.tmp").exists());
    }
}
