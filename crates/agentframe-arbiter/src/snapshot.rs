//! Baseline snapshot persistence boundary (spec §6: "Load/save are bulk
//! operations; no partial state is observable").
//!
//! [`agentframe_membrane::BaselineStore`] already holds the in-memory
//! records and swaps them atomically under one lock; this module is only
//! the file-format boundary, mirroring how the teacher's harness crate
//! keeps fixture JSON (de)serialization out of the in-memory types
//! themselves.

use std::path::Path;

use agentframe_membrane::{BaselineRecord, BaselineStore};

use crate::error::ArbiterError;

/// Writes every baseline record in `store` to `path` as a single JSON
/// array. Overwrites any existing file.
pub fn save_baseline_snapshot(store: &BaselineStore, path: &Path) -> Result<(), ArbiterError> {
    let records = store.snapshot();
    let json = serde_json::to_string_pretty(&records)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Reads `path` as a JSON array of baseline records and loads it into
/// `store`, replacing all current state.
pub fn load_baseline_snapshot(store: &BaselineStore, path: &Path) -> Result<(), ArbiterError> {
    let content = std::fs::read_to_string(path)?;
    let records: Vec<BaselineRecord> = serde_json::from_str(&content)?;
    store.load_snapshot(records);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentframe_core::frame::parse;

    #[test]
    fn round_trips_through_a_temp_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("agentframe-snapshot-test-{:?}.json", std::thread::current().id()));

        let store = BaselineStore::new();
        let frame = parse("⊕◊▶β");
        store.record("a1", &frame, vec!["read".to_string()], vec![0.1, 0.2], "2026-01-01T00:00:00Z");

        save_baseline_snapshot(&store, &path).unwrap();

        let loaded = BaselineStore::new();
        load_baseline_snapshot(&loaded, &path).unwrap();
        let baseline = loaded.get("a1", &frame.intent_hash).unwrap();
        assert_eq!(baseline.reference_embedding, vec![0.1, 0.2]);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn load_of_missing_file_is_a_snapshot_io_error() {
        let store = BaselineStore::new();
        let path = Path::new("/nonexistent/agentframe-snapshot.json");
        let err = load_baseline_snapshot(&store, path).unwrap_err();
        assert!(matches!(err, ArbiterError::SnapshotIo(_)));
    }

    #[test]
    fn load_of_malformed_json_is_a_snapshot_format_error() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!(
            "agentframe-snapshot-malformed-{:?}.json",
            std::thread::current().id()
        ));
        std::fs::write(&path, "not json").unwrap();

        let store = BaselineStore::new();
        let err = load_baseline_snapshot(&store, &path).unwrap_err();
        assert!(matches!(err, ArbiterError::SnapshotFormat(_)));

        std::fs::remove_file(&path).ok();
    }
}
