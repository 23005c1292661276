use thiserror::Error;

/// Errors at the persistence boundary (spec §6 bulk snapshot operations).
/// Validation and policy outcomes are never represented here — those are
/// plain data (`ValidationReport`, `Decision`).
#[derive(Debug, Error)]
pub enum ArbiterError {
    #[error("snapshot I/O failed: {0}")]
    SnapshotIo(#[from] std::io::Error),

    #[error("snapshot format invalid: {0}")]
    SnapshotFormat(#[from] serde_json::Error),
}
