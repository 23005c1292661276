//! # agentframe-arbiter
//!
//! The composition root: the Execution Arbiter, its configuration, and the
//! audit log. Wires `agentframe-core`'s parser/validator together with
//! `agentframe-membrane`'s stateful components into one `evaluate`/`report`
//! facade (spec §4.I).

#![forbid(unsafe_code)]

pub mod audit;
pub mod cancellation;
pub mod config;
pub mod engine;
pub mod error;
pub mod snapshot;

pub use audit::{now_utc, AuditEntry, AuditLog, Decision};
pub use cancellation::CancellationToken;
pub use config::EngineConfig;
pub use engine::{Engine, EvaluateResponse};
pub use error::ArbiterError;
pub use snapshot::{load_baseline_snapshot, save_baseline_snapshot};
