//! # agentframe-membrane
//!
//! The per-agent drift engine: baselines, tripwire probes, a continuous
//! embedding/behavior monitor, a circuit breaker, and the delegation
//! ledger. Each component shards its state behind a per-entry lock rather
//! than one lock over the whole map — an operation on one agent (or, for
//! the ledger, one delegation record) never blocks an operation on another.
//! There is no process-wide mutable state; every component is an owned
//! value the caller constructs.

#![forbid(unsafe_code)]

pub mod baseline;
pub mod breaker;
pub mod error;
pub mod ledger;
pub mod monitor;
pub mod tripwire;

pub use baseline::{Baseline, BaselineRecord, BaselineStore, DriftComparison};
pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState, CircuitStateKind, StateTransition};
pub use error::MembraneError;
pub use ledger::{Delegation, DelegateOutcome, DelegateRejection, DelegationLedger};
pub use monitor::{
    AlertSeverity, AlertType, ContinuousMonitor, DriftAlert, DriftMetrics, MonitorConfig, Trend,
};
pub use tripwire::{ExpectedValidity, InjectionOutcome, Probe, TripwireInjector};
