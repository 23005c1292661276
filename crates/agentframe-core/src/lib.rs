//! # agentframe-core
//!
//! Symbol classification, frame parsing, and the three-tier frame validator.
//!
//! This crate is pure logic: every operation here is a function of its
//! arguments, with no interior mutability beyond the immutable symbol
//! registry. Stateful, per-agent supervision (baselines, drift, circuit
//! breaking, delegation) lives in `agentframe-membrane`.

#![forbid(unsafe_code)]

pub mod frame;
pub mod registry;
pub mod validator;

pub use frame::{ParsedFrame, Symbol};
pub use registry::SymbolCategory;
pub use validator::{Severity, ValidationReport, ValidationResult, ValidationScope};

/// Minimum symbol count for a structurally valid frame (SR-001).
pub const MIN_FRAME_SYMBOLS: usize = 2;

/// Maximum symbol count for a structurally valid frame (SR-002).
pub const MAX_FRAME_SYMBOLS: usize = 12;
