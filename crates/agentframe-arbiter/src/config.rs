//! Static, enumerated engine configuration (spec §6).

use std::time::Duration;

/// Every configuration knob the Engine and its components accept. There is
/// no global mutable configuration state — callers construct a value and
/// pass it to [`crate::engine::Engine::new`], mirroring the teacher's
/// `config.rs` cached-accessor shape without the process-wide cache (spec
/// §9 rules out default process-wide mutable state).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub cool_down: Duration,
    pub drift_threshold: f64,
    pub baseline_test_interval: Duration,
    pub tripwire_rate: f64,
    pub embedding_window_size: usize,
    pub semantic_drift_threshold: f64,
    pub tripwire_failure_threshold: f64,
    /// Informational parity with spec §6's enumerated list. The Validator's
    /// SR-001/SR-002 rules use `agentframe_core::{MIN_FRAME_SYMBOLS,
    /// MAX_FRAME_SYMBOLS}` directly rather than reading this value, since
    /// rule severities are fixed per the literal structural rule table.
    pub min_frame_symbols: usize,
    pub max_frame_symbols: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            cool_down: Duration::from_millis(60_000),
            drift_threshold: 0.25,
            baseline_test_interval: Duration::from_millis(60_000),
            tripwire_rate: 0.05,
            embedding_window_size: 100,
            semantic_drift_threshold: 0.15,
            tripwire_failure_threshold: 0.3,
            min_frame_symbols: agentframe_core::MIN_FRAME_SYMBOLS,
            max_frame_symbols: agentframe_core::MAX_FRAME_SYMBOLS,
        }
    }
}

impl EngineConfig {
    fn breaker_config(&self) -> agentframe_membrane::BreakerConfig {
        agentframe_membrane::BreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            cool_down: self.cool_down,
            drift_threshold: self.drift_threshold,
        }
    }

    fn monitor_config(&self) -> agentframe_membrane::MonitorConfig {
        agentframe_membrane::MonitorConfig {
            embedding_window_size: self.embedding_window_size,
            semantic_drift_threshold: self.semantic_drift_threshold,
            tripwire_failure_threshold: self.tripwire_failure_threshold,
        }
    }

    pub(crate) fn component_configs(
        &self,
    ) -> (agentframe_membrane::BreakerConfig, agentframe_membrane::MonitorConfig) {
        (self.breaker_config(), self.monitor_config())
    }

    /// Builds a config from `AGENTFRAME_*` environment variables, falling
    /// back to [`Default::default`] per-field on a missing or unparsable
    /// value. Unlike the teacher's `safety_level()`, this reads the
    /// environment once per call and caches nothing: `EngineConfig` is a
    /// plain value the caller owns, not process-wide state (spec §9).
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            failure_threshold: env_or("AGENTFRAME_FAILURE_THRESHOLD", defaults.failure_threshold),
            success_threshold: env_or("AGENTFRAME_SUCCESS_THRESHOLD", defaults.success_threshold),
            cool_down: Duration::from_millis(env_or(
                "AGENTFRAME_COOL_DOWN_MS",
                defaults.cool_down.as_millis() as u64,
            )),
            drift_threshold: env_or("AGENTFRAME_DRIFT_THRESHOLD", defaults.drift_threshold),
            baseline_test_interval: Duration::from_millis(env_or(
                "AGENTFRAME_BASELINE_TEST_INTERVAL_MS",
                defaults.baseline_test_interval.as_millis() as u64,
            )),
            tripwire_rate: env_or("AGENTFRAME_TRIPWIRE_RATE", defaults.tripwire_rate),
            embedding_window_size: env_or(
                "AGENTFRAME_EMBEDDING_WINDOW_SIZE",
                defaults.embedding_window_size,
            ),
            semantic_drift_threshold: env_or(
                "AGENTFRAME_SEMANTIC_DRIFT_THRESHOLD",
                defaults.semantic_drift_threshold,
            ),
            tripwire_failure_threshold: env_or(
                "AGENTFRAME_TRIPWIRE_FAILURE_THRESHOLD",
                defaults.tripwire_failure_threshold,
            ),
            min_frame_symbols: defaults.min_frame_symbols,
            max_frame_symbols: defaults.max_frame_symbols,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
