//! Synthetic probe frames whose expected validity is known in advance
//! (spec §4.E). Injected at a configurable Bernoulli rate; outcomes are
//! first-class observations meant to feed the Continuous Monitor.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use agentframe_core::{validator::ValidationReport, ParsedFrame};
use parking_lot::{Mutex, RwLock};
use rand::Rng;

/// Bounded per-agent outcome history retained for `failure_rate` windows.
const MAX_OUTCOME_HISTORY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedValidity {
    Valid,
    Invalid,
}

/// One synthetic probe in the tripwire library.
#[derive(Debug, Clone)]
pub struct Probe {
    pub frame: String,
    pub expected_validity: ExpectedValidity,
    pub category: String,
}

/// Result of a single injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionOutcome {
    pub probe_id: usize,
    pub passed: bool,
    pub category: String,
}

/// Holds the probe library and per-agent pass/fail history. Each agent's
/// history lives behind its own lock, so recording an outcome for one agent
/// never blocks another (spec §9's per-agent-lock design note).
pub struct TripwireInjector {
    probes: Vec<Probe>,
    history: RwLock<HashMap<String, Arc<Mutex<VecDeque<bool>>>>>,
}

impl TripwireInjector {
    #[must_use]
    pub fn with_probes(probes: Vec<Probe>) -> Self {
        Self { probes, history: RwLock::new(HashMap::new()) }
    }

    fn agent_history(&self, agent_id: &str) -> Arc<Mutex<VecDeque<bool>>> {
        if let Some(entry) = self.history.read().get(agent_id) {
            return Arc::clone(entry);
        }
        Arc::clone(
            self.history
                .write()
                .entry(agent_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new()))),
        )
    }

    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// Bernoulli trial at `rate` (clamped to `[0, 1]`).
    #[must_use]
    pub fn should_inject(&self, rate: f64) -> bool {
        rand::thread_rng().gen_bool(rate.clamp(0.0, 1.0))
    }

    /// Picks a probe at random, validates it with `validate_fn`, and records
    /// the pass/fail outcome for `agentId`. Returns `None` if the probe
    /// library is empty.
    pub fn inject(
        &self,
        agent_id: &str,
        validate_fn: impl FnOnce(&ParsedFrame) -> ValidationReport,
    ) -> Option<InjectionOutcome> {
        if self.probes.is_empty() {
            return None;
        }
        let probe_id = rand::thread_rng().gen_range(0..self.probes.len());
        let probe = &self.probes[probe_id];
        let parsed = agentframe_core::frame::parse(&probe.frame);
        let report = validate_fn(&parsed);
        let observed_valid = report.valid;
        let expected_valid = probe.expected_validity == ExpectedValidity::Valid;
        let passed = observed_valid == expected_valid;

        let entry = self.agent_history(agent_id);
        let mut history = entry.lock();
        history.push_back(passed);
        while history.len() > MAX_OUTCOME_HISTORY {
            history.pop_front();
        }

        Some(InjectionOutcome { probe_id, passed, category: probe.category.clone() })
    }

    /// Fraction of the most recent `window` outcomes (or fewer, if history is
    /// shorter) for `agentId` that failed. `0.0` if there is no history.
    #[must_use]
    pub fn failure_rate(&self, agent_id: &str, window: usize) -> f64 {
        let Some(entry) = self.history.read().get(agent_id).cloned() else { return 0.0 };
        let history = entry.lock();
        if history.is_empty() {
            return 0.0;
        }
        let n = window.min(history.len());
        let recent = history.iter().rev().take(n);
        let failures = recent.filter(|passed| !**passed).count();
        failures as f64 / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentframe_core::validator::{validate, ValidationScope};

    fn probes() -> Vec<Probe> {
        vec![
            Probe {
                frame: "⊕◊▶β".to_string(),
                expected_validity: ExpectedValidity::Valid,
                category: "happy_path".to_string(),
            },
            Probe {
                frame: "▶".to_string(),
                expected_validity: ExpectedValidity::Invalid,
                category: "structural".to_string(),
            },
        ]
    }

    #[test]
    fn should_inject_respects_extremes() {
        let injector = TripwireInjector::with_probes(probes());
        assert!(!injector.should_inject(0.0));
        assert!(injector.should_inject(1.0));
    }

    #[test]
    fn inject_records_outcome_and_failure_rate_updates() {
        let injector = TripwireInjector::with_probes(probes());
        for _ in 0..20 {
            injector.inject("a1", |f| validate(f, None, ValidationScope::Full));
        }
        let rate = injector.failure_rate("a1", 20);
        assert!((0.0..=1.0).contains(&rate));
    }

    #[test]
    fn empty_probe_library_returns_none() {
        let injector = TripwireInjector::with_probes(Vec::new());
        assert!(injector.inject("a1", |f| validate(f, None, ValidationScope::Full)).is_none());
    }

    #[test]
    fn failure_rate_with_no_history_is_zero() {
        let injector = TripwireInjector::with_probes(probes());
        assert_eq!(injector.failure_rate("ghost", 10), 0.0);
    }
}
