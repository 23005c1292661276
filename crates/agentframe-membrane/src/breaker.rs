//! Per-agent circuit breaker: closed ⇆ open ⇆ half-open admission control
//! (spec §4.G).
//!
//! The breaker never reads the wall clock itself — "no internal timeouts;
//! the circuit-breaker cool-down is a clock-driven invariant, not a waiting
//! operation" (spec §5). Every time-sensitive method takes `now: Instant`
//! from the caller, which keeps the cool-down testable without sleeping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitStateKind {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitState {
    pub state: CircuitStateKind,
    pub consecutive_failures: u32,
    pub half_open_successes: u32,
    pub opened_at: Option<Instant>,
    pub last_transition: Instant,
    pub last_reason: String,
}

impl CircuitState {
    fn closed(now: Instant) -> Self {
        Self {
            state: CircuitStateKind::Closed,
            consecutive_failures: 0,
            half_open_successes: 0,
            opened_at: None,
            last_transition: now,
            last_reason: String::new(),
        }
    }
}

/// Describes one state transition, for callers that need to audit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: CircuitStateKind,
    pub to: CircuitStateKind,
    pub reason: String,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub cool_down: Duration,
    pub drift_threshold: f64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            cool_down: Duration::from_secs(60),
            drift_threshold: 0.25,
        }
    }
}

/// Keyed by `agentId`, each agent's circuit behind its own lock — a write
/// for one agent never blocks a read or write for another (spec §9's
/// per-agent-lock design note). The outer `RwLock` is only ever held long
/// enough to fetch or create that agent's entry.
pub struct CircuitBreaker {
    config: BreakerConfig,
    states: RwLock<HashMap<String, Arc<Mutex<CircuitState>>>>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self { config, states: RwLock::new(HashMap::new()) }
    }

    fn agent_entry(&self, agent_id: &str, now: Instant) -> Arc<Mutex<CircuitState>> {
        if let Some(entry) = self.states.read().get(agent_id) {
            return Arc::clone(entry);
        }
        Arc::clone(
            self.states
                .write()
                .entry(agent_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(CircuitState::closed(now)))),
        )
    }

    /// `false` iff the agent's circuit is currently open. Lazily transitions
    /// `open → half_open` when the cool-down has elapsed.
    pub fn is_allowed(&self, agent_id: &str, now: Instant) -> bool {
        let entry = self.agent_entry(agent_id, now);
        let mut state = entry.lock();
        self.maybe_half_open(&mut state, now);
        state.state != CircuitStateKind::Open
    }

    #[must_use]
    pub fn state_of(&self, agent_id: &str) -> CircuitStateKind {
        self.states.read().get(agent_id).map_or(CircuitStateKind::Closed, |s| s.lock().state)
    }

    pub fn record_success(&self, agent_id: &str, now: Instant) -> Option<StateTransition> {
        let entry = self.agent_entry(agent_id, now);
        let mut state = entry.lock();
        self.maybe_half_open(&mut state, now);

        match state.state {
            CircuitStateKind::Closed => {
                state.consecutive_failures = 0;
                None
            }
            CircuitStateKind::HalfOpen => {
                state.half_open_successes += 1;
                if state.half_open_successes >= self.config.success_threshold {
                    Some(transition(&mut state, CircuitStateKind::Closed, "half-open success threshold met", now))
                } else {
                    None
                }
            }
            CircuitStateKind::Open => None,
        }
    }

    pub fn record_failure(&self, agent_id: &str, reason: &str, now: Instant) -> Option<StateTransition> {
        let entry = self.agent_entry(agent_id, now);
        let mut state = entry.lock();
        self.maybe_half_open(&mut state, now);

        match state.state {
            CircuitStateKind::Closed => {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.config.failure_threshold {
                    Some(transition(&mut state, CircuitStateKind::Open, reason, now))
                } else {
                    None
                }
            }
            CircuitStateKind::HalfOpen => Some(transition(&mut state, CircuitStateKind::Open, reason, now)),
            CircuitStateKind::Open => None,
        }
    }

    pub fn record_drift(&self, agent_id: &str, score: f64, reason: &str, now: Instant) -> Option<StateTransition> {
        let entry = self.agent_entry(agent_id, now);
        let mut state = entry.lock();
        self.maybe_half_open(&mut state, now);

        if state.state != CircuitStateKind::Open && score >= self.config.drift_threshold {
            Some(transition(&mut state, CircuitStateKind::Open, reason, now))
        } else {
            None
        }
    }

    pub fn open_circuit(&self, agent_id: &str, reason: &str, now: Instant) -> Option<StateTransition> {
        let entry = self.agent_entry(agent_id, now);
        let mut state = entry.lock();
        if state.state == CircuitStateKind::Open {
            None
        } else {
            Some(transition(&mut state, CircuitStateKind::Open, reason, now))
        }
    }

    pub fn close_circuit(&self, agent_id: &str, now: Instant) -> Option<StateTransition> {
        let entry = self.agent_entry(agent_id, now);
        let mut state = entry.lock();
        if state.state == CircuitStateKind::Closed {
            None
        } else {
            Some(transition(&mut state, CircuitStateKind::Closed, "explicit close", now))
        }
    }

    fn maybe_half_open(&self, state: &mut CircuitState, now: Instant) {
        if state.state == CircuitStateKind::Open
            && let Some(opened_at) = state.opened_at
            && now.saturating_duration_since(opened_at) >= self.config.cool_down
        {
            transition(state, CircuitStateKind::HalfOpen, "cool-down elapsed", now);
        }
    }
}

fn transition(state: &mut CircuitState, to: CircuitStateKind, reason: &str, now: Instant) -> StateTransition {
    let from = state.state;
    state.state = to;
    state.last_transition = now;
    state.last_reason = reason.to_string();
    match to {
        CircuitStateKind::Open => state.opened_at = Some(now),
        CircuitStateKind::Closed => {
            state.opened_at = None;
            state.consecutive_failures = 0;
            state.half_open_successes = 0;
        }
        CircuitStateKind::HalfOpen => state.half_open_successes = 0,
    }
    StateTransition { from, to, reason: reason.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_by_default() {
        let breaker = CircuitBreaker::new(BreakerConfig::default());
        assert_eq!(breaker.state_of("a1"), CircuitStateKind::Closed);
        assert!(breaker.is_allowed("a1", Instant::now()));
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let breaker = CircuitBreaker::new(BreakerConfig::default());
        let t0 = Instant::now();
        for _ in 0..4 {
            assert!(breaker.record_failure("a1", "fail", t0).is_none());
        }
        let transition = breaker.record_failure("a1", "fail", t0).unwrap();
        assert_eq!(transition.to, CircuitStateKind::Open);
        assert!(!breaker.is_allowed("a1", t0));
    }

    #[test]
    fn opens_on_drift_threshold() {
        let breaker = CircuitBreaker::new(BreakerConfig::default());
        let t0 = Instant::now();
        let transition = breaker.record_drift("a1", 0.9, "drift", t0).unwrap();
        assert_eq!(transition.to, CircuitStateKind::Open);
    }

    #[test]
    fn full_lifecycle_open_half_open_closed() {
        let breaker = CircuitBreaker::new(BreakerConfig::default());
        let t0 = Instant::now();
        for _ in 0..5 {
            breaker.record_failure("a2", "fail", t0);
        }
        assert_eq!(breaker.state_of("a2"), CircuitStateKind::Open);
        assert!(!breaker.is_allowed("a2", t0));

        let after_cooldown = t0 + Duration::from_secs(61);
        assert!(breaker.is_allowed("a2", after_cooldown));
        assert_eq!(breaker.state_of("a2"), CircuitStateKind::HalfOpen);

        for _ in 0..3 {
            breaker.record_success("a2", after_cooldown);
        }
        assert_eq!(breaker.state_of("a2"), CircuitStateKind::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(BreakerConfig::default());
        let t0 = Instant::now();
        for _ in 0..5 {
            breaker.record_failure("a3", "fail", t0);
        }
        let after_cooldown = t0 + Duration::from_secs(61);
        assert!(breaker.is_allowed("a3", after_cooldown));
        let transition = breaker.record_failure("a3", "fail-in-half-open", after_cooldown).unwrap();
        assert_eq!(transition.to, CircuitStateKind::Open);
    }

    #[test]
    fn success_resets_consecutive_failures_while_closed() {
        let breaker = CircuitBreaker::new(BreakerConfig::default());
        let t0 = Instant::now();
        breaker.record_failure("a4", "fail", t0);
        breaker.record_failure("a4", "fail", t0);
        breaker.record_success("a4", t0);
        for _ in 0..4 {
            assert!(breaker.record_failure("a4", "fail", t0).is_none());
        }
    }
}
