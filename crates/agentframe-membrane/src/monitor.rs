//! Per-agent embedding trend, drift score, and alert emission (spec §4.F).

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use agentframe_core::ParsedFrame;
use parking_lot::{Mutex, RwLock};

use crate::baseline::BaselineStore;

/// Default embedding ring-buffer capacity per agent.
pub const DEFAULT_EMBEDDING_WINDOW: usize = 100;
/// Default threshold above which baseline/ring drift emits `semantic_erosion`.
pub const DEFAULT_SEMANTIC_DRIFT_THRESHOLD: f64 = 0.15;
/// Default tripwire failure-rate threshold above which `goal_displacement`
/// is emitted.
pub const DEFAULT_TRIPWIRE_FAILURE_THRESHOLD: f64 = 0.3;
/// Minimum distinct senders of the same frame with divergent behavior
/// before `emergent_protocol` is emitted. Not one of spec §6's enumerated
/// configuration knobs, so it is a compile-time constant rather than a
/// runtime setting.
pub const EMERGENT_PROTOCOL_MIN_SENDERS: usize = 3;
/// Alert ring capacity per agent.
const MAX_ALERTS: usize = 100;
/// Tripwire outcome window consulted for the `goal_displacement` check.
const TRIPWIRE_WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Stable,
    Increasing,
    Decreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertType {
    SemanticErosion,
    EmergentProtocol,
    GoalDisplacement,
    /// Modeled for data-model completeness (spec §3 lists it among
    /// `DriftAlert.type`); §4.F documents no automatic trigger for it.
    PatternLockIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriftAlert {
    pub alert_id: String,
    pub agent_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub detected_at: String,
    pub evidence: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriftMetrics {
    pub current_drift_score: f64,
    pub trend: Option<Trend>,
    pub tests_passed: u64,
    pub tests_failed: u64,
    pub tripwires_triggered: u64,
}

struct AgentState {
    metrics: DriftMetrics,
    embedding_window: VecDeque<Vec<f64>>,
    alerts: VecDeque<DriftAlert>,
    tripwire_outcomes: VecDeque<bool>,
    sender_behaviors: HashMap<String, HashMap<String, BTreeSet<String>>>,
    alert_seq: u64,
}

impl AgentState {
    fn new() -> Self {
        Self {
            metrics: DriftMetrics::default(),
            embedding_window: VecDeque::new(),
            alerts: VecDeque::new(),
            tripwire_outcomes: VecDeque::new(),
            sender_behaviors: HashMap::new(),
            alert_seq: 0,
        }
    }

    fn push_alert(&mut self, agent_id: &str, alert_type: AlertType, severity: AlertSeverity, message: String, now: &str, evidence: String) {
        self.alert_seq += 1;
        self.alerts.push_back(DriftAlert {
            alert_id: format!("{agent_id}-alert-{}", self.alert_seq),
            agent_id: agent_id.to_string(),
            alert_type,
            severity,
            message,
            detected_at: now.to_string(),
            evidence,
        });
        while self.alerts.len() > MAX_ALERTS {
            self.alerts.pop_front();
        }
    }
}

/// Tunable thresholds, mirroring the relevant subset of spec §6's
/// configuration table.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    pub embedding_window_size: usize,
    pub semantic_drift_threshold: f64,
    pub tripwire_failure_threshold: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            embedding_window_size: DEFAULT_EMBEDDING_WINDOW,
            semantic_drift_threshold: DEFAULT_SEMANTIC_DRIFT_THRESHOLD,
            tripwire_failure_threshold: DEFAULT_TRIPWIRE_FAILURE_THRESHOLD,
        }
    }
}

/// Keyed by `agentId`, each agent's state behind its own lock — a write for
/// one agent never blocks a read or write for another (spec §9's per-agent-
/// lock design note). The outer `RwLock` is only ever held long enough to
/// fetch or create that agent's entry.
pub struct ContinuousMonitor {
    config: MonitorConfig,
    states: RwLock<HashMap<String, Arc<Mutex<AgentState>>>>,
}

impl ContinuousMonitor {
    #[must_use]
    pub fn new(config: MonitorConfig) -> Self {
        Self { config, states: RwLock::new(HashMap::new()) }
    }

    fn agent_entry(&self, agent_id: &str) -> Arc<Mutex<AgentState>> {
        if let Some(entry) = self.states.read().get(agent_id) {
            return Arc::clone(entry);
        }
        Arc::clone(
            self.states
                .write()
                .entry(agent_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(AgentState::new()))),
        )
    }

    fn agent_entry_if_present(&self, agent_id: &str) -> Option<Arc<Mutex<AgentState>>> {
        self.states.read().get(agent_id).cloned()
    }

    /// Canonical intake point, called by the Arbiter after every action.
    ///
    /// The literal spec signature is `(agentId, frame, behaviors[], success,
    /// senderId?)`; an `observedEmbedding` parameter is added here because
    /// nothing else documented in §4.F ever populates the embedding ring
    /// buffer that `currentDriftScore`'s rule (ii) depends on.
    pub fn record_operation(
        &self,
        baselines: &BaselineStore,
        agent_id: &str,
        frame: &ParsedFrame,
        behaviors: &[String],
        success: bool,
        sender_id: Option<&str>,
        observed_embedding: Option<&[f64]>,
        now: &str,
    ) -> DriftMetrics {
        let entry = self.agent_entry(agent_id);
        let mut state = entry.lock();

        if success {
            state.metrics.tests_passed += 1;
        } else {
            state.metrics.tests_failed += 1;
        }

        if let Some(embedding) = observed_embedding {
            state.embedding_window.push_back(embedding.to_vec());
            while state.embedding_window.len() > self.config.embedding_window_size {
                state.embedding_window.pop_front();
            }
        }

        if let Some(sender_id) = sender_id {
            let behavior_set: BTreeSet<String> =
                behaviors.iter().map(|b| b.trim().to_lowercase()).collect();
            let senders = state.sender_behaviors.entry(frame.intent_hash.clone()).or_default();
            senders.insert(sender_id.to_string(), behavior_set);

            let distinct_behavior_sets: BTreeSet<&BTreeSet<String>> = senders.values().collect();
            let emits_emergent_protocol =
                senders.len() >= EMERGENT_PROTOCOL_MIN_SENDERS && distinct_behavior_sets.len() > 1;
            let sender_count = senders.len();
            let evidence = format!("{senders:?}");

            if emits_emergent_protocol {
                state.push_alert(
                    agent_id,
                    AlertType::EmergentProtocol,
                    AlertSeverity::Medium,
                    format!(
                        "{sender_count} distinct senders produced divergent behavior sets for frame {}",
                        frame.intent_hash
                    ),
                    now,
                    evidence,
                );
            }
        }

        let baseline_drift = baselines
            .compare(agent_id, frame, behaviors.iter().cloned(), observed_embedding.unwrap_or(&[]))
            .drift_score;
        let ring_drift = ring_drift_score(&state.embedding_window);
        let drift_score = baseline_drift.max(ring_drift).clamp(0.0, 1.0);
        state.metrics.current_drift_score = drift_score;
        state.metrics.trend = trend_from_window(&state.embedding_window);

        if drift_score > self.config.semantic_drift_threshold {
            state.push_alert(
                agent_id,
                AlertType::SemanticErosion,
                severity_for_drift(drift_score),
                format!("drift score {drift_score:.3} exceeds semantic drift threshold"),
                now,
                format!("{drift_score:.6}"),
            );
        }

        state.metrics.clone()
    }

    /// Records a tripwire injection outcome against the agent, per "probes
    /// are first-class observations; their results feed into the Monitor"
    /// (spec §4.E/§4.F).
    pub fn record_tripwire_outcome(&self, agent_id: &str, passed: bool, now: &str) {
        let entry = self.agent_entry(agent_id);
        let mut state = entry.lock();
        if !passed {
            state.metrics.tripwires_triggered += 1;
        }
        state.tripwire_outcomes.push_back(passed);
        while state.tripwire_outcomes.len() > TRIPWIRE_WINDOW {
            state.tripwire_outcomes.pop_front();
        }

        let n = state.tripwire_outcomes.len();
        if n == 0 {
            return;
        }
        let failures = state.tripwire_outcomes.iter().filter(|p| !**p).count();
        let rate = failures as f64 / n as f64;
        if rate > self.config.tripwire_failure_threshold {
            state.push_alert(
                agent_id,
                AlertType::GoalDisplacement,
                severity_for_drift(rate),
                format!("tripwire failure rate {rate:.3} exceeds threshold over last {n} probes"),
                now,
                format!("{rate:.6}"),
            );
        }
    }

    #[must_use]
    pub fn current_drift_score(&self, agent_id: &str) -> f64 {
        self.agent_entry_if_present(agent_id).map_or(0.0, |s| s.lock().metrics.current_drift_score)
    }

    #[must_use]
    pub fn trend(&self, agent_id: &str) -> Option<Trend> {
        self.agent_entry_if_present(agent_id).and_then(|s| s.lock().metrics.trend)
    }

    #[must_use]
    pub fn metrics(&self, agent_id: &str) -> DriftMetrics {
        self.agent_entry_if_present(agent_id).map_or_else(DriftMetrics::default, |s| s.lock().metrics.clone())
    }

    #[must_use]
    pub fn alerts(&self, agent_id: &str) -> Vec<DriftAlert> {
        self.agent_entry_if_present(agent_id)
            .map_or_else(Vec::new, |s| s.lock().alerts.iter().cloned().collect())
    }
}

fn severity_for_drift(score: f64) -> AlertSeverity {
    if score >= 0.75 {
        AlertSeverity::Critical
    } else if score >= 0.5 {
        AlertSeverity::High
    } else if score >= 0.25 {
        AlertSeverity::Medium
    } else {
        AlertSeverity::Low
    }
}

/// Mean cosine distance between the first half and second half of the ring
/// buffer, when at least 2 embeddings are present; `0.0` otherwise.
fn ring_drift_score(window: &VecDeque<Vec<f64>>) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    let items: Vec<&[f64]> = window.iter().map(Vec::as_slice).collect();
    let mid = items.len() / 2;
    let (first, second) = items.split_at(mid);
    let mut total = 0.0;
    let mut count = 0usize;
    for a in first {
        for b in second {
            total += cosine_distance(a, b);
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        (total / count as f64).clamp(0.0, 1.0)
    }
}

fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let similarity = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0);
    (1.0 - similarity) / 2.0
}

/// Compares the mean of the last 5 pairwise-adjacent distances to the prior
/// 5; `stable` if the window is too short to compare.
fn trend_from_window(window: &VecDeque<Vec<f64>>) -> Option<Trend> {
    let items: Vec<&[f64]> = window.iter().map(Vec::as_slice).collect();
    let distances: Vec<f64> =
        items.windows(2).map(|pair| cosine_distance(pair[0], pair[1])).collect();
    if distances.len() < 10 {
        return if distances.is_empty() { None } else { Some(Trend::Stable) };
    }
    let n = distances.len();
    let last5 = &distances[n - 5..];
    let prior5 = &distances[n - 10..n - 5];
    let mean_last = last5.iter().sum::<f64>() / 5.0;
    let mean_prior = prior5.iter().sum::<f64>() / 5.0;
    let delta = mean_last - mean_prior;
    Some(if delta.abs() < 0.02 {
        Trend::Stable
    } else if delta > 0.0 {
        Trend::Increasing
    } else {
        Trend::Decreasing
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentframe_core::frame::parse;

    #[test]
    fn record_operation_is_monotonic_in_counters() {
        let monitor = ContinuousMonitor::new(MonitorConfig::default());
        let baselines = BaselineStore::new();
        let frame = parse("⊕◊▶β");
        let mut total = 0u64;
        for i in 0..5 {
            let m = monitor.record_operation(
                &baselines,
                "a1",
                &frame,
                &["read".to_string()],
                i % 2 == 0,
                None,
                None,
                "t",
            );
            let new_total = m.tests_passed + m.tests_failed;
            assert_eq!(new_total, total + 1);
            total = new_total;
        }
    }

    #[test]
    fn emergent_protocol_alert_on_divergent_senders() {
        let monitor = ContinuousMonitor::new(MonitorConfig::default());
        let baselines = BaselineStore::new();
        let frame = parse("⊕◊▶β");
        for (sender, behavior) in [("s1", "read"), ("s2", "write"), ("s3", "delete")] {
            monitor.record_operation(
                &baselines,
                "a1",
                &frame,
                &[behavior.to_string()],
                true,
                Some(sender),
                None,
                "t",
            );
        }
        let alerts = monitor.alerts("a1");
        assert!(alerts.iter().any(|a| a.alert_type == AlertType::EmergentProtocol));
    }

    #[test]
    fn no_emergent_protocol_alert_when_behaviors_agree() {
        let monitor = ContinuousMonitor::new(MonitorConfig::default());
        let baselines = BaselineStore::new();
        let frame = parse("⊕◊▶β");
        for sender in ["s1", "s2", "s3"] {
            monitor.record_operation(
                &baselines,
                "a1",
                &frame,
                &["read".to_string()],
                true,
                Some(sender),
                None,
                "t",
            );
        }
        let alerts = monitor.alerts("a1");
        assert!(!alerts.iter().any(|a| a.alert_type == AlertType::EmergentProtocol));
    }

    #[test]
    fn goal_displacement_alert_on_high_tripwire_failure_rate() {
        let monitor = ContinuousMonitor::new(MonitorConfig::default());
        for _ in 0..10 {
            monitor.record_tripwire_outcome("a1", false, "t");
        }
        let alerts = monitor.alerts("a1");
        assert!(alerts.iter().any(|a| a.alert_type == AlertType::GoalDisplacement));
        assert_eq!(monitor.metrics("a1").tripwires_triggered, 10);
    }

    #[test]
    fn alert_ring_is_bounded() {
        let monitor = ContinuousMonitor::new(MonitorConfig::default());
        for _ in 0..(MAX_ALERTS + 20) {
            monitor.record_tripwire_outcome("a1", false, "t");
        }
        assert!(monitor.alerts("a1").len() <= MAX_ALERTS);
    }

    #[test]
    fn drift_score_uses_baseline_when_present() {
        let monitor = ContinuousMonitor::new(MonitorConfig::default());
        let baselines = BaselineStore::new();
        let frame = parse("⊕◊▶β");
        baselines.record("a1", &frame, vec!["read".to_string()], vec![1.0, 0.0], "t0");
        monitor.record_operation(
            &baselines,
            "a1",
            &frame,
            &["delete".to_string()],
            true,
            None,
            Some(&[0.0, 1.0]),
            "t1",
        );
        assert!(monitor.current_drift_score("a1") > 0.0);
    }
}
