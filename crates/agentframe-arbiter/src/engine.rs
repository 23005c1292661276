//! The Execution Arbiter: composes the Parser, Validator, Monitor, Breaker
//! and Delegation Ledger into one `evaluate` decision plus audit record
//! (spec §4.I).

use std::time::Instant;

use agentframe_core::frame::{self, ParsedFrame};
use agentframe_core::validator::{validate, ValidationReport, ValidationScope};
use agentframe_membrane::{
    Baseline, BaselineStore, CircuitBreaker, CircuitStateKind, ContinuousMonitor, DelegateOutcome,
    DelegateRejection, DelegationLedger, DriftMetrics,
};
use parking_lot::Mutex;

use crate::audit::{now_utc, reasons_from_report, AuditEntry, AuditLog, Decision};
use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;

/// Rule IDs whose warning marks a frame as a "risky" pattern requiring
/// human-in-the-loop approval rather than outright allow (spec §4.I step 5):
/// execute+forbidden (SM-002), escalate without authority (SM-003), commit
/// without approval (SM-005).
const RISKY_RULE_IDS: [&str; 3] = ["SM-002", "SM-003", "SM-005"];

/// Full `evaluate` response, matching spec §6's Arbiter response shape.
#[derive(Debug, Clone)]
pub struct EvaluateResponse {
    pub decision: Decision,
    pub reasons: Vec<String>,
    pub validation: ValidationReport,
    pub drift_score: f64,
    pub circuit_state: String,
    pub audit_id: String,
}

/// Composition root: owns one instance each of the stateful membrane
/// components plus the audit sink. Constructed once per process (or per
/// test), never as implicit global state (spec §9).
pub struct Engine {
    config: EngineConfig,
    baselines: BaselineStore,
    monitor: ContinuousMonitor,
    breaker: CircuitBreaker,
    ledger: DelegationLedger,
    audit: Mutex<AuditLog>,
}

impl Engine {
    #[must_use]
    pub fn new(config: EngineConfig, audit: AuditLog) -> Self {
        let (breaker_config, monitor_config) = config.component_configs();
        Self {
            config,
            baselines: BaselineStore::new(),
            monitor: ContinuousMonitor::new(monitor_config),
            breaker: CircuitBreaker::new(breaker_config),
            ledger: DelegationLedger::new(),
            audit: Mutex::new(audit),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn baselines(&self) -> &BaselineStore {
        &self.baselines
    }

    #[must_use]
    pub fn monitor(&self) -> &ContinuousMonitor {
        &self.monitor
    }

    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    #[must_use]
    pub fn ledger(&self) -> &DelegationLedger {
        &self.ledger
    }

    /// Steps 1-5 of spec §4.I. Step 6 (the caller running the action and
    /// calling [`Engine::report`]) happens outside the Arbiter.
    pub fn evaluate(
        &self,
        agent_id: &str,
        raw_frame: &str,
        parent_raw_frame: Option<&str>,
        now: Instant,
    ) -> EvaluateResponse {
        self.evaluate_checked(agent_id, raw_frame, parent_raw_frame, now, None)
            .expect("uncancellable evaluate() never observes a cancellation")
    }

    /// Cancellable variant of [`Engine::evaluate`]. Returns `None`, with no
    /// audit entry and no breaker/monitor mutation, if `cancel` is flagged
    /// before the commit checkpoint (spec §5).
    #[must_use]
    pub fn evaluate_cancellable(
        &self,
        agent_id: &str,
        raw_frame: &str,
        parent_raw_frame: Option<&str>,
        now: Instant,
        cancel: &CancellationToken,
    ) -> Option<EvaluateResponse> {
        self.evaluate_checked(agent_id, raw_frame, parent_raw_frame, now, Some(cancel))
    }

    fn evaluate_checked(
        &self,
        agent_id: &str,
        raw_frame: &str,
        parent_raw_frame: Option<&str>,
        now: Instant,
        cancel: Option<&CancellationToken>,
    ) -> Option<EvaluateResponse> {
        let parsed = frame::parse(raw_frame);
        let parent = parent_raw_frame.map(frame::parse);
        let validation = validate(&parsed, parent.as_ref(), ValidationScope::Full);
        let drift_score = self.monitor.current_drift_score(agent_id);
        let ts = now_utc();

        // Commit checkpoint: everything above is pure (parse/validate) or a
        // read (current_drift_score). Nothing has mutated state yet, so
        // this is the last point a cancellation can take effect cleanly.
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return None;
        }

        if !validation.errors.is_empty() {
            self.breaker.record_failure(agent_id, "validation error", now);
            let reasons = reasons_from_report(&validation);
            return Some(self.finish(
                agent_id,
                &parsed,
                parent.as_ref(),
                Decision::Block,
                reasons,
                validation,
                drift_score,
                &ts,
            ));
        }

        if !self.breaker.is_allowed(agent_id, now) {
            return Some(self.finish(
                agent_id,
                &parsed,
                parent.as_ref(),
                Decision::Block,
                vec!["circuit_open".to_string()],
                validation,
                drift_score,
                &ts,
            ));
        }

        let risky: Vec<String> = validation
            .warnings
            .iter()
            .filter(|w| RISKY_RULE_IDS.contains(&w.rule_id))
            .map(|w| w.rule_id.to_string())
            .collect();
        if !risky.is_empty() {
            return Some(self.finish(
                agent_id,
                &parsed,
                parent.as_ref(),
                Decision::Hold,
                risky,
                validation,
                drift_score,
                &ts,
            ));
        }

        Some(self.finish(
            agent_id,
            &parsed,
            parent.as_ref(),
            Decision::Allow,
            Vec::new(),
            validation,
            drift_score,
            &ts,
        ))
    }

    fn finish(
        &self,
        agent_id: &str,
        frame: &ParsedFrame,
        parent: Option<&ParsedFrame>,
        decision: Decision,
        reasons: Vec<String>,
        validation: ValidationReport,
        drift_score: f64,
        ts: &str,
    ) -> EvaluateResponse {
        let circuit_state = circuit_state_str(self.breaker.state_of(agent_id));
        let entry = AuditEntry {
            ts: ts.to_string(),
            agent_id: agent_id.to_string(),
            frame: frame.raw.clone(),
            parent_frame: parent.map(|p| p.raw.clone()),
            decision,
            reasons: reasons.clone(),
            drift_score,
            circuit_state: circuit_state.clone(),
            audit_id: String::new(),
        };
        let recorded = self
            .audit
            .lock()
            .append(entry)
            .expect("in-memory/append-only audit sink does not fail under normal operation");

        EvaluateResponse {
            decision,
            reasons,
            validation,
            drift_score,
            circuit_state,
            audit_id: recorded.audit_id,
        }
    }

    /// Step 6 of spec §4.I: the caller's post-action report. Forwards into
    /// the Monitor and Breaker. `observed_embedding` is the same extension
    /// documented on [`ContinuousMonitor::record_operation`].
    pub fn report(
        &self,
        agent_id: &str,
        frame: &ParsedFrame,
        behaviors: &[String],
        success: bool,
        sender_id: Option<&str>,
        observed_embedding: Option<&[f64]>,
        now: Instant,
    ) -> DriftMetrics {
        self.report_checked(agent_id, frame, behaviors, success, sender_id, observed_embedding, now, None)
            .expect("uncancellable report() never observes a cancellation")
    }

    /// Cancellable variant of [`Engine::report`]. Returns `None`, with no
    /// Monitor/Breaker mutation, if `cancel` is flagged before the commit
    /// checkpoint (spec §5).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn report_cancellable(
        &self,
        agent_id: &str,
        frame: &ParsedFrame,
        behaviors: &[String],
        success: bool,
        sender_id: Option<&str>,
        observed_embedding: Option<&[f64]>,
        now: Instant,
        cancel: &CancellationToken,
    ) -> Option<DriftMetrics> {
        self.report_checked(agent_id, frame, behaviors, success, sender_id, observed_embedding, now, Some(cancel))
    }

    #[allow(clippy::too_many_arguments)]
    fn report_checked(
        &self,
        agent_id: &str,
        frame: &ParsedFrame,
        behaviors: &[String],
        success: bool,
        sender_id: Option<&str>,
        observed_embedding: Option<&[f64]>,
        now: Instant,
        cancel: Option<&CancellationToken>,
    ) -> Option<DriftMetrics> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return None;
        }
        let ts = now_utc();
        let metrics = self.monitor.record_operation(
            &self.baselines,
            agent_id,
            frame,
            behaviors,
            success,
            sender_id,
            observed_embedding,
            &ts,
        );
        if success {
            self.breaker.record_success(agent_id, now);
        } else {
            self.breaker.record_failure(agent_id, "reported failure", now);
        }
        if metrics.current_drift_score >= self.config.drift_threshold {
            self.breaker.record_drift(agent_id, metrics.current_drift_score, "drift threshold", now);
        }
        Some(metrics)
    }

    /// Records a baseline for `(agentId, frame.intentHash)`, so later
    /// `report` calls have something to compare against (spec §4.D).
    pub fn record_baseline(
        &self,
        agent_id: &str,
        frame: &ParsedFrame,
        expected_behaviors: impl IntoIterator<Item = String>,
        reference_embedding: Vec<f64>,
    ) {
        let ts = now_utc();
        self.baselines.record(agent_id, frame, expected_behaviors, reference_embedding, &ts);
    }

    #[must_use]
    pub fn baseline(&self, agent_id: &str, intent_hash: &str) -> Option<Baseline> {
        self.baselines.get(agent_id, intent_hash)
    }

    /// Delegates a child frame from a parent (spec §4.H), recording a chain
    /// validation pass plus a ledger entry.
    pub fn delegate(
        &self,
        parent_agent_id: &str,
        child_agent_id: &str,
        parent_frame: &ParsedFrame,
        child_frame: &ParsedFrame,
        delegated_actions: &[String],
        declared_constraints: &[char],
    ) -> Result<DelegateOutcome, DelegateRejection> {
        let ts = now_utc();
        self.ledger.delegate(
            parent_agent_id,
            child_agent_id,
            parent_frame,
            child_frame,
            delegated_actions,
            declared_constraints,
            &ts,
        )
    }
}

/// A convenience default engine for embedders who don't need a custom
/// config or audit sink. Optional by construction (spec §9): nothing in
/// the crate reaches for this implicitly, and `Engine::new` remains the
/// primary constructor.
impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default(), AuditLog::to_buffer())
    }
}

fn circuit_state_str(state: CircuitStateKind) -> String {
    match state {
        CircuitStateKind::Closed => "closed".to_string(),
        CircuitStateKind::Open => "open".to_string(),
        CircuitStateKind::HalfOpen => "half_open".to_string(),
    }
}
