//! Parent→child frame relationships across multi-agent delegation chains
//! (spec §4.H).

use std::collections::HashMap;
use std::sync::Arc;

use agentframe_core::validator::{validate, Severity, ValidationResult, ValidationScope};
use agentframe_core::ParsedFrame;
use parking_lot::{Mutex, RwLock};

use crate::error::MembraneError;

#[derive(Debug, Clone, PartialEq)]
pub struct Delegation {
    pub delegation_id: String,
    pub parent_agent_id: String,
    pub child_agent_id: String,
    pub parent_frame_hash: String,
    pub child_frame_hash: String,
    pub delegated_actions: Vec<String>,
    pub created_at: String,
    pub revoked_at: Option<String>,
}

impl Delegation {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelegateOutcome {
    pub delegation_id: String,
    pub effective_child_frame: ParsedFrame,
    pub warnings: Vec<ValidationResult>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelegateRejection {
    pub errors: Vec<ValidationResult>,
}

/// Composite-key idempotent by `(parentAgentId, childAgentId)` — a
/// re-delegation of the same pair replaces the prior record (spec §9
/// design note on cyclic relationships). Each delegation record lives
/// behind its own lock, so a write to one parent/child pair never blocks a
/// read or write on another (spec §9's per-agent-lock design note; the unit
/// of locking here is the delegation record rather than a bare agentId,
/// since that is this module's natural unit of write contention).
pub struct DelegationLedger {
    records: RwLock<HashMap<String, Arc<Mutex<Delegation>>>>,
}

impl DelegationLedger {
    #[must_use]
    pub fn new() -> Self {
        Self { records: RwLock::new(HashMap::new()) }
    }

    /// Validates `child_frame` against `parent_frame` on the chain tier; on
    /// success, stores (or replaces) the delegation record.
    ///
    /// `declared_constraints` are checked for presence on the child frame
    /// and surfaced as advisory warnings (rule `LD-001`) if any are
    /// missing — the child frame itself, not `declared_constraints`, remains
    /// the sole source of truth for what is enforced.
    pub fn delegate(
        &self,
        parent_agent_id: &str,
        child_agent_id: &str,
        parent_frame: &ParsedFrame,
        child_frame: &ParsedFrame,
        delegated_actions: &[String],
        declared_constraints: &[char],
        now: &str,
    ) -> Result<DelegateOutcome, DelegateRejection> {
        let report = validate(child_frame, Some(parent_frame), ValidationScope::Chain);
        if !report.errors.is_empty() {
            return Err(DelegateRejection { errors: report.errors });
        }

        let mut warnings = report.warnings;
        for constraint in declared_constraints {
            if !child_frame.constraints.contains(constraint) {
                warnings.push(ValidationResult {
                    rule_id: "LD-001",
                    severity: Severity::Warning,
                    message: "declared constraint not asserted on child frame".to_string(),
                    detail: Some(constraint.to_string()),
                });
            }
        }

        let delegation_id = format!("{parent_agent_id}:{child_agent_id}");
        let record = Delegation {
            delegation_id: delegation_id.clone(),
            parent_agent_id: parent_agent_id.to_string(),
            child_agent_id: child_agent_id.to_string(),
            parent_frame_hash: parent_frame.intent_hash.clone(),
            child_frame_hash: child_frame.intent_hash.clone(),
            delegated_actions: delegated_actions.to_vec(),
            created_at: now.to_string(),
            revoked_at: None,
        };
        self.records.write().insert(delegation_id.clone(), Arc::new(Mutex::new(record)));

        Ok(DelegateOutcome { delegation_id, effective_child_frame: child_frame.clone(), warnings })
    }

    /// Marks the delegation inactive.
    pub fn revoke(&self, delegation_id: &str, now: &str) -> Result<(), MembraneError> {
        match self.records.read().get(delegation_id) {
            Some(entry) => {
                entry.lock().revoked_at = Some(now.to_string());
                Ok(())
            }
            None => Err(MembraneError::DelegationNotFound { delegation_id: delegation_id.to_string() }),
        }
    }

    #[must_use]
    pub fn active(&self, child_agent_id: &str) -> Vec<Delegation> {
        self.records
            .read()
            .values()
            .filter_map(|entry| {
                let d = entry.lock();
                (d.child_agent_id == child_agent_id && d.is_active()).then(|| d.clone())
            })
            .collect()
    }

    #[must_use]
    pub fn get(&self, delegation_id: &str) -> Option<Delegation> {
        self.records.read().get(delegation_id).map(|entry| entry.lock().clone())
    }
}

impl Default for DelegationLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentframe_core::frame::parse;

    #[test]
    fn delegate_succeeds_when_chain_valid() {
        let ledger = DelegationLedger::new();
        let parent = parse("⊕◊▼α");
        let child = parse("⊕◊▶β");
        let outcome = ledger
            .delegate("p1", "c1", &parent, &child, &["execute".to_string()], &[], "t0")
            .unwrap();
        assert_eq!(outcome.delegation_id, "p1:c1");
        assert_eq!(ledger.active("c1").len(), 1);
    }

    #[test]
    fn delegate_rejects_on_chain_error() {
        let ledger = DelegationLedger::new();
        let parent = parse("⊕◊⛔▼α");
        let child = parse("⊕◊▶β");
        let rejection = ledger
            .delegate("p1", "c1", &parent, &child, &["execute".to_string()], &[], "t0")
            .unwrap_err();
        assert!(rejection.errors.iter().any(|e| e.rule_id == "CH-003"));
        assert!(ledger.active("c1").is_empty());
    }

    #[test]
    fn re_delegation_replaces_prior_record() {
        let ledger = DelegationLedger::new();
        let parent = parse("⊕◊▼α");
        let child1 = parse("⊕◊▶β");
        let child2 = parse("⊕♦▶β");
        ledger.delegate("p1", "c1", &parent, &child1, &[], &[], "t0").unwrap();
        ledger.delegate("p1", "c1", &parent, &child2, &[], &[], "t1").unwrap();
        let active = ledger.active("c1");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].child_frame_hash, child2.intent_hash);
    }

    #[test]
    fn revoke_deactivates_delegation() {
        let ledger = DelegationLedger::new();
        let parent = parse("⊕◊▼α");
        let child = parse("⊕◊▶β");
        let outcome = ledger.delegate("p1", "c1", &parent, &child, &[], &[], "t0").unwrap();
        ledger.revoke(&outcome.delegation_id, "t1").unwrap();
        assert!(ledger.active("c1").is_empty());
    }

    #[test]
    fn revoke_unknown_returns_not_found() {
        let ledger = DelegationLedger::new();
        let err = ledger.revoke("missing", "t0").unwrap_err();
        assert!(matches!(err, MembraneError::DelegationNotFound { .. }));
    }

    #[test]
    fn missing_declared_constraint_is_a_warning_not_a_rejection() {
        let ledger = DelegationLedger::new();
        let parent = parse("⊕◊▼α");
        let child = parse("⊕◊▶β");
        let outcome =
            ledger.delegate("p1", "c1", &parent, &child, &[], &['⛔'], "t0").unwrap();
        assert!(outcome.warnings.iter().any(|w| w.rule_id == "LD-001"));
    }
}
