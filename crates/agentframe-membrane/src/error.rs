use thiserror::Error;

/// Precondition failures raised by the stateful membrane components.
///
/// Per spec §7 these are *precondition* errors ("unknown agentId for
/// operations that require prior registration") — typed not-found values,
/// never a crash.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MembraneError {
    #[error("no baseline recorded for agent '{agent_id}' and intent hash '{intent_hash}'")]
    BaselineNotFound { agent_id: String, intent_hash: String },

    #[error("no delegation '{delegation_id}' found")]
    DelegationNotFound { delegation_id: String },
}
