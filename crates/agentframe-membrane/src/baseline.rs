//! Per-(agent, frame) behavior and embedding baselines (spec §4.D).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use agentframe_core::ParsedFrame;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::MembraneError;

/// Weight given to the behavior symmetric-difference ratio in the blended
/// drift score.
const BEHAVIOR_WEIGHT: f64 = 0.6;
/// Weight given to the normalized embedding cosine distance.
const EMBEDDING_WEIGHT: f64 = 0.4;

/// A recorded baseline for one `(agentId, intentHash)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    pub expected_behaviors: BTreeSet<String>,
    pub reference_embedding: Vec<f64>,
    pub created_at: String,
    pub last_seen_at: String,
}

/// Outcome of comparing observed behavior/embedding against a baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftComparison {
    pub has_baseline: bool,
    pub drift_score: f64,
    pub missing_behaviors: Vec<String>,
    pub extra_behaviors: Vec<String>,
    pub embedding_distance: f64,
}

/// One row of the baseline snapshot persistence format (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub agent_id: String,
    pub intent_hash: String,
    pub expected_behaviors: Vec<String>,
    pub reference_embedding: Vec<f64>,
    pub created_at: String,
    pub last_seen_at: String,
}

#[derive(Default)]
struct AgentBaselines {
    by_intent_hash: HashMap<String, Baseline>,
}

/// Keyed by `agentId`, each agent's baselines behind their own lock. A write
/// for one agent never blocks a read or write for another (spec §9's
/// per-agent-lock design note) — the outer `RwLock` is only ever held long
/// enough to fetch or create that agent's entry.
pub struct BaselineStore {
    agents: RwLock<HashMap<String, Arc<Mutex<AgentBaselines>>>>,
}

impl BaselineStore {
    #[must_use]
    pub fn new() -> Self {
        Self { agents: RwLock::new(HashMap::new()) }
    }

    fn agent_entry(&self, agent_id: &str) -> Arc<Mutex<AgentBaselines>> {
        if let Some(entry) = self.agents.read().get(agent_id) {
            return Arc::clone(entry);
        }
        Arc::clone(
            self.agents
                .write()
                .entry(agent_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(AgentBaselines::default()))),
        )
    }

    fn agent_entry_if_present(&self, agent_id: &str) -> Option<Arc<Mutex<AgentBaselines>>> {
        self.agents.read().get(agent_id).cloned()
    }

    /// Records (or overwrites) the baseline for `(agentId, frame.intentHash)`.
    pub fn record(
        &self,
        agent_id: &str,
        frame: &ParsedFrame,
        expected_behaviors: impl IntoIterator<Item = String>,
        reference_embedding: Vec<f64>,
        now: &str,
    ) {
        let entry = self.agent_entry(agent_id);
        let mut agent = entry.lock();
        let created_at = agent
            .by_intent_hash
            .get(&frame.intent_hash)
            .map_or_else(|| now.to_string(), |b| b.created_at.clone());
        agent.by_intent_hash.insert(
            frame.intent_hash.clone(),
            Baseline {
                expected_behaviors: canonicalize(expected_behaviors),
                reference_embedding,
                created_at,
                last_seen_at: now.to_string(),
            },
        );
    }

    #[must_use]
    pub fn get(&self, agent_id: &str, intent_hash: &str) -> Option<Baseline> {
        let entry = self.agent_entry_if_present(agent_id)?;
        let agent = entry.lock();
        agent.by_intent_hash.get(intent_hash).cloned()
    }

    /// Compares observed behaviors/embedding against the stored baseline for
    /// `frame`. Returns a zero drift-score, empty-diff result if no baseline
    /// is recorded.
    #[must_use]
    pub fn compare(
        &self,
        agent_id: &str,
        frame: &ParsedFrame,
        observed_behaviors: impl IntoIterator<Item = String>,
        observed_embedding: &[f64],
    ) -> DriftComparison {
        let observed = canonicalize(observed_behaviors);
        let Some(baseline) = self.get(agent_id, &frame.intent_hash) else {
            return DriftComparison {
                has_baseline: false,
                drift_score: 0.0,
                missing_behaviors: Vec::new(),
                extra_behaviors: Vec::new(),
                embedding_distance: 0.0,
            };
        };

        let missing: Vec<String> =
            baseline.expected_behaviors.difference(&observed).cloned().collect();
        let extra: Vec<String> =
            observed.difference(&baseline.expected_behaviors).cloned().collect();
        let union_len = baseline.expected_behaviors.union(&observed).count();
        let behavior_ratio = if union_len == 0 {
            0.0
        } else {
            (missing.len() + extra.len()) as f64 / union_len as f64
        };

        let embedding_distance =
            normalized_cosine_distance(&baseline.reference_embedding, observed_embedding);

        let drift_score =
            (BEHAVIOR_WEIGHT * behavior_ratio + EMBEDDING_WEIGHT * embedding_distance).clamp(0.0, 1.0);

        DriftComparison {
            has_baseline: true,
            drift_score,
            missing_behaviors: missing,
            extra_behaviors: extra,
            embedding_distance,
        }
    }

    pub fn clear_agent(&self, agent_id: &str) {
        self.agents.write().remove(agent_id);
    }

    pub fn clear_all(&self) {
        self.agents.write().clear();
    }

    /// Bulk export for persistence collaborators (spec §6). Unlike
    /// `record`/`get`, this necessarily touches every agent's entry — it is
    /// a bulk/administrative operation, not a single-agent one.
    #[must_use]
    pub fn snapshot(&self) -> Vec<BaselineRecord> {
        self.agents
            .read()
            .iter()
            .flat_map(|(agent_id, entry)| {
                let agent = entry.lock();
                agent
                    .by_intent_hash
                    .iter()
                    .map(|(intent_hash, b)| BaselineRecord {
                        agent_id: agent_id.clone(),
                        intent_hash: intent_hash.clone(),
                        expected_behaviors: b.expected_behaviors.iter().cloned().collect(),
                        reference_embedding: b.reference_embedding.clone(),
                        created_at: b.created_at.clone(),
                        last_seen_at: b.last_seen_at.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Bulk load, replacing all current state. No partial state is
    /// observable: the swap happens under one lock acquisition.
    pub fn load_snapshot(&self, records: Vec<BaselineRecord>) {
        let mut by_agent: HashMap<String, AgentBaselines> = HashMap::new();
        for r in records {
            by_agent.entry(r.agent_id).or_default().by_intent_hash.insert(
                r.intent_hash,
                Baseline {
                    expected_behaviors: r.expected_behaviors.into_iter().collect(),
                    reference_embedding: r.reference_embedding,
                    created_at: r.created_at,
                    last_seen_at: r.last_seen_at,
                },
            );
        }
        let agents =
            by_agent.into_iter().map(|(agent_id, state)| (agent_id, Arc::new(Mutex::new(state)))).collect();
        *self.agents.write() = agents;
    }

    /// Typed-not-found accessor, for callers that must distinguish "no
    /// baseline" from "empty baseline" (spec §7 precondition errors).
    pub fn require(&self, agent_id: &str, intent_hash: &str) -> Result<Baseline, MembraneError> {
        self.get(agent_id, intent_hash).ok_or_else(|| MembraneError::BaselineNotFound {
            agent_id: agent_id.to_string(),
            intent_hash: intent_hash.to_string(),
        })
    }
}

impl Default for BaselineStore {
    fn default() -> Self {
        Self::new()
    }
}

fn canonicalize(behaviors: impl IntoIterator<Item = String>) -> BTreeSet<String> {
    behaviors.into_iter().map(|b| b.trim().to_lowercase()).collect()
}

/// Cosine distance normalized from `[-1, 1]` similarity into `[0, 1]`
/// distance. Returns `0.0` (no drift signal) if either vector is empty or
/// zero-length, since there is nothing to compare.
fn normalized_cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let cosine_similarity = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0);
    (1.0 - cosine_similarity) / 2.0
}
