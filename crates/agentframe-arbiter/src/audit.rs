//! Append-only audit log (spec §3 `AuditEntry`, §6 "Audit log format").
//!
//! Mirrors the teacher's `LogEntry`/`LogEmitter` JSONL contract: a required-
//! field schema, a buffered writer, and line/file validators, just with the
//! audit schema in place of the test/e2e log schema.

use std::io::Write;
use std::path::Path;

use agentframe_core::validator::ValidationReport;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Hold,
    Block,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Allow => "allow",
            Self::Hold => "hold",
            Self::Block => "block",
        };
        f.write_str(s)
    }
}

/// One append-only audit record. Required fields per spec §3/§6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub ts: String,
    pub agent_id: String,
    pub frame: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_frame: Option<String>,
    pub decision: Decision,
    pub reasons: Vec<String>,
    pub drift_score: f64,
    pub circuit_state: String,
    pub audit_id: String,
}

impl AuditEntry {
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Writes newline-delimited `AuditEntry` records. Append-only; each line is
/// a complete record (spec §6).
pub struct AuditLog {
    writer: Box<dyn Write + Send>,
    seq: u64,
}

impl AuditLog {
    pub fn to_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { writer: Box::new(std::io::BufWriter::new(file)), seq: 0 })
    }

    #[must_use]
    pub fn to_buffer() -> Self {
        Self { writer: Box::new(Vec::new()), seq: 0 }
    }

    fn next_audit_id(&mut self) -> String {
        self.seq += 1;
        format!("audit-{:08}", self.seq)
    }

    /// Appends `entry`, assigning `audit_id` if it is empty.
    pub fn append(&mut self, mut entry: AuditEntry) -> std::io::Result<AuditEntry> {
        if entry.audit_id.is_empty() {
            entry.audit_id = self.next_audit_id();
        }
        let line = entry.to_jsonl().map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")?;
        Ok(entry)
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

/// Builds the `reasons[]` list for a decision: rule codes from a
/// [`ValidationReport`]'s errors, in report order.
#[must_use]
pub fn reasons_from_report(report: &ValidationReport) -> Vec<String> {
    report.errors.iter().map(|e| e.rule_id.to_string()).collect()
}

/// Hand-rolled UTC timestamp (no `chrono` dependency), matching the
/// teacher's own `now_utc` helper.
#[must_use]
pub fn now_utc_from_epoch(secs: u64, millis: u32) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        1970 + secs / 31_557_600,
        (secs % 31_557_600) / 2_629_800 + 1,
        (secs % 2_629_800) / 86400 + 1,
        (secs % 86400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
        millis,
    )
}

/// Current UTC timestamp, formatted the same way as
/// [`now_utc_from_epoch`].
#[must_use]
pub fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    now_utc_from_epoch(duration.as_secs(), duration.subsec_millis())
}

#[derive(Debug)]
pub struct AuditValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for AuditValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: field '{}': {}", self.line_number, self.field, self.message)
    }
}

/// Validates a single JSONL audit line against the required-field schema.
pub fn validate_audit_line(
    line: &str,
    line_number: usize,
) -> Result<AuditEntry, Vec<AuditValidationError>> {
    let mut errors = Vec::new();

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            errors.push(AuditValidationError {
                line_number,
                field: "<json>".to_string(),
                message: format!("invalid JSON: {e}"),
            });
            return Err(errors);
        }
    };

    let Some(obj) = value.as_object() else {
        errors.push(AuditValidationError {
            line_number,
            field: "<root>".to_string(),
            message: "expected JSON object".to_string(),
        });
        return Err(errors);
    };

    for field in ["ts", "agent_id", "frame", "decision", "reasons", "drift_score", "circuit_state", "audit_id"]
    {
        if !obj.contains_key(field) {
            errors.push(AuditValidationError {
                line_number,
                field: field.to_string(),
                message: "required field missing".to_string(),
            });
        }
    }

    if let Some(decision) = obj.get("decision").and_then(|v| v.as_str())
        && !["allow", "hold", "block"].contains(&decision)
    {
        errors.push(AuditValidationError {
            line_number,
            field: "decision".to_string(),
            message: format!("invalid decision: '{decision}'"),
        });
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    serde_json::from_value::<AuditEntry>(value).map_err(|e| {
        vec![AuditValidationError {
            line_number,
            field: "<deserialization>".to_string(),
            message: format!("failed to deserialize: {e}"),
        }]
    })
}

/// Validates an entire JSONL audit file, returning the line count and any
/// accumulated errors.
pub fn validate_audit_file(path: &Path) -> std::io::Result<(usize, Vec<AuditValidationError>)> {
    let content = std::fs::read_to_string(path)?;
    let mut all_errors = Vec::new();
    let mut line_count = 0;
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        line_count += 1;
        if let Err(errs) = validate_audit_line(line, i + 1) {
            all_errors.extend(errs);
        }
    }
    Ok((line_count, all_errors))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> AuditEntry {
        AuditEntry {
            ts: now_utc_from_epoch(0, 0),
            agent_id: "a1".to_string(),
            frame: "⊕◊▶β".to_string(),
            parent_frame: None,
            decision: Decision::Allow,
            reasons: Vec::new(),
            drift_score: 0.0,
            circuit_state: "closed".to_string(),
            audit_id: String::new(),
        }
    }

    #[test]
    fn append_assigns_sequential_audit_ids() {
        let mut log = AuditLog::to_buffer();
        let e1 = log.append(sample_entry()).unwrap();
        let e2 = log.append(sample_entry()).unwrap();
        assert_eq!(e1.audit_id, "audit-00000001");
        assert_eq!(e2.audit_id, "audit-00000002");
    }

    #[test]
    fn valid_line_round_trips() {
        let mut log = AuditLog::to_buffer();
        let entry = log.append(sample_entry()).unwrap();
        let line = entry.to_jsonl().unwrap();
        let parsed = validate_audit_line(&line, 1).unwrap();
        assert_eq!(parsed.agent_id, "a1");
    }

    #[test]
    fn missing_field_is_rejected() {
        let json = r#"{"ts":"t","agent_id":"a1"}"#;
        let errors = validate_audit_line(json, 1).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "decision"));
    }

    #[test]
    fn invalid_decision_is_rejected() {
        let json = r#"{"ts":"t","agent_id":"a1","frame":"f","decision":"maybe","reasons":[],"drift_score":0.0,"circuit_state":"closed","audit_id":"x"}"#;
        let errors = validate_audit_line(json, 1).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "decision"));
    }
}
