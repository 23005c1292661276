//! Three-tier frame validator: structural, semantic, and chain rules.
//!
//! Rules are data, not code variants (spec §9 design note): a [`Rule`] is a
//! record of `{id, tier, severity, check}`; adding a rule means appending to
//! the matching `const` slice below. This mirrors the teacher's
//! `HealingPolicy::record` dispatch-over-enum style, just inverted — here we
//! dispatch *rules* over a frame instead of *actions* over a policy.

use std::collections::BTreeMap;
use std::fmt;

use crate::frame::{is_well_formed_intent_hash, ParsedFrame};
use crate::registry::{self, SymbolCategory};

/// Severity of a single rule's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Pass,
    Warning,
    Error,
}

/// Outcome of a single validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub rule_id: &'static str,
    pub severity: Severity,
    pub message: String,
    pub detail: Option<String>,
}

/// Which tiers to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationScope {
    Structural,
    Semantic,
    Chain,
    Full,
}

/// Aggregated report over one or more tiers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    /// `true` iff `errors` is empty.
    pub valid: bool,
    pub errors: Vec<ValidationResult>,
    pub warnings: Vec<ValidationResult>,
    /// Every rule outcome evaluated, in rule order, including passes.
    pub results: Vec<ValidationResult>,
    pub metadata: BTreeMap<String, String>,
}

enum Outcome {
    Pass,
    Fail(String),
}

type CheckFn = fn(&ParsedFrame, Option<&ParsedFrame>) -> Outcome;

#[derive(Clone, Copy)]
enum Tier {
    Structural,
    Semantic,
    Chain,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Structural => "structural",
            Self::Semantic => "semantic",
            Self::Chain => "chain",
        };
        f.write_str(s)
    }
}

struct Rule {
    id: &'static str,
    tier: Tier,
    severity: Severity,
    message: &'static str,
    check: CheckFn,
}

const STRUCTURAL_RULES: &[Rule] = &[
    Rule {
        id: "SR-001",
        tier: Tier::Structural,
        severity: Severity::Error,
        message: "frame must contain at least 2 symbols",
        check: |f, _| {
            if f.symbols.len() >= crate::MIN_FRAME_SYMBOLS {
                Outcome::Pass
            } else {
                Outcome::Fail(format!("length={}", f.symbols.len()))
            }
        },
    },
    Rule {
        id: "SR-002",
        tier: Tier::Structural,
        severity: Severity::Error,
        message: "frame must contain at most 12 symbols",
        check: |f, _| {
            if f.symbols.len() <= crate::MAX_FRAME_SYMBOLS {
                Outcome::Pass
            } else {
                Outcome::Fail(format!("length={}", f.symbols.len()))
            }
        },
    },
    Rule {
        id: "SR-003",
        tier: Tier::Structural,
        severity: Severity::Error,
        message: "mode slot must be present",
        check: |f, _| {
            if f.mode.is_some() {
                Outcome::Pass
            } else {
                Outcome::Fail("no mode glyph found".into())
            }
        },
    },
    Rule {
        id: "SR-004",
        tier: Tier::Structural,
        severity: Severity::Warning,
        message: "domain slot should be present",
        check: |f, _| {
            if f.domain.is_some() {
                Outcome::Pass
            } else {
                Outcome::Fail("no domain glyph found".into())
            }
        },
    },
    Rule {
        id: "SR-005",
        tier: Tier::Structural,
        severity: Severity::Warning,
        message: "action slot should be present",
        check: |f, _| {
            if f.action.is_some() {
                Outcome::Pass
            } else {
                Outcome::Fail("no action glyph found".into())
            }
        },
    },
    Rule {
        id: "SR-006",
        tier: Tier::Structural,
        severity: Severity::Warning,
        message: "at most one glyph per singleton category",
        check: |f, _| {
            let dupes: Vec<&str> = [
                (SymbolCategory::Mode, "mode"),
                (SymbolCategory::Domain, "domain"),
                (SymbolCategory::Source, "source"),
                (SymbolCategory::Action, "action"),
                (SymbolCategory::Entity, "entity"),
            ]
            .into_iter()
            .filter(|(cat, _)| f.has_duplicate_singleton(*cat))
            .map(|(_, name)| name)
            .collect();
            if dupes.is_empty() {
                Outcome::Pass
            } else {
                Outcome::Fail(format!("duplicated categories: {}", dupes.join(",")))
            }
        },
    },
    Rule {
        id: "SR-007",
        tier: Tier::Structural,
        severity: Severity::Warning,
        message: "a mode glyph, if present, must be at position 0",
        check: |f, _| {
            let stray = f
                .symbols
                .iter()
                .enumerate()
                .any(|(i, s)| s.category == SymbolCategory::Mode && i != 0);
            if stray {
                Outcome::Fail("mode glyph found outside position 0".into())
            } else {
                Outcome::Pass
            }
        },
    },
];

const SEMANTIC_RULES: &[Rule] = &[
    Rule {
        id: "SM-001",
        tier: Tier::Semantic,
        severity: Severity::Error,
        message: "strict mode forbids any flexible glyph in the frame",
        check: |f, _| {
            let is_strict = f.mode.and_then(registry::mode_strength) == Some(1);
            let has_flexible = f
                .symbols
                .iter()
                .any(|s| registry::mode_strength(s.glyph) == Some(3));
            if is_strict && has_flexible {
                Outcome::Fail("flexible glyph present under strict mode".into())
            } else {
                Outcome::Pass
            }
        },
    },
    Rule {
        id: "SM-002",
        tier: Tier::Semantic,
        severity: Severity::Warning,
        message: "execute with a forbidden constraint is a declared blocker",
        check: |f, _| {
            let is_execute = f.action == Some('▶');
            let has_forbidden = f.constraints.contains(&'⛔');
            if is_execute && has_forbidden {
                Outcome::Fail("execute action declares a forbidden constraint".into())
            } else {
                Outcome::Pass
            }
        },
    },
    Rule {
        id: "SM-003",
        tier: Tier::Semantic,
        severity: Severity::Warning,
        message: "escalate requires elevated source or high-priority modifier",
        check: |f, _| {
            let is_escalate = f.action == Some('↑');
            let authorized = f.source == Some('⇑') || f.modifiers.contains(&'★');
            if is_escalate && !authorized {
                Outcome::Fail("escalate lacks elevated source and high-priority modifier".into())
            } else {
                Outcome::Pass
            }
        },
    },
    Rule {
        id: "SM-004",
        tier: Tier::Semantic,
        severity: Severity::Warning,
        message: "delegate requires an entity slot",
        check: |f, _| {
            let is_delegate = f.action == Some('↦');
            if is_delegate && f.entity.is_none() {
                Outcome::Fail("delegate action has no entity slot".into())
            } else {
                Outcome::Pass
            }
        },
    },
    Rule {
        id: "SM-005",
        tier: Tier::Semantic,
        severity: Severity::Warning,
        message: "commit requires an approved constraint or strict mode",
        check: |f, _| {
            let is_commit = f.action == Some('▼');
            let is_strict = f.mode == Some('⊕');
            let approved = f.constraints.contains(&'✓');
            if is_commit && !(approved || is_strict) {
                Outcome::Fail("commit lacks approved constraint and strict mode".into())
            } else {
                Outcome::Pass
            }
        },
    },
    Rule {
        id: "SM-006",
        tier: Tier::Semantic,
        severity: Severity::Error,
        message: "modifiers cannot contain both high-priority and low-priority",
        check: |f, _| {
            if f.modifiers.contains(&'★') && f.modifiers.contains(&'☆') {
                Outcome::Fail("both high-priority and low-priority modifiers present".into())
            } else {
                Outcome::Pass
            }
        },
    },
    Rule {
        id: "SM-007",
        tier: Tier::Semantic,
        severity: Severity::Error,
        message: "exploratory mode forbids the execute action",
        check: |f, _| {
            let is_exploratory = f.mode.and_then(registry::mode_strength) == Some(4);
            let is_execute = f.action == Some('▶');
            if is_exploratory && is_execute {
                Outcome::Fail("execute action under exploratory mode".into())
            } else {
                Outcome::Pass
            }
        },
    },
    Rule {
        id: "SM-008",
        tier: Tier::Semantic,
        severity: Severity::Warning,
        message: "an action slot requires a domain slot",
        check: |f, _| {
            if f.action.is_some() && f.domain.is_none() {
                Outcome::Fail("action present without domain".into())
            } else {
                Outcome::Pass
            }
        },
    },
];

const CHAIN_RULES: &[Rule] = &[
    Rule {
        id: "CH-001",
        tier: Tier::Chain,
        severity: Severity::Error,
        message: "child mode must be no weaker than parent mode",
        check: |child, parent| {
            let Some(parent) = parent else { return Outcome::Pass };
            match (child.mode, parent.mode) {
                (Some(c), Some(p)) => {
                    let (Some(cs), Some(ps)) =
                        (registry::mode_strength(c), registry::mode_strength(p))
                    else {
                        return Outcome::Pass;
                    };
                    if cs > ps {
                        Outcome::Fail(format!("child mode strength {cs} weaker than parent {ps}"))
                    } else {
                        Outcome::Pass
                    }
                }
                _ => Outcome::Pass,
            }
        },
    },
    Rule {
        id: "CH-002",
        tier: Tier::Chain,
        severity: Severity::Warning,
        message: "domains must match when both frames declare one",
        check: |child, parent| {
            let Some(parent) = parent else { return Outcome::Pass };
            match (child.domain, parent.domain) {
                (Some(c), Some(p)) if c != p => {
                    Outcome::Fail(format!("child domain {c} differs from parent domain {p}"))
                }
                _ => Outcome::Pass,
            }
        },
    },
    Rule {
        id: "CH-003",
        tier: Tier::Chain,
        severity: Severity::Error,
        message: "a forbidden parent constraint must be inherited by the child",
        check: |child, parent| {
            let Some(parent) = parent else { return Outcome::Pass };
            if parent.constraints.contains(&'⛔') && !child.constraints.contains(&'⛔') {
                Outcome::Fail("parent forbidden constraint not present on child".into())
            } else {
                Outcome::Pass
            }
        },
    },
    Rule {
        id: "CH-004",
        tier: Tier::Chain,
        severity: Severity::Warning,
        message: "child entity depth must be no higher authority than parent",
        check: |child, parent| {
            let Some(parent) = parent else { return Outcome::Pass };
            match (child.entity, parent.entity) {
                (Some(c), Some(p)) => {
                    let (Some(cd), Some(pd)) =
                        (registry::entity_depth(c), registry::entity_depth(p))
                    else {
                        return Outcome::Pass;
                    };
                    if cd < pd {
                        Outcome::Fail(format!("child entity depth {cd} above parent depth {pd}"))
                    } else {
                        Outcome::Pass
                    }
                }
                _ => Outcome::Pass,
            }
        },
    },
    Rule {
        id: "CH-005",
        tier: Tier::Chain,
        severity: Severity::Warning,
        message: "child must be no less restrictive than parent's strongest constraint",
        check: |child, parent| {
            let Some(parent) = parent else { return Outcome::Pass };
            let child_min = min_constraint_strength(child);
            let parent_min = min_constraint_strength(parent);
            if child_min > parent_min {
                Outcome::Fail(format!(
                    "child min constraint strength {child_min} looser than parent {parent_min}"
                ))
            } else {
                Outcome::Pass
            }
        },
    },
    Rule {
        id: "CH-006",
        tier: Tier::Chain,
        severity: Severity::Pass,
        message: "child intent hash is a well-formed 64-hex digest",
        check: |child, parent| {
            if parent.is_none() {
                return Outcome::Pass;
            }
            if is_well_formed_intent_hash(&child.intent_hash) {
                Outcome::Pass
            } else {
                Outcome::Fail("intent hash is not a well-formed 64-hex digest".into())
            }
        },
    },
];

/// Absence of any constraint glyph is treated as the least restrictive
/// possible value (`approved`'s strength, 4), matching "no declared
/// constraint" being the weakest possible commitment.
fn min_constraint_strength(frame: &ParsedFrame) -> u8 {
    frame
        .constraints
        .iter()
        .filter_map(|c| registry::constraint_strength(*c))
        .min()
        .unwrap_or(4)
}

/// Runs the requested validation scope over `frame`, optionally against
/// `parent`. Chain rules are skipped entirely (not even recorded as passes)
/// when `parent` is `None`.
#[must_use]
pub fn validate(
    frame: &ParsedFrame,
    parent: Option<&ParsedFrame>,
    scope: ValidationScope,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    let run_structural = matches!(scope, ValidationScope::Structural | ValidationScope::Full);
    let run_semantic = matches!(scope, ValidationScope::Semantic | ValidationScope::Full);
    let run_chain = matches!(scope, ValidationScope::Chain | ValidationScope::Full);

    if run_structural {
        run_tier(STRUCTURAL_RULES, frame, parent, &mut report);
    }
    if run_semantic {
        run_tier(SEMANTIC_RULES, frame, parent, &mut report);
    }
    if run_chain && parent.is_some() {
        run_tier(CHAIN_RULES, frame, parent, &mut report);
    }

    report.valid = report.errors.is_empty();
    report
        .metadata
        .insert("rules_evaluated".to_string(), report.results.len().to_string());
    report
}

fn run_tier(
    rules: &[Rule],
    frame: &ParsedFrame,
    parent: Option<&ParsedFrame>,
    report: &mut ValidationReport,
) {
    if let Some(rule) = rules.first() {
        report
            .metadata
            .entry(format!("{}_rules", rule.tier))
            .or_insert_with(|| rules.len().to_string());
    }
    for rule in rules {
        let outcome = (rule.check)(frame, parent);
        let result = match outcome {
            Outcome::Pass => ValidationResult {
                rule_id: rule.id,
                severity: Severity::Pass,
                message: rule.message.to_string(),
                detail: None,
            },
            Outcome::Fail(detail) => ValidationResult {
                rule_id: rule.id,
                severity: rule.severity,
                message: rule.message.to_string(),
                detail: Some(detail),
            },
        };
        match result.severity {
            Severity::Error => report.errors.push(result.clone()),
            Severity::Warning => report.warnings.push(result.clone()),
            Severity::Pass => {}
        }
        report.results.push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::parse;

    #[test]
    fn valid_is_true_iff_no_errors() {
        let f = parse("⊕◊▶β");
        let report = validate(&f, None, ValidationScope::Full);
        assert_eq!(report.valid, report.errors.is_empty());
        assert!(report.valid);
    }

    #[test]
    fn empty_frame_fails_sr001() {
        let f = parse("");
        let report = validate(&f, None, ValidationScope::Structural);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.rule_id == "SR-001"));
    }

    #[test]
    fn thirteen_symbols_fails_sr002() {
        let f = parse("⊕◊▶β★☆◎⚠✓✗⛔⇑⇓");
        assert_eq!(f.symbols.len(), 13);
        let report = validate(&f, None, ValidationScope::Structural);
        assert!(report.errors.iter().any(|e| e.rule_id == "SR-002"));
    }

    #[test]
    fn single_mode_glyph_fails_sr001_not_sr002() {
        let f = parse("⊕");
        let report = validate(&f, None, ValidationScope::Structural);
        assert!(report.errors.iter().any(|e| e.rule_id == "SR-001"));
        assert!(!report.errors.iter().any(|e| e.rule_id == "SR-002"));
    }

    #[test]
    fn structural_block_scenario() {
        let f = parse("▶");
        let report = validate(&f, None, ValidationScope::Full);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.rule_id == "SR-001"));
    }

    #[test]
    fn chain_weakening_scenario() {
        let parent = parse("⊕◊▼α");
        let child = parse("⊖◊▶β");
        let report = validate(&child, Some(&parent), ValidationScope::Full);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.rule_id == "CH-001"));
    }

    #[test]
    fn forbidden_not_inherited_scenario() {
        let parent = parse("⊕◊⛔▼α");
        let child = parse("⊕◊▶β");
        let report = validate(&child, Some(&parent), ValidationScope::Full);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.rule_id == "CH-003"));
    }

    #[test]
    fn risky_hold_pattern_is_warning_not_error() {
        let f = parse("⊕◊⛔▶β");
        let report = validate(&f, None, ValidationScope::Full);
        assert!(report.valid);
        assert!(report.warnings.iter().any(|w| w.rule_id == "SM-002"));
    }

    #[test]
    fn chain_rules_skipped_without_parent() {
        let f = parse("⊕◊▶β");
        let report = validate(&f, None, ValidationScope::Chain);
        assert!(report.results.is_empty());
    }

    #[test]
    fn validate_is_pure() {
        let f = parse("⊕◊▶β");
        let a = validate(&f, None, ValidationScope::Full);
        let b = validate(&f, None, ValidationScope::Full);
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_glyph_does_not_trigger_errors_on_its_own() {
        let f = parse("⊕◊▶βz");
        let report = validate(&f, None, ValidationScope::Full);
        assert!(report.valid);
    }
}
