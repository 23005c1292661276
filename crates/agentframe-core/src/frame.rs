//! Frame parsing: turns a raw symbol string into a [`ParsedFrame`].
//!
//! Parsing never fails. Malformed or empty input still produces a frame —
//! one whose [`crate::validator`] tier will reject it. See spec §4.B.

use std::collections::BTreeSet;
use std::fmt;

use crate::registry::{self, SymbolCategory};

/// A single classified glyph within a frame, in original order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub glyph: char,
    pub category: SymbolCategory,
}

/// A frame parsed from its raw symbol string.
///
/// Immutable once constructed. The exactly-one-of slots (`mode`, `domain`,
/// `source`, `action`, `entity`) hold the *first* glyph seen for that
/// category; later glyphs of the same singleton category still appear in
/// `symbols` (so no information is lost) but do not overwrite the slot —
/// see SR-006/SR-007 in [`crate::validator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFrame {
    pub raw: String,
    pub symbols: Vec<Symbol>,
    pub mode: Option<char>,
    pub domain: Option<char>,
    pub source: Option<char>,
    pub action: Option<char>,
    pub entity: Option<char>,
    pub modifiers: BTreeSet<char>,
    pub constraints: BTreeSet<char>,
    pub intent_hash: String,
}

impl fmt::Display for ParsedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl ParsedFrame {
    /// Number of glyphs with an unrecognized category.
    #[must_use]
    pub fn unknown_count(&self) -> usize {
        self.symbols
            .iter()
            .filter(|s| s.category == SymbolCategory::Unknown)
            .count()
    }

    /// `true` if more than one glyph in `symbols` belongs to `category` —
    /// i.e. a singleton slot received more than one candidate. Used by
    /// SR-006.
    #[must_use]
    pub fn has_duplicate_singleton(&self, category: SymbolCategory) -> bool {
        self.symbols.iter().filter(|s| s.category == category).count() > 1
    }

    /// Index of the first glyph classified `mode`, if any.
    #[must_use]
    pub fn first_mode_index(&self) -> Option<usize> {
        self.symbols.iter().position(|s| s.category == SymbolCategory::Mode)
    }

    /// Indices of every glyph classified `mode`.
    #[must_use]
    pub fn mode_indices(&self) -> Vec<usize> {
        self.symbols
            .iter()
            .enumerate()
            .filter(|(_, s)| s.category == SymbolCategory::Mode)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Parses `raw` into a [`ParsedFrame`]. Never fails.
#[must_use]
pub fn parse(raw: &str) -> ParsedFrame {
    let mut symbols = Vec::new();
    let mut mode = None;
    let mut domain = None;
    let mut source = None;
    let mut action = None;
    let mut entity = None;
    let mut modifiers = BTreeSet::new();
    let mut constraints = BTreeSet::new();

    for glyph in raw.chars() {
        let category = registry::category_of(glyph);
        symbols.push(Symbol { glyph, category });

        match category {
            SymbolCategory::Mode => {
                mode.get_or_insert(glyph);
            }
            SymbolCategory::Domain => {
                domain.get_or_insert(glyph);
            }
            SymbolCategory::Source => {
                source.get_or_insert(glyph);
            }
            SymbolCategory::Action => {
                action.get_or_insert(glyph);
            }
            SymbolCategory::Entity => {
                entity.get_or_insert(glyph);
            }
            SymbolCategory::Modifier => {
                modifiers.insert(glyph);
            }
            SymbolCategory::Constraint => {
                constraints.insert(glyph);
            }
            SymbolCategory::Unknown => {}
        }
    }

    let intent_hash = canonical_hash(mode, domain, source, action, entity, &modifiers, &constraints);

    ParsedFrame {
        raw: raw.to_string(),
        symbols,
        mode,
        domain,
        source,
        action,
        entity,
        modifiers,
        constraints,
        intent_hash,
    }
}

/// Computes the 64-hex-char BLAKE3 digest over the canonical tuple
/// `(mode, domain, source, action, entity, sorted(modifiers),
/// sorted(constraints))`. `BTreeSet` iteration is already sorted order.
fn canonical_hash(
    mode: Option<char>,
    domain: Option<char>,
    source: Option<char>,
    action: Option<char>,
    entity: Option<char>,
    modifiers: &BTreeSet<char>,
    constraints: &BTreeSet<char>,
) -> String {
    const FIELD_SEP: &[u8] = &[0x1f]; // unit separator, unlikely to collide with frame glyphs

    let mut hasher = blake3::Hasher::new();
    let mut push_opt = |c: Option<char>| {
        if let Some(c) = c {
            hasher.update(c.to_string().as_bytes());
        }
        hasher.update(FIELD_SEP);
    };
    push_opt(mode);
    push_opt(domain);
    push_opt(source);
    push_opt(action);
    push_opt(entity);
    for m in modifiers {
        hasher.update(m.to_string().as_bytes());
    }
    hasher.update(FIELD_SEP);
    for c in constraints {
        hasher.update(c.to_string().as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// `true` iff `s` is a well-formed 64-character lowercase hex digest. Used
/// by CH-006.
#[must_use]
pub fn is_well_formed_intent_hash(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}
