//! Static symbol registry.
//!
//! Every glyph a frame can contain is classified here into exactly one
//! category. The table is a plain `match` over `char` rather than a
//! `HashMap` or `phf` table: the alphabet is small and fixed at compile
//! time, so a match compiles to a dense jump table with no allocation and
//! no runtime construction cost — the same tradeoff the teacher makes for
//! its small closed enums (`frankenlibc-membrane::config::SafetyLevel`).
//!
//! Unknown glyphs are never an error here; they classify as
//! [`SymbolCategory::Unknown`] and the parser routes them to a catch-all
//! bucket instead of failing.

use std::fmt;

/// The disjoint category a single frame glyph belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolCategory {
    Mode,
    Modifier,
    Domain,
    Source,
    Constraint,
    Action,
    Entity,
    Unknown,
}

impl fmt::Display for SymbolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Mode => "mode",
            Self::Modifier => "modifier",
            Self::Domain => "domain",
            Self::Source => "source",
            Self::Constraint => "constraint",
            Self::Action => "action",
            Self::Entity => "entity",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Returns the category of a glyph. Never fails: glyphs outside the table
/// classify as [`SymbolCategory::Unknown`].
#[must_use]
pub fn category_of(glyph: char) -> SymbolCategory {
    match glyph {
        '⊕' | '⊙' | '⊖' | '⊗' => SymbolCategory::Mode,
        '◊' | '♦' | '♣' | '♠' => SymbolCategory::Domain,
        '▶' | '↦' | '↑' | '▼' | '→' => SymbolCategory::Action,
        'α' | 'β' | 'γ' | 'ω' => SymbolCategory::Entity,
        '⛔' | '✗' | '⚠' | '✓' => SymbolCategory::Constraint,
        '⇑' | '⇓' | '⇒' => SymbolCategory::Source,
        '★' | '☆' | '◎' => SymbolCategory::Modifier,
        _ => SymbolCategory::Unknown,
    }
}

/// Mode strictness strength: 1 = strongest (`strict`), 4 = weakest
/// (`exploratory`). Returns `None` for glyphs outside the mode category.
#[must_use]
pub fn mode_strength(glyph: char) -> Option<u8> {
    match glyph {
        '⊕' => Some(1), // strict
        '⊙' => Some(2), // neutral
        '⊖' => Some(3), // flexible
        '⊗' => Some(4), // exploratory
        _ => None,
    }
}

/// Constraint strength: 1 = strongest (`forbidden`), 4 = weakest
/// (`approved`). Returns `None` for glyphs outside the constraint category.
#[must_use]
pub fn constraint_strength(glyph: char) -> Option<u8> {
    match glyph {
        '⛔' => Some(1), // forbidden
        '✗' => Some(2),  // rejected
        '⚠' => Some(3),  // warning
        '✓' => Some(4),  // approved
        _ => None,
    }
}

/// Entity authority depth: 1 = highest authority (`α`), 4 = lowest (`ω`).
/// Returns `None` for glyphs outside the entity category.
#[must_use]
pub fn entity_depth(glyph: char) -> Option<u8> {
    match glyph {
        'α' => Some(1),
        'β' => Some(2),
        'γ' => Some(3),
        'ω' => Some(4),
        _ => None,
    }
}
