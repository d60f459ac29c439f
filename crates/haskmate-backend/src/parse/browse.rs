//! Browse output parsing and symbol kind inference

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{SymbolDescriptor, SymbolKind};

/// `type`/`data`/`newtype`/`class` declaration heads printed without a
/// `::` signature; the declared name is the first uppercase identifier
static DECL_HEAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(type|data|newtype|class)\s+(?:.*?=>\s*)?([A-Z][A-Za-z0-9_']*)")
        .expect("static regex")
});

const PARENT_MARKER: &str = " -- from:";

/// Parse one browse output line into a symbol descriptor.
///
/// Recognized shapes, parent suffix optional on each:
/// `NAME :: SIGNATURE`, `data NAME ...` (and `type`/`newtype`/`class`),
/// and a bare `NAME` fallback.
pub fn parse_browse_line(line: &str) -> SymbolDescriptor {
    let (rest, parent) = match line.rsplit_once(PARENT_MARKER) {
        Some((rest, parent)) => (rest.trim_end(), Some(parent.trim().to_string())),
        None => (line.trim_end(), None),
    };

    let (raw_name, signature) = if let Some((name, sig)) = rest.split_once(" :: ") {
        (name.trim().to_string(), Some(sig.trim().to_string()))
    } else if let Some(caps) = DECL_HEAD_RE.captures(rest) {
        (caps[2].to_string(), Some(rest.trim().to_string()))
    } else {
        (rest.trim().to_string(), None)
    };

    let (name, kind) = classify(raw_name, signature.as_deref());
    SymbolDescriptor {
        name,
        kind,
        signature,
        parent,
    }
}

/// Kind inference: keyword-led signatures first, then name shape
fn classify(name: String, signature: Option<&str>) -> (String, SymbolKind) {
    if let Some(sig) = signature {
        if sig.starts_with("type ") || sig.starts_with("data ") || sig.starts_with("newtype ") {
            return (name, SymbolKind::Type);
        }
        if sig.starts_with("class ") {
            return (name, SymbolKind::Class);
        }
    }
    if name.len() > 1 && name.starts_with('(') && name.ends_with(')') {
        let stripped = name[1..name.len() - 1].to_string();
        return (stripped, SymbolKind::Operator);
    }
    if name.chars().next().is_some_and(|c| c.is_uppercase()) {
        return (name, SymbolKind::Tag);
    }
    (name, SymbolKind::Function)
}
