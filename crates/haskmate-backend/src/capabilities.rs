//! Feature flags derived from the installed tool version
//!
//! Thresholds are monotonic: a newer version only ever adds capabilities.

/// What the installed ghc-mod supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Structured file mapping (`map-file`/`--map-file`)
    pub file_map: bool,
    /// Arguments may be wrapped in \x02/\x03 delimiters
    pub quote_args: bool,
    /// Parser-combinator option style
    pub optparse: bool,
    /// Type constraints in type queries (`type -c`)
    pub type_constraints: bool,
    /// Parent info in browse output (`-- from:`)
    pub browse_parents: bool,
    /// Case split through the interactive process
    pub interactive_case_split: bool,
    /// Browse of the `Main` module
    pub browse_main: bool,
    /// `imported-from` queries (experimental)
    pub imported_from: bool,
}

impl Capabilities {
    /// Derive the capability set from a parsed version, plus the
    /// experimental opt-in gating `imported-from`
    pub fn from_version(version: &[u64], experimental: bool) -> Self {
        Self {
            file_map: at_least(version, &[5, 4]),
            quote_args: at_least(version, &[5, 5]),
            optparse: at_least(version, &[5, 5]),
            type_constraints: at_least(version, &[5, 6]),
            browse_parents: at_least(version, &[5, 6]),
            interactive_case_split: at_least(version, &[5, 6]),
            browse_main: at_least(version, &[5, 6]),
            imported_from: experimental,
        }
    }
}

/// Lexicographic version comparison, missing components treated as zero
pub fn at_least(version: &[u64], wanted: &[u64]) -> bool {
    for i in 0..wanted.len().max(version.len()) {
        let have = version.get(i).copied().unwrap_or(0);
        let want = wanted.get(i).copied().unwrap_or(0);
        if have != want {
            return have > want;
        }
    }
    true
}
