//! Version probe output parsing

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{BackendError, Result};

static TOOL_VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ghc-mod version (\d+)\.(\d+)\.(\d+)(\.(\d+))?").expect("static regex")
});
static COMPILER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"GHC (.+)$").expect("static regex"));

/// Parsed `ghc-mod version` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolVersion {
    /// Numeric version components, most significant first
    pub numbers: Vec<u64>,
    /// Compiler version string the tool was built against, if reported
    pub compiler: Option<String>,
}

/// Parse the output of the version probe.
///
/// The version line must match `ghc-mod version X.Y.Z[.W]`; the compiler
/// version is taken from a `GHC <version>` fragment anywhere in the output.
pub fn parse_version_output(lines: &[String]) -> Result<ToolVersion> {
    let mut numbers = None;
    let mut compiler = None;

    for line in lines {
        if numbers.is_none() {
            if let Some(caps) = TOOL_VERSION_RE.captures(line) {
                let mut parsed = Vec::with_capacity(4);
                for idx in [1, 2, 3, 5] {
                    if let Some(m) = caps.get(idx) {
                        parsed.push(m.as_str().parse::<u64>().map_err(|e| {
                            BackendError::Version {
                                message: format!("bad version component in '{line}': {e}"),
                            }
                        })?);
                    }
                }
                numbers = Some(parsed);
            }
        }
        if compiler.is_none() {
            if let Some(caps) = COMPILER_RE.captures(line) {
                compiler = Some(caps[1].trim().to_string());
            }
        }
    }

    match numbers {
        Some(numbers) => Ok(ToolVersion { numbers, compiler }),
        None => Err(BackendError::Version {
            message: format!(
                "no 'ghc-mod version' line in probe output ({} lines)",
                lines.len()
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parses_three_component_version() {
        let v = parse_version_output(&lines(&["ghc-mod version 5.6.0 compiled by GHC 8.0.1"]))
            .unwrap();
        assert_eq!(v.numbers, vec![5, 6, 0]);
        assert_eq!(v.compiler.as_deref(), Some("8.0.1"));
    }

    #[test]
    fn test_parses_four_component_version() {
        let v = parse_version_output(&lines(&["ghc-mod version 5.6.0.0 compiled by GHC 8.0.2"]))
            .unwrap();
        assert_eq!(v.numbers, vec![5, 6, 0, 0]);
    }

    #[test]
    fn test_compiler_on_separate_line() {
        let v = parse_version_output(&lines(&[
            "ghc-mod version 5.5.0.0",
            "built with GHC 7.10.3",
        ]))
        .unwrap();
        assert_eq!(v.compiler.as_deref(), Some("7.10.3"));
    }

    #[test]
    fn test_unparsable_version_is_error() {
        let err = parse_version_output(&lines(&["ghc-mod: command not understood"])).unwrap_err();
        assert!(matches!(err, BackendError::Version { .. }));
    }
}
