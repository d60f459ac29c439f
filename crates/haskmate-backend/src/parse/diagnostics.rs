//! Check/lint output parsing

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::types::{Diagnostic, Point, Severity};

static DIAGNOSTIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?):([0-9 \t]+):([0-9 \t]+): *(?:(Warning|Error): *)?(.*)$")
        .expect("static regex")
});

/// `FILE:LINE: MESSAGE` failures from delinting literate sources
static DELINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^(.+?):(\d+):\s*(.*)$").expect("static regex"));

/// Sentinel path marking tool-level messages rather than file diagnostics
const DUMMY_FILE: &str = "Dummy";

/// Which command produced the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    Check,
    Lint,
}

/// Parsed check/lint output
#[derive(Debug, Default)]
pub struct ParsedDiagnostics {
    pub diagnostics: Vec<Diagnostic>,
    /// Tool-level messages from the `Dummy:0:0:` sentinel path, redirected
    /// to the warning/error event channel
    pub messages: Vec<(Severity, String)>,
}

/// Parse diagnostic lines.
///
/// Multi-token row/col ranges collapse to their first token; NUL bytes in
/// the message decode back to the newlines the tool replaced.
pub fn parse_check_lines(lines: &[String], mode: CheckMode) -> ParsedDiagnostics {
    let mut parsed = ParsedDiagnostics::default();

    for line in lines {
        if line.is_empty() {
            continue;
        }
        let Some(caps) = DIAGNOSTIC_RE.captures(line) else {
            warn!(line, "Skipping unrecognized diagnostic line");
            continue;
        };
        let file = &caps[1];
        let Some(row) = first_number(&caps[2]) else {
            warn!(line, "Skipping diagnostic with unparsable row");
            continue;
        };
        let Some(column) = first_number(&caps[3]) else {
            warn!(line, "Skipping diagnostic with unparsable column");
            continue;
        };
        let keyword = caps.get(4).map(|m| m.as_str());
        let message = caps[5].replace('\0', "\n");

        if file == DUMMY_FILE && row == 0 && column == 0 {
            let severity = match keyword {
                Some("Warning") => Severity::Warning,
                _ => Severity::Error,
            };
            parsed.messages.push((severity, message));
            continue;
        }

        let severity = match mode {
            CheckMode::Lint => Severity::Lint,
            CheckMode::Check => match keyword {
                Some("Warning") => Severity::Warning,
                _ => Severity::Error,
            },
        };
        parsed.diagnostics.push(Diagnostic {
            uri: file.into(),
            position: Point::new(row.saturating_sub(1), column.saturating_sub(1)),
            severity,
            message,
        });
    }
    parsed
}

/// Convert a delint failure message into a single diagnostic, when it has
/// the `FILE:LINE: MESSAGE` shape
pub fn delint_message(message: &str) -> Option<Diagnostic> {
    let caps = DELINT_RE.captures(message.trim())?;
    let row: u32 = caps[2].parse().ok()?;
    Some(Diagnostic {
        uri: caps[1].to_string().into(),
        position: Point::new(row.saturating_sub(1), 0),
        severity: Severity::Lint,
        message: caps[3].to_string(),
    })
}

fn first_number(raw: &str) -> Option<u32> {
    raw.split_whitespace().next()?.parse().ok()
}
