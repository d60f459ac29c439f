//! Range/payload output parsing (`type`, `split`, `sig`)
//!
//! Records look like `ROW COL ROW COL "TEXT"`; TEXT may contain escaped
//! quotes and backslashes as well as literal newlines, so records are
//! matched across the joined output rather than line by line. Positions
//! are 1-based inclusive on the wire and 0-based in the result.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::types::{Point, Span, SpanText};

static SPAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?ms)^(\d+) (\d+) (\d+) (\d+) "((?:[^"\\]|\\.)*)"$"#).expect("static regex")
});

/// Parse every span record in the tool output
pub fn parse_span_output(lines: &[String]) -> Vec<SpanText> {
    let joined = lines.join("\n");
    let mut results = Vec::new();
    for caps in SPAN_RE.captures_iter(&joined) {
        let numbers: Option<Vec<u32>> = (1..=4)
            .map(|i| caps[i].parse::<u32>().ok())
            .collect();
        let Some(numbers) = numbers else {
            warn!(record = &caps[0], "Skipping span record with bad positions");
            continue;
        };
        // the tool never reports row/col 0; guard anyway
        let span = Span::new(
            Point::new(numbers[0].saturating_sub(1), numbers[1].saturating_sub(1)),
            Point::new(numbers[2].saturating_sub(1), numbers[3].saturating_sub(1)),
        );
        results.push(SpanText {
            span,
            text: unescape(&caps[5]),
        });
    }
    if results.is_empty() && !joined.trim().is_empty() {
        warn!("No span records in non-empty tool output");
    }
    results
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('"' | '\\')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
