//! Hole-fill candidate matching
//!
//! A symbol can fill a typed hole when its signature's return type is
//! unifiable with the hole's inferred type: bare type-variable returns
//! are rejected as too generic, and every other standalone lowercase
//! letter in the return type acts as a wildcard.

use regex::Regex;
use tracing::debug;

/// Tail of a signature after its last top-level function arrow; the whole
/// signature when it takes no arguments. Arrows inside parens or brackets
/// do not count.
pub fn return_type(signature: &str) -> &str {
    let bytes = signature.as_bytes();
    let mut depth = 0i32;
    let mut split = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            b'-' if depth == 0 && bytes.get(i + 1) == Some(&b'>') => {
                split = Some(i + 2);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    match split {
        Some(at) => signature[at..].trim(),
        None => signature.trim(),
    }
}

/// Whether a candidate's return type can unify with the inferred type
pub fn unifiable(candidate_return: &str, inferred: &str) -> bool {
    let ret = candidate_return.trim();
    // a bare type variable matches anything and helps nobody
    if is_type_variable(ret) {
        return false;
    }
    let Some(pattern) = wildcard_pattern(ret) else {
        debug!(ret, "Could not build unification pattern");
        return false;
    };
    pattern.is_match(inferred.trim())
}

fn is_type_variable(token: &str) -> bool {
    token.len() == 1 && token.chars().all(|c| c.is_ascii_lowercase())
}

/// Compile the return type into a regex where standalone lowercase-letter
/// tokens match any type
fn wildcard_pattern(ret: &str) -> Option<Regex> {
    let mut pattern = String::from("^");
    let mut token = String::new();
    let mut flush = |pattern: &mut String, token: &mut String| {
        if token.is_empty() {
            return;
        }
        if is_type_variable(token) {
            pattern.push_str(".+");
        } else {
            pattern.push_str(&regex::escape(token));
        }
        token.clear();
    };
    for c in ret.chars() {
        if c.is_alphanumeric() || c == '_' || c == '\'' {
            token.push(c);
        } else {
            flush(&mut pattern, &mut token);
            pattern.push_str(&regex::escape(&c.to_string()));
        }
    }
    flush(&mut pattern, &mut token);
    pattern.push('$');
    Regex::new(&pattern).ok()
}
