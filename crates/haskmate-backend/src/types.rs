//! Core data structures shared across backend operations

use std::path::PathBuf;

/// Classification of a browse-result entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Type,
    Class,
    Function,
    Operator,
    /// Data constructor
    Tag,
}

/// One exported symbol of a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolDescriptor {
    pub name: String,
    pub kind: SymbolKind,
    pub signature: Option<String>,
    /// Owning class or data type, when the tool reports one
    pub parent: Option<String>,
}

/// Zero-based buffer position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

/// Zero-based half-open-ish source range; `end` is the position just past
/// the last covered character, matching editor range conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: Point,
    pub end: Point,
}

impl Span {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn point(at: Point) -> Self {
        Self {
            start: at,
            end: at,
        }
    }

    /// Whether `other` lies entirely within this span
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Ordering key so the tightest enclosing span sorts first
    pub fn size_key(&self) -> (u32, u32) {
        (
            self.end.row - self.start.row,
            if self.end.row == self.start.row {
                self.end.column.saturating_sub(self.start.column)
            } else {
                self.end.column
            },
        )
    }
}

/// A source range with the tool's payload text (type, split or sig body)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanText {
    pub span: Span,
    pub text: String,
}

/// Diagnostic severity as surfaced to the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Lint,
}

/// One check/lint finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub uri: PathBuf,
    pub position: Point,
    pub severity: Severity,
    pub message: String,
}

/// Signature-fill result: what kind of hole was filled, where, and the body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigFill {
    pub kind: String,
    pub span: Span,
    pub body: String,
}

/// Read-only view of an open editor buffer handed to backend operations
#[derive(Debug, Clone)]
pub struct BufferSnapshot {
    /// Logical path of the buffer
    pub uri: PathBuf,
    /// Full buffer text
    pub text: String,
    /// Whether the buffer differs from the file on disk
    pub modified: bool,
}

impl BufferSnapshot {
    pub fn new(uri: impl Into<PathBuf>, text: impl Into<String>, modified: bool) -> Self {
        Self {
            uri: uri.into(),
            text: text.into(),
            modified,
        }
    }

    /// Line at a zero-based row, if present
    pub fn line(&self, row: u32) -> Option<&str> {
        self.text.split('\n').nth(row as usize)
    }
}
