use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Zero-based line/column range.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Range {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

/// Byte offsets into a source file, end exclusive.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Where a call site was found: the program unit that reported it and the
/// enclosing member when the graph knows it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentContext {
    pub unit: String,
    pub member: Option<String>,
}

/// One resolved call site of the loader function.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLocation {
    pub file: PathBuf,
    pub span: Span,
    pub range: Range,
    pub context: DocumentContext,
}

impl ReferenceLocation {
    /// Identity used for deduplication. Two locations with the same file and
    /// span are the same call site, whatever their context says.
    pub fn key(&self) -> LocationKey {
        LocationKey {
            file: self.file.clone(),
            start: self.span.start,
            end: self.span.end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationKey {
    pub file: PathBuf,
    pub start: usize,
    pub end: usize,
}
