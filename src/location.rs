//! Source locations, token sets and location descriptors.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

use crate::expr::Quoted;

/// A source token identifier.
pub type TokenId = u32;

/// A span of source text attached to a graph edge.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct FileLocation {
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
    /// Tokens covered by this span.
    pub tokens: BTreeSet<TokenId>,
}

impl FileLocation {
    pub fn new(file: impl Into<String>, start_line: u32, end_line: u32) -> Self {
        FileLocation {
            file: file.into(),
            start_line,
            end_line,
            start_column: 0,
            end_column: 0,
            tokens: BTreeSet::new(),
        }
    }

    pub fn with_columns(mut self, start: u32, end: u32) -> Self {
        self.start_column = start;
        self.end_column = end;
        self
    }

    pub fn with_tokens(mut self, tokens: impl IntoIterator<Item = TokenId>) -> Self {
        self.tokens.extend(tokens);
        self
    }

    /// The file name without directories.
    pub fn file_name(&self) -> &str {
        base_name(&self.file)
    }
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_line == self.end_line {
            write!(f, "{}:{}", self.file, self.start_line)
        } else {
            write!(f, "{}:{}-{}", self.file, self.start_line, self.end_line)
        }
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Predicate over [`FileLocation`]s: an optional file and a line range,
/// optionally narrowed to a column range.
///
/// A location matches when its file name (compared without directories)
/// equals the descriptor's file, if any, and its starting line (and
/// starting column, if given) lies within the descriptor's range.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct LocationDescriptor {
    file: Option<String>,
    lines: RangeInclusive<u32>,
    columns: Option<RangeInclusive<u32>>,
}

impl LocationDescriptor {
    pub fn line(line: u32) -> Self {
        LocationDescriptor {
            file: None,
            lines: line..=line,
            columns: None,
        }
    }

    pub fn lines(lines: RangeInclusive<u32>) -> Self {
        LocationDescriptor {
            file: None,
            lines,
            columns: None,
        }
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_columns(mut self, columns: RangeInclusive<u32>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn matches(&self, location: &FileLocation) -> bool {
        if let Some(file) = &self.file {
            if base_name(file) != location.file_name() {
                return false;
            }
        }
        if !self.lines.contains(&location.start_line) {
            return false;
        }
        match &self.columns {
            Some(columns) => columns.contains(&location.start_column),
            None => true,
        }
    }
}

impl fmt::Display for LocationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lines.start() == self.lines.end() {
            write!(f, "LINE {}", self.lines.start())?;
        } else {
            write!(f, "LINES {}-{}", self.lines.start(), self.lines.end())?;
        }
        if let Some(columns) = &self.columns {
            write!(f, " COLUMNS {}-{}", columns.start(), columns.end())?;
        }
        if let Some(file) = &self.file {
            write!(f, " IN {}", Quoted(file))?;
        }
        Ok(())
    }
}

/// Token-set comparison used by token-matching atoms.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TokenMatch {
    /// The observed tokens contain every target token.
    Subset,
    /// The observed tokens share at least one target token.
    Intersection,
}

impl TokenMatch {
    /// Compare `observed` tokens against the `target` set.
    ///
    /// An empty target only matches an empty observation.
    pub fn matches(self, target: &BTreeSet<TokenId>, observed: &BTreeSet<TokenId>) -> bool {
        if target.is_empty() {
            return observed.is_empty();
        }
        match self {
            TokenMatch::Subset => target.is_subset(observed),
            TokenMatch::Intersection => !target.is_disjoint(observed),
        }
    }
}

impl fmt::Display for TokenMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenMatch::Subset => write!(f, "SUBSET"),
            TokenMatch::Intersection => write!(f, "INTERSECT"),
        }
    }
}
