//! Diagnostic records produced by output translation.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Severity level of a diagnostic.
///
/// `Hint` is only ever produced by the lint grammar; the check grammar
/// yields `Error` or `Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Hint,
}

impl Severity {
    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Hint => "hint",
        }
    }
}

/// A 1-indexed line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    #[must_use]
    pub fn line(self) -> u32 {
        self.line
    }

    #[must_use]
    pub fn column(self) -> u32 {
        self.column
    }
}

/// The source region a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    from: Position,
    to: Position,
}

impl Region {
    #[must_use]
    pub fn new(from: Position, to: Position) -> Self {
        Self { from, to }
    }

    /// A synthetic single-line region spanning column 1 to `column`.
    ///
    /// ghc-mod reports only a start position, never a span end, so the
    /// reported column becomes the end of a region opening at column 1.
    #[must_use]
    pub fn line_to_column(line: u32, column: u32) -> Self {
        Self {
            from: Position::new(line, 1),
            to: Position::new(line, column),
        }
    }

    #[must_use]
    pub fn from(self) -> Position {
        self.from
    }

    #[must_use]
    pub fn to(self) -> Position {
        self.to
    }
}

/// Message body of a diagnostic.
///
/// `suggestions` is always `None` for ghc-mod output, since neither
/// grammar can derive correction data, but the field is part of the
/// contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    message: String,
    suggestions: Option<Vec<String>>,
}

impl Note {
    #[must_use]
    pub fn new(message: String) -> Self {
        Self {
            message,
            suggestions: None,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn suggestions(&self) -> Option<&[String]> {
        self.suggestions.as_deref()
    }
}

/// Where a diagnostic came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    file: PathBuf,
    project: Option<String>,
}

impl Source {
    #[must_use]
    pub fn new(file: PathBuf, project: Option<String>) -> Self {
        Self { file, project }
    }

    /// Absolute path of the file the diagnostic refers to.
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    #[must_use]
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }
}

/// One reported issue, immutable once built.
///
/// Fields are private; construction goes through [`DiagnosticRecord::new`]
/// and readers use accessors. The serialized shape
/// `{level, note: {message, suggestions}, region: {from, to}, source:
/// {file, project}}` must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticRecord {
    level: Severity,
    note: Note,
    region: Region,
    source: Source,
}

impl DiagnosticRecord {
    #[must_use]
    pub fn new(level: Severity, note: Note, region: Region, source: Source) -> Self {
        Self {
            level,
            note,
            region,
            source,
        }
    }

    #[must_use]
    pub fn level(&self) -> Severity {
        self.level
    }

    #[must_use]
    pub fn note(&self) -> &Note {
        &self.note
    }

    #[must_use]
    pub fn message(&self) -> &str {
        self.note.message()
    }

    #[must_use]
    pub fn region(&self) -> Region {
        self.region
    }

    #[must_use]
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Format as `path:line:col: severity: message` for terminal output.
    #[must_use]
    pub fn display_line(&self) -> String {
        format!(
            "{}:{}:{}: {}: {}",
            self.source.file().display(),
            self.region.from().line(),
            self.region.to().column(),
            self.level.label(),
            self.note.message(),
        )
    }
}
