//! Severity-tagged build messages.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
            Severity::Info => f.write_str("info"),
        }
    }
}

/// A location in a source file. Lines and columns are 1-based; `0` means
/// unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl Position {
    pub fn new(file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Position {
            file: Some(file.into()),
            line,
            column,
        }
    }

    pub fn unknown() -> Self {
        Position::default()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file.display(), self.line, self.column),
            None => write!(f, "<unknown>:{}:{}", self.line, self.column),
        }
    }
}

/// A diagnostic produced while building a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub severity: Severity,
    pub text: String,
    #[serde(default)]
    pub position: Position,
    /// Machine-readable tag such as a compiler message code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
}

impl Message {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Message {
            severity,
            text: text.into(),
            position: Position::unknown(),
            classification: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Message::new(Severity::Error, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Message::new(Severity::Warning, text)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Message::new(Severity::Info, text)
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn classified(mut self, classification: impl Into<String>) -> Self {
        self.classification = Some(classification.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.text)?;
        if self.position.file.is_some() {
            write!(f, " ({})", self.position)?;
        }
        Ok(())
    }
}
