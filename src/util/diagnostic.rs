//! User-facing diagnostics.
//!
//! Every failure shown to a user should carry its root cause, the context
//! that led to it and, where possible, a suggested fix.

use std::fmt;
use std::path::PathBuf;

use crate::core::message::{Message, Severity as MessageSeverity};

/// Common suggestion messages.
pub mod suggestions {
    pub const REGISTER_MODULE: &str =
        "register a target description for the module before building it";

    pub const ALIGN_VERSIONS: &str = "reference the same version of the module everywhere";

    pub const BREAK_CYCLE: &str = "remove one of the references that form the cycle";

    pub const SEARCH_PATHS: &str =
        "add the directory containing the module to `assembly.search_paths`";

    pub const FIX_ROOT_CAUSE: &str = "fix the first failing module; dependents rebuild afterwards";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
    Help,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
            Severity::Help => "help",
        }
    }

    fn colored(self) -> &'static str {
        match self {
            Severity::Error => "\x1b[1;31merror\x1b[0m",
            Severity::Warning => "\x1b[1;33mwarning\x1b[0m",
            Severity::Note => "\x1b[1;36mnote\x1b[0m",
            Severity::Help => "\x1b[1;32mhelp\x1b[0m",
        }
    }
}

impl From<MessageSeverity> for Severity {
    fn from(severity: MessageSeverity) -> Self {
        match severity {
            MessageSeverity::Error => Severity::Error,
            MessageSeverity::Warning => Severity::Warning,
            MessageSeverity::Info => Severity::Note,
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location, rendered as `path:line:column` when known
    pub location: Option<PathBuf>,
    pub line_col: Option<(u32, u32)>,
}

impl Diagnostic {
    fn with_severity(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
            line_col: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, message)
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Note, message)
    }

    /// Render a compiler message.
    pub fn from_message(message: &Message) -> Self {
        let mut diag = Self::with_severity(message.severity.into(), message.text.clone());
        if let Some(file) = &message.position.file {
            diag.location = Some(file.clone());
            diag.line_col = Some((message.position.line, message.position.column));
        }
        if let Some(class) = &message.classification {
            diag = diag.with_context(format!("[{}]", class));
        }
        diag
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity = if color {
            self.severity.colored()
        } else {
            self.severity.label()
        };
        output.push_str(&format!("{}: {}\n", severity, self.message));

        if let Some(path) = &self.location {
            match self.line_col {
                Some((line, col)) => {
                    output.push_str(&format!("  --> {}:{}:{}\n", path.display(), line, col))
                }
                None => output.push_str(&format!("  --> {}\n", path.display())),
            }
        }

        for ctx in &self.context {
            output.push_str(&format!("  = {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            output.push('\n');
            let help = if color {
                Severity::Help.colored()
            } else {
                "help"
            };
            output.push_str(&format!("{}: consider:\n", help));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(false))
    }
}
