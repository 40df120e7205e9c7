//! Preflight - read a module's header without compiling it.
//!
//! The header sits at the top of a module file:
//!
//! ```text
//! // comments and blank lines are skipped
//! name app.main/1.0;
//! references { sys.text/1.0, util, "lib/extra.pxs" };
//! no_standard_library;
//! ```
//!
//! Parsing stops at the first line that is not part of the header.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::assembly::refspec::RefSpec;
use crate::core::{Message, ModuleName, Position};

static NAME_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^name\s+([^\s;]+)\s*;$").expect("name pattern"));
static REFERENCES_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^references\s*\{([^}]*)\}\s*;$").expect("references pattern"));
static NO_STDLIB_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^no_standard_library\s*;$").expect("stdlib pattern"));
static KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(name|references|no_standard_library)\b").expect("keyword pattern")
});

/// What a module's header says about it.
#[derive(Debug, Clone, Default)]
pub struct PreflightResult {
    pub module_name: Option<ModuleName>,
    pub references: Vec<RefSpec>,
    /// Set by `no_standard_library;`.
    pub suppress_stdlib: bool,
    pub path: Option<PathBuf>,
    pub errors: Vec<Message>,
}

impl PreflightResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// First error as a one-line summary.
    pub fn first_error(&self) -> Option<String> {
        self.errors.first().map(|m| m.text.clone())
    }
}

/// Extracts module names and references from module text.
pub trait Preflight: Send + Sync {
    fn preflight(&self, text: &str, path: Option<&Path>) -> PreflightResult;
}

/// Recognises the `name` / `references` / `no_standard_library` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderPreflight;

impl Preflight for HeaderPreflight {
    fn preflight(&self, text: &str, path: Option<&Path>) -> PreflightResult {
        let mut result = PreflightResult {
            path: path.map(Path::to_path_buf),
            ..Default::default()
        };

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            let position = Position {
                file: result.path.clone(),
                line: index as u32 + 1,
                column: 1,
            };

            if let Some(caps) = NAME_DECL.captures(line) {
                declare_name(&mut result, &caps[1], position);
            } else if let Some(caps) = REFERENCES_DECL.captures(line) {
                declare_references(&mut result, &caps[1], &position);
            } else if NO_STDLIB_DECL.is_match(line) {
                result.suppress_stdlib = true;
            } else if KEYWORD.is_match(line) {
                result.errors.push(
                    Message::error(format!("malformed header declaration `{}`", line))
                        .at(position)
                        .classified("header-syntax"),
                );
            } else {
                break;
            }
        }

        result
    }
}

fn declare_name(result: &mut PreflightResult, text: &str, position: Position) {
    if let Some(existing) = result.module_name {
        result.errors.push(
            Message::error(format!("module is already named `{}`", existing))
                .at(position)
                .classified("duplicate-name"),
        );
        return;
    }
    match ModuleName::parse(text) {
        Ok(name) => result.module_name = Some(name),
        Err(e) => result.errors.push(
            Message::error(format!("invalid module name `{}`: {}", text, e))
                .at(position)
                .classified("invalid-name"),
        ),
    }
}

fn declare_references(result: &mut PreflightResult, items: &str, position: &Position) {
    for item in items.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        if let Some(quoted) = item.strip_prefix('"').and_then(|i| i.strip_suffix('"')) {
            result.references.push(RefSpec::by_path(quoted));
            continue;
        }
        match ModuleName::parse(item) {
            Ok(name) => result.references.push(RefSpec::by_name(name)),
            Err(e) => result.errors.push(
                Message::error(format!("invalid reference `{}`: {}", item, e))
                    .at(position.clone())
                    .classified("invalid-reference"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(text: &str) -> ModuleName {
        ModuleName::parse(text).unwrap()
    }

    #[test]
    fn test_full_header() {
        let text = "// app entry point\n\
                    name app.main/1.0;\n\
                    \n\
                    references { sys.text/1.0, util, \"lib/extra.pxs\" };\n\
                    no_standard_library;\n\
                    export main;\n\
                    name ignored;\n";
        let result = HeaderPreflight.preflight(text, Some(Path::new("/src/app.pxs")));

        assert!(result.is_ok(), "{:?}", result.errors);
        assert_eq!(result.module_name, Some(name("app.main/1.0")));
        assert!(result.suppress_stdlib);
        assert_eq!(result.path.as_deref(), Some(Path::new("/src/app.pxs")));

        let refs = &result.references;
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].module_name, Some(name("sys.text/1.0")));
        assert_eq!(refs[1].module_name, Some(name("util")));
        assert_eq!(refs[2].raw_path.as_deref(), Some(Path::new("lib/extra.pxs")));
    }

    #[test]
    fn test_header_stops_at_body() {
        let result = HeaderPreflight.preflight("export f;\nname late;\n", None);
        assert!(result.is_ok());
        assert_eq!(result.module_name, None);
        assert!(!result.suppress_stdlib);
    }

    #[test]
    fn test_errors_carry_positions() {
        let text = "name a;\nname b;\nreferences { a/x.y.z.w };\nreferences broken;\n";
        let result = HeaderPreflight.preflight(text, Some(Path::new("m.pxs")));

        assert_eq!(result.module_name, Some(name("a")));
        let lines: Vec<_> = result.errors.iter().map(|m| m.position.line).collect();
        assert_eq!(lines, vec![2, 3, 4]);
        assert_eq!(
            result.errors[0].classification.as_deref(),
            Some("duplicate-name")
        );
        assert_eq!(
            result.errors[2].classification.as_deref(),
            Some("header-syntax")
        );
    }

    #[test]
    fn test_empty_reference_list() {
        let result = HeaderPreflight.preflight("name a;\nreferences { };\n", None);
        assert!(result.is_ok());
        assert!(result.references.is_empty());
    }
}
