//! On-disk module fixtures.

use std::path::{Path, PathBuf};

/// Header and body of a module file.
#[derive(Debug, Clone, Default)]
pub struct ModuleFixture {
    pub name: Option<String>,
    pub references: Vec<String>,
    pub no_standard_library: bool,
    pub body: String,
}

impl ModuleFixture {
    pub fn named(name: impl Into<String>) -> Self {
        ModuleFixture {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn anonymous() -> Self {
        ModuleFixture::default()
    }

    /// Add a reference as written in the header: a module name, or a quoted
    /// path such as `"\"lib/x.pxs\""`.
    pub fn references(mut self, reference: impl Into<String>) -> Self {
        self.references.push(reference.into());
        self
    }

    pub fn without_standard_library(mut self) -> Self {
        self.no_standard_library = true;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Module file text.
    pub fn render(&self) -> String {
        let mut text = String::new();
        if let Some(name) = &self.name {
            text.push_str(&format!("name {};\n", name));
        }
        if !self.references.is_empty() {
            text.push_str(&format!("references {{ {} }};\n", self.references.join(", ")));
        }
        if self.no_standard_library {
            text.push_str("no_standard_library;\n");
        }
        text.push('\n');
        text.push_str(&self.body);
        text
    }

    /// Write the module to `root/relative`, creating directories.
    pub fn write(&self, root: &Path, relative: impl AsRef<Path>) -> PathBuf {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, self.render()).unwrap();
        path
    }
}
