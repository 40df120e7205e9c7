//! Hashing utilities for source fingerprints.

use sha2::{Digest, Sha256};

use crate::core::ModuleName;

/// A hasher for building fingerprints from multiple components.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Fingerprint {
            hasher: Sha256::new(),
        }
    }

    /// Add a string component to the fingerprint.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0");
        self
    }

    /// Add a module name, including its version.
    pub fn update_name(&mut self, name: ModuleName) -> &mut Self {
        self.update_str(&format!("{}/{}", name.id(), name.version()))
    }

    /// Finalize and return the fingerprint as a hex string.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Fingerprint of a module: its name, its dependencies in order and its text.
pub fn module_fingerprint(
    name: ModuleName,
    dependencies: impl IntoIterator<Item = ModuleName>,
    text: &str,
) -> String {
    let mut fp = Fingerprint::new();
    fp.update_name(name);
    for dependency in dependencies {
        fp.update_name(dependency);
    }
    fp.update_str(text);
    fp.finish()
}
