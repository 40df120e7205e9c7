//! Module identity: WHAT module (dotted id + version).
//!
//! ModuleNames are interned, so they are `Copy` and compare by pointer.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

use parking_lot::RwLock;
use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::InternedString;

static NAME_TABLE: LazyLock<RwLock<HashMap<NameInner, &'static NameInner>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Error parsing a textual module name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleNameError {
    #[error("module name is empty")]
    Empty,

    #[error("invalid module id `{0}`: segments must be non-empty and alphanumeric")]
    InvalidId(String),

    #[error("invalid version `{version}` in module name `{name}`")]
    InvalidVersion { name: String, version: String },
}

/// A versioned module name such as `sys.text/1.2`.
///
/// Equality, hashing and ordering use both the id and the version.
#[derive(Clone, Copy)]
pub struct ModuleName {
    inner: &'static NameInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NameInner {
    id: InternedString,
    version: Version,
}

impl ModuleName {
    /// Create a module name from a validated id and version.
    pub fn new(id: impl AsRef<str>, version: Version) -> Result<Self, ModuleNameError> {
        let id = id.as_ref();
        validate_id(id)?;
        Ok(Self::intern(NameInner {
            id: InternedString::new(id),
            version,
        }))
    }

    /// Create an unversioned (`0.0.0`) module name.
    pub fn unversioned(id: impl AsRef<str>) -> Result<Self, ModuleNameError> {
        Self::new(id, Version::new(0, 0, 0))
    }

    /// Parse `id` or `id/version`. Versions may omit trailing components.
    pub fn parse(text: &str) -> Result<Self, ModuleNameError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ModuleNameError::Empty);
        }

        match text.split_once('/') {
            None => Self::unversioned(text),
            Some((id, version)) => {
                let parsed = parse_lenient_version(version.trim()).ok_or_else(|| {
                    ModuleNameError::InvalidVersion {
                        name: text.to_string(),
                        version: version.to_string(),
                    }
                })?;
                Self::new(id.trim(), parsed)
            }
        }
    }

    fn intern(inner: NameInner) -> Self {
        if let Some(&interned) = NAME_TABLE.read().get(&inner) {
            return ModuleName { inner: interned };
        }

        let mut table = NAME_TABLE.write();
        if let Some(&interned) = table.get(&inner) {
            return ModuleName { inner: interned };
        }
        let leaked: &'static NameInner = Box::leak(Box::new(inner.clone()));
        table.insert(inner, leaked);
        ModuleName { inner: leaked }
    }

    pub fn id(&self) -> InternedString {
        self.inner.id
    }

    pub fn version(&self) -> &Version {
        &self.inner.version
    }

    /// Whether no version was given (`0.0.0`).
    pub fn is_unversioned(&self) -> bool {
        let v = &self.inner.version;
        v.major == 0 && v.minor == 0 && v.patch == 0 && v.pre.is_empty()
    }

    /// Whether a module declaring itself as `self` satisfies a reference to
    /// `expected`: the ids must agree, and the versions too unless the
    /// reference left its version open.
    pub fn satisfies(&self, expected: &ModuleName) -> bool {
        self.id() == expected.id()
            && (expected.is_unversioned() || self.version() == expected.version())
    }

    /// Same id, different version.
    pub fn conflicts_with(&self, other: &ModuleName) -> bool {
        self.id() == other.id() && self.version() != other.version()
    }
}

fn validate_id(id: &str) -> Result<(), ModuleNameError> {
    if id.is_empty() {
        return Err(ModuleNameError::Empty);
    }
    let valid = id.split('.').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    });
    if valid {
        Ok(())
    } else {
        Err(ModuleNameError::InvalidId(id.to_string()))
    }
}

/// Accept `1`, `1.2` and full semver versions.
fn parse_lenient_version(text: &str) -> Option<Version> {
    if let Ok(v) = Version::parse(text) {
        return Some(v);
    }
    let parts: Vec<&str> = text.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part.parse().ok()?;
    }
    Some(Version::new(numbers[0], numbers[1], numbers[2]))
}

impl FromStr for ModuleName {
    type Err = ModuleNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleName::parse(s)
    }
}

impl PartialEq for ModuleName {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner, other.inner)
    }
}

impl Eq for ModuleName {}

impl Hash for ModuleName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.inner, state)
    }
}

impl PartialOrd for ModuleName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ModuleName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.inner
            .id
            .cmp(&other.inner.id)
            .then_with(|| self.inner.version.cmp(&other.inner.version))
    }
}

impl fmt::Debug for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleName({})", self)
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unversioned() {
            write!(f, "{}", self.inner.id)
        } else {
            write!(f, "{}/{}", self.inner.id, self.inner.version)
        }
    }
}

impl Serialize for ModuleName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModuleName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        ModuleName::parse(&text).map_err(serde::de::Error::custom)
    }
}
