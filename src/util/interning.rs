//! Interned module identifiers.
//!
//! Module ids are compared and hashed constantly while the plan walks the
//! dependency graph, so they are stored once in a process-wide table and
//! handed out as `Copy` handles.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::LazyLock;

use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

static TABLE: LazyLock<RwLock<HashSet<&'static str>>> =
    LazyLock::new(|| RwLock::new(HashSet::new()));

/// A string stored in the global intern table.
///
/// Equal contents always share one allocation, so equality and hashing work
/// on the pointer.
#[derive(Clone, Copy)]
pub struct InternedString {
    text: &'static str,
}

impl InternedString {
    /// Intern `s`, reusing the existing entry if one exists.
    pub fn new(s: impl AsRef<str>) -> Self {
        let s = s.as_ref();

        if let Some(&text) = TABLE.read().get(s) {
            return InternedString { text };
        }

        let mut table = TABLE.write();
        // Another thread may have won the race between the two locks.
        if let Some(&text) = table.get(s) {
            return InternedString { text };
        }
        let text: &'static str = Box::leak(s.to_owned().into_boxed_str());
        table.insert(text);
        InternedString { text }
    }

    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.text
    }
}

impl Default for InternedString {
    fn default() -> Self {
        InternedString::new("")
    }
}

impl Deref for InternedString {
    type Target = str;

    fn deref(&self) -> &str {
        self.text
    }
}

impl AsRef<str> for InternedString {
    fn as_ref(&self) -> &str {
        self.text
    }
}

impl PartialEq for InternedString {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.text, other.text)
    }
}

impl Eq for InternedString {}

impl PartialOrd for InternedString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Lexical, so that sorted collections of module names read naturally.
impl Ord for InternedString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text.cmp(other.text)
    }
}

impl Hash for InternedString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.text, state)
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.text, f)
    }
}

impl fmt::Display for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text)
    }
}

impl From<&str> for InternedString {
    fn from(s: &str) -> Self {
        InternedString::new(s)
    }
}

impl From<String> for InternedString {
    fn from(s: String) -> Self {
        InternedString::new(s)
    }
}

impl Serialize for InternedString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.text)
    }
}

impl<'de> Deserialize<'de> for InternedString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(InternedString::new(s))
    }
}
