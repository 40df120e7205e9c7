//! Registry of target descriptions.
//!
//! The registry is shared by every build running on a plan. Descriptions are
//! only ever inserted or swapped as a whole, so readers always see a
//! consistent description.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::core::description::TargetDescription;
use crate::core::ModuleName;

/// Concurrent map from module name to its description.
#[derive(Debug, Default)]
pub struct TargetDescriptionSet {
    descriptions: DashMap<ModuleName, Arc<TargetDescription>>,
}

impl TargetDescriptionSet {
    pub fn new() -> Self {
        TargetDescriptionSet::default()
    }

    /// Insert `description` unless its name is already registered.
    ///
    /// Returns `true` if the description was inserted.
    pub fn insert_if_absent(&self, description: Arc<TargetDescription>) -> bool {
        match self.descriptions.entry(description.name()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                tracing::debug!(module = %description.name(), "registered description");
                slot.insert(description);
                true
            }
        }
    }

    /// Replace the description of `expected.name()` with `replacement`, but
    /// only if the registered description is still `expected` itself.
    pub fn compare_and_replace(
        &self,
        expected: &Arc<TargetDescription>,
        replacement: Arc<TargetDescription>,
    ) -> bool {
        debug_assert_eq!(expected.name(), replacement.name());
        match self.descriptions.entry(expected.name()) {
            Entry::Occupied(mut entry) if Arc::ptr_eq(entry.get(), expected) => {
                entry.insert(replacement);
                true
            }
            _ => false,
        }
    }

    /// The registered description for `name`, creating it with `create` if
    /// there is none. `create` runs at most once per missing name.
    pub fn get_or_create<E>(
        &self,
        name: ModuleName,
        create: impl FnOnce() -> Result<TargetDescription, E>,
    ) -> Result<Arc<TargetDescription>, E> {
        match self.descriptions.entry(name) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(slot) => {
                let description = Arc::new(create()?);
                slot.insert(Arc::clone(&description));
                Ok(description)
            }
        }
    }

    pub fn get(&self, name: &ModuleName) -> Option<Arc<TargetDescription>> {
        self.descriptions.get(name).map(|d| Arc::clone(d.value()))
    }

    pub fn contains(&self, name: &ModuleName) -> bool {
        self.descriptions.contains_key(name)
    }

    /// All registered descriptions for module `id`, lowest version first.
    pub fn find_by_id(&self, id: &str) -> Vec<Arc<TargetDescription>> {
        let mut found: Vec<_> = self
            .descriptions
            .iter()
            .filter(|entry| entry.key().id().as_str() == id)
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        found.sort_by_key(|d| d.name());
        found
    }

    /// The registered description that satisfies a reference to `expected`.
    pub fn find_satisfying(&self, expected: &ModuleName) -> Option<Arc<TargetDescription>> {
        if let Some(exact) = self.get(expected) {
            return Some(exact);
        }
        if !expected.is_unversioned() {
            return None;
        }
        self.find_by_id(expected.id().as_str()).pop()
    }

    pub fn remove(&self, name: &ModuleName) -> Option<Arc<TargetDescription>> {
        self.descriptions.remove(name).map(|(_, d)| d)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<ModuleName> {
        let mut names: Vec<_> = self.descriptions.iter().map(|e| *e.key()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}
