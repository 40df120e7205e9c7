//! The set of modules a module depends on.

use indexmap::IndexMap;

use crate::core::errors::BuildError;
use crate::core::ModuleName;
use crate::util::InternedString;

/// Dependencies of one module, keyed by module id.
///
/// Declaration order is preserved; it decides symbol precedence when
/// dependency exports are merged. A module may depend on only one version of
/// any given id.
#[derive(Debug, Clone)]
pub struct DependencySet {
    owner: ModuleName,
    entries: IndexMap<InternedString, ModuleName>,
}

impl DependencySet {
    pub fn new(owner: ModuleName) -> Self {
        DependencySet {
            owner,
            entries: IndexMap::new(),
        }
    }

    /// Build a set from `names`, failing on the first version conflict.
    pub fn from_names(
        owner: ModuleName,
        names: impl IntoIterator<Item = ModuleName>,
    ) -> Result<Self, BuildError> {
        let mut set = DependencySet::new(owner);
        for name in names {
            set.insert(name)?;
        }
        Ok(set)
    }

    /// The module owning this set.
    pub fn owner(&self) -> ModuleName {
        self.owner
    }

    /// Add a dependency. Returns `Ok(true)` if it was new, `Ok(false)` if the
    /// identical name was already present.
    pub fn insert(&mut self, name: ModuleName) -> Result<bool, BuildError> {
        match self.entries.get(&name.id()) {
            Some(existing) if *existing == name => Ok(false),
            Some(existing) => Err(BuildError::VersionConflict {
                existing: *existing,
                new: name,
                dependent: self.owner,
            }),
            None => {
                self.entries.insert(name.id(), name);
                Ok(true)
            }
        }
    }

    pub fn contains(&self, name: &ModuleName) -> bool {
        self.entries.get(&name.id()) == Some(name)
    }

    /// The dependency registered under `id`, whatever its version.
    pub fn get_by_id(&self, id: &str) -> Option<ModuleName> {
        self.entries.get(&InternedString::new(id)).copied()
    }

    /// Dependencies in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = ModuleName> + '_ {
        self.entries.values().copied()
    }

    pub fn to_vec(&self) -> Vec<ModuleName> {
        self.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
