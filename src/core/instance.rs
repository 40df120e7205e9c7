//! Linked executable units.

use std::fmt;

use indexmap::IndexMap;

use crate::core::target::{Artifact, Target};
use crate::core::ModuleName;

/// A module together with every module it is linked against.
///
/// Instances are created fresh for each build or load; linking never mutates
/// the dependency that is linked in.
#[derive(Clone)]
pub struct Instance {
    name: ModuleName,
    module: Option<Artifact>,
    links: IndexMap<ModuleName, Option<Artifact>>,
}

impl Instance {
    pub fn new(name: ModuleName, module: Option<Artifact>) -> Self {
        Instance {
            name,
            module,
            links: IndexMap::new(),
        }
    }

    /// An unlinked instance of a built target.
    pub fn for_target(target: &Target) -> Self {
        Instance::new(target.name(), target.module().cloned())
    }

    pub fn name(&self) -> ModuleName {
        self.name
    }

    pub fn module(&self) -> Option<&Artifact> {
        self.module.as_ref()
    }

    /// Link `dependency` and, transitively, everything it is linked to.
    ///
    /// Modules already linked (including this instance itself) are skipped,
    /// so diamonds and repeated links are harmless. Returns the number of
    /// modules newly linked.
    pub fn link(&mut self, dependency: &Instance) -> usize {
        let mut added = 0;
        let transitive = std::iter::once((dependency.name, &dependency.module))
            .chain(dependency.links.iter().map(|(name, module)| (*name, module)));

        for (name, module) in transitive {
            if name == self.name || self.links.contains_key(&name) {
                continue;
            }
            self.links.insert(name, module.clone());
            added += 1;
        }
        added
    }

    pub fn is_linked_to(&self, name: &ModuleName) -> bool {
        self.links.contains_key(name)
    }

    /// Linked modules in the order they were first linked.
    pub fn linked(&self) -> impl Iterator<Item = ModuleName> + '_ {
        self.links.keys().copied()
    }

    /// The artifact of a linked module, or of this module itself.
    pub fn module_of(&self, name: &ModuleName) -> Option<&Artifact> {
        if *name == self.name {
            return self.module.as_ref();
        }
        self.links.get(name)?.as_ref()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("name", &self.name)
            .field("links", &self.links.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn name(text: &str) -> ModuleName {
        ModuleName::parse(text).unwrap()
    }

    fn instance(text: &str) -> Instance {
        Instance::new(name(text), Some(Arc::new(text.to_string())))
    }

    #[test]
    fn test_link_is_transitive() {
        let base = instance("base");
        let mut mid = instance("mid");
        mid.link(&base);

        let mut app = instance("app");
        assert_eq!(app.link(&mid), 2);
        assert!(app.is_linked_to(&name("mid")));
        assert!(app.is_linked_to(&name("base")));
        assert_eq!(
            app.module_of(&name("base"))
                .and_then(|m| m.downcast_ref::<String>())
                .map(String::as_str),
            Some("base")
        );
    }

    #[test]
    fn test_diamond_links_once() {
        let base = instance("base");
        let mut left = instance("left");
        left.link(&base);
        let mut right = instance("right");
        right.link(&base);

        let mut app = instance("app");
        assert_eq!(app.link(&left), 2);
        assert_eq!(app.link(&right), 1);
        let linked: Vec<_> = app.linked().map(|n| n.to_string()).collect();
        assert_eq!(linked, vec!["left", "base", "right"]);
    }

    #[test]
    fn test_never_links_itself() {
        let mut a = instance("a");
        let mut b = instance("b");
        b.link(&a.clone());
        assert_eq!(a.link(&b), 1);
        assert!(!a.is_linked_to(&name("a")));
    }
}
