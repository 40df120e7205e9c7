//! Build graph - eager validation of the modules a build needs.
//!
//! Before any asynchronous work starts, the transitive closure of the
//! requested modules is walked once so that unresolved dependencies and
//! cycles surface as errors instead of as hung or failed builds.

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::core::errors::BuildError;
use crate::core::{ModuleName, TargetDescription, TargetDescriptionSet};

/// The validated dependency graph of one build request.
#[derive(Debug)]
pub struct BuildGraph {
    /// Edge `a -> b` means `a` depends on `b`.
    graph: DiGraph<ModuleName, ()>,

    /// Map from module name to node index
    nodes: HashMap<ModuleName, NodeIndex>,

    /// Descriptions of every module in the closure
    descriptions: HashMap<ModuleName, Arc<TargetDescription>>,
}

impl BuildGraph {
    /// Walk the closure of `roots` in `registry`.
    ///
    /// Fails with `UnresolvedDependency` for the first name without a
    /// description and with `DependencyCycle` if the closure is cyclic.
    pub fn validate(
        registry: &TargetDescriptionSet,
        roots: &[ModuleName],
    ) -> Result<Self, BuildError> {
        let mut graph = BuildGraph {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            descriptions: HashMap::new(),
        };

        let mut stack: Vec<(ModuleName, Option<ModuleName>)> =
            roots.iter().rev().map(|&name| (name, None)).collect();

        while let Some((requested, dependent)) = stack.pop() {
            let description = registry.find_satisfying(&requested).ok_or(
                BuildError::UnresolvedDependency {
                    name: requested,
                    dependent,
                },
            )?;
            let name = description.name();

            if let Some(from) = dependent {
                graph.add_edge(from, name);
            }
            if graph.descriptions.contains_key(&name) {
                continue;
            }

            graph.add_node(name);
            for dependency in description.dependencies().to_vec().into_iter().rev() {
                stack.push((dependency, Some(name)));
            }
            graph.descriptions.insert(name, description);
        }

        graph.check_acyclic()?;
        Ok(graph)
    }

    fn add_node(&mut self, name: ModuleName) -> NodeIndex {
        if let Some(&node) = self.nodes.get(&name) {
            return node;
        }
        let node = self.graph.add_node(name);
        self.nodes.insert(name, node);
        node
    }

    fn add_edge(&mut self, from: ModuleName, to: ModuleName) {
        let from = self.add_node(from);
        let to = self.add_node(to);
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
    }

    fn check_acyclic(&self) -> Result<(), BuildError> {
        if toposort(&self.graph, None).is_ok() {
            return Ok(());
        }

        let mut cycle = tarjan_scc(&self.graph)
            .into_iter()
            .find(|component| {
                component.len() > 1
                    || self.graph.contains_edge(component[0], component[0])
            })
            .map(|component| component.into_iter().map(|n| self.graph[n]).collect::<Vec<_>>())
            .unwrap_or_default();
        cycle.sort();
        Err(BuildError::DependencyCycle { modules: cycle })
    }

    /// Modules with dependencies before dependents.
    pub fn build_order(&self) -> Vec<ModuleName> {
        match toposort(&self.graph, None) {
            Ok(mut order) => {
                // Edges point from dependent to dependency.
                order.reverse();
                order.into_iter().map(|n| self.graph[n]).collect()
            }
            Err(_) => Vec::new(),
        }
    }

    /// The concrete module a reference from the closure resolved to.
    pub fn description(&self, name: &ModuleName) -> Option<&Arc<TargetDescription>> {
        self.descriptions.get(name)
    }

    pub fn contains(&self, name: &ModuleName) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
