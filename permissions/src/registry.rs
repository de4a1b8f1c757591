//! Permission registry.
//!
//! Registration happens on a [`PermissionRegistryBuilder`] during bootstrap.
//! [`PermissionRegistryBuilder::seal`] validates the depends-on graph and
//! produces an immutable [`PermissionRegistry`], the only type that can
//! answer closure queries. Once sealed, the registry is shared behind an
//! `Arc` without any locking.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::error::{PermissionError, Result};
use crate::types::PermissionDefinition;

/// Collects permission definitions before the graph is validated.
#[derive(Debug, Default)]
pub struct PermissionRegistryBuilder {
    definitions: BTreeMap<String, PermissionDefinition>,
}

impl PermissionRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition.
    ///
    /// Dependency edges may point at identifiers that are registered later;
    /// they are only checked by [`seal`](Self::seal).
    pub fn register(&mut self, definition: PermissionDefinition) -> Result<()> {
        if self.definitions.contains_key(&definition.id) {
            return Err(PermissionError::DuplicateDefinition(definition.id));
        }

        debug!(
            "Registering permission {} from module {}",
            definition.id, definition.module
        );
        self.definitions.insert(definition.id.clone(), definition);
        Ok(())
    }

    /// Registers every definition, stopping at the first failure.
    pub fn register_all<I>(&mut self, definitions: I) -> Result<()>
    where
        I: IntoIterator<Item = PermissionDefinition>,
    {
        for definition in definitions {
            self.register(definition)?;
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Validates the graph and freezes the registry.
    ///
    /// Fails with [`PermissionError::UnknownDependency`] for a dangling edge
    /// and with [`PermissionError::CyclicDependency`] when the graph is not
    /// acyclic.
    pub fn seal(self) -> Result<PermissionRegistry> {
        for definition in self.definitions.values() {
            for dependency in &definition.depends_on {
                if !self.definitions.contains_key(dependency) {
                    return Err(PermissionError::UnknownDependency {
                        permission: definition.id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        detect_cycle(&self.definitions)?;

        let mut dependents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for definition in self.definitions.values() {
            for dependency in &definition.depends_on {
                dependents
                    .entry(dependency.clone())
                    .or_default()
                    .insert(definition.id.clone());
            }
        }

        info!(
            "Permission registry sealed with {} definitions",
            self.definitions.len()
        );

        Ok(PermissionRegistry {
            definitions: self.definitions,
            dependents,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnStack,
    Done,
}

/// Depth-first search with an explicit recursion stack. A node found on the
/// current stack closes a cycle.
fn detect_cycle(definitions: &BTreeMap<String, PermissionDefinition>) -> Result<()> {
    let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();
    let mut stack: Vec<&str> = Vec::new();

    for id in definitions.keys() {
        if !marks.contains_key(id.as_str()) {
            visit(id, definitions, &mut marks, &mut stack)?;
        }
    }
    Ok(())
}

fn visit<'a>(
    id: &'a str,
    definitions: &'a BTreeMap<String, PermissionDefinition>,
    marks: &mut BTreeMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
) -> Result<()> {
    marks.insert(id, Mark::OnStack);
    stack.push(id);

    if let Some(definition) = definitions.get(id) {
        for dependency in &definition.depends_on {
            match marks.get(dependency.as_str()).copied() {
                Some(Mark::OnStack) => {
                    let start = stack
                        .iter()
                        .position(|entry| *entry == dependency.as_str())
                        .unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|entry| entry.to_string()).collect();
                    cycle.push(dependency.clone());
                    return Err(PermissionError::CyclicDependency { cycle });
                }
                Some(Mark::Done) => {}
                None => visit(dependency, definitions, marks, stack)?,
            }
        }
    }

    stack.pop();
    marks.insert(id, Mark::Done);
    Ok(())
}

/// Validated, immutable permission graph.
#[derive(Debug, Clone)]
pub struct PermissionRegistry {
    definitions: BTreeMap<String, PermissionDefinition>,
    /// Reverse edges: permission -> permissions that depend on it
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl PermissionRegistry {
    /// Returns every input identifier plus everything reachable from it
    /// through depends-on edges.
    ///
    /// Identifiers that are not registered are returned as-is; they have no
    /// edges to follow.
    pub fn closure<I, S>(&self, ids: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut result = BTreeSet::new();
        let mut pending: Vec<String> = ids.into_iter().map(|id| id.as_ref().to_string()).collect();

        while let Some(id) = pending.pop() {
            if !result.insert(id.clone()) {
                continue;
            }
            if let Some(definition) = self.definitions.get(&id) {
                pending.extend(
                    definition
                        .depends_on
                        .iter()
                        .filter(|dependency| !result.contains(*dependency))
                        .cloned(),
                );
            }
        }

        result
    }

    /// True when holding `held` implies holding `required`.
    pub fn implies(&self, held: &str, required: &str) -> bool {
        held == required || self.closure([held]).contains(required)
    }

    pub fn get(&self, id: &str) -> Option<&PermissionDefinition> {
        self.definitions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    /// All definitions ordered by identifier.
    pub fn definitions(&self) -> impl Iterator<Item = &PermissionDefinition> {
        self.definitions.values()
    }

    /// Permissions that directly depend on `id`.
    pub fn dependents_of(&self, id: &str) -> BTreeSet<String> {
        self.dependents.get(id).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(id: &str, deps: &[&str]) -> PermissionDefinition {
        let mut definition = PermissionDefinition::new(id, "test", id);
        for dep in deps {
            definition = definition.depends_on(*dep);
        }
        definition
    }

    fn sealed(defs: Vec<PermissionDefinition>) -> PermissionRegistry {
        let mut builder = PermissionRegistryBuilder::new();
        builder.register_all(defs).unwrap();
        builder.seal().unwrap()
    }

    #[test]
    fn test_duplicate_definition_rejected() {
        let mut builder = PermissionRegistryBuilder::new();
        builder.register(def("connection.view", &[])).unwrap();
        let err = builder.register(def("connection.view", &[])).unwrap_err();
        assert!(matches!(err, PermissionError::DuplicateDefinition(id) if id == "connection.view"));
    }

    #[test]
    fn test_forward_reference_resolved_at_seal() {
        let mut builder = PermissionRegistryBuilder::new();
        builder
            .register(def("connection.manage", &["connection.view"]))
            .unwrap();
        builder.register(def("connection.view", &[])).unwrap();

        let registry = builder.seal().unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_dangling_edge_fails_seal() {
        let mut builder = PermissionRegistryBuilder::new();
        builder
            .register(def("ssh.connect", &["connection.view"]))
            .unwrap();

        match builder.seal() {
            Err(PermissionError::UnknownDependency {
                permission,
                dependency,
            }) => {
                assert_eq!(permission, "ssh.connect");
                assert_eq!(dependency, "connection.view");
            }
            other => panic!("expected UnknownDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_three_node_cycle_fails_seal() {
        let mut builder = PermissionRegistryBuilder::new();
        builder
            .register_all(vec![def("a", &["b"]), def("b", &["c"]), def("c", &["a"])])
            .unwrap();

        match builder.seal() {
            Err(PermissionError::CyclicDependency { cycle }) => {
                assert_eq!(cycle, vec!["a", "b", "c", "a"]);
            }
            other => panic!("expected CyclicDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let mut builder = PermissionRegistryBuilder::new();
        builder.register(def("a", &["a"])).unwrap();
        assert!(matches!(
            builder.seal(),
            Err(PermissionError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let registry = sealed(vec![
            def("top", &["left", "right"]),
            def("left", &["bottom"]),
            def("right", &["bottom"]),
            def("bottom", &[]),
        ]);
        let closure = registry.closure(["top"]);
        assert_eq!(closure.len(), 4);
    }

    #[test]
    fn test_closure_follows_edges_transitively() {
        let registry = sealed(vec![
            def("connection.view", &[]),
            def("connection.manage", &["connection.view"]),
            def("connection.share", &["connection.manage"]),
            def("session.view", &[]),
        ]);

        let closure = registry.closure(["connection.share"]);
        assert!(closure.contains("connection.share"));
        assert!(closure.contains("connection.manage"));
        assert!(closure.contains("connection.view"));
        assert!(!closure.contains("session.view"));

        // The implies direction only goes down the graph
        let closure = registry.closure(["connection.view"]);
        assert_eq!(closure.len(), 1);
    }

    #[test]
    fn test_closure_unions_inputs() {
        let registry = sealed(vec![
            def("a", &["b"]),
            def("b", &[]),
            def("c", &[]),
        ]);
        let closure = registry.closure(["a", "c"]);
        assert_eq!(
            closure.into_iter().collect::<Vec<_>>(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn test_unknown_input_is_kept() {
        let registry = sealed(vec![def("a", &[])]);
        let closure = registry.closure(["missing"]);
        assert!(closure.contains("missing"));
        assert_eq!(closure.len(), 1);
    }

    #[test]
    fn test_implies_and_dependents() {
        let registry = sealed(vec![
            def("connection.view", &[]),
            def("connection.manage", &["connection.view"]),
            def("ssh.connect", &["connection.view"]),
        ]);

        assert!(registry.implies("connection.manage", "connection.view"));
        assert!(registry.implies("connection.view", "connection.view"));
        assert!(!registry.implies("connection.view", "connection.manage"));

        let dependents = registry.dependents_of("connection.view");
        assert!(dependents.contains("connection.manage"));
        assert!(dependents.contains("ssh.connect"));
    }
}
