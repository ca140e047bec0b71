//! The integrity gate for structural changes of a live tree.

use super::validation::{self, ModelError};
use super::{DetachedTree, InstanceId, InstanceTree};
use log::debug;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsertionError {
    #[error("the parent instance {0} does not exist")]
    ParentNotFound(InstanceId),

    #[error("an instance named '{0}' already exists at this location")]
    DuplicateName(String),

    #[error("instance '{0}' has no component")]
    MissingComponent(String),

    #[error("component {0} cannot be instantiated as a root")]
    NotARootComponent(String),

    #[error("component {parent} does not accept {child} as a child")]
    ComponentNotAdmitted { parent: String, child: String },

    #[error("the insertion would make the application invalid: {0:?}")]
    Invalid(Vec<ModelError>),
}

/// Inserts `child` under `parent`, or as a root when `parent` is `None`.
///
/// 1. A sibling (or root) with the same name rejects the insertion.
/// 2. A root must come from a component without required ancestor; a child
///    must come from a component admitted by its parent's component.
/// 3. The subtree is attached and the whole tree validated. Any critical
///    finding detaches it again, leaving the tree as it was.
pub fn try_to_insert_child_instance(
    tree: &mut InstanceTree,
    parent: Option<InstanceId>,
    child: DetachedTree,
) -> Result<InstanceId, InsertionError> {
    let child_instance = child
        .root_instance()
        .ok_or_else(|| InsertionError::MissingComponent(String::new()))?;
    let child_name = child_instance.name().to_string();

    if tree.child_named(parent, &child_name).is_some() {
        return Err(InsertionError::DuplicateName(child_name));
    }

    let child_component = child_instance
        .component()
        .ok_or_else(|| InsertionError::MissingComponent(child_name.clone()))?;

    match parent {
        None => {
            if !child_component.is_root() {
                return Err(InsertionError::NotARootComponent(
                    child_component.name().to_string(),
                ));
            }
        }
        Some(parent_id) => {
            let parent_instance = tree
                .get(parent_id)
                .ok_or(InsertionError::ParentNotFound(parent_id))?;
            let admitted = parent_instance
                .component()
                .is_some_and(|c| c.admits(child_component.name()));
            if !admitted {
                return Err(InsertionError::ComponentNotAdmitted {
                    parent: parent_instance
                        .component_name()
                        .unwrap_or_default()
                        .to_string(),
                    child: child_component.name().to_string(),
                });
            }
        }
    }

    let inserted = tree.graft(parent, child).ok_or_else(|| match parent {
        Some(p) => InsertionError::ParentNotFound(p),
        None => InsertionError::MissingComponent(child_name.clone()),
    })?;

    let errors = validation::validate(tree);
    if validation::contains_critical_errors(&errors) {
        debug!("Rolling back the insertion of {child_name}: {errors:?}");
        // Detaching a freshly grafted subtree cannot fail
        let _ = tree.extract(inserted);
        return Err(InsertionError::Invalid(
            errors.into_iter().filter(ModelError::is_critical).collect(),
        ));
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{hierarchy, path, Instance};
    use deployment::{Component, Graph};
    use std::sync::Arc;

    fn graph() -> Graph {
        Graph::builder()
            .component(Component::new("vm"))
            .component(Component::new("tomcat"))
            .component(Component::new("mysql"))
            .component(Component::new("war"))
            .child("vm", "tomcat")
            .child("vm", "mysql")
            .child("tomcat", "war")
            .build()
            .unwrap()
    }

    fn component(graph: &Graph, name: &str) -> Arc<Component> {
        graph.get(name).unwrap().clone()
    }

    #[test]
    fn test_insert_root_and_child() {
        let graph = graph();
        let mut tree = InstanceTree::new();

        let vm = try_to_insert_child_instance(
            &mut tree,
            None,
            DetachedTree::single(Instance::new("vm1").with_component(component(&graph, "vm"))),
        )
        .unwrap();
        let tomcat = try_to_insert_child_instance(
            &mut tree,
            Some(vm),
            DetachedTree::single(Instance::new("tomcat").with_component(component(&graph, "tomcat"))),
        )
        .unwrap();

        assert_eq!(path::compute_instance_path(&tree, tomcat), "/vm1/tomcat");
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let graph = graph();
        let mut tree = InstanceTree::new();
        let vm = tree.add_root(Instance::new("vm1").with_component(component(&graph, "vm")));
        tree.insert_child(vm, Instance::new("tomcat").with_component(component(&graph, "tomcat")))
            .unwrap();

        let err = try_to_insert_child_instance(
            &mut tree,
            Some(vm),
            DetachedTree::single(Instance::new("tomcat").with_component(component(&graph, "tomcat"))),
        )
        .unwrap_err();
        assert_eq!(err, InsertionError::DuplicateName("tomcat".into()));

        let err = try_to_insert_child_instance(
            &mut tree,
            None,
            DetachedTree::single(Instance::new("vm1").with_component(component(&graph, "vm"))),
        )
        .unwrap_err();
        assert_eq!(err, InsertionError::DuplicateName("vm1".into()));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_component_not_admitted_leaves_parent_unchanged() {
        let graph = graph();
        let mut tree = InstanceTree::new();
        let vm = tree.add_root(Instance::new("vm1").with_component(component(&graph, "vm")));

        let err = try_to_insert_child_instance(
            &mut tree,
            Some(vm),
            DetachedTree::single(Instance::new("app").with_component(component(&graph, "war"))),
        )
        .unwrap_err();
        assert!(matches!(err, InsertionError::ComponentNotAdmitted { .. }));
        assert!(tree.children_of(vm).is_empty());
    }

    #[test]
    fn test_non_root_component_cannot_be_a_root() {
        let graph = graph();
        let mut tree = InstanceTree::new();
        let err = try_to_insert_child_instance(
            &mut tree,
            None,
            DetachedTree::single(Instance::new("tomcat").with_component(component(&graph, "tomcat"))),
        )
        .unwrap_err();
        assert_eq!(err, InsertionError::NotARootComponent("tomcat".into()));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_invalid_subtree_is_rolled_back() {
        let graph = graph();
        let mut tree = InstanceTree::new();
        let vm = tree.add_root(Instance::new("vm1").with_component(component(&graph, "vm")));

        // tomcat is admitted by vm but carries a mysql child, which tomcat does not admit
        let mut subtree = DetachedTree::single(Instance::new("tomcat").with_component(component(&graph, "tomcat")));
        let root = subtree.root();
        subtree
            .tree_mut()
            .insert_child(root, Instance::new("db").with_component(component(&graph, "mysql")))
            .unwrap();

        let err = try_to_insert_child_instance(&mut tree, Some(vm), subtree).unwrap_err();
        assert!(matches!(err, InsertionError::Invalid(ref errors) if !errors.is_empty()));
        assert!(tree.children_of(vm).is_empty());
        assert_eq!(hierarchy::get_all_instances(&tree), vec![vm]);
    }
}
