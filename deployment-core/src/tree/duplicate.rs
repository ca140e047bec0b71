//! Duplication engine.
//!
//! Every variant produces a [`DetachedTree`] mirroring (part of) a source
//! subtree. Copies carry the name, component, channel and overridden exports of
//! their source; status, data and imports start empty. Nothing here checks the
//! component graph: copies must go through
//! [`try_to_insert_child_instance`](super::insert::try_to_insert_child_instance)
//! before becoming live.

use super::{hierarchy, path, DetachedTree, InstanceId, InstanceTree};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

/// Suffix appended to names by [`duplicate_instance_change_names`].
pub const MIGRATED_SUFFIX: &str = "_migrated";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DuplicationError {
    #[error("instance {0} does not exist")]
    UnknownInstance(InstanceId),

    #[error("instance {0} is not a child of the previous chain element")]
    BrokenChain(InstanceId),

    #[error("{expected} names are required to duplicate this subtree, {provided} were given")]
    NameCountMismatch { expected: usize, provided: usize },
}

/// How copies are named.
#[derive(Debug, Clone, Copy)]
pub enum Naming<'a> {
    /// Keep the source name.
    Verbatim,
    /// Append [`MIGRATED_SUFFIX`].
    Suffixed,
    /// One name per copied node, consumed in traversal order.
    Explicit(&'a [String]),
}

impl Naming<'_> {
    fn names_for(&self, tree: &InstanceTree, sources: &[InstanceId]) -> Result<Vec<String>, DuplicationError> {
        let source_name = |id: &InstanceId| {
            tree.get(*id)
                .map(|i| i.name().to_string())
                .ok_or(DuplicationError::UnknownInstance(*id))
        };

        match self {
            Naming::Verbatim => sources.iter().map(source_name).collect(),
            Naming::Suffixed => sources
                .iter()
                .map(|id| source_name(id).map(|name| format!("{name}{MIGRATED_SUFFIX}")))
                .collect(),
            Naming::Explicit(names) => {
                if names.len() != sources.len() {
                    return Err(DuplicationError::NameCountMismatch {
                        expected: sources.len(),
                        provided: names.len(),
                    });
                }
                Ok(names.to_vec())
            }
        }
    }
}

/// Copies the whole subtree rooted at `id`, names unchanged.
pub fn duplicate_instance(tree: &InstanceTree, id: InstanceId) -> Result<DetachedTree, DuplicationError> {
    duplicate_subtree(tree, id, Naming::Verbatim)
}

/// Copies the whole subtree rooted at `id`, appending `_migrated` to every name.
pub fn duplicate_instance_change_names(
    tree: &InstanceTree,
    id: InstanceId,
) -> Result<DetachedTree, DuplicationError> {
    duplicate_subtree(tree, id, Naming::Suffixed)
}

/// Copies the whole subtree rooted at `id`, taking names from `names` in
/// breadth-first order.
///
/// Fails when `names` does not hold exactly one name per node.
pub fn duplicate_with_names(
    tree: &InstanceTree,
    id: InstanceId,
    names: &[String],
) -> Result<DetachedTree, DuplicationError> {
    duplicate_subtree(tree, id, Naming::Explicit(names))
}

/// Breadth-first copy of a subtree.
///
/// A worklist of source nodes is processed with a source-to-copy map so that a
/// child always finds its parent's copy.
pub fn duplicate_subtree(
    tree: &InstanceTree,
    id: InstanceId,
    naming: Naming<'_>,
) -> Result<DetachedTree, DuplicationError> {
    if !tree.contains(id) {
        return Err(DuplicationError::UnknownInstance(id));
    }
    let sources = hierarchy::build_hierarchical_list(tree, id);
    let names = naming.names_for(tree, &sources)?;
    let names: HashMap<InstanceId, String> = sources.iter().copied().zip(names).collect();

    let mut copy = InstanceTree::new();
    let mut copies: HashMap<InstanceId, InstanceId> = HashMap::new();
    let mut to_process = VecDeque::from([id]);
    while let Some(current) = to_process.pop_front() {
        let source = tree
            .get(current)
            .ok_or(DuplicationError::UnknownInstance(current))?;
        let name = names.get(&current).cloned().unwrap_or_default();
        let blueprint = source.blueprint(name);

        let parent_copy = source.parent().and_then(|p| copies.get(&p).copied());
        let copy_id = match parent_copy {
            Some(p) if current != id => copy
                .insert_child(p, blueprint)
                .ok_or(DuplicationError::UnknownInstance(current))?,
            _ => copy.add_root(blueprint),
        };
        copies.insert(current, copy_id);
        to_process.extend(source.children().iter().copied());
    }

    let root = copies
        .get(&id)
        .copied()
        .ok_or(DuplicationError::UnknownInstance(id))?;
    Ok(DetachedTree::from_parts(copy, root))
}

/// Copies only the straight chain `chain[0] -> chain[1] -> ...`.
///
/// Siblings of chain nodes are skipped. Every element must be the parent of the
/// next one.
pub fn duplicate_chain(
    tree: &InstanceTree,
    chain: &[InstanceId],
    naming: Naming<'_>,
) -> Result<DetachedTree, DuplicationError> {
    let Some(first) = chain.first().copied() else {
        return Err(DuplicationError::NameCountMismatch {
            expected: 1,
            provided: 0,
        });
    };
    let names = naming.names_for(tree, chain)?;

    let mut copy = InstanceTree::new();
    let mut previous: Option<InstanceId> = None;
    for (index, (source_id, name)) in chain.iter().zip(names).enumerate() {
        let source = tree
            .get(*source_id)
            .ok_or(DuplicationError::UnknownInstance(*source_id))?;
        if index > 0 && source.parent() != Some(chain[index - 1]) {
            return Err(DuplicationError::BrokenChain(*source_id));
        }
        let blueprint = source.blueprint(name);
        previous = Some(match previous {
            Some(p) => copy
                .insert_child(p, blueprint)
                .ok_or(DuplicationError::UnknownInstance(*source_id))?,
            None => copy.add_root(blueprint),
        });
    }

    let root = copy
        .roots()
        .first()
        .copied()
        .ok_or(DuplicationError::UnknownInstance(first))?;
    Ok(DetachedTree::from_parts(copy, root))
}

/// Copies the instances lying on the path from the root down to `target`.
///
/// Used to stage the migration of a single branch rather than a whole machine.
pub fn duplicate_path(
    tree: &InstanceTree,
    target: InstanceId,
    naming: Naming<'_>,
) -> Result<DetachedTree, DuplicationError> {
    let chain = path::ancestor_chain(tree, target);
    if chain.is_empty() {
        return Err(DuplicationError::UnknownInstance(target));
    }
    duplicate_chain(tree, &chain, naming)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::path::compute_instance_path;
    use crate::tree::Instance;
    use deployment::{Component, Import, InstanceStatus};
    use std::sync::Arc;

    fn live_tree() -> (InstanceTree, InstanceId, InstanceId, InstanceId) {
        let vm = Arc::new(Component::new("vm"));
        let tomcat = Arc::new(Component::new("tomcat"));
        let war = Arc::new(Component::new("war"));

        let mut tree = InstanceTree::new();
        let root = tree.add_root(Instance::new("vm1").with_component(vm).with_channel("ch"));
        let server = tree
            .insert_child(root, Instance::new("tomcat").with_component(tomcat).with_export("port", "8080"))
            .unwrap();
        let app = tree.insert_child(server, Instance::new("app").with_component(war.clone())).unwrap();
        tree.insert_child(server, Instance::new("app2").with_component(war)).unwrap();

        for id in [root, server, app] {
            let instance = tree.get_mut(id).unwrap();
            instance.set_status(InstanceStatus::DeployedStarted);
            instance.data_mut().insert("ip-address".into(), "10.0.0.5".into());
            let mut imports = deployment::Imports::new();
            imports.insert("mysql".into(), vec![Import::new("/vm2/mysql", "mysql")]);
            instance.replace_imports(imports);
        }
        (tree, root, server, app)
    }

    #[test]
    fn test_duplicate_keeps_shape_and_drops_runtime_state() {
        let (tree, root, _, _) = live_tree();
        let copy = duplicate_instance(&tree, root).unwrap();

        assert_eq!(copy.len(), 4);
        assert_eq!(copy.root_name(), "vm1");
        assert!(copy.root_instance().unwrap().is_root());

        let copy_tree = copy.tree();
        for id in hierarchy::build_hierarchical_list(copy_tree, copy.root()) {
            let instance = copy_tree.get(id).unwrap();
            assert!(instance.data().is_empty());
            assert!(instance.imports().is_empty());
            assert_eq!(instance.status(), InstanceStatus::NotDeployed);
        }

        let server = path::find_instance_by_path(copy_tree, "/vm1/tomcat").unwrap();
        let server = copy_tree.get(server).unwrap();
        assert_eq!(server.overridden_exports()["port"], "8080");
        assert_eq!(server.component_name(), Some("tomcat"));
        assert_eq!(server.children().len(), 2);
        assert_eq!(copy.root_instance().unwrap().channel(), Some("ch"));
    }

    #[test]
    fn test_duplicate_shares_components() {
        let (tree, _, server, _) = live_tree();
        let copy = duplicate_instance(&tree, server).unwrap();
        let original = tree.get(server).unwrap().component().unwrap();
        let copied = copy.root_instance().unwrap().component().unwrap();
        assert!(Arc::ptr_eq(original, copied));
    }

    #[test]
    fn test_duplicate_with_suffix() {
        let (tree, _, server, _) = live_tree();
        let copy = duplicate_instance_change_names(&tree, server).unwrap();

        assert_eq!(copy.root_name(), "tomcat_migrated");
        assert!(path::find_instance_by_path(copy.tree(), "/tomcat_migrated/app_migrated").is_some());
        assert!(path::find_instance_by_path(copy.tree(), "/tomcat_migrated/app2_migrated").is_some());
    }

    #[test]
    fn test_duplicate_with_names_in_traversal_order() {
        let (tree, _, server, _) = live_tree();
        let names: Vec<String> = ["t", "a", "b"].iter().map(|s| s.to_string()).collect();
        let copy = duplicate_with_names(&tree, server, &names).unwrap();

        assert!(path::find_instance_by_path(copy.tree(), "/t/a").is_some());
        assert!(path::find_instance_by_path(copy.tree(), "/t/b").is_some());

        let too_few = vec!["t".to_string()];
        assert_eq!(
            duplicate_with_names(&tree, server, &too_few).unwrap_err(),
            DuplicationError::NameCountMismatch { expected: 3, provided: 1 }
        );
    }

    #[test]
    fn test_duplicate_path_skips_siblings() {
        let (tree, _, _, app) = live_tree();
        let copy = duplicate_path(&tree, app, Naming::Suffixed).unwrap();

        assert_eq!(copy.len(), 3);
        let leaf = path::find_instance_by_path(copy.tree(), "/vm1_migrated/tomcat_migrated/app_migrated").unwrap();
        assert_eq!(
            compute_instance_path(copy.tree(), leaf),
            "/vm1_migrated/tomcat_migrated/app_migrated"
        );
        assert!(path::find_instance_by_path(copy.tree(), "/vm1_migrated/tomcat_migrated/app2_migrated").is_none());
    }

    #[test]
    fn test_duplicate_path_with_destination_names() {
        let (tree, _, _, app) = live_tree();
        let names: Vec<String> = ["vm9", "tomcat", "app"].iter().map(|s| s.to_string()).collect();
        let copy = duplicate_path(&tree, app, Naming::Explicit(&names)).unwrap();
        assert!(path::find_instance_by_path(copy.tree(), "/vm9/tomcat/app").is_some());
    }

    #[test]
    fn test_unknown_source() {
        let tree = InstanceTree::new();
        let (other, root, _, _) = live_tree();
        assert!(other.contains(root));
        assert!(duplicate_instance(&tree, root).is_err());
    }
}
