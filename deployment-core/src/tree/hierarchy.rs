//! Traversals and lookups over a whole tree.

use super::{InstanceId, InstanceTree};
use std::collections::VecDeque;

/// The instance followed by all its descendants, breadth-first.
pub fn build_hierarchical_list(tree: &InstanceTree, id: InstanceId) -> Vec<InstanceId> {
    let mut result = Vec::new();
    if !tree.contains(id) {
        return result;
    }

    let mut to_process = VecDeque::from([id]);
    while let Some(current) = to_process.pop_front() {
        result.push(current);
        to_process.extend(tree.children_of(current).iter().copied());
    }
    result
}

/// Every reachable instance: each root followed by its breadth-first subtree.
pub fn get_all_instances(tree: &InstanceTree) -> Vec<InstanceId> {
    tree.roots()
        .iter()
        .flat_map(|root| build_hierarchical_list(tree, *root))
        .collect()
}

/// First instance named `name`, in [`get_all_instances`] order.
pub fn find_instance_by_name(tree: &InstanceTree, name: &str) -> Option<InstanceId> {
    get_all_instances(tree)
        .into_iter()
        .find(|id| tree.get(*id).is_some_and(|i| i.name() == name))
}

/// Every instance created from the component named `component_name`.
pub fn find_instances_by_component_name(
    tree: &InstanceTree,
    component_name: &str,
) -> Vec<InstanceId> {
    get_all_instances(tree)
        .into_iter()
        .filter(|id| {
            tree.get(*id)
                .and_then(|i| i.component_name())
                .is_some_and(|c| c == component_name)
        })
        .collect()
}
