//! Slash-delimited instance paths.
//!
//! A path is the root-to-node chain of names, each prefixed with `/`
//! (e.g. `/vm1/tomcat/rubis`). Paths are the only identity used across trees:
//! a duplicated subtree and its source never share [`InstanceId`]s.

use super::{InstanceId, InstanceTree};

/// Computes the path of an instance by walking its parent links.
///
/// An instance with an empty (or blank) name contributes a bare `/`.
/// Returns an empty string for an unknown id.
pub fn compute_instance_path(tree: &InstanceTree, id: InstanceId) -> String {
    let mut segments = Vec::new();
    let mut current = tree.get(id);
    while let Some(instance) = current {
        let name = instance.name();
        segments.push(if name.trim().is_empty() { "" } else { name });
        current = instance.parent().and_then(|p| tree.get(p));
    }

    segments.iter().rev().fold(String::new(), |mut acc, name| {
        acc.push('/');
        acc.push_str(name);
        acc
    })
}

/// Whether two instances, possibly from different trees, have the same path.
pub fn have_same_path(
    left: &InstanceTree,
    left_id: InstanceId,
    right: &InstanceTree,
    right_id: InstanceId,
) -> bool {
    compute_instance_path(left, left_id) == compute_instance_path(right, right_id)
}

/// Counts the instances designated by a path.
///
/// Mirrors a split on `/` that keeps the leading empty segment and drops
/// trailing ones: `""` and `"toto"` both count 0, `"/root/apache/war"` counts 3.
pub fn count_instances(path: &str) -> usize {
    let mut parts: Vec<&str> = path.split('/').collect();
    while parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts.len().saturating_sub(1)
}

/// Splits a path into instance names.
///
/// A leading blank segment and trailing empty segments are dropped.
pub fn path_segments(path: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = path.split('/').collect();
    while parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    if parts.first().is_some_and(|p| p.trim().is_empty()) {
        parts.remove(0);
    }
    parts
}

/// Resolves a path against the roots of `tree`.
///
/// The walk is strictly level by level: the first segment that matches no
/// candidate aborts the lookup.
pub fn find_instance_by_path(tree: &InstanceTree, path: &str) -> Option<InstanceId> {
    let mut current: Option<InstanceId> = None;
    for name in path_segments(path) {
        current = Some(tree.child_named(current, name)?);
    }
    current
}

/// Resolves a path whose first segment must designate `root`.
pub fn find_instance_under_root(
    tree: &InstanceTree,
    root: InstanceId,
    path: &str,
) -> Option<InstanceId> {
    let mut segments = path_segments(path).into_iter();
    let first = segments.next()?;
    if tree.get(root)?.name() != first {
        return None;
    }

    let mut current = root;
    for name in segments {
        current = tree.child_named(Some(current), name)?;
    }
    Some(current)
}

/// Walks up to the root of the instance's tree.
pub fn find_root_instance(tree: &InstanceTree, id: InstanceId) -> InstanceId {
    let mut current = id;
    while let Some(parent) = tree.parent_of(current) {
        current = parent;
    }
    current
}

/// Ancestor chain of an instance, root first, the instance itself last.
pub fn ancestor_chain(tree: &InstanceTree, id: InstanceId) -> Vec<InstanceId> {
    let mut chain = Vec::new();
    if !tree.contains(id) {
        return chain;
    }
    let mut current = Some(id);
    while let Some(c) = current {
        chain.push(c);
        current = tree.parent_of(c);
    }
    chain.reverse();
    chain
}

/// The cumulative prefixes of a path: `/a/b/c` gives `/a`, `/a/b`, `/a/b/c`.
pub fn get_all_instance_paths_in_path(path: &str) -> Vec<String> {
    let mut prefix = String::new();
    path_segments(path)
        .into_iter()
        .map(|name| {
            prefix.push('/');
            prefix.push_str(name);
            prefix.clone()
        })
        .collect()
}

/// Resolves every instance along a path, root first.
///
/// Each segment is looked up among the children of the previous match, so
/// homonyms in other branches are never picked. Returns `None` as soon as a
/// segment cannot be resolved.
pub fn get_all_instances_in_the_instance_path(
    tree: &InstanceTree,
    path: &str,
) -> Option<Vec<InstanceId>> {
    let mut result = Vec::new();
    let mut current: Option<InstanceId> = None;
    for name in path_segments(path) {
        let next = tree.child_named(current, name)?;
        result.push(next);
        current = Some(next);
    }
    Some(result)
}
