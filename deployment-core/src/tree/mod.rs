//! # Instance Tree
//!
//! The in-memory deployment topology of one application.
//!
//! Instances live in an arena and reference each other through [`InstanceId`]s,
//! so parent back-links never form ownership cycles. Slots are never reused:
//! an id that was valid once either still designates the same instance or
//! resolves to nothing.

pub mod duplicate;
pub mod hierarchy;
pub mod insert;
pub mod path;
pub mod validation;

use deployment::{Component, Imports, InstanceStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Stable identifier of an instance inside one [`InstanceTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(usize);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node of the deployment tree.
///
/// `parent` and `children` are maintained by the owning [`InstanceTree`] only.
#[derive(Debug, Clone, Default)]
pub struct Instance {
    name: String,
    component: Option<Arc<Component>>,
    channel: Option<String>,
    status: InstanceStatus,
    overridden_exports: HashMap<String, String>,
    data: HashMap<String, String>,
    imports: Imports,
    parent: Option<InstanceId>,
    children: Vec<InstanceId>,
}

impl Instance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_component(mut self, component: Arc<Component>) -> Self {
        self.component = Some(component);
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_export(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overridden_exports.insert(name.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component(&self) -> Option<&Arc<Component>> {
        self.component.as_ref()
    }

    pub fn component_name(&self) -> Option<&str> {
        self.component.as_deref().map(Component::name)
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn status(&self) -> InstanceStatus {
        self.status
    }

    pub fn set_status(&mut self, status: InstanceStatus) {
        self.status = status;
    }

    pub fn overridden_exports(&self) -> &HashMap<String, String> {
        &self.overridden_exports
    }

    pub fn overridden_exports_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.overridden_exports
    }

    pub fn data(&self) -> &HashMap<String, String> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.data
    }

    pub fn imports(&self) -> &Imports {
        &self.imports
    }

    /// Replaces every import with the ones reported by the agent.
    pub fn replace_imports(&mut self, imports: Imports) {
        self.imports = imports;
    }

    pub fn parent(&self) -> Option<InstanceId> {
        self.parent
    }

    pub fn children(&self) -> &[InstanceId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Component defaults, overridden by the instance's own exports.
    pub fn exported_variables(&self) -> HashMap<String, String> {
        let mut result = self
            .component
            .as_ref()
            .map(|c| c.exported_variables().clone())
            .unwrap_or_default();
        result.extend(
            self.overridden_exports
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        result
    }

    /// A fresh node carrying only the blueprint fields of `self`.
    fn blueprint(&self, name: String) -> Self {
        Self {
            name,
            component: self.component.clone(),
            channel: self.channel.clone(),
            overridden_exports: self.overridden_exports.clone(),
            ..Self::default()
        }
    }
}

/// Arena of instances plus the ordered list of root instances.
#[derive(Debug, Clone, Default)]
pub struct InstanceTree {
    slots: Vec<Option<Instance>>,
    roots: Vec<InstanceId>,
    live: usize,
}

impl InstanceTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: InstanceId) -> Option<&Instance> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.get(id).is_some()
    }

    pub fn roots(&self) -> &[InstanceId] {
        &self.roots
    }

    /// Number of instances held by the arena.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn parent_of(&self, id: InstanceId) -> Option<InstanceId> {
        self.get(id).and_then(Instance::parent)
    }

    pub fn children_of(&self, id: InstanceId) -> &[InstanceId] {
        self.get(id).map(Instance::children).unwrap_or(&[])
    }

    /// Instances sharing a parent with a would-be child of `parent` (the roots when `None`).
    pub fn siblings(&self, parent: Option<InstanceId>) -> &[InstanceId] {
        match parent {
            Some(p) => self.children_of(p),
            None => &self.roots,
        }
    }

    /// Name lookup among the direct children of `parent` (the roots when `None`).
    pub fn child_named(&self, parent: Option<InstanceId>, name: &str) -> Option<InstanceId> {
        self.siblings(parent)
            .iter()
            .copied()
            .find(|id| self.get(*id).is_some_and(|i| i.name() == name))
    }

    fn allocate(&mut self, mut instance: Instance, parent: Option<InstanceId>) -> InstanceId {
        let id = InstanceId(self.slots.len());
        instance.parent = parent;
        instance.children.clear();
        self.slots.push(Some(instance));
        self.live += 1;
        id
    }

    /// Empties the slot of `id`. Ids are never handed out again.
    fn release(&mut self, id: InstanceId) -> Option<Instance> {
        let instance = self.slots.get_mut(id.0).and_then(Option::take)?;
        self.live -= 1;
        Some(instance)
    }

    /// Appends a root instance without any check.
    ///
    /// Live trees should go through [`insert::try_to_insert_child_instance`].
    pub fn add_root(&mut self, instance: Instance) -> InstanceId {
        let id = self.allocate(instance, None);
        self.roots.push(id);
        id
    }

    /// Attaches `instance` under `parent` without any check.
    ///
    /// Returns `None` when `parent` does not exist.
    pub fn insert_child(&mut self, parent: InstanceId, instance: Instance) -> Option<InstanceId> {
        if !self.contains(parent) {
            return None;
        }
        let id = self.allocate(instance, Some(parent));
        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
        }
        Some(id)
    }

    /// Unlinks `id` from its parent (or from the roots).
    ///
    /// The subtree stays in the arena but becomes unreachable from the roots.
    /// Returns `false` if the instance was already detached or does not exist.
    pub fn detach(&mut self, id: InstanceId) -> bool {
        let Some(parent) = self.get(id).map(Instance::parent) else {
            return false;
        };
        let removed = match parent {
            Some(p) => match self.get_mut(p) {
                Some(parent_instance) => remove_id(&mut parent_instance.children, id),
                None => false,
            },
            None => remove_id(&mut self.roots, id),
        };
        if let Some(instance) = self.get_mut(id) {
            instance.parent = None;
        }
        removed
    }

    /// Moves the subtree rooted at `id` out of this tree.
    pub fn extract(&mut self, id: InstanceId) -> Option<DetachedTree> {
        if !self.contains(id) {
            return None;
        }
        self.detach(id);

        let order = hierarchy::build_hierarchical_list(self, id);
        let mut detached = InstanceTree::new();
        let mut mapping: HashMap<InstanceId, InstanceId> = HashMap::new();
        for old_id in order {
            let Some(instance) = self.release(old_id) else {
                continue;
            };
            let new_parent = instance.parent.and_then(|p| mapping.get(&p).copied());
            let new_id = match new_parent {
                Some(p) => detached.insert_child(p, instance),
                None => Some(detached.add_root(instance)),
            };
            if let Some(new_id) = new_id {
                mapping.insert(old_id, new_id);
            }
        }

        let root = mapping.get(&id).copied()?;
        Some(DetachedTree {
            tree: detached,
            root,
        })
    }

    /// Moves a detached subtree into this tree, under `parent` or as a new root.
    ///
    /// Returns the id of the grafted subtree root, or `None` when `parent` does not exist.
    pub fn graft(&mut self, parent: Option<InstanceId>, subtree: DetachedTree) -> Option<InstanceId> {
        if let Some(p) = parent {
            if !self.contains(p) {
                return None;
            }
        }

        let DetachedTree { mut tree, root } = subtree;
        let order = hierarchy::build_hierarchical_list(&tree, root);
        let mut mapping: HashMap<InstanceId, InstanceId> = HashMap::new();
        for old_id in order {
            let Some(instance) = tree.release(old_id) else {
                continue;
            };
            let target_parent = if old_id == root {
                parent
            } else {
                instance.parent.and_then(|p| mapping.get(&p).copied())
            };
            let new_id = match target_parent {
                Some(p) => self.insert_child(p, instance),
                None => Some(self.add_root(instance)),
            };
            if let Some(new_id) = new_id {
                mapping.insert(old_id, new_id);
            }
        }
        mapping.get(&root).copied()
    }
}

fn remove_id(list: &mut Vec<InstanceId>, id: InstanceId) -> bool {
    let before = list.len();
    list.retain(|x| *x != id);
    before != list.len()
}

/// A tree with a single root that is not (yet) part of any application.
///
/// Produced by the duplication engine and by [`InstanceTree::extract`].
#[derive(Debug, Clone)]
pub struct DetachedTree {
    tree: InstanceTree,
    root: InstanceId,
}

impl DetachedTree {
    /// A detached tree made of a single instance.
    pub fn single(instance: Instance) -> Self {
        let mut tree = InstanceTree::new();
        let root = tree.add_root(instance);
        Self { tree, root }
    }

    pub(crate) fn from_parts(tree: InstanceTree, root: InstanceId) -> Self {
        Self { tree, root }
    }

    pub fn tree(&self) -> &InstanceTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut InstanceTree {
        &mut self.tree
    }

    pub fn root(&self) -> InstanceId {
        self.root
    }

    pub fn root_instance(&self) -> Option<&Instance> {
        self.tree.get(self.root)
    }

    pub fn root_name(&self) -> &str {
        self.root_instance().map(Instance::name).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
