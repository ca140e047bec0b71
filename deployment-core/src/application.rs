//! # Application
//!
//! An instance tree bound to the component graph it is instantiated from.
//!
//! Applications can be described with plain serde types
//! ([`ApplicationDescription`]): this is what operators register and what the
//! manager persists.

use crate::tree::insert::{try_to_insert_child_instance, InsertionError};
use crate::tree::{hierarchy, path, DetachedTree, Instance, InstanceId, InstanceTree};
use deployment::{Component, Graph, GraphError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("invalid component graph: {0}")]
    Graph(#[from] GraphError),

    #[error("instance '{instance}' references the unknown component '{component}'")]
    UnknownComponent { instance: String, component: String },

    #[error("instance '{instance}' cannot be inserted: {source}")]
    Insertion {
        instance: String,
        #[source]
        source: InsertionError,
    },
}

#[derive(Debug, Clone)]
pub struct Application {
    name: String,
    graph: Arc<Graph>,
    tree: InstanceTree,
}

impl Application {
    pub fn new(name: impl Into<String>, graph: Arc<Graph>) -> Self {
        Self {
            name: name.into(),
            graph,
            tree: InstanceTree::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn tree(&self) -> &InstanceTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut InstanceTree {
        &mut self.tree
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.tree.get(id)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.tree.get_mut(id)
    }

    pub fn find(&self, instance_path: &str) -> Option<InstanceId> {
        path::find_instance_by_path(&self.tree, instance_path)
    }

    pub fn path_of(&self, id: InstanceId) -> String {
        path::compute_instance_path(&self.tree, id)
    }

    pub fn root_of(&self, id: InstanceId) -> InstanceId {
        path::find_root_instance(&self.tree, id)
    }

    pub fn all_instances(&self) -> Vec<InstanceId> {
        hierarchy::get_all_instances(&self.tree)
    }

    /// Inserts a detached subtree through the insertion gate.
    pub fn insert(
        &mut self,
        parent: Option<InstanceId>,
        child: DetachedTree,
    ) -> Result<InstanceId, InsertionError> {
        try_to_insert_child_instance(&mut self.tree, parent, child)
    }

    /// Builds an application and inserts every described instance.
    pub fn from_description(description: &ApplicationDescription) -> Result<Self, DescriptionError> {
        let mut builder = Graph::builder();
        for c in &description.components {
            let mut component = Component::new(&c.name);
            if let Some(alias) = &c.alias {
                component = component.alias(alias);
            }
            if let Some(installer) = &c.installer {
                component = component.installer(installer);
            }
            for (name, value) in &c.exports {
                component = component.export(name, value);
            }
            builder = builder.component(component);
            for child in &c.children {
                builder = builder.child(&c.name, child);
            }
        }

        let mut application = Application::new(&description.name, Arc::new(builder.build()?));
        for root in &description.instances {
            application.insert_description(None, root)?;
        }
        Ok(application)
    }

    fn insert_description(
        &mut self,
        parent: Option<InstanceId>,
        description: &InstanceDescription,
    ) -> Result<InstanceId, DescriptionError> {
        let instance = description.to_instance(&self.graph)?;
        let id = self
            .insert(parent, DetachedTree::single(instance))
            .map_err(|source| DescriptionError::Insertion {
                instance: description.name.clone(),
                source,
            })?;
        for child in &description.children {
            self.insert_description(Some(id), child)?;
        }
        Ok(id)
    }

    /// Describes `id` and its subtree.
    pub fn describe(&self, id: InstanceId) -> Option<InstanceDescription> {
        InstanceDescription::from_tree(&self.tree, id)
    }

    /// Describes the graph and the current tree.
    pub fn to_description(&self) -> ApplicationDescription {
        ApplicationDescription {
            name: self.name.clone(),
            components: self
                .graph
                .components()
                .map(|c| ComponentDescription {
                    name: c.name().to_string(),
                    alias: c.alias_name().map(str::to_string),
                    installer: c.installer_name().map(str::to_string),
                    exports: c
                        .exported_variables()
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                    children: c.children().iter().cloned().collect(),
                })
                .collect(),
            instances: self
                .tree
                .roots()
                .iter()
                .filter_map(|root| InstanceDescription::from_tree(&self.tree, *root))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDescription {
    pub name: String,
    #[serde(default)]
    pub components: Vec<ComponentDescription>,
    #[serde(default)]
    pub instances: Vec<InstanceDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescription {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer: Option<String>,
    #[serde(default)]
    pub exports: BTreeMap<String, String>,
    /// Names of the components admitted as children.
    #[serde(default)]
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescription {
    pub name: String,
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default)]
    pub exports: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<InstanceDescription>,
}

impl InstanceDescription {
    pub fn new(name: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component: component.into(),
            channel: None,
            exports: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: InstanceDescription) -> Self {
        self.children.push(child);
        self
    }

    /// A single instance (children are ignored).
    pub fn to_instance(&self, graph: &Graph) -> Result<Instance, DescriptionError> {
        let component = graph
            .get(&self.component)
            .cloned()
            .ok_or_else(|| DescriptionError::UnknownComponent {
                instance: self.name.clone(),
                component: self.component.clone(),
            })?;

        let mut instance = Instance::new(&self.name).with_component(component);
        if let Some(channel) = &self.channel {
            instance = instance.with_channel(channel);
        }
        for (name, value) in &self.exports {
            instance = instance.with_export(name, value);
        }
        Ok(instance)
    }

    /// Builds a detached tree out of this description and its children.
    pub fn to_detached(&self, graph: &Graph) -> Result<DetachedTree, DescriptionError> {
        let mut detached = DetachedTree::single(self.to_instance(graph)?);
        let root = detached.root();
        let mut to_process: Vec<(InstanceId, &InstanceDescription)> =
            self.children.iter().rev().map(|c| (root, c)).collect();
        while let Some((parent, description)) = to_process.pop() {
            let instance = description.to_instance(graph)?;
            if let Some(id) = detached.tree_mut().insert_child(parent, instance) {
                to_process.extend(description.children.iter().rev().map(|c| (id, c)));
            }
        }
        Ok(detached)
    }

    fn from_tree(tree: &InstanceTree, id: InstanceId) -> Option<Self> {
        let instance = tree.get(id)?;
        let exports: HashMap<_, _> = instance.overridden_exports().clone();
        Some(Self {
            name: instance.name().to_string(),
            component: instance.component_name().unwrap_or_default().to_string(),
            channel: instance.channel().map(str::to_string),
            exports: exports.into_iter().collect(),
            children: instance
                .children()
                .iter()
                .filter_map(|c| Self::from_tree(tree, *c))
                .collect(),
        })
    }
}
