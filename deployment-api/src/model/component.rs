//! The component graph: the type system instances are created from.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// A component definition.
///
/// Components are shared by every instance created from them and are never
/// mutated through an instance. Hierarchy edges are stored by name so that the
/// graph can be cloned and serialized without reference cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    name: String,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    installer_name: Option<String>,
    #[serde(default)]
    exported_variables: HashMap<String, String>,
    /// Components that may be instantiated directly under this one.
    #[serde(default)]
    children: BTreeSet<String>,
    /// Components this one may be instantiated under. Computed by [`GraphBuilder`].
    #[serde(default)]
    ancestors: BTreeSet<String>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            installer_name: None,
            exported_variables: HashMap::new(),
            children: BTreeSet::new(),
            ancestors: BTreeSet::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn installer(mut self, installer_name: impl Into<String>) -> Self {
        self.installer_name = Some(installer_name.into());
        self
    }

    pub fn export(mut self, name: impl Into<String>, default_value: impl Into<String>) -> Self {
        self.exported_variables
            .insert(name.into(), default_value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn installer_name(&self) -> Option<&str> {
        self.installer_name.as_deref()
    }

    pub fn exported_variables(&self) -> &HashMap<String, String> {
        &self.exported_variables
    }

    pub fn children(&self) -> &BTreeSet<String> {
        &self.children
    }

    pub fn ancestors(&self) -> &BTreeSet<String> {
        &self.ancestors
    }

    /// Whether an instance of `child` may be placed under an instance of this component.
    pub fn admits(&self, child: &str) -> bool {
        self.children.contains(child)
    }

    /// Root components have no required ancestor: their instances are machines.
    pub fn is_root(&self) -> bool {
        self.ancestors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("component '{0}' is declared twice")]
    DuplicateComponent(String),

    #[error("hierarchy edge {parent} -> {child} references an unknown component")]
    UnknownComponent { parent: String, child: String },
}

/// An immutable component graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    components: BTreeMap<String, Arc<Component>>,
}

impl Graph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Component>> {
        self.components.get(name)
    }

    /// All components, ordered by name.
    pub fn components(&self) -> impl Iterator<Item = &Arc<Component>> {
        self.components.values()
    }

    /// Components whose instances can be root instances.
    pub fn root_components(&self) -> Vec<Arc<Component>> {
        self.components
            .values()
            .filter(|c| c.is_root())
            .cloned()
            .collect()
    }

    /// Components that may be instantiated under `parent`.
    pub fn children_of(&self, parent: &str) -> Vec<Arc<Component>> {
        self.get(parent)
            .map(|p| {
                p.children()
                    .iter()
                    .filter_map(|name| self.get(name).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Collects components and hierarchy edges, then freezes them into a [`Graph`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    components: Vec<Component>,
    edges: Vec<(String, String)>,
}

impl GraphBuilder {
    pub fn component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    /// Declares that `child` instances may live under `parent` instances.
    pub fn child(mut self, parent: impl Into<String>, child: impl Into<String>) -> Self {
        self.edges.push((parent.into(), child.into()));
        self
    }

    pub fn build(self) -> Result<Graph, GraphError> {
        let mut by_name: BTreeMap<String, Component> = BTreeMap::new();
        for component in self.components {
            if by_name.contains_key(component.name()) {
                return Err(GraphError::DuplicateComponent(component.name));
            }
            by_name.insert(component.name.clone(), component);
        }

        for (parent, child) in self.edges {
            if !by_name.contains_key(&parent) || !by_name.contains_key(&child) {
                return Err(GraphError::UnknownComponent { parent, child });
            }
            if let Some(p) = by_name.get_mut(&parent) {
                p.children.insert(child.clone());
            }
            if let Some(c) = by_name.get_mut(&child) {
                c.ancestors.insert(parent);
            }
        }

        Ok(Graph {
            components: by_name
                .into_iter()
                .map(|(name, component)| (name, Arc::new(component)))
                .collect(),
        })
    }
}
