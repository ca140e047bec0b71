use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Variables exported by another instance and received by an importing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Path of the exporting instance.
    pub instance_path: String,
    /// Component (or facet) the exported variables belong to.
    pub component_name: String,
    pub exported_vars: BTreeMap<String, String>,
}

impl Import {
    pub fn new(instance_path: impl Into<String>, component_name: impl Into<String>) -> Self {
        Self {
            instance_path: instance_path.into(),
            component_name: component_name.into(),
            exported_vars: BTreeMap::new(),
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.exported_vars.insert(name.into(), value.into());
        self
    }
}

/// Imports of an instance, keyed by component or facet name.
pub type Imports = HashMap<String, Vec<Import>>;
