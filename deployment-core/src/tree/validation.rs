//! Runtime validation of an instance tree against its components.
//!
//! Only the structural rules the insertion gate relies on are checked here.

use super::{hierarchy, path, InstanceId, InstanceTree};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    MissingComponent,
    InvalidName,
    DuplicateSiblingName,
    RootRequiresAncestor,
    ComponentNotAdmitted,
    UnknownExport,
}

impl ErrorCode {
    pub fn severity(self) -> Severity {
        match self {
            ErrorCode::UnknownExport => Severity::Warning,
            _ => Severity::Critical,
        }
    }
}

/// A validation finding, attached to the path of the faulty instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelError {
    pub code: ErrorCode,
    pub instance_path: String,
    pub details: String,
}

impl ModelError {
    fn new(code: ErrorCode, instance_path: String, details: impl Into<String>) -> Self {
        Self {
            code,
            instance_path,
            details: details.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn is_critical(&self) -> bool {
        self.severity() == Severity::Critical
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} on {}: {}", self.code, self.instance_path, self.details)
    }
}

impl std::error::Error for ModelError {}

pub fn contains_critical_errors(errors: &[ModelError]) -> bool {
    errors.iter().any(ModelError::is_critical)
}

/// Instance names: letters, digits, spaces, `-`, `_` and `.`.
pub fn is_valid_instance_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '))
}

/// Validates every instance reachable from the roots.
pub fn validate(tree: &InstanceTree) -> Vec<ModelError> {
    let mut errors = Vec::new();
    check_siblings(tree, tree.roots(), &mut errors);

    for id in hierarchy::get_all_instances(tree) {
        let Some(instance) = tree.get(id) else {
            continue;
        };
        let instance_path = path::compute_instance_path(tree, id);

        if !is_valid_instance_name(instance.name()) {
            errors.push(ModelError::new(
                ErrorCode::InvalidName,
                instance_path.clone(),
                format!("'{}' is not a valid instance name", instance.name()),
            ));
        }
        check_siblings(tree, instance.children(), &mut errors);

        let Some(component) = instance.component() else {
            errors.push(ModelError::new(
                ErrorCode::MissingComponent,
                instance_path,
                "no component is associated with this instance",
            ));
            continue;
        };

        for name in instance.overridden_exports().keys() {
            if !component.exported_variables().contains_key(name) {
                errors.push(ModelError::new(
                    ErrorCode::UnknownExport,
                    instance_path.clone(),
                    format!("'{name}' is not exported by {}", component.name()),
                ));
            }
        }

        match instance.parent().and_then(|p| tree.get(p)) {
            None if !component.is_root() => errors.push(ModelError::new(
                ErrorCode::RootRequiresAncestor,
                instance_path,
                format!("{} cannot be instantiated as a root", component.name()),
            )),
            Some(parent) => {
                if let Some(parent_component) = parent.component() {
                    if !parent_component.admits(component.name()) {
                        errors.push(ModelError::new(
                            ErrorCode::ComponentNotAdmitted,
                            instance_path,
                            format!(
                                "{} does not accept {} as a child",
                                parent_component.name(),
                                component.name()
                            ),
                        ));
                    }
                }
            }
            None => {}
        }
    }
    errors
}

fn check_siblings(tree: &InstanceTree, siblings: &[InstanceId], errors: &mut Vec<ModelError>) {
    let mut seen = HashSet::new();
    for id in siblings {
        let Some(instance) = tree.get(*id) else {
            continue;
        };
        if !seen.insert(instance.name()) {
            errors.push(ModelError::new(
                ErrorCode::DuplicateSiblingName,
                path::compute_instance_path(tree, *id),
                "another instance has the same path",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Instance;
    use deployment::Graph;

    fn graph() -> Graph {
        Graph::builder()
            .component(deployment::Component::new("vm"))
            .component(deployment::Component::new("tomcat").export("port", "8080"))
            .component(deployment::Component::new("war"))
            .child("vm", "tomcat")
            .child("tomcat", "war")
            .build()
            .unwrap()
    }

    #[test]
    fn test_valid_tree() {
        let graph = graph();
        let mut tree = InstanceTree::new();
        let vm = tree.add_root(Instance::new("vm 1").with_component(graph.get("vm").unwrap().clone()));
        let tomcat = tree
            .insert_child(
                vm,
                Instance::new("tomcat")
                    .with_component(graph.get("tomcat").unwrap().clone())
                    .with_export("port", "9090"),
            )
            .unwrap();
        tree.insert_child(tomcat, Instance::new("app.war").with_component(graph.get("war").unwrap().clone()))
            .unwrap();

        assert!(validate(&tree).is_empty());
    }

    #[test]
    fn test_critical_findings() {
        let graph = graph();
        let mut tree = InstanceTree::new();
        let vm = tree.add_root(Instance::new("vm").with_component(graph.get("vm").unwrap().clone()));
        tree.insert_child(vm, Instance::new("app").with_component(graph.get("war").unwrap().clone()))
            .unwrap();
        tree.add_root(Instance::new("vm").with_component(graph.get("vm").unwrap().clone()));
        tree.add_root(Instance::new("tomcat").with_component(graph.get("tomcat").unwrap().clone()));
        tree.add_root(Instance::new("bad/name"));

        let codes: Vec<ErrorCode> = validate(&tree).into_iter().map(|e| e.code).collect();
        assert!(codes.contains(&ErrorCode::ComponentNotAdmitted));
        assert!(codes.contains(&ErrorCode::DuplicateSiblingName));
        assert!(codes.contains(&ErrorCode::RootRequiresAncestor));
        assert!(codes.contains(&ErrorCode::InvalidName));
        assert!(codes.contains(&ErrorCode::MissingComponent));
    }

    #[test]
    fn test_unknown_export_is_only_a_warning() {
        let graph = graph();
        let mut tree = InstanceTree::new();
        tree.add_root(
            Instance::new("vm")
                .with_component(graph.get("vm").unwrap().clone())
                .with_export("nope", "1"),
        );

        let errors = validate(&tree);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].severity(), Severity::Warning);
        assert!(!contains_critical_errors(&errors));
    }
}
