//! Read-only views for operators.

use super::{lock, Manager};
use crate::error::DmError;
use agent_protocol::InstanceSnapshot;
use deployment_core::tree::hierarchy::build_hierarchical_list;
use deployment_core::InstanceDescription;

impl Manager {
    /// Children of an instance (or the roots), sorted by path.
    ///
    /// With `all_children`, the whole subtree is listed instead of the
    /// direct children.
    pub fn list_children(
        &self,
        application_name: &str,
        instance_path: Option<&str>,
        all_children: bool,
    ) -> Result<Vec<InstanceSnapshot>, DmError> {
        let (app, parent) = self.resolve_scope(application_name, instance_path)?;
        let ma = lock(&app)?;
        let application = ma.application();

        let ids = match (parent, all_children) {
            (None, true) => application.all_instances(),
            (None, false) => application.tree().roots().to_vec(),
            (Some(parent), true) => build_hierarchical_list(application.tree(), parent)
                .into_iter()
                .skip(1)
                .collect(),
            (Some(parent), false) => application.tree().children_of(parent).to_vec(),
        };

        let mut snapshots: Vec<InstanceSnapshot> = ids
            .into_iter()
            .filter_map(|id| InstanceSnapshot::capture(application, id))
            .collect();
        snapshots.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(snapshots)
    }

    /// Names of the components of an application.
    pub fn components(&self, application_name: &str) -> Result<Vec<String>, DmError> {
        let app = self.application(application_name)?;
        let ma = lock(&app)?;
        let mut names: Vec<String> = ma
            .application()
            .graph()
            .components()
            .map(|c| c.name().to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Components that can be instantiated under an instance (or as roots).
    pub fn possibilities(
        &self,
        application_name: &str,
        instance_path: Option<&str>,
    ) -> Result<Vec<String>, DmError> {
        let (app, parent) = self.resolve_scope(application_name, instance_path)?;
        let ma = lock(&app)?;
        let application = ma.application();

        let components = match parent {
            None => application.graph().root_components(),
            Some(parent) => {
                let component = application
                    .instance(parent)
                    .and_then(|i| i.component_name())
                    .unwrap_or_default();
                application.graph().children_of(component)
            }
        };
        let mut names: Vec<String> = components.iter().map(|c| c.name().to_string()).collect();
        names.sort();
        Ok(names)
    }

    /// Paths of the instances that can host a new instance of `component`.
    pub fn possible_parents(
        &self,
        application_name: &str,
        component: &str,
    ) -> Result<Vec<String>, DmError> {
        let app = self.application(application_name)?;
        let ma = lock(&app)?;
        let application = ma.application();
        if application.graph().get(component).is_none() {
            return Err(DmError::InvalidParameter(format!("Unknown component: {}", component)));
        }

        let mut paths: Vec<String> = application
            .all_instances()
            .into_iter()
            .filter(|id| {
                application
                    .instance(*id)
                    .and_then(|i| i.component())
                    .is_some_and(|c| c.admits(component))
            })
            .map(|id| application.path_of(id))
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// A blank instance of `component`, to be named and filled by the operator.
    pub fn new_instance(
        &self,
        application_name: &str,
        component: &str,
    ) -> Result<InstanceDescription, DmError> {
        let app = self.application(application_name)?;
        let ma = lock(&app)?;
        let component = ma
            .application()
            .graph()
            .get(component)
            .ok_or_else(|| DmError::InvalidParameter(format!("Unknown component: {}", component)))?;

        let mut description = InstanceDescription::new("", component.name());
        description.exports = component
            .exported_variables()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(description)
    }
}
