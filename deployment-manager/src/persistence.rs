//! Saved state of the managed applications.
//!
//! Each application is saved as its description (graph and instance tree)
//! plus the runtime status and data of every instance, so a restarted DM
//! knows which machines are alive.

use crate::error::DmError;
use deployment::InstanceStatus;
use deployment_core::fs::{load_state, save_state, StatePaths};
use deployment_core::{Application, ApplicationDescription};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    pub path: String,
    pub component: Option<String>,
    pub status: InstanceStatus,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationState {
    pub description: ApplicationDescription,
    pub instances: Vec<InstanceState>,
}

impl ApplicationState {
    pub fn capture(application: &Application) -> Self {
        let instances = application
            .all_instances()
            .into_iter()
            .filter_map(|id| {
                let instance = application.instance(id)?;
                let data: HashMap<_, _> = instance.data().clone();
                Some(InstanceState {
                    path: application.path_of(id),
                    component: instance.component_name().map(str::to_string),
                    status: instance.status(),
                    data: data.into_iter().collect(),
                })
            })
            .collect();

        Self {
            description: application.to_description(),
            instances,
        }
    }

    /// Rebuilds the application and its runtime state.
    ///
    /// Instances that cannot be found back are skipped with a warning.
    pub fn restore(&self) -> Result<Application, DmError> {
        let mut application = Application::from_description(&self.description)?;
        for state in &self.instances {
            let Some(id) = application.find(&state.path) else {
                warn!(
                    "Saved instance {} is not part of {} anymore",
                    state.path, self.description.name
                );
                continue;
            };
            if let Some(instance) = application.instance_mut(id) {
                instance.set_status(state.status);
                instance.data_mut().extend(state.data.clone());
            }
        }
        Ok(application)
    }
}

/// Reads and writes application states under the configuration directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    paths: StatePaths,
}

impl StateStore {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            paths: StatePaths::new(config_dir.as_ref()),
        }
    }

    pub fn save(&self, state: &ApplicationState) -> Result<(), DmError> {
        let path = self.paths.instances_file(&state.description.name);
        save_state(&path, state).map_err(DmError::Persistence)
    }

    pub fn load(&self, application_name: &str) -> Result<Option<ApplicationState>, DmError> {
        load_state(&self.paths.instances_file(application_name)).map_err(DmError::Persistence)
    }

    /// Loads every saved application.
    ///
    /// A state that cannot be read is logged and skipped: one corrupted file
    /// must not prevent the DM from starting.
    pub fn load_all(&self) -> Result<Vec<Application>, DmError> {
        let mut applications = Vec::new();
        for name in self.paths.saved_applications()? {
            match self.load(&name).and_then(|state| state.map(|s| s.restore()).transpose()) {
                Ok(Some(application)) => {
                    info!("Restored application {}", application.name());
                    applications.push(application);
                }
                Ok(None) => {}
                Err(e) => warn!("Could not restore the application saved under {}: {}", name, e),
            }
        }
        Ok(applications)
    }

    pub fn delete(&self, application_name: &str) -> Result<(), DmError> {
        let dir = self.paths.application_dir(application_name);
        match std::fs::remove_dir_all(&dir) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
