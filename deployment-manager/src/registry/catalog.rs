//! In-memory catalog of the managed applications.
//!
//! It is pure data: persistence and messaging live in the manager.

use crate::error::DmError;
use crate::managed::ManagedApplication;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

/// One application behind its exclusive section.
pub type SharedApplication = Arc<Mutex<ManagedApplication>>;

/// The applications known to the DM, by name.
///
/// Cloning is cheap and every clone sees the same catalog.
#[derive(Debug, Default, Clone)]
pub struct ApplicationRegistry {
    applications: Arc<RwLock<BTreeMap<String, SharedApplication>>>,
}

impl ApplicationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an application.
    ///
    /// # Returns
    ///
    /// The shared handle, or [`DmError::InvalidParameter`] if the name is taken.
    pub fn register(&self, application: ManagedApplication) -> Result<SharedApplication, DmError> {
        let mut map = self
            .applications
            .write()
            .map_err(|_| DmError::internal("application registry lock poisoned"))?;
        let name = application.name().to_string();
        if map.contains_key(&name) {
            return Err(DmError::InvalidParameter(format!(
                "application {} already exists",
                name
            )));
        }
        let shared = Arc::new(Mutex::new(application));
        map.insert(name, shared.clone());
        Ok(shared)
    }

    pub fn get(&self, name: &str) -> Result<SharedApplication, DmError> {
        self.applications
            .read()
            .map_err(|_| DmError::internal("application registry lock poisoned"))?
            .get(name)
            .cloned()
            .ok_or_else(|| DmError::ApplicationNotFound(name.to_string()))
    }

    pub fn remove(&self, name: &str) -> Result<SharedApplication, DmError> {
        self.applications
            .write()
            .map_err(|_| DmError::internal("application registry lock poisoned"))?
            .remove(name)
            .ok_or_else(|| DmError::ApplicationNotFound(name.to_string()))
    }

    /// Sorted application names.
    pub fn names(&self) -> Vec<String> {
        match self.applications.read() {
            Ok(map) => map.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        }
    }

    pub fn all(&self) -> Vec<SharedApplication> {
        match self.applications.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        }
    }
}
