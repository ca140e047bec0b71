//! # Manager
//!
//! Entry point of every operation on the managed applications, whether it
//! comes from an operator (REST API) or from a workflow triggered by agents.
//!
//! Each application sits behind its own mutex. Guards are only held for
//! in-memory work: provisioning and messaging happen after they are dropped,
//! so a slow IaaS never blocks the processing of notifications.

mod bulk;
mod operations;
mod queries;
mod restore;

pub use restore::{StagedCopy, Staging};
pub(crate) use restore::destination_names;

use crate::error::DmError;
use crate::event_bus::{DmEvent, EventBus};
use crate::gateway::AgentGateway;
use crate::managed::{ManagedApplication, DEFAULT_MISSED_HEARTBEATS_THRESHOLD};
use crate::persistence::{ApplicationState, StateStore};
use crate::registry::{ApplicationRegistry, SharedApplication};
use agent_protocol::Command;
use deployment::{DeletePolicy, IaasProvider, InstanceStatus};
use deployment_core::{Application, ApplicationDescription, InstanceId};
use log::{debug, info, warn};
use std::str::FromStr;
use std::sync::{Arc, MutexGuard};

/// Single-instance actions of the REST API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Deploy,
    Start,
    Stop,
    Undeploy,
    Remove,
    Backup,
}

impl FromStr for Action {
    type Err = DmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deploy" => Ok(Action::Deploy),
            "start" => Ok(Action::Start),
            "stop" => Ok(Action::Stop),
            "undeploy" => Ok(Action::Undeploy),
            "remove" => Ok(Action::Remove),
            "backup" => Ok(Action::Backup),
            other => Err(DmError::InvalidParameter(format!("Invalid action: {}", other))),
        }
    }
}

pub struct Manager {
    registry: ApplicationRegistry,
    gateway: Arc<dyn AgentGateway>,
    iaas: Arc<dyn IaasProvider>,
    store: StateStore,
    events: EventBus,
    missed_heartbeats_threshold: u32,
}

impl Manager {
    pub fn new(
        gateway: Arc<dyn AgentGateway>,
        iaas: Arc<dyn IaasProvider>,
        store: StateStore,
        events: EventBus,
    ) -> Self {
        Self {
            registry: ApplicationRegistry::new(),
            gateway,
            iaas,
            store,
            events,
            missed_heartbeats_threshold: DEFAULT_MISSED_HEARTBEATS_THRESHOLD,
        }
    }

    pub fn with_missed_heartbeats_threshold(mut self, threshold: u32) -> Self {
        self.missed_heartbeats_threshold = threshold;
        self
    }

    pub fn registry(&self) -> &ApplicationRegistry {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn application(&self, name: &str) -> Result<SharedApplication, DmError> {
        self.registry.get(name)
    }

    /// Registers an application and saves its initial state.
    pub fn register_application(
        &self,
        description: &ApplicationDescription,
    ) -> Result<SharedApplication, DmError> {
        let application = Application::from_description(description)?;
        let shared = self.adopt(application)?;
        self.save(&shared)?;
        Ok(shared)
    }

    /// Loads the applications saved by a previous run.
    ///
    /// # Returns
    ///
    /// The number of applications restored.
    pub fn restore_saved_applications(&self) -> Result<usize, DmError> {
        let mut count = 0;
        for application in self.store.load_all()? {
            match self.adopt(application) {
                Ok(_) => count += 1,
                Err(e) => warn!("A saved application was ignored: {}", e),
            }
        }
        Ok(count)
    }

    fn adopt(&self, application: Application) -> Result<SharedApplication, DmError> {
        let name = application.name().to_string();
        let managed =
            ManagedApplication::with_threshold(application, self.missed_heartbeats_threshold);
        let shared = self.registry.register(managed)?;
        info!("Application {} is now managed", name);
        self.events
            .publish(DmEvent::ApplicationRegistered { application: name });
        Ok(shared)
    }

    /// Saves the current state of an application.
    pub fn save(&self, app: &SharedApplication) -> Result<(), DmError> {
        let state = {
            let ma = lock(app)?;
            ApplicationState::capture(ma.application())
        };
        self.store.save(&state)
    }

    /// Resolves an application and one of its instances.
    pub fn resolve(
        &self,
        application_name: &str,
        instance_path: &str,
    ) -> Result<(SharedApplication, InstanceId), DmError> {
        let app = self.registry.get(application_name)?;
        let id = lock(&app)?
            .application()
            .find(instance_path)
            .ok_or_else(|| DmError::InstanceNotFound(instance_path.to_string()))?;
        Ok((app, id))
    }

    /// Resolves an optional instance path: `None` stands for the whole application.
    pub(crate) fn resolve_scope(
        &self,
        application_name: &str,
        instance_path: Option<&str>,
    ) -> Result<(SharedApplication, Option<InstanceId>), DmError> {
        match instance_path {
            Some(path) => {
                let (app, id) = self.resolve(application_name, path)?;
                Ok((app, Some(id)))
            }
            None => Ok((self.registry.get(application_name)?, None)),
        }
    }

    /// Changes the status of an instance and publishes the change.
    pub(crate) fn set_status(
        &self,
        ma: &mut ManagedApplication,
        id: InstanceId,
        new_status: InstanceStatus,
    ) {
        let instance_path = ma.application().path_of(id);
        let application = ma.name().to_string();
        let Some(instance) = ma.application_mut().instance_mut(id) else {
            return;
        };
        let old_status = instance.status();
        if old_status == new_status {
            return;
        }
        instance.set_status(new_status);
        debug!("{} in {}: {} -> {}", instance_path, application, old_status, new_status);
        self.events.publish(DmEvent::StatusChanged {
            application,
            instance_path,
            old_status,
            new_status,
        });
    }

    /// Sends a command to the agent hosting `target`.
    ///
    /// The command is queued until the machine is `DEPLOYED_STARTED`.
    pub async fn send(
        &self,
        app: &SharedApplication,
        target: InstanceId,
        command: Command,
    ) -> Result<(), DmError> {
        let (application_name, outbound) = {
            let mut ma = lock(app)?;
            if ma.application().instance(target).is_none() {
                return Err(DmError::InstanceNotFound(command.instance_path()));
            }
            let outbound = ma.dispatch(target, command);
            (ma.name().to_string(), outbound)
        };

        if let Some(outbound) = outbound {
            self.gateway
                .send(&application_name, &outbound.root_instance_name, outbound.command)
                .await
                .map_err(DmError::Messaging)?;
        }
        Ok(())
    }

    /// Sends the commands queued for the machine hosting `root`.
    ///
    /// Nothing is sent unless the machine is `DEPLOYED_STARTED`. When a send
    /// fails, the unsent commands are queued again in their original order.
    ///
    /// # Returns
    ///
    /// The number of commands sent.
    pub async fn flush_awaiting_messages(
        &self,
        app: &SharedApplication,
        root: InstanceId,
    ) -> Result<usize, DmError> {
        let (application_name, root_instance_name, commands) = {
            let mut ma = lock(app)?;
            let Some(instance) = ma.application().instance(root) else {
                return Ok(0);
            };
            if instance.status() != InstanceStatus::DeployedStarted {
                return Ok(0);
            }
            let root_instance_name = instance.name().to_string();
            let commands = ma.remove_awaiting_messages(root);
            (ma.name().to_string(), root_instance_name, commands)
        };

        let mut sent = 0;
        let mut pending = commands.into_iter();
        while let Some(command) = pending.next() {
            if let Err(e) = self
                .gateway
                .send(&application_name, &root_instance_name, command.clone())
                .await
            {
                let mut ma = lock(app)?;
                let queued_meanwhile = ma.remove_awaiting_messages(root);
                for command in std::iter::once(command).chain(pending).chain(queued_meanwhile) {
                    ma.store_awaiting_message(root, command);
                }
                return Err(DmError::Messaging(e));
            }
            sent += 1;
        }

        if sent > 0 {
            info!(
                "{} awaiting message(s) sent to {} in {}",
                sent, root_instance_name, application_name
            );
        }
        Ok(sent)
    }

    /// Flushes every started machine that has queued commands.
    pub async fn flush_all(&self) {
        for app in self.registry.all() {
            let roots = match lock(&app) {
                Ok(ma) => ma.roots_with_awaiting_messages(),
                Err(e) => {
                    warn!("{}", e);
                    continue;
                }
            };
            for root in roots {
                if let Err(e) = self.flush_awaiting_messages(&app, root).await {
                    warn!("Awaiting messages could not be sent: {}", e);
                }
            }
        }
    }

    /// One liveness tick over every application.
    pub fn check_states(&self) {
        for app in self.registry.all() {
            let flagged = {
                let Ok(mut ma) = lock(&app) else {
                    continue;
                };
                let flagged = ma.check_states();
                for root in &flagged {
                    let root_instance = ma
                        .application()
                        .instance(*root)
                        .map(|i| i.name().to_string())
                        .unwrap_or_default();
                    warn!(
                        "{} in {} missed too many heartbeats, it is now in PROBLEM",
                        root_instance,
                        ma.name()
                    );
                    self.events.publish(DmEvent::StatusChanged {
                        application: ma.name().to_string(),
                        instance_path: ma.application().path_of(*root),
                        old_status: InstanceStatus::DeployedStarted,
                        new_status: InstanceStatus::Problem,
                    });
                    self.events.publish(DmEvent::MachineProblem {
                        application: ma.name().to_string(),
                        root_instance,
                    });
                }
                !flagged.is_empty()
            };
            if flagged {
                if let Err(e) = self.save(&app) {
                    warn!("{}", e);
                }
            }
        }
    }
}

/// Locks one application.
pub(crate) fn lock(app: &SharedApplication) -> Result<MutexGuard<'_, ManagedApplication>, DmError> {
    app.lock()
        .map_err(|_| DmError::internal("application lock poisoned"))
}

/// Validates a `delete-old-root` parameter.
pub fn parse_policy(value: Option<&str>) -> Result<DeletePolicy, DmError> {
    let value = value.ok_or_else(|| {
        DmError::InvalidParameter("Missing 'delete-old-root' parameter".to_string())
    })?;
    Ok(value.parse()?)
}

/// Status of an existing instance.
pub(crate) fn status_of(ma: &ManagedApplication, id: InstanceId) -> Result<InstanceStatus, DmError> {
    ma.application()
        .instance(id)
        .map(|i| i.status())
        .ok_or_else(|| DmError::InstanceNotFound(ma.application().path_of(id)))
}

#[cfg(test)]
mod tests;
