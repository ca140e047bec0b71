//! Operations on a single instance.

use super::{lock, status_of, Action, Manager};
use crate::error::DmError;
use crate::event_bus::DmEvent;
use crate::registry::SharedApplication;
use agent_protocol::Command;
use deployment::{DeletePolicy, InstanceStatus, MachineRequest, IP_ADDRESS, MACHINE_ID};
use deployment_core::{InstanceDescription, InstanceId};
use log::{info, warn};

/// Authorization rule of a lifecycle action on a non-root instance.
struct Rule {
    action: &'static str,
    allows: fn(InstanceStatus) -> bool,
    /// Transitional status set before the command is sent.
    next: Option<InstanceStatus>,
}

const DEPLOY: Rule = Rule {
    action: "deployed",
    allows: is_not_deployed,
    next: Some(InstanceStatus::Deploying),
};

const START: Rule = Rule {
    action: "started",
    allows: is_stopped,
    next: Some(InstanceStatus::Starting),
};

const STOP: Rule = Rule {
    action: "stopped",
    allows: is_started,
    next: Some(InstanceStatus::Stopping),
};

const UNDEPLOY: Rule = Rule {
    action: "undeployed",
    allows: is_not_undeployed,
    next: Some(InstanceStatus::Undeploying),
};

const BACKUP: Rule = Rule {
    action: "backed up",
    allows: is_deployed,
    next: None,
};

const MIGRATE: Rule = Rule {
    action: "migrated",
    allows: is_deployed,
    next: None,
};

fn is_not_deployed(status: InstanceStatus) -> bool {
    status == InstanceStatus::NotDeployed
}

fn is_not_undeployed(status: InstanceStatus) -> bool {
    status != InstanceStatus::NotDeployed
}

fn is_stopped(status: InstanceStatus) -> bool {
    status == InstanceStatus::DeployedStopped
}

fn is_started(status: InstanceStatus) -> bool {
    status == InstanceStatus::DeployedStarted
}

fn is_deployed(status: InstanceStatus) -> bool {
    status.is_deployed()
}

impl Manager {
    /// Runs a single-instance action of the REST API.
    pub async fn perform(
        &self,
        application_name: &str,
        action: Action,
        instance_path: &str,
    ) -> Result<(), DmError> {
        let (app, id) = self.resolve(application_name, instance_path)?;
        match action {
            Action::Deploy => self.deploy(&app, id).await,
            Action::Start => self.start(&app, id).await,
            Action::Stop => self.stop(&app, id).await,
            Action::Undeploy => self.undeploy(&app, id).await,
            Action::Remove => self.remove_instance(&app, id).await,
            Action::Backup => self.backup(&app, id).await,
        }
    }

    /// Adds an instance (and its children) under `parent_path`, or as a root.
    ///
    /// # Returns
    ///
    /// The path of the new instance.
    pub async fn add_instance(
        &self,
        application_name: &str,
        parent_path: Option<&str>,
        description: &InstanceDescription,
    ) -> Result<String, DmError> {
        let (app, parent) = self.resolve_scope(application_name, parent_path)?;
        let instance_path = {
            let mut ma = lock(&app)?;
            let detached = description.to_detached(ma.application().graph())?;
            let id = ma.application_mut().insert(parent, detached)?;
            ma.application().path_of(id)
        };

        info!("Instance {} was added to {}", instance_path, application_name);
        self.events.publish(DmEvent::InstanceAdded {
            application: application_name.to_string(),
            instance_path: instance_path.clone(),
        });
        self.save(&app)?;

        // Running machines learn about their new children
        if let (Some(parent), Some(parent_path)) = (parent, parent_path) {
            self.send(
                &app,
                parent,
                Command::AddInstance {
                    parent_path: parent_path.to_string(),
                    instance: description.clone(),
                },
            )
            .await?;
        }
        Ok(instance_path)
    }

    /// Removes an instance and its subtree from the model.
    ///
    /// Every instance of the subtree must be `NOT_DEPLOYED`.
    pub async fn remove_instance(
        &self,
        app: &SharedApplication,
        id: InstanceId,
    ) -> Result<(), DmError> {
        let (application_name, instance_path, parent) = {
            let mut ma = lock(app)?;
            let subtree = ma.subtree(id);
            if let Some(deployed) = subtree.iter().find(|d| {
                ma.application()
                    .instance(**d)
                    .is_some_and(|i| i.status() != InstanceStatus::NotDeployed)
            }) {
                return Err(DmError::unauthorized(format!(
                    "{} must be undeployed before being removed",
                    ma.application().path_of(*deployed)
                )));
            }

            let instance_path = ma.application().path_of(id);
            let parent = ma.application().tree().parent_of(id);
            ma.application_mut().tree_mut().extract(id);
            ma.forget_subtree(&subtree);
            (ma.name().to_string(), instance_path, parent)
        };

        info!("Instance {} was removed from {}", instance_path, application_name);
        self.events.publish(DmEvent::InstanceRemoved {
            application: application_name,
            instance_path: instance_path.clone(),
        });
        self.save(app)?;

        if let Some(parent) = parent {
            self.send(app, parent, Command::RemoveInstance { instance_path })
                .await?;
        }
        Ok(())
    }

    /// Deploys an instance: roots get a machine, others are deployed by their agent.
    pub async fn deploy(&self, app: &SharedApplication, id: InstanceId) -> Result<(), DmError> {
        if is_root(app, id)? {
            self.deploy_root(app, id).await
        } else {
            self.transition(app, id, &DEPLOY, |instance_path| Command::Deploy { instance_path })
                .await
        }
    }

    /// Undeploys an instance: roots lose their machine.
    pub async fn undeploy(&self, app: &SharedApplication, id: InstanceId) -> Result<(), DmError> {
        if is_root(app, id)? {
            self.undeploy_root(app, id).await
        } else {
            self.transition(app, id, &UNDEPLOY, |instance_path| Command::Undeploy { instance_path })
                .await
        }
    }

    pub async fn start(&self, app: &SharedApplication, id: InstanceId) -> Result<(), DmError> {
        self.transition(app, id, &START, |instance_path| Command::Start { instance_path })
            .await
    }

    pub async fn stop(&self, app: &SharedApplication, id: InstanceId) -> Result<(), DmError> {
        self.transition(app, id, &STOP, |instance_path| Command::Stop { instance_path })
            .await
    }

    /// Asks the agent to back up an instance.
    pub async fn backup(&self, app: &SharedApplication, id: InstanceId) -> Result<(), DmError> {
        self.transition(app, id, &BACKUP, |instance_path| Command::Backup { instance_path })
            .await
    }

    /// Asks the agent to back up an instance so that a copy can take over.
    ///
    /// The copy is staged when the agent reports the backup.
    pub async fn migrate(
        &self,
        app: &SharedApplication,
        id: InstanceId,
        dest_path: Option<String>,
        delete_old_root: DeletePolicy,
    ) -> Result<(), DmError> {
        self.transition(app, id, &MIGRATE, move |instance_path| Command::Migrate {
            instance_path,
            dest_path,
            delete_old_root,
        })
        .await
    }

    /// Asks the agent of `id` to restore the state backed up from `old_instance_path`.
    ///
    /// This is a workflow step: no status is checked.
    pub async fn restore(
        &self,
        app: &SharedApplication,
        id: InstanceId,
        old_instance_path: &str,
        delete_old_root: DeletePolicy,
    ) -> Result<(), DmError> {
        let instance_path = lock(app)?.application().path_of(id);
        self.send(
            app,
            id,
            Command::Restore {
                instance_path,
                old_instance_path: Some(old_instance_path.to_string()),
                dest_path: None,
                delete_old_root: Some(delete_old_root),
            },
        )
        .await
    }

    /// Provisions the machine of a root instance.
    ///
    /// The root's description is queued for the agent, which receives it once
    /// the machine reports it is up.
    pub async fn deploy_root(&self, app: &SharedApplication, id: InstanceId) -> Result<(), DmError> {
        let request = {
            let mut ma = lock(app)?;
            let instance_path = ma.application().path_of(id);
            let instance = ma
                .application()
                .instance(id)
                .ok_or_else(|| DmError::InstanceNotFound(instance_path.clone()))?;
            if !instance.is_root() {
                return Err(DmError::unauthorized(format!("{} is not a root instance", instance_path)));
            }
            if instance.status() != InstanceStatus::NotDeployed {
                return Err(DmError::unauthorized(format!(
                    "{} cannot be deployed: it is {}",
                    instance_path,
                    instance.status()
                )));
            }

            let request = MachineRequest {
                application_name: ma.name().to_string(),
                root_instance_name: instance.name().to_string(),
                channel: instance.channel().map(str::to_string),
                properties: instance.exported_variables(),
            };
            let root = ma
                .application()
                .describe(id)
                .ok_or_else(|| DmError::InstanceNotFound(instance_path))?;
            self.set_status(&mut ma, id, InstanceStatus::Deploying);
            ma.store_awaiting_message(id, Command::SetRootInstance { root });
            request
        };

        match self.iaas.create_machine(&request).await {
            Ok(machine_id) => {
                info!(
                    "Machine {} was created for {} in {}",
                    machine_id, request.root_instance_name, request.application_name
                );
                if let Some(instance) = lock(app)?.application_mut().instance_mut(id) {
                    instance.data_mut().insert(MACHINE_ID.to_string(), machine_id);
                }
                self.save(app)
            }
            Err(e) => {
                warn!(
                    "The machine of {} in {} could not be created: {}",
                    request.root_instance_name, request.application_name, e
                );
                let mut ma = lock(app)?;
                self.set_status(&mut ma, id, InstanceStatus::NotDeployed);
                ma.remove_awaiting_messages(id);
                Err(e.into())
            }
        }
    }

    /// Terminates the machine of a root instance.
    ///
    /// Queued commands are dropped and every instance hosted on the machine
    /// goes back to `NOT_DEPLOYED`.
    pub async fn undeploy_root(&self, app: &SharedApplication, id: InstanceId) -> Result<(), DmError> {
        let machine_id = {
            let mut ma = lock(app)?;
            let instance_path = ma.application().path_of(id);
            let instance = ma
                .application()
                .instance(id)
                .ok_or_else(|| DmError::InstanceNotFound(instance_path.clone()))?;
            if !instance.is_root() {
                return Err(DmError::unauthorized(format!("{} is not a root instance", instance_path)));
            }
            if instance.status() == InstanceStatus::NotDeployed {
                return Err(DmError::unauthorized(format!("{} is not deployed", instance_path)));
            }

            self.set_status(&mut ma, id, InstanceStatus::Undeploying);
            ma.remove_awaiting_messages(id);
            for hosted in ma.subtree(id).into_iter().skip(1) {
                self.set_status(&mut ma, hosted, InstanceStatus::NotDeployed);
            }
            ma.application_mut()
                .instance_mut(id)
                .and_then(|i| i.data_mut().remove(MACHINE_ID))
        };

        if let Some(machine_id) = machine_id {
            if let Err(e) = self.iaas.terminate_machine(&machine_id).await {
                // Keep the id so that the operator can retry
                if let Some(instance) = lock(app)?.application_mut().instance_mut(id) {
                    instance.data_mut().insert(MACHINE_ID.to_string(), machine_id);
                }
                return Err(e.into());
            }
        }

        {
            let mut ma = lock(app)?;
            self.set_status(&mut ma, id, InstanceStatus::NotDeployed);
            if let Some(instance) = ma.application_mut().instance_mut(id) {
                instance.data_mut().remove(IP_ADDRESS);
            }
        }
        self.save(app)
    }

    async fn transition(
        &self,
        app: &SharedApplication,
        id: InstanceId,
        rule: &Rule,
        command: impl FnOnce(String) -> Command,
    ) -> Result<(), DmError> {
        let instance_path = {
            let mut ma = lock(app)?;
            let instance_path = ma.application().path_of(id);
            let status = status_of(&ma, id)?;
            if ma.application().tree().parent_of(id).is_none() {
                return Err(DmError::unauthorized(format!(
                    "{} is a root instance, it cannot be {} this way",
                    instance_path, rule.action
                )));
            }
            if !(rule.allows)(status) {
                return Err(DmError::unauthorized(format!(
                    "{} cannot be {}: it is {}",
                    instance_path, rule.action, status
                )));
            }
            if let Some(next) = rule.next {
                self.set_status(&mut ma, id, next);
            }
            instance_path
        };
        self.send(app, id, command(instance_path)).await
    }
}

fn is_root(app: &SharedApplication, id: InstanceId) -> Result<bool, DmError> {
    let ma = lock(app)?;
    ma.application()
        .instance(id)
        .map(|i| i.is_root())
        .ok_or_else(|| DmError::InstanceNotFound(ma.application().path_of(id)))
}
