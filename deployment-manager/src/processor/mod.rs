//! # DM Message Processor
//!
//! Applies the notifications sent by agents to the model.
//!
//! Nothing here fails: an unknown application or instance is a warning (the
//! notification may refer to something the DM already forgot), and multi-step
//! workflows stop at the first failing step, leaving completed steps in place.

use crate::event_bus::DmEvent;
use crate::manager::{destination_names, lock, Manager, StagedCopy};
use crate::registry::SharedApplication;
use agent_protocol::{Notification, NotificationReceiver};
use deployment::{DeletePolicy, Imports, InstanceStatus, IP_ADDRESS};
use deployment_core::tree::duplicate::MIGRATED_SUFFIX;
use deployment_core::tree::path;
use deployment_core::comms::TransportClosed;
use deployment_core::InstanceId;
use log::{debug, error, info, trace, warn};
use std::sync::Arc;
use std::time::Duration;

pub struct DmMessageProcessor {
    manager: Arc<Manager>,
}

impl DmMessageProcessor {
    pub fn new(manager: Arc<Manager>) -> Self {
        Self { manager }
    }

    /// Processes notifications until the inbox is closed.
    pub async fn run(self, mut receiver: NotificationReceiver) {
        info!("DM message processor started");
        loop {
            match receiver.next_notification().await {
                Ok(Some(notification)) => self.process(notification).await,
                Ok(None) => {}
                Err(e) if e.downcast_ref::<TransportClosed>().is_some() => break,
                Err(e) => {
                    error!("Message processor: {:#}", e);
                    // Minimal failure backoff
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
        info!("DM message processor stopped");
    }

    pub async fn process(&self, notification: Notification) {
        trace!("Processing a {} notification", notification.kind());
        match notification {
            Notification::MachineUp {
                application_name,
                root_instance_name,
                ip_address,
            } => {
                self.machine_up(&application_name, &root_instance_name, ip_address)
                    .await
            }
            Notification::MachineDown {
                application_name,
                root_instance_name,
            } => self.machine_down(&application_name, &root_instance_name),
            Notification::Heartbeat {
                application_name,
                root_instance_name,
            } => self.heartbeat(&application_name, &root_instance_name),
            Notification::InstanceChanged {
                application_name,
                instance_path,
                new_status,
                new_imports,
                sequence,
            } => self.instance_changed(
                &application_name,
                &instance_path,
                new_status,
                new_imports,
                sequence,
            ),
            Notification::InstanceRemoved {
                application_name,
                instance_path,
            } => self.instance_removed(&application_name, &instance_path),
            Notification::InstanceBackedUp {
                application_name,
                instance_path,
                dest_path,
                delete_old_root,
            } => {
                self.instance_backed_up(
                    &application_name,
                    &instance_path,
                    dest_path.as_deref(),
                    delete_old_root,
                )
                .await
            }
            Notification::InstanceRestored {
                application_name,
                instance_path,
                old_instance_path,
                ..
            } => {
                info!(
                    "{} was restored from {} in {}",
                    instance_path, old_instance_path, application_name
                );
                self.manager.events().publish(DmEvent::RestoreCompleted {
                    application: application_name,
                    instance_path,
                    old_instance_path,
                });
            }
            Notification::InstanceMigrated {
                application_name,
                old_instance_path,
                delete_old_root,
            } => {
                self.instance_migrated(&application_name, &old_instance_path, delete_old_root)
                    .await
            }
        }
    }

    async fn machine_up(&self, application_name: &str, root_instance_name: &str, ip_address: String) {
        let Some((app, root)) = self.find_root(application_name, root_instance_name, "MACHINE_UP")
        else {
            return;
        };

        {
            let Ok(mut ma) = lock(&app) else {
                return;
            };
            self.manager
                .set_status(&mut ma, root, InstanceStatus::DeployedStarted);
            if let Some(instance) = ma.application_mut().instance_mut(root) {
                instance
                    .data_mut()
                    .insert(IP_ADDRESS.to_string(), ip_address.clone());
            }
            ma.acknowledge_heart_beat(root);
        }
        info!(
            "Machine {} is up and running ({}) in {}",
            root_instance_name, ip_address, application_name
        );

        if let Err(e) = self.manager.save(&app) {
            warn!("{}", e);
        }
        self.manager.events().publish(DmEvent::MachineUp {
            application: application_name.to_string(),
            root_instance: root_instance_name.to_string(),
            ip_address,
        });
        if let Err(e) = self.manager.flush_awaiting_messages(&app, root).await {
            warn!("Awaiting messages of {} could not be sent: {}", root_instance_name, e);
        }
    }

    fn machine_down(&self, application_name: &str, root_instance_name: &str) {
        let Some((app, root)) =
            self.find_root(application_name, root_instance_name, "MACHINE_DOWN")
        else {
            return;
        };

        {
            let Ok(mut ma) = lock(&app) else {
                return;
            };
            self.manager
                .set_status(&mut ma, root, InstanceStatus::NotDeployed);
            if let Some(instance) = ma.application_mut().instance_mut(root) {
                instance.data_mut().remove(IP_ADDRESS);
            }
        }
        info!("Machine {} is down in {}", root_instance_name, application_name);

        if let Err(e) = self.manager.save(&app) {
            warn!("{}", e);
        }
        self.manager.events().publish(DmEvent::MachineDown {
            application: application_name.to_string(),
            root_instance: root_instance_name.to_string(),
        });
    }

    fn heartbeat(&self, application_name: &str, root_instance_name: &str) {
        let Some((app, root)) = self.find_root(application_name, root_instance_name, "HEARTBEAT")
        else {
            return;
        };
        let Ok(mut ma) = lock(&app) else {
            return;
        };

        let was_in_problem = ma
            .application()
            .instance(root)
            .is_some_and(|i| i.status() == InstanceStatus::Problem);
        ma.acknowledge_heart_beat(root);
        trace!("Heartbeat from {} in {}", root_instance_name, application_name);

        if was_in_problem {
            info!("{} in {} is alive again", root_instance_name, application_name);
            self.manager.events().publish(DmEvent::StatusChanged {
                application: application_name.to_string(),
                instance_path: ma.application().path_of(root),
                old_status: InstanceStatus::Problem,
                new_status: InstanceStatus::DeployedStarted,
            });
            drop(ma);
            if let Err(e) = self.manager.save(&app) {
                warn!("{}", e);
            }
        }
    }

    fn instance_changed(
        &self,
        application_name: &str,
        instance_path: &str,
        new_status: InstanceStatus,
        new_imports: Imports,
        sequence: Option<u64>,
    ) {
        let Some((app, id)) = self.find_instance(application_name, instance_path, "CHANGED")
        else {
            return;
        };
        let Ok(mut ma) = lock(&app) else {
            return;
        };

        if !ma.accept_sequence(id, sequence) {
            debug!(
                "A stale CHANGED notification for {} was dropped (sequence {:?})",
                instance_path, sequence
            );
            return;
        }
        self.manager.set_status(&mut ma, id, new_status);
        if let Some(instance) = ma.application_mut().instance_mut(id) {
            instance.replace_imports(new_imports);
        }
        debug!(
            "Status of {} in {} changed to {}",
            instance_path, application_name, new_status
        );
    }

    fn instance_removed(&self, application_name: &str, instance_path: &str) {
        let Some((app, id)) = self.find_instance(application_name, instance_path, "REMOVE") else {
            return;
        };

        {
            let Ok(mut ma) = lock(&app) else {
                return;
            };
            if ma.application().tree().parent_of(id).is_none() {
                warn!(
                    "Abnormal behavior. A 'REMOVE' notification was received for a root instance: {}",
                    instance_path
                );
                return;
            }
            let subtree = ma.subtree(id);
            ma.application_mut().tree_mut().extract(id);
            ma.forget_subtree(&subtree);
        }
        info!("Instance {} was removed from {}", instance_path, application_name);

        self.manager.events().publish(DmEvent::InstanceRemoved {
            application: application_name.to_string(),
            instance_path: instance_path.to_string(),
        });
        if let Err(e) = self.manager.save(&app) {
            warn!("{}", e);
        }
    }

    /// A backup with a delete decision is the first half of a migration: a
    /// copy is staged, deployed, restored from the backup and started.
    async fn instance_backed_up(
        &self,
        application_name: &str,
        instance_path: &str,
        dest_path: Option<&str>,
        delete_old_root: Option<DeletePolicy>,
    ) {
        let Some((app, id)) = self.find_instance(application_name, instance_path, "BACKED_UP")
        else {
            return;
        };

        let dest_names = {
            let Ok(ma) = lock(&app) else {
                return;
            };
            if ma.application().tree().parent_of(id).is_none() {
                warn!(
                    "Abnormal behavior. A 'BACKED_UP' notification was received for a root instance: {}",
                    instance_path
                );
                return;
            }
            if delete_old_root.is_none() {
                info!("Instance {} was backed up successfully", instance_path);
                return;
            }

            if dest_path.is_some_and(|d| ma.application().find(d) == Some(id)) {
                warn!("{} cannot be migrated onto itself", instance_path);
                return;
            }

            let chain = path::ancestor_chain(ma.application().tree(), id);
            match dest_path {
                Some(dest_path) => match destination_names(ma.application(), &chain, dest_path) {
                    Ok(names) => names,
                    Err(e) => {
                        warn!("{} cannot be migrated to {}: {}", instance_path, dest_path, e);
                        return;
                    }
                },
                None => chain
                    .iter()
                    .filter_map(|c| ma.application().instance(*c))
                    .map(|i| format!("{}{}", i.name(), MIGRATED_SUFFIX))
                    .collect(),
            }
        };
        let delete_old_root = delete_old_root.unwrap_or(DeletePolicy::KeepAll);

        let staged = match self.manager.stage_copy(&app, id, &dest_names).await {
            Ok(staged) => staged,
            Err(e) => {
                warn!("The copy of {} could not be staged: {}", instance_path, e);
                return;
            }
        };
        let Some(target) = staged.target() else {
            return;
        };
        // A reused destination keeps the source.
        let restore_policy = match &staged {
            StagedCopy::Reused { .. } => DeletePolicy::KeepAll,
            StagedCopy::Created { .. } => delete_old_root,
        };

        if let Err(e) = self.deploy_staged(&app, &staged).await {
            warn!("The copy of {} could not be deployed: {}", instance_path, e);
            return;
        }
        if let Err(e) = self
            .manager
            .restore(&app, target, instance_path, restore_policy)
            .await
        {
            warn!("The restore of {} could not be requested: {}", instance_path, e);
            return;
        }
        if let Err(e) = self.manager.send_start(&app, target).await {
            warn!("The copy of {} could not be started: {}", instance_path, e);
            return;
        }

        let target_path = lock(&app)
            .map(|ma| ma.application().path_of(target))
            .unwrap_or_default();
        info!("A request to restore {} to {} was sent", instance_path, target_path);
    }

    async fn deploy_staged(
        &self,
        app: &SharedApplication,
        staged: &StagedCopy,
    ) -> Result<(), crate::error::DmError> {
        match staged {
            StagedCopy::Reused { target, ancestors } => {
                self.manager.deploy_missing(app, ancestors).await?;
                self.manager.deploy_missing(app, &[*target]).await
            }
            StagedCopy::Created {
                ancestors, copies, ..
            } => {
                self.manager.deploy_missing(app, ancestors).await?;
                self.manager
                    .deploy_all(app, copies.first().copied())
                    .await
            }
        }
    }

    /// The old side of a migration acknowledged the cut-over.
    ///
    /// The instance (or its whole machine) is stopped and undeployed. It stays
    /// in the model until it is removed.
    async fn instance_migrated(
        &self,
        application_name: &str,
        old_instance_path: &str,
        delete_old_root: Option<DeletePolicy>,
    ) {
        let Some((app, old)) = self.find_instance(application_name, old_instance_path, "MIGRATED")
        else {
            return;
        };

        let policy = delete_old_root.unwrap_or(DeletePolicy::KeepAll);
        let scope = match policy {
            DeletePolicy::WholeRoot => match lock(&app) {
                Ok(ma) => ma.application().root_of(old),
                Err(_) => return,
            },
            DeletePolicy::InstanceOnly => old,
            DeletePolicy::KeepAll => {
                info!(
                    "Everything is kept along {}. Nothing was undeployed",
                    old_instance_path
                );
                return;
            }
        };

        let scope_path = match lock(&app) {
            Ok(ma) => ma.application().path_of(scope),
            Err(_) => return,
        };
        self.manager.events().publish(DmEvent::TeardownRequested {
            application: application_name.to_string(),
            instance_path: scope_path.clone(),
            policy,
        });

        if let Err(e) = self.manager.stop_all_thoroughly(&app, Some(scope)).await {
            warn!("{} could not be stopped: {}", scope_path, e);
            return;
        }
        if let Err(e) = self.manager.undeploy_all_thoroughly(&app, Some(scope)).await {
            warn!("{} could not be undeployed: {}", scope_path, e);
            return;
        }
        info!("The teardown of {} was requested", scope_path);
    }

    fn find_root(
        &self,
        application_name: &str,
        root_instance_name: &str,
        kind: &str,
    ) -> Option<(SharedApplication, InstanceId)> {
        let found = self.manager.registry().get(application_name).ok().and_then(|app| {
            let root = lock(&app)
                .ok()?
                .application()
                .tree()
                .child_named(None, root_instance_name)?;
            Some((app, root))
        });
        if found.is_none() {
            warn!(
                "A '{}' notification was received for an unknown root instance: {} (app = {})",
                kind, root_instance_name, application_name
            );
        }
        found
    }

    fn find_instance(
        &self,
        application_name: &str,
        instance_path: &str,
        kind: &str,
    ) -> Option<(SharedApplication, InstanceId)> {
        match self.manager.resolve(application_name, instance_path) {
            Ok(found) => Some(found),
            Err(e) => {
                warn!(
                    "A '{}' notification was received for an unknown instance: {} ({})",
                    kind, instance_path, e
                );
                None
            }
        }
    }
}
