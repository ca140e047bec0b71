//! Operations on a whole subtree (or a whole application).
//!
//! Instances whose status makes the single operation unauthorized are
//! skipped. Provisioning and messaging failures stop the walk.

use super::{lock, Manager};
use crate::error::DmError;
use crate::registry::SharedApplication;
use agent_protocol::Command;
use deployment::InstanceStatus;
use deployment_core::InstanceId;
use log::debug;

impl Manager {
    /// Deploys every `NOT_DEPLOYED` instance of the scope, parents first.
    pub async fn deploy_all(
        &self,
        app: &SharedApplication,
        scope: Option<InstanceId>,
    ) -> Result<(), DmError> {
        for (id, status, _) in scope_states(app, scope)? {
            if status == InstanceStatus::NotDeployed {
                skip_unauthorized(self.deploy(app, id).await)?;
            }
        }
        Ok(())
    }

    /// Starts every `DEPLOYED_STOPPED` instance of the scope, parents first.
    pub async fn start_all(
        &self,
        app: &SharedApplication,
        scope: Option<InstanceId>,
    ) -> Result<(), DmError> {
        for (id, status, is_root) in scope_states(app, scope)? {
            if !is_root && status == InstanceStatus::DeployedStopped {
                skip_unauthorized(self.start(app, id).await)?;
            }
        }
        Ok(())
    }

    /// Deploys the scope, then asks the agents to start what they deploy.
    ///
    /// Start commands follow the deploy commands on each machine's queue, so
    /// agents start instances as soon as they are deployed.
    pub async fn deploy_and_start_all(
        &self,
        app: &SharedApplication,
        scope: Option<InstanceId>,
    ) -> Result<(), DmError> {
        self.deploy_all(app, scope).await?;
        for (id, status, is_root) in scope_states(app, scope)? {
            if is_root {
                continue;
            }
            match status {
                InstanceStatus::DeployedStopped => skip_unauthorized(self.start(app, id).await)?,
                InstanceStatus::Deploying => self.send_start(app, id).await?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Stops every started instance of the scope, children first.
    pub async fn stop_all(
        &self,
        app: &SharedApplication,
        scope: Option<InstanceId>,
    ) -> Result<(), DmError> {
        for (id, status, is_root) in scope_states(app, scope)?.into_iter().rev() {
            if !is_root && status == InstanceStatus::DeployedStarted {
                skip_unauthorized(self.stop(app, id).await)?;
            }
        }
        Ok(())
    }

    /// Undeploys the scope.
    ///
    /// Roots (whole machines) are simply terminated; below a root, instances
    /// are undeployed children first.
    pub async fn undeploy_all(
        &self,
        app: &SharedApplication,
        scope: Option<InstanceId>,
    ) -> Result<(), DmError> {
        let states = scope_states(app, scope)?;
        if covers_whole_machines(&states) {
            for (id, status, is_root) in states {
                if is_root && status != InstanceStatus::NotDeployed {
                    skip_unauthorized(self.undeploy_root(app, id).await)?;
                }
            }
            return Ok(());
        }

        for (id, status, _) in states.into_iter().rev() {
            if status != InstanceStatus::NotDeployed {
                skip_unauthorized(self.undeploy(app, id).await)?;
            }
        }
        Ok(())
    }

    /// Stops every instance of the scope that may be running, whatever its
    /// current status (e.g. `PROBLEM` or still `STARTING`).
    pub async fn stop_all_thoroughly(
        &self,
        app: &SharedApplication,
        scope: Option<InstanceId>,
    ) -> Result<(), DmError> {
        for (id, status, is_root) in scope_states(app, scope)?.into_iter().rev() {
            let running = !matches!(
                status,
                InstanceStatus::NotDeployed
                    | InstanceStatus::DeployedStopped
                    | InstanceStatus::Stopping
                    | InstanceStatus::Undeploying
            );
            if !is_root && running {
                let instance_path = self.mark(app, id, InstanceStatus::Stopping)?;
                self.send(app, id, Command::Stop { instance_path }).await?;
            }
        }
        Ok(())
    }

    /// Undeploys every instance of the scope that is not `NOT_DEPLOYED`,
    /// whatever its current status. Machines are terminated.
    pub async fn undeploy_all_thoroughly(
        &self,
        app: &SharedApplication,
        scope: Option<InstanceId>,
    ) -> Result<(), DmError> {
        let states = scope_states(app, scope)?;
        if covers_whole_machines(&states) {
            for (id, status, is_root) in states {
                if is_root && status != InstanceStatus::NotDeployed {
                    self.undeploy_root(app, id).await?;
                }
            }
            return Ok(());
        }

        for (id, status, _) in states.into_iter().rev() {
            if status != InstanceStatus::NotDeployed {
                let instance_path = self.mark(app, id, InstanceStatus::Undeploying)?;
                self.send(app, id, Command::Undeploy { instance_path }).await?;
            }
        }
        Ok(())
    }

    /// Sends a start command without checking the status.
    pub(crate) async fn send_start(
        &self,
        app: &SharedApplication,
        id: InstanceId,
    ) -> Result<(), DmError> {
        let instance_path = lock(app)?.application().path_of(id);
        self.send(app, id, Command::Start { instance_path }).await
    }

    fn mark(
        &self,
        app: &SharedApplication,
        id: InstanceId,
        status: InstanceStatus,
    ) -> Result<String, DmError> {
        let mut ma = lock(app)?;
        self.set_status(&mut ma, id, status);
        Ok(ma.application().path_of(id))
    }
}

/// `(id, status, is_root)` of the scope, parents first.
fn scope_states(
    app: &SharedApplication,
    scope: Option<InstanceId>,
) -> Result<Vec<(InstanceId, InstanceStatus, bool)>, DmError> {
    let ma = lock(app)?;
    let ids = match scope {
        Some(id) => ma.subtree(id),
        None => ma.application().all_instances(),
    };
    Ok(ids
        .into_iter()
        .filter_map(|id| {
            let instance = ma.application().instance(id)?;
            Some((id, instance.status(), instance.is_root()))
        })
        .collect())
}

/// Whether the scope starts at a root (or is the whole application).
fn covers_whole_machines(states: &[(InstanceId, InstanceStatus, bool)]) -> bool {
    states.first().is_some_and(|(_, _, is_root)| *is_root)
}

fn skip_unauthorized(result: Result<(), DmError>) -> Result<(), DmError> {
    match result {
        Err(DmError::UnauthorizedAction(msg)) => {
            debug!("Skipped: {}", msg);
            Ok(())
        }
        other => other,
    }
}
