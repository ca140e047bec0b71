//! Restoring backed-up instances to a destination path.
//!
//! A destination path names one instance per instance of the source path.
//! The longest prefix of the destination that already exists (with the same
//! components as the source) is reused; the rest of the source chain is
//! duplicated under it.

use super::{lock, parse_policy, status_of, Manager};
use crate::error::DmError;
use crate::event_bus::DmEvent;
use crate::registry::SharedApplication;
use deployment::{DeletePolicy, InstanceStatus};
use deployment_core::tree::duplicate::{duplicate_chain, Naming};
use deployment_core::tree::path;
use deployment_core::{Application, InstanceId};
use log::info;

/// Where the destination of a restore lands in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staging {
    /// The whole destination already exists.
    Existing(InstanceId),
    /// The source chain, from index `from` on, must be copied under `parent`
    /// (as a new root when `None`).
    New {
        parent: Option<InstanceId>,
        from: usize,
    },
}

impl Staging {
    /// Walks the destination names down the tree.
    pub fn plan(application: &Application, chain: &[InstanceId], dest_names: &[String]) -> Self {
        let component_of = |id: InstanceId| application.instance(id).and_then(|i| i.component_name());

        let mut parent = None;
        for (from, (source, name)) in chain.iter().zip(dest_names).enumerate() {
            let reusable = application
                .tree()
                .child_named(parent, name)
                .filter(|existing| component_of(*existing) == component_of(*source));
            match reusable {
                Some(existing) => parent = Some(existing),
                None => return Staging::New { parent, from },
            }
        }
        match parent {
            Some(target) => Staging::Existing(target),
            None => Staging::New { parent: None, from: 0 },
        }
    }
}

/// Result of [`Manager::stage_copy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedCopy {
    /// The destination exists: `target` is reused as is.
    Reused {
        target: InstanceId,
        ancestors: Vec<InstanceId>,
    },
    /// Copies were attached under `ancestors`, one per entry of `old_paths`.
    Created {
        ancestors: Vec<InstanceId>,
        copies: Vec<InstanceId>,
        old_paths: Vec<String>,
    },
}

impl StagedCopy {
    /// The instance taking over the source.
    pub fn target(&self) -> Option<InstanceId> {
        match self {
            StagedCopy::Reused { target, .. } => Some(*target),
            StagedCopy::Created { copies, .. } => copies.last().copied(),
        }
    }
}

/// `/instance_of_<component>` for every instance of the chain.
pub(crate) fn destination_template(application: &Application, chain: &[InstanceId]) -> String {
    chain
        .iter()
        .map(|id| {
            let component = application
                .instance(*id)
                .and_then(|i| i.component_name())
                .unwrap_or_default();
            format!("/instance_of_{}", component)
        })
        .collect()
}

/// Splits a destination path, checking it has one non-empty segment per
/// instance of `chain`.
pub(crate) fn destination_names(
    application: &Application,
    chain: &[InstanceId],
    dest_path: &str,
) -> Result<Vec<String>, DmError> {
    let mismatch = || {
        DmError::InvalidParameter(format!(
            "The destination path must follow the template {}",
            destination_template(application, chain)
        ))
    };

    let rest = dest_path.strip_prefix('/').ok_or_else(mismatch)?;
    let names: Vec<String> = rest.split('/').map(str::to_string).collect();
    if names.len() != chain.len() || names.iter().any(String::is_empty) {
        return Err(mismatch());
    }
    Ok(names)
}

impl Manager {
    /// Makes sure a destination exists for the chain of `source`, copying
    /// what is missing.
    ///
    /// # Arguments
    ///
    /// * `dest_names` - One name per instance from the root down to `source`.
    pub async fn stage_copy(
        &self,
        app: &SharedApplication,
        source: InstanceId,
        dest_names: &[String],
    ) -> Result<StagedCopy, DmError> {
        let (staged, application_name, old_path, first_copy_path, new_path) = {
            let mut ma = lock(app)?;
            let chain = path::ancestor_chain(ma.application().tree(), source);
            if chain.is_empty() {
                return Err(DmError::InstanceNotFound(ma.application().path_of(source)));
            }
            if dest_names.len() != chain.len() {
                return Err(DmError::InvalidParameter(format!(
                    "The destination path must follow the template {}",
                    destination_template(ma.application(), &chain)
                )));
            }

            match Staging::plan(ma.application(), &chain, dest_names) {
                Staging::Existing(target) => {
                    let mut ancestors = path::ancestor_chain(ma.application().tree(), target);
                    ancestors.pop();
                    info!(
                        "{} is reused to restore {} in {}",
                        ma.application().path_of(target),
                        ma.application().path_of(source),
                        ma.name()
                    );
                    return Ok(StagedCopy::Reused { target, ancestors });
                }
                Staging::New { parent, from } => {
                    let detached = duplicate_chain(
                        ma.application().tree(),
                        &chain[from..],
                        Naming::Explicit(&dest_names[from..]),
                    )?;
                    let first_copy = ma.application_mut().insert(parent, detached)?;
                    let copies = ma.subtree(first_copy);
                    let ancestors = parent
                        .map(|p| path::ancestor_chain(ma.application().tree(), p))
                        .unwrap_or_default();
                    let old_paths = chain[from..]
                        .iter()
                        .map(|id| ma.application().path_of(*id))
                        .collect();
                    let new_path = copies
                        .last()
                        .map(|id| ma.application().path_of(*id))
                        .unwrap_or_default();
                    let staged = StagedCopy::Created {
                        ancestors,
                        copies,
                        old_paths,
                    };
                    (
                        staged,
                        ma.name().to_string(),
                        ma.application().path_of(source),
                        ma.application().path_of(first_copy),
                        new_path,
                    )
                }
            }
        };

        info!(
            "{} will be restored to {} in {}",
            old_path, new_path, application_name
        );
        self.events.publish(DmEvent::InstanceAdded {
            application: application_name.clone(),
            instance_path: first_copy_path,
        });
        self.events.publish(DmEvent::MigrationStaged {
            application: application_name,
            old_instance_path: old_path,
            new_instance_path: new_path,
        });
        self.save(app)?;
        Ok(staged)
    }

    /// Restores a chain of copies, pairwise with the paths they were copied from.
    pub async fn restore_all(
        &self,
        app: &SharedApplication,
        copies: &[InstanceId],
        old_paths: &[String],
        delete_old_root: DeletePolicy,
    ) -> Result<(), DmError> {
        if copies.len() != old_paths.len() {
            return Err(DmError::InvalidParameter(format!(
                "{} instances cannot be restored from {} paths",
                copies.len(),
                old_paths.len()
            )));
        }
        for (copy, old_path) in copies.iter().zip(old_paths) {
            self.restore(app, *copy, old_path, delete_old_root).await?;
        }
        Ok(())
    }

    /// Deploys the `NOT_DEPLOYED` instances among `ids`, in order.
    pub(crate) async fn deploy_missing(
        &self,
        app: &SharedApplication,
        ids: &[InstanceId],
    ) -> Result<(), DmError> {
        for id in ids {
            let status = status_of(&*lock(app)?, *id)?;
            if status == InstanceStatus::NotDeployed {
                self.deploy(app, *id).await?;
            }
        }
        Ok(())
    }

    /// Asks the agent of `instance_path` for the backup that starts a migration.
    ///
    /// A destination, when given, is checked now rather than when the backup
    /// comes back.
    pub async fn request_migration(
        &self,
        application_name: &str,
        instance_path: &str,
        dest_path: Option<&str>,
        delete_old_root: Option<&str>,
    ) -> Result<(), DmError> {
        let (app, source) = self.resolve(application_name, instance_path)?;
        let delete_old_root = parse_policy(delete_old_root)?;
        let dest_path = dest_path.filter(|d| !d.is_empty());
        if let Some(dest_path) = dest_path {
            let ma = lock(&app)?;
            if ma.application().find(dest_path) == Some(source) {
                return Err(DmError::InvalidParameter(format!(
                    "{} cannot be migrated onto itself",
                    instance_path
                )));
            }
            let chain = path::ancestor_chain(ma.application().tree(), source);
            destination_names(ma.application(), &chain, dest_path)?;
        }
        self.migrate(&app, source, dest_path.map(str::to_string), delete_old_root)
            .await
    }

    /// Restores `instance_path` to `dest_path` (operator request).
    ///
    /// A reused destination is restored with [`DeletePolicy::KeepAll`]; the old
    /// side is only torn down when copies were created.
    pub async fn restore_to(
        &self,
        application_name: &str,
        instance_path: &str,
        dest_path: Option<&str>,
        delete_old_root: Option<&str>,
    ) -> Result<(), DmError> {
        let (app, source) = self.resolve(application_name, instance_path)?;
        let delete_old_root = parse_policy(delete_old_root)?;
        let dest_path = dest_path.filter(|d| !d.is_empty()).ok_or_else(|| {
            DmError::InvalidParameter("Missing 'dest-path' parameter or empty destination path".into())
        })?;

        let dest_names = {
            let ma = lock(&app)?;
            let chain = path::ancestor_chain(ma.application().tree(), source);
            destination_names(ma.application(), &chain, dest_path)?
        };

        match self.stage_copy(&app, source, &dest_names).await? {
            StagedCopy::Reused { target, ancestors } => {
                let (status, is_root, target_path) = {
                    let ma = lock(&app)?;
                    let status = status_of(&ma, target)?;
                    (status, ancestors.is_empty(), ma.application().path_of(target))
                };
                match status {
                    InstanceStatus::DeployedStopped => {
                        self.restore(&app, target, instance_path, DeletePolicy::KeepAll)
                            .await?;
                        self.start(&app, target).await
                    }
                    InstanceStatus::NotDeployed => {
                        self.deploy_missing(&app, &ancestors).await?;
                        self.deploy(&app, target).await?;
                        self.restore(&app, target, instance_path, DeletePolicy::KeepAll)
                            .await?;
                        if is_root {
                            Ok(())
                        } else {
                            self.send_start(&app, target).await
                        }
                    }
                    other => Err(DmError::unauthorized(format!(
                        "{} must not be {} to be restored",
                        target_path, other
                    ))),
                }
            }
            StagedCopy::Created {
                ancestors,
                copies,
                old_paths,
            } => {
                self.deploy_missing(&app, &ancestors).await?;
                let Some(first_copy) = copies.first().copied() else {
                    return Ok(());
                };
                self.deploy_all(&app, Some(first_copy)).await?;
                self.restore_all(&app, &copies, &old_paths, delete_old_root)
                    .await?;
                let first_is_root = ancestors.is_empty();
                for (index, copy) in copies.iter().enumerate() {
                    if index > 0 || !first_is_root {
                        self.send_start(&app, *copy).await?;
                    }
                }
                Ok(())
            }
        }
    }
}
