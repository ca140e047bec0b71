//! Manager-side runtime state of one application.

use agent_protocol::Command;
use deployment::InstanceStatus;
use deployment_core::tree::{hierarchy, path};
use deployment_core::{Application, InstanceId};
use log::{debug, info};
use std::collections::HashMap;

pub const DEFAULT_MISSED_HEARTBEATS_THRESHOLD: u32 = 5;

/// A command ready to be delivered to the machine hosting `root_instance_name`.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub root_instance_name: String,
    pub command: Command,
}

/// An application plus the bookkeeping only the manager needs.
///
/// Both maps are keyed by root instances only. Entries are removed, never
/// left empty or at zero: absence is the healthy state.
#[derive(Debug)]
pub struct ManagedApplication {
    application: Application,
    awaiting_messages: HashMap<InstanceId, Vec<Command>>,
    missed_heartbeats: HashMap<InstanceId, u32>,
    last_sequences: HashMap<InstanceId, u64>,
    missed_heartbeats_threshold: u32,
}

impl ManagedApplication {
    pub fn new(application: Application) -> Self {
        Self::with_threshold(application, DEFAULT_MISSED_HEARTBEATS_THRESHOLD)
    }

    pub fn with_threshold(application: Application, missed_heartbeats_threshold: u32) -> Self {
        Self {
            application,
            awaiting_messages: HashMap::new(),
            missed_heartbeats: HashMap::new(),
            last_sequences: HashMap::new(),
            missed_heartbeats_threshold,
        }
    }

    pub fn name(&self) -> &str {
        self.application.name()
    }

    pub fn application(&self) -> &Application {
        &self.application
    }

    pub fn application_mut(&mut self) -> &mut Application {
        &mut self.application
    }

    fn root_of(&self, id: InstanceId) -> InstanceId {
        path::find_root_instance(self.application.tree(), id)
    }

    /// Queues a command until the machine hosting `instance` is reachable.
    pub fn store_awaiting_message(&mut self, instance: InstanceId, command: Command) {
        let root = self.root_of(instance);
        debug!(
            "Storing a message for {} in {} until its machine is up",
            self.application.path_of(root),
            self.name()
        );
        self.awaiting_messages.entry(root).or_default().push(command);
    }

    /// Drains the queue of the machine hosting `instance`, in FIFO order.
    pub fn remove_awaiting_messages(&mut self, instance: InstanceId) -> Vec<Command> {
        let root = self.root_of(instance);
        self.awaiting_messages.remove(&root).unwrap_or_default()
    }

    pub fn awaiting_messages(&self, instance: InstanceId) -> &[Command] {
        self.awaiting_messages
            .get(&self.root_of(instance))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Roots that have queued messages.
    pub fn roots_with_awaiting_messages(&self) -> Vec<InstanceId> {
        self.awaiting_messages.keys().copied().collect()
    }

    /// Sends now if the target's machine is started, queues otherwise.
    pub fn dispatch(&mut self, target: InstanceId, command: Command) -> Option<Outbound> {
        let root = self.root_of(target);
        let root_instance = self.application.instance(root)?;
        if root_instance.status() == InstanceStatus::DeployedStarted {
            Some(Outbound {
                root_instance_name: root_instance.name().to_string(),
                command,
            })
        } else {
            self.store_awaiting_message(target, command);
            None
        }
    }

    /// Records a heartbeat from a root instance.
    ///
    /// A machine flagged with `PROBLEM` is considered alive again.
    pub fn acknowledge_heart_beat(&mut self, root: InstanceId) {
        if let Some(instance) = self.application.instance_mut(root) {
            if instance.status() == InstanceStatus::Problem {
                instance.set_status(InstanceStatus::DeployedStarted);
                info!("{} is alive again, back to DEPLOYED_STARTED", instance.name());
            }
        }
        self.missed_heartbeats.remove(&root);
    }

    pub fn missed_heartbeats(&self, root: InstanceId) -> Option<u32> {
        self.missed_heartbeats.get(&root).copied()
    }

    /// One liveness tick.
    ///
    /// Every started root gets one more missed heartbeat; it is flagged with
    /// `PROBLEM` once the count exceeds the threshold. Roots being deployed,
    /// being undeployed or not deployed lose their count.
    ///
    /// # Returns
    ///
    /// The roots flagged during this tick.
    pub fn check_states(&mut self) -> Vec<InstanceId> {
        let mut flagged = Vec::new();
        let roots = self.application.tree().roots().to_vec();
        for root in roots {
            let Some(instance) = self.application.instance_mut(root) else {
                continue;
            };
            match instance.status() {
                InstanceStatus::DeployedStarted => {
                    let count = self.missed_heartbeats.entry(root).or_insert(0);
                    *count += 1;
                    if *count > self.missed_heartbeats_threshold {
                        instance.set_status(InstanceStatus::Problem);
                        flagged.push(root);
                    }
                }
                InstanceStatus::Undeploying | InstanceStatus::Deploying | InstanceStatus::NotDeployed => {
                    self.missed_heartbeats.remove(&root);
                }
                _ => {}
            }
        }
        flagged
    }

    /// Whether a sequenced report is newer than the last one applied.
    ///
    /// Unsequenced reports are always accepted.
    pub fn accept_sequence(&mut self, instance: InstanceId, sequence: Option<u64>) -> bool {
        let Some(sequence) = sequence else {
            return true;
        };
        match self.last_sequences.get(&instance) {
            Some(last) if *last >= sequence => false,
            _ => {
                self.last_sequences.insert(instance, sequence);
                true
            }
        }
    }

    /// Drops the bookkeeping of a subtree that left the tree.
    pub fn forget_subtree(&mut self, ids: &[InstanceId]) {
        for id in ids {
            self.awaiting_messages.remove(id);
            self.missed_heartbeats.remove(id);
            self.last_sequences.remove(id);
        }
    }

    /// Ids of `instance` and all its descendants.
    pub fn subtree(&self, instance: InstanceId) -> Vec<InstanceId> {
        hierarchy::build_hierarchical_list(self.application.tree(), instance)
    }
}
