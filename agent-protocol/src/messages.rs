//! Messages exchanged between the manager and its agents.
//!
//! Notifications flow from agents to the manager, commands the other way.
//! Instances are always addressed by path, never by identity.

use deployment::{DeletePolicy, Imports, InstanceStatus};
use deployment_core::InstanceDescription;
use serde::{Deserialize, Serialize};

/// Agent to manager.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Notification {
    MachineUp {
        application_name: String,
        root_instance_name: String,
        ip_address: String,
    },
    MachineDown {
        application_name: String,
        root_instance_name: String,
    },
    Heartbeat {
        application_name: String,
        root_instance_name: String,
    },
    InstanceChanged {
        application_name: String,
        instance_path: String,
        new_status: InstanceStatus,
        #[serde(default)]
        new_imports: Imports,
        /// Monotonic per instance when the agent numbers its reports.
        #[serde(default)]
        sequence: Option<u64>,
    },
    InstanceRemoved {
        application_name: String,
        instance_path: String,
    },
    /// A backup completed. A destination decision turns it into a migration.
    InstanceBackedUp {
        application_name: String,
        instance_path: String,
        #[serde(default)]
        dest_path: Option<String>,
        #[serde(default)]
        delete_old_root: Option<DeletePolicy>,
    },
    InstanceRestored {
        application_name: String,
        instance_path: String,
        old_instance_path: String,
        #[serde(default)]
        delete_old_root: Option<DeletePolicy>,
    },
    /// Sent by the old side once the cut-over happened.
    InstanceMigrated {
        application_name: String,
        old_instance_path: String,
        #[serde(default)]
        delete_old_root: Option<DeletePolicy>,
    },
}

impl Notification {
    pub fn application_name(&self) -> &str {
        match self {
            Notification::MachineUp { application_name, .. }
            | Notification::MachineDown { application_name, .. }
            | Notification::Heartbeat { application_name, .. }
            | Notification::InstanceChanged { application_name, .. }
            | Notification::InstanceRemoved { application_name, .. }
            | Notification::InstanceBackedUp { application_name, .. }
            | Notification::InstanceRestored { application_name, .. }
            | Notification::InstanceMigrated { application_name, .. } => application_name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::MachineUp { .. } => "machine-up",
            Notification::MachineDown { .. } => "machine-down",
            Notification::Heartbeat { .. } => "heartbeat",
            Notification::InstanceChanged { .. } => "instance-changed",
            Notification::InstanceRemoved { .. } => "instance-removed",
            Notification::InstanceBackedUp { .. } => "instance-backed-up",
            Notification::InstanceRestored { .. } => "instance-restored",
            Notification::InstanceMigrated { .. } => "instance-migrated",
        }
    }
}

/// Manager to agent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Command {
    /// The model of the machine, sent once it is up.
    SetRootInstance { root: InstanceDescription },
    AddInstance {
        parent_path: String,
        instance: InstanceDescription,
    },
    RemoveInstance { instance_path: String },
    Deploy { instance_path: String },
    Start { instance_path: String },
    Stop { instance_path: String },
    Undeploy { instance_path: String },
    Backup { instance_path: String },
    Migrate {
        instance_path: String,
        #[serde(default)]
        dest_path: Option<String>,
        delete_old_root: DeletePolicy,
    },
    Restore {
        instance_path: String,
        #[serde(default)]
        old_instance_path: Option<String>,
        #[serde(default)]
        dest_path: Option<String>,
        #[serde(default)]
        delete_old_root: Option<DeletePolicy>,
    },
}

impl Command {
    /// Path of the instance the command acts on.
    pub fn instance_path(&self) -> String {
        match self {
            Command::SetRootInstance { root } => format!("/{}", root.name),
            Command::AddInstance { parent_path, instance } => {
                format!("{}/{}", parent_path, instance.name)
            }
            Command::RemoveInstance { instance_path }
            | Command::Deploy { instance_path }
            | Command::Start { instance_path }
            | Command::Stop { instance_path }
            | Command::Undeploy { instance_path }
            | Command::Backup { instance_path }
            | Command::Migrate { instance_path, .. }
            | Command::Restore { instance_path, .. } => instance_path.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Message {
    Notification(Notification),
    Command(Command),
}

/// A message plus the machine it comes from or goes to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope {
    pub application_name: String,
    pub root_instance_name: String,
    pub message: Message,
}

impl Envelope {
    pub fn topic(&self) -> String {
        crate::model::topic(&self.application_name, &self.root_instance_name)
    }
}
