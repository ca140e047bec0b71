//! # Event Bus
//!
//! Every observable change of the managed applications is published here.
//! The REST layer streams these events to operators over a WebSocket, and
//! tests subscribe to assert on what happened without inspecting internals.

use chrono::{DateTime, Utc};
use deployment::{DeletePolicy, InstanceStatus};
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum DmEvent {
    ApplicationRegistered {
        application: String,
    },

    StatusChanged {
        application: String,
        instance_path: String,
        old_status: InstanceStatus,
        new_status: InstanceStatus,
    },

    /// **Processor**: a machine reported it is up.
    MachineUp {
        application: String,
        root_instance: String,
        ip_address: String,
    },

    MachineDown {
        application: String,
        root_instance: String,
    },

    /// **Liveness check**: a machine missed too many heartbeats.
    MachineProblem {
        application: String,
        root_instance: String,
    },

    InstanceAdded {
        application: String,
        instance_path: String,
    },

    InstanceRemoved {
        application: String,
        instance_path: String,
    },

    /// A copy of a migrated branch was attached and is being deployed.
    MigrationStaged {
        application: String,
        old_instance_path: String,
        new_instance_path: String,
    },

    RestoreCompleted {
        application: String,
        instance_path: String,
        old_instance_path: String,
    },

    /// The old side of a migration is being stopped and undeployed.
    TeardownRequested {
        application: String,
        instance_path: String,
        policy: DeletePolicy,
    },
}

/// An event and the time it was published.
#[derive(Debug, Clone, Serialize)]
pub struct TimedEvent {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: DmEvent,
}

/// A wrapper around a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TimedEvent>,
}

impl EventBus {
    /// Creates a new EventBus.
    ///
    /// Slow subscribers skip old events (lagging) once 256 are pending.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    pub fn publish(&self, event: DmEvent) {
        // No subscriber is fine (e.g. during startup)
        let _ = self.sender.send(TimedEvent {
            at: Utc::now(),
            event,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimedEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
