//! Outbound side of the agent messaging, as seen by the manager.

use agent_protocol::{Command, CommandSender};
use anyhow::{bail, Result};
use async_trait::async_trait;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Delivers commands to the agent of one machine.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    async fn send(
        &self,
        application_name: &str,
        root_instance_name: &str,
        command: Command,
    ) -> Result<()>;
}

/// Gateway over the command outbox.
pub struct ChannelGateway {
    sender: CommandSender,
}

impl ChannelGateway {
    pub fn new(sender: CommandSender) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl AgentGateway for ChannelGateway {
    async fn send(
        &self,
        application_name: &str,
        root_instance_name: &str,
        command: Command,
    ) -> Result<()> {
        debug!(
            "Sending {:?} to {}/{}",
            command, application_name, root_instance_name
        );
        self.sender
            .send_command(application_name, root_instance_name, command)
            .await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentCommand {
    pub application_name: String,
    pub root_instance_name: String,
    pub command: Command,
}

/// Keeps every command instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<SentCommand>>,
    failing: AtomicBool,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next sends fail, as a broken transport would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentCommand> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns and forgets the recorded commands.
    pub fn take(&self) -> Vec<SentCommand> {
        match self.sent.lock() {
            Ok(mut sent) => std::mem::take(&mut *sent),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl AgentGateway for RecordingGateway {
    async fn send(
        &self,
        application_name: &str,
        root_instance_name: &str,
        command: Command,
    ) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("Transport closed");
        }
        let record = SentCommand {
            application_name: application_name.to_string(),
            root_instance_name: root_instance_name.to_string(),
            command,
        };
        match self.sent.lock() {
            Ok(mut sent) => sent.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
        Ok(())
    }
}
