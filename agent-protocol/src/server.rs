//! Manager side of the agent messaging.

use crate::messages::{Command, Envelope, Message, Notification};
use anyhow::{Context, Result};
use deployment_core::comms::{Frame, TransportInput, TransportOutput};
use log::warn;

/// Publishes commands to the machine hosting their target.
pub struct CommandSender {
    transport: Box<dyn TransportOutput>,
}

impl CommandSender {
    pub fn new(transport: Box<dyn TransportOutput>) -> Self {
        Self { transport }
    }

    pub async fn send_command(
        &self,
        application_name: &str,
        root_instance_name: &str,
        command: Command,
    ) -> Result<()> {
        let envelope = Envelope {
            application_name: application_name.to_string(),
            root_instance_name: root_instance_name.to_string(),
            message: Message::Command(command),
        };
        let payload = serde_json::to_vec(&envelope).context("Failed to encode command")?;
        self.transport
            .send_frame(&Frame::new(envelope.topic(), payload))
            .await
    }
}

/// Decodes the notifications pushed by agents.
pub struct NotificationReceiver {
    transport: Box<dyn TransportInput>,
}

impl NotificationReceiver {
    pub fn new(transport: Box<dyn TransportInput>) -> Self {
        Self { transport }
    }

    /// Waits for the next notification.
    ///
    /// Returns `Ok(None)` for frames that carry no notification (e.g. a
    /// command looped back to the inbox). Undecodable frames are errors.
    pub async fn next_notification(&mut self) -> Result<Option<Notification>> {
        let frame = self.transport.recv_frame().await?;
        let envelope: Envelope = serde_json::from_slice(&frame.payload)
            .with_context(|| format!("Undecodable frame on topic '{}'", frame.topic))?;
        let topic = envelope.topic();
        match envelope.message {
            Message::Notification(notification) => Ok(Some(notification)),
            Message::Command(command) => {
                warn!(
                    "The DM received a command instead of a notification: {:?} (from {})",
                    command, topic
                );
                Ok(None)
            }
        }
    }
}
