//! Agent side of the messaging.

use crate::messages::{Command, Envelope, Message, Notification};
use anyhow::{bail, Context, Result};
use deployment_core::comms::{Frame, TransportInput, TransportOutput};

/// The endpoint of one agent: the machine hosting a root instance.
pub struct AgentClient {
    application_name: String,
    root_instance_name: String,
    commands: Box<dyn TransportInput>,
    notifications: Box<dyn TransportOutput>,
}

impl AgentClient {
    pub fn new(
        application_name: impl Into<String>,
        root_instance_name: impl Into<String>,
        commands: Box<dyn TransportInput>,
        notifications: Box<dyn TransportOutput>,
    ) -> Self {
        Self {
            application_name: application_name.into(),
            root_instance_name: root_instance_name.into(),
            commands,
            notifications,
        }
    }

    pub fn topic(&self) -> String {
        crate::model::topic(&self.application_name, &self.root_instance_name)
    }

    pub async fn send_notification(&self, notification: Notification) -> Result<()> {
        let envelope = Envelope {
            application_name: self.application_name.clone(),
            root_instance_name: self.root_instance_name.clone(),
            message: Message::Notification(notification),
        };
        let payload = serde_json::to_vec(&envelope).context("Failed to encode notification")?;
        self.notifications
            .send_frame(&Frame::new(self.topic(), payload))
            .await
    }

    /// Waits for the next command addressed to this machine.
    pub async fn next_command(&mut self) -> Result<Command> {
        loop {
            let frame = self.commands.recv_frame().await?;
            if !frame.topic.starts_with(&self.topic()) {
                continue;
            }
            let envelope: Envelope =
                serde_json::from_slice(&frame.payload).context("Failed to decode command")?;
            match envelope.message {
                Message::Command(command) => return Ok(command),
                Message::Notification(n) => bail!("Unexpected notification on the command bus: {}", n.kind()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{CommandSender, NotificationReceiver};
    use deployment_core::comms::memory_channel;

    #[tokio::test]
    async fn test_command_and_notification_round_trip() -> Result<()> {
        let (command_out, command_in) = memory_channel(8);
        let (notif_out, notif_in) = memory_channel(8);
        let sender = CommandSender::new(command_out);
        let mut receiver = NotificationReceiver::new(notif_in);
        let mut agent = AgentClient::new("lamp", "vm1", command_in, notif_out);

        // Traffic for another machine is skipped
        sender
            .send_command("lamp", "vm10", Command::Start { instance_path: "/vm10/x".into() })
            .await?;
        sender
            .send_command("lamp", "vm1", Command::Deploy { instance_path: "/vm1/tomcat".into() })
            .await?;
        assert_eq!(
            agent.next_command().await?,
            Command::Deploy { instance_path: "/vm1/tomcat".into() }
        );

        agent
            .send_notification(Notification::Heartbeat {
                application_name: "lamp".into(),
                root_instance_name: "vm1".into(),
            })
            .await?;
        let received = receiver.next_notification().await?.unwrap();
        assert_eq!(received.kind(), "heartbeat");
        assert_eq!(received.application_name(), "lamp");
        Ok(())
    }
}
