pub mod client;
pub mod messages;
pub mod model;
pub mod server;

pub use client::AgentClient;
pub use messages::{Command, Envelope, Message, Notification};
pub use model::{topic, InstanceSnapshot};
pub use server::{CommandSender, NotificationReceiver};
