//! Factory functions for the manager and agent endpoints.
//!
//! The manager binds an outbox (commands, PUB) and an inbox (notifications,
//! PULL). Agents connect to both.

use super::address::Address;
use super::transport::{TransportInput, TransportOutput};
use super::transports::memory::{MemoryTransportInput, MemoryTransportOutput};
use super::transports::zmq::{ZmqReceiver, ZmqSender};
use anyhow::{bail, Result};
use tokio::sync::mpsc;

/// Creates a connected in-process pair.
///
/// # Arguments
///
/// * `capacity` - Number of frames buffered before senders wait.
pub fn memory_channel(capacity: usize) -> (Box<dyn TransportOutput>, Box<dyn TransportInput>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        Box::new(MemoryTransportOutput::new(tx)),
        Box::new(MemoryTransportInput::new(rx)),
    )
}

/// Binds the manager's command outbox.
pub fn bind_outbox(address: &Address) -> Result<Box<dyn TransportOutput>> {
    match address {
        Address::Zmq(endpoint) => Ok(Box::new(ZmqSender::publisher(endpoint)?)),
        Address::Memory(name) => bail!("Memory channel '{name}' must be created with memory_channel"),
    }
}

/// Binds the manager's notification inbox.
pub fn bind_inbox(address: &Address) -> Result<Box<dyn TransportInput>> {
    match address {
        Address::Zmq(endpoint) => Ok(Box::new(ZmqReceiver::puller(endpoint)?)),
        Address::Memory(name) => bail!("Memory channel '{name}' must be created with memory_channel"),
    }
}

/// Connects an agent to the manager's outbox, receiving only frames whose
/// topic starts with `topic`.
pub fn connect_outbox(address: &Address, topic: &str) -> Result<Box<dyn TransportInput>> {
    match address {
        Address::Zmq(endpoint) => Ok(Box::new(ZmqReceiver::subscriber(endpoint, topic)?)),
        Address::Memory(name) => bail!("Memory channel '{name}' must be created with memory_channel"),
    }
}

/// Connects an agent to the manager's inbox.
pub fn connect_inbox(address: &Address) -> Result<Box<dyn TransportOutput>> {
    match address {
        Address::Zmq(endpoint) => Ok(Box::new(ZmqSender::pusher(endpoint)?)),
        Address::Memory(name) => bail!("Memory channel '{name}' must be created with memory_channel"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::Frame;

    #[tokio::test]
    async fn test_memory_channel() -> Result<()> {
        let (output, mut input) = memory_channel(8);
        assert!(input.try_recv().await?.is_none());

        output.send_frame(&Frame::new("lamp/vm1", b"hello".to_vec())).await?;
        let frame = input.recv_frame().await?;
        assert_eq!(frame.topic, "lamp/vm1");
        assert_eq!(frame.payload, b"hello");

        drop(output);
        assert!(input.recv_frame().await.is_err());
        Ok(())
    }

    #[test]
    fn test_memory_address_needs_a_channel() {
        assert!(bind_outbox(&Address::memory("x")).is_err());
        assert!(bind_inbox(&Address::memory("x")).is_err());
    }
}
