use crate::comms::transport::{Frame, TransportClosed, TransportInput, TransportOutput};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// In-process transport, used by tests and single-process setups.
pub struct MemoryTransportInput {
    receiver: mpsc::Receiver<Frame>,
}

impl MemoryTransportInput {
    pub fn new(receiver: mpsc::Receiver<Frame>) -> Self {
        Self { receiver }
    }
}

#[async_trait]
impl TransportInput for MemoryTransportInput {
    async fn recv_frame(&mut self) -> Result<Frame> {
        self.receiver
            .recv()
            .await
            .ok_or_else(|| TransportClosed.into())
    }

    async fn try_recv(&mut self) -> Result<Option<Frame>> {
        match self.receiver.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(TransportClosed.into()),
        }
    }
}

#[derive(Clone)]
pub struct MemoryTransportOutput {
    sender: mpsc::Sender<Frame>,
}

impl MemoryTransportOutput {
    pub fn new(sender: mpsc::Sender<Frame>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl TransportOutput for MemoryTransportOutput {
    async fn send_frame(&self, frame: &Frame) -> Result<()> {
        self.sender
            .send(frame.clone())
            .await
            .map_err(|_| anyhow::anyhow!("Failed to send to memory channel"))
    }
}
