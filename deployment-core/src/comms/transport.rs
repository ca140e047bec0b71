use anyhow::{bail, Result};
use async_trait::async_trait;

/// One message on the wire: a routing topic and an opaque payload.
///
/// Subscribers filter on topic prefixes, so topics are built from the most
/// general to the most specific part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// Rebuilds a frame from a `[topic, payload]` multipart message.
    pub fn from_parts(mut parts: Vec<Vec<u8>>) -> Result<Self> {
        if parts.len() != 2 {
            bail!("Expected a [topic, payload] message, got {} parts", parts.len());
        }
        let payload = parts.pop().unwrap_or_default();
        let topic = String::from_utf8(parts.pop().unwrap_or_default())?;
        Ok(Self { topic, payload })
    }
}

/// Returned by inputs once every sender is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("transport closed")]
pub struct TransportClosed;

/// Abstraction for the incoming transport layer.
/// Implementation details (ZMQ, Memory) are hidden behind this trait.
#[async_trait]
pub trait TransportInput: Send + Sync {
    /// Waits for the next frame.
    async fn recv_frame(&mut self) -> Result<Frame>;

    /// Returns the next frame if one is already available.
    async fn try_recv(&mut self) -> Result<Option<Frame>>;
}

/// Abstraction for the outgoing transport layer.
#[async_trait]
pub trait TransportOutput: Send + Sync {
    async fn send_frame(&self, frame: &Frame) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_from_parts() {
        let frame = Frame::from_parts(vec![b"app/vm1".to_vec(), b"{}".to_vec()]).unwrap();
        assert_eq!(frame, Frame::new("app/vm1", b"{}".to_vec()));
        assert!(Frame::from_parts(vec![b"only".to_vec()]).is_err());
    }
}
