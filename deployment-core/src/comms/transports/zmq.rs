use crate::comms::transport::{Frame, TransportInput, TransportOutput};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use zmq::{Context as ZmqContext, Socket, SocketType};

/// Delay between two non-blocking reads while no frame is pending.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn open(socket_type: SocketType) -> Result<Socket> {
    ZmqContext::new()
        .socket(socket_type)
        .context("Failed to create ZMQ socket")
}

fn send(socket: &Mutex<Socket>, frame: &Frame) -> Result<()> {
    let socket = socket
        .lock()
        .map_err(|_| anyhow!("ZMQ socket lock poisoned"))?;
    // ZMQ is fast enough that we can use the blocking call inside the lock
    socket
        .send_multipart([frame.topic.as_bytes(), frame.payload.as_slice()], 0)
        .context("Failed to send ZMQ message (Transport)")
}

fn try_receive(socket: &Mutex<Socket>) -> Result<Option<Frame>> {
    let socket = socket
        .lock()
        .map_err(|_| anyhow!("ZMQ socket lock poisoned"))?;
    match socket.recv_multipart(zmq::DONTWAIT) {
        Ok(parts) => Frame::from_parts(parts).map(Some),
        Err(zmq::Error::EAGAIN) => Ok(None),
        Err(e) => Err(e).context("Failed to receive ZMQ message (Transport)"),
    }
}

async fn receive(socket: &Mutex<Socket>) -> Result<Frame> {
    loop {
        if let Some(frame) = try_receive(socket)? {
            return Ok(frame);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Sending side bound by the manager (PUB) or connected by an agent (PUSH).
pub(crate) struct ZmqSender {
    socket: Mutex<Socket>,
}

impl ZmqSender {
    /// A PUB socket bound to `address`: commands fan out to every agent.
    pub fn publisher(address: &str) -> Result<Self> {
        let socket = open(SocketType::PUB)?;
        socket
            .bind(address)
            .with_context(|| format!("Failed to bind PUB socket on {address}"))?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// A PUSH socket connected to the manager's inbox.
    pub fn pusher(address: &str) -> Result<Self> {
        let socket = open(SocketType::PUSH)?;
        socket
            .connect(address)
            .with_context(|| format!("Failed to connect PUSH socket to {address}"))?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl TransportOutput for ZmqSender {
    async fn send_frame(&self, frame: &Frame) -> Result<()> {
        send(&self.socket, frame)
    }
}

/// Receiving side bound by the manager (PULL) or connected by an agent (SUB).
pub(crate) struct ZmqReceiver {
    socket: Mutex<Socket>,
}

impl ZmqReceiver {
    /// A PULL socket bound to `address`: the manager's notification inbox.
    pub fn puller(address: &str) -> Result<Self> {
        let socket = open(SocketType::PULL)?;
        socket
            .bind(address)
            .with_context(|| format!("Failed to bind PULL socket on {address}"))?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// A SUB socket connected to the manager, filtered on `topic`.
    pub fn subscriber(address: &str, topic: &str) -> Result<Self> {
        let socket = open(SocketType::SUB)?;
        socket
            .connect(address)
            .with_context(|| format!("Failed to connect SUB socket to {address}"))?;
        socket.set_subscribe(topic.as_bytes())?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl TransportInput for ZmqReceiver {
    async fn recv_frame(&mut self) -> Result<Frame> {
        receive(&self.socket).await
    }

    async fn try_recv(&mut self) -> Result<Option<Frame>> {
        try_receive(&self.socket)
    }
}
