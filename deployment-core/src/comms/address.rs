//! Endpoint addresses for the agent messaging layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Address {
    /// ZeroMQ endpoint, `tcp://ip:port` or `ipc://path`.
    Zmq(String),

    /// In-process channel, only usable through [`super::memory_channel`].
    Memory(String),
}

impl Address {
    /// Creates a new ZMQ TCP address.
    ///
    /// # Arguments
    ///
    /// * `ip` - The IP address (e.g., "127.0.0.1").
    /// * `port` - The TCP port.
    pub fn zmq_tcp(ip: &str, port: u16) -> Self {
        Address::Zmq(format!("tcp://{}:{}", ip, port))
    }

    pub fn memory(name: &str) -> Self {
        Address::Memory(name.to_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Zmq(addr) => write!(f, "zmq:{}", addr),
            Address::Memory(name) => write!(f, "mem:{}", name),
        }
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(stripped) = s.strip_prefix("zmq:") {
            Ok(Address::Zmq(stripped.to_string()))
        } else if let Some(stripped) = s.strip_prefix("mem:") {
            Ok(Address::Memory(stripped.to_string()))
        } else if s.starts_with("tcp://") || s.starts_with("ipc://") {
            Ok(Address::Zmq(s.to_string()))
        } else {
            Err(format!("Unknown address format: {}", s))
        }
    }
}
