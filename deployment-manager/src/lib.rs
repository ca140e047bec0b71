//! # Deployment Manager
//!
//! Keeps the model of the managed applications, provisions their machines
//! and drives the agents running on them.
//!
//! ## Modules
//! - `manager`: Operations on applications and instances (REST and workflows).
//! - `processor`: Applies agent notifications to the model.
//! - `managed`: Per-application bookkeeping (queued commands, heartbeats).
//! - `api`: REST and WebSocket façade.

pub mod api;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod gateway;
pub mod iaas;
pub mod managed;
pub mod manager;
pub mod persistence;
pub mod processor;
pub mod registry;

#[cfg(test)]
mod fixtures;

pub use config::DmConfig;
pub use error::DmError;
pub use event_bus::{DmEvent, EventBus, TimedEvent};
pub use gateway::{AgentGateway, ChannelGateway, RecordingGateway};
pub use iaas::LocalIaas;
pub use manager::{Action, Manager};
pub use processor::DmMessageProcessor;
