//! # Deployment Core Library
//!
//! The instance model of the deployment manager and the plumbing shared with
//! its agents.
//!
//! ## Modules
//! - `tree`: Instance arena, path algebra, duplication engine, insertion gate and runtime validation.
//! - `application`: An instance tree bound to its component graph, and its serde description.
//! - `comms`: Frame transports (ZMQ, in-memory) between the manager and the agents.
//! - `fs`: State directory layout and atomic JSON persistence.

pub mod application;
pub mod comms;
pub mod fs;
pub mod tree;

pub use application::{Application, ApplicationDescription, InstanceDescription};
pub use tree::{DetachedTree, Instance, InstanceId, InstanceTree};
