//! Virtualization backends available to the DM.

pub mod local;

pub use local::LocalIaas;
