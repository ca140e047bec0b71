//! Registry module
//!
//! Keeps track of the applications managed by this DM.

pub mod catalog;

pub use catalog::{ApplicationRegistry, SharedApplication};
