pub mod component;
pub mod import;
pub mod policy;
pub mod status;
