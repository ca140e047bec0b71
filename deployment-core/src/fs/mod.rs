pub mod paths;
pub mod persistence;

pub use paths::StatePaths;
pub use persistence::{load_state, save_state};
