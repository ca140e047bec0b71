use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings of the deployment manager daemon.
///
/// Values come from an optional TOML file, overridden by `DM_*` environment
/// variables (e.g. `DM_API_PORT=9000`).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DmConfig {
    pub api_port: u16,
    /// Where application states are saved.
    pub config_dir: PathBuf,
    /// Consecutive missed heartbeats tolerated before a machine is flagged.
    pub missed_heartbeats_threshold: u32,
    pub check_states_interval_secs: u64,

    // Agent messaging
    pub agent_bus_bind: String,   // Commands to agents (PUB)
    pub agent_inbox_bind: String, // Notifications from agents (PULL)
    pub use_in_memory_bus: bool,
}

impl Default for DmConfig {
    fn default() -> Self {
        Self {
            api_port: 8181,
            config_dir: PathBuf::from("./dm-state"),
            missed_heartbeats_threshold: 5,
            check_states_interval_secs: 5,

            agent_bus_bind: "tcp://0.0.0.0:6661".to_string(),
            agent_inbox_bind: "tcp://0.0.0.0:6662".to_string(),
            use_in_memory_bus: false,
        }
    }
}

impl DmConfig {
    /// Loads the configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Optional TOML file. It must exist when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(config::Environment::with_prefix("DM").try_parsing(true));

        builder
            .build()
            .context("Failed to read the DM configuration")?
            .try_deserialize()
            .context("Invalid DM configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_overrides_defaults() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "api_port = 9191")?;
        writeln!(file, "missed_heartbeats_threshold = 2")?;
        writeln!(file, "use_in_memory_bus = true")?;

        let config = DmConfig::load(Some(file.path()))?;
        assert_eq!(config.api_port, 9191);
        assert_eq!(config.missed_heartbeats_threshold, 2);
        assert!(config.use_in_memory_bus);
        assert_eq!(config.agent_bus_bind, DmConfig::default().agent_bus_bind);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(DmConfig::load(Some(Path::new("/nonexistent/dm.toml"))).is_err());
    }
}
