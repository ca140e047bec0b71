use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Saves a serializable object to a file atomically.
///
/// The JSON document is written to a sibling temporary file, synced, then
/// renamed over the target, so readers never observe a partial file.
///
/// # Arguments
///
/// * `path` - The target file path.
/// * `state` - The object to serialize and save.
pub fn save_state<T: Serialize>(path: &Path, state: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;

    let temp_path = path.with_extension("tmp");
    let mut temp_file = std::fs::File::create(&temp_path).context("Failed to create temp file")?;
    temp_file
        .write_all(json.as_bytes())
        .context("Failed to write to temp file")?;
    temp_file.sync_all().context("Failed to sync temp file")?;

    std::fs::rename(&temp_path, path).context("Failed to rename temp file to target")?;
    Ok(())
}

/// Loads a deserializable object from a file.
///
/// # Returns
///
/// * `Ok(None)` if the file does not exist.
/// * `Ok(Some(T))` containing the deserialized object.
/// * `Err` if the file cannot be read or deserialization fails.
pub fn load_state<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to open {}", path.display()));
        }
    };
    let reader = std::io::BufReader::new(file);
    let state = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to deserialize {}", path.display()))?;
    Ok(Some(state))
}
