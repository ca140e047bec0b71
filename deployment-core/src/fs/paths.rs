use std::path::{Path, PathBuf};

const INSTANCES_FILE: &str = "instances.json";

/// Layout of the manager's state directory.
///
/// ```text
/// <config_dir>/<application>/instances.json
/// ```
#[derive(Debug, Clone)]
pub struct StatePaths {
    config_dir: PathBuf,
}

impl StatePaths {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn application_dir(&self, application_name: &str) -> PathBuf {
        self.config_dir.join(sanitize(application_name))
    }

    pub fn instances_file(&self, application_name: &str) -> PathBuf {
        self.application_dir(application_name).join(INSTANCES_FILE)
    }

    /// Names of the applications that have a saved state.
    pub fn saved_applications(&self) -> std::io::Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.config_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.path().join(INSTANCES_FILE).is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Ensures the state directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config_dir)
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c == '/' || c == '\\' || c == ' ' { '_' } else { c })
        .collect()
}
