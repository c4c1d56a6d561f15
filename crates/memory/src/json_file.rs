//! Whole-file JSON persistence shared by the durable stores.

use issola_core::error::StoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::warn;

/// Read `path` as JSON. A missing file yields the default; an unreadable or
/// corrupt one also yields the default, with a warning.
pub(crate) fn load_or_default<T: DeserializeOwned + Default>(path: &Path, what: &str) -> T {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read {what}, starting empty");
            return T::default();
        }
    };

    if content.trim().is_empty() {
        return T::default();
    }

    match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Corrupt {what}, starting empty");
            T::default()
        }
    }
}

/// Rewrite `path` with the pretty-printed value, creating parent directories.
pub(crate) fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content =
        serde_json::to_string_pretty(value).map_err(|e| StoreError::Serialize(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::Write {
            path: parent.display().to_string(),
            reason: e.to_string(),
        })?;
    }

    std::fs::write(path, content).map_err(|e| StoreError::Write {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_corrupt_files_yield_default() {
        let dir = tempfile::tempdir().unwrap();
        let missing: Vec<String> = load_or_default(&dir.path().join("nope.json"), "list");
        assert!(missing.is_empty());

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "[\"a\", ").unwrap();
        let loaded: Vec<String> = load_or_default(&corrupt, "list");
        assert!(loaded.is_empty());
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/list.json");
        write_pretty(&path, &vec!["x"]).unwrap();
        let loaded: Vec<String> = load_or_default(&path, "list");
        assert_eq!(loaded, vec!["x".to_string()]);
    }
}
