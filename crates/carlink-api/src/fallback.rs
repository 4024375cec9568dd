//! Offline response fallback.

use std::fmt;
use std::path::PathBuf;

/// Source of canned responses used when the back end refuses access.
pub trait OfflineFallback: Send + Sync + fmt::Debug {
    /// Response body for `function`, if one is available.
    fn load(&self, function: &str) -> Option<String>;
}

/// Reads `<dir>/<function>.json`.
#[derive(Debug, Clone)]
pub struct DirectoryFallback {
    dir: PathBuf,
}

impl DirectoryFallback {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl OfflineFallback for DirectoryFallback {
    fn load(&self, function: &str) -> Option<String> {
        if function.is_empty() {
            return None;
        }
        let path = self.dir.join(format!("{}.json", function));
        match std::fs::read_to_string(&path) {
            Ok(body) => {
                tracing::debug!(path = %path.display(), "loaded offline response");
                Some(body)
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no offline response");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("getVehicleData.json"), r#"{"ok":true}"#).unwrap();

        let fallback = DirectoryFallback::new(dir.path());
        assert_eq!(fallback.load("getVehicleData").as_deref(), Some(r#"{"ok":true}"#));
        assert!(fallback.load("missing").is_none());
        assert!(fallback.load("").is_none());
    }
}
